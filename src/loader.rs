use crate::error::LoadError;
use crate::record::{CellValue, Column, ColumnKind, Dataset, Field, SalesRecord};
use calamine::{Data, Reader, Sheets};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use log::{debug, info};
use regex::Regex;
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

lazy_static! {
    static ref CURRENCY_NOISE: Regex = Regex::new(r"[\$,\s]").unwrap();
}

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%m/%d/%Y", "%d-%m-%Y", "%Y/%m/%d", "%d/%m/%Y"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];

/// Container formats the loader understands
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileFormat {
    Csv,
    /// Anything calamine opens: xlsx, xlsm, xlsb, xls, ods
    Workbook,
}

impl FileFormat {
    /// Pick the format from a file name's extension
    pub fn from_name(name: impl AsRef<Path>) -> Result<Self, LoadError> {
        let extension = name
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());

        match extension.as_deref() {
            Some("csv") => Ok(FileFormat::Csv),
            Some("xlsx") | Some("xlsm") | Some("xlsb") | Some("xls") | Some("ods") => {
                Ok(FileFormat::Workbook)
            }
            Some(ext) => Err(LoadError::UnsupportedFormat(ext.to_string())),
            None => Err(LoadError::UnsupportedFormat("file has no extension".to_string())),
        }
    }
}

/// Load a sales dataset from disk
///
/// The extension decides between the CSV reader and the workbook reader.
///
/// # Examples
/// ```no_run
/// use sales_dashboard::loader::load_path;
///
/// match load_path("superstore_update.xlsx") {
///     Ok(dataset) => println!("Loaded {} line items", dataset.len()),
///     Err(e) => eprintln!("Error loading dataset: {}", e),
/// }
/// ```
pub fn load_path(path: impl AsRef<Path>) -> Result<Dataset, LoadError> {
    let path = path.as_ref();
    let format = FileFormat::from_name(path)?;
    if !path.exists() {
        return Err(LoadError::NotFound(path.display().to_string()));
    }

    let rows = match format {
        FileFormat::Csv => {
            let file = std::fs::File::open(path).map_err(|e| LoadError::Read(e.to_string()))?;
            csv_rows(file)?
        }
        FileFormat::Workbook => {
            let workbook = calamine::open_workbook_auto(path)?;
            workbook_rows(workbook)?
        }
    };

    let dataset = build_dataset(rows)?;
    info!("Loaded {} records from {}", dataset.len(), path.display());
    Ok(dataset)
}

/// Load a sales dataset from an uploaded byte buffer
pub fn load_bytes(bytes: &[u8], format: FileFormat) -> Result<Dataset, LoadError> {
    let rows = match format {
        FileFormat::Csv => csv_rows(bytes)?,
        FileFormat::Workbook => {
            let workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
            workbook_rows(workbook)?
        }
    };

    let dataset = build_dataset(rows)?;
    info!("Loaded {} records from upload ({} bytes)", dataset.len(), bytes.len());
    Ok(dataset)
}

// First worksheet as untyped rows, header included
fn workbook_rows<RS: Read + Seek>(mut workbook: Sheets<RS>) -> Result<Vec<Vec<CellValue>>, LoadError> {
    let range = workbook.worksheet_range_at(0).ok_or(LoadError::Empty)??;

    let rows: Vec<Vec<CellValue>> = range
        .rows()
        .map(|row| row.iter().map(cell_from_data).collect())
        .collect();
    debug!("Workbook sheet has {} rows x {} columns", range.height(), range.width());
    Ok(rows)
}

fn cell_from_data(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => match excel_serial_to_date(dt.as_f64()) {
            Some(date) => CellValue::Date(date),
            None => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => match parse_date_text(s) {
            Some(date) => CellValue::Date(date),
            None => CellValue::Text(s.clone()),
        },
        // Formula errors and durations carry nothing the dashboard can use
        _ => CellValue::Empty,
    }
}

fn csv_rows<R: Read>(reader: R) -> Result<Vec<Vec<CellValue>>, LoadError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (line, result) in csv_reader.records().enumerate() {
        let record = result?;
        let row = record
            .iter()
            .map(|field| {
                if field.is_empty() {
                    CellValue::Empty
                } else if line > 0 {
                    // Data cells get their natural type, the header stays text
                    field
                        .parse::<f64>()
                        .map(CellValue::Number)
                        .unwrap_or_else(|_| CellValue::Text(field.to_string()))
                } else {
                    CellValue::Text(field.to_string())
                }
            })
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

/// Turn untyped rows (header first) into a typed dataset
fn build_dataset(rows: Vec<Vec<CellValue>>) -> Result<Dataset, LoadError> {
    let mut rows = rows.into_iter();
    let header: Vec<String> = match rows.next() {
        Some(header) if header.iter().any(|c| !c.is_empty()) => {
            header.iter().map(|c| c.display().trim().to_string()).collect()
        }
        _ => return Err(LoadError::Empty),
    };

    let mut positions: HashMap<Field, usize> = HashMap::new();
    let mut columns = Vec::with_capacity(header.len());
    let mut extra_positions = Vec::new();

    for (index, name) in header.iter().enumerate() {
        let kind = match Field::from_header(name) {
            Some(field) if !positions.contains_key(&field) => {
                positions.insert(field, index);
                ColumnKind::Field(field)
            }
            _ => {
                extra_positions.push(index);
                ColumnKind::Extra(extra_positions.len() - 1)
            }
        };
        columns.push(Column {
            name: name.clone(),
            kind,
        });
    }

    for field in Field::ALL {
        if !positions.contains_key(&field) {
            return Err(LoadError::MissingColumn(field.header().to_string()));
        }
    }

    let mut records = Vec::new();
    for (offset, row) in rows.enumerate() {
        if row.iter().all(CellValue::is_empty) {
            continue;
        }
        // Sheet rows are 1-based and the header takes row 1
        let sheet_row = offset + 2;
        let cell = |field: Field| row.get(positions[&field]).cloned().unwrap_or(CellValue::Empty);

        records.push(SalesRecord {
            order_id: cell(Field::OrderId).display().trim().to_string(),
            order_date: date_cell(&cell(Field::OrderDate), Field::OrderDate, sheet_row)?,
            ship_date: date_cell(&cell(Field::ShipDate), Field::ShipDate, sheet_row)?,
            segment: cell(Field::Segment).display().trim().to_string(),
            category: cell(Field::Category).display().trim().to_string(),
            product_name: cell(Field::ProductName).display().trim().to_string(),
            sales: number_cell(&cell(Field::Sales), Field::Sales, sheet_row)?,
            profit: number_cell(&cell(Field::Profit), Field::Profit, sheet_row)?,
            extra: extra_positions
                .iter()
                .map(|&i| row.get(i).cloned().unwrap_or(CellValue::Empty))
                .collect(),
        });
    }

    Ok(Dataset::new(columns, records))
}

fn date_cell(value: &CellValue, field: Field, row: usize) -> Result<NaiveDate, LoadError> {
    let parsed = match value {
        CellValue::Date(d) => Some(*d),
        CellValue::Number(serial) => excel_serial_to_date(*serial),
        CellValue::Text(text) => parse_date_text(text),
        _ => None,
    };
    parsed
        .filter(|d| is_sheet_date(*d))
        .ok_or_else(|| LoadError::InvalidDate {
            row,
            column: field.header().to_string(),
            value: value.display(),
        })
}

fn number_cell(value: &CellValue, field: Field, row: usize) -> Result<f64, LoadError> {
    let parsed = match value {
        CellValue::Number(n) => Some(*n),
        CellValue::Text(text) => CURRENCY_NOISE.replace_all(text, "").parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|n| n.is_finite())
        .ok_or_else(|| LoadError::InvalidNumber {
            row,
            column: field.header().to_string(),
            value: value.display(),
        })
}

/// Whether a spreadsheet can hold the date as a serial number
///
/// Serials start being unambiguous at 1900-03-01, after the phantom
/// 1900-02-29, and stop at 9999-12-31.
pub fn is_sheet_date(date: NaiveDate) -> bool {
    match (
        NaiveDate::from_ymd_opt(1900, 3, 1),
        NaiveDate::from_ymd_opt(9999, 12, 31),
    ) {
        (Some(first), Some(last)) => (first..=last).contains(&date),
        _ => false,
    }
}

/// Convert an Excel serial day number (1900 date system) to a date
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.floor() as i64))
}

/// Parse the textual date layouts seen in exported sales sheets
pub fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date())
        })
}
