use crate::config::EXPORT_SHEET_NAME;
use crate::error::ExportError;
use crate::loader::is_sheet_date;
use crate::present::format_currency;
use crate::record::{CellValue, Dataset, SalesRecord};
use chrono::NaiveDate;
use log::info;
use printpdf::{BuiltinFont, Mm, PdfDocument};
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use serde::Serialize;

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 10.0;
const PT_TO_MM: f32 = 0.3528;

/// Days between the Excel epoch and a date, as written to date cells
fn excel_serial(date: NaiveDate) -> Result<f64, ExportError> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)
        .ok_or_else(|| ExportError::Date("invalid Excel epoch".to_string()))?;
    if !is_sheet_date(date) {
        return Err(ExportError::Date(date.to_string()));
    }
    Ok((date - epoch).num_days() as f64)
}

/// Convert the filtered rows to XLSX format
///
/// One sheet named "Laporan": the header row carries the original column
/// names in their original order and no index column is added. An empty
/// subset yields a header-only sheet.
///
/// # Examples
/// ```
/// use sales_dashboard::export::to_xlsx;
/// use sales_dashboard::record::Dataset;
///
/// let dataset = Dataset::default();
/// match to_xlsx(&dataset, &[]) {
///     Ok(xlsx_data) => println!("XLSX generated: {} bytes", xlsx_data.len()),
///     Err(e) => eprintln!("Failed to generate XLSX: {}", e),
/// }
/// ```
pub fn to_xlsx(dataset: &Dataset, rows: &[&SalesRecord]) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name(EXPORT_SHEET_NAME)?;

    let header_format = Format::new().set_bold();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");

    for (c, column) in dataset.columns.iter().enumerate() {
        worksheet.write_string_with_format(0, c as u16, column.name.as_str(), &header_format)?;
    }

    for (r, record) in rows.iter().enumerate() {
        let row = (r + 1) as u32;
        for (c, value) in dataset.row_values(record).into_iter().enumerate() {
            let col = c as u16;
            match value {
                CellValue::Empty => {}
                CellValue::Text(text) => {
                    worksheet.write_string(row, col, text)?;
                }
                CellValue::Number(n) => {
                    worksheet.write_number(row, col, n)?;
                }
                CellValue::Bool(b) => {
                    worksheet.write_boolean(row, col, b)?;
                }
                CellValue::Date(date) => {
                    worksheet.write_number_with_format(row, col, excel_serial(date)?, &date_format)?;
                }
            }
        }
    }

    workbook.push_worksheet(worksheet);
    let buffer = workbook.save_to_buffer()?;
    info!("Exported {} rows to XLSX ({} bytes)", rows.len(), buffer.len());
    Ok(buffer)
}

/// Convert the filtered rows to CSV, same columns as the spreadsheet export
pub fn to_csv(dataset: &Dataset, rows: &[&SalesRecord]) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(dataset.column_names())?;
    for record in rows {
        writer.write_record(dataset.row_values(record).iter().map(CellValue::display))?;
    }
    writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))
}

/// One line item of the PDF summary
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SummaryItem {
    pub product_name: String,
    pub sales: f64,
    pub profit: f64,
}

/// Content of the downloadable summary document
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SummaryDocument {
    pub total_sales: f64,
    pub total_profit: f64,
    pub date: NaiveDate,
    pub items: Vec<SummaryItem>,
}

impl SummaryDocument {
    pub const TITLE: &'static str = "Laporan Ringkasan";

    /// Header lines printed under the title
    pub fn header_lines(&self) -> Vec<String> {
        vec![
            format!("Total Penjualan: {}", format_currency(self.total_sales)),
            format!("Total Profit: {}", format_currency(self.total_profit)),
            format!("Tanggal: {}", self.date.format("%d-%m-%Y")),
        ]
    }

    pub fn item_lines(&self) -> Vec<String> {
        self.items
            .iter()
            .map(|item| {
                format!(
                    "{} | Sales: {} | Profit: {}",
                    item.product_name,
                    format_currency(item.sales),
                    format_currency(item.profit)
                )
            })
            .collect()
    }
}

/// Render the summary as an A4 PDF
///
/// Header lines use 12pt, items 10pt. A new page starts whenever the next
/// line would cross the bottom margin.
pub fn to_pdf(summary: &SummaryDocument) -> Result<Vec<u8>, ExportError> {
    let pdf_err = |e: printpdf::Error| ExportError::Pdf(e.to_string());

    let (doc, page, layer) = PdfDocument::new(
        SummaryDocument::TITLE,
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Layer 1",
    );
    let font = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?;
    let mut current = doc.get_page(page).get_layer(layer);
    let mut y = PAGE_HEIGHT_MM - MARGIN_MM - 10.0;

    // Builtin fonts carry no metrics here; half an em per glyph is close enough
    let title_width = SummaryDocument::TITLE.len() as f32 * 12.0 * 0.5 * PT_TO_MM;
    current.use_text(
        SummaryDocument::TITLE,
        12.0,
        Mm((PAGE_WIDTH_MM - title_width) / 2.0),
        Mm(y),
        &font,
    );
    y -= 10.0;

    for line in summary.header_lines() {
        current.use_text(line, 12.0, Mm(MARGIN_MM), Mm(y), &font);
        y -= 10.0;
    }
    y -= 10.0;

    for line in summary.item_lines() {
        if y < MARGIN_MM + 5.0 {
            let (next_page, next_layer) = doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
            current = doc.get_page(next_page).get_layer(next_layer);
            y = PAGE_HEIGHT_MM - MARGIN_MM - 8.0;
        }
        current.use_text(line, 10.0, Mm(MARGIN_MM), Mm(y), &font);
        y -= 8.0;
    }

    drop(current);
    let bytes = doc.save_to_bytes().map_err(pdf_err)?;
    info!("Exported PDF summary with {} items ({} bytes)", summary.items.len(), bytes.len());
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{load_bytes, FileFormat};
    use crate::record::fixtures::{date, sample};

    fn summary(items: usize) -> SummaryDocument {
        SummaryDocument {
            total_sales: 1234567.891,
            total_profit: -1500.5,
            date: date(2024, 7, 9),
            items: (0..items)
                .map(|i| SummaryItem {
                    product_name: format!("Product {}", i),
                    sales: 1000.0 + i as f64,
                    profit: 10.25,
                })
                .collect(),
        }
    }

    #[test]
    fn xlsx_export_round_trips_through_loader() {
        let dataset = sample();
        let rows: Vec<&SalesRecord> = dataset.records.iter().take(4).collect();
        let bytes = to_xlsx(&dataset, &rows).unwrap();

        let reloaded = load_bytes(&bytes, FileFormat::Workbook).unwrap();
        assert_eq!(reloaded.column_names(), dataset.column_names());
        assert_eq!(reloaded.len(), 4);
        for (original, loaded) in rows.iter().zip(&reloaded.records) {
            assert_eq!(*original, loaded);
        }
    }

    #[test]
    fn empty_subset_exports_header_only() {
        let dataset = sample();
        let bytes = to_xlsx(&dataset, &[]).unwrap();
        let reloaded = load_bytes(&bytes, FileFormat::Workbook).unwrap();
        assert_eq!(reloaded.len(), 0);
        assert_eq!(reloaded.columns.len(), dataset.columns.len());

        let csv = String::from_utf8(to_csv(&dataset, &[]).unwrap()).unwrap();
        assert_eq!(csv.lines().count(), 1);
        assert!(csv.starts_with("Order ID,Order Date,Ship Date,Ship Mode,Segment"));
    }

    #[test]
    fn csv_export_renders_plain_values() {
        let dataset = sample();
        let rows: Vec<&SalesRecord> = dataset.records.iter().take(1).collect();
        let csv = String::from_utf8(to_csv(&dataset, &rows).unwrap()).unwrap();
        let line = csv.lines().nth(1).unwrap();
        assert_eq!(
            line,
            "CA-1,2024-01-03,2024-01-06,Second Class,Consumer,Furniture,Chair,200,40"
        );
    }

    #[test]
    fn summary_lines_are_currency_formatted() {
        let doc = summary(2);
        assert_eq!(
            doc.header_lines(),
            vec![
                "Total Penjualan: $1,234,567.89",
                "Total Profit: -$1,500.50",
                "Tanggal: 09-07-2024",
            ]
        );
        assert_eq!(doc.item_lines()[1], "Product 1 | Sales: $1,001.00 | Profit: $10.25");
    }

    #[test]
    fn pdf_output_is_a_pdf_document() {
        let bytes = to_pdf(&summary(10)).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn long_summaries_paginate() {
        let short = to_pdf(&summary(1)).unwrap();
        let long = to_pdf(&summary(80)).unwrap();
        assert!(long.len() > short.len());
    }

    #[test]
    fn dates_at_the_sheet_range_bounds_round_trip() {
        let mut dataset = sample();
        dataset.records.truncate(2);
        dataset.records[0].order_date = date(1900, 3, 1);
        dataset.records[0].ship_date = date(1900, 3, 1);
        dataset.records[1].order_date = date(9999, 12, 28);
        dataset.records[1].ship_date = date(9999, 12, 31);
        let rows: Vec<&SalesRecord> = dataset.records.iter().collect();

        let reloaded = load_bytes(&to_xlsx(&dataset, &rows).unwrap(), FileFormat::Workbook).unwrap();
        assert_eq!(reloaded.records, dataset.records);
    }

    #[test]
    fn dates_before_march_1900_are_rejected() {
        assert!(excel_serial(date(1900, 1, 15)).is_err());
        assert_eq!(excel_serial(date(2024, 1, 1)).unwrap(), 45292.0);
        assert_eq!(excel_serial(date(1900, 3, 1)).unwrap(), 61.0);
        assert!(excel_serial(date(10000, 1, 1)).is_err());
    }
}
