//! One pass of the dashboard pipeline.
//!
//! Given a dataset and a filter state, [`build_report`] produces everything
//! the page shows as a plain value. The download and chart endpoints go
//! through [`render_download`] and [`render_chart`], which rerun only the
//! stages they need.

use crate::aggregate::{self, Bucket, CategoryBucket, Kpis, MarginRow};
use crate::chart::{self, ChartKind, ChartSeries};
use crate::config::{
    DashboardConfig, CHART_FILE_NAME, CSV_FILE_NAME, DEFAULT_DATASET, PDF_FILE_NAME, XLSX_FILE_NAME,
};
use crate::error::{DashboardError, ForecastError};
use crate::export::{self, SummaryDocument, SummaryItem};
use crate::filter::{self, FilterSelection, ResolvedSelection};
use crate::forecast::{self, Forecast};
use crate::record::{CellValue, Dataset, SalesRecord};
use chrono::NaiveDate;
use log::{info, warn};
use serde::Serialize;

/// Where the active dataset came from
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataSource {
    Default { path: String },
    Upload { file_name: String },
}

impl DataSource {
    pub fn default_dataset() -> Self {
        DataSource::Default {
            path: DEFAULT_DATASET.to_string(),
        }
    }

    /// Banner shown above the dashboard
    pub fn notice(&self) -> String {
        match self {
            DataSource::Default { path } => format!(
                "Menggunakan dataset default ({}) karena belum ada upload data.",
                path
            ),
            DataSource::Upload { file_name } => {
                format!("Dataset berhasil diunggah: {}", file_name)
            }
        }
    }

    pub fn is_upload(&self) -> bool {
        matches!(self, DataSource::Upload { .. })
    }
}

/// Labels the sidebar offers for the current selection
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FilterOptions {
    pub segments: Vec<String>,
    pub categories: Vec<String>,
    pub products: Vec<String>,
}

/// First rows of the dataset, rendered as text
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Preview {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

pub const FORECAST_UNAVAILABLE: &str = "Data bulanan belum cukup untuk prediksi";

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ForecastOutcome {
    Ready { forecast: Forecast },
    Unavailable { message: String },
}

impl ForecastOutcome {
    fn from_result(result: Result<Forecast, ForecastError>) -> Self {
        match result {
            Ok(forecast) => ForecastOutcome::Ready { forecast },
            Err(ForecastError::InsufficientData { actual, .. }) => {
                info!("Forecast skipped, only {} monthly buckets", actual);
                ForecastOutcome::Unavailable {
                    message: FORECAST_UNAVAILABLE.to_string(),
                }
            }
            Err(e) => {
                warn!("Forecast failed: {}", e);
                ForecastOutcome::Unavailable {
                    message: format!("{}: {}", FORECAST_UNAVAILABLE, e),
                }
            }
        }
    }

    pub fn forecast(&self) -> Option<&Forecast> {
        match self {
            ForecastOutcome::Ready { forecast } => Some(forecast),
            ForecastOutcome::Unavailable { .. } => None,
        }
    }
}

/// Everything one dashboard page displays
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DashboardReport {
    pub source: DataSource,
    /// The request narrowed at least one filter instead of taking defaults
    pub custom_filter: bool,
    pub options: FilterOptions,
    pub selection: ResolvedSelection,
    pub preview: Preview,
    pub total_rows: usize,
    pub filtered_rows: usize,
    pub kpis: Kpis,
    pub margin_report: Vec<MarginRow>,
    pub monthly_by_category: Vec<CategoryBucket>,
    pub monthly_totals: Vec<Bucket>,
    pub weekly_totals: Vec<Bucket>,
    pub forecast: ForecastOutcome,
}

impl DashboardReport {
    /// Chart input for one of the page's charts
    pub fn chart_series(&self, kind: ChartKind) -> Vec<ChartSeries> {
        match kind {
            ChartKind::Monthly => chart::monthly_series(&self.monthly_by_category),
            ChartKind::Weekly => chart::weekly_series(&self.weekly_totals),
            ChartKind::Forecast => self
                .forecast
                .forecast()
                .map(chart::forecast_series)
                .unwrap_or_default(),
        }
    }
}

fn preview(dataset: &Dataset, rows: usize) -> Preview {
    Preview {
        columns: dataset.column_names().into_iter().map(str::to_string).collect(),
        rows: dataset
            .records
            .iter()
            .take(rows)
            .map(|record| dataset.row_values(record).iter().map(CellValue::display).collect())
            .collect(),
    }
}

/// Run the whole pipeline for one filter state
pub fn build_report(
    dataset: &Dataset,
    selection: &FilterSelection,
    source: DataSource,
    config: &DashboardConfig,
) -> DashboardReport {
    let rows = filter::apply(dataset, selection);
    let monthly_totals = aggregate::monthly_totals(&rows);
    let forecast = ForecastOutcome::from_result(forecast::forecast_months(
        &monthly_totals,
        config.forecast_horizon,
    ));

    DashboardReport {
        custom_filter: *selection != FilterSelection::all(),
        options: FilterOptions {
            segments: filter::segment_options(dataset),
            categories: filter::category_options(dataset),
            products: filter::product_options(dataset, &selection.segments, &selection.categories),
        },
        selection: filter::resolve(dataset, selection),
        preview: preview(dataset, config.preview_rows),
        total_rows: dataset.len(),
        filtered_rows: rows.len(),
        kpis: aggregate::kpis(&rows),
        margin_report: aggregate::margin_report(&rows, config.margin_top_n),
        monthly_by_category: aggregate::monthly_by_category(&rows),
        weekly_totals: aggregate::weekly_totals(&rows),
        monthly_totals,
        forecast,
        source,
    }
}

/// First `limit` filtered rows, in dataset order, for the PDF summary
pub fn summary_items(rows: &[&SalesRecord], limit: usize) -> Vec<SummaryItem> {
    rows.iter()
        .take(limit)
        .map(|r| SummaryItem {
            product_name: r.product_name.clone(),
            sales: r.sales,
            profit: r.profit,
        })
        .collect()
}

/// PDF content: totals over every filtered row, items from the first few
pub fn summary_document(rows: &[&SalesRecord], limit: usize, date: NaiveDate) -> SummaryDocument {
    let kpis = aggregate::kpis(rows);
    SummaryDocument {
        total_sales: kpis.total_sales,
        total_profit: kpis.total_profit,
        date,
        items: summary_items(rows, limit),
    }
}

/// Files offered on the download endpoints
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Download {
    Xlsx,
    Pdf,
    Csv,
    ChartPng,
}

impl Download {
    pub const ALL: [Download; 4] = [Download::Xlsx, Download::Pdf, Download::Csv, Download::ChartPng];

    pub fn file_name(self) -> &'static str {
        match self {
            Download::Xlsx => XLSX_FILE_NAME,
            Download::Pdf => PDF_FILE_NAME,
            Download::Csv => CSV_FILE_NAME,
            Download::ChartPng => CHART_FILE_NAME,
        }
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.file_name() == name)
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Download::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Download::Pdf => "application/pdf",
            Download::Csv => "text/csv; charset=utf-8",
            Download::ChartPng => "image/png",
        }
    }
}

/// Rasterize one chart of the filtered rows
pub fn render_chart(
    dataset: &Dataset,
    selection: &FilterSelection,
    kind: ChartKind,
    config: &DashboardConfig,
) -> Result<Vec<u8>, DashboardError> {
    let rows = filter::apply(dataset, selection);
    let series = match kind {
        ChartKind::Monthly => chart::monthly_series(&aggregate::monthly_by_category(&rows)),
        ChartKind::Weekly => chart::weekly_series(&aggregate::weekly_totals(&rows)),
        ChartKind::Forecast => {
            match forecast::forecast_months(&aggregate::monthly_totals(&rows), config.forecast_horizon) {
                Ok(forecast) => chart::forecast_series(&forecast),
                Err(_) => Vec::new(),
            }
        }
    };
    let png = chart::render_png(&series, &kind.options(config.chart_width, config.chart_height))?;
    Ok(png)
}

/// Produce the bytes of one download for the filtered rows
pub fn render_download(
    dataset: &Dataset,
    selection: &FilterSelection,
    download: Download,
    config: &DashboardConfig,
    today: NaiveDate,
) -> Result<Vec<u8>, DashboardError> {
    let rows = filter::apply(dataset, selection);
    let bytes = match download {
        Download::Xlsx => export::to_xlsx(dataset, &rows)?,
        Download::Csv => export::to_csv(dataset, &rows)?,
        Download::Pdf => export::to_pdf(&summary_document(&rows, config.pdf_items, today))?,
        Download::ChartPng => render_chart(dataset, selection, ChartKind::Monthly, config)?,
    };
    info!("Prepared {} for {} rows", download.file_name(), rows.len());
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{load_bytes, FileFormat};
    use crate::record::fixtures::{date, record, sample};

    fn report(selection: &FilterSelection) -> DashboardReport {
        build_report(
            &sample(),
            selection,
            DataSource::default_dataset(),
            &DashboardConfig::default(),
        )
    }

    #[test]
    fn full_report_over_default_selection() {
        let report = report(&FilterSelection::all());
        assert_eq!(report.total_rows, 7);
        assert_eq!(report.filtered_rows, 7);
        assert_eq!(report.kpis.order_count, 6);
        assert_eq!(report.preview.rows.len(), 5);
        assert_eq!(report.preview.columns[0], "Order ID");
        assert_eq!(report.monthly_totals.len(), 3);
        assert_eq!(report.options.products.len(), 5);

        let forecast = report.forecast.forecast().unwrap();
        assert_eq!(forecast.predictions.len(), 3);
        assert_eq!(forecast.predictions[0].month_end, date(2024, 4, 30));
    }

    #[test]
    fn empty_selection_degrades_gracefully() {
        let selection = FilterSelection::all().with_products(Vec::<String>::new());
        let report = report(&selection);

        assert_eq!(report.filtered_rows, 0);
        assert_eq!(report.kpis, Kpis::default());
        assert!(report.margin_report.is_empty());
        assert!(report.weekly_totals.is_empty());
        assert_eq!(
            report.forecast,
            ForecastOutcome::Unavailable {
                message: FORECAST_UNAVAILABLE.to_string()
            }
        );
        assert!(report.chart_series(ChartKind::Forecast).is_empty());
        // The preview always shows the dataset, not the selection
        assert_eq!(report.preview.rows.len(), 5);
    }

    #[test]
    fn single_month_has_no_forecast() {
        let selection = FilterSelection::all().with_segments(["Home Office"]);
        let report = report(&selection);
        assert_eq!(report.filtered_rows, 1);
        assert!(report.forecast.forecast().is_none());
    }

    #[test]
    fn summary_takes_first_rows_unsorted() {
        let records: Vec<SalesRecord> = (0..12)
            .map(|i| {
                record(
                    &format!("O-{}", i),
                    date(2024, 1, 1),
                    "Consumer",
                    "Furniture",
                    &format!("P{}", 11 - i),
                    10.0 * (i + 1) as f64,
                    1.0,
                )
            })
            .collect();
        let rows: Vec<&SalesRecord> = records.iter().collect();

        let doc = summary_document(&rows, 10, date(2024, 7, 1));
        assert_eq!(doc.items.len(), 10);
        assert_eq!(doc.items[0].product_name, "P11");
        assert_eq!(doc.items[9].product_name, "P2");
        // Totals cover all twelve rows
        assert!((doc.total_sales - 780.0).abs() < 1e-9);
        assert!((doc.total_profit - 12.0).abs() < 1e-9);
    }

    #[test]
    fn download_names_round_trip() {
        for download in Download::ALL {
            assert_eq!(Download::from_file_name(download.file_name()), Some(download));
        }
        assert_eq!(Download::from_file_name("laporan.docx"), None);
    }

    #[test]
    fn xlsx_download_holds_filtered_rows() {
        let dataset = sample();
        let selection = FilterSelection::all().with_categories(["Technology"]);
        let bytes = render_download(
            &dataset,
            &selection,
            Download::Xlsx,
            &DashboardConfig::default(),
            date(2024, 7, 1),
        )
        .unwrap();

        let exported = load_bytes(&bytes, FileFormat::Workbook).unwrap();
        assert_eq!(exported.len(), 2);
        assert!(exported.records.iter().all(|r| r.category == "Technology"));
    }

    #[test]
    fn every_chart_renders_for_full_and_empty_selections() {
        let dataset = sample();
        let config = DashboardConfig::default();
        let empty = FilterSelection::all().with_products(Vec::<String>::new());
        for kind in [ChartKind::Monthly, ChartKind::Weekly, ChartKind::Forecast] {
            for selection in [FilterSelection::all(), empty.clone()] {
                let png = render_chart(&dataset, &selection, kind, &config).unwrap();
                assert!(png.starts_with(b"\x89PNG\r\n\x1a\n"), "{:?}", kind);
            }
        }
    }

    #[test]
    fn notices_name_the_source() {
        assert!(DataSource::default_dataset()
            .notice()
            .contains("superstore_update.xlsx"));
        let upload = DataSource::Upload {
            file_name: "toko.xlsx".to_string(),
        };
        assert!(upload.is_upload());
        assert!(upload.notice().contains("toko.xlsx"));
    }
}
