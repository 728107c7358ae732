//! Number formatting and the HTML dashboard page.

use crate::dashboard::{DashboardReport, ForecastOutcome};
#[cfg(feature = "web")]
use crate::dashboard::{Download, Preview};
#[cfg(feature = "web")]
use handlebars::Handlebars;
#[cfg(feature = "web")]
use lazy_static::lazy_static;
#[cfg(feature = "web")]
use serde::Serialize;

pub const DASHBOARD_TITLE: &str = "Dashboard Penjualan UMKM";

/// Format an amount as dollars with thousands separators
///
/// # Examples
/// ```
/// use sales_dashboard::present::format_currency;
///
/// assert_eq!(format_currency(1234.5), "$1,234.50");
/// assert_eq!(format_currency(-98765.432), "-$98,765.43");
/// ```
pub fn format_currency(value: f64) -> String {
    if !value.is_finite() {
        return "n/a".to_string();
    }
    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}${}.{}", sign, grouped, cents)
}

pub fn format_percent(value: f64) -> String {
    format!("{:.2}%", value)
}

/// Margin cell text; products without a defined margin show "n/a"
pub fn format_margin(value: Option<f64>) -> String {
    value.map(format_percent).unwrap_or_else(|| "n/a".to_string())
}

/// Dashboard line about next month's projected Sales
pub fn forecast_text(report: &DashboardReport) -> String {
    match report.forecast.forecast().and_then(|f| f.next_month()) {
        Some(next) => format!("Prediksi Bulan Depan: {}", format_currency(next.predicted_sales)),
        None => match &report.forecast {
            ForecastOutcome::Unavailable { message } => message.clone(),
            ForecastOutcome::Ready { .. } => String::new(),
        },
    }
}

/// Query string that reproduces the report's filter, with a leading `?`
///
/// Default selections produce an empty string so links stay short.
#[cfg(feature = "web")]
pub fn selection_query(report: &DashboardReport) -> String {
    if !report.custom_filter {
        return String::new();
    }

    let mut pairs = vec!["filtered=1".to_string()];
    let lists = [
        ("segment", &report.selection.segments),
        ("category", &report.selection.categories),
        ("product", &report.selection.products),
    ];
    for (key, labels) in lists {
        for label in labels {
            pairs.push(format!("{}={}", key, urlencoding::encode(label)));
        }
    }
    format!("?{}", pairs.join("&"))
}

#[cfg(feature = "web")]
lazy_static! {
    static ref TEMPLATES: Handlebars<'static> = {
        let mut registry = Handlebars::new();
        registry
            .register_template_string("dashboard", include_str!("static/dashboard.hbs"))
            .unwrap();
        registry
    };
}

#[cfg(feature = "web")]
#[derive(Serialize)]
struct CheckboxView<'a> {
    label: &'a str,
    checked: bool,
}

#[cfg(feature = "web")]
#[derive(Serialize)]
struct MarginView<'a> {
    product_name: &'a str,
    sales: String,
    profit: String,
    margin: String,
}

#[cfg(feature = "web")]
#[derive(Serialize)]
struct LinkView {
    label: &'static str,
    href: String,
}

#[cfg(feature = "web")]
#[derive(Serialize)]
struct DashboardView<'a> {
    title: &'static str,
    notice: String,
    is_upload: bool,
    flash: Option<&'a str>,
    segments: Vec<CheckboxView<'a>>,
    categories: Vec<CheckboxView<'a>>,
    products: Vec<CheckboxView<'a>>,
    preview: &'a Preview,
    filtered_rows: usize,
    total_rows: usize,
    total_sales: String,
    total_profit: String,
    order_count: usize,
    margin_rows: Vec<MarginView<'a>>,
    forecast_text: String,
    forecast_ready: bool,
    query: String,
    downloads: Vec<LinkView>,
}

#[cfg(feature = "web")]
fn checkboxes<'a>(options: &'a [String], selected: &[String]) -> Vec<CheckboxView<'a>> {
    options
        .iter()
        .map(|label| CheckboxView {
            label,
            checked: selected.contains(label),
        })
        .collect()
}

/// Render the dashboard page
///
/// # Arguments
/// * `report` - Output of one pipeline pass
/// * `flash` - One-off message, e.g. a rejected upload
#[cfg(feature = "web")]
pub fn render_dashboard(
    report: &DashboardReport,
    flash: Option<&str>,
) -> Result<String, handlebars::RenderError> {
    let query = selection_query(report);
    let download_label = |download: Download| match download {
        Download::Xlsx => "Download Laporan Excel",
        Download::Pdf => "Download PDF",
        Download::Csv => "Download CSV",
        Download::ChartPng => "Unduh Grafik PNG",
    };

    let view = DashboardView {
        title: DASHBOARD_TITLE,
        notice: report.source.notice(),
        is_upload: report.source.is_upload(),
        flash,
        segments: checkboxes(&report.options.segments, &report.selection.segments),
        categories: checkboxes(&report.options.categories, &report.selection.categories),
        products: checkboxes(&report.options.products, &report.selection.products),
        preview: &report.preview,
        filtered_rows: report.filtered_rows,
        total_rows: report.total_rows,
        total_sales: format_currency(report.kpis.total_sales),
        total_profit: format_currency(report.kpis.total_profit),
        order_count: report.kpis.order_count,
        margin_rows: report
            .margin_report
            .iter()
            .map(|row| MarginView {
                product_name: &row.product_name,
                sales: format_currency(row.mean_sales),
                profit: format_currency(row.mean_profit),
                margin: format_margin(row.mean_margin_pct),
            })
            .collect(),
        forecast_text: forecast_text(report),
        forecast_ready: matches!(report.forecast, ForecastOutcome::Ready { .. }),
        downloads: Download::ALL
            .into_iter()
            .map(|d| LinkView {
                label: download_label(d),
                href: format!("/download/{}{}", d.file_name(), query),
            })
            .collect(),
        query,
    };

    TEMPLATES.render("dashboard", &view)
}
