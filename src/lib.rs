/*!
# Sales Dashboard

A single-page sales dashboard for small businesses, served from Rust.

## Overview

The dashboard reads a tabular sales dataset (an uploaded workbook or CSV, or a
bundled default file), narrows it with a cascading Segment → Category →
Product Name filter, and shows headline figures, a profit margin table,
monthly and weekly sales trends and a three month linear forecast. The
filtered rows can be downloaded as a spreadsheet, a CSV file or a PDF summary,
and the monthly trend chart as a PNG image.

## Architecture

Every request runs the same synchronous pipeline:

### Data Layer
- **loader**: reads xlsx/xls/xlsb/ods workbooks (calamine) and CSV files into a
  typed `Dataset`, validating the required columns, dates and numbers
- **cache**: parsed datasets keyed by the SHA-256 of their bytes

### Analysis Layer
- **filter**: option lists and the three membership predicates
- **aggregate**: KPIs, per-product margins, month and week buckets
- **forecast**: ordinary least squares trend over monthly totals

### Output Layer
- **dashboard**: assembles a `DashboardReport` for one filter state
- **present**: currency formatting and the handlebars page
- **chart**: line charts rasterized with plotters
- **export**: xlsx (sheet "Laporan"), CSV and PDF downloads

### Web Layer (feature `web`)
- **app**: axum routes, upload handling and shared state

## REST API Endpoints

- `GET /` - Dashboard page, filtered by repeated `segment`, `category` and
  `product` query parameters (plus `filtered=1` for a submitted form)
- `GET /api/report` - The same report as JSON
- `POST /upload` - Multipart upload, field `dataset`
- `POST /reset` - Back to the default dataset
- `GET /download/{file}` - `laporan_usaha.xlsx`, `laporan_usaha.pdf`,
  `laporan_usaha.csv` or `grafik_penjualan.png`
- `GET /chart/{name}` - `monthly.png`, `weekly.png` or `forecast.png`

## Usage

```text
website [dataset-path] [port]
report <dataset-path> [output-dir]
```
*/

pub mod aggregate;
pub mod cache;
pub mod chart;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod export;
pub mod filter;
pub mod forecast;
pub mod loader;
pub mod present;
pub mod record;

#[cfg(feature = "web")]
pub mod app;

pub use dashboard::{build_report, DashboardReport, DataSource};
pub use error::{ChartError, DashboardError, ExportError, ForecastError, LoadError};
pub use filter::FilterSelection;
pub use record::{Dataset, SalesRecord};
