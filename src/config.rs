use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Bundled dataset used until the user uploads one
pub const DEFAULT_DATASET: &str = "superstore_update.xlsx";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Sheet name of the spreadsheet download
pub const EXPORT_SHEET_NAME: &str = "Laporan";
pub const XLSX_FILE_NAME: &str = "laporan_usaha.xlsx";
pub const PDF_FILE_NAME: &str = "laporan_usaha.pdf";
pub const CSV_FILE_NAME: &str = "laporan_usaha.csv";
pub const CHART_FILE_NAME: &str = "grafik_penjualan.png";

/// Largest accepted upload body
pub const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Tunables of the report pipeline
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Rows shown in the dataset preview
    pub preview_rows: usize,
    /// Products kept in the margin report
    pub margin_top_n: usize,
    /// Line items printed in the PDF summary
    pub pdf_items: usize,
    /// Months projected by the forecaster
    pub forecast_horizon: usize,
    pub chart_width: u32,
    pub chart_height: u32,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            preview_rows: 5,
            margin_top_n: 10,
            pdf_items: 10,
            forecast_horizon: 3,
            chart_width: 900,
            chart_height: 450,
        }
    }
}

/// Startup settings of the web server
#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    pub dataset: PathBuf,
    pub host: String,
    pub port: u16,
    pub dashboard: DashboardConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            dataset: PathBuf::from(DEFAULT_DATASET),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            dashboard: DashboardConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Build from positional arguments: `<dataset-path> <port>`.
    ///
    /// Missing or unparsable values fall back to the defaults.
    pub fn from_args(args: &[String]) -> Self {
        let mut config = ServerConfig::default();

        if let Some(path) = args.get(1) {
            config.dataset = PathBuf::from(path);
        }
        if let Some(port) = args.get(2) {
            config.port = port.parse().unwrap_or(DEFAULT_PORT);
        }

        config
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_without_arguments() {
        let config = ServerConfig::from_args(&args(&["website"]));
        assert_eq!(config.dataset, PathBuf::from(DEFAULT_DATASET));
        assert_eq!(config.bind_address(), "127.0.0.1:3000");
    }

    #[test]
    fn positional_arguments_override_defaults() {
        let config = ServerConfig::from_args(&args(&["website", "data/sales.csv", "8080"]));
        assert_eq!(config.dataset, PathBuf::from("data/sales.csv"));
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn bad_port_falls_back() {
        let config = ServerConfig::from_args(&args(&["website", "x.xlsx", "eighty"]));
        assert_eq!(config.port, DEFAULT_PORT);
    }
}
