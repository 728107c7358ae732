#![cfg(not(tarpaulin_include))]

use sales_dashboard::app;
use sales_dashboard::config::ServerConfig;
use std::env;

/// Main entry point for the dashboard web server
///
/// # Arguments
/// * `<dataset-path>` - Default dataset, `superstore_update.xlsx` when omitted
/// * `<port>` - Listening port, 3000 when omitted or invalid
///
/// Log verbosity follows `RUST_LOG` and defaults to `info`.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let config = ServerConfig::from_args(&args);

    app::run(config).await
}
