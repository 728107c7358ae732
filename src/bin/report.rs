#![cfg(not(tarpaulin_include))]

use chrono::Local;
use log::{error, info};
use sales_dashboard::config::DashboardConfig;
use sales_dashboard::dashboard::{self, DataSource, Download};
use sales_dashboard::filter::FilterSelection;
use sales_dashboard::loader;
use sales_dashboard::present;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Run the dashboard pipeline once and write every download to a directory
///
/// Usage: `report <dataset-path> [output-dir]`. The whole dataset is used,
/// with no filter applied.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        eprintln!("Usage: {} <dataset-path> [output-dir]", args[0]);
        return Ok(());
    }

    let dataset_path = PathBuf::from(&args[1]);
    let output_dir = PathBuf::from(args.get(2).map(String::as_str).unwrap_or("."));
    fs::create_dir_all(&output_dir)?;

    let dataset = loader::load_path(&dataset_path)?;
    let config = DashboardConfig::default();
    let selection = FilterSelection::all();

    let report = dashboard::build_report(
        &dataset,
        &selection,
        DataSource::Default {
            path: dataset_path.display().to_string(),
        },
        &config,
    );
    println!("Total Penjualan: {}", present::format_currency(report.kpis.total_sales));
    println!("Total Profit: {}", present::format_currency(report.kpis.total_profit));
    println!("Jumlah Order: {}", report.kpis.order_count);
    println!("{}", present::forecast_text(&report));

    let today = Local::now().date_naive();
    for download in Download::ALL {
        let target = output_dir.join(download.file_name());
        match dashboard::render_download(&dataset, &selection, download, &config, today) {
            Ok(bytes) => {
                fs::write(&target, bytes)?;
                info!("Wrote {}", target.display());
            }
            Err(e) => error!("Skipping {}: {}", download.file_name(), e),
        }
    }

    Ok(())
}
