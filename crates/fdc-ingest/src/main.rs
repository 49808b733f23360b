//! FDC Ingest - FoodData Central SQLite database builder

use clap::Parser;
use fdc_common::logging::{init_logging, LogConfig, LogLevel};
use fdc_ingest::{pipeline, Cli};
use std::process;
use tracing::{error, info, warn};

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let log_config = LogConfig::builder().level(log_level).build();

    // Environment variables take precedence over flags
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // The build still runs without logging; progress is just not shown
    let _ = init_logging(&log_config);

    let config = cli.build_config();

    match pipeline::run(&config) {
        Ok(report) => {
            println!("{}", report.verification);

            for source in report.missing_sources() {
                warn!("Source file was missing: {}", source);
            }
            info!("✓ Database build completed successfully!");
            info!("✓ Output: {}", config.database);
        },
        Err(e) => {
            error!(error = %e, "Database build failed");
            eprintln!("\n✗ Error: {}", e);
            process::exit(1);
        },
    }
}
