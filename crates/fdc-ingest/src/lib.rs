//! FDC Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Builds a SQLite database from a USDA FoodData Central CSV export.
//!
//! # Tables
//!
//! - **food**: one row per food, keyed by `fdc_id`
//! - **branded_food**: barcode, brand and ingredients for branded foods
//! - **nutrient**: nutrient names and units
//! - **food_nutrient**: nutrient amounts per food
//! - **food_portion**: serving sizes with gram weights
//!
//! Every run rebuilds the database from scratch: drop and create the schema,
//! stream each CSV into batched `INSERT OR IGNORE` writes, add lookup
//! indexes, then run diagnostic queries. Smaller offline bundles can be cut
//! from the finished database.
//!
//! # Example
//!
//! ```no_run
//! use fdc_ingest::{pipeline, BuildConfig};
//!
//! fn main() -> fdc_ingest::Result<()> {
//!     let config = BuildConfig::builder()
//!         .source_dir("./USDA/FOODS")
//!         .database_path("./usda.sqlite")
//!         .build();
//!
//!     let report = pipeline::run(&config)?;
//!     println!("{}", report.verification);
//!     Ok(())
//! }
//! ```

pub mod bundle;
pub mod config;
pub mod database;
pub mod error;
pub mod importer;
pub mod indexes;
pub mod jobs;
pub mod pipeline;
pub mod progress;
pub mod schema;
pub mod verify;

// Re-export commonly used types
pub use bundle::{BundleSpec, BundleSummary, FoodSelector};
pub use config::{BuildConfig, DatabaseLocation, Durability};
pub use error::{IngestError, Result};
pub use importer::{ImportSummary, SkipReason, SkippedRow};
pub use jobs::{usda_jobs, ColumnMapping, ImportJob};
pub use pipeline::{BuildReport, Stage};
pub use verify::VerificationReport;

use clap::Parser;
use std::path::PathBuf;

/// Build a SQLite database from a USDA FoodData Central CSV export
#[derive(Parser, Debug)]
#[command(name = "fdc-ingest")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory containing food.csv, branded_food.csv, nutrient.csv,
    /// food_nutrient.csv and food_portion.csv
    #[arg(short, long, env = "FDC_SOURCE_DIR", default_value = config::DEFAULT_SOURCE_DIR)]
    pub source_dir: PathBuf,

    /// Output database file (replaced if it exists)
    #[arg(short, long, env = "FDC_OUTPUT", default_value = config::DEFAULT_DATABASE_PATH)]
    pub output: PathBuf,

    /// Rows per insert batch
    #[arg(long, default_value_t = config::DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Rows read between commits
    #[arg(long, default_value_t = config::DEFAULT_COMMIT_EVERY)]
    pub commit_every: u64,

    /// Use a rollback journal with synchronous=FULL instead of WAL/NORMAL
    #[arg(long)]
    pub safe_durability: bool,

    /// Substring for the verification search
    #[arg(long, default_value = config::DEFAULT_SEARCH_TERM)]
    pub search_term: String,

    /// Also write the core, proteins, dairy and test-sample bundles here
    #[arg(long, env = "FDC_BUNDLE_DIR")]
    pub bundle_dir: Option<PathBuf>,

    /// Show a progress spinner while importing
    #[arg(long)]
    pub progress: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Translate command-line flags into a build configuration
    pub fn build_config(&self) -> BuildConfig {
        let durability = if self.safe_durability {
            Durability::Safe
        } else {
            Durability::Fast
        };

        let builder = BuildConfig::builder()
            .source_dir(&self.source_dir)
            .database_path(&self.output)
            .batch_size(self.batch_size)
            .commit_every(self.commit_every)
            .durability(durability)
            .search_term(&self.search_term)
            .show_progress(self.progress);

        match &self.bundle_dir {
            Some(dir) => builder.bundle_dir(dir).build(),
            None => builder.build(),
        }
    }
}
