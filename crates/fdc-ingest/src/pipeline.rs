//! Build pipeline orchestration
//!
//! The build is a fixed forward sequence:
//!
//! 1. Remove the previous database file and open a fresh connection
//! 2. Drop and create the schema
//! 3. Import each source file, in job order
//! 4. Create the lookup indexes
//! 5. Run the verification queries
//! 6. Optionally cut the offline bundles from the closed database
//!
//! Each stage commits before the next starts. There are no retries; the first
//! fatal error aborts the build and is reported with the stage it happened
//! in. The connection is dropped on every exit path.

use crate::bundle::{write_bundles, BundleSummary};
use crate::config::BuildConfig;
use crate::database;
use crate::error::{IngestError, Result};
use crate::importer::{import_csv, ImportSummary};
use crate::indexes::create_indexes;
use crate::schema::create_schema;
use crate::verify::{verify, VerificationReport};
use fdc_common::format_count;
use rusqlite::Connection;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::info;

/// Step of the build in progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    /// Preparing the output file and opening the connection
    Init,
    /// Dropping and creating tables
    Schema,
    /// Loading one source into the named table
    Importing(String),
    /// Creating secondary indexes
    Indexing,
    /// Running diagnostics
    Verifying,
    /// Writing offline bundles
    Bundling,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Init => write!(f, "initialization"),
            Stage::Schema => write!(f, "schema creation"),
            Stage::Importing(table) => write!(f, "import of {}", table),
            Stage::Indexing => write!(f, "index creation"),
            Stage::Verifying => write!(f, "verification"),
            Stage::Bundling => write!(f, "bundle extraction"),
        }
    }
}

/// Outcome of a completed build
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// One summary per import job, in job order
    pub imports: Vec<ImportSummary>,
    pub verification: VerificationReport,
    /// Offline bundles; empty unless a bundle directory was configured
    pub bundles: Vec<BundleSummary>,
    pub elapsed: Duration,
}

impl BuildReport {
    /// Import summary for `table`
    pub fn import(&self, table: &str) -> Option<&ImportSummary> {
        self.imports.iter().find(|s| s.table == table)
    }

    pub fn total_rows_read(&self) -> u64 {
        self.imports.iter().map(|s| s.rows_read).sum()
    }

    pub fn total_rows_skipped(&self) -> u64 {
        self.imports.iter().map(|s| s.rows_skipped).sum()
    }

    /// Source files that were not present
    pub fn missing_sources(&self) -> Vec<&str> {
        self.imports
            .iter()
            .filter(|s| s.missing)
            .map(|s| s.source_file.as_str())
            .collect()
    }
}

/// Build the database described by `config` from scratch
pub fn run(config: &BuildConfig) -> Result<BuildReport> {
    config.validate()?;

    let mut conn = open_fresh(config).map_err(|e| IngestError::aborted(Stage::Init, e))?;
    let report = run_on(&mut conn, config);

    // The connection closes here whether or not the build succeeded
    drop(conn);
    let mut report = report?;

    if let (Some(dir), Some(source)) = (&config.bundle_dir, config.database.path()) {
        banner("CREATING OFFLINE BUNDLES");
        report.bundles = write_bundles(source, dir, config)
            .map_err(|e| IngestError::aborted(Stage::Bundling, e))?;
    }

    Ok(report)
}

fn open_fresh(config: &BuildConfig) -> Result<Connection> {
    if let Some(path) = config.database.path() {
        database::prepare_output(path)?;
    }
    database::open(config)
}

/// Run schema, import, index, and verify stages on an open connection
///
/// The connection gets the same pragmas as one from [`database::open`], so
/// foreign keys are off even if the caller's SQLite enables them by default.
pub fn run_on(conn: &mut Connection, config: &BuildConfig) -> Result<BuildReport> {
    config.validate()?;
    let started = Instant::now();

    database::configure_connection(conn, config.durability)
        .map_err(|e| IngestError::aborted(Stage::Init, e))?;

    banner("FOODDATA CENTRAL SQLITE DATABASE BUILDER");
    info!("Source directory: {}", config.source_dir.display());
    info!("Output database: {}", config.database);

    create_schema(conn).map_err(|e| IngestError::aborted(Stage::Schema, e))?;

    banner("IMPORTING CSV FILES");
    let mut imports = Vec::with_capacity(config.jobs.len());
    for job in &config.jobs {
        let summary = import_csv(conn, job, config)
            .map_err(|e| IngestError::aborted(Stage::Importing(job.table.clone()), e))?;
        imports.push(summary);
    }

    banner("CREATING INDEXES");
    create_indexes(conn).map_err(|e| IngestError::aborted(Stage::Indexing, e))?;

    let verification =
        verify(conn, config).map_err(|e| IngestError::aborted(Stage::Verifying, e))?;

    let report = BuildReport {
        imports,
        verification,
        bundles: Vec::new(),
        elapsed: started.elapsed(),
    };
    info!(
        rows_read = report.total_rows_read(),
        rows_skipped = report.total_rows_skipped(),
        "Build finished: {} rows read in {:.1}s",
        format_count(report.total_rows_read()),
        report.elapsed.as_secs_f64()
    );

    Ok(report)
}

fn banner(title: &str) {
    let rule = "=".repeat(60);
    info!("{}", rule);
    info!("{}", title);
    info!("{}", rule);
}
