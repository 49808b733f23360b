//! Build configuration
//!
//! One [`BuildConfig`] is constructed at startup and passed by reference to
//! every stage. Tests swap in an in-memory database and small batch sizes.

use crate::error::{IngestError, Result};
use crate::jobs::{usda_jobs, ImportJob};
use std::path::{Path, PathBuf};

// ============================================================================
// Build Configuration Constants
// ============================================================================

/// Directory holding the FoodData Central CSV export
pub const DEFAULT_SOURCE_DIR: &str = "USDA/FOODS";

/// Output database file
pub const DEFAULT_DATABASE_PATH: &str = "usda.sqlite";

/// Rows per insert-or-ignore batch
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Source rows between explicit commits
pub const DEFAULT_COMMIT_EVERY: u64 = 100_000;

/// Substring searched for by the verifier
pub const DEFAULT_SEARCH_TERM: &str = "chicken";

/// Row limit for verifier samples
pub const DEFAULT_SAMPLE_LIMIT: usize = 5;

/// Where the database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    /// On-disk database; any existing file is replaced
    File(PathBuf),
    /// Private in-memory database, gone when the connection closes
    InMemory,
}

impl DatabaseLocation {
    /// Path of the database file, if on disk
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path),
            Self::InMemory => None,
        }
    }
}

impl std::fmt::Display for DatabaseLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::InMemory => write!(f, ":memory:"),
        }
    }
}

/// Journal and sync settings applied when the database is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Durability {
    /// `journal_mode=WAL`, `synchronous=NORMAL`; trades crash safety for speed
    #[default]
    Fast,
    /// `journal_mode=DELETE`, `synchronous=FULL`
    Safe,
}

impl Durability {
    pub fn journal_mode(self) -> &'static str {
        match self {
            Self::Fast => "WAL",
            Self::Safe => "DELETE",
        }
    }

    pub fn synchronous(self) -> &'static str {
        match self {
            Self::Fast => "NORMAL",
            Self::Safe => "FULL",
        }
    }
}

/// Configuration for one database build
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Directory containing the source CSV files
    pub source_dir: PathBuf,

    /// Output database
    pub database: DatabaseLocation,

    /// Import jobs, run in order
    pub jobs: Vec<ImportJob>,

    /// Rows buffered before an insert batch is written
    pub batch_size: usize,

    /// Rows read between commits
    pub commit_every: u64,

    /// Journal/sync pragmas
    pub durability: Durability,

    /// Substring for the description search diagnostic
    pub search_term: String,

    /// Row limit for the sample diagnostics
    pub sample_limit: usize,

    /// Draw a progress spinner while importing
    pub show_progress: bool,

    /// Write the offline bundles here after a successful build
    pub bundle_dir: Option<PathBuf>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from(DEFAULT_SOURCE_DIR),
            database: DatabaseLocation::File(PathBuf::from(DEFAULT_DATABASE_PATH)),
            jobs: usda_jobs(),
            batch_size: DEFAULT_BATCH_SIZE,
            commit_every: DEFAULT_COMMIT_EVERY,
            durability: Durability::Fast,
            search_term: DEFAULT_SEARCH_TERM.to_string(),
            sample_limit: DEFAULT_SAMPLE_LIMIT,
            show_progress: false,
            bundle_dir: None,
        }
    }
}

impl BuildConfig {
    /// Create a builder for fluent configuration
    pub fn builder() -> BuildConfigBuilder {
        BuildConfigBuilder::default()
    }

    /// Full path of a source file inside `source_dir`
    pub fn source_path(&self, file: &str) -> PathBuf {
        self.source_dir.join(file)
    }

    /// Reject settings that would stall or corrupt the import loop
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(IngestError::config("batch size must be at least 1"));
        }
        if self.commit_every == 0 {
            return Err(IngestError::config("commit interval must be at least 1 row"));
        }
        if self.jobs.is_empty() {
            return Err(IngestError::config("no import jobs configured"));
        }
        if self.bundle_dir.is_some() && self.database.path().is_none() {
            return Err(IngestError::config(
                "offline bundles require an on-disk database",
            ));
        }
        for job in &self.jobs {
            if job.columns.is_empty() {
                return Err(IngestError::config(format!(
                    "import job for table '{}' has no columns",
                    job.table
                )));
            }
        }
        Ok(())
    }
}

/// Builder for BuildConfig
#[derive(Default)]
pub struct BuildConfigBuilder {
    config: BuildConfig,
}

impl BuildConfigBuilder {
    pub fn source_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.source_dir = dir.into();
        self
    }

    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.database = DatabaseLocation::File(path.into());
        self
    }

    pub fn in_memory(mut self) -> Self {
        self.config.database = DatabaseLocation::InMemory;
        self
    }

    pub fn jobs(mut self, jobs: Vec<ImportJob>) -> Self {
        self.config.jobs = jobs;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    pub fn commit_every(mut self, rows: u64) -> Self {
        self.config.commit_every = rows;
        self
    }

    pub fn durability(mut self, durability: Durability) -> Self {
        self.config.durability = durability;
        self
    }

    pub fn search_term(mut self, term: impl Into<String>) -> Self {
        self.config.search_term = term.into();
        self
    }

    pub fn sample_limit(mut self, limit: usize) -> Self {
        self.config.sample_limit = limit;
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.config.show_progress = show;
        self
    }

    pub fn bundle_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.bundle_dir = Some(dir.into());
        self
    }

    pub fn build(self) -> BuildConfig {
        self.config
    }
}
