//! Error types for the FDC ingest pipeline

use crate::pipeline::Stage;
use thiserror::Error;

/// Result type alias for ingest operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Fatal errors that abort a build
///
/// Per-row problems are not errors: the importer records them as skipped
/// rows and carries on.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Build configuration is unusable
    #[error("Configuration error: {0}")]
    Config(String),

    /// SQLite statement or connection failure
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// CSV source could not be opened or its header could not be read
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// File system operation failed
    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    /// A pipeline stage failed; the build stopped at `stage`
    #[error("Build aborted during {stage}: {source}")]
    Aborted {
        stage: Stage,
        #[source]
        source: Box<IngestError>,
    },
}

impl IngestError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Wrap an error with the pipeline stage it occurred in
    pub fn aborted(stage: Stage, source: IngestError) -> Self {
        match source {
            already @ Self::Aborted { .. } => already,
            other => Self::Aborted {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Stage the build stopped at, if known
    pub fn stage(&self) -> Option<&Stage> {
        match self {
            Self::Aborted { stage, .. } => Some(stage),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aborted_message_names_stage() {
        let err = IngestError::aborted(Stage::Indexing, IngestError::config("bad"));
        assert_eq!(
            err.to_string(),
            "Build aborted during index creation: Configuration error: bad"
        );
        assert_eq!(err.stage(), Some(&Stage::Indexing));
    }

    #[test]
    fn test_aborted_is_not_nested() {
        let inner = IngestError::aborted(Stage::Init, IngestError::config("x"));
        let outer = IngestError::aborted(Stage::Indexing, inner);
        assert_eq!(outer.stage(), Some(&Stage::Init));
    }
}
