//! Generic batched CSV importer
//!
//! Streams one CSV file record by record, projects the columns named by an
//! [`ImportJob`], and writes them with `INSERT OR IGNORE`. Rows are buffered
//! into batches of `batch_size`; the surrounding transaction is committed
//! whenever a flush crosses a `commit_every` boundary and once at end of file.
//!
//! Import is best effort. A row that cannot be read or that SQLite rejects is
//! recorded as skipped and the import continues. Only I/O failures and
//! database failures unrelated to the row's contents abort the run.

use crate::config::BuildConfig;
use crate::error::Result;
use crate::jobs::ImportJob;
use crate::progress::import_spinner;
use csv::ByteRecord;
use fdc_common::format_count;
use indicatif::ProgressBar;
use rusqlite::{params_from_iter, Connection, ErrorCode, Transaction};
use std::fs::File;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// Skip reasons kept per file; the skip count itself is always exact
pub const MAX_SKIP_DETAILS: usize = 100;

/// Projected values for one row; `None` is written as SQL NULL
pub type RowValues = Vec<Option<String>>;

/// Why a row did not make it into the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The record could not be parsed or lacks a projected field
    Malformed(String),
    /// SQLite refused the values (e.g. non-integer primary key)
    Rejected(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(msg) => write!(f, "malformed record: {}", msg),
            Self::Rejected(msg) => write!(f, "rejected by database: {}", msg),
        }
    }
}

/// A skipped row and its 1-based record number (header excluded)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    pub record: u64,
    pub reason: SkipReason,
}

/// Result of reading one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Imported(RowValues),
    Skipped(SkippedRow),
}

/// Per-file import statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub table: String,
    pub source_file: String,
    /// Source file was absent; nothing was read
    pub missing: bool,
    /// Records read and projected
    pub rows_read: u64,
    /// Rows that created a new table row
    pub rows_inserted: u64,
    /// Rows dropped because their primary key was already present
    pub rows_ignored: u64,
    /// Malformed plus rejected rows
    pub rows_skipped: u64,
    /// First [`MAX_SKIP_DETAILS`] skipped rows
    pub skipped: Vec<SkippedRow>,
    /// Transactions committed, including the one at end of file
    pub commits: u64,
}

impl ImportSummary {
    fn new(job: &ImportJob) -> Self {
        Self {
            table: job.table.clone(),
            source_file: job.source_file.clone(),
            ..Self::default()
        }
    }

    fn record_skip(&mut self, row: SkippedRow) {
        warn!(
            record = row.record,
            "  Warning: Skipping row {} due to error: {}", row.record, row.reason
        );
        self.rows_skipped += 1;
        if self.skipped.len() < MAX_SKIP_DETAILS {
            self.skipped.push(row);
        }
    }
}

/// Import one CSV file into its target table
///
/// A missing source file is not an error: the summary comes back with
/// `missing = true` and zero rows.
#[instrument(skip_all, fields(table = %job.table))]
pub fn import_csv(
    conn: &mut Connection,
    job: &ImportJob,
    config: &BuildConfig,
) -> Result<ImportSummary> {
    let path = config.source_path(&job.source_file);
    let mut summary = ImportSummary::new(job);

    let file = match File::open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("✗ File not found: {}", path.display());
            summary.missing = true;
            return Ok(summary);
        },
        Err(e) => return Err(e.into()),
    };

    info!("Importing {} into {}...", job.source_file, job.table);
    let mut reader = RowReader::new(file, job, &path)?;
    let mut state = LoadState::new(job, config);

    loop {
        let tx = conn.transaction()?;
        let finished = state.load_until_commit(&tx, &mut reader, &mut summary)?;
        tx.commit()?;
        summary.commits += 1;
        debug!(rows_read = summary.rows_read, commits = summary.commits, "Committed");

        if finished {
            break;
        }
    }

    state.progress.finish_and_clear();
    info!(
        "✓ Imported {} rows into {}",
        format_count(summary.rows_read),
        job.table
    );
    if summary.rows_skipped > 0 {
        warn!(
            "  {} rows skipped in {}",
            format_count(summary.rows_skipped),
            job.source_file
        );
    }

    Ok(summary)
}

/// Header-aware record stream over one CSV file
///
/// Single pass: records are pulled one at a time and never revisited.
pub struct RowReader<R> {
    reader: csv::Reader<R>,
    /// Header index for each projected column; `None` if the header lacks it
    positions: Vec<Option<usize>>,
    record: ByteRecord,
    ordinal: u64,
}

impl<R: std::io::Read> RowReader<R> {
    /// Read the header and resolve the job's source columns against it
    pub fn new(source: R, job: &ImportJob, path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(source);

        let headers: Vec<String> = reader
            .byte_headers()?
            .iter()
            .map(|h| {
                String::from_utf8_lossy(h)
                    .trim_start_matches('\u{feff}')
                    .trim()
                    .to_string()
            })
            .collect();

        let positions = job
            .columns
            .iter()
            .map(|column| {
                let position = headers.iter().position(|h| *h == column.source);
                if position.is_none() {
                    warn!(
                        "  Column '{}' not found in {}; '{}' will be NULL",
                        column.source,
                        path.display(),
                        column.target
                    );
                }
                position
            })
            .collect();

        Ok(Self {
            reader,
            positions,
            record: ByteRecord::new(),
            ordinal: 0,
        })
    }

    /// Next record, or `None` at end of file
    pub fn next_row(&mut self) -> Result<Option<(u64, RowOutcome)>> {
        let outcome = match self.reader.read_byte_record(&mut self.record) {
            Ok(false) => return Ok(None),
            Ok(true) => {
                self.ordinal += 1;
                match project(&self.record, &self.positions) {
                    Ok(values) => RowOutcome::Imported(values),
                    Err(reason) => RowOutcome::Skipped(SkippedRow {
                        record: self.ordinal,
                        reason,
                    }),
                }
            },
            Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => return Err(e.into()),
            Err(e) => {
                self.ordinal += 1;
                RowOutcome::Skipped(SkippedRow {
                    record: self.ordinal,
                    reason: SkipReason::Malformed(e.to_string()),
                })
            },
        };

        Ok(Some((self.ordinal, outcome)))
    }
}

/// Pick the projected fields out of a record
///
/// Fields are decoded leniently, trimmed, and empty results become `None`.
/// A record too short to hold a projected field is malformed.
pub fn project(
    record: &ByteRecord,
    positions: &[Option<usize>],
) -> std::result::Result<RowValues, SkipReason> {
    positions
        .iter()
        .map(|position| match position {
            None => Ok(None),
            Some(idx) => match record.get(*idx) {
                Some(raw) => Ok(normalize(raw)),
                None => Err(SkipReason::Malformed(format!(
                    "record has {} fields, expected at least {}",
                    record.len(),
                    idx + 1
                ))),
            },
        })
        .collect()
}

/// Decode, trim, and map empty to `None`
pub fn normalize(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Mutable state carried across commit chunks of one import
struct LoadState {
    sql: String,
    batch: Vec<(u64, RowValues)>,
    batch_size: usize,
    commit_every: u64,
    next_commit: u64,
    progress: ProgressBar,
}

impl LoadState {
    fn new(job: &ImportJob, config: &BuildConfig) -> Self {
        Self {
            sql: job.insert_sql(),
            batch: Vec::with_capacity(config.batch_size),
            batch_size: config.batch_size,
            commit_every: config.commit_every,
            next_commit: config.commit_every,
            progress: import_spinner(&job.table, config.show_progress),
        }
    }

    /// Read and insert rows until a flush crosses the next commit boundary
    ///
    /// Returns `true` once the file is exhausted and the final batch flushed.
    fn load_until_commit<R: std::io::Read>(
        &mut self,
        tx: &Transaction<'_>,
        reader: &mut RowReader<R>,
        summary: &mut ImportSummary,
    ) -> Result<bool> {
        while let Some((ordinal, outcome)) = reader.next_row()? {
            match outcome {
                RowOutcome::Imported(values) => {
                    self.batch.push((ordinal, values));
                    summary.rows_read += 1;
                },
                RowOutcome::Skipped(row) => summary.record_skip(row),
            }

            if self.batch.len() >= self.batch_size {
                self.flush(tx, summary)?;

                if summary.rows_read >= self.next_commit {
                    while self.next_commit <= summary.rows_read {
                        self.next_commit += self.commit_every;
                    }
                    info!("  {} rows processed...", format_count(summary.rows_read));
                    return Ok(false);
                }
            }
        }

        self.flush(tx, summary)?;
        Ok(true)
    }

    fn flush(&mut self, tx: &Transaction<'_>, summary: &mut ImportSummary) -> Result<()> {
        if self.batch.is_empty() {
            return Ok(());
        }

        let mut stmt = tx.prepare_cached(&self.sql)?;
        for (ordinal, values) in self.batch.drain(..) {
            match stmt.execute(params_from_iter(values.iter())) {
                Ok(0) => summary.rows_ignored += 1,
                Ok(_) => summary.rows_inserted += 1,
                Err(e) if is_row_error(&e) => summary.record_skip(SkippedRow {
                    record: ordinal,
                    reason: SkipReason::Rejected(e.to_string()),
                }),
                Err(e) => return Err(e.into()),
            }
        }

        self.progress.set_position(summary.rows_read);
        debug!(rows_read = summary.rows_read, "Flushed batch");
        Ok(())
    }
}

/// Errors caused by a row's values rather than by the database itself
///
/// Only a datatype mismatch qualifies, e.g. a non-integer primary key.
/// `OR IGNORE` resolves primary key, unique, not-null and check conflicts
/// without an error, and foreign keys are off on every build connection, so
/// a constraint failure that still reaches here means the connection was not
/// configured and the import must stop.
fn is_row_error(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::TypeMismatch
    )
}
