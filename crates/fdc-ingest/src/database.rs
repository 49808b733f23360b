//! SQLite connection lifecycle

use crate::config::{BuildConfig, DatabaseLocation, Durability};
use crate::error::Result;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Delete an existing database file and its WAL sidecars
///
/// Returns `true` if a previous database was removed. There is no backup.
pub fn prepare_output(path: &Path) -> Result<bool> {
    let removed = remove_if_exists(path)?;
    for sidecar in sidecar_paths(path) {
        remove_if_exists(&sidecar)?;
    }

    if removed {
        info!("Removed existing database: {}", path.display());
    }
    Ok(removed)
}

/// Open the build database and apply connection pragmas
pub fn open(config: &BuildConfig) -> Result<Connection> {
    open_at(&config.database, config.durability)
}

/// Open a database at `location` and apply connection pragmas
///
/// Foreign keys are declared by the schema but never enforced.
pub fn open_at(location: &DatabaseLocation, durability: Durability) -> Result<Connection> {
    let conn = match location {
        DatabaseLocation::File(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            Connection::open(path)?
        },
        DatabaseLocation::InMemory => Connection::open_in_memory()?,
    };

    configure_connection(&conn, durability)?;
    Ok(conn)
}

/// Apply journal, sync and foreign key pragmas to an open connection
///
/// Must run outside a transaction; SQLite ignores `foreign_keys` inside one.
pub fn configure_connection(conn: &Connection, durability: Durability) -> Result<()> {
    // In-memory databases report journal_mode=memory regardless of the request
    let mode: String = conn.query_row(
        &format!("PRAGMA journal_mode = {}", durability.journal_mode()),
        [],
        |row| row.get(0),
    )?;
    conn.pragma_update(None, "synchronous", durability.synchronous())?;
    conn.pragma_update(None, "foreign_keys", "OFF")?;

    debug!(
        journal_mode = %mode,
        synchronous = durability.synchronous(),
        "Configured database connection"
    );
    Ok(())
}

/// Bytes on disk for the database file plus any pending WAL
///
/// `None` for in-memory builds.
pub fn database_size(config: &BuildConfig) -> Result<Option<u64>> {
    let Some(path) = config.database.path() else {
        return Ok(None);
    };

    file_size(path).map(Some)
}

/// Size of a database file plus its WAL, if one is present
pub fn file_size(path: &Path) -> Result<u64> {
    let mut size = std::fs::metadata(path)?.len();
    let [wal, _] = sidecar_paths(path);
    match std::fs::metadata(&wal) {
        Ok(meta) => size += meta.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
        Err(e) => return Err(e.into()),
    }
    Ok(size)
}

fn sidecar_paths(path: &Path) -> [PathBuf; 2] {
    let with_suffix = |suffix: &str| {
        let mut name = path.as_os_str().to_os_string();
        name.push(suffix);
        PathBuf::from(name)
    };
    [with_suffix("-wal"), with_suffix("-shm")]
}

fn remove_if_exists(path: &Path) -> Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
