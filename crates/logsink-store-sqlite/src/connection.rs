// crates/logsink-store-sqlite/src/connection.rs
// ============================================================================
// Module: SQLite Sink Connections
// Description: Per-operation connection factory.
// Purpose: Open a handle with the sink's pragmas applied.
// Dependencies: rusqlite
// ============================================================================

//! ## Overview
//! Every write and purge opens its own connection and closes it when done.
//! Connections are never pooled or shared across threads. Each handle carries
//! the page geometry that turns the configured size limit into an engine
//! "store full" error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;
use rusqlite::OpenFlags;

use crate::config::MAX_PAGE_SIZE;
use crate::config::SqliteSinkConfig;
use crate::error::SqliteSinkError;

// ============================================================================
// SECTION: Connection Factory
// ============================================================================

/// Opens a read-write connection to the active store, creating it if needed.
///
/// # Errors
///
/// Returns [`SqliteSinkError`] when the store cannot be opened or the pragmas
/// cannot be applied.
pub fn open_connection(config: &SqliteSinkConfig) -> Result<Connection, SqliteSinkError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteSinkError::from_db(&err))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies page geometry, journaling, and busy-timeout settings.
fn apply_pragmas(connection: &Connection, config: &SqliteSinkConfig) -> Result<(), SqliteSinkError> {
    let pragmas = format!(
        "PRAGMA page_size = {MAX_PAGE_SIZE}; PRAGMA max_page_count = {}; PRAGMA journal_mode = \
         MEMORY; PRAGMA synchronous = NORMAL;",
        config.max_page_count()
    );
    connection.execute_batch(&pragmas).map_err(|err| SqliteSinkError::from_db(&err))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteSinkError::from_db(&err))?;
    Ok(())
}

/// Ensures the parent directory for the store path exists.
///
/// # Errors
///
/// Returns [`SqliteSinkError::Io`] when the directory cannot be created.
pub fn ensure_parent_dir(path: &Path) -> Result<(), SqliteSinkError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|err| SqliteSinkError::Io(err.to_string()))?;
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use super::ensure_parent_dir;
    use super::open_connection;
    use crate::config::SqliteSinkConfig;

    #[test]
    fn pragmas_bound_the_store_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SqliteSinkConfig::new(dir.path().join("logs.db"));
        config.max_store_size_mb = 2;
        let connection = open_connection(&config).unwrap();
        let page_size: i64 = connection.query_row("PRAGMA page_size", [], |row| row.get(0)).unwrap();
        let max_pages: i64 =
            connection.query_row("PRAGMA max_page_count", [], |row| row.get(0)).unwrap();
        let journal: String =
            connection.query_row("PRAGMA journal_mode", [], |row| row.get(0)).unwrap();
        assert_eq!(page_size, 65_536);
        assert_eq!(max_pages, 32);
        assert_eq!(journal, "memory");
    }

    #[test]
    fn unvalidated_size_limit_is_capped() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SqliteSinkConfig::new(dir.path().join("logs.db"));
        config.max_store_size_mb = u64::MAX;
        let connection = open_connection(&config).unwrap();
        let max_pages: i64 =
            connection.query_row("PRAGMA max_page_count", [], |row| row.get(0)).unwrap();
        assert_eq!(max_pages, 5_242_880);
    }

    #[test]
    fn parent_directories_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("logs.db");
        ensure_parent_dir(&path).unwrap();
        assert!(path.parent().unwrap().is_dir());
    }
}
