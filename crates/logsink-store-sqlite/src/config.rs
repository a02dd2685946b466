// crates/logsink-store-sqlite/src/config.rs
// ============================================================================
// Module: SQLite Sink Config
// Description: Immutable sink configuration and derived retention policy.
// Purpose: Validate store, schema, capacity, and retention settings up front.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`SqliteSinkConfig`] is fixed at sink construction. Everything that can be
//! wrong with it is rejected by [`SqliteSinkConfig::validate`] before any
//! store is touched, so the steady-state write path never encounters a
//! configuration error.
//! Invariants:
//! - `max_store_size_mb` is in `1 ..= MAX_STORE_SIZE_MB`.
//! - Retention is either fully disabled or fully enabled with floored values.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::SqliteSinkError;
use crate::schema::LogSchema;
use crate::schema::is_identifier;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Bytes in one configured megabyte.
pub const BYTES_PER_MB: u64 = 1_048_576;
/// Page size applied to every store (the engine maximum).
pub const MAX_PAGE_SIZE: u64 = 65_536;
/// Absolute page-count ceiling for a store.
pub const MAX_PAGE_COUNT: u64 = 5_242_880;
/// Largest accepted `max_store_size_mb`.
pub const MAX_STORE_SIZE_MB: u64 = MAX_PAGE_SIZE * MAX_PAGE_COUNT / BYTES_PER_MB;
/// Default `max_store_size_mb`.
pub const DEFAULT_MAX_STORE_SIZE_MB: u64 = 10_000;
/// Default table name.
pub const DEFAULT_TABLE_NAME: &str = "Logs";
/// Smallest retention period; shorter requests are raised to it.
pub const MIN_RETENTION_PERIOD: Duration = Duration::from_secs(30 * 60);
/// Retention check granularity; intervals are floored to a multiple of it.
pub const RETENTION_CHECK_STEP: Duration = Duration::from_secs(15 * 60);
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// One configured column: name plus SQL type declaration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColumnConfig {
    /// Column name.
    pub name: String,
    /// SQL type declaration, e.g. `TEXT` or `VARCHAR(10)`.
    #[serde(rename = "type")]
    pub sql_type: String,
}

impl ColumnConfig {
    /// Creates a column entry.
    #[must_use]
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
        }
    }
}

/// Configuration for the SQLite log sink.
///
/// # Invariants
/// - `path` identifies a file (not a directory); archives are created beside it.
/// - `table_name` and column names are plain SQL identifiers.
/// - `columns`, when set, is non-empty and its order is the persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SqliteSinkConfig {
    /// Path to the active store file.
    pub path: PathBuf,
    /// Table receiving log rows.
    #[serde(default = "default_table_name")]
    pub table_name: String,
    /// Ordered column layout; `None` selects the default five columns.
    #[serde(default)]
    pub columns: Option<Vec<ColumnConfig>>,
    /// Convert timestamps to UTC before persisting and when computing
    /// retention cutoffs.
    #[serde(default)]
    pub store_timestamp_in_utc: bool,
    /// Maximum store size in megabytes.
    #[serde(default = "default_max_store_size_mb")]
    pub max_store_size_mb: u64,
    /// Archive and empty the store when it fills up instead of dropping
    /// batches.
    #[serde(default = "default_allow_rollover")]
    pub allow_rollover: bool,
    /// Requested retention period in seconds; `None` disables retention.
    #[serde(default)]
    pub retention_period_secs: Option<u64>,
    /// Requested retention check interval in seconds.
    #[serde(default)]
    pub retention_check_interval_secs: Option<u64>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

/// Returns the default table name.
fn default_table_name() -> String {
    DEFAULT_TABLE_NAME.to_string()
}

/// Returns the default maximum store size.
const fn default_max_store_size_mb() -> u64 {
    DEFAULT_MAX_STORE_SIZE_MB
}

/// Returns the default rollover setting.
const fn default_allow_rollover() -> bool {
    true
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

impl SqliteSinkConfig {
    /// Creates a config for `path` with every other option at its default.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            table_name: default_table_name(),
            columns: None,
            store_timestamp_in_utc: false,
            max_store_size_mb: DEFAULT_MAX_STORE_SIZE_MB,
            allow_rollover: true,
            retention_period_secs: None,
            retention_check_interval_secs: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSinkError::Config`] when the path, table name, schema,
    /// size limit, or retention settings are invalid.
    pub fn validate(&self) -> Result<(), SqliteSinkError> {
        validate_store_path(&self.path)?;
        if !is_identifier(&self.table_name) {
            return Err(SqliteSinkError::Config(format!(
                "table_name is not a plain identifier: {:?}",
                self.table_name
            )));
        }
        if self.max_store_size_mb == 0 || self.max_store_size_mb > MAX_STORE_SIZE_MB {
            return Err(SqliteSinkError::Config(format!(
                "max_store_size_mb out of range: {} (max {MAX_STORE_SIZE_MB})",
                self.max_store_size_mb
            )));
        }
        let schema = self.schema()?;
        if self.retention_policy().is_some() && schema.timestamp_column().is_none() {
            return Err(SqliteSinkError::Config(
                "retention requires a Timestamp column in the schema".to_string(),
            ));
        }
        Ok(())
    }

    /// Builds the column schema (configured or default).
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSinkError::Config`] when the configured columns are
    /// invalid.
    pub fn schema(&self) -> Result<LogSchema, SqliteSinkError> {
        match &self.columns {
            None => Ok(LogSchema::default()),
            Some(columns) => LogSchema::new(
                columns.iter().map(|column| (column.name.clone(), column.sql_type.clone())),
            ),
        }
    }

    /// Returns the maximum page count enforced on every connection.
    ///
    /// Never exceeds [`MAX_PAGE_COUNT`], even before validation.
    #[must_use]
    pub const fn max_page_count(&self) -> u64 {
        let pages = self.max_store_size_mb.saturating_mul(BYTES_PER_MB) / MAX_PAGE_SIZE;
        if pages > MAX_PAGE_COUNT { MAX_PAGE_COUNT } else { pages }
    }

    /// Returns the effective retention policy, if retention is enabled.
    #[must_use]
    pub fn retention_policy(&self) -> Option<RetentionPolicy> {
        RetentionPolicy::from_requested(
            self.retention_period_secs.map(Duration::from_secs),
            self.retention_check_interval_secs.map(Duration::from_secs),
        )
    }
}

// ============================================================================
// SECTION: Retention Policy
// ============================================================================

/// Effective retention settings derived from the requested values.
///
/// # Invariants
/// - `period >= MIN_RETENTION_PERIOD`.
/// - `check_interval >= RETENTION_CHECK_STEP` and is a whole multiple of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Rows older than `now - period` are purged.
    pub period: Duration,
    /// Delay between purge ticks.
    pub check_interval: Duration,
}

impl RetentionPolicy {
    /// Derives the policy from requested values.
    ///
    /// Returns `None` when no period was requested. A missing interval uses
    /// [`RETENTION_CHECK_STEP`].
    #[must_use]
    pub fn from_requested(period: Option<Duration>, check_interval: Option<Duration>) -> Option<Self> {
        let period = period?.max(MIN_RETENTION_PERIOD);
        let requested = check_interval.unwrap_or(RETENTION_CHECK_STEP).max(RETENTION_CHECK_STEP);
        let step = RETENTION_CHECK_STEP.as_secs();
        let check_interval = Duration::from_secs(requested.as_secs() / step * step);
        Some(Self {
            period,
            check_interval,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteSinkError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteSinkError::Config("store path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteSinkError::Config("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteSinkError::Config(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.file_name().is_none() || path.is_dir() {
        return Err(SqliteSinkError::Config(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::MAX_PAGE_COUNT;
    use super::MAX_STORE_SIZE_MB;
    use super::RetentionPolicy;
    use super::SqliteSinkConfig;
    use crate::error::SqliteSinkError;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn ceiling_matches_page_geometry() {
        assert_eq!(MAX_STORE_SIZE_MB, 327_680);
        let mut config = SqliteSinkConfig::new("/tmp/logs.db");
        config.max_store_size_mb = 1;
        assert_eq!(config.max_page_count(), 16);
        config.max_store_size_mb = MAX_STORE_SIZE_MB;
        assert_eq!(config.max_page_count(), 5_242_880);
    }

    #[test]
    fn page_count_is_capped_for_unvalidated_sizes() {
        let mut config = SqliteSinkConfig::new("/tmp/logs.db");
        config.max_store_size_mb = MAX_STORE_SIZE_MB + 1;
        assert_eq!(config.max_page_count(), MAX_PAGE_COUNT);
        config.max_store_size_mb = u64::MAX;
        assert_eq!(config.max_page_count(), MAX_PAGE_COUNT);
        assert!(config.validate().is_err());
    }

    #[test]
    fn short_retention_period_is_raised() {
        let policy = RetentionPolicy::from_requested(Some(5 * MINUTE), None);
        assert_eq!(
            policy,
            Some(RetentionPolicy {
                period: 30 * MINUTE,
                check_interval: 15 * MINUTE,
            })
        );
    }

    #[test]
    fn check_interval_rounds_down_to_quarter_hours() {
        let policy = RetentionPolicy::from_requested(Some(60 * MINUTE), Some(40 * MINUTE));
        assert_eq!(policy.map(|policy| policy.check_interval), Some(30 * MINUTE));
        let policy = RetentionPolicy::from_requested(Some(60 * MINUTE), Some(MINUTE));
        assert_eq!(policy.map(|policy| policy.check_interval), Some(15 * MINUTE));
        let policy = RetentionPolicy::from_requested(Some(60 * MINUTE), Some(45 * MINUTE));
        assert_eq!(policy.map(|policy| policy.check_interval), Some(45 * MINUTE));
    }

    #[test]
    fn interval_without_period_disables_retention() {
        assert_eq!(RetentionPolicy::from_requested(None, Some(30 * MINUTE)), None);
    }

    #[test]
    fn table_name_must_be_identifier() {
        let mut config = SqliteSinkConfig::new("/tmp/logs.db");
        config.table_name = "Logs; DROP TABLE x".to_string();
        assert!(matches!(config.validate(), Err(SqliteSinkError::Config(_))));
    }

    #[test]
    fn retention_without_timestamp_column_is_rejected() {
        let mut config = SqliteSinkConfig::new("/tmp/logs.db");
        config.columns = Some(vec![super::ColumnConfig::new("Message", "TEXT")]);
        config.retention_period_secs = Some(3_600);
        assert!(matches!(config.validate(), Err(SqliteSinkError::Config(_))));
        config.columns = Some(vec![super::ColumnConfig::new("RenderedMessage", "TEXT")]);
        config.retention_period_secs = None;
        assert_eq!(config.validate(), Ok(()));
    }
}
