// crates/logsink-store-sqlite/src/schema.rs
// ============================================================================
// Module: SQLite Sink Schema
// Description: Column layout, value sources, and the insert template.
// Purpose: Resolve how each column is filled once, at construction time.
// Dependencies: rusqlite
// ============================================================================

//! ## Overview
//! A [`LogSchema`] is the ordered column list of the log table. Each column
//! is bound to a [`ColumnSource`] when the schema is built: the five
//! well-known names map to record fields and anything else reads the
//! same-named event property. The write path dispatches on the resolved
//! source and never compares column names again.
//! Invariants:
//! - Column names are plain identifiers, unique case-insensitively.
//! - The insert template binds exactly one parameter per column, in order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rusqlite::Connection;

use crate::error::SqliteSinkError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Marker prefixed to column names to form insert parameter names.
pub const PARAMETER_MARKER: char = '@';

/// Default column layout.
const DEFAULT_COLUMNS: [(&str, &str); 5] = [
    ("Timestamp", "TEXT"),
    ("Level", "VARCHAR(10)"),
    ("Exception", "TEXT"),
    ("RenderedMessage", "TEXT"),
    ("Properties", "TEXT"),
];

// ============================================================================
// SECTION: Types
// ============================================================================

/// Where a column's value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSource {
    /// Event timestamp in the persisted layout.
    Timestamp,
    /// Level name.
    Level,
    /// Exception text, or empty.
    Exception,
    /// Rendered message.
    RenderedMessage,
    /// JSON object of all properties, or empty.
    Properties,
    /// Text form of the named property, or NULL when absent.
    Property(String),
}

impl ColumnSource {
    /// Resolves the source for a column name (case-insensitive).
    #[must_use]
    pub fn for_column(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "timestamp" => Self::Timestamp,
            "level" => Self::Level,
            "exception" => Self::Exception,
            "renderedmessage" => Self::RenderedMessage,
            "properties" => Self::Properties,
            _ => Self::Property(name.to_string()),
        }
    }
}

/// One resolved column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaColumn {
    /// Column name as declared.
    pub name: String,
    /// SQL type declaration.
    pub sql_type: String,
    /// Value source.
    pub source: ColumnSource,
}

/// Ordered, validated column layout of the log table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSchema {
    /// Columns in persisted order.
    columns: Vec<SchemaColumn>,
}

/// Parameterized insert statement derived from a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertTemplate {
    /// Statement text.
    sql: String,
    /// Parameter names in column order.
    parameters: Vec<String>,
}

impl InsertTemplate {
    /// Returns the statement text.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Returns parameter names in column order.
    #[must_use]
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }
}

// ============================================================================
// SECTION: Schema
// ============================================================================

impl LogSchema {
    /// Builds a schema from `(name, sql_type)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSinkError::Config`] when the list is empty, a name is
    /// not a plain identifier, names collide case-insensitively, or a type
    /// declaration is empty or contains a statement separator.
    pub fn new<I, N, T>(columns: I) -> Result<Self, SqliteSinkError>
    where
        I: IntoIterator<Item = (N, T)>,
        N: Into<String>,
        T: Into<String>,
    {
        let mut resolved: Vec<SchemaColumn> = Vec::new();
        for (name, sql_type) in columns {
            let name = name.into();
            let sql_type = sql_type.into().trim().to_string();
            if !is_identifier(&name) {
                return Err(SqliteSinkError::Config(format!(
                    "column name is not a plain identifier: {name:?}"
                )));
            }
            if sql_type.is_empty() || sql_type.contains(';') {
                return Err(SqliteSinkError::Config(format!(
                    "invalid type declaration for column {name}"
                )));
            }
            if resolved.iter().any(|column| column.name.eq_ignore_ascii_case(&name)) {
                return Err(SqliteSinkError::Config(format!("duplicate column name: {name}")));
            }
            let source = ColumnSource::for_column(&name);
            resolved.push(SchemaColumn {
                name,
                sql_type,
                source,
            });
        }
        if resolved.is_empty() {
            return Err(SqliteSinkError::Config("at least one column is required".to_string()));
        }
        Ok(Self {
            columns: resolved,
        })
    }

    /// Returns the columns in persisted order.
    #[must_use]
    pub fn columns(&self) -> &[SchemaColumn] {
        &self.columns
    }

    /// Returns the name of the first timestamp-sourced column.
    #[must_use]
    pub fn timestamp_column(&self) -> Option<&str> {
        self.columns
            .iter()
            .find(|column| column.source == ColumnSource::Timestamp)
            .map(|column| column.name.as_str())
    }

    /// Returns the idempotent `CREATE TABLE` statement for `table`.
    #[must_use]
    pub fn create_table_sql(&self, table: &str) -> String {
        let columns = self
            .columns
            .iter()
            .map(|column| format!("{} {}", column.name, column.sql_type))
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE IF NOT EXISTS {table} ({columns})")
    }

    /// Creates `table` when it does not exist. Existing rows are untouched.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSinkError`] when the statement fails.
    pub fn ensure_table(&self, connection: &Connection, table: &str) -> Result<(), SqliteSinkError> {
        connection
            .execute_batch(&self.create_table_sql(table))
            .map_err(|err| SqliteSinkError::from_db(&err))
    }

    /// Builds the insert template for `table`.
    #[must_use]
    pub fn build_insert_template(&self, table: &str) -> InsertTemplate {
        let names = self.columns.iter().map(|column| column.name.as_str()).collect::<Vec<_>>();
        let parameters =
            names.iter().map(|name| format!("{PARAMETER_MARKER}{name}")).collect::<Vec<_>>();
        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            names.join(", "),
            parameters.join(", ")
        );
        InsertTemplate {
            sql,
            parameters,
        }
    }
}

impl Default for LogSchema {
    fn default() -> Self {
        Self {
            columns: DEFAULT_COLUMNS
                .iter()
                .map(|(name, sql_type)| SchemaColumn {
                    name: (*name).to_string(),
                    sql_type: (*sql_type).to_string(),
                    source: ColumnSource::for_column(name),
                })
                .collect(),
        }
    }
}

/// Returns true when `value` matches `[A-Za-z_][A-Za-z0-9_]*`.
#[must_use]
pub fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

// ============================================================================
// SECTION: Tests
// ============================================================================
