// crates/logsink-store-sqlite/src/writer.rs
// ============================================================================
// Module: SQLite Batch Writer
// Description: Transactional all-or-nothing batch inserts.
// Purpose: Resolve column values per record and commit a batch atomically.
// Dependencies: logsink-core, rusqlite
// ============================================================================

//! ## Overview
//! [`insert_batch`] runs one transaction per batch and reuses one prepared
//! statement for every record. Any binding or execution error drops the
//! transaction, which rolls it back, so a batch is never partially committed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use logsink_core::LogEvent;
use rusqlite::Connection;
use rusqlite::params_from_iter;
use rusqlite::types::Value;

use crate::error::SqliteSinkError;
use crate::schema::ColumnSource;
use crate::schema::InsertTemplate;
use crate::schema::LogSchema;

// ============================================================================
// SECTION: Batch Insert
// ============================================================================

/// Inserts every event in one transaction and returns the committed row count.
///
/// # Errors
///
/// Returns [`SqliteSinkError::CapacityExceeded`] when the store is full,
/// [`SqliteSinkError::Invalid`] when a record cannot be converted, and
/// [`SqliteSinkError::Db`] for other engine failures. No rows are committed
/// on error.
pub fn insert_batch(
    connection: &mut Connection,
    schema: &LogSchema,
    template: &InsertTemplate,
    events: &[LogEvent],
    utc: bool,
) -> Result<usize, SqliteSinkError> {
    let tx = connection.transaction().map_err(|err| SqliteSinkError::from_db(&err))?;
    {
        let mut statement =
            tx.prepare_cached(template.sql()).map_err(|err| SqliteSinkError::from_db(&err))?;
        for event in events {
            let values = column_values(schema, event, utc)?;
            statement
                .execute(params_from_iter(values.iter()))
                .map_err(|err| SqliteSinkError::from_db(&err))?;
        }
    }
    tx.commit().map_err(|err| SqliteSinkError::from_db(&err))?;
    Ok(events.len())
}

/// Resolves the values of one record in schema column order.
///
/// # Errors
///
/// Returns [`SqliteSinkError::Invalid`] when the timestamp cannot be
/// formatted or the properties cannot be serialized.
pub fn column_values(
    schema: &LogSchema,
    event: &LogEvent,
    utc: bool,
) -> Result<Vec<Value>, SqliteSinkError> {
    schema.columns().iter().map(|column| column_value(&column.source, event, utc)).collect()
}

/// Resolves a single column value.
fn column_value(source: &ColumnSource, event: &LogEvent, utc: bool) -> Result<Value, SqliteSinkError> {
    let value = match source {
        ColumnSource::Timestamp => Value::Text(
            event.formatted_timestamp(utc).map_err(|err| SqliteSinkError::Invalid(err.to_string()))?,
        ),
        ColumnSource::Level => Value::Text(event.level.as_str().to_string()),
        ColumnSource::Exception => Value::Text(event.exception.clone().unwrap_or_default()),
        ColumnSource::RenderedMessage => Value::Text(event.render_message()),
        ColumnSource::Properties => Value::Text(
            event
                .properties_json()
                .map_err(|err| SqliteSinkError::Invalid(err.to_string()))?
                .unwrap_or_default(),
        ),
        ColumnSource::Property(name) => {
            event.properties.get(name).map_or(Value::Null, |value| Value::Text(value.to_string()))
        }
    };
    Ok(value)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
