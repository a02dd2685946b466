// crates/logsink-core/src/event.rs
// ============================================================================
// Module: Logsink Event Model
// Description: Log records, severity levels, and structured property values.
// Purpose: Provide the read-only record shape handed from producers to sinks.
// Dependencies: serde, serde_json, time
// ============================================================================

//! ## Overview
//! A [`LogEvent`] is one producer-side log entry: a timestamp, a [`Level`], an
//! optional exception rendering, a message template, and a property bag used
//! both to render the template and to fill custom sink columns. Sinks treat
//! events as read-only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::UtcOffset;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

use crate::template::render_template;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Persisted timestamp layout (`yyyy-MM-ddTHH:mm:ss.fff`).
///
/// The layout is fixed-width so lexical order matches chronological order for
/// timestamps sharing an offset.
pub const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]");

// ============================================================================
// SECTION: Levels
// ============================================================================

/// Severity level attached to every log event.
///
/// # Invariants
/// - Ordering runs from least to most severe.
/// - [`Level::as_str`] labels are stable and persisted verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Level {
    /// Fine-grained tracing output.
    Verbose,
    /// Internal diagnostic output.
    Debug,
    /// Normal operational messages.
    Information,
    /// Degraded or unexpected conditions.
    Warning,
    /// Failed operations.
    Error,
    /// Unrecoverable failures.
    Fatal,
}

impl Level {
    /// Returns the persisted textual name of the level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Verbose => "Verbose",
            Self::Debug => "Debug",
            Self::Information => "Information",
            Self::Warning => "Warning",
            Self::Error => "Error",
            Self::Fatal => "Fatal",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Property Values
// ============================================================================

/// Structured value bound to a named event property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Explicit null.
    Null,
    /// Boolean scalar.
    Bool(bool),
    /// Signed integer scalar.
    Integer(i64),
    /// Floating point scalar.
    Float(f64),
    /// Text scalar.
    Text(String),
    /// Ordered sequence of values.
    Sequence(Vec<Self>),
    /// Named fields of a structured value.
    Structure(BTreeMap<String, Self>),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
            Self::Sequence(_) | Self::Structure(_) => {
                let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

// ============================================================================
// SECTION: Events
// ============================================================================

/// A single log record produced upstream of the sink.
///
/// # Invariants
/// - `properties` keys are matched exactly (case-sensitive) by sinks.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    /// Moment the event occurred, in the producer's offset.
    pub timestamp: OffsetDateTime,
    /// Severity level.
    pub level: Level,
    /// Message template with `{Name}` holes.
    pub message_template: String,
    /// Bound properties, used for rendering and custom columns.
    pub properties: BTreeMap<String, PropertyValue>,
    /// Rendered exception detail when the event carries one.
    pub exception: Option<String>,
}

impl LogEvent {
    /// Creates an event stamped with the current local time (UTC when the
    /// local offset cannot be determined).
    #[must_use]
    pub fn new(level: Level, message_template: impl Into<String>) -> Self {
        Self {
            timestamp: now_in_storage_clock(false),
            level,
            message_template: message_template.into(),
            properties: BTreeMap::new(),
            exception: None,
        }
    }

    /// Replaces the event timestamp.
    #[must_use]
    pub fn at(mut self, timestamp: OffsetDateTime) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Binds a property value, replacing any previous value for `name`.
    #[must_use]
    pub fn with_property(
        mut self,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Attaches exception detail text.
    #[must_use]
    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }

    /// Renders the message template against the bound properties.
    #[must_use]
    pub fn render_message(&self) -> String {
        render_template(&self.message_template, &self.properties)
    }

    /// Serializes the property bag as a JSON object, or `None` when empty.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] when a value cannot be encoded.
    pub fn properties_json(&self) -> Result<Option<String>, serde_json::Error> {
        if self.properties.is_empty() {
            return Ok(None);
        }
        serde_json::to_string(&self.properties).map(Some)
    }

    /// Formats the timestamp in the persisted layout.
    ///
    /// When `utc` is set the timestamp is converted to UTC first; otherwise
    /// it is formatted in its own offset.
    ///
    /// # Errors
    ///
    /// Returns [`time::error::Format`] when the timestamp cannot be formatted.
    pub fn formatted_timestamp(&self, utc: bool) -> Result<String, time::error::Format> {
        format_timestamp(self.timestamp, utc)
    }
}

/// Formats `timestamp` in the persisted layout, optionally converting to UTC.
///
/// # Errors
///
/// Returns [`time::error::Format`] when the timestamp cannot be formatted.
pub fn format_timestamp(
    timestamp: OffsetDateTime,
    utc: bool,
) -> Result<String, time::error::Format> {
    let timestamp = if utc { timestamp.to_offset(UtcOffset::UTC) } else { timestamp };
    timestamp.format(TIMESTAMP_FORMAT)
}

/// Returns the current time in the clock domain used for persisted values.
///
/// UTC storage reads the UTC clock; otherwise the local offset is used when
/// the platform can determine it, falling back to UTC.
#[must_use]
pub fn now_in_storage_clock(utc: bool) -> OffsetDateTime {
    if utc {
        OffsetDateTime::now_utc()
    } else {
        OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use time::macros::datetime;

    use super::Level;
    use super::LogEvent;
    use super::PropertyValue;

    #[test]
    fn level_names_are_stable() {
        assert_eq!(Level::Information.as_str(), "Information");
        assert_eq!(Level::Warning.to_string(), "Warning");
        assert!(Level::Fatal > Level::Verbose);
    }

    #[test]
    fn timestamp_keeps_offset_unless_utc_requested() {
        let event =
            LogEvent::new(Level::Debug, "tick").at(datetime!(2024-03-01 10:15:30.123456 +02:00));
        assert_eq!(event.formatted_timestamp(false).unwrap(), "2024-03-01T10:15:30.123");
        assert_eq!(event.formatted_timestamp(true).unwrap(), "2024-03-01T08:15:30.123");
    }

    #[test]
    fn empty_properties_have_no_json() {
        let event = LogEvent::new(Level::Debug, "tick");
        assert_eq!(event.properties_json().unwrap(), None);
        let event = event.with_property("Count", 3_i64).with_property("Name", "disk");
        assert_eq!(
            event.properties_json().unwrap().as_deref(),
            Some(r#"{"Count":3,"Name":"disk"}"#)
        );
    }

    #[test]
    fn structured_values_display_as_json() {
        let value = PropertyValue::Sequence(vec![PropertyValue::Integer(1), "a".into()]);
        assert_eq!(value.to_string(), r#"[1,"a"]"#);
        assert_eq!(PropertyValue::Text("plain".to_string()).to_string(), "plain");
        assert_eq!(PropertyValue::Null.to_string(), "null");
    }
}
