// crates/logsink-core/src/template.rs
// ============================================================================
// Module: Logsink Message Templates
// Description: Renders `{Name}` message templates against event properties.
// Purpose: Produce the human-readable message persisted alongside each event.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Templates contain literal text and property holes such as `{Name}`,
//! `{@Payload}`, or `{Elapsed:0.00}`. Holes are replaced with the textual form
//! of the matching property; `{{` and `}}` escape literal braces. Holes with no
//! bound property, and unterminated holes, are emitted verbatim.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::event::PropertyValue;

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// Renders `template` using `properties` for hole substitution.
#[must_use]
pub fn render_template(template: &str, properties: &BTreeMap<String, PropertyValue>) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(index) = rest.find(['{', '}']) {
        output.push_str(&rest[.. index]);
        let tail = &rest[index ..];
        if tail.starts_with("{{") || tail.starts_with("}}") {
            output.push_str(&tail[.. 1]);
            rest = &tail[2 ..];
            continue;
        }
        if tail.starts_with('}') {
            output.push('}');
            rest = &tail[1 ..];
            continue;
        }
        let Some(close) = tail.find('}') else {
            output.push_str(tail);
            return output;
        };
        let hole = &tail[..= close];
        match properties.get(property_name(&hole[1 .. close])) {
            Some(value) => {
                let _ = write!(output, "{value}");
            }
            None => output.push_str(hole),
        }
        rest = &tail[close + 1 ..];
    }
    output.push_str(rest);
    output
}

/// Extracts the property name from a hole body, dropping capture markers,
/// alignment, and format specifiers.
fn property_name(body: &str) -> &str {
    let body = body.strip_prefix(['@', '$']).unwrap_or(body);
    let end = body.find([',', ':']).unwrap_or(body.len());
    body[.. end].trim()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
