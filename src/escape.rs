//! Literal escaping for statements assembled by string interpolation.
//!
//! Callers that bind parameters should keep binding parameters; these
//! helpers exist for the statement-builder paths that interpolate literals
//! directly into SQL text.

use serde_json::Value as JsonValue;

/// Escape a text scalar and wrap it in single quotes.
///
/// Embedded single quotes are doubled per the SQL literal rules.
pub fn escape_text(value: &str) -> String {
   format!("'{}'", value.replace('\'', "''"))
}

/// Render an application JSON value as an injection-safe SQL literal.
///
/// JSON `null` maps to the SQL `NULL` literal, booleans and numbers render
/// bare, strings are escaped and quoted, and arrays/objects are serialized
/// to JSON text and then escaped like strings.
pub fn sql_literal(value: &JsonValue) -> String {
   match value {
      JsonValue::Null => "NULL".to_string(),
      JsonValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
      JsonValue::Number(n) => n.to_string(),
      JsonValue::String(s) => escape_text(s),
      other => escape_text(&other.to_string()),
   }
}
