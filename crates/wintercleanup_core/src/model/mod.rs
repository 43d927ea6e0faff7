//! Entity record shapes and their statement templates.
//!
//! # Responsibility
//! - Declare the record type of every exposed relation as a plain struct.
//! - Map struct fields to statement attributes explicitly, both ways.
//!
//! # Invariants
//! - `KEY_ATTRIBUTES` is non-empty and lists attributes in URL order.
//! - `attributes()` returns persisted attributes only; transient fields such
//!   as `Task::sub_items` never reach a statement.

use crate::db::Params;
use rusqlite::types::Value;
use rusqlite::Row;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub mod task;

/// One relation exposed through the entity endpoints.
pub trait Entity: Serialize + DeserializeOwned + Sized {
    /// Path segment under `/entities/`.
    const NAME: &'static str;
    /// Attributes whose combined values identify one record.
    const KEY_ATTRIBUTES: &'static [&'static str];
    /// Select template; binds every key attribute plus `:limit`/`:offset`.
    /// A null key value must match every row.
    const SELECT_SQL: &'static str;
    /// Upsert template; binds every persisted attribute.
    const SAVE_SQL: &'static str;
    /// Delete template; binds every key attribute and removes at most one row.
    const DELETE_SQL: &'static str;

    /// Builds a record from a row produced by `SELECT_SQL`.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Persisted attribute values keyed by column name.
    fn attributes(&self) -> Params;

    /// Key attribute values; absent keys are reported as `NULL`.
    fn key_values(&self) -> Params {
        let attributes = self.attributes();
        Self::KEY_ATTRIBUTES
            .iter()
            .map(|name| {
                let value = attributes.get(*name).cloned().unwrap_or(Value::Null);
                ((*name).to_string(), value)
            })
            .collect()
    }
}

/// Converts a captured path segment or query value into a statement value.
///
/// Integral text becomes `INTEGER` so it compares against integer keys;
/// anything else is bound as `TEXT`.
pub fn scalar_from_str(raw: &str) -> Value {
    match raw.trim().parse::<i64>() {
        Ok(number) => Value::Integer(number),
        Err(_) => Value::Text(raw.to_string()),
    }
}

/// Renders a JSON scalar for use inside a URL path.
///
/// Strings are emitted without quotes; other values use their JSON form.
pub fn scalar_to_path_segment(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{scalar_from_str, scalar_to_path_segment};
    use rusqlite::types::Value;
    use serde_json::json;

    #[test]
    fn integral_text_becomes_integer() {
        assert_eq!(scalar_from_str("42"), Value::Integer(42));
        assert_eq!(scalar_from_str(" -3 "), Value::Integer(-3));
        assert_eq!(scalar_from_str("4x"), Value::Text("4x".to_string()));
    }

    #[test]
    fn path_segments_drop_json_quotes() {
        assert_eq!(scalar_to_path_segment(&json!("abc")), "abc");
        assert_eq!(scalar_to_path_segment(&json!(17)), "17");
    }
}
