//! Limit/offset extraction for select statements.
//!
//! # Invariants
//! - `limit` and `offset` never reach the filter mapping.
//! - Normalization is pure: the caller's query mapping is not modified, and
//!   normalizing the same mapping twice yields the same window.

use crate::db::Params;
use crate::model::scalar_from_str;
use rusqlite::types::Value;
use std::collections::BTreeMap;

/// Limit used when the caller does not ask for one.
pub const UNBOUNDED_LIMIT: i64 = 999_999;

const LIMIT_KEY: &str = "limit";
const OFFSET_KEY: &str = "offset";

/// URL query parameters as received by a resource.
pub type QueryParams = BTreeMap<String, String>;

/// Row window applied to a select statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Pagination {
    /// Every row from the first one.
    pub const UNBOUNDED: Self = Self {
        limit: UNBOUNDED_LIMIT,
        offset: 0,
    };

    /// At most the first row.
    pub const FIRST: Self = Self {
        limit: 1,
        offset: 0,
    };

    /// Statement values for `:limit` and `:offset`.
    pub fn params(&self) -> Params {
        let mut params = Params::new();
        params.insert(LIMIT_KEY.to_string(), Value::Integer(self.limit));
        params.insert(OFFSET_KEY.to_string(), Value::Integer(self.offset));
        params
    }

    /// Applies the window to an already materialized list.
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        let offset = usize::try_from(self.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(self.limit).unwrap_or(usize::MAX);
        items.into_iter().skip(offset).take(limit).collect()
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::UNBOUNDED
    }
}

/// Splits `query` into the row window and the remaining filter parameters.
///
/// Missing, blank or `null` values fall back to [`UNBOUNDED_LIMIT`] and `0`.
/// Numbers are clamped into `0..=UNBOUNDED_LIMIT` (limit) and `0..` (offset);
/// values that are not integers fall back to the defaults.
pub fn normalize(query: &QueryParams) -> (Pagination, QueryParams) {
    let limit = query
        .get(LIMIT_KEY)
        .and_then(|raw| parse_window_value(raw))
        .map_or(UNBOUNDED_LIMIT, |value| value.clamp(0, UNBOUNDED_LIMIT));
    let offset = query
        .get(OFFSET_KEY)
        .and_then(|raw| parse_window_value(raw))
        .map_or(0, |value| value.max(0));

    let filters = query
        .iter()
        .filter(|(key, _)| key.as_str() != LIMIT_KEY && key.as_str() != OFFSET_KEY)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    (Pagination { limit, offset }, filters)
}

/// Converts filter query values into statement values.
pub fn filter_params(filters: &QueryParams) -> Params {
    filters
        .iter()
        .map(|(key, value)| (key.clone(), scalar_from_str(value)))
        .collect()
}

fn parse_window_value(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
        return None;
    }
    trimmed.parse::<i64>().ok()
}
