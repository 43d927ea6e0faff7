//! Named parameter binding for prepared entity statements.
//!
//! # Invariants
//! - Every placeholder of the statement is bound, or binding fails.
//! - Supplied values without a matching placeholder are ignored.
//! - Binding goes by placeholder name, never by position.

use rusqlite::types::Value;
use rusqlite::Statement;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Named statement values keyed by placeholder name without its prefix.
pub type Params = BTreeMap<String, Value>;

/// Errors raised while binding values into a statement.
#[derive(Debug)]
pub enum BindError {
    /// Template placeholder with no supplied value (or an unnamed `?`).
    MissingParameter(String),
    /// SQLite rejected the value.
    Sqlite(rusqlite::Error),
}

impl Display for BindError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingParameter(name) => {
                write!(f, "no value supplied for statement parameter `{name}`")
            }
            Self::Sqlite(err) => write!(f, "{err}"),
        }
    }
}

impl Error for BindError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::MissingParameter(_) => None,
            Self::Sqlite(err) => Some(err),
        }
    }
}

impl From<rusqlite::Error> for BindError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Binds `params` into every placeholder of `stmt`.
///
/// Placeholders may use any SQLite prefix (`:name`, `@name`, `$name`); the
/// lookup key is the bare name. Returns the number of bound placeholders.
///
/// # Errors
/// - [`BindError::MissingParameter`] for a placeholder without a value.
/// - [`BindError::Sqlite`] when SQLite refuses a binding.
pub fn bind_named(stmt: &mut Statement<'_>, params: &Params) -> Result<usize, BindError> {
    let count = stmt.parameter_count();
    for index in 1..=count {
        let placeholder = match stmt.parameter_name(index) {
            Some(name) => name.to_owned(),
            None => return Err(BindError::MissingParameter(format!("?{index}"))),
        };
        let value = params
            .get(bare_name(&placeholder))
            .ok_or_else(|| BindError::MissingParameter(placeholder.clone()))?;
        stmt.raw_bind_parameter(index, value)?;
    }
    Ok(count)
}

fn bare_name(placeholder: &str) -> &str {
    placeholder.trim_start_matches([':', '@', '$'])
}

#[cfg(test)]
mod tests {
    use super::{bind_named, BindError, Params};
    use rusqlite::types::Value;
    use rusqlite::Connection;

    fn params(entries: &[(&str, Value)]) -> Params {
        entries
            .iter()
            .map(|(name, value)| ((*name).to_string(), value.clone()))
            .collect()
    }

    fn select_pair(conn: &Connection, sql: &str, values: &Params) -> (i64, String) {
        let mut stmt = conn.prepare(sql).unwrap();
        bind_named(&mut stmt, values).unwrap();
        let mut rows = stmt.raw_query();
        let row = rows.next().unwrap().unwrap();
        (row.get(0).unwrap(), row.get(1).unwrap())
    }

    #[test]
    fn binds_by_name_regardless_of_template_order() {
        let conn = Connection::open_in_memory().unwrap();
        let values = params(&[
            ("a", Value::Integer(7)),
            ("b", Value::Text("seven".to_string())),
        ]);

        let (number, text) = select_pair(&conn, "SELECT :a, :b;", &values);
        assert_eq!((number, text.as_str()), (7, "seven"));

        let (number, text) = select_pair(&conn, "SELECT @a + 0, $b;", &values);
        assert_eq!((number, text.as_str()), (7, "seven"));
    }

    #[test]
    fn repeated_placeholder_is_bound_once() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("SELECT :id, :id;").unwrap();
        let bound = bind_named(&mut stmt, &params(&[("id", Value::Integer(1))])).unwrap();
        assert_eq!(bound, 1);
    }

    #[test]
    fn extra_values_are_ignored() {
        let conn = Connection::open_in_memory().unwrap();
        let values = params(&[
            ("a", Value::Integer(1)),
            ("b", Value::Text("x".to_string())),
            ("unused", Value::Null),
        ]);
        let (number, _) = select_pair(&conn, "SELECT :a, :b;", &values);
        assert_eq!(number, 1);
    }

    #[test]
    fn missing_value_is_reported_with_placeholder_name() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("SELECT :present, :absent;").unwrap();
        let err = bind_named(&mut stmt, &params(&[("present", Value::Null)])).unwrap_err();
        assert!(matches!(err, BindError::MissingParameter(name) if name == ":absent"));
    }

    #[test]
    fn positional_placeholder_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("SELECT ?;").unwrap();
        let err = bind_named(&mut stmt, &Params::new()).unwrap_err();
        assert!(matches!(err, BindError::MissingParameter(name) if name == "?1"));
    }
}
