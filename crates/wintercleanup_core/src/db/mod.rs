//! SQLite storage bootstrap, migrations and named parameter binding.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the entity core.
//! - Apply schema migrations in deterministic order.
//! - Bind named values into prepared entity statements.
//!
//! # Invariants
//! - Entity code must not touch a connection before migrations succeed.
//! - Statement templates only use named placeholders.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod binder;
pub mod migrations;
mod open;

pub use binder::{bind_named, Params};
pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Storage fault raised by the SQLite collaborator.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
