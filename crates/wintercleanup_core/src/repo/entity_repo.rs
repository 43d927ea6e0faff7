//! Generic entity repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Execute an entity's select/save/delete templates with bound values.
//! - Convert rows into typed records and report affected row counts.
//!
//! # Invariants
//! - Reads that match nothing return an empty list, never an error.
//! - Writes run inside one immediate transaction.
//! - Pagination values are bound as `:limit`/`:offset`, never as filters.

use crate::db::binder::BindError;
use crate::db::{bind_named, DbError, Params};
use crate::model::Entity;
use crate::repo::pagination::{filter_params, normalize, Pagination, QueryParams};
use log::{debug, info};
use rusqlite::types::Value;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::marker::PhantomData;
use std::time::Instant;

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from entity repository operations.
#[derive(Debug)]
pub enum RepoError {
    /// Storage fault from SQLite or connection bootstrap.
    Db(DbError),
    /// Statement placeholder without a supplied value.
    MissingParameter(String),
    /// A stored record points at a parent that does not exist.
    DanglingReference {
        entity: &'static str,
        record_id: i64,
        parent_id: i64,
    },
    /// Stored parent links form a cycle through `record_id`.
    CyclicHierarchy {
        entity: &'static str,
        record_id: i64,
    },
    /// Persisted data cannot be converted into a record.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::MissingParameter(name) => {
                write!(f, "no value supplied for statement parameter `{name}`")
            }
            Self::DanglingReference {
                entity,
                record_id,
                parent_id,
            } => write!(
                f,
                "{entity} {record_id} references missing parent {entity} {parent_id}"
            ),
            Self::CyclicHierarchy { entity, record_id } => {
                write!(f, "{entity} {record_id} is part of a cyclic parent chain")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::MissingParameter(_) => None,
            Self::DanglingReference { .. } => None,
            Self::CyclicHierarchy { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<BindError> for RepoError {
    fn from(value: BindError) -> Self {
        match value {
            BindError::MissingParameter(name) => Self::MissingParameter(name),
            BindError::Sqlite(err) => Self::Db(DbError::Sqlite(err)),
        }
    }
}

/// Result of a save call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveOutcome {
    /// Rows the storage engine reported as inserted or changed.
    pub affected: usize,
    /// Positions (in the submitted slice) of records whose key did not exist
    /// before the write.
    pub created: Vec<usize>,
}

impl SaveOutcome {
    /// Whether at least one submitted record was newly inserted.
    pub fn is_created(&self) -> bool {
        !self.created.is_empty()
    }
}

/// Repository interface for entity CRUD operations.
pub trait EntityRepository<E: Entity> {
    /// Selects records matching `keys` (a `NULL` key matches every row) and
    /// the remaining `query` filters, windowed by `limit`/`offset`.
    fn get(&self, keys: &Params, query: &QueryParams) -> RepoResult<Vec<E>>;

    /// Upserts several top-level records in one transaction.
    fn save_all(&self, records: &[E]) -> RepoResult<SaveOutcome>;

    /// Upserts one record.
    fn save(&self, record: &E) -> RepoResult<SaveOutcome> {
        self.save_all(std::slice::from_ref(record))
    }

    /// Deletes the record identified by the key attributes of `record`.
    /// Returns the number of removed rows.
    fn delete(&self, record: &E) -> RepoResult<usize>;
}

/// SQLite repository driven purely by the entity's statement templates.
pub struct SqliteEntityRepository<'conn, E> {
    conn: &'conn Connection,
    entity: PhantomData<fn() -> E>,
}

impl<'conn, E: Entity> SqliteEntityRepository<'conn, E> {
    /// Creates repository from a migrated connection.
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            entity: PhantomData,
        }
    }
}

impl<E: Entity> EntityRepository<E> for SqliteEntityRepository<'_, E> {
    fn get(&self, keys: &Params, query: &QueryParams) -> RepoResult<Vec<E>> {
        let started_at = Instant::now();
        let (window, filters) = normalize(query);
        let records = select_records::<E>(self.conn, keys, &filter_params(&filters), window)?;
        debug!(
            "event=entity_get module=repo status=ok entity={} rows={} limit={} offset={} duration_ms={}",
            E::NAME,
            records.len(),
            window.limit,
            window.offset,
            started_at.elapsed().as_millis()
        );
        Ok(records)
    }

    fn save_all(&self, records: &[E]) -> RepoResult<SaveOutcome> {
        let started_at = Instant::now();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut outcome = SaveOutcome::default();
        for (position, record) in records.iter().enumerate() {
            if !record_exists::<E>(&tx, &record.key_values())? {
                outcome.created.push(position);
            }
            outcome.affected += execute_statement(&tx, E::SAVE_SQL, &record.attributes())?;
        }
        tx.commit()?;

        info!(
            "event=entity_save module=repo status=ok entity={} records={} affected={} created={} duration_ms={}",
            E::NAME,
            records.len(),
            outcome.affected,
            outcome.created.len(),
            started_at.elapsed().as_millis()
        );
        Ok(outcome)
    }

    fn delete(&self, record: &E) -> RepoResult<usize> {
        let started_at = Instant::now();
        let affected = execute_statement(self.conn, E::DELETE_SQL, &record.key_values())?;
        info!(
            "event=entity_delete module=repo status=ok entity={} affected={} duration_ms={}",
            E::NAME,
            affected,
            started_at.elapsed().as_millis()
        );
        Ok(affected)
    }
}

/// Runs `E::SELECT_SQL` with `filters`, then `keys`, then the window bound.
///
/// Non-null key values take precedence over filters of the same name.
pub(crate) fn select_records<E: Entity>(
    conn: &Connection,
    keys: &Params,
    filters: &Params,
    window: Pagination,
) -> RepoResult<Vec<E>> {
    let mut params = filters.clone();
    for (name, value) in keys {
        if *value != Value::Null || !params.contains_key(name) {
            params.insert(name.clone(), value.clone());
        }
    }
    params.extend(window.params());

    let mut stmt = conn.prepare(E::SELECT_SQL)?;
    bind_named(&mut stmt, &params)?;
    let mut rows = stmt.raw_query();
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(E::from_row(row)?);
    }
    Ok(records)
}

/// Prepares `sql`, binds `params` by name and executes it.
pub(crate) fn execute_statement(conn: &Connection, sql: &str, params: &Params) -> RepoResult<usize> {
    let mut stmt = conn.prepare(sql)?;
    bind_named(&mut stmt, params)?;
    Ok(stmt.raw_execute()?)
}

/// Whether a record with the given key values is stored.
///
/// A key set containing `NULL` identifies nothing and is reported as absent.
pub(crate) fn record_exists<E: Entity>(conn: &Connection, keys: &Params) -> RepoResult<bool> {
    if keys.values().any(|value| *value == Value::Null) {
        return Ok(false);
    }
    let found = select_records::<E>(conn, keys, &Params::new(), Pagination::FIRST)?;
    Ok(!found.is_empty())
}
