//! Task repository: tree-shaped reads and single-statement subtree writes.
//!
//! # Responsibility
//! - Read the whole `task` table and hand out nested trees.
//! - Save a submitted forest with one bulk upsert.
//! - Delete a task together with its stored descendants in one statement,
//!   found through a parent -> children index of the table.
//!
//! # Invariants
//! - Callers never see flat rows, only assembled trees.
//! - A subtree is written or removed by exactly one statement, so it is
//!   never changed partially.

use crate::db::Params;
use crate::model::task::{bulk_delete_sql, bulk_save_sql, Task, TaskId};
use crate::model::Entity;
use crate::repo::entity_repo::{
    execute_statement, record_exists, select_records, EntityRepository, RepoResult, SaveOutcome,
};
use crate::repo::hierarchy::{flatten, nest, spread_positional, subtree_ids};
use crate::repo::pagination::{normalize, Pagination, QueryParams};
use log::{debug, info};
use rusqlite::types::Value;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;

/// SQLite-backed task tree repository.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl EntityRepository<Task> for SqliteTaskRepository<'_> {
    /// Returns `[task]` with its subtree when `keys` names an id, otherwise
    /// every root with its subtree. `limit`/`offset` window the root list.
    fn get(&self, keys: &Params, query: &QueryParams) -> RepoResult<Vec<Task>> {
        let started_at = Instant::now();
        let requested = match keys.get("id") {
            None | Some(Value::Null) => None,
            Some(Value::Integer(id)) => Some(*id),
            // A non-integral id can never match a row.
            Some(_) => return Ok(Vec::new()),
        };

        let rows = load_all_rows(self.conn)?;
        let row_count = rows.len();
        let mut trees = nest(rows, requested)?;
        if requested.is_none() {
            let (window, _) = normalize(query);
            trees = window.apply(trees);
        }

        debug!(
            "event=entity_get module=repo status=ok entity={} rows={} trees={} by_id={} duration_ms={}",
            Task::NAME,
            row_count,
            trees.len(),
            requested.is_some(),
            started_at.elapsed().as_millis()
        );
        Ok(trees)
    }

    fn save_all(&self, records: &[Task]) -> RepoResult<SaveOutcome> {
        let started_at = Instant::now();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let mut outcome = SaveOutcome::default();
        for (position, root) in records.iter().enumerate() {
            if !record_exists::<Task>(&tx, &root.key_values())? {
                outcome.created.push(position);
            }
        }

        let flat = flatten(records.to_vec());
        if !flat.is_empty() {
            let sql = bulk_save_sql(flat.len());
            outcome.affected = execute_statement(&tx, &sql, &spread_positional(&flat))?;
        }
        tx.commit()?;

        info!(
            "event=entity_save module=repo status=ok entity={} roots={} tuples={} affected={} created={} duration_ms={}",
            Task::NAME,
            records.len(),
            flat.len(),
            outcome.affected,
            outcome.created.len(),
            started_at.elapsed().as_millis()
        );
        Ok(outcome)
    }

    /// Deletes the task named by `record.id` together with the stored
    /// subtree of every node in `record`. Returns the number of removed rows.
    fn delete(&self, record: &Task) -> RepoResult<usize> {
        let Some(id) = record.id else {
            return Ok(0);
        };
        let started_at = Instant::now();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let rows = load_all_rows(&tx)?;
        let mut ids = stored_descendants(&rows, &subtree_ids(std::slice::from_ref(record)));
        if ids.is_empty() {
            ids.push(id);
        }
        let affected = execute_statement(&tx, &bulk_delete_sql(ids.len()), &spread_ids(&ids))?;
        tx.commit()?;

        info!(
            "event=entity_delete module=repo status=ok entity={} tuples={} affected={} duration_ms={}",
            Task::NAME,
            ids.len(),
            affected,
            started_at.elapsed().as_millis()
        );
        Ok(affected)
    }
}

fn load_all_rows(conn: &Connection) -> RepoResult<Vec<Task>> {
    let mut keys = Params::new();
    keys.insert("id".to_string(), Value::Null);
    select_records::<Task>(conn, &keys, &Params::new(), Pagination::UNBOUNDED)
}

/// Collects every stored id reachable downwards from `starts`, the starts
/// included. Broken links elsewhere in the table do not matter here.
fn stored_descendants(rows: &[Task], starts: &[TaskId]) -> Vec<TaskId> {
    let mut children: HashMap<TaskId, Vec<TaskId>> = HashMap::new();
    let mut stored = HashSet::with_capacity(rows.len());
    for row in rows {
        if let Some(id) = row.id {
            stored.insert(id);
            if let Some(parent_id) = row.parent_task_id {
                children.entry(parent_id).or_default().push(id);
            }
        }
    }

    let mut visited = HashSet::new();
    let mut ids = Vec::new();
    let mut queue: VecDeque<TaskId> = starts
        .iter()
        .copied()
        .filter(|id| stored.contains(id))
        .collect();
    while let Some(id) = queue.pop_front() {
        if !visited.insert(id) {
            continue;
        }
        ids.push(id);
        if let Some(child_ids) = children.get(&id) {
            queue.extend(child_ids);
        }
    }
    ids
}

fn spread_ids(ids: &[TaskId]) -> Params {
    ids.iter()
        .enumerate()
        .map(|(index, id)| (format!("id{}", index + 1), Value::Integer(*id)))
        .collect()
}
