//! Task entity: a self-referencing tree of work items.
//!
//! # Invariants
//! - `sub_items` holds exactly the tasks whose `parent_task_id` equals this
//!   task's `id`; a task without parent is a root.
//! - `sub_items` is transient: it is never bound into a statement.
//! - Bulk statements have at least one value tuple.

use crate::db::Params;
use crate::model::Entity;
use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Deserializer, Serialize};

/// Stable task identifier (`task.id`).
pub type TaskId = i64;

/// Persisted task columns in statement order.
pub const TASK_COLUMNS: [&str; 4] = ["id", "title", "description", "parent_task_id"];

const TASK_SELECT_SQL: &str = "SELECT
    id,
    title,
    description,
    parent_task_id
FROM task
WHERE (:id IS NULL OR id = :id)
ORDER BY id ASC
LIMIT :limit OFFSET :offset;";

const TASK_SAVE_SQL: &str = "INSERT INTO task (id, title, description, parent_task_id)
VALUES (:id, :title, :description, :parent_task_id)
ON CONFLICT (id) DO UPDATE SET
    title = excluded.title,
    description = excluded.description,
    parent_task_id = excluded.parent_task_id;";

const TASK_DELETE_SQL: &str = "DELETE FROM task WHERE id = :id;";

/// One node of the task tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Option<TaskId>,
    pub title: Option<String>,
    pub description: Option<String>,
    /// `None` marks a root task.
    pub parent_task_id: Option<TaskId>,
    /// Child nodes, populated only in the tree representation.
    #[serde(
        rename = "subItems",
        default,
        deserialize_with = "null_as_empty_sub_items"
    )]
    pub sub_items: Vec<Task>,
}

impl Task {
    /// Creates a task with the given id and title and no children.
    pub fn new(id: TaskId, title: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// Sets the parent link.
    pub fn with_parent(mut self, parent_task_id: TaskId) -> Self {
        self.parent_task_id = Some(parent_task_id);
        self
    }

    /// Appends one child node.
    pub fn with_child(mut self, child: Task) -> Self {
        self.sub_items.push(child);
        self
    }

    /// Whether this task has no parent.
    pub fn is_root(&self) -> bool {
        self.parent_task_id.is_none()
    }

    /// Number of nodes in this subtree, this node included.
    pub fn subtree_len(&self) -> usize {
        let mut len = 0;
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            len += 1;
            pending.extend(&node.sub_items);
        }
        len
    }
}

impl Entity for Task {
    const NAME: &'static str = "task";
    const KEY_ATTRIBUTES: &'static [&'static str] = &["id"];
    const SELECT_SQL: &'static str = TASK_SELECT_SQL;
    const SAVE_SQL: &'static str = TASK_SAVE_SQL;
    const DELETE_SQL: &'static str = TASK_DELETE_SQL;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            parent_task_id: row.get("parent_task_id")?,
            sub_items: Vec::new(),
        })
    }

    fn attributes(&self) -> Params {
        let mut attributes = Params::new();
        attributes.insert("id".to_string(), optional_integer(self.id));
        attributes.insert("title".to_string(), optional_text(self.title.as_deref()));
        attributes.insert(
            "description".to_string(),
            optional_text(self.description.as_deref()),
        );
        attributes.insert(
            "parent_task_id".to_string(),
            optional_integer(self.parent_task_id),
        );
        attributes
    }
}

/// Builds the upsert statement for `dimension` tasks.
///
/// Tuple `i` (1-based) uses placeholders `:id{i}, :title{i}, ...`. A
/// dimension of zero is treated as one so the statement is never empty.
pub fn bulk_save_sql(dimension: usize) -> String {
    let tuples = (1..=dimension.max(1))
        .map(|position| {
            let placeholders = TASK_COLUMNS
                .iter()
                .map(|column| format!(":{column}{position}"))
                .collect::<Vec<_>>()
                .join(", ");
            format!("({placeholders})")
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO task (id, title, description, parent_task_id)
VALUES {tuples}
ON CONFLICT (id) DO UPDATE SET
    title = excluded.title,
    description = excluded.description,
    parent_task_id = excluded.parent_task_id;"
    )
}

/// Builds the delete statement for `dimension` task ids (`:id1, :id2, ...`).
///
/// A dimension of zero is treated as one.
pub fn bulk_delete_sql(dimension: usize) -> String {
    let dimension = dimension.max(1);
    let placeholders = (1..=dimension)
        .map(|position| format!(":id{position}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("DELETE FROM task WHERE id IN ({placeholders});")
}

fn optional_integer(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Integer)
}

fn optional_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |text| Value::Text(text.to_string()))
}

fn null_as_empty_sub_items<'de, D>(deserializer: D) -> Result<Vec<Task>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Task>>::deserialize(deserializer)?.unwrap_or_default())
}
