//! Conversion between flat task rows and the nested task tree.
//!
//! # Responsibility
//! - Nest: link a flat row set into a forest in one pass over the rows.
//! - Flatten: turn submitted trees into an ordered record list whose
//!   attributes can be spread over one bulk statement.
//!
//! # Invariants
//! - Every stored parent link must resolve; a missing parent is an
//!   integrity fault, not an empty result.
//! - Parent cycles are reported, never followed.
//! - Flattened output lists children before their parent.

use crate::db::Params;
use crate::model::task::{Task, TaskId};
use crate::model::Entity;
use crate::repo::entity_repo::{RepoError, RepoResult};
use std::collections::HashMap;

/// Links flat `rows` into trees.
///
/// With `requested = Some(id)` the result is `[node]` carrying its whole
/// subtree, or empty when no row has that id. Without a request the result
/// is every root, in row order, with its subtree attached.
///
/// # Errors
/// - [`RepoError::DanglingReference`] when a row names a missing parent.
/// - [`RepoError::CyclicHierarchy`] when parent links loop.
/// - [`RepoError::InvalidData`] for a row without id.
pub fn nest(rows: Vec<Task>, requested: Option<TaskId>) -> RepoResult<Vec<Task>> {
    let mut order = Vec::with_capacity(rows.len());
    let mut nodes = HashMap::with_capacity(rows.len());
    for mut row in rows {
        let id = row
            .id
            .ok_or_else(|| RepoError::InvalidData("task row without id".to_string()))?;
        row.sub_items.clear();
        order.push(id);
        nodes.insert(id, row);
    }

    let mut children: HashMap<TaskId, Vec<TaskId>> = HashMap::new();
    let mut roots = Vec::new();
    for id in &order {
        match nodes.get(id).and_then(|node| node.parent_task_id) {
            Some(parent_id) => {
                if !nodes.contains_key(&parent_id) {
                    return Err(RepoError::DanglingReference {
                        entity: Task::NAME,
                        record_id: *id,
                        parent_id,
                    });
                }
                children.entry(parent_id).or_default().push(*id);
            }
            None => roots.push(*id),
        }
    }

    if let Some(id) = requested {
        if !nodes.contains_key(&id) {
            return Ok(Vec::new());
        }
        return Ok(vec![assemble(id, &mut nodes, &children)?]);
    }

    let mut forest = Vec::with_capacity(roots.len());
    for id in roots {
        forest.push(assemble(id, &mut nodes, &children)?);
    }

    // Whatever no root reached hangs on a cycle.
    if let Some(id) = order.iter().find(|id| nodes.contains_key(id)) {
        return Err(RepoError::CyclicHierarchy {
            entity: Task::NAME,
            record_id: *id,
        });
    }
    Ok(forest)
}

// Builds the subtree under `root` depth-first on an explicit stack.
fn assemble(
    root: TaskId,
    nodes: &mut HashMap<TaskId, Task>,
    children: &HashMap<TaskId, Vec<TaskId>>,
) -> RepoResult<Task> {
    let mut stack = vec![(take_node(root, nodes)?, 0usize)];
    loop {
        let top = stack.len() - 1;
        let (node, next) = &mut stack[top];
        let child_id = node
            .id
            .and_then(|id| children.get(&id))
            .and_then(|child_ids| child_ids.get(*next))
            .copied();
        *next += 1;

        match child_id {
            Some(child_id) => {
                let child = take_node(child_id, nodes)?;
                stack.push((child, 0));
            }
            None => {
                let (done, _) = stack.swap_remove(top);
                match stack.last_mut() {
                    Some((parent, _)) => parent.sub_items.push(done),
                    None => return Ok(done),
                }
            }
        }
    }
}

// Each node is taken out exactly once; meeting it again means a loop.
fn take_node(id: TaskId, nodes: &mut HashMap<TaskId, Task>) -> RepoResult<Task> {
    nodes.remove(&id).ok_or(RepoError::CyclicHierarchy {
        entity: Task::NAME,
        record_id: id,
    })
}

/// Flattens `roots` into one record list, children before parents.
///
/// Consumed nodes lose their `sub_items`. A child without `parent_task_id`
/// inherits the id of the node it was nested under.
pub fn flatten(roots: Vec<Task>) -> Vec<Task> {
    let capacity = roots.iter().map(Task::subtree_len).sum();
    let mut records = Vec::with_capacity(capacity);
    for root in roots {
        flatten_into(root, &mut records);
    }
    records
}

fn flatten_into(root: Task, records: &mut Vec<Task>) {
    let mut stack = vec![detach(root)];
    while let Some((node, pending)) = stack.last_mut() {
        match pending.next() {
            Some(mut child) => {
                if child.parent_task_id.is_none() {
                    child.parent_task_id = node.id;
                }
                stack.push(detach(child));
            }
            None => {
                if let Some((done, _)) = stack.pop() {
                    records.push(done);
                }
            }
        }
    }
}

fn detach(mut node: Task) -> (Task, std::vec::IntoIter<Task>) {
    let children = std::mem::take(&mut node.sub_items).into_iter();
    (node, children)
}

/// Re-keys the attributes of every record with its 1-based position, giving
/// one mapping for a bulk statement (`id` of the second record -> `id2`).
pub fn spread_positional<E: Entity>(records: &[E]) -> Params {
    let mut spread = Params::new();
    for (index, record) in records.iter().enumerate() {
        let position = index + 1;
        for (name, value) in record.attributes() {
            spread.insert(format!("{name}{position}"), value);
        }
    }
    spread
}

/// Ids of every node in the given trees, children before parents.
pub fn subtree_ids(trees: &[Task]) -> Vec<TaskId> {
    let mut ids = Vec::new();
    for tree in trees {
        let mut stack = vec![(tree, tree.sub_items.iter())];
        while let Some((node, pending)) = stack.last_mut() {
            match pending.next() {
                Some(child) => stack.push((child, child.sub_items.iter())),
                None => {
                    if let Some(id) = node.id {
                        ids.push(id);
                    }
                    stack.pop();
                }
            }
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::{flatten, nest, spread_positional, subtree_ids};
    use crate::model::task::Task;
    use crate::repo::entity_repo::RepoError;
    use rusqlite::types::Value;

    fn row(id: i64, parent: Option<i64>) -> Task {
        Task {
            id: Some(id),
            title: Some(format!("task {id}")),
            parent_task_id: parent,
            ..Task::default()
        }
    }

    fn ids(tasks: &[Task]) -> Vec<i64> {
        tasks.iter().filter_map(|task| task.id).collect()
    }

    #[test]
    fn nest_attaches_children_to_roots() {
        let forest = nest(vec![row(1, None), row(2, Some(1)), row(3, Some(1))], None).unwrap();
        assert_eq!(ids(&forest), vec![1]);
        assert_eq!(ids(&forest[0].sub_items), vec![2, 3]);
        assert!(forest[0].sub_items.iter().all(|child| child.sub_items.is_empty()));
    }

    #[test]
    fn nest_links_deep_trees_even_when_children_come_first() {
        let rows = vec![row(4, Some(3)), row(3, Some(2)), row(2, Some(1)), row(1, None)];
        let forest = nest(rows, None).unwrap();
        assert_eq!(forest.len(), 1);
        let depth_three = &forest[0].sub_items[0].sub_items[0];
        assert_eq!(depth_three.id, Some(3));
        assert_eq!(ids(&depth_three.sub_items), vec![4]);
    }

    #[test]
    fn nest_returns_requested_subtree_or_nothing() {
        let rows = vec![row(1, None), row(2, Some(1)), row(3, Some(2)), row(9, None)];
        let found = nest(rows.clone(), Some(2)).unwrap();
        assert_eq!(ids(&found), vec![2]);
        assert_eq!(ids(&found[0].sub_items), vec![3]);

        assert!(nest(rows, Some(99)).unwrap().is_empty());
    }

    #[test]
    fn nest_rejects_dangling_parent() {
        let err = nest(vec![row(1, None), row(2, Some(7))], None).unwrap_err();
        assert!(matches!(
            err,
            RepoError::DanglingReference {
                record_id: 2,
                parent_id: 7,
                ..
            }
        ));
    }

    #[test]
    fn nest_rejects_cycles_instead_of_looping() {
        let rows = vec![row(1, None), row(2, Some(3)), row(3, Some(2))];
        let err = nest(rows.clone(), None).unwrap_err();
        assert!(matches!(err, RepoError::CyclicHierarchy { record_id: 2, .. }));

        let err = nest(rows, Some(3)).unwrap_err();
        assert!(matches!(err, RepoError::CyclicHierarchy { .. }));

        let err = nest(vec![row(5, Some(5))], Some(5)).unwrap_err();
        assert!(matches!(err, RepoError::CyclicHierarchy { record_id: 5, .. }));
    }

    #[test]
    fn flatten_lists_children_before_parent_and_fills_parent_links() {
        let tree = Task::new(1, "root")
            .with_child(Task::new(2, "a").with_child(Task::new(4, "a.1")))
            .with_child(Task::new(3, "b"));
        let records = flatten(vec![tree]);

        assert_eq!(ids(&records), vec![4, 2, 3, 1]);
        assert!(records.iter().all(|record| record.sub_items.is_empty()));
        assert_eq!(records[0].parent_task_id, Some(2));
        assert_eq!(records[1].parent_task_id, Some(1));
        assert_eq!(records[3].parent_task_id, None);
    }

    #[test]
    fn flatten_of_nothing_is_empty() {
        assert!(flatten(Vec::new()).is_empty());
    }

    // Sibling order is the row order; it is not asserted beyond that.
    #[test]
    fn flatten_then_nest_round_trips() {
        let tree = Task::new(1, "root")
            .with_child(Task::new(2, "a").with_parent(1).with_child(Task::new(4, "a.1").with_parent(2)))
            .with_child(Task::new(3, "b").with_parent(1));
        let mut rows = flatten(vec![tree.clone()]);
        rows.sort_by_key(|task| task.id);

        let forest = nest(rows, None).unwrap();
        assert_eq!(forest, vec![tree]);
    }

    #[test]
    fn spread_suffixes_attributes_with_position() {
        let records = vec![Task::new(1, "one"), Task::new(2, "two").with_parent(1)];
        let spread = spread_positional(&records);
        assert_eq!(spread.len(), 8);
        assert_eq!(spread["id1"], Value::Integer(1));
        assert_eq!(spread["title2"], Value::Text("two".to_string()));
        assert_eq!(spread["parent_task_id1"], Value::Null);
        assert_eq!(spread["parent_task_id2"], Value::Integer(1));
    }

    fn chain(depth: i64) -> Vec<Task> {
        (1..=depth)
            .map(|id| row(id, (id > 1).then(|| id - 1)))
            .collect()
    }

    #[test]
    fn deep_chains_nest_and_flatten_without_recursion() {
        let depth = 20_000;
        let forest = nest(chain(depth), None).unwrap();
        assert_eq!(forest.len(), 1);
        assert_eq!(subtree_ids(&forest).len(), depth as usize);

        let mut node = &forest[0];
        let mut levels = 1;
        while let Some(child) = node.sub_items.first() {
            assert_eq!(child.parent_task_id, node.id);
            node = child;
            levels += 1;
        }
        assert_eq!(levels, depth);
        assert_eq!(node.id, Some(depth));

        let records = flatten(forest);
        assert_eq!(records.len(), depth as usize);
        assert_eq!(records.first().and_then(|task| task.id), Some(depth));
        assert_eq!(records.last().and_then(|task| task.id), Some(1));
    }

    #[test]
    fn subtree_ids_cover_every_level() {
        let tree = Task::new(1, "root").with_child(Task::new(2, "a").with_child(Task::new(3, "b")));
        assert_eq!(subtree_ids(&[tree]), vec![3, 2, 1]);
    }
}
