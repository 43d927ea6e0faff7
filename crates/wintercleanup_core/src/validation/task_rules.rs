//! Integrity rules for submitted task trees.
//!
//! # Invariants
//! - Every node of a submitted batch has an id, and ids are unique across
//!   all of its trees.
//! - A nested node either omits `parent_task_id` or names its enclosing node.
//! - A root's parent is stored or submitted in the same batch.
//! - Stored parent links overlaid with the submitted ones stay acyclic.

use crate::db::Params;
use crate::model::task::{Task, TaskId};
use crate::model::Entity;
use crate::repo::entity_repo::EntityRepository;
use crate::repo::hierarchy::flatten;
use crate::repo::pagination::QueryParams;
use crate::validation::{ValidationError, ValidationRule};
use std::collections::{HashMap, HashSet};

/// Task tree integrity rule.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskValidation;

impl ValidationRule<Task> for TaskValidation {
    fn validate(
        &self,
        record: &Task,
        repo: &dyn EntityRepository<Task>,
    ) -> Result<(), ValidationError> {
        self.validate_all(std::slice::from_ref(record), repo)
    }

    /// Checks a whole batch as one unit, so trees written together cannot
    /// share ids or close a parent loop between them.
    fn validate_all(
        &self,
        records: &[Task],
        repo: &dyn EntityRepository<Task>,
    ) -> Result<(), ValidationError> {
        let mut violations = Vec::new();
        let mut seen = HashSet::new();
        let mut submitted = Vec::new();
        for record in records {
            check_tree(record, &mut seen, &mut submitted, &mut violations);
        }

        let stored = repo.get(&Params::new(), &QueryParams::new())?;
        let mut links: HashMap<TaskId, Option<TaskId>> = flatten(stored)
            .into_iter()
            .filter_map(|task| task.id.map(|id| (id, task.parent_task_id)))
            .collect();
        links.extend(submitted.iter().copied());

        for record in records {
            if let (Some(id), Some(parent_id)) = (record.id, record.parent_task_id) {
                if parent_id != id && !links.contains_key(&parent_id) {
                    violations.push(format!("parent task {parent_id} of task {id} does not exist"));
                }
            }
        }

        let starts: Vec<TaskId> = submitted.iter().map(|(id, _)| *id).collect();
        for id in looping_ids(&starts, &links) {
            violations.push(format!("task {id} would become its own ancestor"));
        }

        match ValidationError::from_violations(Task::NAME, violations) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Walks one submitted tree in pre-order. Records each node's violations and
/// the parent link the node will be stored with.
fn check_tree(
    root: &Task,
    seen: &mut HashSet<TaskId>,
    submitted: &mut Vec<(TaskId, Option<TaskId>)>,
    violations: &mut Vec<String>,
) {
    let mut pending = vec![(root, None)];
    while let Some((node, enclosing)) = pending.pop() {
        match (node.id, enclosing) {
            (None, Some(parent)) => {
                violations.push(format!("a sub-item of task {parent} has no id"))
            }
            (None, None) => violations.push("task has no id".to_string()),
            (Some(id), _) => {
                if !seen.insert(id) {
                    violations.push(format!("task {id} appears more than once"));
                }
                if node.parent_task_id == Some(id) {
                    violations.push(format!("task {id} cannot be its own parent"));
                }
                if let (Some(parent), Some(stated)) = (enclosing, node.parent_task_id) {
                    if parent != stated {
                        violations.push(format!(
                            "task {id} is nested under task {parent} but names parent {stated}"
                        ));
                    }
                }
                // A self link is reported above and left out of the loop walk.
                let parent = node.parent_task_id.or(enclosing).filter(|parent| *parent != id);
                submitted.push((id, parent));
            }
        }

        pending.extend(node.sub_items.iter().rev().map(|child| (child, node.id)));
    }
}

/// Follows the parent chain from every start id and returns the first id
/// met twice on each loop found. Ids already walked are not walked again.
fn looping_ids(starts: &[TaskId], links: &HashMap<TaskId, Option<TaskId>>) -> Vec<TaskId> {
    let mut settled = HashSet::new();
    let mut looping = Vec::new();
    for start in starts {
        let mut path = Vec::new();
        let mut on_path = HashSet::new();
        let mut current = Some(*start);
        while let Some(id) = current {
            if settled.contains(&id) {
                break;
            }
            if !on_path.insert(id) {
                looping.push(id);
                break;
            }
            path.push(id);
            current = links.get(&id).copied().flatten();
        }
        settled.extend(path);
    }
    looping
}

#[cfg(test)]
mod tests {
    use super::TaskValidation;
    use crate::db::open_db_in_memory;
    use crate::model::task::Task;
    use crate::repo::entity_repo::EntityRepository;
    use crate::repo::task_repo::SqliteTaskRepository;
    use crate::validation::{ValidationError, ValidationRule};

    fn violations(err: ValidationError) -> Vec<String> {
        match err {
            ValidationError::Rejected { violations, .. } => violations,
            ValidationError::Repo(err) => panic!("unexpected storage fault: {err}"),
        }
    }

    #[test]
    fn well_formed_new_tree_passes() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteTaskRepository::new(&conn);
        let tree = Task::new(1, "root").with_child(Task::new(2, "child").with_parent(1));
        assert!(TaskValidation.validate(&tree, &repo).is_ok());
    }

    #[test]
    fn collects_every_violation_of_the_submitted_tree() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteTaskRepository::new(&conn);
        let tree = Task::new(1, "root")
            .with_child(Task::new(2, "a").with_parent(7))
            .with_child(Task::new(2, "dup"))
            .with_child(Task {
                title: Some("anonymous".to_string()),
                ..Task::default()
            });

        let found = violations(TaskValidation.validate(&tree, &repo).unwrap_err());
        assert_eq!(found.len(), 3);
        assert!(found[0].contains("nested under task 1 but names parent 7"));
        assert!(found[1].contains("appears more than once"));
        assert!(found[2].contains("sub-item of task 1 has no id"));
    }

    #[test]
    fn rejects_self_parent_and_missing_stored_parent() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteTaskRepository::new(&conn);

        let own_parent = Task::new(3, "loop").with_parent(3);
        let found = violations(TaskValidation.validate(&own_parent, &repo).unwrap_err());
        assert_eq!(found, vec!["task 3 cannot be its own parent".to_string()]);

        let orphan = Task::new(4, "orphan").with_parent(40);
        let found = violations(TaskValidation.validate(&orphan, &repo).unwrap_err());
        assert_eq!(found, vec!["parent task 40 of task 4 does not exist".to_string()]);
    }

    #[test]
    fn rejects_moving_a_task_under_its_descendant() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteTaskRepository::new(&conn);
        let stored = Task::new(1, "root")
            .with_child(Task::new(2, "child").with_child(Task::new(3, "grandchild")));
        repo.save(&stored).unwrap();

        let moved = Task::new(1, "root").with_parent(3);
        let found = violations(TaskValidation.validate(&moved, &repo).unwrap_err());
        assert_eq!(found, vec!["task 1 would become its own ancestor".to_string()]);

        let submitted_cycle = Task::new(5, "top")
            .with_parent(6)
            .with_child(Task::new(6, "below"));
        let found = violations(TaskValidation.validate(&submitted_cycle, &repo).unwrap_err());
        assert_eq!(found, vec!["task 5 would become its own ancestor".to_string()]);
    }

    #[test]
    fn rejects_stored_task_nested_under_its_own_descendant() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteTaskRepository::new(&conn);
        repo.save(&Task::new(10, "ten").with_child(Task::new(11, "eleven")))
            .unwrap();

        // 10 would hang under 1, which hangs under 11, which hangs under 10.
        let wrapped = Task::new(1, "wrapper")
            .with_parent(11)
            .with_child(Task::new(10, "ten"));
        let found = violations(TaskValidation.validate(&wrapped, &repo).unwrap_err());
        assert_eq!(found, vec!["task 1 would become its own ancestor".to_string()]);
    }

    #[test]
    fn checks_the_trees_of_a_batch_together() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteTaskRepository::new(&conn);
        repo.save_all(&[Task::new(1, "one"), Task::new(2, "two")]).unwrap();

        let swapped = [
            Task::new(1, "one").with_parent(2),
            Task::new(2, "two").with_parent(1),
        ];
        for record in &swapped {
            assert!(TaskValidation.validate(record, &repo).is_ok());
        }
        let found = violations(TaskValidation.validate_all(&swapped, &repo).unwrap_err());
        assert_eq!(found, vec!["task 1 would become its own ancestor".to_string()]);

        let twice = [Task::new(3, "a"), Task::new(3, "b")];
        let found = violations(TaskValidation.validate_all(&twice, &repo).unwrap_err());
        assert_eq!(found, vec!["task 3 appears more than once".to_string()]);
    }

    #[test]
    fn parent_submitted_in_the_same_batch_counts_as_existing() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteTaskRepository::new(&conn);
        let batch = [
            Task::new(2, "child").with_parent(1),
            Task::new(1, "parent"),
        ];
        assert!(TaskValidation.validate_all(&batch, &repo).is_ok());
    }

    #[test]
    fn deep_submitted_chain_is_checked_without_recursion() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteTaskRepository::new(&conn);
        let batch: Vec<Task> = (1..=20_000)
            .map(|id| {
                let task = Task::new(id, "link");
                if id > 1 {
                    task.with_parent(id - 1)
                } else {
                    task
                }
            })
            .collect();
        assert!(TaskValidation.validate_all(&batch, &repo).is_ok());
    }

    #[test]
    fn existing_parent_outside_the_subtree_passes() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteTaskRepository::new(&conn);
        repo.save(&Task::new(1, "one")).unwrap();
        repo.save(&Task::new(2, "two")).unwrap();

        let reparented = Task::new(2, "two").with_parent(1);
        assert!(TaskValidation.validate(&reparented, &repo).is_ok());
    }
}
