//! Repository layer: statement execution and record shaping per entity.
//!
//! # Responsibility
//! - Define the entity CRUD contract used by resources and validation rules.
//! - Keep SQL, binding and flat/tree translation behind that contract.
//!
//! # Invariants
//! - Only repositories translate between rows and trees.
//! - Storage faults are returned unchanged as `RepoError::Db`.

pub mod entity_repo;
pub mod hierarchy;
pub mod pagination;
pub mod task_repo;
