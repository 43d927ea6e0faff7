//! Core of the WinterCleanup entity endpoints.
//! Storage, the task hierarchy, validation and request handling live here;
//! transports only build `EntityRequest`s and print `EntityResponse`s.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod resource;
pub mod validation;

pub use db::{open_db, open_db_in_memory, DbError, DbResult, Params};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig, LoggingError};
pub use model::task::{Task, TaskId};
pub use model::Entity;
pub use repo::entity_repo::{
    EntityRepository, RepoError, RepoResult, SaveOutcome, SqliteEntityRepository,
};
pub use repo::pagination::{normalize, Pagination, QueryParams, UNBOUNDED_LIMIT};
pub use repo::task_repo::SqliteTaskRepository;
pub use resource::{
    task_registry, EntityEndpoint, EntityRegistry, EntityRequest, EntityResource,
    EntityResponse, RegistryError, ResourceError, ResourceResult,
};
pub use validation::{
    check_key_attributes, DeficientRecordError, NoValidation, TaskValidation, ValidationError,
    ValidationRule,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
