//! Explicit entity name -> endpoint routing.
//!
//! # Invariants
//! - An entity name is registered at most once.
//! - Only registered entity names are served; others answer 404.
//! - Only `GET`, `POST` and `DELETE` are served; others answer 405.

use crate::model::task::Task;
use crate::model::Entity;
use crate::repo::entity_repo::EntityRepository;
use crate::repo::task_repo::SqliteTaskRepository;
use crate::resource::entity_resource::EntityResource;
use crate::resource::message::{EntityRequest, EntityResponse};
use crate::resource::ResourceResult;
use crate::validation::{TaskValidation, ValidationRule};
use http::header::{HeaderValue, ALLOW};
use http::{Method, StatusCode};
use log::{info, warn};
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

const ALLOWED_METHODS: &str = "GET, POST, DELETE";

/// Object-safe view of one entity's request handlers.
pub trait EntityEndpoint {
    /// Name the endpoint is registered under.
    fn entity_name(&self) -> &'static str;
    fn get(&self, request: &EntityRequest) -> ResourceResult<EntityResponse>;
    fn create_or_update_one(&self, request: &EntityRequest) -> ResourceResult<EntityResponse>;
    fn delete_one(&self, request: &EntityRequest) -> ResourceResult<EntityResponse>;
}

impl<E, R, V> EntityEndpoint for EntityResource<E, R, V>
where
    E: Entity,
    R: EntityRepository<E>,
    V: ValidationRule<E>,
{
    fn entity_name(&self) -> &'static str {
        E::NAME
    }

    fn get(&self, request: &EntityRequest) -> ResourceResult<EntityResponse> {
        EntityResource::get(self, request)
    }

    fn create_or_update_one(&self, request: &EntityRequest) -> ResourceResult<EntityResponse> {
        EntityResource::create_or_update_one(self, request)
    }

    fn delete_one(&self, request: &EntityRequest) -> ResourceResult<EntityResponse> {
        EntityResource::delete_one(self, request)
    }
}

/// Registration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    DuplicateEntity(&'static str),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateEntity(name) => write!(f, "entity already registered: {name}"),
        }
    }
}

impl Error for RegistryError {}

/// Endpoints keyed by entity name.
#[derive(Default)]
pub struct EntityRegistry<'a> {
    endpoints: BTreeMap<&'static str, Box<dyn EntityEndpoint + 'a>>,
}

impl<'a> EntityRegistry<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `endpoint` under its entity name.
    pub fn register(&mut self, endpoint: impl EntityEndpoint + 'a) -> Result<(), RegistryError> {
        let name = endpoint.entity_name();
        if self.endpoints.contains_key(name) {
            return Err(RegistryError::DuplicateEntity(name));
        }
        self.endpoints.insert(name, Box::new(endpoint));
        Ok(())
    }

    /// Registered entity names in sorted order.
    pub fn entity_names(&self) -> Vec<&'static str> {
        self.endpoints.keys().copied().collect()
    }

    /// Routes `request` to the handler of `entity` for `method`.
    pub fn dispatch(
        &self,
        method: &Method,
        entity: &str,
        request: &EntityRequest,
    ) -> ResourceResult<EntityResponse> {
        let started_at = Instant::now();
        let Some(endpoint) = self.endpoints.get(entity) else {
            info!(
                "event=entity_request module=resource status=unknown_entity method={method} entity={entity}"
            );
            return Ok(EntityResponse::not_found());
        };

        let response = if *method == Method::GET {
            endpoint.get(request)
        } else if *method == Method::POST {
            endpoint.create_or_update_one(request)
        } else if *method == Method::DELETE {
            endpoint.delete_one(request)
        } else {
            let mut response = EntityResponse::new(StatusCode::METHOD_NOT_ALLOWED);
            response
                .headers
                .insert(ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
            Ok(response)
        };

        match &response {
            Ok(answer) => info!(
                "event=entity_request module=resource status=ok method={} entity={} http_status={} duration_ms={}",
                method,
                entity,
                answer.status.as_u16(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=entity_request module=resource status=error method={} entity={} error={} duration_ms={}",
                method,
                entity,
                err,
                started_at.elapsed().as_millis()
            ),
        }
        response
    }
}

/// Registry serving the task endpoint over `conn`.
pub fn task_registry(conn: &Connection) -> Result<EntityRegistry<'_>, RegistryError> {
    let mut registry = EntityRegistry::new();
    registry.register(EntityResource::<Task, _, _>::new(
        SqliteTaskRepository::new(conn),
        TaskValidation,
    ))?;
    Ok(registry)
}
