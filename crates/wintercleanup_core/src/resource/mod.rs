//! Entity endpoints: request handling on top of repositories.
//!
//! # Responsibility
//! - Translate entity requests into repository calls and status codes.
//! - Route requests to the endpoint registered for an entity name.
//!
//! # Invariants
//! - Client faults (missing keys, malformed bodies, rejected records) are
//!   answered with a 400 response, never returned as `Err`.
//! - Storage and integrity faults are returned as `Err` unchanged.

use crate::repo::entity_repo::RepoError;
use http::header::InvalidHeaderValue;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod entity_resource;
pub mod message;
pub mod registry;

pub use entity_resource::EntityResource;
pub use message::{EntityRequest, EntityResponse, MultiStatusItem};
pub use registry::{task_registry, EntityEndpoint, EntityRegistry, RegistryError};

pub type ResourceResult<T> = Result<T, ResourceError>;

/// Server-side faults raised while answering an entity request.
#[derive(Debug)]
pub enum ResourceError {
    /// Repository or validation storage fault.
    Repo(RepoError),
    /// A record could not be encoded as JSON.
    Encode(serde_json::Error),
    /// A generated header value is not valid.
    Header(InvalidHeaderValue),
}

impl Display for ResourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Encode(err) => write!(f, "failed to encode response body: {err}"),
            Self::Header(err) => write!(f, "invalid response header: {err}"),
        }
    }
}

impl Error for ResourceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Encode(err) => Some(err),
            Self::Header(err) => Some(err),
        }
    }
}

impl From<RepoError> for ResourceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<serde_json::Error> for ResourceError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encode(value)
    }
}

impl From<InvalidHeaderValue> for ResourceError {
    fn from(value: InvalidHeaderValue) -> Self {
        Self::Header(value)
    }
}
