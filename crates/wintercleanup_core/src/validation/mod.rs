//! Write-path checks: key completeness and per-entity integrity rules.
//!
//! # Responsibility
//! - Reject request bodies that lack key attributes before any statement runs.
//! - Run the integrity rule injected for an entity over a whole request body
//!   and aggregate violations.
//!
//! # Invariants
//! - Both checks complete before the first mutating statement.
//! - Storage faults met while validating surface as faults, not violations.

use crate::model::Entity;
use crate::repo::entity_repo::{EntityRepository, RepoError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod task_rules;

pub use task_rules::TaskValidation;

/// One or more key attributes are absent (or null) in a request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeficientRecordError {
    pub missing: Vec<String>,
}

impl Display for DeficientRecordError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let names = self.missing.join(", ");
        if self.missing.len() == 1 {
            write!(f, "Key attribute \"{names}\" is missing from the request body")
        } else {
            write!(f, "Key attributes \"{names}\" are missing from the request body")
        }
    }
}

impl Error for DeficientRecordError {}

/// Checks that `body` carries a non-null value for every key attribute.
///
/// A body that is not a JSON object lacks every key attribute.
pub fn check_key_attributes(
    body: &serde_json::Value,
    key_attributes: &[&str],
) -> Result<(), DeficientRecordError> {
    let missing: Vec<String> = key_attributes
        .iter()
        .filter(|name| body.get(**name).map_or(true, serde_json::Value::is_null))
        .map(|name| (*name).to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(DeficientRecordError { missing })
    }
}

/// Outcome of an integrity rule that did not pass.
#[derive(Debug)]
pub enum ValidationError {
    /// The record breaks one or more integrity rules.
    Rejected {
        entity: &'static str,
        violations: Vec<String>,
    },
    /// The rule could not consult storage.
    Repo(RepoError),
}

impl ValidationError {
    /// Builds a rejection from collected violations, or `None` if there are none.
    pub fn from_violations(entity: &'static str, violations: Vec<String>) -> Option<Self> {
        if violations.is_empty() {
            None
        } else {
            Some(Self::Rejected { entity, violations })
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected { entity, violations } => {
                write!(f, "Invalid {entity}: {}", violations.join("; "))
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Rejected { .. } => None,
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for ValidationError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Integrity check run against a candidate record before it is written.
pub trait ValidationRule<E: Entity> {
    /// Returns `Err(ValidationError::Rejected)` listing every broken rule.
    fn validate(&self, record: &E, repo: &dyn EntityRepository<E>) -> Result<(), ValidationError>;

    /// Checks every top-level record of one request body before any of them
    /// is written. Rules that relate records to each other override this.
    fn validate_all(
        &self,
        records: &[E],
        repo: &dyn EntityRepository<E>,
    ) -> Result<(), ValidationError> {
        for record in records {
            self.validate(record, repo)?;
        }
        Ok(())
    }
}

/// Rule for entities without integrity constraints.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoValidation;

impl<E: Entity> ValidationRule<E> for NoValidation {
    fn validate(&self, _record: &E, _repo: &dyn EntityRepository<E>) -> Result<(), ValidationError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{check_key_attributes, DeficientRecordError, ValidationError};
    use serde_json::json;

    #[test]
    fn complete_body_passes() {
        assert!(check_key_attributes(&json!({"id": 1, "title": "x"}), &["id"]).is_ok());
    }

    #[test]
    fn null_counts_as_missing() {
        let err = check_key_attributes(&json!({"id": null}), &["id"]).unwrap_err();
        assert_eq!(err.missing, vec!["id".to_string()]);
    }

    #[test]
    fn message_is_singular_for_one_attribute() {
        let err = check_key_attributes(&json!({}), &["id"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Key attribute \"id\" is missing from the request body"
        );
    }

    #[test]
    fn message_is_plural_for_several_attributes() {
        let err = DeficientRecordError {
            missing: vec!["mcc_mnc".to_string(), "range_start".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Key attributes \"mcc_mnc, range_start\" are missing from the request body"
        );
    }

    #[test]
    fn non_object_body_lacks_every_key() {
        let err = check_key_attributes(&json!("oops"), &["a", "b"]).unwrap_err();
        assert_eq!(err.missing.len(), 2);
    }

    #[test]
    fn rejection_joins_violations() {
        let err = ValidationError::from_violations("task", vec!["a".into(), "b".into()]).unwrap();
        assert_eq!(err.to_string(), "Invalid task: a; b");
        assert!(ValidationError::from_violations("task", Vec::new()).is_none());
    }
}
