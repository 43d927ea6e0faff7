//! Generic request handler for one entity.
//!
//! # Responsibility
//! - Check key attributes and integrity rules before any write.
//! - Map repository outcomes to 200/201/204/207/400/404 responses.
//! - Build the `Location` of created records from their key values.
//!
//! # Invariants
//! - All top-level records of a body are validated together before the
//!   first write.
//! - A bulk delete answers 207 with one item per submitted element, in order.

use crate::db::Params;
use crate::model::{scalar_from_str, scalar_to_path_segment, Entity};
use crate::repo::entity_repo::EntityRepository;
use crate::resource::message::{EntityRequest, EntityResponse};
use crate::resource::ResourceResult;
use crate::validation::{check_key_attributes, ValidationError, ValidationRule};
use rusqlite::types::Value;
use serde_json::Value as Json;
use std::marker::PhantomData;

/// Endpoint for entity `E` backed by repository `R` and integrity rule `V`.
pub struct EntityResource<E, R, V> {
    repo: R,
    rule: V,
    entity: PhantomData<fn() -> E>,
}

impl<E, R, V> EntityResource<E, R, V>
where
    E: Entity,
    R: EntityRepository<E>,
    V: ValidationRule<E>,
{
    pub fn new(repo: R, rule: V) -> Self {
        Self {
            repo,
            rule,
            entity: PhantomData,
        }
    }

    /// Returns one record when the path names every key attribute, otherwise
    /// the (possibly empty) list selected by the query parameters.
    pub fn get(&self, request: &EntityRequest) -> ResourceResult<EntityResponse> {
        let mut keys = Params::new();
        let mut fully_keyed = true;
        for name in E::KEY_ATTRIBUTES {
            let value = match request.path_keys.get(*name) {
                Some(raw) => scalar_from_str(raw),
                None => {
                    fully_keyed = false;
                    Value::Null
                }
            };
            keys.insert((*name).to_string(), value);
        }

        let records = self.repo.get(&keys, &request.query)?;
        if !fully_keyed {
            return Ok(EntityResponse::ok(serde_json::to_value(&records)?));
        }
        match records.first() {
            Some(record) => Ok(EntityResponse::ok(serde_json::to_value(record)?)),
            None => Ok(EntityResponse::not_found()),
        }
    }

    /// Upserts the record (or array of records) in the body.
    ///
    /// 201 with `Location` when a record was created, 204 when every record
    /// already existed.
    pub fn create_or_update_one(&self, request: &EntityRequest) -> ResourceResult<EntityResponse> {
        let Some(body) = request.body.as_ref() else {
            return Ok(EntityResponse::bad_request("Request body is empty"));
        };
        let elements: Vec<&Json> = match body {
            Json::Array(items) => items.iter().collect(),
            single => vec![single],
        };
        if elements.is_empty() {
            return Ok(EntityResponse::bad_request("Request body holds no record"));
        }

        for element in &elements {
            if let Err(err) = check_key_attributes(element, E::KEY_ATTRIBUTES) {
                return Ok(EntityResponse::bad_request(err.to_string()));
            }
        }

        let mut records = Vec::with_capacity(elements.len());
        for element in &elements {
            match serde_json::from_value::<E>((*element).clone()) {
                Ok(record) => records.push(record),
                Err(err) => {
                    return Ok(EntityResponse::bad_request(format!(
                        "Malformed {} record: {err}",
                        E::NAME
                    )))
                }
            }
        }

        match self.rule.validate_all(&records, &self.repo) {
            Ok(()) => {}
            Err(err @ ValidationError::Rejected { .. }) => {
                return Ok(EntityResponse::bad_request(err.to_string()))
            }
            Err(ValidationError::Repo(err)) => return Err(err.into()),
        }

        let outcome = self.repo.save_all(&records)?;
        match outcome.created.first() {
            Some(position) => {
                let location = location_of::<E>(&request.path, elements[*position]);
                Ok(EntityResponse::created(&location)?)
            }
            None => Ok(EntityResponse::no_content()),
        }
    }

    /// Deletes the record in the body; an array body deletes every element
    /// and answers 207.
    pub fn delete_one(&self, request: &EntityRequest) -> ResourceResult<EntityResponse> {
        match request.body.as_ref() {
            None => Ok(EntityResponse::bad_request("Request body is empty")),
            Some(Json::Array(items)) => {
                let mut statuses = Vec::with_capacity(items.len());
                for item in items {
                    let single = EntityRequest {
                        body: Some(item.clone()),
                        ..request.clone()
                    };
                    let response = self.delete_one(&single)?;
                    statuses.push(response.to_multi_status_item(item.clone()));
                }
                Ok(EntityResponse::multi_status(serde_json::to_value(&statuses)?))
            }
            Some(single) => {
                if let Err(err) = check_key_attributes(single, E::KEY_ATTRIBUTES) {
                    return Ok(EntityResponse::bad_request(err.to_string()));
                }
                let record = match serde_json::from_value::<E>(single.clone()) {
                    Ok(record) => record,
                    Err(err) => {
                        return Ok(EntityResponse::bad_request(format!(
                            "Malformed {} record: {err}",
                            E::NAME
                        )))
                    }
                };
                if self.repo.delete(&record)? > 0 {
                    Ok(EntityResponse::no_content())
                } else {
                    Ok(EntityResponse::not_found())
                }
            }
        }
    }
}

/// `path`, a `/` if missing, then every key value followed by `/`.
fn location_of<E: Entity>(path: &str, element: &Json) -> String {
    let mut location = path.to_string();
    if !location.ends_with('/') {
        location.push('/');
    }
    for name in E::KEY_ATTRIBUTES {
        if let Some(value) = element.get(*name) {
            location.push_str(&scalar_to_path_segment(value));
        }
        location.push('/');
    }
    location
}
