//! Transport-neutral request and response values of the entity endpoints.

use crate::repo::pagination::QueryParams;
use http::header::{HeaderMap, HeaderValue, InvalidHeaderValue, LOCATION};
use http::StatusCode;
use serde::Serialize;
use std::collections::BTreeMap;

/// Protocol version reported in multi-status items.
pub const PROTOCOL_VERSION: &str = "1.1";

/// One call against an entity endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityRequest {
    /// Request path without query string, e.g. `/entities/task`.
    pub path: String,
    /// Values captured from the path, keyed by key attribute name.
    pub path_keys: BTreeMap<String, String>,
    /// Decoded query parameters.
    pub query: QueryParams,
    /// Parsed JSON body, if any.
    pub body: Option<serde_json::Value>,
}

impl EntityRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_path_key(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_keys.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Outcome of an entity endpoint call.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityResponse {
    pub status: StatusCode,
    /// Reason phrase overriding the canonical one of `status`.
    pub reason: Option<String>,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

impl EntityResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            reason: None,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// 200 carrying `body`.
    pub fn ok(body: serde_json::Value) -> Self {
        Self::new(StatusCode::OK).with_body(body)
    }

    /// 201 pointing at the created record.
    pub fn created(location: &str) -> Result<Self, InvalidHeaderValue> {
        let mut response = Self::new(StatusCode::CREATED);
        response
            .headers
            .insert(LOCATION, HeaderValue::from_str(location)?);
        Ok(response)
    }

    pub fn no_content() -> Self {
        Self::new(StatusCode::NO_CONTENT)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND)
    }

    /// 207 carrying one item per processed element.
    pub fn multi_status(items: serde_json::Value) -> Self {
        Self::new(StatusCode::MULTI_STATUS).with_body(items)
    }

    /// 400 with reason `Bad request. <message>` and an error body.
    pub fn bad_request(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            reason: Some(format!("Bad request. {message}")),
            ..Self::new(StatusCode::BAD_REQUEST)
        }
        .with_body(serde_json::json!({ "error": { "message": message } }))
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Reason phrase: the override, else the canonical phrase of `status`.
    pub fn reason_phrase(&self) -> &str {
        self.reason
            .as_deref()
            .or_else(|| self.status.canonical_reason())
            .unwrap_or("")
    }

    /// Value of the `Location` header, if present and printable.
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
    }

    /// Describes this response as one element of a 207 body; `href` is the
    /// submitted element the response belongs to.
    pub fn to_multi_status_item(&self, href: serde_json::Value) -> MultiStatusItem {
        let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in &self.headers {
            if let Ok(text) = value.to_str() {
                headers
                    .entry(name.as_str().to_string())
                    .or_default()
                    .push(text.to_string());
            }
        }

        MultiStatusItem {
            status: self.status.as_u16(),
            reason_phrase: self.reason_phrase().to_string(),
            protocol_version: PROTOCOL_VERSION,
            headers,
            body: self.body.clone(),
            href,
        }
    }
}

/// One element of a multi-status body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiStatusItem {
    pub status: u16,
    pub reason_phrase: String,
    pub protocol_version: &'static str,
    pub headers: BTreeMap<String, Vec<String>>,
    pub body: Option<serde_json::Value>,
    pub href: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::{EntityRequest, EntityResponse};
    use http::StatusCode;
    use serde_json::json;

    #[test]
    fn bad_request_prefixes_reason_and_fills_error_body() {
        let response = EntityResponse::bad_request("oops");
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.reason_phrase(), "Bad request. oops");
        assert_eq!(response.body, Some(json!({"error": {"message": "oops"}})));
    }

    #[test]
    fn canonical_reason_is_used_without_override() {
        assert_eq!(EntityResponse::no_content().reason_phrase(), "No Content");
        assert_eq!(EntityResponse::not_found().reason_phrase(), "Not Found");
    }

    #[test]
    fn created_sets_location() {
        let response = EntityResponse::created("/entities/task/1/").unwrap();
        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.location(), Some("/entities/task/1/"));
        assert!(EntityResponse::created("bad\nvalue").is_err());
    }

    #[test]
    fn multi_status_item_uses_camel_case_fields() {
        let item = EntityResponse::created("/entities/task/3/")
            .unwrap()
            .to_multi_status_item(json!({"id": 3}));
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["status"], json!(201));
        assert_eq!(value["reasonPhrase"], json!("Created"));
        assert_eq!(value["protocolVersion"], json!("1.1"));
        assert_eq!(value["headers"]["location"], json!(["/entities/task/3/"]));
        assert_eq!(value["body"], json!(null));
        assert_eq!(value["href"], json!({"id": 3}));
    }

    #[test]
    fn request_builders_collect_parts() {
        let request = EntityRequest::new("/entities/task")
            .with_path_key("id", "7")
            .with_query("limit", "2")
            .with_body(json!({}));
        assert_eq!(request.path_keys["id"], "7");
        assert_eq!(request.query["limit"], "2");
        assert!(request.body.is_some());
    }
}
