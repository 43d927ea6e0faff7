//! Request target -> (entity, path keys, query) resolution.
//!
//! Each entity route is a regex whose named groups are key attributes.
//! `/entities/{other}` for an entity without route still resolves, so the
//! registry answers 404 for it; a known entity with a malformed key does not.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeMap;
use url::Url;
use wintercleanup_core::{EntityRequest, QueryParams};

/// A target resolved against the known routes.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub entity: String,
    pub request: EntityRequest,
}

struct Route {
    entity: &'static str,
    pattern: Regex,
}

pub struct Router {
    routes: Vec<Route>,
    fallback: Regex,
}

impl Router {
    /// Routes for every served entity.
    pub fn new() -> Result<Self> {
        Ok(Self {
            routes: vec![Route {
                entity: "task",
                pattern: Regex::new(r"^/entities/task(?:/(?P<id>[0-9]{1,}))?/?$")?,
            }],
            fallback: Regex::new(r"^/entities/(?P<entity>[^/?]+)")?,
        })
    }

    /// Splits `target` into path and query and matches the path.
    ///
    /// `Ok(None)` means no route matches.
    pub fn resolve(&self, target: &str) -> Result<Option<Resolved>> {
        let url = Url::parse("http://localhost/")?
            .join(target)
            .with_context(|| format!("invalid request target `{target}`"))?;
        let path = url.path().to_string();
        let query: QueryParams = url.query_pairs().into_owned().collect();

        for route in &self.routes {
            if let Some(captures) = route.pattern.captures(&path) {
                let path_keys: BTreeMap<String, String> = route
                    .pattern
                    .capture_names()
                    .flatten()
                    .filter_map(|name| {
                        captures
                            .name(name)
                            .map(|value| (name.to_string(), value.as_str().to_string()))
                    })
                    .collect();
                return Ok(Some(Resolved {
                    entity: route.entity.to_string(),
                    request: EntityRequest {
                        path: collection_path(route.entity),
                        path_keys,
                        query,
                        body: None,
                    },
                }));
            }
        }

        let Some(captures) = self.fallback.captures(&path) else {
            return Ok(None);
        };
        let entity = captures["entity"].to_string();
        if self.routes.iter().any(|route| route.entity == entity) {
            return Ok(None);
        }
        Ok(Some(Resolved {
            request: EntityRequest {
                path: collection_path(&entity),
                query,
                ..EntityRequest::default()
            },
            entity,
        }))
    }
}

fn collection_path(entity: &str) -> String {
    format!("/entities/{entity}")
}
