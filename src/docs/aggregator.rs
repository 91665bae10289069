//! # Schema Aggregator
//!
//! Produces one merged OpenAPI document describing every registered
//! backend. One fetch task is spawned per (service, version), each bounded
//! by its own timeout; a stuck or failing backend never blocks or cancels
//! its siblings, and the aggregator waits for all fetches to settle before
//! merging. A failed fetch degrades to a placeholder path for that service
//! only.
//!
//! For each successful backend the document is rewritten before merging:
//! the service's declared URL prefix is stripped from its paths, methods
//! with no configured routing rule are dropped (undocumented access is not
//! advertised), the path is re-keyed under `/{service}/api/{version}/...`,
//! unreachable components are pruned, and colliding component names are
//! suffixed with the service and version.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{error, info};

use crate::core::context::{RequestContext, REQUEST_ID_HEADER};
use crate::docs::components::{merge_document, prune_unreachable, resolve_collisions};
use crate::docs::schema::{base_document, bearer_requirement, placeholder_path, seed_login_endpoint};
use crate::onboarding::registry::{DocsEntry, DocumentationRegistry, RoutingTable, ServiceKey};

/// Which documentation set a merged document covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocsMode {
    #[default]
    Internal,
    External,
}

/// Per-backend fetch failure; never escapes the aggregator
enum SchemaFetchError {
    Timeout,
    Transport(String),
    Status(u16),
    Decode(String),
}

impl fmt::Display for SchemaFetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "fetch timed out"),
            Self::Transport(e) => write!(f, "transport failure: {e}"),
            Self::Status(code) => write!(f, "non-success status {code}"),
            Self::Decode(e) => write!(f, "undecodable body: {e}"),
        }
    }
}

pub struct SchemaAggregator {
    client: reqwest::Client,
    routing: Arc<RoutingTable>,
    docs: Arc<DocumentationRegistry>,
    fetch_timeout: Duration,
    public_url: String,
}

impl SchemaAggregator {
    pub fn new(
        client: reqwest::Client,
        routing: Arc<RoutingTable>,
        docs: Arc<DocumentationRegistry>,
        fetch_timeout: Duration,
        public_url: String,
    ) -> Self {
        Self {
            client,
            routing,
            docs,
            fetch_timeout,
            public_url,
        }
    }

    /// Build the merged document for one documentation set
    ///
    /// Deterministic for a fixed set of backend documents: services are
    /// visited in registry order and all maps are key-ordered, so repeated
    /// aggregation yields identical output.
    pub async fn aggregate(&self, mode: DocsMode, ctx: &RequestContext) -> Value {
        let mut merged = base_document(&self.public_url);
        if mode == DocsMode::External {
            seed_login_endpoint(&mut merged);
        }

        let entries: Vec<(ServiceKey, DocsEntry)> = match mode {
            DocsMode::Internal => self
                .docs
                .internal()
                .map(|(k, e)| (k.clone(), e.clone()))
                .collect(),
            DocsMode::External => self
                .docs
                .external()
                .map(|(k, e)| (k.clone(), e.clone()))
                .collect(),
        };

        let fetches = entries.iter().map(|(key, entry)| {
            let task = tokio::spawn(fetch_schema(
                self.client.clone(),
                entry.openapi_url.clone(),
                self.fetch_timeout,
                ctx.id.clone(),
            ));
            async move {
                match task.await {
                    Ok(result) => result,
                    Err(e) => Err(SchemaFetchError::Transport(format!("fetch task failed: {e}"))),
                }
            }
        });
        let results = join_all(fetches).await;

        for ((key, entry), result) in entries.iter().zip(results) {
            match result {
                Err(e) => {
                    error!(
                        request_id = %ctx.id,
                        service = %key,
                        url = %entry.openapi_url,
                        error = %e,
                        "Failed to fetch backend OpenAPI schema"
                    );
                    let (path, item) = placeholder_path(key);
                    merged["paths"][path] = item;
                }
                Ok(fetched) => {
                    info!(
                        request_id = %ctx.id,
                        service = %key,
                        "Fetched backend OpenAPI schema"
                    );

                    let mut rewritten = json!({
                        "paths": self.rewrite_paths(&fetched, key, entry),
                        "components": fetched.get("components").cloned().unwrap_or(json!({})),
                    });

                    prune_unreachable(&mut rewritten);
                    resolve_collisions(&mut rewritten, &merged, &key.name, &key.version);
                    merge_document(&mut merged, &rewritten);
                }
            }
        }

        merged
    }

    /// Rewrite one backend's paths into the gateway's namespace
    ///
    /// Paths and methods with no configured routing rule are dropped; kept
    /// operations are re-tagged with the service/tag/version chain and the
    /// bearer security requirement.
    fn rewrite_paths(&self, fetched: &Value, key: &ServiceKey, entry: &DocsEntry) -> Value {
        let mut rewritten = Map::new();

        let Some(paths) = fetched.get("paths").and_then(Value::as_object) else {
            return Value::Object(rewritten);
        };
        let Some(routes) = self.routing.routes(&key.name, &key.version) else {
            return Value::Object(rewritten);
        };

        for (path, item) in paths {
            let trimmed = match entry.path_prefix.as_str() {
                "" => path.as_str(),
                prefix => path.strip_prefix(prefix).unwrap_or(path),
            };

            let Some(rule) = routes.matching_rule(trimmed) else {
                continue;
            };
            let Some(operations) = item.as_object() else {
                continue;
            };

            let new_path = format!("/{}/api/{}{}", key.name, key.version, trimmed);
            for (method, operation) in operations {
                // OpenAPI keys its operations by lowercase method.
                if rule.policy(&method.to_uppercase()).is_none() {
                    continue;
                }

                let mut operation = operation.clone();
                let existing_tags = operation
                    .get("tags")
                    .and_then(Value::as_array)
                    .map(|tags| {
                        tags.iter()
                            .filter_map(Value::as_str)
                            .fold(String::new(), |acc, t| format!("{acc}|{t}"))
                    })
                    .unwrap_or_default();

                operation["tags"] = json!([format!(
                    "{}|{}|{}{existing_tags}",
                    key.name.to_uppercase(),
                    entry.tag,
                    key.version
                )]);
                operation["security"] = bearer_requirement();

                rewritten
                    .entry(new_path.clone())
                    .or_insert_with(|| json!({}))[method] = operation;
            }
        }

        // Re-keyed paths that kept no operation are not advertised at all.
        rewritten.retain(|_, item| item.as_object().is_some_and(|ops| !ops.is_empty()));

        Value::Object(rewritten)
    }
}

/// One bounded fetch of a backend's OpenAPI document
async fn fetch_schema(
    client: reqwest::Client,
    url: String,
    timeout: Duration,
    request_id: String,
) -> Result<Value, SchemaFetchError> {
    let fetch = async {
        let response = client
            .get(&url)
            .header(REQUEST_ID_HEADER, &request_id)
            .send()
            .await
            .map_err(|e| SchemaFetchError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SchemaFetchError::Status(response.status().as_u16()));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| SchemaFetchError::Decode(e.to_string()))
    };

    tokio::time::timeout(timeout, fetch)
        .await
        .map_err(|_| SchemaFetchError::Timeout)?
}
