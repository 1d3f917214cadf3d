//! The Elasticsearch client facade: HTTP transport, index naming and the
//! write-index lifecycle.

use std::time::{Duration, Instant};

use chrono::Utc;
use elasticsearch::auth::Credentials;
use elasticsearch::cat::CatIndicesParts;
use elasticsearch::cert::CertificateValidation;
use elasticsearch::http::response::Response;
use elasticsearch::http::transport::{SingleNodeConnectionPool, TransportBuilder};
use elasticsearch::indices::{IndicesCreateParts, IndicesDeleteParts, IndicesGetAliasParts, IndicesRefreshParts};
use elasticsearch::{
    ClearScrollParts, CountParts, DeleteByQueryParts, DeleteParts, Elasticsearch, IndexParts,
    ScrollParts, SearchParts,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};

use crate::error::{BackendError, StoreResult, UsageError};
use crate::schema::EntityDescriptor;

use super::query::ElasticQuery;

/// How long a scroll context stays alive between page fetches.
pub(crate) const SCROLL_KEEP_ALIVE: &str = "1m";

/// Authentication for the Elasticsearch transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ElasticAuth {
    /// Basic username/password authentication.
    Basic {
        /// The username for basic auth.
        username: String,
        /// The password for basic auth.
        password: String,
    },
    /// Bearer token authentication.
    Bearer {
        /// The bearer token.
        token: String,
    },
}

/// Configuration for the Elasticsearch facade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticConfig {
    /// Node URLs; the first entry is used (single-node connection pool).
    #[serde(default = "default_nodes")]
    pub nodes: Vec<String>,

    /// Index name prefix; indices are named `{prefix}_{relation}`.
    #[serde(default = "default_index_prefix")]
    pub index_prefix: String,

    /// Optional authentication.
    #[serde(default)]
    pub auth: Option<ElasticAuth>,

    /// Request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Disable certificate validation (development/testing only).
    #[serde(default)]
    pub disable_certificate_validation: bool,

    /// Executions slower than this are logged with `tracing::warn!`.
    #[serde(default = "default_slow_query_threshold_ms")]
    pub slow_query_threshold_ms: u64,
}

fn default_nodes() -> Vec<String> {
    vec!["http://localhost:9200".to_string()]
}

fn default_index_prefix() -> String {
    "polystore".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30000
}

fn default_slow_query_threshold_ms() -> u64 {
    1000
}

impl Default for ElasticConfig {
    fn default() -> Self {
        Self {
            nodes: default_nodes(),
            index_prefix: default_index_prefix(),
            auth: None,
            request_timeout_ms: default_request_timeout_ms(),
            disable_certificate_validation: false,
            slow_query_threshold_ms: default_slow_query_threshold_ms(),
        }
    }
}

impl ElasticConfig {
    /// Sets the node URL.
    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.nodes = vec![node.into()];
        self
    }

    /// Sets the index prefix.
    pub fn with_index_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.index_prefix = prefix.into();
        self
    }

    /// Sets basic-auth credentials.
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.auth = Some(ElasticAuth::Basic {
            username: username.into(),
            password: password.into(),
        });
        self
    }
}

/// A row of [`Elastic::list_indices`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    /// Physical index name.
    pub name: String,
    /// Cluster health of the index (green/yellow/red).
    pub health: String,
    /// Document count, as reported by the cat API.
    pub docs: String,
    /// Store size, as reported by the cat API.
    pub size: String,
}

/// Elasticsearch facade.
///
/// Wraps the HTTP client (connections are managed by the transport) and owns
/// index naming plus the write-index lifecycle: searches go through the read
/// alias, (re)indexing goes through the write alias, and committing a write
/// index atomically moves the read alias over.
pub struct Elastic {
    client: Elasticsearch,
    config: ElasticConfig,
}

impl std::fmt::Debug for Elastic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Elastic")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Elastic {
    /// Creates a facade for the configured cluster.
    pub fn new(config: ElasticConfig) -> StoreResult<Self> {
        let url = config
            .nodes
            .first()
            .cloned()
            .unwrap_or_else(|| "http://localhost:9200".to_string());
        let parsed_url: elasticsearch::http::Url =
            url.parse().map_err(|e| BackendError::ConnectionFailed {
                backend_name: "elasticsearch".to_string(),
                message: format!("invalid node URL: {}", e),
            })?;

        let mut builder = TransportBuilder::new(SingleNodeConnectionPool::new(parsed_url))
            .timeout(Duration::from_millis(config.request_timeout_ms));
        if config.disable_certificate_validation {
            builder = builder.cert_validation(CertificateValidation::None);
        }
        if let Some(auth) = &config.auth {
            builder = match auth {
                ElasticAuth::Basic { username, password } => {
                    builder.auth(Credentials::Basic(username.clone(), password.clone()))
                }
                ElasticAuth::Bearer { token } => builder.auth(Credentials::Bearer(token.clone())),
            };
        }

        let transport = builder.build().map_err(|e| BackendError::ConnectionFailed {
            backend_name: "elasticsearch".to_string(),
            message: format!("failed to build transport: {}", e),
        })?;

        Ok(Self {
            client: Elasticsearch::new(transport),
            config,
        })
    }

    /// Starts a query against the given entity type.
    pub fn query<'a>(&'a self, descriptor: &'a EntityDescriptor) -> ElasticQuery<'a> {
        ElasticQuery::new(self, descriptor)
    }

    /// The active configuration.
    pub fn config(&self) -> &ElasticConfig {
        &self.config
    }

    /// The read alias (and base index name) for a relation.
    pub fn index_name(&self, relation: &str) -> String {
        format!("{}_{}", self.config.index_prefix, relation.to_lowercase())
    }

    /// The write alias for a relation.
    pub fn write_alias(&self, relation: &str) -> String {
        format!("{}-write", self.index_name(relation))
    }

    // ------------------------------------------------------------------
    // Write-index lifecycle
    // ------------------------------------------------------------------

    /// Creates a fresh timestamped physical index and points the write alias
    /// at it; returns the physical index name.
    ///
    /// Reads keep going through the read alias until
    /// [`Elastic::commit_write_index`] moves it over.
    pub async fn create_write_index(&self, relation: &str) -> StoreResult<String> {
        let write_alias = self.write_alias(relation);
        let physical = format!(
            "{}-{}",
            self.index_name(relation),
            Utc::now().format("%Y%m%d%H%M%S")
        );

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(&physical))
            .send()
            .await?;
        read_body(response).await?;

        let mut actions = Vec::new();
        if self.resolve_alias(&write_alias).await?.is_some() {
            actions.push(json!({ "remove": { "alias": write_alias, "index": "*" } }));
        }
        actions.push(json!({ "add": { "alias": write_alias, "index": physical } }));
        self.update_aliases(actions).await?;

        tracing::info!(relation, index = physical, "created write index");
        Ok(physical)
    }

    /// Commits the write index: the read alias is moved onto the physical
    /// index behind the write alias, which becomes the new serving index.
    pub async fn commit_write_index(&self, relation: &str) -> StoreResult<()> {
        let read_alias = self.index_name(relation);
        let write_alias = self.write_alias(relation);
        let target = self.resolve_alias(&write_alias).await?.ok_or_else(|| {
            BackendError::QueryFailed {
                backend_name: "elasticsearch".to_string(),
                message: format!("no write index installed for '{}'", relation),
                code: None,
            }
        })?;

        let mut actions = Vec::new();
        if self.resolve_alias(&read_alias).await?.is_some() {
            actions.push(json!({ "remove": { "alias": read_alias, "index": "*" } }));
        }
        actions.push(json!({ "add": { "alias": read_alias, "index": target } }));
        actions.push(json!({ "remove": { "alias": write_alias, "index": "*" } }));
        self.update_aliases(actions).await?;

        tracing::info!(relation, index = target, "committed write index");
        Ok(())
    }

    /// Rolls the write index back: the physical index behind the write alias
    /// is deleted and the write alias points at the serving read index again.
    pub async fn rollback_write_index(&self, relation: &str) -> StoreResult<()> {
        let read_alias = self.index_name(relation);
        let write_alias = self.write_alias(relation);
        let discarded = self.resolve_alias(&write_alias).await?.ok_or_else(|| {
            BackendError::QueryFailed {
                backend_name: "elasticsearch".to_string(),
                message: format!("no write index installed for '{}'", relation),
                code: None,
            }
        })?;

        let serving = self.resolve_alias(&read_alias).await?;
        if serving.as_deref() != Some(discarded.as_str()) {
            let response = self
                .client
                .indices()
                .delete(IndicesDeleteParts::Index(&[&discarded]))
                .send()
                .await?;
            read_body(response).await?;
        }
        if let Some(serving) = serving {
            self.update_aliases(vec![
                json!({ "add": { "alias": write_alias, "index": serving } }),
            ])
            .await?;
        }

        tracing::info!(relation, index = discarded, "rolled back write index");
        Ok(())
    }

    /// Deletes a physical index outright.
    ///
    /// Destructive and unrecoverable: `confirmation` must be the literal
    /// `YES` or a usage error is raised before contacting the cluster.
    pub async fn delete_index(&self, index: &str, confirmation: &str) -> StoreResult<()> {
        if confirmation != "YES" {
            return Err(UsageError::ConfirmationRequired {
                index: index.to_string(),
            }
            .into());
        }

        let response = self
            .client
            .indices()
            .delete(IndicesDeleteParts::Index(&[index]))
            .send()
            .await?;
        read_body(response).await?;
        tracing::info!(index, "deleted index");
        Ok(())
    }

    /// Resolves an alias to the physical index it points at.
    pub async fn resolve_alias(&self, alias: &str) -> StoreResult<Option<String>> {
        let response = self
            .client
            .indices()
            .get_alias(IndicesGetAliasParts::Name(&[alias]))
            .send()
            .await?;
        if response.status_code().as_u16() == 404 {
            return Ok(None);
        }

        let body = read_body(response).await?;
        let index = body
            .as_object()
            .and_then(|indices| indices.keys().next().cloned());
        Ok(index)
    }

    /// Lists all indices under the configured prefix via the cat API.
    pub async fn list_indices(&self) -> StoreResult<Vec<IndexInfo>> {
        let pattern = format!("{}_*", self.config.index_prefix);
        let response = self
            .client
            .cat()
            .indices(CatIndicesParts::Index(&[&pattern]))
            .format("json")
            .send()
            .await?;
        let body = read_body(response).await?;

        let rows = body.as_array().cloned().unwrap_or_default();
        let mut infos = Vec::with_capacity(rows.len());
        for row in rows {
            infos.push(IndexInfo {
                name: str_field(&row, "index"),
                health: str_field(&row, "health"),
                docs: str_field(&row, "docs.count"),
                size: str_field(&row, "store.size"),
            });
        }
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }

    /// Makes recently indexed documents searchable. Only needed in tests; the
    /// cluster refreshes on its own interval in production.
    pub async fn refresh(&self, relation: &str) -> StoreResult<()> {
        let index = self.index_name(relation);
        let response = self
            .client
            .indices()
            .refresh(IndicesRefreshParts::Index(&[&index]))
            .send()
            .await?;
        read_body(response).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Document operations
    // ------------------------------------------------------------------

    /// Indexes one document under the write alias (falling back to the read
    /// alias when no write index is installed).
    pub async fn index_document(&self, relation: &str, id: &str, document: Json) -> StoreResult<()> {
        let write_alias = self.write_alias(relation);
        let target = if self.resolve_alias(&write_alias).await?.is_some() {
            write_alias
        } else {
            self.index_name(relation)
        };

        let started = Instant::now();
        let response = self
            .client
            .index(IndexParts::IndexId(&target, id))
            .body(document)
            .send()
            .await?;
        read_body(response).await?;
        self.observe(started, "INDEX", &target);
        Ok(())
    }

    /// Deletes one document by identity; returns false when it did not exist.
    pub(crate) async fn delete_document(&self, index: &str, id: &str) -> StoreResult<bool> {
        let started = Instant::now();
        let response = self
            .client
            .delete(DeleteParts::IndexId(index, id))
            .send()
            .await?;
        if response.status_code().as_u16() == 404 {
            return Ok(false);
        }
        read_body(response).await?;
        self.observe(started, "DELETE", index);
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Search plumbing used by ElasticQuery
    // ------------------------------------------------------------------

    pub(crate) async fn search(&self, index: &str, body: Json) -> StoreResult<Json> {
        tracing::debug!(index, body = %body, "elasticsearch search");
        let started = Instant::now();
        let response = self
            .client
            .search(SearchParts::Index(&[index]))
            .body(body)
            .send()
            .await?;
        let parsed = read_body(response).await?;
        self.observe(started, "SEARCH", index);
        Ok(parsed)
    }

    pub(crate) async fn search_scroll(&self, index: &str, body: Json) -> StoreResult<Json> {
        tracing::debug!(index, body = %body, "elasticsearch scroll search");
        let started = Instant::now();
        let response = self
            .client
            .search(SearchParts::Index(&[index]))
            .scroll(SCROLL_KEEP_ALIVE)
            .body(body)
            .send()
            .await?;
        let parsed = read_body(response).await?;
        self.observe(started, "SEARCH SCROLL", index);
        Ok(parsed)
    }

    pub(crate) async fn continue_scroll(&self, scroll_id: &str) -> StoreResult<Json> {
        let response = self
            .client
            .scroll(ScrollParts::None)
            .body(json!({
                "scroll": SCROLL_KEEP_ALIVE,
                "scroll_id": scroll_id
            }))
            .send()
            .await?;
        read_body(response).await
    }

    pub(crate) async fn clear_scroll(&self, scroll_id: &str) -> StoreResult<()> {
        let response = self
            .client
            .clear_scroll(ClearScrollParts::None)
            .body(json!({ "scroll_id": [scroll_id] }))
            .send()
            .await?;
        read_body(response).await?;
        Ok(())
    }

    pub(crate) async fn count(&self, index: &str, query: Json) -> StoreResult<u64> {
        let started = Instant::now();
        let response = self
            .client
            .count(CountParts::Index(&[index]))
            .body(json!({ "query": query }))
            .send()
            .await?;
        let body = read_body(response).await?;
        self.observe(started, "COUNT", index);
        Ok(body["count"].as_u64().unwrap_or_default())
    }

    pub(crate) async fn delete_by_query(&self, index: &str, query: Json) -> StoreResult<u64> {
        let started = Instant::now();
        let response = self
            .client
            .delete_by_query(DeleteByQueryParts::Index(&[index]))
            .body(json!({ "query": query }))
            .send()
            .await?;
        let body = read_body(response).await?;
        self.observe(started, "DELETE BY QUERY", index);
        Ok(body["deleted"].as_u64().unwrap_or_default())
    }

    async fn update_aliases(&self, actions: Vec<Json>) -> StoreResult<()> {
        let response = self
            .client
            .indices()
            .update_aliases()
            .body(json!({ "actions": actions }))
            .send()
            .await?;
        read_body(response).await?;
        Ok(())
    }

    /// Records one execution; slow ones are warned about.
    pub(crate) fn observe(&self, started: Instant, operation: &str, index: &str) {
        let elapsed = started.elapsed();
        tracing::debug!(
            operation,
            index,
            elapsed_ms = elapsed.as_millis() as u64,
            "elasticsearch call"
        );
        if elapsed > Duration::from_millis(self.config.slow_query_threshold_ms) {
            tracing::warn!(
                operation,
                index,
                elapsed_ms = elapsed.as_millis() as u64,
                threshold_ms = self.config.slow_query_threshold_ms,
                "slow elasticsearch call"
            );
        }
    }
}

fn str_field(row: &Json, name: &str) -> String {
    row[name].as_str().unwrap_or("-").to_string()
}

/// Parses a response body, turning non-success statuses into
/// [`BackendError::QueryFailed`] with the cluster's error type as code.
async fn read_body(response: Response) -> StoreResult<Json> {
    let status = response.status_code();
    let body: Json = response
        .json()
        .await
        .map_err(|e| BackendError::ResponseFormat {
            backend_name: "elasticsearch".to_string(),
            message: e.to_string(),
        })?;

    if !status.is_success() {
        let message = body["error"]["reason"]
            .as_str()
            .unwrap_or("request failed")
            .to_string();
        let code = body["error"]["type"]
            .as_str()
            .map(str::to_string)
            .or_else(|| Some(status.as_u16().to_string()));
        return Err(BackendError::QueryFailed {
            backend_name: "elasticsearch".to_string(),
            message,
            code,
        }
        .into());
    }
    Ok(body)
}
