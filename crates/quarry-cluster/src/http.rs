//! [`ClusterClient`] over an Elasticsearch-compatible REST API.
//!
//! Endpoints used:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | index_exists | `HEAD /{index}` |
//! | create_index | `PUT /{index}` |
//! | index | `PUT /{index}/_doc/{id}` |
//! | delete | `DELETE /{index}/_doc/{id}` |
//! | delete_by_query | `POST /{index}/_delete_by_query?conflicts=proceed` |
//! | refresh | `POST /{index}/_refresh` |
//! | flush | `POST /{index}/_flush` |
//! | force_merge | `POST /{index}/_forcemerge?max_num_segments=1` |
//! | get | `GET /{index}/_doc/{id}?realtime=false` |
//! | count | `POST /{index}/_count` |
//! | search | `POST /{index}/_search` |

use std::time::Duration;

use async_trait::async_trait;
use quarry_core::{Error, Result};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::client::{ClusterClient, ClusterHit, missing_index};
use crate::document::ClusterDocument;
use crate::query::ClusterQuery;

/// Connection settings of an HTTP cluster client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpClusterConfig {
    /// Base URL, e.g. `http://localhost:9200`.
    pub url: String,

    /// Request timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Basic auth user.
    #[serde(default)]
    pub username: Option<String>,

    /// Basic auth password.
    #[serde(default)]
    pub password: Option<String>,
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl HttpClusterConfig {
    /// Settings for `url` with defaults for everything else.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_ms: default_timeout_ms(),
            username: None,
            password: None,
        }
    }
}

/// HTTP client for one cluster.
#[derive(Debug, Clone)]
pub struct HttpClusterClient {
    base: Url,
    http: Client,
    credentials: Option<(String, Option<String>)>,
}

impl HttpClusterClient {
    /// Client for the cluster at `url`.
    pub fn new(url: &str) -> Result<Self> {
        Self::from_config(&HttpClusterConfig::new(url))
    }

    /// Client from connection settings.
    pub fn from_config(config: &HttpClusterConfig) -> Result<Self> {
        let base = Url::parse(&config.url)
            .map_err(|e| Error::config(format!("Invalid cluster URL '{}': {e}", config.url)))?;
        if base.cannot_be_a_base() {
            return Err(Error::config(format!("Invalid cluster URL '{}'", config.url)));
        }
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;
        let credentials = config
            .username
            .clone()
            .map(|user| (user, config.password.clone()));
        Ok(Self {
            base,
            http,
            credentials,
        })
    }

    /// Base URL of the cluster.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::config(format!("Invalid cluster URL '{}'", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.http.request(method, url);
        match &self.credentials {
            Some((user, password)) => request.basic_auth(user, password.as_deref()),
            None => request,
        }
    }

    async fn send(&self, index: &str, request: RequestBuilder) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::backend_with_source(format!("Request to '{index}' failed"), e))?;
        check_status(index, response).await
    }

    async fn post(&self, index: &str, url: Url, body: Option<Value>) -> Result<Response> {
        let request = self.request(Method::POST, url);
        let request = match body {
            Some(body) => request.json(&body),
            None => request,
        };
        self.send(index, request).await
    }
}

/// Map a non-success status into an error.
///
/// 404 bodies that report a missing index are fatal; a 404 for a missing
/// document is passed through for the caller to handle.
async fn check_status(index: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if error_type(&body) == Some("index_not_found_exception") {
            return Err(missing_index(index));
        }
        return Err(Error::not_found(index, "document"));
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::backend(format!(
        "Cluster returned HTTP {status} for '{index}': {body}"
    )))
}

fn error_type(body: &Value) -> Option<&str> {
    body.get("error")?.get("type")?.as_str()
}

async fn read_json(index: &str, response: Response) -> Result<Value> {
    response
        .json()
        .await
        .map_err(|e| Error::backend_with_source(format!("Invalid response from '{index}'"), e))
}

#[async_trait]
impl ClusterClient for HttpClusterClient {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        let request = self.request(Method::HEAD, self.url(&[index])?);
        let response = request
            .send()
            .await
            .map_err(|e| Error::backend_with_source(format!("Request to '{index}' failed"), e))?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(Error::backend(format!(
                "Cluster returned HTTP {status} for '{index}'"
            ))),
        }
    }

    async fn create_index(&self, index: &str, mappings: &Value) -> Result<()> {
        let request = self
            .request(Method::PUT, self.url(&[index])?)
            .json(&json!({"mappings": mappings}));
        self.send(index, request).await?;
        tracing::info!(index, "remote index created");
        Ok(())
    }

    async fn index(&self, index: &str, document: &ClusterDocument) -> Result<()> {
        let request = self
            .request(Method::PUT, self.url(&[index, "_doc", &document.id])?)
            .json(&document.source);
        self.send(index, request).await?;
        Ok(())
    }

    async fn delete(&self, index: &str, id: &str) -> Result<()> {
        let request = self.request(Method::DELETE, self.url(&[index, "_doc", id])?);
        match self.send(index, request).await {
            Ok(_) | Err(Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn delete_by_query(&self, index: &str, query: &ClusterQuery) -> Result<()> {
        let mut url = self.url(&[index, "_delete_by_query"])?;
        url.query_pairs_mut().append_pair("conflicts", "proceed");
        self.post(index, url, Some(json!({"query": query.to_dsl()})))
            .await?;
        Ok(())
    }

    async fn refresh(&self, index: &str) -> Result<()> {
        self.post(index, self.url(&[index, "_refresh"])?, None).await?;
        Ok(())
    }

    async fn flush(&self, index: &str) -> Result<()> {
        self.post(index, self.url(&[index, "_flush"])?, None).await?;
        Ok(())
    }

    async fn force_merge(&self, index: &str) -> Result<()> {
        let mut url = self.url(&[index, "_forcemerge"])?;
        url.query_pairs_mut().append_pair("max_num_segments", "1");
        self.post(index, url, None).await?;
        Ok(())
    }

    async fn get(&self, index: &str, id: &str) -> Result<Option<Value>> {
        let mut url = self.url(&[index, "_doc", id])?;
        url.query_pairs_mut().append_pair("realtime", "false");
        let response = match self.send(index, self.request(Method::GET, url)).await {
            Ok(response) => response,
            Err(Error::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        let mut body = read_json(index, response).await?;
        if body.get("found").and_then(Value::as_bool) != Some(true) {
            return Ok(None);
        }
        Ok(body.get_mut("_source").map(Value::take))
    }

    async fn count(&self, index: &str, query: &ClusterQuery) -> Result<u64> {
        let url = self.url(&[index, "_count"])?;
        let response = self
            .post(index, url, Some(json!({"query": query.to_dsl()})))
            .await?;
        let body = read_json(index, response).await?;
        body.get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::backend(format!("Count response from '{index}' has no count")))
    }

    async fn search(
        &self,
        index: &str,
        query: &ClusterQuery,
        limit: usize,
    ) -> Result<Vec<ClusterHit>> {
        let url = self.url(&[index, "_search"])?;
        let body = json!({"query": query.to_dsl(), "size": limit});
        let response = self.post(index, url, Some(body)).await?;
        let mut body = read_json(index, response).await?;

        let hits = match body.pointer_mut("/hits/hits") {
            Some(Value::Array(hits)) => std::mem::take(hits),
            _ => {
                return Err(Error::backend(format!(
                    "Search response from '{index}' has no hits"
                )));
            }
        };
        hits.into_iter()
            .map(|mut hit| {
                let id = hit
                    .get("_id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| Error::backend("Search hit has no _id"))?;
                let score = hit.get("_score").and_then(Value::as_f64).unwrap_or(1.0) as f32;
                let source = hit
                    .get_mut("_source")
                    .map(Value::take)
                    .ok_or_else(|| Error::backend("Search hit has no _source"))?;
                Ok(ClusterHit { id, score, source })
            })
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
