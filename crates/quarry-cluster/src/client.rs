//! The request surface of a document cluster.

use async_trait::async_trait;
use quarry_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::ClusterDocument;
use crate::query::ClusterQuery;

/// One search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterHit {
    /// Document id.
    pub id: String,
    /// Relevance score.
    pub score: f32,
    /// Document body.
    pub source: Value,
}

/// Operations the cluster backend needs from a remote cluster.
///
/// Every call names the remote index it targets. A missing remote index is
/// reported as a fatal [`Error::Backend`]; transport failures and server
/// errors are not fatal.
#[async_trait]
pub trait ClusterClient: Send + Sync + 'static {
    /// Whether a remote index exists.
    async fn index_exists(&self, index: &str) -> Result<bool>;

    /// Create a remote index with the given mappings.
    async fn create_index(&self, index: &str, mappings: &Value) -> Result<()>;

    /// Create or replace a document.
    async fn index(&self, index: &str, document: &ClusterDocument) -> Result<()>;

    /// Delete a document; deleting a missing document succeeds.
    async fn delete(&self, index: &str, id: &str) -> Result<()>;

    /// Delete every document matching a query.
    async fn delete_by_query(&self, index: &str, query: &ClusterQuery) -> Result<()>;

    /// Make indexed documents visible to searches.
    async fn refresh(&self, index: &str) -> Result<()>;

    /// Make indexed documents durable.
    async fn flush(&self, index: &str) -> Result<()>;

    /// Merge the segments of an index.
    async fn force_merge(&self, index: &str) -> Result<()>;

    /// Fetch a document body by id.
    async fn get(&self, index: &str, id: &str) -> Result<Option<Value>>;

    /// Count documents matching a query.
    async fn count(&self, index: &str, query: &ClusterQuery) -> Result<u64>;

    /// Best documents matching a query.
    async fn search(&self, index: &str, query: &ClusterQuery, limit: usize)
    -> Result<Vec<ClusterHit>>;
}

/// Error for a remote index that does not exist.
pub fn missing_index(index: &str) -> Error {
    Error::backend_fatal(format!("Remote index '{index}' does not exist"))
}
