//! The boundary between the indexing core and an index engine.
//!
//! A [`Backend`] provides codecs for its native value type, turns finalized
//! documents into its native document type, and opens one
//! [`ShardWriter`]/[`ShardReader`] pair per shard. Writers are owned
//! exclusively by one serial orchestrator; readers are shared.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use quarry_core::Result;
use serde::{Deserialize, Serialize};

use crate::codec::CodecRegistry;
use crate::document::StoredObject;
use crate::schema::IndexModel;
use crate::sharding::ShardId;
use crate::work::{SearchQuery, TermQuery, WorkTarget};

/// Mutating side of one shard.
///
/// Changes become durable on [`commit`](Self::commit) and visible to the
/// shard's reader on [`refresh`](Self::refresh).
#[async_trait]
pub trait ShardWriter: Send + 'static {
    /// Backend document type.
    type Document: Send + Sync + fmt::Debug + 'static;
    /// Backend native value type.
    type Value: Send + Sync + fmt::Debug + 'static;

    /// Add a new document.
    async fn add(&mut self, target: &WorkTarget, document: Self::Document) -> Result<()>;

    /// Replace the document with the target's id.
    async fn update(&mut self, target: &WorkTarget, document: Self::Document) -> Result<()>;

    /// Remove the document with the target's id.
    async fn delete(&mut self, target: &WorkTarget) -> Result<()>;

    /// Remove all documents of a tenant (all tenants when `None`), restricted
    /// to some routing keys when the set is non-empty.
    async fn purge(&mut self, tenant_id: Option<&str>, routing_keys: &BTreeSet<String>) -> Result<()>;

    /// Remove documents matching a term.
    async fn delete_by_query(
        &mut self,
        tenant_id: Option<&str>,
        query: &TermQuery<Self::Value>,
    ) -> Result<()>;

    /// Make pending changes durable.
    async fn commit(&mut self) -> Result<()>;

    /// Make pending changes visible to readers.
    async fn refresh(&mut self) -> Result<()>;

    /// Merge index segments.
    async fn merge_segments(&mut self) -> Result<()>;

    /// Reopen after a fatal failure, discarding uncommitted changes.
    async fn reopen(&mut self) -> Result<()>;

    /// Release resources. Uncommitted changes are lost.
    async fn close(&mut self) -> Result<()>;
}

/// A document returned by a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "N: Serialize", deserialize = "N: Deserialize<'de>"))]
pub struct SearchHit<N> {
    /// Backend document id.
    pub document_id: String,
    /// Relevance score; 1.0 for unscored matches.
    pub score: f32,
    /// Stored document.
    pub source: StoredObject<N>,
}

/// Reading side of one shard.
#[async_trait]
pub trait ShardReader: Send + Sync + 'static {
    /// Backend native value type.
    type Value: Send + Sync + fmt::Debug + 'static;

    /// Fetch a visible document by id.
    async fn get(&self, document_id: &str) -> Result<Option<StoredObject<Self::Value>>>;

    /// Count visible documents of a tenant (all tenants when `None`).
    async fn count(&self, tenant_id: Option<&str>) -> Result<u64>;

    /// Run a query against visible documents.
    async fn search(
        &self,
        query: &SearchQuery<Self::Value>,
        tenant_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchHit<Self::Value>>>;
}

/// An index engine.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Native value type.
    type Value: Clone + Send + Sync + fmt::Debug + 'static;
    /// Native document type.
    type Document: Send + Sync + fmt::Debug + 'static;
    /// Shard writer.
    type Writer: ShardWriter<Document = Self::Document, Value = Self::Value>;
    /// Shard reader.
    type Reader: ShardReader<Value = Self::Value>;

    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Codecs for every supported field type.
    fn codecs(&self) -> CodecRegistry<Self::Value>;

    /// Build the native document for a finalized tree.
    fn create_document(
        &self,
        model: &IndexModel<Self::Value>,
        target: &WorkTarget,
        source: StoredObject<Self::Value>,
    ) -> Result<Self::Document>;

    /// Open the writer and reader of one shard.
    async fn open_shard(
        &self,
        model: &Arc<IndexModel<Self::Value>>,
        shard: &ShardId,
    ) -> Result<(Self::Writer, Self::Reader)>;
}
