//! Reads against one index, dispatched through the sync orchestrator.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use futures::future::try_join_all;
use quarry_core::Result;

use crate::backend::{Backend, SearchHit, ShardReader};
use crate::codec::FieldValue;
use crate::document::StoredObject;
use crate::sharding::ShardId;
use crate::work::{EntityReference, SearchQuery, TermQuery};

use super::IndexManager;

/// Read access for one tenant, optionally restricted to routing keys.
///
/// Results are projected back to [`FieldValue`]s; fields that are not
/// projectable are left out.
pub struct SearchScope<B: Backend> {
    manager: Arc<IndexManager<B>>,
    tenant_id: Option<String>,
    routing_keys: BTreeSet<String>,
}

impl<B: Backend> SearchScope<B> {
    pub(crate) fn new(manager: Arc<IndexManager<B>>, tenant_id: Option<String>) -> Self {
        Self {
            manager,
            tenant_id,
            routing_keys: BTreeSet::new(),
        }
    }

    /// Restrict counts and searches to the shards of some routing keys.
    pub fn with_routing_keys(mut self, routing_keys: BTreeSet<String>) -> Self {
        self.routing_keys = routing_keys;
        self
    }

    /// Tenant this scope reads for.
    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    /// Fetch one entity's document.
    ///
    /// With a routing key only its shard is read; otherwise shards are read
    /// in order until the document is found.
    pub async fn get(&self, entity: &EntityReference) -> Result<Option<StoredObject<FieldValue>>> {
        let target = self.manager.target(self.tenant_id(), entity);
        let shards = self
            .manager
            .routing()
            .shards_for_delete(&target.document_id, target.routing_key.as_deref())?;
        self.manager
            .sync()
            .run(async {
                for shard in &shards {
                    let reader = self.reader(shard)?;
                    if let Some(stored) = reader.get(&target.document_id).await? {
                        return self.manager.model().project(&stored).map(Some);
                    }
                }
                Ok(None)
            })
            .await
    }

    /// Count visible documents.
    pub async fn count(&self) -> Result<u64> {
        let readers = self.readers()?;
        let tenant_id = self.tenant_id();
        self.manager
            .sync()
            .run(async {
                let counts =
                    try_join_all(readers.iter().map(|reader| reader.count(tenant_id))).await?;
                Ok(counts.into_iter().sum())
            })
            .await
    }

    /// Documents where `path` holds `value`, best first.
    pub async fn search_term(
        &self,
        path: &str,
        value: &FieldValue,
        limit: usize,
    ) -> Result<Vec<SearchHit<FieldValue>>> {
        let native = self.manager.model().encode_value(path, value)?;
        let query = SearchQuery::Term(TermQuery {
            path: path.to_string(),
            value: native,
        });
        self.search(&query, limit).await
    }

    /// Any visible documents, up to `limit`.
    pub async fn search_all(&self, limit: usize) -> Result<Vec<SearchHit<FieldValue>>> {
        self.search(&SearchQuery::MatchAll, limit).await
    }

    async fn search(
        &self,
        query: &SearchQuery<B::Value>,
        limit: usize,
    ) -> Result<Vec<SearchHit<FieldValue>>> {
        let readers = self.readers()?;
        let tenant_id = self.tenant_id();
        let mut hits = self
            .manager
            .sync()
            .run(async {
                let per_shard =
                    try_join_all(readers.iter().map(|reader| reader.search(query, tenant_id, limit)))
                        .await?;
                Ok(per_shard.into_iter().flatten().collect::<Vec<_>>())
            })
            .await?;

        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.document_id.cmp(&b.document_id))
        });
        hits.truncate(limit);
        hits.into_iter()
            .map(|hit| {
                Ok(SearchHit {
                    source: self.manager.model().project(&hit.source)?,
                    document_id: hit.document_id,
                    score: hit.score,
                })
            })
            .collect()
    }

    fn readers(&self) -> Result<Vec<Arc<B::Reader>>> {
        self.manager
            .routing()
            .shards_for(&self.routing_keys)?
            .iter()
            .map(|shard| self.reader(shard))
            .collect()
    }

    fn reader(&self, shard: &ShardId) -> Result<Arc<B::Reader>> {
        Ok(Arc::clone(&self.manager.shard(shard)?.reader))
    }
}

impl<B: Backend> fmt::Debug for SearchScope<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchScope")
            .field("index", &self.manager.name())
            .field("tenant_id", &self.tenant_id)
            .field("routing_keys", &self.routing_keys)
            .finish()
    }
}
