//! Shard reader over a cluster client.

use std::sync::Arc;

use async_trait::async_trait;
use quarry_core::Result;
use quarry_index::{SearchHit, SearchQuery, ShardReader, StoredObject};
use serde_json::Value;

use crate::client::ClusterClient;
use crate::document::parse_source;
use crate::query::ClusterQuery;
use crate::schema::ClusterSchema;

/// Reader side of one remote index.
pub struct ClusterShardReader<C> {
    client: Arc<C>,
    index: String,
    schema: Arc<ClusterSchema>,
}

impl<C: ClusterClient> ClusterShardReader<C> {
    pub(crate) fn new(client: Arc<C>, index: String, schema: Arc<ClusterSchema>) -> Self {
        Self {
            client,
            index,
            schema,
        }
    }
}

impl<C> std::fmt::Debug for ClusterShardReader<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterShardReader")
            .field("index", &self.index)
            .finish()
    }
}

#[async_trait]
impl<C: ClusterClient> ShardReader for ClusterShardReader<C> {
    type Value = Value;

    async fn get(&self, document_id: &str) -> Result<Option<StoredObject<Value>>> {
        match self.client.get(&self.index, document_id).await? {
            Some(source) => parse_source(self.schema.tree(), &source).map(Some),
            None => Ok(None),
        }
    }

    async fn count(&self, tenant_id: Option<&str>) -> Result<u64> {
        let query = ClusterQuery::match_all().for_tenant(tenant_id);
        self.client.count(&self.index, &query).await
    }

    async fn search(
        &self,
        search: &SearchQuery<Value>,
        tenant_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchHit<Value>>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let query = ClusterQuery::search(&self.schema, search)?.for_tenant(tenant_id);
        let hits = self.client.search(&self.index, &query, limit).await?;
        hits.into_iter()
            .map(|hit| {
                Ok(SearchHit {
                    source: parse_source(self.schema.tree(), &hit.source)?,
                    document_id: hit.id,
                    score: hit.score,
                })
            })
            .collect()
    }
}
