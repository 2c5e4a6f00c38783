//! Shard writer over a cluster client.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use quarry_core::Result;
use quarry_index::{ShardWriter, TermQuery, WorkTarget};
use serde_json::Value;

use crate::client::{ClusterClient, missing_index};
use crate::document::ClusterDocument;
use crate::query::ClusterQuery;
use crate::schema::ClusterSchema;

/// Writer side of one remote index.
///
/// Writes go to the cluster immediately; commit flushes and refresh
/// refreshes the remote index. Query deletes refresh first, since the
/// cluster only deletes what its searchers see.
pub struct ClusterShardWriter<C> {
    client: Arc<C>,
    index: String,
    schema: Arc<ClusterSchema>,
}

impl<C: ClusterClient> ClusterShardWriter<C> {
    pub(crate) fn new(client: Arc<C>, index: String, schema: Arc<ClusterSchema>) -> Self {
        Self {
            client,
            index,
            schema,
        }
    }

    /// Name of the remote index.
    pub fn index(&self) -> &str {
        &self.index
    }
}

impl<C> std::fmt::Debug for ClusterShardWriter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterShardWriter")
            .field("index", &self.index)
            .finish()
    }
}

#[async_trait]
impl<C: ClusterClient> ShardWriter for ClusterShardWriter<C> {
    type Document = ClusterDocument;
    type Value = Value;

    async fn add(&mut self, _target: &WorkTarget, document: ClusterDocument) -> Result<()> {
        self.client.index(&self.index, &document).await
    }

    async fn update(&mut self, _target: &WorkTarget, document: ClusterDocument) -> Result<()> {
        self.client.index(&self.index, &document).await
    }

    async fn delete(&mut self, target: &WorkTarget) -> Result<()> {
        self.client.delete(&self.index, &target.document_id).await
    }

    async fn purge(&mut self, tenant_id: Option<&str>, routing_keys: &BTreeSet<String>) -> Result<()> {
        let query = ClusterQuery::match_all()
            .for_tenant(tenant_id)
            .with_routing_keys(routing_keys);
        self.client.refresh(&self.index).await?;
        self.client.delete_by_query(&self.index, &query).await
    }

    async fn delete_by_query(
        &mut self,
        tenant_id: Option<&str>,
        term: &TermQuery<Value>,
    ) -> Result<()> {
        let query = ClusterQuery::term(&self.schema, term)?.for_tenant(tenant_id);
        self.client.refresh(&self.index).await?;
        self.client.delete_by_query(&self.index, &query).await
    }

    async fn commit(&mut self) -> Result<()> {
        self.client.flush(&self.index).await
    }

    async fn refresh(&mut self) -> Result<()> {
        self.client.refresh(&self.index).await
    }

    async fn merge_segments(&mut self) -> Result<()> {
        self.client.force_merge(&self.index).await
    }

    async fn reopen(&mut self) -> Result<()> {
        if !self.client.index_exists(&self.index).await? {
            return Err(missing_index(&self.index));
        }
        tracing::info!(index = %self.index, "cluster writer reopened");
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
