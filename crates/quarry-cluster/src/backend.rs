//! The cluster [`Backend`].
//!
//! Each shard is one remote index: `{index}` when unsharded, otherwise
//! `{index}-{shard}`. Missing remote indexes are created from the model's
//! mappings unless creation is disabled.

use std::sync::Arc;

use async_trait::async_trait;
use quarry_core::Result;
use quarry_index::{Backend, CodecRegistry, IndexModel, ShardId, StoredObject, WorkTarget};
use serde_json::Value;

use crate::client::{ClusterClient, missing_index};
use crate::codec::{BACKEND_NAME, json_codecs};
use crate::document::{ClusterDocument, build_document};
use crate::reader::ClusterShardReader;
use crate::schema::ClusterSchema;
use crate::writer::ClusterShardWriter;

/// Backend storing documents in a remote cluster.
pub struct ClusterBackend<C> {
    client: Arc<C>,
    create_missing_indexes: bool,
}

impl<C: ClusterClient> ClusterBackend<C> {
    /// Backend over `client`.
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            create_missing_indexes: true,
        }
    }

    /// Fail to open shards whose remote index does not exist.
    pub fn without_index_creation(mut self) -> Self {
        self.create_missing_indexes = false;
        self
    }

    /// The underlying client.
    pub fn client(&self) -> &Arc<C> {
        &self.client
    }
}

/// Remote index name of one shard.
pub fn remote_index_name(index_name: &str, shard: &ShardId) -> String {
    match shard.as_str() {
        Some(id) => format!("{index_name}-{id}"),
        None => index_name.to_string(),
    }
}

impl<C> std::fmt::Debug for ClusterBackend<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterBackend")
            .field("create_missing_indexes", &self.create_missing_indexes)
            .finish()
    }
}

#[async_trait]
impl<C: ClusterClient> Backend for ClusterBackend<C> {
    type Value = Value;
    type Document = ClusterDocument;
    type Writer = ClusterShardWriter<C>;
    type Reader = ClusterShardReader<C>;

    fn name(&self) -> &str {
        BACKEND_NAME
    }

    fn codecs(&self) -> CodecRegistry<Value> {
        json_codecs()
    }

    fn create_document(
        &self,
        model: &IndexModel<Value>,
        target: &WorkTarget,
        source: StoredObject<Value>,
    ) -> Result<ClusterDocument> {
        build_document(model.tree(), target, &source)
    }

    async fn open_shard(
        &self,
        model: &Arc<IndexModel<Value>>,
        shard: &ShardId,
    ) -> Result<(ClusterShardWriter<C>, ClusterShardReader<C>)> {
        let schema = Arc::new(ClusterSchema::build(model));
        let index = remote_index_name(model.name(), shard);

        if !self.client.index_exists(&index).await? {
            if !self.create_missing_indexes {
                return Err(missing_index(&index));
            }
            self.client.create_index(&index, &schema.mappings()).await?;
        }
        tracing::debug!(index = %index, "cluster shard opened");

        let writer = ClusterShardWriter::new(Arc::clone(&self.client), index.clone(), Arc::clone(&schema));
        let reader = ClusterShardReader::new(Arc::clone(&self.client), index, schema);
        Ok((writer, reader))
    }
}
