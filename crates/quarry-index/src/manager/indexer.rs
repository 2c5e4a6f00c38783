//! Single-entity mutations, routed to their shard's serial queue.

use std::fmt;
use std::sync::Arc;

use quarry_core::{Error, Result};

use crate::backend::Backend;
use crate::document::DocumentElement;
use crate::orchestration::WorkHandle;
use crate::sharding::ShardId;
use crate::work::{
    DocumentCommitStrategy, DocumentRefreshStrategy, EntityReference, IndexingWork, Visibility,
    WorkTarget,
};

use super::IndexManager;

/// Adds, updates and deletes documents of one tenant.
pub struct IndexIndexer<B: Backend> {
    manager: Arc<IndexManager<B>>,
    tenant_id: Option<String>,
    visibility: Visibility,
}

impl<B: Backend> IndexIndexer<B> {
    pub(crate) fn new(manager: Arc<IndexManager<B>>, tenant_id: Option<String>) -> Self {
        Self {
            manager,
            tenant_id,
            visibility: Visibility::default(),
        }
    }

    /// Tenant this indexer writes for.
    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    /// Request visibility for every work submitted by this indexer.
    pub fn with_visibility(
        mut self,
        commit: DocumentCommitStrategy,
        refresh: DocumentRefreshStrategy,
    ) -> Self {
        self.visibility = Visibility::new(commit, refresh);
        self
    }

    /// Empty root document for the index.
    pub fn new_document(&self) -> DocumentElement<B::Value> {
        self.manager.new_document()
    }

    /// Add a finished document.
    pub async fn add(
        &self,
        entity: &EntityReference,
        document: DocumentElement<B::Value>,
    ) -> Result<WorkHandle> {
        let (shard, target, document) =
            prepare_document(&self.manager, self.tenant_id(), entity, document)?;
        let work = IndexingWork::Add {
            target,
            document,
            visibility: self.visibility,
        };
        self.manager.serial(&shard)?.submit(work).await
    }

    /// Build a document with `populate` and add it.
    ///
    /// Nothing is submitted if `populate` fails.
    pub async fn add_with<F>(&self, entity: &EntityReference, populate: F) -> Result<WorkHandle>
    where
        F: FnOnce(&mut DocumentElement<B::Value>) -> Result<()>,
    {
        let mut document = self.new_document();
        populate(&mut document)?;
        self.add(entity, document).await
    }

    /// Replace a document.
    pub async fn update(
        &self,
        entity: &EntityReference,
        document: DocumentElement<B::Value>,
    ) -> Result<WorkHandle> {
        let (shard, target, document) =
            prepare_document(&self.manager, self.tenant_id(), entity, document)?;
        let work = IndexingWork::Update {
            target,
            document,
            visibility: self.visibility,
        };
        self.manager.serial(&shard)?.submit(work).await
    }

    /// Build a document with `populate` and replace the stored one.
    pub async fn update_with<F>(&self, entity: &EntityReference, populate: F) -> Result<WorkHandle>
    where
        F: FnOnce(&mut DocumentElement<B::Value>) -> Result<()>,
    {
        let mut document = self.new_document();
        populate(&mut document)?;
        self.update(entity, document).await
    }

    /// Delete a document.
    ///
    /// Without a routing key every shard is asked to delete it.
    pub async fn delete(&self, entity: &EntityReference) -> Result<WorkHandle> {
        let (shards, target) = prepare_delete(&self.manager, self.tenant_id(), entity)?;
        let mut handles = Vec::with_capacity(shards.len());
        for shard in shards {
            let work = IndexingWork::Delete {
                target: target.clone(),
                visibility: self.visibility,
            };
            handles.push(self.manager.serial(&shard)?.submit(work).await?);
        }
        Ok(WorkHandle::combine(handles))
    }
}

impl<B: Backend> fmt::Debug for IndexIndexer<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexIndexer")
            .field("index", &self.manager.name())
            .field("tenant_id", &self.tenant_id)
            .field("visibility", &self.visibility)
            .finish()
    }
}

/// Resolve the shard and build the backend document for an add or update.
pub(crate) fn prepare_document<B: Backend>(
    manager: &IndexManager<B>,
    tenant_id: Option<&str>,
    entity: &EntityReference,
    document: DocumentElement<B::Value>,
) -> Result<(ShardId, WorkTarget, B::Document)> {
    if document.tree_id() != manager.model().tree().id() {
        return Err(Error::assertion(format!(
            "Document for {entity} was built against a different schema than index '{}'",
            manager.name()
        )));
    }
    let target = manager.target(tenant_id, entity);
    let shard = manager
        .routing()
        .shard_for(&target.document_id, target.routing_key.as_deref())?;
    let document = manager
        .backend()
        .create_document(manager.model(), &target, document.finish())?;
    Ok((shard, target, document))
}

/// Resolve the shards a delete must reach.
pub(crate) fn prepare_delete<B: Backend>(
    manager: &IndexManager<B>,
    tenant_id: Option<&str>,
    entity: &EntityReference,
) -> Result<(Vec<ShardId>, WorkTarget)> {
    let target = manager.target(tenant_id, entity);
    let shards = manager
        .routing()
        .shards_for_delete(&target.document_id, target.routing_key.as_deref())?;
    Ok((shards, target))
}
