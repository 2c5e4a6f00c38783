//! Batches of entity mutations executed as one unit.
//!
//! Every document of a plan is converted and routed before anything is
//! submitted, so a conversion error leaves the index untouched.

use std::fmt;
use std::sync::Arc;

use quarry_core::Result;
use serde::Serialize;

use crate::backend::Backend;
use crate::document::DocumentElement;
use crate::orchestration::{WorkFor, WorkHandle, WorkOutcome};
use crate::sharding::ShardId;
use crate::work::{
    DocumentCommitStrategy, DocumentRefreshStrategy, EntityReference, IndexingWork, Visibility,
};

use super::IndexManager;
use super::indexer::{prepare_delete, prepare_document};

enum PlanEntry<V> {
    Add(EntityReference, DocumentElement<V>),
    Update(EntityReference, DocumentElement<V>),
    Delete(EntityReference),
}

/// Outcome of [`IndexingPlan::execute`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexingPlanReport {
    /// Entities whose works were all applied.
    pub applied: usize,
    /// Entities with at least one failed work.
    pub failed: Vec<EntityReference>,
}

impl IndexingPlanReport {
    /// Whether every entity was applied.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Ordered list of mutations for one tenant.
pub struct IndexingPlan<B: Backend> {
    manager: Arc<IndexManager<B>>,
    tenant_id: Option<String>,
    visibility: Visibility,
    entries: Vec<PlanEntry<B::Value>>,
}

impl<B: Backend> IndexingPlan<B> {
    pub(crate) fn new(manager: Arc<IndexManager<B>>, tenant_id: Option<String>) -> Self {
        Self {
            manager,
            tenant_id,
            visibility: Visibility::default(),
            entries: Vec::new(),
        }
    }

    /// Request visibility for every work of the plan.
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

    /// Queue an add.
    pub fn add(&mut self, entity: EntityReference, document: DocumentElement<B::Value>) {
        self.entries.push(PlanEntry::Add(entity, document));
    }

    /// Queue an update.
    pub fn add_or_update(&mut self, entity: EntityReference, document: DocumentElement<B::Value>) {
        self.entries.push(PlanEntry::Update(entity, document));
    }

    /// Queue a delete.
    pub fn delete(&mut self, entity: EntityReference) {
        self.entries.push(PlanEntry::Delete(entity));
    }

    /// Number of queued mutations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Convert, submit, and wait for every queued mutation.
    ///
    /// Returns an error without submitting anything if a document cannot be
    /// converted or routed. Once submission starts, failures of individual
    /// works are reported through the failure handler and listed in the
    /// report.
    pub async fn execute(self) -> Result<IndexingPlanReport> {
        let tenant_id = self.tenant_id.as_deref();
        let mut prepared: Vec<(EntityReference, Vec<(ShardId, WorkFor<B::Writer>)>)> =
            Vec::with_capacity(self.entries.len());

        for entry in self.entries {
            match entry {
                PlanEntry::Add(entity, document) => {
                    let (shard, target, document) =
                        prepare_document(&self.manager, tenant_id, &entity, document)?;
                    let work = IndexingWork::Add {
                        target,
                        document,
                        visibility: self.visibility,
                    };
                    prepared.push((entity, vec![(shard, work)]));
                }
                PlanEntry::Update(entity, document) => {
                    let (shard, target, document) =
                        prepare_document(&self.manager, tenant_id, &entity, document)?;
                    let work = IndexingWork::Update {
                        target,
                        document,
                        visibility: self.visibility,
                    };
                    prepared.push((entity, vec![(shard, work)]));
                }
                PlanEntry::Delete(entity) => {
                    let (shards, target) = prepare_delete(&self.manager, tenant_id, &entity)?;
                    let works = shards
                        .into_iter()
                        .map(|shard| {
                            let work = IndexingWork::Delete {
                                target: target.clone(),
                                visibility: self.visibility,
                            };
                            (shard, work)
                        })
                        .collect();
                    prepared.push((entity, works));
                }
            }
        }

        tracing::debug!(
            index = %self.manager.name(),
            entities = prepared.len(),
            "executing indexing plan"
        );

        let mut submitted = Vec::with_capacity(prepared.len());
        for (entity, works) in prepared {
            let mut handles = Vec::with_capacity(works.len());
            for (shard, work) in works {
                handles.push(self.manager.serial(&shard)?.submit(work).await?);
            }
            submitted.push((entity, WorkHandle::combine(handles)));
        }

        let mut report = IndexingPlanReport::default();
        for (entity, handle) in submitted {
            match handle.wait().await {
                WorkOutcome::Applied => report.applied += 1,
                WorkOutcome::Failed => report.failed.push(entity),
            }
        }
        Ok(report)
    }
}

impl<B: Backend> fmt::Debug for IndexingPlan<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexingPlan")
            .field("index", &self.manager.name())
            .field("tenant_id", &self.tenant_id)
            .field("entries", &self.entries.len())
            .finish()
    }
}
