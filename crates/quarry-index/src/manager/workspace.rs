//! Index-wide operations over a set of tenants.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use quarry_core::Result;

use crate::backend::Backend;
use crate::codec::FieldValue;
use crate::orchestration::{WorkFor, WorkHandle};
use crate::work::{IndexingWork, TermQuery};

use super::IndexManager;

/// Purge, flush, refresh, merge and delete-by-query for some tenants.
///
/// Purge, flush and delete-by-query go through each shard's serial queue so
/// they are ordered after previously accepted works. Refresh and merge are
/// fanned out by the parallel orchestrator, one job per shard, each of which
/// still lands in that shard's serial queue.
pub struct IndexWorkspace<B: Backend> {
    manager: Arc<IndexManager<B>>,
    tenant_ids: BTreeSet<String>,
}

impl<B: Backend> IndexWorkspace<B> {
    pub(crate) fn new(manager: Arc<IndexManager<B>>, tenant_ids: BTreeSet<String>) -> Self {
        Self {
            manager,
            tenant_ids,
        }
    }

    /// Tenants this workspace targets; empty for all.
    pub fn tenant_ids(&self) -> &BTreeSet<String> {
        &self.tenant_ids
    }

    /// Remove every document of the workspace's tenants, restricted to some
    /// routing keys when the set is non-empty.
    pub async fn purge(&self, routing_keys: BTreeSet<String>) -> Result<WorkHandle> {
        let shards = self.manager.routing().shards_for(&routing_keys)?;
        let mut handles = Vec::new();
        for shard in &shards {
            for tenant_id in self.tenant_filters() {
                let work = IndexingWork::PurgeAll {
                    tenant_id,
                    routing_keys: routing_keys.clone(),
                };
                handles.push(self.manager.serial(shard)?.submit(work).await?);
            }
        }
        tracing::debug!(index = %self.manager.name(), shards = shards.len(), "purge submitted");
        Ok(WorkHandle::combine(handles))
    }

    /// Remove documents where `path` holds `value`.
    pub async fn delete_by_query(&self, path: &str, value: &FieldValue) -> Result<WorkHandle> {
        let native = self.manager.model().encode_value(path, value)?;
        let mut handles = Vec::new();
        for shard in self.manager.routing().all_shards() {
            for tenant_id in self.tenant_filters() {
                let work = IndexingWork::DeleteByQuery {
                    tenant_id,
                    query: TermQuery {
                        path: path.to_string(),
                        value: native.clone(),
                    },
                };
                handles.push(self.manager.serial(shard)?.submit(work).await?);
            }
        }
        Ok(WorkHandle::combine(handles))
    }

    /// Commit every shard.
    pub async fn flush(&self) -> Result<WorkHandle> {
        let mut handles = Vec::new();
        for shard in self.manager.routing().all_shards() {
            handles.push(self.manager.serial(shard)?.submit(IndexingWork::Flush).await?);
        }
        Ok(WorkHandle::combine(handles))
    }

    /// Make previous writes visible on every shard.
    pub fn refresh(&self) -> Result<WorkHandle> {
        self.fan_out("refresh", || IndexingWork::Refresh)
    }

    /// Merge segments on every shard.
    pub fn merge_segments(&self) -> Result<WorkHandle> {
        self.fan_out("merge_segments", || IndexingWork::Optimize)
    }

    fn fan_out(
        &self,
        operation: &str,
        work: impl Fn() -> WorkFor<B::Writer>,
    ) -> Result<WorkHandle> {
        let mut handles = Vec::new();
        for shard in self.manager.routing().all_shards() {
            let manager = Arc::clone(&self.manager);
            let shard = shard.clone();
            let work = work();
            let description = format!("{operation} {}/{shard}", manager.name());
            handles.push(self.manager.parallel().submit(description, async move {
                let handle = manager.serial(&shard)?.submit(work).await?;
                Ok(handle.wait().await)
            })?);
        }
        Ok(WorkHandle::combine(handles))
    }

    fn tenant_filters(&self) -> Vec<Option<String>> {
        if self.tenant_ids.is_empty() {
            vec![None]
        } else {
            self.tenant_ids.iter().cloned().map(Some).collect()
        }
    }
}

impl<B: Backend> fmt::Debug for IndexWorkspace<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexWorkspace")
            .field("index", &self.manager.name())
            .field("tenant_ids", &self.tenant_ids)
            .finish()
    }
}
