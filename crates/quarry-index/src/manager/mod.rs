//! Index manager: owns the shards of one index and hands out facades.
//!
//! Opening an index resolves its shard layout, opens one writer/reader pair
//! per shard, and starts:
//!
//! - one [`SerialOrchestrator`] per shard for mutations,
//! - one shared [`ParallelOrchestrator`] for per-shard administrative jobs,
//! - one shared [`SyncOrchestrator`] for reads.
//!
//! Callers never see shards. They use an [`IndexIndexer`],
//! [`IndexingPlan`], [`IndexWorkspace`] or [`SearchScope`], each bound to a
//! tenant that is checked when the facade is created.

pub mod indexer;
pub mod plan;
pub mod scope;
pub mod workspace;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use quarry_core::{Error, Result};

use crate::backend::Backend;
use crate::document::DocumentElement;
use crate::io::IoStrategy;
use crate::orchestration::{
    FailureHandler, LoggingFailureHandler, ParallelOrchestrator, SerialOrchestrator,
    SerialSettings, SyncOrchestrator,
};
use crate::schema::IndexModel;
use crate::settings::IndexSettings;
use crate::sharding::{ShardId, ShardRouting, ShardingStrategy};
use crate::tenancy::MultiTenancyStrategy;
use crate::work::{EntityReference, WorkTarget};

pub use indexer::IndexIndexer;
pub use plan::{IndexingPlan, IndexingPlanReport};
pub use scope::SearchScope;
pub use workspace::IndexWorkspace;

/// Overrides applied when opening an index.
#[derive(Debug, Default)]
pub struct IndexManagerOptions {
    /// Receives failures of accepted work; logs them when unset.
    pub failure_handler: Option<Arc<dyn FailureHandler>>,
    /// Replaces the IO strategy named in the settings.
    pub io_strategy: Option<Arc<dyn IoStrategy>>,
    /// Replaces the sharding strategy named in the settings.
    pub sharding_strategy: Option<Box<dyn ShardingStrategy>>,
}

pub(crate) struct Shard<B: Backend> {
    pub(crate) serial: SerialOrchestrator<B::Writer>,
    pub(crate) reader: Arc<B::Reader>,
}

/// Runtime state of one open index.
pub struct IndexManager<B: Backend> {
    backend: Arc<B>,
    model: Arc<IndexModel<B::Value>>,
    settings: IndexSettings,
    routing: ShardRouting,
    shards: BTreeMap<ShardId, Shard<B>>,
    parallel: ParallelOrchestrator,
    sync: SyncOrchestrator,
}

impl<B: Backend> IndexManager<B> {
    /// Open every shard of `model` and start the orchestrators.
    ///
    /// If a shard fails to open, the shards opened so far are stopped again
    /// before the error is returned.
    pub async fn open(
        backend: Arc<B>,
        model: Arc<IndexModel<B::Value>>,
        settings: IndexSettings,
        options: IndexManagerOptions,
    ) -> Result<Arc<Self>> {
        settings.validate()?;
        let index_name = model.name().to_string();

        let strategy = options
            .sharding_strategy
            .unwrap_or_else(|| settings.sharding.strategy.build());
        let routing = ShardRouting::initialize(strategy, &index_name, &settings.sharding)?;
        let io = options
            .io_strategy
            .unwrap_or_else(|| settings.io_strategy.build(&settings));
        let failure_handler = options
            .failure_handler
            .unwrap_or_else(|| Arc::new(LoggingFailureHandler));
        let serial_settings = SerialSettings {
            queue_size: settings.queue_size,
            max_batch_size: settings.max_batch_size,
        };

        let mut shards = BTreeMap::new();
        for shard_id in routing.all_shards() {
            match Self::open_shard(
                &backend,
                &model,
                shard_id,
                Arc::clone(&io),
                Arc::clone(&failure_handler),
                serial_settings,
            )
            .await
            {
                Ok(shard) => {
                    shards.insert(shard_id.clone(), shard);
                }
                Err(e) => {
                    tracing::error!(index = %index_name, shard = %shard_id, error = %e, "failed to open shard");
                    for (opened, shard) in &shards {
                        if let Err(stop_error) = shard.serial.stop().await {
                            tracing::warn!(shard = %opened, error = %stop_error, "failed to stop shard");
                        }
                    }
                    return Err(e);
                }
            }
        }

        let parallel = ParallelOrchestrator::new(
            format!("{index_name}/parallel"),
            settings.parallel_concurrency,
            failure_handler,
        );
        let sync = SyncOrchestrator::new(format!("{index_name}/sync"));
        parallel.start()?;
        sync.start()?;

        tracing::info!(
            index = %index_name,
            backend = backend.name(),
            shards = shards.len(),
            io = io.name(),
            "index opened"
        );

        Ok(Arc::new(Self {
            backend,
            model,
            settings,
            routing,
            shards,
            parallel,
            sync,
        }))
    }

    async fn open_shard(
        backend: &Arc<B>,
        model: &Arc<IndexModel<B::Value>>,
        shard_id: &ShardId,
        io: Arc<dyn IoStrategy>,
        failure_handler: Arc<dyn FailureHandler>,
        settings: SerialSettings,
    ) -> Result<Shard<B>> {
        let (writer, reader) = backend.open_shard(model, shard_id).await?;
        let serial = SerialOrchestrator::new(
            format!("{}/{shard_id}", model.name()),
            writer,
            io,
            failure_handler,
            settings,
        );
        serial.start().await?;
        Ok(Shard {
            serial,
            reader: Arc::new(reader),
        })
    }

    /// Index name.
    pub fn name(&self) -> &str {
        self.model.name()
    }

    /// Schema of the index.
    pub fn model(&self) -> &Arc<IndexModel<B::Value>> {
        &self.model
    }

    /// Settings the index was opened with.
    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    /// Shard layout.
    pub fn routing(&self) -> &ShardRouting {
        &self.routing
    }

    /// Serial orchestrator of a shard.
    pub fn serial(&self, shard_id: &ShardId) -> Result<&SerialOrchestrator<B::Writer>> {
        Ok(&self.shard(shard_id)?.serial)
    }

    /// Empty root document for this index.
    pub fn new_document(&self) -> DocumentElement<B::Value> {
        DocumentElement::new(&self.model)
    }

    /// Indexer bound to a tenant.
    pub fn create_indexer(self: &Arc<Self>, tenant_id: Option<&str>) -> Result<IndexIndexer<B>> {
        self.tenancy().check_tenant(tenant_id)?;
        Ok(IndexIndexer::new(Arc::clone(self), tenant_id.map(str::to_string)))
    }

    /// Plan bound to a tenant.
    pub fn create_indexing_plan(self: &Arc<Self>, tenant_id: Option<&str>) -> Result<IndexingPlan<B>> {
        self.tenancy().check_tenant(tenant_id)?;
        Ok(IndexingPlan::new(Arc::clone(self), tenant_id.map(str::to_string)))
    }

    /// Workspace over a set of tenants; an empty set targets every tenant.
    pub fn create_workspace(self: &Arc<Self>, tenant_ids: BTreeSet<String>) -> Result<IndexWorkspace<B>> {
        self.tenancy().check_tenants(&tenant_ids)?;
        Ok(IndexWorkspace::new(Arc::clone(self), tenant_ids))
    }

    /// Search scope bound to a tenant.
    pub fn create_search_scope(self: &Arc<Self>, tenant_id: Option<&str>) -> Result<SearchScope<B>> {
        self.tenancy().check_tenant(tenant_id)?;
        Ok(SearchScope::new(Arc::clone(self), tenant_id.map(str::to_string)))
    }

    /// Stop the orchestrators and close the shards.
    ///
    /// Parallel jobs finish first since they feed the serial queues; then
    /// every serial queue is drained and committed; reads stop last.
    pub async fn stop(&self) -> Result<()> {
        let mut result = self.parallel.stop().await;
        for (shard_id, shard) in &self.shards {
            if let Err(e) = shard.serial.stop().await {
                tracing::error!(index = %self.name(), shard = %shard_id, error = %e, "failed to stop shard");
                result = result.and(Err(e));
            }
        }
        result = result.and(self.sync.stop().await);
        tracing::info!(index = %self.name(), "index stopped");
        result
    }

    pub(crate) fn backend(&self) -> &B {
        &self.backend
    }

    pub(crate) fn tenancy(&self) -> MultiTenancyStrategy {
        self.settings.multi_tenancy
    }

    pub(crate) fn parallel(&self) -> &ParallelOrchestrator {
        &self.parallel
    }

    pub(crate) fn sync(&self) -> &SyncOrchestrator {
        &self.sync
    }

    pub(crate) fn shard(&self, shard_id: &ShardId) -> Result<&Shard<B>> {
        self.shards.get(shard_id).ok_or_else(|| {
            Error::assertion(format!("Shard '{shard_id}' is not open in index '{}'", self.name()))
        })
    }

    pub(crate) fn target(&self, tenant_id: Option<&str>, entity: &EntityReference) -> WorkTarget {
        WorkTarget {
            entity_type: entity.entity_type.clone(),
            entity_id: entity.id.clone(),
            document_id: self.tenancy().document_id(tenant_id, &entity.id),
            routing_key: entity.routing_key.clone(),
            tenant_id: tenant_id.map(str::to_string),
        }
    }
}

impl<B: Backend> fmt::Debug for IndexManager<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexManager")
            .field("name", &self.name())
            .field("backend", &self.backend.name())
            .field("shards", &self.shards.keys().collect::<Vec<_>>())
            .finish()
    }
}
