//! Sharding strategies and the per-index shard routing table.
//!
//! A [`ShardingStrategy`] is initialized once when an index is opened. It
//! either enables sharding with a fixed set of shard identifiers or disables
//! it. [`ShardRouting`] wraps the outcome: on an unsharded index it exposes a
//! single implicit shard and never consults the strategy.

mod explicit;
mod hash;
mod none;

use std::collections::BTreeSet;
use std::fmt;

use quarry_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::settings::ShardingSettings;

pub use explicit::ExplicitShardingStrategy;
pub use hash::HashShardingStrategy;
pub use none::NoShardingStrategy;

/// Maps documents to shard identifiers.
pub trait ShardingStrategy: Send + Sync + fmt::Debug {
    /// Strategy name for logs.
    fn name(&self) -> &str;

    /// Enable sharding with a set of identifiers, or disable it.
    fn initialize(&mut self, context: &mut ShardingStrategyInitializationContext) -> Result<()>;

    /// Shard of the document with `document_id` and optional `routing_key`.
    ///
    /// Must be deterministic for a given configuration.
    fn to_shard_identifier(&self, document_id: &str, routing_key: Option<&str>) -> Result<String>;

    /// Shards that may hold documents routed with any of `routing_keys`.
    fn to_shard_identifiers(&self, routing_keys: &BTreeSet<String>) -> Result<BTreeSet<String>>;
}

/// Built-in strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardingStrategyName {
    /// Single implicit shard.
    #[default]
    None,
    /// Hash of the routing key (or document id) modulo the shard count.
    Hash,
    /// Routing keys name shards directly.
    Explicit,
}

impl ShardingStrategyName {
    /// Instantiate the named strategy.
    pub fn build(&self) -> Box<dyn ShardingStrategy> {
        match self {
            ShardingStrategyName::None => Box::new(NoShardingStrategy),
            ShardingStrategyName::Hash => Box::new(HashShardingStrategy::default()),
            ShardingStrategyName::Explicit => Box::new(ExplicitShardingStrategy::default()),
        }
    }
}

/// Outcome of strategy initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ShardingOutcome {
    Enabled(Vec<String>),
    Disabled,
}

/// Handed to [`ShardingStrategy::initialize`].
#[derive(Debug)]
pub struct ShardingStrategyInitializationContext<'a> {
    index_name: &'a str,
    settings: &'a ShardingSettings,
    outcome: Option<ShardingOutcome>,
}

impl<'a> ShardingStrategyInitializationContext<'a> {
    /// Context for one index.
    pub fn new(index_name: &'a str, settings: &'a ShardingSettings) -> Self {
        Self {
            index_name,
            settings,
            outcome: None,
        }
    }

    /// Name of the index being opened.
    pub fn index_name(&self) -> &str {
        self.index_name
    }

    /// Configured shard count.
    pub fn number_of_shards(&self) -> Option<usize> {
        self.settings.number_of_shards
    }

    /// Configured shard identifiers.
    pub fn configured_identifiers(&self) -> &[String] {
        &self.settings.shard_identifiers
    }

    /// Enable sharding with these identifiers.
    pub fn set_shard_identifiers<I, S>(&mut self, identifiers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = BTreeSet::new();
        let ids = identifiers
            .into_iter()
            .map(Into::into)
            .filter(|id: &String| seen.insert(id.clone()))
            .collect();
        self.outcome = Some(ShardingOutcome::Enabled(ids));
    }

    /// Run the index without sharding.
    pub fn disable_sharding(&mut self) {
        self.outcome = Some(ShardingOutcome::Disabled);
    }

    fn finish(self) -> Result<ShardingOutcome> {
        match self.outcome {
            None => Err(Error::config(format!(
                "Sharding strategy for index '{}' neither enabled nor disabled sharding",
                self.index_name
            ))),
            Some(ShardingOutcome::Enabled(ids)) if ids.is_empty() => Err(Error::config(format!(
                "Sharding strategy for index '{}' enabled sharding without shard identifiers",
                self.index_name
            ))),
            Some(outcome) => Ok(outcome),
        }
    }
}

/// Identity of one shard of an index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardId(Option<String>);

impl ShardId {
    /// The single shard of an unsharded index.
    pub fn unsharded() -> Self {
        Self(None)
    }

    /// A named shard.
    pub fn named(id: impl Into<String>) -> Self {
        Self(Some(id.into()))
    }

    /// Shard identifier, `None` on an unsharded index.
    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(id) => f.write_str(id),
            None => f.write_str("default"),
        }
    }
}

/// Resolved shard layout of one index.
#[derive(Debug)]
pub struct ShardRouting {
    strategy: Option<Box<dyn ShardingStrategy>>,
    shards: Vec<ShardId>,
}

impl ShardRouting {
    /// Initialize `strategy` and capture the resulting layout.
    pub fn initialize(
        mut strategy: Box<dyn ShardingStrategy>,
        index_name: &str,
        settings: &ShardingSettings,
    ) -> Result<Self> {
        let mut context = ShardingStrategyInitializationContext::new(index_name, settings);
        strategy.initialize(&mut context)?;
        match context.finish()? {
            ShardingOutcome::Disabled => {
                tracing::info!(index = %index_name, strategy = strategy.name(), "sharding disabled");
                Ok(Self::unsharded())
            }
            ShardingOutcome::Enabled(ids) => {
                tracing::info!(
                    index = %index_name,
                    strategy = strategy.name(),
                    shards = ids.len(),
                    "sharding enabled"
                );
                Ok(Self {
                    strategy: Some(strategy),
                    shards: ids.into_iter().map(ShardId::named).collect(),
                })
            }
        }
    }

    /// Layout with one implicit shard.
    pub fn unsharded() -> Self {
        Self {
            strategy: None,
            shards: vec![ShardId::unsharded()],
        }
    }

    /// Whether documents are spread over several named shards.
    pub fn is_sharded(&self) -> bool {
        self.strategy.is_some()
    }

    /// Every shard of the index.
    pub fn all_shards(&self) -> &[ShardId] {
        &self.shards
    }

    /// Shard for an add or update.
    pub fn shard_for(&self, document_id: &str, routing_key: Option<&str>) -> Result<ShardId> {
        let Some(strategy) = &self.strategy else {
            return Ok(ShardId::unsharded());
        };
        let id = strategy.to_shard_identifier(document_id, routing_key)?;
        self.known(id)
    }

    /// Shards that may contain the document, for a delete.
    ///
    /// Without a routing key the document may have been routed anywhere, so
    /// every shard is targeted.
    pub fn shards_for_delete(&self, document_id: &str, routing_key: Option<&str>) -> Result<Vec<ShardId>> {
        match routing_key {
            Some(_) => Ok(vec![self.shard_for(document_id, routing_key)?]),
            None => Ok(self.shards.clone()),
        }
    }

    /// Shards for a set of routing keys; every shard when the set is empty.
    pub fn shards_for(&self, routing_keys: &BTreeSet<String>) -> Result<Vec<ShardId>> {
        let Some(strategy) = &self.strategy else {
            return Ok(self.shards.clone());
        };
        if routing_keys.is_empty() {
            return Ok(self.shards.clone());
        }
        strategy
            .to_shard_identifiers(routing_keys)?
            .into_iter()
            .map(|id| self.known(id))
            .collect()
    }

    fn known(&self, id: String) -> Result<ShardId> {
        let shard = ShardId::named(id);
        if self.shards.contains(&shard) {
            Ok(shard)
        } else {
            Err(Error::assertion(format!(
                "Sharding strategy returned unknown shard '{shard}'"
            )))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
