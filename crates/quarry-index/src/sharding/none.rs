use std::collections::BTreeSet;

use quarry_core::{Error, Result};

use super::{ShardingStrategy, ShardingStrategyInitializationContext};

/// Disables sharding. Shard resolution on it is a programming error.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoShardingStrategy;

impl NoShardingStrategy {
    fn unreachable() -> Error {
        Error::assertion("Shard resolution requested on an index without sharding")
    }
}

impl ShardingStrategy for NoShardingStrategy {
    fn name(&self) -> &str {
        "none"
    }

    fn initialize(&mut self, context: &mut ShardingStrategyInitializationContext) -> Result<()> {
        context.disable_sharding();
        Ok(())
    }

    fn to_shard_identifier(&self, _document_id: &str, _routing_key: Option<&str>) -> Result<String> {
        Err(Self::unreachable())
    }

    fn to_shard_identifiers(&self, _routing_keys: &BTreeSet<String>) -> Result<BTreeSet<String>> {
        Err(Self::unreachable())
    }
}
