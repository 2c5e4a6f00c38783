use std::collections::BTreeSet;

use quarry_core::{Error, Result};

use super::{ShardingStrategy, ShardingStrategyInitializationContext};

/// Routing keys are shard identifiers, drawn from a configured set.
#[derive(Debug, Default, Clone)]
pub struct ExplicitShardingStrategy {
    identifiers: BTreeSet<String>,
}

impl ExplicitShardingStrategy {
    fn check(&self, key: &str) -> Result<String> {
        if self.identifiers.contains(key) {
            Ok(key.to_string())
        } else {
            Err(Error::not_found(key, "Shard"))
        }
    }
}

impl ShardingStrategy for ExplicitShardingStrategy {
    fn name(&self) -> &str {
        "explicit"
    }

    fn initialize(&mut self, context: &mut ShardingStrategyInitializationContext) -> Result<()> {
        let configured = context.configured_identifiers().to_vec();
        if configured.is_empty() {
            return Err(Error::config(format!(
                "Explicit sharding for index '{}' requires shard_identifiers",
                context.index_name()
            )));
        }
        self.identifiers = configured.iter().cloned().collect();
        context.set_shard_identifiers(configured);
        Ok(())
    }

    fn to_shard_identifier(&self, document_id: &str, routing_key: Option<&str>) -> Result<String> {
        let key = routing_key.ok_or_else(|| {
            Error::operation(format!(
                "Document '{document_id}' needs a routing key naming its shard"
            ))
        })?;
        self.check(key)
    }

    fn to_shard_identifiers(&self, routing_keys: &BTreeSet<String>) -> Result<BTreeSet<String>> {
        routing_keys.iter().map(|key| self.check(key)).collect()
    }
}
