use std::collections::BTreeSet;

use quarry_core::{Error, Result};

use super::{ShardingStrategy, ShardingStrategyInitializationContext};

/// Spreads documents over `number_of_shards` shards named `"0"..`.
///
/// The routing key is hashed when present, otherwise the document id. The
/// hash is blake3, so assignments are stable across processes and releases.
#[derive(Debug, Default, Clone)]
pub struct HashShardingStrategy {
    number_of_shards: usize,
}

impl HashShardingStrategy {
    /// Shard index for a key.
    pub fn shard_index(&self, key: &str) -> usize {
        let digest = blake3::hash(key.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest.as_bytes()[..8]);
        let n = self.number_of_shards.max(1) as u64;
        (u64::from_le_bytes(prefix) % n) as usize
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.number_of_shards == 0 {
            return Err(Error::assertion("Hash sharding strategy used before initialization"));
        }
        Ok(())
    }
}

impl ShardingStrategy for HashShardingStrategy {
    fn name(&self) -> &str {
        "hash"
    }

    fn initialize(&mut self, context: &mut ShardingStrategyInitializationContext) -> Result<()> {
        let n = context.number_of_shards().unwrap_or(0);
        if n == 0 {
            return Err(Error::config(format!(
                "Hash sharding for index '{}' requires number_of_shards >= 1",
                context.index_name()
            )));
        }
        self.number_of_shards = n;
        context.set_shard_identifiers((0..n).map(|i| i.to_string()));
        Ok(())
    }

    fn to_shard_identifier(&self, document_id: &str, routing_key: Option<&str>) -> Result<String> {
        self.ensure_initialized()?;
        Ok(self.shard_index(routing_key.unwrap_or(document_id)).to_string())
    }

    fn to_shard_identifiers(&self, routing_keys: &BTreeSet<String>) -> Result<BTreeSet<String>> {
        self.ensure_initialized()?;
        Ok(routing_keys
            .iter()
            .map(|key| self.shard_index(key).to_string())
            .collect())
    }
}
