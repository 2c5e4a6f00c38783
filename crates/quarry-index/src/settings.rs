//! Per-index settings, resolved once when an index is opened.
//!
//! Settings are plain serde types and can be read from TOML:
//!
//! ```toml
//! io_strategy = "near_real_time"
//! commit_interval_ms = 500
//! multi_tenancy = "discriminator"
//!
//! [sharding]
//! strategy = "hash"
//! number_of_shards = 4
//! ```

use std::path::Path;
use std::time::Duration;

use quarry_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::io::IoStrategyName;
use crate::sharding::ShardingStrategyName;
use crate::tenancy::MultiTenancyStrategy;

/// Sharding configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShardingSettings {
    /// Which strategy maps documents to shards.
    #[serde(default)]
    pub strategy: ShardingStrategyName,

    /// Shard count for the hash strategy.
    #[serde(default)]
    pub number_of_shards: Option<usize>,

    /// Shard identifiers for the explicit strategy.
    #[serde(default)]
    pub shard_identifiers: Vec<String>,
}

/// Settings of one index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSettings {
    /// How written data becomes visible to readers.
    #[serde(default)]
    pub io_strategy: IoStrategyName,

    /// Near-real-time commit period; 0 commits at the end of every batch.
    #[serde(default = "default_commit_interval_ms")]
    pub commit_interval_ms: u64,

    /// Near-real-time refresh period; 0 disables periodic refresh.
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,

    /// Capacity of each shard's work queue.
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,

    /// Maximum works applied between two visibility checkpoints.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Concurrent shard jobs in the parallel orchestrator.
    #[serde(default = "default_parallel_concurrency")]
    pub parallel_concurrency: usize,

    /// Sharding configuration.
    #[serde(default)]
    pub sharding: ShardingSettings,

    /// Tenant handling.
    #[serde(default)]
    pub multi_tenancy: MultiTenancyStrategy,
}

fn default_commit_interval_ms() -> u64 {
    1000
}

fn default_refresh_interval_ms() -> u64 {
    1000
}

fn default_queue_size() -> usize {
    1000
}

fn default_max_batch_size() -> usize {
    100
}

fn default_parallel_concurrency() -> usize {
    4
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            io_strategy: IoStrategyName::default(),
            commit_interval_ms: default_commit_interval_ms(),
            refresh_interval_ms: default_refresh_interval_ms(),
            queue_size: default_queue_size(),
            max_batch_size: default_max_batch_size(),
            parallel_concurrency: default_parallel_concurrency(),
            sharding: ShardingSettings::default(),
            multi_tenancy: MultiTenancyStrategy::default(),
        }
    }
}

impl IndexSettings {
    /// Parse settings from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings: Self =
            toml::from_str(text).map_err(|e| Error::parse(format!("Invalid index settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::io_with_path(e, path))?;
        Self::from_toml_str(&text)
    }

    /// Reject values no orchestrator can run with.
    pub fn validate(&self) -> Result<()> {
        if self.queue_size == 0 {
            return Err(Error::config("queue_size must be at least 1"));
        }
        if self.max_batch_size == 0 {
            return Err(Error::config("max_batch_size must be at least 1"));
        }
        if self.parallel_concurrency == 0 {
            return Err(Error::config("parallel_concurrency must be at least 1"));
        }
        Ok(())
    }

    /// Commit period as a duration.
    pub fn commit_interval(&self) -> Duration {
        Duration::from_millis(self.commit_interval_ms)
    }

    /// Refresh period as a duration.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}

// ============================================================================
// Tests
// ============================================================================
