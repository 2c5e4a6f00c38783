//! IO strategies: when a shard's writes are committed and made visible.
//!
//! The strategy is chosen once per index. Individual works can still ask
//! for more through [`Visibility`](crate::work::Visibility).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::settings::IndexSettings;

/// What to do after applying a batch of works.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchVisibility {
    /// Commit the writer.
    pub commit: bool,
    /// Refresh readers.
    pub refresh: bool,
}

/// Governs batching, commits and refreshes for every shard of an index.
pub trait IoStrategy: Send + Sync + fmt::Debug {
    /// Strategy name for logs.
    fn name(&self) -> &str;

    /// Upper bound on works applied before visibility actions run.
    fn max_batch_size(&self, configured: usize) -> usize;

    /// Actions taken at the end of every batch.
    fn visibility_after_batch(&self) -> BatchVisibility;

    /// Period of background commits, if any.
    fn commit_interval(&self) -> Option<Duration>;

    /// Period of background refreshes, if any.
    fn refresh_interval(&self) -> Option<Duration>;
}

/// Deferred commits and periodic refreshes.
///
/// A zero commit interval commits at the end of every batch; a zero refresh
/// interval leaves refreshing to explicit requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NearRealTimeIoStrategy {
    commit_interval: Duration,
    refresh_interval: Duration,
}

impl NearRealTimeIoStrategy {
    /// Create with both periods.
    pub fn new(commit_interval: Duration, refresh_interval: Duration) -> Self {
        Self {
            commit_interval,
            refresh_interval,
        }
    }
}

impl IoStrategy for NearRealTimeIoStrategy {
    fn name(&self) -> &str {
        "near_real_time"
    }

    fn max_batch_size(&self, configured: usize) -> usize {
        configured.max(1)
    }

    fn visibility_after_batch(&self) -> BatchVisibility {
        BatchVisibility {
            commit: self.commit_interval.is_zero(),
            refresh: false,
        }
    }

    fn commit_interval(&self) -> Option<Duration> {
        (!self.commit_interval.is_zero()).then_some(self.commit_interval)
    }

    fn refresh_interval(&self) -> Option<Duration> {
        (!self.refresh_interval.is_zero()).then_some(self.refresh_interval)
    }
}

/// Commit and refresh after every single work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugIoStrategy;

impl IoStrategy for DebugIoStrategy {
    fn name(&self) -> &str {
        "debug"
    }

    fn max_batch_size(&self, _configured: usize) -> usize {
        1
    }

    fn visibility_after_batch(&self) -> BatchVisibility {
        BatchVisibility {
            commit: true,
            refresh: true,
        }
    }

    fn commit_interval(&self) -> Option<Duration> {
        None
    }

    fn refresh_interval(&self) -> Option<Duration> {
        None
    }
}

/// Built-in strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IoStrategyName {
    /// [`NearRealTimeIoStrategy`].
    #[default]
    NearRealTime,
    /// [`DebugIoStrategy`].
    Debug,
}

impl IoStrategyName {
    /// Instantiate the named strategy from index settings.
    pub fn build(&self, settings: &IndexSettings) -> Arc<dyn IoStrategy> {
        match self {
            IoStrategyName::NearRealTime => Arc::new(NearRealTimeIoStrategy::new(
                settings.commit_interval(),
                settings.refresh_interval(),
            )),
            IoStrategyName::Debug => Arc::new(DebugIoStrategy),
        }
    }
}
