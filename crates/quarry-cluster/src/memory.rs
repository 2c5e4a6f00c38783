//! An in-process cluster.
//!
//! Each index keeps a live view, changed by writes, and a visible view,
//! replaced by the live one on refresh. Reads only see the visible view.
//! Delete-by-query selects its matches from the visible view, as a cluster
//! searcher snapshot does, and removes them from the live one.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use quarry_core::Result;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::client::{ClusterClient, ClusterHit, missing_index};
use crate::document::ClusterDocument;
use crate::query::ClusterQuery;

#[derive(Debug, Default)]
struct MemoryIndex {
    mappings: Value,
    live: BTreeMap<String, Map<String, Value>>,
    visible: BTreeMap<String, Map<String, Value>>,
    flushes: usize,
    merges: usize,
}

/// Cluster held in memory, for tests and embedded use.
#[derive(Debug, Default)]
pub struct InMemoryCluster {
    indexes: RwLock<HashMap<String, MemoryIndex>>,
}

/// Counters and sizes of one in-memory index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemoryIndexStats {
    /// Documents in the live view.
    pub live: usize,
    /// Documents in the visible view.
    pub visible: usize,
    /// Flush calls.
    pub flushes: usize,
    /// Force-merge calls.
    pub merges: usize,
}

impl InMemoryCluster {
    /// An empty cluster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of existing indexes, sorted.
    pub async fn index_names(&self) -> Vec<String> {
        let indexes = self.indexes.read().await;
        let mut names: Vec<String> = indexes.keys().cloned().collect();
        names.sort();
        names
    }

    /// Mappings an index was created with.
    pub async fn mappings(&self, index: &str) -> Option<Value> {
        self.indexes
            .read()
            .await
            .get(index)
            .map(|entry| entry.mappings.clone())
    }

    /// Counters of an index.
    pub async fn stats(&self, index: &str) -> Option<MemoryIndexStats> {
        self.indexes.read().await.get(index).map(|entry| MemoryIndexStats {
            live: entry.live.len(),
            visible: entry.visible.len(),
            flushes: entry.flushes,
            merges: entry.merges,
        })
    }

    /// Remove an index and its documents.
    pub async fn drop_index(&self, index: &str) -> bool {
        self.indexes.write().await.remove(index).is_some()
    }

    async fn write<T>(&self, index: &str, f: impl FnOnce(&mut MemoryIndex) -> T) -> Result<T> {
        let mut indexes = self.indexes.write().await;
        let entry = indexes.get_mut(index).ok_or_else(|| missing_index(index))?;
        Ok(f(entry))
    }

    async fn read<T>(&self, index: &str, f: impl FnOnce(&MemoryIndex) -> T) -> Result<T> {
        let indexes = self.indexes.read().await;
        let entry = indexes.get(index).ok_or_else(|| missing_index(index))?;
        Ok(f(entry))
    }
}

#[async_trait]
impl ClusterClient for InMemoryCluster {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        Ok(self.indexes.read().await.contains_key(index))
    }

    async fn create_index(&self, index: &str, mappings: &Value) -> Result<()> {
        self.indexes
            .write()
            .await
            .entry(index.to_string())
            .or_insert_with(|| MemoryIndex {
                mappings: mappings.clone(),
                ..MemoryIndex::default()
            });
        Ok(())
    }

    async fn index(&self, index: &str, document: &ClusterDocument) -> Result<()> {
        self.write(index, |entry| {
            entry.live.insert(document.id.clone(), document.source.clone());
        })
        .await
    }

    async fn delete(&self, index: &str, id: &str) -> Result<()> {
        self.write(index, |entry| {
            entry.live.remove(id);
        })
        .await
    }

    async fn delete_by_query(&self, index: &str, query: &ClusterQuery) -> Result<()> {
        self.write(index, |entry| {
            let matched: Vec<String> = entry
                .visible
                .iter()
                .filter(|(_, source)| query.matches(source))
                .map(|(id, _)| id.clone())
                .collect();
            for id in matched {
                entry.live.remove(&id);
            }
        })
        .await
    }

    async fn refresh(&self, index: &str) -> Result<()> {
        self.write(index, |entry| entry.visible = entry.live.clone()).await
    }

    async fn flush(&self, index: &str) -> Result<()> {
        self.write(index, |entry| entry.flushes += 1).await
    }

    async fn force_merge(&self, index: &str) -> Result<()> {
        self.write(index, |entry| entry.merges += 1).await
    }

    async fn get(&self, index: &str, id: &str) -> Result<Option<Value>> {
        self.read(index, |entry| entry.visible.get(id).cloned().map(Value::Object))
            .await
    }

    async fn count(&self, index: &str, query: &ClusterQuery) -> Result<u64> {
        self.read(index, |entry| {
            entry.visible.values().filter(|source| query.matches(source)).count() as u64
        })
        .await
    }

    async fn search(
        &self,
        index: &str,
        query: &ClusterQuery,
        limit: usize,
    ) -> Result<Vec<ClusterHit>> {
        self.read(index, |entry| {
            entry
                .visible
                .iter()
                .filter(|(_, source)| query.matches(source))
                .take(limit)
                .map(|(id, source)| ClusterHit {
                    id: id.clone(),
                    score: 1.0,
                    source: Value::Object(source.clone()),
                })
                .collect()
        })
        .await
    }
}

// ============================================================================
// Tests
// ============================================================================
