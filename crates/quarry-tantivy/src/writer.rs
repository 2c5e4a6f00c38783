//! Shard writer over a Tantivy `IndexWriter`.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use quarry_core::{Error, Result};
use quarry_index::{ShardWriter, TermQuery, WorkTarget};
use tantivy::query::{AllQuery, Query};
use tantivy::{Index, IndexReader, IndexWriter, TantivyDocument};

use crate::codec::TantivyValue;
use crate::error::backend_error;
use crate::query;
use crate::schema::TantivyIndexSchema;

/// Writer side of one Tantivy shard.
///
/// Tantivy readers only see committed segments, so a refresh commits any
/// pending changes before reloading the reader.
pub struct TantivyShardWriter {
    name: String,
    index: Index,
    schema: Arc<TantivyIndexSchema>,
    reader: IndexReader,
    writer: Option<IndexWriter>,
    memory_budget: usize,
    dirty: bool,
}

impl TantivyShardWriter {
    pub(crate) fn open(
        name: String,
        index: Index,
        schema: Arc<TantivyIndexSchema>,
        reader: IndexReader,
        memory_budget: usize,
    ) -> Result<Self> {
        let writer = create_writer(&index, memory_budget)?;
        Ok(Self {
            name,
            index,
            schema,
            reader,
            writer: Some(writer),
            memory_budget,
            dirty: false,
        })
    }

    fn writer(&mut self) -> Result<&mut IndexWriter> {
        self.writer
            .as_mut()
            .ok_or_else(|| Error::backend_fatal("Shard writer is closed"))
    }

    fn delete_matching(&mut self, query: Box<dyn Query>) -> Result<()> {
        self.writer()?
            .delete_query(query)
            .map_err(|e| backend_error("Failed to delete by query", e))?;
        self.dirty = true;
        Ok(())
    }
}

fn create_writer(index: &Index, memory_budget: usize) -> Result<IndexWriter> {
    index
        .writer_with_num_threads(1, memory_budget)
        .map_err(|e| backend_error("Failed to create index writer", e))
}

impl std::fmt::Debug for TantivyShardWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TantivyShardWriter")
            .field("name", &self.name)
            .field("open", &self.writer.is_some())
            .field("dirty", &self.dirty)
            .finish()
    }
}

#[async_trait]
impl ShardWriter for TantivyShardWriter {
    type Document = TantivyDocument;
    type Value = TantivyValue;

    async fn add(&mut self, _target: &WorkTarget, document: TantivyDocument) -> Result<()> {
        self.writer()?
            .add_document(document)
            .map_err(|e| backend_error("Failed to add document", e))?;
        self.dirty = true;
        Ok(())
    }

    async fn update(&mut self, target: &WorkTarget, document: TantivyDocument) -> Result<()> {
        let term = query::id_term(&self.schema, &target.document_id);
        let writer = self.writer()?;
        writer.delete_term(term);
        writer
            .add_document(document)
            .map_err(|e| backend_error("Failed to update document", e))?;
        self.dirty = true;
        Ok(())
    }

    async fn delete(&mut self, target: &WorkTarget) -> Result<()> {
        let term = query::id_term(&self.schema, &target.document_id);
        self.writer()?.delete_term(term);
        self.dirty = true;
        Ok(())
    }

    async fn purge(&mut self, tenant_id: Option<&str>, routing_keys: &BTreeSet<String>) -> Result<()> {
        let purge = query::restrict(Box::new(AllQuery), &self.schema, tenant_id, routing_keys);
        self.delete_matching(purge)
    }

    async fn delete_by_query(
        &mut self,
        tenant_id: Option<&str>,
        term: &TermQuery<TantivyValue>,
    ) -> Result<()> {
        let matching = query::term_query(&self.index, &self.schema, term)?;
        let matching = query::restrict(matching, &self.schema, tenant_id, &BTreeSet::new());
        self.delete_matching(matching)
    }

    async fn commit(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.writer()?
            .commit()
            .map_err(|e| backend_error("Failed to commit index", e))?;
        self.dirty = false;
        tracing::trace!(shard = %self.name, "committed");
        Ok(())
    }

    async fn refresh(&mut self) -> Result<()> {
        self.commit().await?;
        self.reader
            .reload()
            .map_err(|e| backend_error("Failed to reload reader", e))
    }

    async fn merge_segments(&mut self) -> Result<()> {
        let segments = self
            .index
            .searchable_segment_ids()
            .map_err(|e| backend_error("Failed to list segments", e))?;
        if segments.len() < 2 {
            return Ok(());
        }
        let merge = self.writer()?.merge(&segments);
        merge
            .await
            .map_err(|e| backend_error("Failed to merge segments", e))?;
        tracing::debug!(shard = %self.name, segments = segments.len(), "segments merged");
        Ok(())
    }

    async fn reopen(&mut self) -> Result<()> {
        // The directory lock is held until the old writer is dropped.
        drop(self.writer.take());
        self.dirty = false;
        self.writer = Some(create_writer(&self.index, self.memory_budget)?);
        self.reader
            .reload()
            .map_err(|e| backend_error("Failed to reload reader", e))?;
        tracing::info!(shard = %self.name, "writer reopened");
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };
        writer
            .wait_merging_threads()
            .map_err(|e| backend_error("Failed to close writer", e))
    }
}
