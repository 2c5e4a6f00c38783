//! Shard reader over a Tantivy `IndexReader`.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use quarry_core::Result;
use quarry_index::{SearchHit, SearchQuery, ShardReader, StoredObject};
use tantivy::collector::{Count, TopDocs};
use tantivy::query::AllQuery;
use tantivy::{Index, IndexReader, TantivyDocument};

use crate::codec::TantivyValue;
use crate::document::{document_id, stored_source};
use crate::error::backend_error;
use crate::query;
use crate::schema::TantivyIndexSchema;

/// Reader side of one Tantivy shard.
///
/// Sees the state of the last refresh of the shard's writer.
#[derive(Clone)]
pub struct TantivyShardReader {
    index: Index,
    schema: Arc<TantivyIndexSchema>,
    reader: IndexReader,
}

impl TantivyShardReader {
    pub(crate) fn new(index: Index, schema: Arc<TantivyIndexSchema>, reader: IndexReader) -> Self {
        Self {
            index,
            schema,
            reader,
        }
    }
}

#[async_trait]
impl ShardReader for TantivyShardReader {
    type Value = TantivyValue;

    async fn get(&self, document_id: &str) -> Result<Option<StoredObject<TantivyValue>>> {
        let searcher = self.reader.searcher();
        let top = searcher
            .search(&query::id_query(&self.schema, document_id), &TopDocs::with_limit(1).order_by_score())
            .map_err(|e| backend_error("Failed to get document", e))?;
        let Some((_, address)) = top.first() else {
            return Ok(None);
        };
        let document: TantivyDocument = searcher
            .doc(*address)
            .map_err(|e| backend_error("Failed to load document", e))?;
        stored_source(&self.schema, &document).map(Some)
    }

    async fn count(&self, tenant_id: Option<&str>) -> Result<u64> {
        let searcher = self.reader.searcher();
        if tenant_id.is_none() {
            return Ok(searcher.num_docs());
        }
        let query = query::restrict(Box::new(AllQuery), &self.schema, tenant_id, &BTreeSet::new());
        let count = searcher
            .search(&query, &Count)
            .map_err(|e| backend_error("Failed to count documents", e))?;
        Ok(count as u64)
    }

    async fn search(
        &self,
        search: &SearchQuery<TantivyValue>,
        tenant_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchHit<TantivyValue>>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let query = query::search_query(&self.index, &self.schema, search, tenant_id)?;
        let searcher = self.reader.searcher();
        let top = searcher
            .search(&query, &TopDocs::with_limit(limit).order_by_score())
            .map_err(|e| backend_error("Failed to search", e))?;

        let mut hits = Vec::with_capacity(top.len());
        for (score, address) in top {
            let document: TantivyDocument = searcher
                .doc(address)
                .map_err(|e| backend_error("Failed to load document", e))?;
            hits.push(SearchHit {
                document_id: document_id(&self.schema, &document)?,
                score,
                source: stored_source(&self.schema, &document)?,
            });
        }
        Ok(hits)
    }
}

impl std::fmt::Debug for TantivyShardReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TantivyShardReader")
            .field("schema", &self.schema)
            .finish()
    }
}
