//! The Tantivy [`Backend`].
//!
//! Each shard is its own Tantivy index. On disk, an unsharded index lives in
//! `<root>/<index>` and a shard in `<root>/<index>/<shard>`. An existing
//! directory is reopened if its schema matches the model.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use quarry_core::{Error, Result};
use quarry_index::{
    Backend, CodecRegistry, IndexModel, ShardId, StoredObject, WorkTarget,
};
use tantivy::schema::Schema;
use tantivy::{Index, IndexReader, ReloadPolicy, TantivyDocument};

use crate::codec::{BACKEND_NAME, TantivyValue, tantivy_codecs};
use crate::document::build_document;
use crate::error::backend_error;
use crate::reader::TantivyShardReader;
use crate::schema::TantivyIndexSchema;
use crate::writer::TantivyShardWriter;

/// Default indexing memory budget per shard writer (50MB).
pub const DEFAULT_MEMORY_BUDGET: usize = 50_000_000;

#[derive(Debug, Clone)]
enum Location {
    Directory(PathBuf),
    Memory,
}

/// Embedded Tantivy backend.
#[derive(Debug)]
pub struct TantivyBackend {
    location: Location,
    memory_budget: usize,
    schemas: Mutex<HashMap<String, Arc<TantivyIndexSchema>>>,
}

impl TantivyBackend {
    /// Backend storing indexes under `root`.
    pub fn in_dir(root: impl Into<PathBuf>) -> Self {
        Self::with_location(Location::Directory(root.into()))
    }

    /// Backend keeping every shard in RAM.
    ///
    /// Reopening a shard starts from an empty index.
    pub fn in_memory() -> Self {
        Self::with_location(Location::Memory)
    }

    fn with_location(location: Location) -> Self {
        Self {
            location,
            memory_budget: DEFAULT_MEMORY_BUDGET,
            schemas: Mutex::new(HashMap::new()),
        }
    }

    /// Set the indexing memory budget of each shard writer.
    pub fn with_memory_budget(mut self, bytes: usize) -> Self {
        self.memory_budget = bytes;
        self
    }

    /// Directory of one shard, if the backend is on disk.
    pub fn shard_path(&self, index_name: &str, shard: &ShardId) -> Option<PathBuf> {
        match &self.location {
            Location::Directory(root) => {
                let index_dir = root.join(index_name);
                Some(match shard.as_str() {
                    Some(id) => index_dir.join(id),
                    None => index_dir,
                })
            }
            Location::Memory => None,
        }
    }

    fn schema_for(&self, model: &IndexModel<TantivyValue>) -> Result<Arc<TantivyIndexSchema>> {
        let mut schemas = self
            .schemas
            .lock()
            .map_err(|_| Error::backend("Schema cache lock poisoned"))?;
        let schema = schemas
            .entry(model.name().to_string())
            .or_insert_with(|| Arc::new(TantivyIndexSchema::build(model)));
        Ok(Arc::clone(schema))
    }

    fn open_index(&self, path: Option<&Path>, schema: &TantivyIndexSchema) -> Result<Index> {
        let Some(path) = path else {
            return Ok(Index::create_in_ram(schema.schema().clone()));
        };
        if !path.exists() {
            std::fs::create_dir_all(path).map_err(|e| Error::io_with_path(e, path))?;
        }
        if path.join("meta.json").exists() {
            let index =
                Index::open_in_dir(path).map_err(|e| backend_error("Failed to open index", e))?;
            check_schema(&index.schema(), schema.schema(), path)?;
            Ok(index)
        } else {
            Index::create_in_dir(path, schema.schema().clone())
                .map_err(|e| backend_error("Failed to create index", e))
        }
    }
}

/// Every field of `expected` must exist in `stored` with the same handle and type.
fn check_schema(stored: &Schema, expected: &Schema, path: &Path) -> Result<()> {
    for (field, entry) in expected.fields() {
        let matches = stored.get_field(entry.name()).ok() == Some(field)
            && stored.get_field_entry(field).field_type() == entry.field_type();
        if !matches {
            return Err(Error::schema(format!(
                "Index at {} was created with a different schema (field '{}')",
                path.display(),
                entry.name()
            )));
        }
    }
    Ok(())
}

fn open_reader(index: &Index) -> Result<IndexReader> {
    let reader: IndexReader = index
        .reader_builder()
        .reload_policy(ReloadPolicy::Manual)
        .try_into()
        .map_err(|e| backend_error("Failed to open index reader", e))?;
    reader
        .reload()
        .map_err(|e| backend_error("Failed to reload reader", e))?;
    Ok(reader)
}

#[async_trait]
impl Backend for TantivyBackend {
    type Value = TantivyValue;
    type Document = TantivyDocument;
    type Writer = TantivyShardWriter;
    type Reader = TantivyShardReader;

    fn name(&self) -> &str {
        BACKEND_NAME
    }

    fn codecs(&self) -> CodecRegistry<TantivyValue> {
        tantivy_codecs()
    }

    fn create_document(
        &self,
        model: &IndexModel<TantivyValue>,
        target: &WorkTarget,
        source: StoredObject<TantivyValue>,
    ) -> Result<TantivyDocument> {
        let schema = self.schema_for(model)?;
        build_document(&schema, target, &source)
    }

    async fn open_shard(
        &self,
        model: &Arc<IndexModel<TantivyValue>>,
        shard: &ShardId,
    ) -> Result<(TantivyShardWriter, TantivyShardReader)> {
        let schema = self.schema_for(model)?;
        let path = self.shard_path(model.name(), shard);
        let index = self.open_index(path.as_deref(), &schema)?;
        TantivyIndexSchema::register_tokenizers(&index);

        let reader = open_reader(&index)?;
        let name = format!("{}/{}", model.name(), shard);
        let writer = TantivyShardWriter::open(
            name.clone(),
            index.clone(),
            Arc::clone(&schema),
            reader.clone(),
            self.memory_budget,
        )?;
        tracing::debug!(shard = %name, path = ?path, "tantivy shard opened");
        Ok((writer, TantivyShardReader::new(index, schema, reader)))
    }
}

// ============================================================================
// Tests
// ============================================================================
