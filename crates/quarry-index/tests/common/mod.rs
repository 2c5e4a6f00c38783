//! Common test utilities: an in-memory backend and a small book schema.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use quarry_index::codec::{CodecSignature, ConversionError, ConversionResult};
use quarry_index::orchestration::{FailureContext, FailureHandler};
use quarry_index::schema::{FieldReference, ObjectFieldReference};
use quarry_index::settings::ShardingSettings;
use quarry_index::{
    Backend, CodecRegistry, Error, FieldCodec, FieldDefinition, FieldType, FieldValue, IndexManager,
    IndexManagerOptions, IndexModel, IndexSchemaBuilder, IndexSettings, ObjectStructure, Result,
    SearchHit, SearchQuery, ShardId, ShardReader, ShardWriter, ShardingStrategyName, StoredObject,
    TermQuery, WorkTarget,
};

// ============================================================================
// Codecs
// ============================================================================

/// Codec that stores normalized values as they are.
#[derive(Debug)]
pub struct IdentityCodec(pub FieldType);

impl FieldCodec<FieldValue> for IdentityCodec {
    fn field_type(&self) -> FieldType {
        self.0
    }

    fn signature(&self) -> CodecSignature {
        CodecSignature::new("identity", self.0)
    }

    fn encode(&self, value: &FieldValue) -> ConversionResult<FieldValue> {
        if value.fits(self.0) {
            Ok(value.clone())
        } else {
            Err(ConversionError::type_mismatch(self.0.as_str(), value))
        }
    }

    fn decode(&self, native: &FieldValue) -> ConversionResult<FieldValue> {
        Ok(native.clone())
    }
}

pub fn memory_codecs() -> CodecRegistry<FieldValue> {
    [
        FieldType::Keyword,
        FieldType::Text,
        FieldType::Integer,
        FieldType::Long,
        FieldType::Double,
        FieldType::Boolean,
        FieldType::Instant,
        FieldType::LocalDate,
    ]
    .into_iter()
    .fold(CodecRegistry::new("memory"), |registry, field_type| {
        registry.with(Arc::new(IdentityCodec(field_type)))
    })
}

// ============================================================================
// In-memory backend
// ============================================================================

/// A document as held by the in-memory backend.
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    pub tenant_id: Option<String>,
    pub routing_key: Option<String>,
    pub source: StoredObject<FieldValue>,
}

#[derive(Debug, Default)]
struct ShardData {
    pending: BTreeMap<String, MemoryDocument>,
    visible: BTreeMap<String, MemoryDocument>,
    log: Vec<String>,
}

/// State of one in-memory shard, shared by its writer and reader.
#[derive(Debug, Default)]
pub struct MemoryShard {
    data: Mutex<ShardData>,
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl MemoryShard {
    /// Every writer call, in order.
    pub fn log(&self) -> Vec<String> {
        self.data.lock().unwrap().log.clone()
    }

    /// Ids of documents readers can see.
    pub fn visible_ids(&self) -> Vec<String> {
        self.data.lock().unwrap().visible.keys().cloned().collect()
    }

    /// Ids of documents written, visible or not.
    pub fn pending_ids(&self) -> Vec<String> {
        self.data.lock().unwrap().pending.keys().cloned().collect()
    }

    /// Block entity writes on this shard until the guard is dropped.
    pub async fn hold(&self) -> tokio::sync::OwnedMutexGuard<()> {
        Arc::clone(&self.gate).lock_owned().await
    }

    fn record(&self, op: String) {
        self.data.lock().unwrap().log.push(op);
    }
}

fn matches_tenant(document: &MemoryDocument, tenant_id: Option<&str>) -> bool {
    tenant_id.is_none() || document.tenant_id.as_deref() == tenant_id
}

fn matches_term(document: &MemoryDocument, query: &TermQuery<FieldValue>) -> bool {
    document
        .source
        .values_at(&query.path)
        .into_iter()
        .any(|value| *value == query.value)
}

pub struct MemoryWriter {
    shard: Arc<MemoryShard>,
}

#[async_trait]
impl ShardWriter for MemoryWriter {
    type Document = MemoryDocument;
    type Value = FieldValue;

    async fn add(&mut self, target: &WorkTarget, document: MemoryDocument) -> Result<()> {
        let _gate = self.shard.gate.lock().await;
        let mut data = self.shard.data.lock().unwrap();
        data.log.push(format!("add:{}", target.document_id));
        data.pending.insert(target.document_id.clone(), document);
        Ok(())
    }

    async fn update(&mut self, target: &WorkTarget, document: MemoryDocument) -> Result<()> {
        let _gate = self.shard.gate.lock().await;
        let mut data = self.shard.data.lock().unwrap();
        data.log.push(format!("update:{}", target.document_id));
        data.pending.insert(target.document_id.clone(), document);
        Ok(())
    }

    async fn delete(&mut self, target: &WorkTarget) -> Result<()> {
        let _gate = self.shard.gate.lock().await;
        let mut data = self.shard.data.lock().unwrap();
        data.log.push(format!("delete:{}", target.document_id));
        data.pending.remove(&target.document_id);
        Ok(())
    }

    async fn purge(&mut self, tenant_id: Option<&str>, routing_keys: &BTreeSet<String>) -> Result<()> {
        let mut data = self.shard.data.lock().unwrap();
        data.log.push(format!("purge:{}", tenant_id.unwrap_or("*")));
        data.pending.retain(|_, document| {
            let routed = routing_keys.is_empty()
                || document
                    .routing_key
                    .as_ref()
                    .is_some_and(|key| routing_keys.contains(key));
            !(routed && matches_tenant(document, tenant_id))
        });
        Ok(())
    }

    async fn delete_by_query(
        &mut self,
        tenant_id: Option<&str>,
        query: &TermQuery<FieldValue>,
    ) -> Result<()> {
        let mut data = self.shard.data.lock().unwrap();
        data.log.push(format!("delete_by_query:{}", query.path));
        data.pending
            .retain(|_, document| !(matches_tenant(document, tenant_id) && matches_term(document, query)));
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.shard.record("commit".to_string());
        Ok(())
    }

    async fn refresh(&mut self) -> Result<()> {
        let mut data = self.shard.data.lock().unwrap();
        data.log.push("refresh".to_string());
        let snapshot = data.pending.clone();
        data.visible = snapshot;
        Ok(())
    }

    async fn merge_segments(&mut self) -> Result<()> {
        self.shard.record("merge".to_string());
        Ok(())
    }

    async fn reopen(&mut self) -> Result<()> {
        self.shard.record("reopen".to_string());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.shard.record("close".to_string());
        Ok(())
    }
}

pub struct MemoryReader {
    shard: Arc<MemoryShard>,
}

#[async_trait]
impl ShardReader for MemoryReader {
    type Value = FieldValue;

    async fn get(&self, document_id: &str) -> Result<Option<StoredObject<FieldValue>>> {
        let data = self.shard.data.lock().unwrap();
        Ok(data.visible.get(document_id).map(|d| d.source.clone()))
    }

    async fn count(&self, tenant_id: Option<&str>) -> Result<u64> {
        let data = self.shard.data.lock().unwrap();
        Ok(data
            .visible
            .values()
            .filter(|d| matches_tenant(d, tenant_id))
            .count() as u64)
    }

    async fn search(
        &self,
        query: &SearchQuery<FieldValue>,
        tenant_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchHit<FieldValue>>> {
        let data = self.shard.data.lock().unwrap();
        Ok(data
            .visible
            .iter()
            .filter(|(_, d)| matches_tenant(d, tenant_id))
            .filter(|(_, d)| match query {
                SearchQuery::MatchAll => true,
                SearchQuery::Term(term) => matches_term(d, term),
            })
            .take(limit)
            .map(|(id, d)| SearchHit {
                document_id: id.clone(),
                score: 1.0,
                source: d.source.clone(),
            })
            .collect())
    }
}

/// Backend keeping every shard in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    shards: Mutex<BTreeMap<ShardId, Arc<MemoryShard>>>,
    fail_open: Mutex<Option<ShardId>>,
}

impl MemoryBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make opening `shard` fail.
    pub fn fail_open(&self, shard: ShardId) {
        *self.fail_open.lock().unwrap() = Some(shard);
    }

    /// State of an opened shard.
    pub fn shard(&self, shard: &ShardId) -> Arc<MemoryShard> {
        Arc::clone(&self.shards.lock().unwrap()[shard])
    }

    /// Shards opened so far.
    pub fn opened(&self) -> Vec<ShardId> {
        self.shards.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    type Value = FieldValue;
    type Document = MemoryDocument;
    type Writer = MemoryWriter;
    type Reader = MemoryReader;

    fn name(&self) -> &str {
        "memory"
    }

    fn codecs(&self) -> CodecRegistry<FieldValue> {
        memory_codecs()
    }

    fn create_document(
        &self,
        _model: &IndexModel<FieldValue>,
        target: &WorkTarget,
        source: StoredObject<FieldValue>,
    ) -> Result<MemoryDocument> {
        Ok(MemoryDocument {
            tenant_id: target.tenant_id.clone(),
            routing_key: target.routing_key.clone(),
            source,
        })
    }

    async fn open_shard(
        &self,
        _model: &Arc<IndexModel<FieldValue>>,
        shard: &ShardId,
    ) -> Result<(MemoryWriter, MemoryReader)> {
        if self.fail_open.lock().unwrap().as_ref() == Some(shard) {
            return Err(Error::backend(format!("cannot open shard {shard}")));
        }
        let state = Arc::new(MemoryShard::default());
        self.shards
            .lock()
            .unwrap()
            .insert(shard.clone(), Arc::clone(&state));
        Ok((
            MemoryWriter {
                shard: Arc::clone(&state),
            },
            MemoryReader { shard: state },
        ))
    }
}

// ============================================================================
// Schema and settings
// ============================================================================

/// Book schema with references for populating documents.
pub struct BookSchema {
    pub model: Arc<IndexModel<FieldValue>>,
    pub title: FieldReference<String, FieldValue>,
    pub isbn: FieldReference<String, FieldValue>,
    pub pages: FieldReference<i32, FieldValue>,
    pub internal_note: FieldReference<String, FieldValue>,
    pub author: ObjectFieldReference,
    pub author_name: FieldReference<String, FieldValue>,
}

impl BookSchema {
    pub fn new(index_name: &str) -> Self {
        let codecs = memory_codecs();
        let mut builder = IndexSchemaBuilder::new(index_name, &codecs);
        let root = builder.root();
        let title = builder
            .add_field(root, "title", FieldDefinition::<String>::new(FieldType::Text))
            .unwrap();
        let isbn = builder
            .add_field(root, "isbn", FieldDefinition::<String>::new(FieldType::Keyword))
            .unwrap();
        let pages = builder
            .add_field(
                root,
                "pages",
                FieldDefinition::<i32>::new(FieldType::Integer).sortable(),
            )
            .unwrap();
        let internal_note = builder
            .add_field(
                root,
                "internal_note",
                FieldDefinition::<String>::new(FieldType::Keyword).projectable(false),
            )
            .unwrap();
        let author = builder
            .add_object_field(root, "author", ObjectStructure::Flattened, false)
            .unwrap();
        let author_name = builder
            .add_field(
                author.node(),
                "name",
                FieldDefinition::<String>::new(FieldType::Keyword),
            )
            .unwrap();
        Self {
            model: builder.build().unwrap(),
            title,
            isbn,
            pages,
            internal_note,
            author,
            author_name,
        }
    }
}

pub fn debug_settings() -> IndexSettings {
    IndexSettings {
        io_strategy: quarry_index::io::IoStrategyName::Debug,
        ..IndexSettings::default()
    }
}

pub fn hash_settings(number_of_shards: usize) -> IndexSettings {
    IndexSettings {
        sharding: ShardingSettings {
            strategy: ShardingStrategyName::Hash,
            number_of_shards: Some(number_of_shards),
            shard_identifiers: Vec::new(),
        },
        ..debug_settings()
    }
}

pub fn explicit_settings(identifiers: &[&str]) -> IndexSettings {
    IndexSettings {
        sharding: ShardingSettings {
            strategy: ShardingStrategyName::Explicit,
            number_of_shards: None,
            shard_identifiers: identifiers.iter().map(|s| s.to_string()).collect(),
        },
        ..debug_settings()
    }
}

/// Failure handler that keeps work descriptions.
#[derive(Debug, Default)]
pub struct CollectingFailureHandler {
    failures: Mutex<Vec<String>>,
}

impl CollectingFailureHandler {
    pub fn failures(&self) -> Vec<String> {
        self.failures.lock().unwrap().clone()
    }
}

impl FailureHandler for CollectingFailureHandler {
    fn handle(&self, context: FailureContext) {
        self.failures.lock().unwrap().push(context.work);
    }
}

/// An opened book index over the in-memory backend.
pub struct TestIndex {
    pub backend: Arc<MemoryBackend>,
    pub schema: BookSchema,
    pub manager: Arc<IndexManager<MemoryBackend>>,
    pub failures: Arc<CollectingFailureHandler>,
}

impl TestIndex {
    pub async fn open(settings: IndexSettings) -> Self {
        let backend = MemoryBackend::new();
        let schema = BookSchema::new("books");
        let failures = Arc::new(CollectingFailureHandler::default());
        let options = IndexManagerOptions {
            failure_handler: Some(failures.clone() as Arc<dyn FailureHandler>),
            ..IndexManagerOptions::default()
        };
        let manager = IndexManager::open(
            Arc::clone(&backend),
            Arc::clone(&schema.model),
            settings,
            options,
        )
        .await
        .unwrap();
        Self {
            backend,
            schema,
            manager,
            failures,
        }
    }

    /// Document with a title and isbn.
    pub fn book(&self, title: &str, isbn: &str) -> quarry_index::DocumentElement<FieldValue> {
        let mut document = self.manager.new_document();
        document.add(&self.schema.title, title.to_string()).unwrap();
        document.add(&self.schema.isbn, isbn.to_string()).unwrap();
        document
    }

    /// Log of the single shard of an unsharded index.
    pub fn log(&self) -> Vec<String> {
        self.backend.shard(&ShardId::unsharded()).log()
    }
}
