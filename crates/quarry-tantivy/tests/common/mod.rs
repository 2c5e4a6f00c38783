//! Common test utilities: a book schema over the Tantivy backend.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use quarry_index::io::IoStrategyName;
use quarry_index::schema::FieldReference;
use quarry_index::{
    DocumentElement, EntityReference, FieldDefinition, FieldType, IndexManager,
    IndexManagerOptions, IndexModel, IndexSchemaBuilder, IndexSettings, Result, WorkOutcome,
};
use quarry_tantivy::{TantivyBackend, TantivyValue, tantivy_codecs};

pub struct BookSchema {
    pub model: Arc<IndexModel<TantivyValue>>,
    pub title: FieldReference<String, TantivyValue>,
    pub isbn: FieldReference<String, TantivyValue>,
    pub pages: FieldReference<i32, TantivyValue>,
}

impl BookSchema {
    pub fn new(index_name: &str) -> Self {
        let codecs = tantivy_codecs();
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
        Self {
            model: builder.build().unwrap(),
            title,
            isbn,
            pages,
        }
    }
}

/// Commit and refresh after every work.
pub fn debug_settings() -> IndexSettings {
    IndexSettings {
        io_strategy: IoStrategyName::Debug,
        ..IndexSettings::default()
    }
}

pub struct TantivyIndex {
    pub schema: BookSchema,
    pub manager: Arc<IndexManager<TantivyBackend>>,
}

impl TantivyIndex {
    pub async fn in_memory(settings: IndexSettings) -> Self {
        Self::open(TantivyBackend::in_memory(), settings).await.unwrap()
    }

    pub async fn in_dir(root: &Path, settings: IndexSettings) -> Result<Self> {
        Self::open(TantivyBackend::in_dir(root), settings).await
    }

    async fn open(backend: TantivyBackend, settings: IndexSettings) -> Result<Self> {
        let schema = BookSchema::new("books");
        let manager = IndexManager::open(
            Arc::new(backend),
            Arc::clone(&schema.model),
            settings,
            IndexManagerOptions::default(),
        )
        .await?;
        Ok(Self { schema, manager })
    }

    pub fn book(&self, title: &str, isbn: &str, pages: i32) -> DocumentElement<TantivyValue> {
        let mut document = self.manager.new_document();
        document.add(&self.schema.title, title.to_string()).unwrap();
        document.add(&self.schema.isbn, isbn.to_string()).unwrap();
        document.add(&self.schema.pages, pages).unwrap();
        document
    }

    /// Add a book and wait for it to be applied.
    pub async fn add(&self, tenant_id: Option<&str>, id: &str, title: &str, isbn: &str) {
        let indexer = self.manager.create_indexer(tenant_id).unwrap();
        let handle = indexer
            .add(&EntityReference::new("Book", id), self.book(title, isbn, 100))
            .await
            .unwrap();
        assert_eq!(handle.wait().await, WorkOutcome::Applied);
    }
}
