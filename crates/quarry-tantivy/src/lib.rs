//! Embedded Tantivy backend for Quarry.
//!
//! Every shard of an index is a separate Tantivy index, created in a
//! directory or in RAM. The index model is mapped onto a Tantivy schema
//! with one field per searchable value path; the finalized document is
//! stored as JSON and is what reads return.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                quarry-tantivy                │
//! ├──────────────────────────────────────────────┤
//! │  TantivyBackend (Backend)                    │
//! │  ├── TantivyShardWriter (IndexWriter)        │
//! │  └── TantivyShardReader (IndexReader)        │
//! ├──────────────────────────────────────────────┤
//! │  TantivyCodec / TantivyValue                 │
//! │  TantivyIndexSchema (en_stem text analysis)  │
//! │  query translation                           │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use quarry_index::{IndexManager, IndexManagerOptions, IndexSettings};
//! use quarry_tantivy::TantivyBackend;
//!
//! let backend = Arc::new(TantivyBackend::in_dir("/var/lib/quarry"));
//! let manager = IndexManager::open(backend, model, IndexSettings::default(),
//!     IndexManagerOptions::default()).await?;
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod backend;
pub mod codec;
pub mod document;
pub mod error;
pub mod query;
pub mod reader;
pub mod schema;
pub mod writer;

pub use backend::{DEFAULT_MEMORY_BUDGET, TantivyBackend};
pub use codec::{TantivyCodec, TantivyValue, tantivy_codecs};
pub use reader::TantivyShardReader;
pub use schema::TantivyIndexSchema;
pub use writer::TantivyShardWriter;
