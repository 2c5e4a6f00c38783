//! Quarry Index — backend-agnostic indexing core.
//!
//! Turns application entities into search-engine documents and applies
//! index mutations in a well-defined order, independent of the engine that
//! stores them. Engines plug in through the [`backend::Backend`] trait.
//!
//! # Modules
//!
//! - [`codec`]: Normalized field values, per-backend codecs, converters
//! - [`schema`]: Schema tree builder and the immutable index model
//! - [`document`]: Document accumulators and finalized stored documents
//! - [`settings`]: TOML index settings
//! - [`sharding`]: Sharding strategies and shard routing
//! - [`tenancy`]: Tenant checks and tenant-qualified ids
//! - [`io`]: Commit/refresh policies
//! - [`work`]: Work items
//! - [`orchestration`]: Serial, parallel and sync orchestrators
//! - [`backend`]: Engine boundary
//! - [`manager`]: Open indexes and their indexer, plan, workspace and search facades

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod backend;
pub mod codec;
pub mod document;
pub mod io;
pub mod manager;
pub mod orchestration;
pub mod schema;
pub mod settings;
pub mod sharding;
pub mod tenancy;
pub mod work;


// Re-export key types at crate root for convenience
pub use backend::{Backend, SearchHit, ShardReader, ShardWriter};
pub use codec::{CodecRegistry, FieldCodec, FieldType, FieldValue, GeoPoint};
pub use document::{DocumentElement, StoredField, StoredObject};
pub use manager::{
    IndexIndexer, IndexManager, IndexManagerOptions, IndexWorkspace, IndexingPlan,
    IndexingPlanReport, SearchScope,
};
pub use orchestration::{FailureContext, FailureHandler, WorkHandle, WorkOutcome};
pub use schema::{FieldDefinition, IndexModel, IndexSchemaBuilder, ObjectStructure};
pub use settings::IndexSettings;
pub use sharding::{ShardId, ShardingStrategy, ShardingStrategyName};
pub use tenancy::MultiTenancyStrategy;
pub use work::{
    DocumentCommitStrategy, DocumentRefreshStrategy, EntityReference, IndexingWork, SearchQuery,
    TermQuery, Visibility, WorkTarget,
};

pub use quarry_core::{Error, Result};
