//! Schema tree, field references and the built index model.
//!
//! A schema is declared once per index through [`IndexSchemaBuilder`], which
//! hands out bound [`FieldReference`]s and [`ObjectFieldReference`]s, and is
//! frozen into an [`IndexModel`] by [`IndexSchemaBuilder::build`].

pub mod builder;
pub mod model;
pub mod reference;
pub mod tree;

pub use builder::IndexSchemaBuilder;
pub use model::{IndexModel, ValueFieldMapping};
pub use reference::{FieldDefinition, FieldReference, ObjectFieldReference};
pub use tree::{NodeId, NodeKind, ObjectStructure, SchemaNode, SchemaTree, TreeId, ValueOptions};
