//! Schema builder: declares fields and binds references.

use std::collections::BTreeMap;
use std::sync::Arc;

use quarry_core::{Error, Result};

use crate::codec::{CodecRegistry, FieldConverter};

use super::model::{IndexModel, ValueFieldMapping};
use super::reference::{FieldDefinition, FieldReference, ObjectFieldReference};
use super::tree::{NodeId, NodeKind, ObjectStructure, SchemaTree};

/// Builds the schema of one index against a backend's codecs.
///
/// References returned by the `add_*` methods are bound immediately; they
/// stay valid for documents created from the resulting [`IndexModel`].
pub struct IndexSchemaBuilder<N> {
    index_name: String,
    tree: SchemaTree,
    codecs: CodecRegistry<N>,
    fields: BTreeMap<String, ValueFieldMapping<N>>,
}

impl<N> IndexSchemaBuilder<N> {
    /// Start a schema for `index_name`.
    pub fn new(index_name: impl Into<String>, codecs: &CodecRegistry<N>) -> Self {
        Self {
            index_name: index_name.into(),
            tree: SchemaTree::new(),
            codecs: codecs.clone(),
            fields: BTreeMap::new(),
        }
    }

    /// The root node, parent of top-level fields.
    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    /// Declare a value field under `parent`.
    pub fn add_field<F>(
        &mut self,
        parent: NodeId,
        name: &str,
        definition: FieldDefinition<F>,
    ) -> Result<FieldReference<F, N>> {
        let codec = self.codecs.codec(definition.field_type)?;
        let node = self.tree.add_node(
            parent,
            name,
            definition.multi_valued,
            NodeKind::Value {
                field_type: definition.field_type,
                options: definition.options,
            },
        )?;
        let path = self.tree.node(node).path().to_string();

        self.fields.insert(
            path.clone(),
            ValueFieldMapping {
                node,
                field_type: definition.field_type,
                codec: Arc::clone(&codec),
                converter_name: definition.converter.name().to_string(),
                multi_valued: definition.multi_valued,
                options: definition.options,
            },
        );

        Ok(FieldReference {
            tree: self.tree.id(),
            node,
            parent,
            name: name.to_string(),
            multi_valued: definition.multi_valued,
            converter: FieldConverter::new(path, definition.converter, codec),
        })
    }

    /// Declare an object field under `parent`.
    pub fn add_object_field(
        &mut self,
        parent: NodeId,
        name: &str,
        structure: ObjectStructure,
        multi_valued: bool,
    ) -> Result<ObjectFieldReference> {
        let node = self
            .tree
            .add_node(parent, name, multi_valued, NodeKind::Object { structure })?;
        Ok(ObjectFieldReference {
            tree: self.tree.id(),
            node,
            parent,
            name: name.to_string(),
            path: self.tree.node(node).path().to_string(),
            multi_valued,
            structure,
        })
    }

    /// Finish the schema.
    pub fn build(self) -> Result<Arc<IndexModel<N>>> {
        if self.index_name.is_empty() {
            return Err(Error::schema("Index name must not be empty"));
        }
        tracing::debug!(
            index = %self.index_name,
            fields = self.fields.len(),
            "index schema built"
        );
        Ok(Arc::new(IndexModel::new(
            self.index_name,
            self.tree,
            self.fields,
        )))
    }
}

// ============================================================================
// Tests
// ============================================================================
