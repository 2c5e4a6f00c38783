//! Field definitions and the references bound to schema nodes.

use std::fmt;
use std::sync::Arc;

use crate::codec::{
    DefaultConverter, FieldConverter, FieldType, FieldValue, RawConverter, ValueConverter,
};

use super::tree::{NodeId, ObjectStructure, TreeId, ValueOptions};

/// Declaration of a value field, before it is added to a schema.
pub struct FieldDefinition<F> {
    pub(crate) field_type: FieldType,
    pub(crate) converter: Arc<dyn ValueConverter<F>>,
    pub(crate) multi_valued: bool,
    pub(crate) options: ValueOptions,
}

impl<F> FieldDefinition<F> {
    /// Declare a field with a custom converter.
    pub fn with_converter(field_type: FieldType, converter: Arc<dyn ValueConverter<F>>) -> Self {
        Self {
            field_type,
            converter,
            multi_valued: false,
            options: ValueOptions::default(),
        }
    }

    /// Declare a field using the built-in converter for `F`.
    pub fn new(field_type: FieldType) -> Self
    where
        DefaultConverter<F>: ValueConverter<F> + 'static,
    {
        Self::with_converter(field_type, Arc::new(DefaultConverter::<F>::new()))
    }

    /// Accept any number of values.
    pub fn multi_valued(mut self) -> Self {
        self.multi_valued = true;
        self
    }

    /// Allow sorting on this field.
    pub fn sortable(mut self) -> Self {
        self.options.sortable = true;
        self
    }

    /// Set whether the field is indexed for search.
    pub fn searchable(mut self, searchable: bool) -> Self {
        self.options.searchable = searchable;
        self
    }

    /// Set whether the field can be projected from stored documents.
    pub fn projectable(mut self, projectable: bool) -> Self {
        self.options.projectable = projectable;
        self
    }
}

impl FieldDefinition<FieldValue> {
    /// Declare a field that takes normalized values directly.
    pub fn raw(field_type: FieldType) -> Self {
        Self::with_converter(field_type, Arc::new(RawConverter))
    }
}

impl<F> fmt::Debug for FieldDefinition<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDefinition")
            .field("field_type", &self.field_type)
            .field("converter", &self.converter.name())
            .field("multi_valued", &self.multi_valued)
            .field("options", &self.options)
            .finish()
    }
}

/// Handle to a value field, bound to one schema node.
///
/// Only obtainable from the schema builder, so it is always bound.
pub struct FieldReference<F, N> {
    pub(crate) tree: TreeId,
    pub(crate) node: NodeId,
    pub(crate) parent: NodeId,
    pub(crate) name: String,
    pub(crate) multi_valued: bool,
    pub(crate) converter: FieldConverter<F, N>,
}

impl<F, N> FieldReference<F, N> {
    /// Absolute path of the field.
    pub fn path(&self) -> &str {
        self.converter.path()
    }

    /// Name relative to the parent object.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The bound node.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Whether the field accepts several values.
    pub fn is_multi_valued(&self) -> bool {
        self.multi_valued
    }

    /// Conversion pipeline for this field.
    pub fn converter(&self) -> &FieldConverter<F, N> {
        &self.converter
    }
}

impl<F, N> Clone for FieldReference<F, N> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree,
            node: self.node,
            parent: self.parent,
            name: self.name.clone(),
            multi_valued: self.multi_valued,
            converter: self.converter.clone(),
        }
    }
}

impl<F, N> fmt::Debug for FieldReference<F, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldReference")
            .field("path", &self.path())
            .field("multi_valued", &self.multi_valued)
            .finish()
    }
}

/// Handle to an object field, bound to one schema node.
#[derive(Debug, Clone)]
pub struct ObjectFieldReference {
    pub(crate) tree: TreeId,
    pub(crate) node: NodeId,
    pub(crate) parent: NodeId,
    pub(crate) name: String,
    pub(crate) path: String,
    pub(crate) multi_valued: bool,
    pub(crate) structure: ObjectStructure,
}

impl ObjectFieldReference {
    /// Absolute path of the object field.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Name relative to the parent object.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The bound node, used as parent when declaring child fields.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Whether each `add_object` call creates another child object.
    pub fn is_multi_valued(&self) -> bool {
        self.multi_valued
    }

    /// Child layout.
    pub fn structure(&self) -> ObjectStructure {
        self.structure
    }
}
