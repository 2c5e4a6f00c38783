//! Document accumulator scoped to one schema node.

use std::collections::BTreeMap;
use std::sync::Arc;

use quarry_core::{Error, Result};

use crate::codec::FieldValue;
use crate::schema::{FieldReference, IndexModel, NodeId, ObjectFieldReference, SchemaTree, TreeId};

use super::stored::{StoredField, StoredObject};

enum Slot<N> {
    Values(Vec<N>),
    Objects(Vec<Option<DocumentElement<N>>>),
}

impl<N> Slot<N> {
    fn len(&self) -> usize {
        match self {
            Slot::Values(values) => values.len(),
            Slot::Objects(objects) => objects.len(),
        }
    }
}

/// Mutable accumulator for one entity instance (or one child object).
///
/// Values are encoded as they are added; [`finish`](Self::finish) turns the
/// whole tree into a [`StoredObject`] in a single pass.
pub struct DocumentElement<N> {
    tree: Arc<SchemaTree>,
    node: NodeId,
    entries: BTreeMap<String, Slot<N>>,
}

impl<N> DocumentElement<N> {
    /// Root accumulator for a document of `model`.
    pub fn new(model: &IndexModel<N>) -> Self {
        let tree = Arc::clone(model.tree());
        let node = tree.root();
        Self::scoped(tree, node)
    }

    fn scoped(tree: Arc<SchemaTree>, node: NodeId) -> Self {
        Self {
            tree,
            node,
            entries: BTreeMap::new(),
        }
    }

    /// Schema tree this document is built against.
    pub fn tree_id(&self) -> TreeId {
        self.tree.id()
    }

    /// Schema node this accumulator is scoped to.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Absolute path of the scope; empty at the root.
    pub fn path(&self) -> &str {
        self.tree.node(self.node).path()
    }

    /// Convert and append a value.
    pub fn add<F>(&mut self, field: &FieldReference<F, N>, value: F) -> Result<()> {
        self.check_binding(field.tree, field.parent, field.path())?;
        let encoded = field.converter.encode(&value)?;
        self.push_value(field, encoded)
    }

    /// Append a normalized value, bypassing the field's converter.
    pub fn add_raw<F>(&mut self, field: &FieldReference<F, N>, value: &FieldValue) -> Result<()> {
        self.check_binding(field.tree, field.parent, field.path())?;
        let encoded = field.converter.encode_raw(value)?;
        self.push_value(field, encoded)
    }

    /// Start a new child object and return its accumulator.
    ///
    /// For a multi-valued object field, each call creates another object.
    pub fn add_object(&mut self, field: &ObjectFieldReference) -> Result<&mut DocumentElement<N>> {
        self.check_binding(field.tree, field.parent, field.path())?;
        let child = DocumentElement::scoped(Arc::clone(&self.tree), field.node);
        let objects = self.object_slot(field)?;
        objects.push(Some(child));
        objects
            .last_mut()
            .and_then(Option::as_mut)
            .ok_or_else(|| Error::assertion(format!("Object '{}' was not recorded", field.path())))
    }

    /// Record an explicitly missing object.
    ///
    /// Unlike never touching the field, this survives into the stored document.
    pub fn add_missing_object(&mut self, field: &ObjectFieldReference) -> Result<()> {
        self.check_binding(field.tree, field.parent, field.path())?;
        self.object_slot(field)?.push(None);
        Ok(())
    }

    /// Finalize into an immutable document tree.
    pub fn finish(self) -> StoredObject<N> {
        let fields = self
            .entries
            .into_iter()
            .map(|(name, slot)| {
                let field = match slot {
                    Slot::Values(values) => StoredField::Values(values),
                    Slot::Objects(objects) => StoredField::Objects(
                        objects
                            .into_iter()
                            .map(|child| child.map(DocumentElement::finish))
                            .collect(),
                    ),
                };
                (name, field)
            })
            .collect();
        StoredObject::from_fields(fields)
    }

    fn check_binding(&self, tree: TreeId, parent: NodeId, path: &str) -> Result<()> {
        if tree != self.tree.id() {
            return Err(Error::assertion(format!(
                "Field '{path}' belongs to a different schema than this document"
            )));
        }
        if parent != self.node {
            return Err(Error::assertion(format!(
                "Field '{path}' is not a direct child of '{}'",
                display_path(self.path())
            )));
        }
        Ok(())
    }

    fn push_value<F>(&mut self, field: &FieldReference<F, N>, encoded: N) -> Result<()> {
        let slot = self
            .entries
            .entry(field.name().to_string())
            .or_insert_with(|| Slot::Values(Vec::new()));
        if !field.is_multi_valued() && slot.len() > 0 {
            return Err(Error::schema(format!(
                "Field '{}' is single-valued but received several values",
                field.path()
            )));
        }
        match slot {
            Slot::Values(values) => {
                values.push(encoded);
                Ok(())
            }
            Slot::Objects(_) => Err(Error::assertion(format!(
                "Field '{}' is recorded as an object field",
                field.path()
            ))),
        }
    }

    fn object_slot(
        &mut self,
        field: &ObjectFieldReference,
    ) -> Result<&mut Vec<Option<DocumentElement<N>>>> {
        let slot = self
            .entries
            .entry(field.name().to_string())
            .or_insert_with(|| Slot::Objects(Vec::new()));
        if !field.is_multi_valued() && slot.len() > 0 {
            return Err(Error::schema(format!(
                "Object field '{}' is single-valued but received several objects",
                field.path()
            )));
        }
        match slot {
            Slot::Objects(objects) => Ok(objects),
            Slot::Values(_) => Err(Error::assertion(format!(
                "Field '{}' is recorded as a value field",
                field.path()
            ))),
        }
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() { "<root>" } else { path }
}

// ============================================================================
// Tests
// ============================================================================
