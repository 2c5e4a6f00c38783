//! Built index model: schema tree plus per-field codecs.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use quarry_core::{Error, Result};

use crate::codec::{FieldCodec, FieldType, FieldValue};
use crate::document::{StoredField, StoredObject};

use super::tree::{NodeId, SchemaTree, ValueOptions, join_path};

/// Mapping of one value field, as recorded at schema build time.
pub struct ValueFieldMapping<N> {
    pub(crate) node: NodeId,
    pub(crate) field_type: FieldType,
    pub(crate) codec: Arc<dyn FieldCodec<N>>,
    pub(crate) converter_name: String,
    pub(crate) multi_valued: bool,
    pub(crate) options: ValueOptions,
}

impl<N> ValueFieldMapping<N> {
    /// Bound node.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Logical type.
    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Codec for the field.
    pub fn codec(&self) -> &Arc<dyn FieldCodec<N>> {
        &self.codec
    }

    /// Name of the application-level converter.
    pub fn converter_name(&self) -> &str {
        &self.converter_name
    }

    /// Whether the field accepts several values.
    pub fn is_multi_valued(&self) -> bool {
        self.multi_valued
    }

    /// Indexing options.
    pub fn options(&self) -> ValueOptions {
        self.options
    }
}

impl<N> fmt::Debug for ValueFieldMapping<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueFieldMapping")
            .field("field_type", &self.field_type)
            .field("codec", &self.codec.signature())
            .field("converter", &self.converter_name)
            .field("multi_valued", &self.multi_valued)
            .finish()
    }
}

/// Immutable description of one index: its name, schema tree and codecs.
pub struct IndexModel<N> {
    name: String,
    tree: Arc<SchemaTree>,
    fields: BTreeMap<String, ValueFieldMapping<N>>,
}

impl<N> IndexModel<N> {
    pub(crate) fn new(
        name: String,
        tree: SchemaTree,
        fields: BTreeMap<String, ValueFieldMapping<N>>,
    ) -> Self {
        Self {
            name,
            tree: Arc::new(tree),
            fields,
        }
    }

    /// Index name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schema tree.
    pub fn tree(&self) -> &Arc<SchemaTree> {
        &self.tree
    }

    /// Mapping of the value field at an absolute path.
    pub fn field(&self, path: &str) -> Option<&ValueFieldMapping<N>> {
        self.fields.get(path)
    }

    /// All value fields by absolute path.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &ValueFieldMapping<N>)> {
        self.fields.iter().map(|(path, field)| (path.as_str(), field))
    }

    /// Encode a normalized value for the field at `path`, e.g. a query term.
    pub fn encode_value(&self, path: &str, value: &FieldValue) -> Result<N> {
        let field = self
            .field(path)
            .ok_or_else(|| Error::not_found(path, "Field"))?;
        if !value.fits(field.field_type) {
            return Err(Error::conversion(
                path,
                format!(
                    "{} value does not fit a {} field",
                    value.kind(),
                    field.field_type
                ),
            ));
        }
        field
            .codec
            .encode(value)
            .map_err(|e| Error::conversion(path, e.message()))
    }

    /// Decode a native value of the field at `path`.
    pub fn decode_value(&self, path: &str, native: &N) -> Result<FieldValue> {
        let field = self
            .field(path)
            .ok_or_else(|| Error::not_found(path, "Field"))?;
        field
            .codec
            .decode(native)
            .map_err(|e| Error::conversion(path, e.message()))
    }

    /// Check that fields shared with `other` are mapped identically.
    ///
    /// Used when a search scope spans several indexes: a path present in
    /// both must have the same type, cardinality, converter and a compatible
    /// codec. The relation is symmetric.
    pub fn check_compatibility(&self, other: &IndexModel<N>) -> Result<()> {
        let mut conflicts = Vec::new();
        for (path, mine) in &self.fields {
            let Some(theirs) = other.fields.get(path) else {
                continue;
            };
            if mine.field_type != theirs.field_type {
                conflicts.push(format!(
                    "'{path}': {} vs {}",
                    mine.field_type, theirs.field_type
                ));
            } else if mine.multi_valued != theirs.multi_valued {
                conflicts.push(format!("'{path}': multi-valued mismatch"));
            } else if mine.converter_name != theirs.converter_name {
                conflicts.push(format!(
                    "'{path}': converter {} vs {}",
                    mine.converter_name, theirs.converter_name
                ));
            } else if !mine.codec.is_compatible_with(theirs.codec.as_ref()) {
                conflicts.push(format!(
                    "'{path}': codec {} vs {}",
                    mine.codec.signature(),
                    theirs.codec.signature()
                ));
            }
        }

        if conflicts.is_empty() {
            Ok(())
        } else {
            Err(Error::schema(format!(
                "Indexes '{}' and '{}' map shared fields inconsistently: {}",
                self.name,
                other.name,
                conflicts.join("; ")
            )))
        }
    }

    /// Decode a finalized document back into normalized values.
    ///
    /// Non-projectable fields are skipped; explicit missing objects stay
    /// missing.
    pub fn project(&self, stored: &StoredObject<N>) -> Result<StoredObject<FieldValue>> {
        self.project_object("", stored)
    }

    fn project_object(
        &self,
        prefix: &str,
        stored: &StoredObject<N>,
    ) -> Result<StoredObject<FieldValue>> {
        let mut projected = BTreeMap::new();
        for (name, field) in stored.iter() {
            let path = join_path(prefix, name);
            match field {
                StoredField::Values(values) => {
                    let mapping = self.field(&path).ok_or_else(|| {
                        Error::schema(format!(
                            "Stored document has unknown field '{path}' for index '{}'",
                            self.name
                        ))
                    })?;
                    if !mapping.options.projectable {
                        continue;
                    }
                    let decoded = values
                        .iter()
                        .map(|native| {
                            mapping
                                .codec
                                .decode(native)
                                .map_err(|e| Error::conversion(&path, e.message()))
                        })
                        .collect::<Result<Vec<_>>>()?;
                    projected.insert(name.to_string(), StoredField::Values(decoded));
                }
                StoredField::Objects(objects) => {
                    let children = objects
                        .iter()
                        .map(|child| {
                            child
                                .as_ref()
                                .map(|object| self.project_object(&path, object))
                                .transpose()
                        })
                        .collect::<Result<Vec<_>>>()?;
                    projected.insert(name.to_string(), StoredField::Objects(children));
                }
            }
        }
        Ok(StoredObject::from_fields(projected))
    }
}

impl<N> fmt::Debug for IndexModel<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexModel")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .finish()
    }
}
