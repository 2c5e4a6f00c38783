//! Finalized, backend-neutral document trees.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Content of one field in a finalized document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoredField<N> {
    /// Encoded values of a value field, in insertion order.
    Values(Vec<N>),
    /// Child objects of an object field, in insertion order.
    ///
    /// `None` marks an explicitly missing object.
    Objects(Vec<Option<StoredObject<N>>>),
}

impl<N> StoredField<N> {
    /// Number of values or objects.
    pub fn len(&self) -> usize {
        match self {
            StoredField::Values(values) => values.len(),
            StoredField::Objects(objects) => objects.len(),
        }
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An immutable document (or sub-document) keyed by relative field name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "N: Serialize",
    deserialize = "N: Deserialize<'de>"
))]
pub struct StoredObject<N> {
    fields: BTreeMap<String, StoredField<N>>,
}

impl<N> Default for StoredObject<N> {
    fn default() -> Self {
        Self {
            fields: BTreeMap::new(),
        }
    }
}

impl<N> StoredObject<N> {
    /// An object without fields.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_fields(fields: BTreeMap<String, StoredField<N>>) -> Self {
        Self { fields }
    }

    /// Insert or replace a field.
    pub fn insert(&mut self, name: impl Into<String>, field: StoredField<N>) {
        self.fields.insert(name.into(), field);
    }

    /// Field content by relative name.
    pub fn get(&self, name: &str) -> Option<&StoredField<N>> {
        self.fields.get(name)
    }

    /// Values of a value field, empty if absent.
    pub fn values(&self, name: &str) -> &[N] {
        match self.fields.get(name) {
            Some(StoredField::Values(values)) => values,
            _ => &[],
        }
    }

    /// First value of a value field.
    pub fn first(&self, name: &str) -> Option<&N> {
        self.values(name).first()
    }

    /// Child objects of an object field, empty if absent.
    pub fn objects(&self, name: &str) -> &[Option<StoredObject<N>>] {
        match self.fields.get(name) {
            Some(StoredField::Objects(objects)) => objects,
            _ => &[],
        }
    }

    /// Iterate fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &StoredField<N>)> {
        self.fields.iter().map(|(name, field)| (name.as_str(), field))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no field was recorded.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Look up the values at an absolute dotted path, across all objects.
    pub fn values_at(&self, path: &str) -> Vec<&N> {
        let mut out = Vec::new();
        collect_values(self, path, &mut out);
        out
    }
}

fn collect_values<'a, N>(object: &'a StoredObject<N>, path: &str, out: &mut Vec<&'a N>) {
    match path.split_once('.') {
        None => out.extend(object.values(path)),
        Some((head, rest)) => {
            for child in object.objects(head).iter().flatten() {
                collect_values(child, rest, out);
            }
        }
    }
}
