//! Per-backend mapping from logical field type to codec.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use quarry_core::{Error, Result};

use super::{FieldCodec, FieldType};

/// Codecs a backend provides, keyed by logical field type.
pub struct CodecRegistry<N> {
    backend: String,
    codecs: BTreeMap<FieldType, Arc<dyn FieldCodec<N>>>,
}

impl<N> CodecRegistry<N> {
    /// Create an empty registry for the named backend.
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            codecs: BTreeMap::new(),
        }
    }

    /// Register a codec under its own field type, replacing any previous one.
    pub fn register(&mut self, codec: Arc<dyn FieldCodec<N>>) -> &mut Self {
        self.codecs.insert(codec.field_type(), codec);
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, codec: Arc<dyn FieldCodec<N>>) -> Self {
        self.register(codec);
        self
    }

    /// Look up the codec for a field type.
    ///
    /// Fails with a schema error if the backend does not support the type.
    pub fn codec(&self, field_type: FieldType) -> Result<Arc<dyn FieldCodec<N>>> {
        self.codecs.get(&field_type).cloned().ok_or_else(|| {
            Error::schema(format!(
                "Backend '{}' does not support {field_type} fields",
                self.backend
            ))
        })
    }

    /// Whether the backend supports a field type.
    pub fn supports(&self, field_type: FieldType) -> bool {
        self.codecs.contains_key(&field_type)
    }

    /// Field types with a registered codec.
    pub fn field_types(&self) -> impl Iterator<Item = FieldType> + '_ {
        self.codecs.keys().copied()
    }
}

impl<N> Clone for CodecRegistry<N> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            codecs: self.codecs.clone(),
        }
    }
}

impl<N> fmt::Debug for CodecRegistry<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("backend", &self.backend)
            .field("field_types", &self.codecs.keys().collect::<Vec<_>>())
            .finish()
    }
}
