//! Field codecs and value converters.
//!
//! Conversion from an application value to a backend-native value happens in
//! two stages:
//!
//! ```text
//! F ──ValueConverter──▶ FieldValue ──FieldCodec──▶ N
//! ```
//!
//! [`ValueConverter`] is user-supplied (or one of the defaults), [`FieldCodec`]
//! is provided by the backend for each [`FieldType`]. [`FieldConverter`]
//! composes both for a single field path and turns codec-level
//! [`ConversionError`]s into [`quarry_core::Error::Conversion`] carrying the
//! absolute field path.

pub mod converter;
pub mod registry;
pub mod value;

use std::fmt;

pub use converter::{DefaultConverter, FieldConverter, FnConverter, RawConverter, ValueConverter};
pub use registry::CodecRegistry;
pub use value::{FieldType, FieldValue, GeoPoint};

/// Result type for codec-level conversions.
pub type ConversionResult<T> = std::result::Result<T, ConversionError>;

/// A value could not be encoded or decoded.
///
/// Carries no field path; the converter layer adds it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ConversionError {
    message: String,
}

impl ConversionError {
    /// Create a conversion error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Value had the wrong variant for the expected type.
    pub fn type_mismatch(expected: &str, actual: &FieldValue) -> Self {
        Self::new(format!("expected {expected} value, got {}", actual.kind()))
    }

    /// Native value had an unexpected shape.
    pub fn unexpected_native(expected: &str, actual: impl fmt::Debug) -> Self {
        Self::new(format!("expected native {expected}, got {actual:?}"))
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Identity of a codec's encoding behavior.
///
/// Two codecs with equal signatures encode and decode every value identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CodecSignature {
    /// Codec implementation name, e.g. `"tantivy.date"`.
    pub codec: &'static str,
    /// Logical type handled by the codec.
    pub field_type: FieldType,
    /// Format parameters that change the encoding (precision, date format...).
    pub params: Vec<(String, String)>,
}

impl CodecSignature {
    /// Signature without format parameters.
    pub fn new(codec: &'static str, field_type: FieldType) -> Self {
        Self {
            codec,
            field_type,
            params: Vec::new(),
        }
    }

    /// Add a format parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for CodecSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<{}>", self.codec, self.field_type)?;
        for (key, value) in &self.params {
            write!(f, "[{key}={value}]")?;
        }
        Ok(())
    }
}

/// Backend-specific conversion between [`FieldValue`] and a native value `N`.
///
/// Codecs are stateless and shared across threads.
pub trait FieldCodec<N>: Send + Sync + fmt::Debug {
    /// Logical type this codec handles.
    fn field_type(&self) -> FieldType;

    /// Encoding identity used for compatibility checks.
    fn signature(&self) -> CodecSignature;

    /// Encode a domain value into the native representation.
    fn encode(&self, value: &FieldValue) -> ConversionResult<N>;

    /// Decode a native value back into a domain value.
    fn decode(&self, native: &N) -> ConversionResult<FieldValue>;

    /// Whether both codecs encode and decode every value identically.
    ///
    /// Must be symmetric. The default compares signatures.
    fn is_compatible_with(&self, other: &dyn FieldCodec<N>) -> bool {
        self.signature() == other.signature()
    }
}

// ============================================================================
// Tests
// ============================================================================
