//! Value converters and the per-field conversion pipeline.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use quarry_core::{Error, Result};

use super::{ConversionError, ConversionResult, FieldCodec, FieldValue, GeoPoint};

/// Bidirectional mapping between an application type `F` and [`FieldValue`].
pub trait ValueConverter<F>: Send + Sync {
    /// Convert an application value to its normalized form.
    fn to_index(&self, value: &F) -> ConversionResult<FieldValue>;

    /// Convert a normalized value back to the application type.
    fn from_index(&self, value: FieldValue) -> ConversionResult<F>;

    /// Converter identity, compared when checking cross-index compatibility.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

// ============================================================================
// DefaultConverter
// ============================================================================

/// Built-in converter for types with a direct [`FieldValue`] counterpart.
pub struct DefaultConverter<T>(PhantomData<fn() -> T>);

impl<T> DefaultConverter<T> {
    /// Create the converter.
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for DefaultConverter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for DefaultConverter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DefaultConverter<{}>", std::any::type_name::<T>())
    }
}

macro_rules! default_converter {
    ($ty:ty, $expect:ident) => {
        impl ValueConverter<$ty> for DefaultConverter<$ty> {
            fn to_index(&self, value: &$ty) -> ConversionResult<FieldValue> {
                Ok(FieldValue::from(value.clone()))
            }

            fn from_index(&self, value: FieldValue) -> ConversionResult<$ty> {
                value.$expect().map(Into::into)
            }
        }
    };
}

default_converter!(String, expect_text);
default_converter!(i32, expect_integer);
default_converter!(i64, expect_long);
default_converter!(f64, expect_double);
default_converter!(bool, expect_boolean);
default_converter!(DateTime<Utc>, expect_instant);
default_converter!(NaiveDate, expect_local_date);
default_converter!(GeoPoint, expect_geo_point);

// ============================================================================
// FnConverter / RawConverter
// ============================================================================

type ToIndexFn<F> = dyn Fn(&F) -> ConversionResult<FieldValue> + Send + Sync;
type FromIndexFn<F> = dyn Fn(FieldValue) -> ConversionResult<F> + Send + Sync;

/// Converter built from a pair of closures.
pub struct FnConverter<F> {
    name: String,
    to_index: Box<ToIndexFn<F>>,
    from_index: Box<FromIndexFn<F>>,
}

impl<F> FnConverter<F> {
    /// Create a named converter from two closures.
    pub fn new<T, R>(name: impl Into<String>, to_index: T, from_index: R) -> Self
    where
        T: Fn(&F) -> ConversionResult<FieldValue> + Send + Sync + 'static,
        R: Fn(FieldValue) -> ConversionResult<F> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            to_index: Box::new(to_index),
            from_index: Box::new(from_index),
        }
    }
}

impl<F> fmt::Debug for FnConverter<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnConverter").field("name", &self.name).finish()
    }
}

impl<F> ValueConverter<F> for FnConverter<F> {
    fn to_index(&self, value: &F) -> ConversionResult<FieldValue> {
        (self.to_index)(value)
    }

    fn from_index(&self, value: FieldValue) -> ConversionResult<F> {
        (self.from_index)(value)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Identity converter: hands normalized values straight to the codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawConverter;

impl ValueConverter<FieldValue> for RawConverter {
    fn to_index(&self, value: &FieldValue) -> ConversionResult<FieldValue> {
        Ok(value.clone())
    }

    fn from_index(&self, value: FieldValue) -> ConversionResult<FieldValue> {
        Ok(value)
    }
}

// ============================================================================
// FieldConverter
// ============================================================================

/// Converter and codec bound to one absolute field path.
///
/// Every failure, in regular or raw mode, is reported as
/// [`Error::Conversion`] with the field path.
pub struct FieldConverter<F, N> {
    path: String,
    converter: Arc<dyn ValueConverter<F>>,
    codec: Arc<dyn FieldCodec<N>>,
}

impl<F, N> Clone for FieldConverter<F, N> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            converter: Arc::clone(&self.converter),
            codec: Arc::clone(&self.codec),
        }
    }
}

impl<F, N> fmt::Debug for FieldConverter<F, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldConverter")
            .field("path", &self.path)
            .field("converter", &self.converter.name())
            .field("codec", &self.codec.signature())
            .finish()
    }
}

impl<F, N> FieldConverter<F, N> {
    /// Bind a converter and codec to a field path.
    pub fn new(
        path: impl Into<String>,
        converter: Arc<dyn ValueConverter<F>>,
        codec: Arc<dyn FieldCodec<N>>,
    ) -> Self {
        Self {
            path: path.into(),
            converter,
            codec,
        }
    }

    /// Absolute path of the field.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The codec used for this field.
    pub fn codec(&self) -> &Arc<dyn FieldCodec<N>> {
        &self.codec
    }

    /// Name of the application-level converter.
    pub fn converter_name(&self) -> &str {
        self.converter.name()
    }

    /// Application value → native value.
    pub fn encode(&self, value: &F) -> Result<N> {
        let domain = self.converter.to_index(value).map_err(|e| self.wrap(e))?;
        self.encode_raw(&domain)
    }

    /// Normalized value → native value, bypassing the converter.
    pub fn encode_raw(&self, value: &FieldValue) -> Result<N> {
        let field_type = self.codec.field_type();
        if !value.fits(field_type) {
            return Err(self.wrap(ConversionError::new(format!(
                "{} value does not fit a {field_type} field",
                value.kind()
            ))));
        }
        self.codec.encode(value).map_err(|e| self.wrap(e))
    }

    /// Native value → application value.
    pub fn decode(&self, native: &N) -> Result<F> {
        let domain = self.decode_raw(native)?;
        self.converter.from_index(domain).map_err(|e| self.wrap(e))
    }

    /// Native value → normalized value, bypassing the converter.
    pub fn decode_raw(&self, native: &N) -> Result<FieldValue> {
        self.codec.decode(native).map_err(|e| self.wrap(e))
    }

    /// Whether `other` converts values identically.
    ///
    /// Both the converters and the codecs must match.
    pub fn is_compatible_with<G>(&self, other: &FieldConverter<G, N>) -> bool {
        self.converter.name() == other.converter.name()
            && self.codec.is_compatible_with(other.codec.as_ref())
    }

    fn wrap(&self, error: ConversionError) -> Error {
        Error::conversion(&self.path, error.message())
    }
}

// ============================================================================
// Tests
// ============================================================================
