//! Native values and field codecs for the Tantivy backend.
//!
//! Tantivy stores strings, 64-bit integers, floats, booleans and dates.
//! Integers widen to `i64`; instants and local dates both become
//! microsecond timestamps, distinguished by their codec signature; instants
//! finer than a microsecond are rejected rather than truncated. Geo points
//! are not supported.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use quarry_index::codec::{CodecSignature, ConversionError, ConversionResult};
use quarry_index::{CodecRegistry, FieldCodec, FieldType, FieldValue};
use serde::{Deserialize, Serialize};

/// Backend name used in codec registries and error messages.
pub const BACKEND_NAME: &str = "tantivy";

/// A value as Tantivy stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v", rename_all = "snake_case")]
pub enum TantivyValue {
    /// Keyword or text.
    Str(String),
    /// Integer or long.
    I64(i64),
    /// Double.
    F64(f64),
    /// Boolean.
    Bool(bool),
    /// Microseconds since the Unix epoch.
    Date(i64),
}

impl TantivyValue {
    fn kind(&self) -> &'static str {
        match self {
            TantivyValue::Str(_) => "str",
            TantivyValue::I64(_) => "i64",
            TantivyValue::F64(_) => "f64",
            TantivyValue::Bool(_) => "bool",
            TantivyValue::Date(_) => "date",
        }
    }
}

fn unexpected(expected: &str, native: &TantivyValue) -> ConversionError {
    ConversionError::unexpected_native(expected, native.kind())
}

/// Codec for one logical field type.
#[derive(Debug, Clone, Copy)]
pub struct TantivyCodec {
    field_type: FieldType,
}

impl TantivyCodec {
    /// Codec for `field_type`; `None` for unsupported types.
    pub fn for_type(field_type: FieldType) -> Option<Self> {
        match field_type {
            FieldType::GeoPoint => None,
            _ => Some(Self { field_type }),
        }
    }
}

impl FieldCodec<TantivyValue> for TantivyCodec {
    fn field_type(&self) -> FieldType {
        self.field_type
    }

    fn signature(&self) -> CodecSignature {
        let signature = CodecSignature::new("tantivy", self.field_type);
        match self.field_type {
            FieldType::Text => signature.with_param("analyzer", "en_stem"),
            FieldType::Instant | FieldType::LocalDate => signature.with_param("resolution", "micros"),
            _ => signature,
        }
    }

    fn encode(&self, value: &FieldValue) -> ConversionResult<TantivyValue> {
        if !value.fits(self.field_type) {
            return Err(ConversionError::type_mismatch(self.field_type.as_str(), value));
        }
        Ok(match value {
            FieldValue::Text(text) => TantivyValue::Str(text.clone()),
            FieldValue::Integer(n) => TantivyValue::I64(i64::from(*n)),
            FieldValue::Long(n) => TantivyValue::I64(*n),
            FieldValue::Double(n) => TantivyValue::F64(*n),
            FieldValue::Boolean(b) => TantivyValue::Bool(*b),
            FieldValue::Instant(instant) => {
                if instant.timestamp_subsec_nanos() % 1_000 != 0 {
                    return Err(ConversionError::new(format!(
                        "instant {instant} is finer than the microsecond resolution of tantivy dates"
                    )));
                }
                TantivyValue::Date(instant.timestamp_micros())
            }
            FieldValue::LocalDate(date) => TantivyValue::Date(local_date_micros(*date)),
            FieldValue::GeoPoint(_) => {
                return Err(ConversionError::new("geo points are not supported by tantivy"));
            }
        })
    }

    fn decode(&self, native: &TantivyValue) -> ConversionResult<FieldValue> {
        match (self.field_type, native) {
            (FieldType::Keyword | FieldType::Text, TantivyValue::Str(text)) => {
                Ok(FieldValue::Text(text.clone()))
            }
            (FieldType::Integer, TantivyValue::I64(n)) => i32::try_from(*n)
                .map(FieldValue::Integer)
                .map_err(|_| ConversionError::new(format!("{n} does not fit an integer field"))),
            (FieldType::Long, TantivyValue::I64(n)) => Ok(FieldValue::Long(*n)),
            (FieldType::Double, TantivyValue::F64(n)) => Ok(FieldValue::Double(*n)),
            (FieldType::Boolean, TantivyValue::Bool(b)) => Ok(FieldValue::Boolean(*b)),
            (FieldType::Instant, TantivyValue::Date(micros)) => {
                Ok(FieldValue::Instant(from_micros(*micros)?))
            }
            (FieldType::LocalDate, TantivyValue::Date(micros)) => {
                Ok(FieldValue::LocalDate(from_micros(*micros)?.date_naive()))
            }
            (field_type, other) => Err(unexpected(field_type.as_str(), other)),
        }
    }
}

fn from_micros(micros: i64) -> ConversionResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_micros(micros)
        .ok_or_else(|| ConversionError::new(format!("timestamp {micros} is out of range")))
}

/// Local date at midnight UTC, as stored.
pub fn local_date_micros(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp_micros()
}

/// Codecs for every field type Tantivy supports.
pub fn tantivy_codecs() -> CodecRegistry<TantivyValue> {
    [
        FieldType::Keyword,
        FieldType::Text,
        FieldType::Integer,
        FieldType::Long,
        FieldType::Double,
        FieldType::Boolean,
        FieldType::Instant,
        FieldType::LocalDate,
        FieldType::GeoPoint,
    ]
    .into_iter()
    .filter_map(TantivyCodec::for_type)
    .fold(CodecRegistry::new(BACKEND_NAME), |registry, codec| {
        registry.with(Arc::new(codec))
    })
}

// ============================================================================
// Tests
// ============================================================================
