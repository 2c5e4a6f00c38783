//! JSON field codecs for the cluster backend.
//!
//! | Field type | JSON |
//! |------------|------|
//! | keyword, text | string |
//! | integer, long | integer number |
//! | double | number (finite only) |
//! | boolean | bool |
//! | instant | RFC 3339 string in UTC, e.g. `"2024-03-01T12:30:00Z"` |
//! | local date | `"YYYY-MM-DD"` |
//! | geo point | `{"lat": .., "lon": ..}` |

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use quarry_index::codec::{CodecSignature, ConversionError, ConversionResult};
use quarry_index::{CodecRegistry, FieldCodec, FieldType, FieldValue, GeoPoint};
use serde_json::{Number, Value, json};

/// Backend name used in codec registries and error messages.
pub const BACKEND_NAME: &str = "cluster";

const LOCAL_DATE_FORMAT: &str = "%Y-%m-%d";

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn unexpected(expected: &str, native: &Value) -> ConversionError {
    ConversionError::unexpected_native(expected, kind(native))
}

/// Codec for one logical field type.
#[derive(Debug, Clone, Copy)]
pub struct JsonCodec {
    field_type: FieldType,
}

impl JsonCodec {
    /// Codec for `field_type`.
    pub fn new(field_type: FieldType) -> Self {
        Self { field_type }
    }
}

impl FieldCodec<Value> for JsonCodec {
    fn field_type(&self) -> FieldType {
        self.field_type
    }

    fn signature(&self) -> CodecSignature {
        let signature = CodecSignature::new("json", self.field_type);
        match self.field_type {
            FieldType::Instant => signature.with_param("format", "rfc3339"),
            FieldType::LocalDate => signature.with_param("format", LOCAL_DATE_FORMAT),
            _ => signature,
        }
    }

    fn encode(&self, value: &FieldValue) -> ConversionResult<Value> {
        if !value.fits(self.field_type) {
            return Err(ConversionError::type_mismatch(self.field_type.as_str(), value));
        }
        Ok(match value {
            FieldValue::Text(text) => Value::String(text.clone()),
            FieldValue::Integer(n) => Value::from(*n),
            FieldValue::Long(n) => Value::from(*n),
            FieldValue::Double(n) => Number::from_f64(*n)
                .map(Value::Number)
                .ok_or_else(|| ConversionError::new(format!("{n} is not a finite number")))?,
            FieldValue::Boolean(b) => Value::Bool(*b),
            FieldValue::Instant(instant) => {
                Value::String(instant.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            FieldValue::LocalDate(date) => {
                Value::String(date.format(LOCAL_DATE_FORMAT).to_string())
            }
            FieldValue::GeoPoint(point) => json!({
                "lat": point.latitude,
                "lon": point.longitude,
            }),
        })
    }

    fn decode(&self, native: &Value) -> ConversionResult<FieldValue> {
        match self.field_type {
            FieldType::Keyword | FieldType::Text => native
                .as_str()
                .map(|text| FieldValue::Text(text.to_string()))
                .ok_or_else(|| unexpected("string", native)),
            FieldType::Integer => {
                let n = native.as_i64().ok_or_else(|| unexpected("integer", native))?;
                i32::try_from(n)
                    .map(FieldValue::Integer)
                    .map_err(|_| ConversionError::new(format!("{n} does not fit an integer field")))
            }
            FieldType::Long => native
                .as_i64()
                .map(FieldValue::Long)
                .ok_or_else(|| unexpected("integer", native)),
            FieldType::Double => native
                .as_f64()
                .map(FieldValue::Double)
                .ok_or_else(|| unexpected("number", native)),
            FieldType::Boolean => native
                .as_bool()
                .map(FieldValue::Boolean)
                .ok_or_else(|| unexpected("bool", native)),
            FieldType::Instant => {
                let text = native.as_str().ok_or_else(|| unexpected("string", native))?;
                DateTime::parse_from_rfc3339(text)
                    .map(|instant| FieldValue::Instant(instant.with_timezone(&Utc)))
                    .map_err(|e| ConversionError::new(format!("invalid instant '{text}': {e}")))
            }
            FieldType::LocalDate => {
                let text = native.as_str().ok_or_else(|| unexpected("string", native))?;
                NaiveDate::parse_from_str(text, LOCAL_DATE_FORMAT)
                    .map(FieldValue::LocalDate)
                    .map_err(|e| ConversionError::new(format!("invalid date '{text}': {e}")))
            }
            FieldType::GeoPoint => {
                let coordinate = |name: &str| {
                    native
                        .get(name)
                        .and_then(Value::as_f64)
                        .ok_or_else(|| unexpected("geo point", native))
                };
                GeoPoint::new(coordinate("lat")?, coordinate("lon")?).map(FieldValue::GeoPoint)
            }
        }
    }
}

/// Codecs for every field type.
pub fn json_codecs() -> CodecRegistry<Value> {
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
    .fold(CodecRegistry::new(BACKEND_NAME), |registry, field_type| {
        registry.with(Arc::new(JsonCodec::new(field_type)))
    })
}

// ============================================================================
// Tests
// ============================================================================
