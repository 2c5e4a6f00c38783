//! Logical field types and normalized domain values.
//!
//! [`FieldValue`] is the backend-neutral representation every converter
//! produces and every codec consumes. Each variant corresponds to exactly one
//! [`FieldType`], except [`FieldValue::Text`] which serves both string types.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::ConversionError;

/// Logical type of a value field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Exact-match string, not analyzed.
    Keyword,
    /// Full-text string, analyzed.
    Text,
    /// 32-bit signed integer.
    Integer,
    /// 64-bit signed integer.
    Long,
    /// 64-bit float.
    Double,
    /// Boolean flag.
    Boolean,
    /// Point in time (UTC).
    Instant,
    /// Calendar date without time zone.
    LocalDate,
    /// Latitude/longitude pair.
    GeoPoint,
}

impl FieldType {
    /// Name used in error messages and codec signatures.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Keyword => "keyword",
            FieldType::Text => "text",
            FieldType::Integer => "integer",
            FieldType::Long => "long",
            FieldType::Double => "double",
            FieldType::Boolean => "boolean",
            FieldType::Instant => "instant",
            FieldType::LocalDate => "local_date",
            FieldType::GeoPoint => "geo_point",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geographic coordinates in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in [-90, 90].
    pub latitude: f64,
    /// Longitude in [-180, 180].
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a point, rejecting out-of-range coordinates.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ConversionError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(ConversionError::new(format!(
                "latitude {latitude} is outside [-90, 90]"
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(ConversionError::new(format!(
                "longitude {longitude} is outside [-180, 180]"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// A normalized domain value, ready to be encoded by a codec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// String value (keyword or text fields).
    Text(String),
    /// 32-bit integer.
    Integer(i32),
    /// 64-bit integer.
    Long(i64),
    /// 64-bit float.
    Double(f64),
    /// Boolean.
    Boolean(bool),
    /// UTC instant.
    Instant(DateTime<Utc>),
    /// Calendar date.
    LocalDate(NaiveDate),
    /// Geographic point.
    GeoPoint(GeoPoint),
}

impl FieldValue {
    /// Short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "text",
            FieldValue::Integer(_) => "integer",
            FieldValue::Long(_) => "long",
            FieldValue::Double(_) => "double",
            FieldValue::Boolean(_) => "boolean",
            FieldValue::Instant(_) => "instant",
            FieldValue::LocalDate(_) => "local_date",
            FieldValue::GeoPoint(_) => "geo_point",
        }
    }

    /// Whether this value can be stored in a field of the given type.
    pub fn fits(&self, field_type: FieldType) -> bool {
        matches!(
            (self, field_type),
            (FieldValue::Text(_), FieldType::Keyword | FieldType::Text)
                | (FieldValue::Integer(_), FieldType::Integer)
                | (FieldValue::Long(_), FieldType::Long)
                | (FieldValue::Double(_), FieldType::Double)
                | (FieldValue::Boolean(_), FieldType::Boolean)
                | (FieldValue::Instant(_), FieldType::Instant)
                | (FieldValue::LocalDate(_), FieldType::LocalDate)
                | (FieldValue::GeoPoint(_), FieldType::GeoPoint)
        )
    }

    /// Borrow the string content, or fail with a type mismatch.
    pub fn expect_text(&self) -> Result<&str, ConversionError> {
        match self {
            FieldValue::Text(value) => Ok(value),
            other => Err(ConversionError::type_mismatch("text", other)),
        }
    }

    /// Extract an `i32`, or fail with a type mismatch.
    pub fn expect_integer(&self) -> Result<i32, ConversionError> {
        match self {
            FieldValue::Integer(value) => Ok(*value),
            other => Err(ConversionError::type_mismatch("integer", other)),
        }
    }

    /// Extract an `i64`, or fail with a type mismatch.
    pub fn expect_long(&self) -> Result<i64, ConversionError> {
        match self {
            FieldValue::Long(value) => Ok(*value),
            other => Err(ConversionError::type_mismatch("long", other)),
        }
    }

    /// Extract an `f64`, or fail with a type mismatch.
    pub fn expect_double(&self) -> Result<f64, ConversionError> {
        match self {
            FieldValue::Double(value) => Ok(*value),
            other => Err(ConversionError::type_mismatch("double", other)),
        }
    }

    /// Extract a `bool`, or fail with a type mismatch.
    pub fn expect_boolean(&self) -> Result<bool, ConversionError> {
        match self {
            FieldValue::Boolean(value) => Ok(*value),
            other => Err(ConversionError::type_mismatch("boolean", other)),
        }
    }

    /// Extract an instant, or fail with a type mismatch.
    pub fn expect_instant(&self) -> Result<DateTime<Utc>, ConversionError> {
        match self {
            FieldValue::Instant(value) => Ok(*value),
            other => Err(ConversionError::type_mismatch("instant", other)),
        }
    }

    /// Extract a local date, or fail with a type mismatch.
    pub fn expect_local_date(&self) -> Result<NaiveDate, ConversionError> {
        match self {
            FieldValue::LocalDate(value) => Ok(*value),
            other => Err(ConversionError::type_mismatch("local_date", other)),
        }
    }

    /// Extract a geo point, or fail with a type mismatch.
    pub fn expect_geo_point(&self) -> Result<GeoPoint, ConversionError> {
        match self {
            FieldValue::GeoPoint(value) => Ok(*value),
            other => Err(ConversionError::type_mismatch("geo_point", other)),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Long(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Double(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Instant(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::LocalDate(value)
    }
}

impl From<GeoPoint> for FieldValue {
    fn from(value: GeoPoint) -> Self {
        FieldValue::GeoPoint(value)
    }
}

// ============================================================================
// Tests
// ============================================================================
