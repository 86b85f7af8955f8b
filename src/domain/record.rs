//! Source records
//!
//! A [`SourceRecord`] is one row of a source table: an ordered set of
//! column name to scalar value pairs. Rows are extracted as `to_jsonb(row)`
//! so most values arrive as JSON scalars; dates and timestamps arrive as
//! ISO strings and are interpreted by the transformations that need them.

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::fmt;

/// Canonical date format of target documents
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Canonical date-time format of target documents
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A single column value
#[derive(Debug, Clone, PartialEq)]
pub enum SourceValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// Nested JSON (json/jsonb or array columns)
    Json(Value),
}

impl SourceValue {
    /// Whether the value is SQL NULL
    pub fn is_null(&self) -> bool {
        matches!(self, SourceValue::Null)
    }

    /// Integer view of the value, used for record keys
    ///
    /// Text is parsed, floats are accepted only when integral.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SourceValue::Integer(i) => Some(*i),
            SourceValue::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            SourceValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// JSON representation written into target documents
    ///
    /// Dates use [`DATE_FORMAT`], timestamps [`DATETIME_FORMAT`]. Non-finite
    /// floats have no JSON form and become null.
    pub fn to_json(&self) -> Value {
        match self {
            SourceValue::Null => Value::Null,
            SourceValue::Bool(b) => Value::Bool(*b),
            SourceValue::Integer(i) => Value::from(*i),
            SourceValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            SourceValue::Text(s) => Value::String(s.clone()),
            SourceValue::Date(d) => Value::String(d.format(DATE_FORMAT).to_string()),
            SourceValue::DateTime(dt) => Value::String(dt.format(DATETIME_FORMAT).to_string()),
            SourceValue::Json(v) => v.clone(),
        }
    }
}

impl fmt::Display for SourceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceValue::Null => Ok(()),
            SourceValue::Bool(b) => write!(f, "{b}"),
            SourceValue::Integer(i) => write!(f, "{i}"),
            SourceValue::Float(v) => write!(f, "{v}"),
            SourceValue::Text(s) => f.write_str(s),
            SourceValue::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            SourceValue::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
            SourceValue::Json(v) => write!(f, "{v}"),
        }
    }
}

impl From<Value> for SourceValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => SourceValue::Null,
            Value::Bool(b) => SourceValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SourceValue::Integer(i),
                None => n.as_f64().map(SourceValue::Float).unwrap_or(SourceValue::Null),
            },
            Value::String(s) => SourceValue::Text(s),
            other => SourceValue::Json(other),
        }
    }
}

impl From<&str> for SourceValue {
    fn from(value: &str) -> Self {
        SourceValue::Text(value.to_string())
    }
}

impl From<String> for SourceValue {
    fn from(value: String) -> Self {
        SourceValue::Text(value)
    }
}

impl From<i64> for SourceValue {
    fn from(value: i64) -> Self {
        SourceValue::Integer(value)
    }
}

impl From<i32> for SourceValue {
    fn from(value: i32) -> Self {
        SourceValue::Integer(i64::from(value))
    }
}

impl From<f64> for SourceValue {
    fn from(value: f64) -> Self {
        SourceValue::Float(value)
    }
}

impl From<bool> for SourceValue {
    fn from(value: bool) -> Self {
        SourceValue::Bool(value)
    }
}

impl From<NaiveDate> for SourceValue {
    fn from(value: NaiveDate) -> Self {
        SourceValue::Date(value)
    }
}

impl From<NaiveDateTime> for SourceValue {
    fn from(value: NaiveDateTime) -> Self {
        SourceValue::DateTime(value)
    }
}

impl<T: Into<SourceValue>> From<Option<T>> for SourceValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SourceValue::Null)
    }
}

/// One source row, columns in their original order
///
/// # Examples
///
/// ```
/// use fhir_bridge::domain::record::{SourceRecord, SourceValue};
///
/// let record = SourceRecord::new()
///     .with("patient_id", 7)
///     .with("first_name", "Ada");
///
/// assert_eq!(record.get("first_name"), Some(&SourceValue::from("Ada")));
/// assert_eq!(record.get("missing"), None);
/// assert_eq!(record.key("patient_id"), Some(7));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceRecord {
    columns: Vec<(String, SourceValue)>,
}

impl SourceRecord {
    /// Creates an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, column: impl Into<String>, value: impl Into<SourceValue>) -> Self {
        self.insert(column, value);
        self
    }

    /// Sets a column, replacing an existing value in place
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<SourceValue>) {
        let column = column.into();
        let value = value.into();
        match self.columns.iter_mut().find(|(name, _)| *name == column) {
            Some(slot) => slot.1 = value,
            None => self.columns.push((column, value)),
        }
    }

    /// Value of a column, `None` when the column is absent
    pub fn get(&self, column: &str) -> Option<&SourceValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Integer key stored in `key_column`
    pub fn key(&self, key_column: &str) -> Option<i64> {
        self.get(key_column).and_then(SourceValue::as_i64)
    }

    /// Iterates columns in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SourceValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the record has no columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Builds a record from a `to_jsonb(row)` object
    ///
    /// # Errors
    ///
    /// Returns an error message if the value is not a JSON object.
    pub fn from_json(value: Value) -> Result<Self, String> {
        match value {
            Value::Object(map) => Ok(map.into_iter().collect()),
            other => Err(format!(
                "expected a JSON object for a source row, got {}",
                json_kind(&other)
            )),
        }
    }
}

impl<K: Into<String>, V: Into<SourceValue>> FromIterator<(K, V)> for SourceRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = SourceRecord::new();
        for (column, value) in iter {
            record.insert(column, value);
        }
        record
    }
}

/// Short name of a JSON node kind, for messages
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
