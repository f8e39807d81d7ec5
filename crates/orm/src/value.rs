//! Values and rows
//!
//! [`Value`] is the closed set of column values the ORM moves between models
//! and drivers. [`Row`] keeps a result row in column order while still giving
//! name-keyed access. [`FromValue`] turns a column value back into a field
//! type; every conversion is an exhaustive match over the variants.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value as JsonValue;

use crate::error::{ModelError, ModelResult};

/// Database value used for parameter binding and row decoding
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
}

impl Value {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The zero value for its variant. Primary keys holding a zero value
    /// identify entities that were never persisted.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Integer(i) => *i == 0,
            Value::Float(f) => *f == 0.0,
            Value::Text(s) => s.is_empty(),
            Value::Boolean(b) => !*b,
            Value::Bytes(b) => b.is_empty(),
            Value::Timestamp(ts) => ts.timestamp() == 0 && ts.timestamp_subsec_nanos() == 0,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Short variant name, used in conversion errors
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Boolean(_) => "boolean",
            Value::Bytes(_) => "bytes",
            Value::Timestamp(_) => "timestamp",
        }
    }

    /// Convert to JSON value
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Integer(i) => JsonValue::Number((*i).into()),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::Text(s) => JsonValue::String(s.clone()),
            Value::Boolean(b) => JsonValue::Bool(*b),
            Value::Bytes(b) => JsonValue::Array(b.iter().map(|&x| JsonValue::from(x)).collect()),
            Value::Timestamp(ts) => JsonValue::String(ts.to_rfc3339()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::Integer(i64::from(value))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        // Values above i64::MAX only survive as text
        match i64::try_from(value) {
            Ok(v) => Value::Integer(v),
            Err(_) => Value::Text(value.to_string()),
        }
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(f64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Text(value.clone())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Bytes(value.to_vec())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Timestamp(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::Timestamp(Utc.from_utc_datetime(&value))
    }
}

impl From<uuid::Uuid> for Value {
    fn from(value: uuid::Uuid) -> Self {
        Value::Text(value.to_string())
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// Conversion from a column value into a model field type
pub trait FromValue: Sized {
    fn from_value(value: Value) -> ModelResult<Self>;
}

fn conversion_error(value: &Value, target: &str) -> ModelError {
    ModelError::Conversion(format!("cannot convert {} value into {}", value.type_name(), target))
}

fn text_of_bytes(bytes: &[u8]) -> Option<&str> {
    std::str::from_utf8(bytes).ok()
}

fn wide_integer(value: Value, target: &str) -> ModelResult<i128> {
    match value {
        Value::Integer(i) => Ok(i128::from(i)),
        Value::Float(f) if f.is_finite() && f.fract() == 0.0 => Ok(f as i128),
        Value::Boolean(b) => Ok(i128::from(b)),
        Value::Text(ref s) => s
            .trim()
            .parse::<i128>()
            .map_err(|_| conversion_error(&value, target)),
        Value::Bytes(ref b) => text_of_bytes(b)
            .and_then(|s| s.trim().parse::<i128>().ok())
            .ok_or_else(|| conversion_error(&value, target)),
        Value::Float(_) | Value::Null | Value::Timestamp(_) => {
            Err(conversion_error(&value, target))
        }
    }
}

macro_rules! impl_from_value_int {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: Value) -> ModelResult<Self> {
                    let wide = wide_integer(value, stringify!($ty))?;
                    <$ty>::try_from(wide).map_err(|_| {
                        ModelError::Conversion(format!(
                            "value {} is out of range for {}",
                            wide,
                            stringify!($ty)
                        ))
                    })
                }
            }
        )*
    };
}

impl_from_value_int!(i8, i16, i32, i64, u8, u16, u32, u64);

impl FromValue for f64 {
    fn from_value(value: Value) -> ModelResult<Self> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Integer(i) => Ok(i as f64),
            Value::Boolean(b) => Ok(if b { 1.0 } else { 0.0 }),
            Value::Text(ref s) => s.trim().parse().map_err(|_| conversion_error(&value, "f64")),
            Value::Bytes(ref b) => text_of_bytes(b)
                .and_then(|s| s.trim().parse().ok())
                .ok_or_else(|| conversion_error(&value, "f64")),
            Value::Null | Value::Timestamp(_) => Err(conversion_error(&value, "f64")),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> ModelResult<Self> {
        f64::from_value(value).map(|f| f as f32)
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "y" | "yes" => Some(true),
        "0" | "f" | "false" | "n" | "no" => Some(false),
        _ => None,
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> ModelResult<Self> {
        match value {
            Value::Boolean(b) => Ok(b),
            Value::Integer(i) => Ok(i != 0),
            Value::Float(f) => Ok(f != 0.0),
            Value::Text(ref s) => parse_bool(s).ok_or_else(|| conversion_error(&value, "bool")),
            Value::Bytes(ref b) => text_of_bytes(b)
                .and_then(parse_bool)
                .ok_or_else(|| conversion_error(&value, "bool")),
            Value::Null | Value::Timestamp(_) => Err(conversion_error(&value, "bool")),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> ModelResult<Self> {
        match value {
            Value::Text(s) => Ok(s),
            Value::Integer(i) => Ok(i.to_string()),
            Value::Float(f) => Ok(f.to_string()),
            Value::Boolean(b) => Ok(b.to_string()),
            Value::Timestamp(ts) => Ok(ts.to_rfc3339()),
            Value::Bytes(b) => {
                String::from_utf8(b).map_err(|e| ModelError::Conversion(e.to_string()))
            }
            Value::Null => Err(conversion_error(&value, "String")),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> ModelResult<Self> {
        match value {
            Value::Bytes(b) => Ok(b),
            Value::Text(s) => Ok(s.into_bytes()),
            Value::Null
            | Value::Integer(_)
            | Value::Float(_)
            | Value::Boolean(_)
            | Value::Timestamp(_) => Err(conversion_error(&value, "Vec<u8>")),
        }
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: Value) -> ModelResult<Self> {
        match value {
            Value::Timestamp(ts) => Ok(ts),
            Value::Integer(secs) => Utc
                .timestamp_opt(secs, 0)
                .single()
                .ok_or_else(|| conversion_error(&value, "DateTime<Utc>")),
            Value::Text(ref s) => {
                parse_timestamp(s).ok_or_else(|| conversion_error(&value, "DateTime<Utc>"))
            }
            Value::Bytes(ref b) => text_of_bytes(b)
                .and_then(parse_timestamp)
                .ok_or_else(|| conversion_error(&value, "DateTime<Utc>")),
            Value::Null | Value::Float(_) | Value::Boolean(_) => {
                Err(conversion_error(&value, "DateTime<Utc>"))
            }
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: Value) -> ModelResult<Self> {
        DateTime::<Utc>::from_value(value).map(|dt| dt.naive_utc())
    }
}

impl FromValue for uuid::Uuid {
    fn from_value(value: Value) -> ModelResult<Self> {
        match value {
            Value::Text(ref s) => {
                uuid::Uuid::parse_str(s).map_err(|_| conversion_error(&value, "Uuid"))
            }
            Value::Bytes(ref b) if b.len() == 16 => {
                uuid::Uuid::from_slice(b).map_err(|_| conversion_error(&value, "Uuid"))
            }
            Value::Bytes(ref b) => text_of_bytes(b)
                .and_then(|s| uuid::Uuid::parse_str(s).ok())
                .ok_or_else(|| conversion_error(&value, "Uuid")),
            Value::Null
            | Value::Integer(_)
            | Value::Float(_)
            | Value::Boolean(_)
            | Value::Timestamp(_) => Err(conversion_error(&value, "Uuid")),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> ModelResult<Self> {
        Ok(value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> ModelResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// One result row: column names in select order, with their values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from `(column, value)` pairs
    pub fn from_pairs<I, S, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, V)>,
        S: Into<String>,
        V: Into<Value>,
    {
        let mut row = Row::new();
        for (column, value) in pairs {
            row.push(column, value);
        }
        row
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.columns.push(column.into());
        self.values.push(value.into());
    }

    /// Get a column value by name
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    /// Get a column value by index
    pub fn get_by_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Decode a column into a typed value
    pub fn try_get<T: FromValue>(&self, column: &str) -> ModelResult<T> {
        let value = self
            .get(column)
            .cloned()
            .ok_or_else(|| ModelError::Query(format!("Column '{}' not found", column)))?;
        T::from_value(value)
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(String::as_str).zip(self.values.iter())
    }

    /// Convert row to HashMap
    pub fn into_map(self) -> HashMap<String, Value> {
        self.columns.into_iter().zip(self.values).collect()
    }

    /// Convert row to JSON value
    pub fn to_json(&self) -> JsonValue {
        let map = self
            .iter()
            .map(|(column, value)| (column.to_string(), value.to_json()))
            .collect::<serde_json::Map<_, _>>();
        JsonValue::Object(map)
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = std::iter::Zip<std::vec::IntoIter<String>, std::vec::IntoIter<Value>>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter().zip(self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_values() {
        assert!(Value::Null.is_zero());
        assert!(Value::Integer(0).is_zero());
        assert!(Value::Text(String::new()).is_zero());
        assert!(!Value::Integer(7).is_zero());
        assert!(!Value::Text("a".into()).is_zero());
    }

    #[test]
    fn test_integer_widening_and_narrowing() {
        assert_eq!(i64::from_value(Value::Integer(42)).unwrap(), 42);
        assert_eq!(i32::from_value(Value::Text("17".into())).unwrap(), 17);
        assert_eq!(u8::from_value(Value::Bytes(b"200".to_vec())).unwrap(), 200);
        assert!(u8::from_value(Value::Integer(300)).is_err());
        assert!(i32::from_value(Value::Null).is_err());
        assert!(i64::from_value(Value::Float(1.5)).is_err());
    }

    #[test]
    fn test_bool_from_mysql_tinyint() {
        assert!(bool::from_value(Value::Integer(1)).unwrap());
        assert!(!bool::from_value(Value::Integer(0)).unwrap());
        assert!(bool::from_value(Value::Text("t".into())).unwrap());
    }

    #[test]
    fn test_option_passes_null_through() {
        assert_eq!(Option::<String>::from_value(Value::Null).unwrap(), None);
        assert_eq!(
            Option::<String>::from_value(Value::Text("x".into())).unwrap(),
            Some("x".to_string())
        );
    }

    #[test]
    fn test_timestamp_from_text() {
        let ts = DateTime::<Utc>::from_value(Value::Text("2024-03-01 10:20:30".into())).unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-03-01T10:20:30+00:00");
    }

    #[test]
    fn test_row_access() {
        let row = Row::from_pairs([("id", Value::Integer(1)), ("name", Value::from("ann"))]);

        assert_eq!(row.len(), 2);
        assert_eq!(row.get("name"), Some(&Value::Text("ann".into())));
        assert_eq!(row.try_get::<i64>("id").unwrap(), 1);
        assert!(row.try_get::<i64>("missing").is_err());
        assert_eq!(row.to_json(), serde_json::json!({"id": 1, "name": "ann"}));

        let map = row.into_map();
        assert_eq!(map.get("id"), Some(&Value::Integer(1)));
    }

    #[test]
    fn test_large_unsigned_survives_as_text() {
        let v = Value::from(u64::MAX);
        assert_eq!(v, Value::Text(u64::MAX.to_string()));
        assert_eq!(u64::from_value(v).unwrap(), u64::MAX);
    }
}
