//! Typed attribute values
//!
//! Ingestion payloads and filter values arrive loosely typed: numbers may be
//! JSON numbers, strings, or strings wrapped in an extra pair of quotes.
//! Conversion here is the single place that decides what is acceptable.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use super::types::DataType;

/// A value converted to its attribute's declared type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Int(i64),
    Float(f64),
}

impl FieldValue {
    /// Convert a raw JSON value to the given type.
    ///
    /// Returns a description of the problem when the value cannot be
    /// represented; `null` never converts.
    pub fn convert(data_type: DataType, raw: &Value) -> Result<FieldValue, String> {
        match data_type {
            DataType::String => match raw {
                Value::String(s) => Ok(FieldValue::String(s.clone())),
                Value::Number(n) => Ok(FieldValue::String(n.to_string())),
                Value::Bool(b) => Ok(FieldValue::String(b.to_string())),
                other => Err(format!("expected string, got {}", json_type_name(other))),
            },
            DataType::Int => match raw {
                Value::Number(n) => {
                    if let Some(i) = n.as_i64() {
                        Ok(FieldValue::Int(i))
                    } else {
                        match n.as_f64() {
                            Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                                Ok(FieldValue::Int(f as i64))
                            }
                            _ => Err(format!("{} is not an integer", n)),
                        }
                    }
                }
                Value::String(s) => unquote(s)
                    .parse::<i64>()
                    .map(FieldValue::Int)
                    .map_err(|_| format!("'{}' is not an integer", s)),
                other => Err(format!("expected int, got {}", json_type_name(other))),
            },
            DataType::Float => match raw {
                Value::Number(n) => n
                    .as_f64()
                    .map(FieldValue::Float)
                    .ok_or_else(|| format!("{} is not a float", n)),
                Value::String(s) => unquote(s)
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(FieldValue::Float)
                    .ok_or_else(|| format!("'{}' is not a float", s)),
                other => Err(format!("expected float, got {}", json_type_name(other))),
            },
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            FieldValue::String(_) => DataType::String,
            FieldValue::Int(_) => DataType::Int,
            FieldValue::Float(_) => DataType::Float,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::String(s) => Value::String(s.clone()),
            FieldValue::Int(i) => Value::from(*i),
            FieldValue::Float(f) => Value::from(*f),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// Trim whitespace and one pair of surrounding double quotes
fn unquote(s: &str) -> &str {
    let trimmed = s.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .map(str::trim)
        .unwrap_or(trimmed)
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
