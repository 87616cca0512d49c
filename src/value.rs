//! Bound parameter values.
//!
//! This is the compiled-output counterpart of the JSON literals a caller
//! writes in a query: by the time a value reaches a statement's `params`
//! list it has been reduced to one of the five SQLite-bindable shapes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A value bound to a `?n` placeholder in a compiled statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Bytes(Vec<u8>),
}

impl Value {
    /// Render this value inline into SQL text (used when `inline_params = true`).
    ///
    /// Strings are single-quoted with `'` doubled; JSON-typed values are
    /// additionally wrapped in `json('...')` by the caller, not here.
    pub fn render_inline(&self) -> String {
        match self {
            Value::String(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.is_finite() {
                    format!("{f:.1}")
                } else {
                    f.to_string()
                }
            }
            Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            Value::Bytes(b) => {
                let mut out = String::with_capacity(b.len() * 2 + 3);
                out.push_str("x'");
                for byte in b {
                    out.push_str(&format!("{byte:02x}"));
                }
                out.push('\'');
                out
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render_inline())
    }
}

/// Fallible conversion from a JSON scalar (as found in query literals) into a
/// bound [`Value`]. `null` has no `Value` representation — callers branch on
/// it before reaching this conversion (see `instructions::with`).
impl TryFrom<&serde_json::Value> for Value {
    type Error = crate::error::CompileError;

    fn try_from(json: &serde_json::Value) -> Result<Self, Self::Error> {
        match json {
            serde_json::Value::String(s) => Ok(Value::String(s.clone())),
            serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Value::Float(f))
                } else {
                    Err(crate::error::CompileError::invalid_with_value(format!(
                        "unrepresentable number: {n}"
                    )))
                }
            }
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                // Structured values (json-typed fields) travel as their JSON text;
                // the `json(?n)` wrapping happens at the call site.
                Ok(Value::String(serde_json::to_string(json).map_err(|e| {
                    crate::error::CompileError::invalid_with_value(e.to_string())
                })?))
            }
            serde_json::Value::Null => Err(crate::error::CompileError::invalid_with_value(
                "null has no bound Value representation",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_inline_string_escapes_quotes() {
        let v = Value::String("O'Brien".to_string());
        assert_eq!(v.render_inline(), "'O''Brien'");
    }

    #[test]
    fn render_inline_bool_is_0_or_1() {
        assert_eq!(Value::Bool(true).render_inline(), "1");
        assert_eq!(Value::Bool(false).render_inline(), "0");
    }

    #[test]
    fn render_inline_bytes_is_hex_blob() {
        assert_eq!(Value::Bytes(vec![0xde, 0xad]).render_inline(), "x'dead'");
    }

    #[test]
    fn try_from_json_number_prefers_integer() {
        let json = serde_json::json!(42);
        let v = Value::try_from(&json).unwrap();
        assert_eq!(v, Value::Int(42));
    }

    #[test]
    fn try_from_json_null_errors() {
        let json = serde_json::Value::Null;
        assert!(Value::try_from(&json).is_err());
    }

    #[test]
    fn try_from_json_object_round_trips_as_text() {
        let json = serde_json::json!({"a": 1});
        let v = Value::try_from(&json).unwrap();
        assert_eq!(v, Value::String("{\"a\":1}".to_string()));
    }
}
