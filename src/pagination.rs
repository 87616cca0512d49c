//! C7: opaque pagination cursors (§4.1, §4.4.5, §6 "Cursor format").
//!
//! A cursor is the comma-joined, percent-encoded values of a record's
//! `orderedBy` fields (ascending fields first, then descending), with `null`
//! represented by the literal token `RONIN_NULL`.

use crate::error::{CompileError, CompileResult};
use crate::model::{FieldType, Model};
use crate::query::OrderedBy;
use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use serde_json::Value as Json;

/// The placeholder a cursor uses in place of an absent/null field value.
pub const RONIN_NULL: &str = "RONIN_NULL";

/// Build the cursor string for `record` under ordering `ordered_by`.
pub fn encode_cursor(record: &Json, ordered_by: &OrderedBy) -> CompileResult<String> {
    let fields: Vec<&str> = ordered_by
        .ascending
        .iter()
        .chain(ordered_by.descending.iter())
        .map(|s| s.as_str())
        .collect();

    let mut parts = Vec::with_capacity(fields.len());
    for field in fields {
        let value = record.pointer(&format!("/{}", field.replace('.', "/")));
        let token = match value {
            None | Some(Json::Null) => RONIN_NULL.to_string(),
            Some(Json::String(s)) => s.clone(),
            Some(Json::Number(n)) => n.to_string(),
            Some(Json::Bool(b)) => b.to_string(),
            Some(other) => other.to_string(),
        };
        parts.push(utf8_percent_encode(&token, NON_ALPHANUMERIC).to_string());
    }
    Ok(parts.join(","))
}

/// Decode a cursor string into typed values, one per ordered field (in the
/// same `[...ascending, ...descending]` order used to encode it).
pub fn decode_cursor(model: &Model, ordered_by: &OrderedBy, cursor: &str) -> CompileResult<Vec<Json>> {
    let fields: Vec<&str> = ordered_by
        .ascending
        .iter()
        .chain(ordered_by.descending.iter())
        .map(|s| s.as_str())
        .collect();

    let raw_parts: Vec<&str> = cursor.split(',').collect();
    if raw_parts.len() != fields.len() {
        return Err(CompileError::invalid_with_value(format!(
            "cursor has {} components, expected {} for the given orderedBy",
            raw_parts.len(),
            fields.len()
        )));
    }

    let mut values = Vec::with_capacity(fields.len());
    for (field, raw) in fields.into_iter().zip(raw_parts) {
        if raw == RONIN_NULL {
            values.push(Json::Null);
            continue;
        }
        let decoded = percent_decode_str(raw)
            .decode_utf8()
            .map_err(|_| CompileError::invalid_with_value("cursor contains invalid UTF-8"))?
            .into_owned();

        let field_type = model.field(field).map(|f| f.r#type);
        values.push(coerce(&decoded, field_type)?);
    }
    Ok(values)
}

fn coerce(raw: &str, field_type: Option<FieldType>) -> CompileResult<Json> {
    match field_type {
        Some(FieldType::Boolean) => Ok(Json::Bool(raw == "true")),
        Some(FieldType::Number) => raw
            .parse::<f64>()
            .map(|n| Json::from(n))
            .map_err(|_| CompileError::invalid_with_value("cursor value is not a valid number")),
        Some(FieldType::Date) => {
            let millis: i64 = raw
                .parse()
                .map_err(|_| CompileError::invalid_with_value("cursor date is not milliseconds"))?;
            Ok(Json::String(millis_to_iso(millis)))
        }
        _ => Ok(Json::String(raw.to_string())),
    }
}

fn millis_to_iso(millis: i64) -> String {
    let dt = chrono::DateTime::from_timestamp_millis(millis).unwrap_or_default();
    dt.format("%Y-%m-%dT%H:%M:%.3fZ").to_string()
}
