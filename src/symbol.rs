//! Symbol values: the three shapes a query/instruction value can take (§9).
//!
//! Where the wire format uses a dynamically-keyed object to tag a value as
//! an expression or a nested query, this module turns that into a proper
//! discriminated union so the rest of the compiler matches on a closed type
//! instead of re-inspecting JSON shape at every call site.

use crate::error::{CompileError, CompileResult};
use crate::query::Query;
use serde_json::Value as Json;

/// Marks a field reference resolved against the current model's table alias.
pub const FIELD: &str = "FIELD";
/// Marks a field reference resolved against the parent scope's table alias
/// (used inside presets and sub-queries compiled relative to a parent row).
pub const FIELD_PARENT: &str = "FIELD_PARENT";
/// Marks a field reference resolved against a trigger's `OLD` row.
pub const FIELD_PARENT_OLD: &str = "FIELD_PARENT_OLD";
/// Marks a field reference resolved against a trigger's `NEW` row.
pub const FIELD_PARENT_NEW: &str = "FIELD_PARENT_NEW";

/// One of the three kinds of non-plain value an instruction member can hold.
#[derive(Debug, Clone)]
pub enum Symbol {
    Literal(Json),
    Expression(String),
    SubQuery(Box<Query>),
}

impl Symbol {
    /// Detect the two special-key object shapes (`{"EXPRESSION": "..."}`,
    /// `{"QUERY": {...}}`); anything else is treated as a literal value.
    pub fn from_json(json: &Json) -> CompileResult<Symbol> {
        if let Json::Object(map) = json {
            if map.len() == 1 {
                if let Some(expr) = map.get("EXPRESSION") {
                    let s = expr.as_str().ok_or_else(|| {
                        CompileError::invalid_with_value("EXPRESSION symbol must be a string")
                    })?;
                    return Ok(Symbol::Expression(s.to_string()));
                }
                if let Some(query) = map.get("QUERY") {
                    return Ok(Symbol::SubQuery(Box::new(Query::from_json(query)?)));
                }
            }
        }
        Ok(Symbol::Literal(json.clone()))
    }

    pub fn as_literal(&self) -> Option<&Json> {
        match self {
            Symbol::Literal(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_sub_query(&self) -> bool {
        matches!(self, Symbol::SubQuery(_))
    }
}

/// Replace every occurrence of a `FIELD`/`FIELD_PARENT*` token in an
/// expression string with the concrete quoted column reference for the
/// appropriate scope: `FIELD` resolves against `current_alias` (the model
/// the expression is compiled against), `FIELD_PARENT`/`FIELD_PARENT_OLD`/
/// `FIELD_PARENT_NEW` resolve against `parent_alias` (an enclosing query or
/// trigger's `OLD`/`NEW` row).
///
/// A token may be followed directly by a field slug (`FIELD_PARENTid`,
/// `FIELD_PARENTauthor`) naming which column it resolves to; a bare token
/// with nothing following it resolves to `default_field` (the field the
/// surrounding expression is itself attached to, e.g. a `check` constraint).
pub fn resolve_field_tokens(
    expression: &str,
    current_alias: &str,
    parent_alias: &str,
    default_field: &str,
) -> String {
    let pattern = regex::Regex::new(
        r"(FIELD_PARENT_OLD|FIELD_PARENT_NEW|FIELD_PARENT|FIELD)([A-Za-z_][A-Za-z0-9_.]*)?",
    )
    .expect("static pattern");
    pattern
        .replace_all(expression, |caps: &regex::Captures| {
            let token = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let field = caps.get(2).map(|m| m.as_str()).unwrap_or(default_field);
            let alias = if token == FIELD { current_alias } else { parent_alias };
            if alias.is_empty() {
                format!("\"{field}\"")
            } else {
                format!("{alias}.\"{field}\"")
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn literal_passthrough() {
        let s = Symbol::from_json(&json!("elaine")).unwrap();
        assert!(matches!(s, Symbol::Literal(Json::String(v)) if v == "elaine"));
    }

    #[test]
    fn expression_symbol() {
        let s = Symbol::from_json(&json!({"EXPRESSION": "strftime('%s','now')"})).unwrap();
        assert!(matches!(s, Symbol::Expression(_)));
    }

    #[test]
    fn sub_query_symbol() {
        let s = Symbol::from_json(&json!({"QUERY": {"get": {"account": null}}})).unwrap();
        assert!(s.is_sub_query());
    }

    #[test]
    fn field_parent_token_uses_parent_alias_and_suffix_as_field_slug() {
        let out = resolve_field_tokens("FIELD_PARENTid", "t1", "t0", "status");
        assert_eq!(out, "t0.\"id\"");
    }

    #[test]
    fn bare_field_token_uses_current_alias_and_default_field() {
        let out = resolve_field_tokens("FIELD > 0", "", "t0", "amount");
        assert_eq!(out, "\"amount\" > 0");
    }
}
