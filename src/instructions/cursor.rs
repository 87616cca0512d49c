//! `before` / `after` (§4.4.5): cursor-based pagination predicates.

use crate::compose::ParamBuilder;
use crate::error::CompileResult;
use crate::model::{get_field_from_model, FieldType, Model};
use crate::pagination::decode_cursor;
use crate::query::OrderedBy;
use crate::value::Value;

/// Build the disjunctive cursor predicate described in §4.4.5, e.g. for
/// ascending fields `a1, a2` it is:
/// `(a1 > v1) OR (a1 = v1 AND a2 > v2)` (reversed comparators when paging
/// backwards). The caller prefixes the result with `AND ` when combining it
/// with a `with` filter.
pub fn build_cursor_predicate(
    model: &Model,
    ordered_by: &OrderedBy,
    cursor: &str,
    is_before: bool,
    params: &mut ParamBuilder,
) -> CompileResult<String> {
    let fields: Vec<(&str, bool)> = ordered_by
        .ascending
        .iter()
        .map(|f| (f.as_str(), true))
        .chain(ordered_by.descending.iter().map(|f| (f.as_str(), false)))
        .collect();
    let values = decode_cursor(model, ordered_by, cursor)?;

    // Each field's value is rendered once, the first time it's needed, and
    // reused verbatim everywhere else it appears (the equality conjuncts of
    // later disjuncts): a bound placeholder for an ordinary comparison, or an
    // inlined literal for the auto-appended `ronin.createdAt`/`updatedAt`
    // tie-break (§8 scenario 2).
    let mut rendered: Vec<Option<String>> = vec![None; fields.len()];

    let mut disjuncts = Vec::with_capacity(fields.len());
    for i in 0..fields.len() {
        let mut conjuncts = Vec::with_capacity(i + 1);
        for j in 0..i {
            let (field, _) = fields[j];
            let selector = get_field_from_model(model, field, "", true)?.expect("should_throw");
            let text = render_field(&mut rendered, j, field, &values[j], params)?;
            conjuncts.push(format!("{} = {text}", selector.read));
        }

        let (field, ascending) = fields[i];
        let selector = get_field_from_model(model, field, "", true)?.expect("should_throw");
        let value = &values[i];
        let wants_greater = ascending != is_before;

        if value.is_null() {
            if wants_greater {
                conjuncts.push(format!("{} IS NOT NULL", selector.read));
            } else {
                // nothing sorts lower than NULL: this disjunct can't match.
                continue;
            }
        } else {
            let text = render_field(&mut rendered, i, field, value, params)?;
            let is_createdat_or_updatedat =
                field == "ronin.createdAt" || field == "ronin.updatedAt";
            let read = if !wants_greater && !is_createdat_or_updatedat && selector.field.r#type != FieldType::Link
            {
                format!("IFNULL({}, -1e999)", selector.read)
            } else {
                selector.read.clone()
            };
            let op = if wants_greater { ">" } else { "<" };
            let collate = if selector.field.r#type == FieldType::String {
                " COLLATE NOCASE"
            } else {
                ""
            };
            conjuncts.push(format!("{read} {op} {text}{collate}"));
        }

        disjuncts.push(format!("({})", conjuncts.join(" AND ")));
    }

    Ok(format!("({})", disjuncts.join(" OR ")))
}

/// Resolve field `index`'s SQL text, computing and caching it on first use so
/// every later reference (as an equality conjunct in a subsequent disjunct)
/// reuses the same placeholder or literal instead of rebinding. `ronin.createdAt`
/// / `ronin.updatedAt` tie-break values are inlined as literals; everything
/// else is bound as a parameter.
fn render_field(
    rendered: &mut [Option<String>],
    index: usize,
    field: &str,
    value: &serde_json::Value,
    params: &mut ParamBuilder,
) -> CompileResult<String> {
    if let Some(text) = &rendered[index] {
        return Ok(text.clone());
    }
    let is_createdat_or_updatedat = field == "ronin.createdAt" || field == "ronin.updatedAt";
    let text = if is_createdat_or_updatedat {
        Value::try_from(value)?.render_inline()
    } else {
        params.bind(Value::try_from(value)?)
    };
    rendered[index] = Some(text.clone());
    Ok(text)
}
