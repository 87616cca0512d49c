//! `orderedBy` (§4.4.4).

use crate::error::CompileResult;
use crate::model::{get_field_from_model, FieldType, Model};
use crate::query::OrderedBy;

/// Build `ORDER BY <expr> ASC [COLLATE NOCASE], …, <expr> DESC […]`, or
/// `None` when nothing was requested.
pub fn build_order_by(model: &Model, ordered_by: &OrderedBy) -> CompileResult<Option<String>> {
    if ordered_by.is_empty() {
        return Ok(None);
    }

    let mut terms = Vec::with_capacity(ordered_by.ascending.len() + ordered_by.descending.len());
    for field in &ordered_by.ascending {
        terms.push(order_term(model, field, "ASC")?);
    }
    for field in &ordered_by.descending {
        terms.push(order_term(model, field, "DESC")?);
    }
    Ok(Some(format!("ORDER BY {}", terms.join(", "))))
}

fn order_term(model: &Model, field_or_expr: &str, direction: &str) -> CompileResult<String> {
    // Expression items (containing SQL-significant characters) bypass field
    // resolution per §4.4.4.
    if field_or_expr.contains('(') || field_or_expr.contains(' ') {
        return Ok(format!("{field_or_expr} {direction}"));
    }

    match get_field_from_model(model, field_or_expr, "", false)? {
        Some(selector) => {
            let collate = if selector.field.r#type == FieldType::String {
                " COLLATE NOCASE"
            } else {
                ""
            };
            Ok(format!("{}{collate} {direction}", selector.read))
        }
        None => Ok(format!("\"{field_or_expr}\" {direction}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Field;

    #[test]
    fn string_field_gets_collate_nocase() {
        let mut m = Model::bare("account");
        m.fields.push(Field::new("handle", FieldType::String));
        let ob = OrderedBy {
            ascending: vec!["handle".to_string()],
            descending: vec![],
        };
        let sql = build_order_by(&m, &ob).unwrap().unwrap();
        assert_eq!(sql, "ORDER BY \"handle\" COLLATE NOCASE ASC");
    }

    #[test]
    fn non_string_field_has_no_collate() {
        let mut m = Model::bare("account");
        m.fields.push(Field::new("ronin.createdAt", FieldType::Date));
        let ob = OrderedBy {
            ascending: vec![],
            descending: vec!["ronin.createdAt".to_string()],
        };
        let sql = build_order_by(&m, &ob).unwrap().unwrap();
        assert_eq!(sql, "ORDER BY \"ronin.createdAt\" DESC");
    }

    #[test]
    fn empty_is_none() {
        let m = Model::bare("account");
        assert!(build_order_by(&m, &OrderedBy::default()).unwrap().is_none());
    }
}
