//! The `with` filter tree (§4.4.1).

use crate::compose::ParamBuilder;
use crate::error::{CompileError, CompileResult};
use crate::model::{get_field_from_model, get_model_by_slug, FieldType, Model};
use crate::value::Value;
use serde_json::Value as Json;

const REFINEMENT_KEYS: &[&str] = &[
    "being",
    "notBeing",
    "startingWith",
    "notStartingWith",
    "endingWith",
    "notEndingWith",
    "containing",
    "notContaining",
    "greaterThan",
    "greaterOrEqual",
    "lessThan",
    "lessOrEqual",
];

/// Build the parenthesised `with` fragment, e.g. `("handle" = ?1)`. Returns
/// `None` for an empty filter object. `parent_alias` is the enclosing
/// query's table alias, used to resolve `FIELD_PARENT*` tokens in embedded
/// expressions (presets, correlated sub-queries); pass `""` at the top level.
pub fn build_with(
    models: &[Model],
    model: &Model,
    alias: &str,
    parent_alias: &str,
    tree: &Json,
    params: &mut ParamBuilder,
) -> CompileResult<Option<String>> {
    let obj = tree
        .as_object()
        .ok_or_else(|| CompileError::invalid_with_value("`with` must be an object"))?;
    if obj.is_empty() {
        return Ok(None);
    }
    let mut clauses = Vec::with_capacity(obj.len());
    for (path, value) in obj {
        clauses.push(build_field_clause(
            models,
            model,
            alias,
            parent_alias,
            path,
            value,
            params,
        )?);
    }
    Ok(Some(format!("({})", clauses.join(" AND "))))
}

fn build_field_clause(
    models: &[Model],
    model: &Model,
    alias: &str,
    parent_alias: &str,
    path: &str,
    value: &Json,
    params: &mut ParamBuilder,
) -> CompileResult<String> {
    if let Json::Object(map) = value {
        if map.len() == 1 {
            if let Some(expr) = map.get("EXPRESSION") {
                let selector = get_field_from_model(model, path, alias, true)?.expect("should_throw");
                let text = expr.as_str().ok_or_else(|| {
                    CompileError::invalid_with_value("EXPRESSION symbol must be a string")
                })?;
                let resolved = crate::symbol::resolve_field_tokens(text, alias, parent_alias, path);
                return Ok(format!("{} = {resolved}", selector.read));
            }
            if let Some(sub_query) = map.get("QUERY") {
                let selector = get_field_from_model(model, path, alias, true)?.expect("should_throw");
                let sub_query = crate::query::Query::from_json(sub_query)?;
                let sub_sql = compile_scalar_sub_query(models, &sub_query, alias, params)?;
                return Ok(format!("{} = ({sub_sql})", selector.read));
            }
        }
    }

    match value {
        Json::Null => {
            let selector = get_field_from_model(model, path, alias, true)?.expect("should_throw");
            Ok(format!("{} IS NULL", selector.read))
        }
        Json::Array(items) => {
            let alternatives = items
                .iter()
                .map(|item| {
                    build_field_clause(models, model, alias, parent_alias, path, item, params)
                })
                .collect::<CompileResult<Vec<_>>>()?;
            Ok(format!("({})", alternatives.join(" OR ")))
        }
        Json::Object(map) => {
            let all_refinement_keys = !map.is_empty()
                && map.keys().all(|k| REFINEMENT_KEYS.contains(&k.as_str()));
            if all_refinement_keys {
                let parts = map
                    .iter()
                    .map(|(op, v)| build_refinement(model, alias, path, op, v, params))
                    .collect::<CompileResult<Vec<_>>>()?;
                Ok(format!("({})", parts.join(" AND ")))
            } else {
                build_link_filter(models, model, alias, parent_alias, path, map, params)
            }
        }
        scalar => build_refinement(model, alias, path, "being", scalar, params),
    }
}

/// Compile a `with`-embedded sub-query into a bare `SELECT ...` usable
/// inside an `= (...)` comparison; used for the `{QUERY: ...}` symbol form.
pub(crate) fn compile_scalar_sub_query(
    models: &[Model],
    sub_query: &crate::query::Query,
    parent_alias: &str,
    params: &mut ParamBuilder,
) -> CompileResult<String> {
    let crate::query::QueryBody::Dml { model: target_slug, instructions } = &sub_query.body else {
        return Err(CompileError::invalid_with_value(
            "a `with`-embedded sub-query must be a DML query",
        ));
    };
    let target = get_model_by_slug(models, target_slug)?;
    let where_sql = match instructions.as_ref().and_then(|i| i.with.as_ref()) {
        Some(tree) => build_with(models, target, "", parent_alias, tree, params)?,
        None => None,
    };
    let table = crate::ident::Ident::new(&target.table)?.to_sql();
    Ok(match where_sql {
        Some(w) => format!("SELECT \"id\" FROM {table} WHERE {w} LIMIT 1"),
        None => format!("SELECT \"id\" FROM {table} LIMIT 1"),
    })
}

fn build_refinement(
    model: &Model,
    alias: &str,
    path: &str,
    op: &str,
    value: &Json,
    params: &mut ParamBuilder,
) -> CompileResult<String> {
    let selector = get_field_from_model(model, path, alias, true)?.expect("should_throw");
    let read = selector.read;

    let (base_op, negate) = match op {
        "being" => ("being", false),
        "notBeing" => ("being", true),
        "startingWith" => ("startingWith", false),
        "notStartingWith" => ("startingWith", true),
        "endingWith" => ("endingWith", false),
        "notEndingWith" => ("endingWith", true),
        "containing" => ("containing", false),
        "notContaining" => ("containing", true),
        "greaterThan" => ("greaterThan", false),
        "greaterOrEqual" => ("greaterOrEqual", false),
        "lessThan" => ("lessThan", false),
        "lessOrEqual" => ("lessOrEqual", false),
        other => {
            return Err(CompileError::invalid_with_value(format!(
                "unknown refinement key: {other}"
            )))
        }
    };

    if value.is_null() {
        return match (base_op, negate) {
            ("being", false) => Ok(format!("{read} IS NULL")),
            ("being", true) => Ok(format!("{read} IS NOT NULL")),
            _ => Err(CompileError::invalid_with_value(format!(
                "`{op}` does not accept a null value"
            ))),
        };
    }

    match base_op {
        "being" => {
            let bound = params.bind(Value::try_from(value)?);
            let sql_op = if negate { "!=" } else { "=" };
            Ok(format!("{read} {sql_op} {bound}"))
        }
        "startingWith" | "endingWith" | "containing" => {
            let text = value.as_str().ok_or_else(|| {
                CompileError::invalid_with_value(format!("`{op}` requires a string value"))
            })?;
            let pattern = match base_op {
                "startingWith" => format!("{text}%"),
                "endingWith" => format!("%{text}"),
                _ => format!("%{text}%"),
            };
            let bound = params.bind(Value::String(pattern));
            let sql_op = if negate { "NOT LIKE" } else { "LIKE" };
            Ok(format!("{read} {sql_op} {bound}"))
        }
        "greaterThan" | "greaterOrEqual" | "lessThan" | "lessOrEqual" => {
            let sql_op = match base_op {
                "greaterThan" => ">",
                "greaterOrEqual" => ">=",
                "lessThan" => "<",
                _ => "<=",
            };
            let bound = params.bind(Value::try_from(value)?);
            Ok(format!("{read} {sql_op} {bound}"))
        }
        _ => unreachable!(),
    }
}

/// A nested object on a `link` field path: either the `{ id: <v> }`
/// short-cut (compares the stored foreign key directly) or a full filter on
/// the target model, compiled as a `SELECT "id" FROM <target> WHERE …`.
fn build_link_filter(
    models: &[Model],
    model: &Model,
    alias: &str,
    parent_alias: &str,
    path: &str,
    map: &serde_json::Map<String, Json>,
    params: &mut ParamBuilder,
) -> CompileResult<String> {
    let selector = get_field_from_model(model, path, alias, true)?.expect("should_throw");
    if selector.field.r#type != FieldType::Link {
        return Err(CompileError::invalid_with_value(format!(
            "`{path}` is not a link field"
        )));
    }

    if map.len() == 1 {
        if let Some(id_value) = map.get("id") {
            let bound = params.bind(Value::try_from(id_value)?);
            return Ok(format!("{} = {bound}", selector.read));
        }
    }

    let target_slug = selector.field.target.clone().ok_or_else(|| {
        CompileError::invalid_with_value(format!("`{path}` link field is missing a target"))
    })?;
    let target = get_model_by_slug(models, &target_slug)?;
    let nested = Json::Object(map.clone());
    let inner_where = build_with(models, target, "", parent_alias, &nested, params)?
        .unwrap_or_else(|| "(1=1)".to_string());
    let table = crate::ident::Ident::new(&target.table)?.to_sql();
    Ok(format!(
        "{} = (SELECT \"id\" FROM {table} WHERE {inner_where})",
        selector.read
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::ParamBuilder;
    use crate::model::{Field, FieldType, Model};
    use serde_json::json;

    fn account_model() -> Model {
        let mut m = Model::bare("account");
        m.table = "accounts".to_string();
        m.fields.push(Field::new("handle", FieldType::String));
        m
    }

    #[test]
    fn equality_shortcut() {
        let model = account_model();
        let mut params = ParamBuilder::new(false);
        let sql = build_with(&[], &model, "", "", &json!({"handle": {"being": "elaine"}}), &mut params)
            .unwrap()
            .unwrap();
        assert_eq!(sql, "(\"handle\" = ?1)");
        assert_eq!(params.params.len(), 1);
    }

    #[test]
    fn bare_scalar_is_equality() {
        let model = account_model();
        let mut params = ParamBuilder::new(false);
        let sql = build_with(&[], &model, "", "", &json!({"handle": "elaine"}), &mut params)
            .unwrap()
            .unwrap();
        assert_eq!(sql, "(\"handle\" = ?1)");
    }

    #[test]
    fn array_is_or_of_alternatives() {
        let model = account_model();
        let mut params = ParamBuilder::new(false);
        let sql = build_with(
            &[],
            &model,
            "",
            "",
            &json!({"handle": ["a", "b"]}),
            &mut params,
        )
        .unwrap()
        .unwrap();
        assert_eq!(sql, "((\"handle\" = ?1) OR (\"handle\" = ?2))");
    }

    #[test]
    fn null_refinement() {
        let model = account_model();
        let mut params = ParamBuilder::new(false);
        let sql = build_with(&[], &model, "", "", &json!({"handle": null}), &mut params)
            .unwrap()
            .unwrap();
        assert_eq!(sql, "(\"handle\" IS NULL)");
    }
}
