//! `to` (§4.4.2): field assignment, including `many`-kind link expansion.

use crate::clock::{format_timestamp, ClockSource};
use crate::compose::{ParamBuilder, Statement, TransactionOptions};
use crate::error::{CompileError, CompileResult};
use crate::idgen::{generate_record_id, RandomSource};
use crate::instructions::with::{build_with, compile_scalar_sub_query};
use crate::model::{associative_model_slug, get_model_by_slug, Field, Model};
use crate::query::QueryKind;
use crate::symbol::Symbol;
use crate::value::Value;
use indexmap::IndexMap;
use serde_json::Value as Json;

/// The SQL fragments `to` contributes to the main statement, plus the
/// dependency statements any `many`-kind link assignment expands into.
pub struct ToPlan {
    /// `(col1, col2, …) VALUES (…)` or `(col1, …) <SELECT …>`, spliced
    /// directly after `INSERT INTO <table>`.
    pub insert_sql: String,
    /// `col1 = val1, col2 = val2, …`, spliced directly after `SET`.
    pub set_sql: String,
    pub dependencies: Vec<Statement>,
}

pub fn build_to(
    kind: QueryKind,
    model: &Model,
    models: &[Model],
    to: &IndexMap<String, Json>,
    record_id: Option<&Json>,
    params: &mut ParamBuilder,
    options: &TransactionOptions,
    random: &mut dyn RandomSource,
    clock: &mut dyn ClockSource,
) -> CompileResult<ToPlan> {
    let mut scalar_entries: Vec<(String, Json)> = Vec::new();
    let mut link_entries: Vec<(&Field, &Json)> = Vec::new();

    for (path, value) in to {
        match model.field(path) {
            Some(field) if field.is_many_link() => link_entries.push((field, value)),
            _ => scalar_entries.push((path.clone(), value.clone())),
        }
    }

    let resolved_id = match kind {
        QueryKind::Add => Some(
            scalar_entries
                .iter()
                .find(|(path, _)| path == "id")
                .map(|(_, v)| v.clone())
                .unwrap_or_else(|| Json::String(generate_record_id(&model.id_prefix, random))),
        ),
        _ => record_id.cloned(),
    };

    let (insert_sql, set_sql) = match kind {
        QueryKind::Add => {
            scalar_entries.retain(|(path, _)| path != "id");
            scalar_entries.insert(0, ("id".to_string(), resolved_id.clone().expect("generated above")));
            if !scalar_entries.iter().any(|(p, _)| p == "ronin.createdAt") {
                let stamp = format_timestamp(clock.now());
                scalar_entries.push(("ronin.createdAt".to_string(), Json::String(stamp)));
            }
            if !scalar_entries.iter().any(|(p, _)| p == "ronin.updatedAt") {
                let stamp = format_timestamp(clock.now());
                scalar_entries.push(("ronin.updatedAt".to_string(), Json::String(stamp)));
            }
            (build_insert_clause(model, models, &scalar_entries, params)?, String::new())
        }
        QueryKind::Set => {
            let stamp = format_timestamp(clock.now());
            scalar_entries.push(("ronin.updatedAt".to_string(), Json::String(stamp)));
            (String::new(), build_set_clause(model, models, &scalar_entries, params)?)
        }
        _ => (String::new(), String::new()),
    };

    let mut dependencies = Vec::new();
    if !link_entries.is_empty() {
        let id_value = resolved_id.ok_or_else(|| {
            CompileError::invalid_to_value("a `many`-kind link assignment requires a known record id")
        })?;
        for (field, value) in link_entries {
            dependencies.extend(build_many_link_dependencies(
                models,
                model,
                field,
                value,
                &id_value,
                options,
                random,
                clock,
            )?);
        }
    }

    Ok(ToPlan {
        insert_sql,
        set_sql,
        dependencies,
    })
}

fn build_insert_clause(
    model: &Model,
    models: &[Model],
    entries: &[(String, Json)],
    params: &mut ParamBuilder,
) -> CompileResult<String> {
    let mut cols = Vec::with_capacity(entries.len());
    let mut vals = Vec::with_capacity(entries.len());
    for (path, value) in entries {
        let field = model
            .field(path)
            .ok_or_else(|| CompileError::field_not_found(&model.slug, path))?;
        cols.push(crate::ident::Ident::new(path)?.to_sql());
        vals.push(render_assigned_value(models, field, value, params)?);
    }
    Ok(format!("({}) VALUES ({})", cols.join(", "), vals.join(", ")))
}

fn build_set_clause(
    model: &Model,
    models: &[Model],
    entries: &[(String, Json)],
    params: &mut ParamBuilder,
) -> CompileResult<String> {
    let mut assignments = Vec::with_capacity(entries.len());
    for (path, value) in entries {
        let field = model
            .field(path)
            .ok_or_else(|| CompileError::field_not_found(&model.slug, path))?;
        let col = crate::ident::Ident::new(path)?.to_sql();
        let rendered = render_assigned_value(models, field, value, params)?;
        assignments.push(format!("{col} = {rendered}"));
    }
    Ok(assignments.join(", "))
}

fn render_assigned_value(
    models: &[Model],
    field: &Field,
    value: &Json,
    params: &mut ParamBuilder,
) -> CompileResult<String> {
    match Symbol::from_json(value)? {
        Symbol::Literal(json) => {
            let bound = Value::try_from(&json)?;
            Ok(if field.r#type.is_json_like() {
                params.bind_json(bound)
            } else {
                params.bind(bound)
            })
        }
        Symbol::Expression(expr) => Ok(crate::symbol::resolve_field_tokens(&expr, "", "", &field.slug)),
        Symbol::SubQuery(sub_query) => {
            let sub_sql = compile_scalar_sub_query(models, &sub_query, "", params)?;
            Ok(format!("({sub_sql})"))
        }
    }
}

/// Resolve a `many`-link target element to a `target` column value: a bare
/// id binds directly, an object compiles into a correlated sub-query.
fn resolve_link_target(
    models: &[Model],
    target_slug: &str,
    item: &Json,
    params: &mut ParamBuilder,
) -> CompileResult<String> {
    let target = get_model_by_slug(models, target_slug)?;
    match item {
        Json::Object(_) => {
            let where_sql = build_with(models, target, "", "", item, params)?
                .unwrap_or_else(|| "(1=1)".to_string());
            let table = crate::ident::Ident::new(&target.table)?.to_sql();
            Ok(format!("(SELECT \"id\" FROM {table} WHERE {where_sql} LIMIT 1)"))
        }
        scalar => Ok(params.bind(Value::try_from(scalar)?)),
    }
}

fn build_many_link_dependencies(
    models: &[Model],
    model: &Model,
    field: &Field,
    value: &Json,
    source_id: &Json,
    options: &TransactionOptions,
    random: &mut dyn RandomSource,
    clock: &mut dyn ClockSource,
) -> CompileResult<Vec<Statement>> {
    let assoc_slug = associative_model_slug(&model.slug, &field.slug);
    let assoc = get_model_by_slug(models, &assoc_slug)?;
    let target_slug = field
        .target
        .clone()
        .ok_or_else(|| CompileError::invalid_to_value("many-kind link field is missing a target"))?;
    let assoc_table = crate::ident::Ident::new(&assoc.table)?.to_sql();

    let mut statements = Vec::new();

    let insert_one = |item: &Json,
                      statements: &mut Vec<Statement>,
                      random: &mut dyn RandomSource,
                      clock: &mut dyn ClockSource|
     -> CompileResult<()> {
        let mut params = ParamBuilder::new(options.inline_params);
        let source_bound = params.bind(Value::try_from(source_id)?);
        let target_expr = resolve_link_target(models, &target_slug, item, &mut params)?;
        let id_bound = params.bind(Value::String(generate_record_id(&assoc.id_prefix, random)));
        let created_bound = params.bind(Value::String(format_timestamp(clock.now())));
        let updated_bound = params.bind(Value::String(format_timestamp(clock.now())));
        statements.push(Statement {
            statement: format!(
                "INSERT INTO {assoc_table} (\"source\",\"target\",\"id\",\"ronin.createdAt\",\"ronin.updatedAt\") VALUES ({source_bound},{target_expr},{id_bound},{created_bound},{updated_bound})"
            ),
            params: params.params,
            returning: false,
        });
        Ok(())
    };

    let delete_one = |item: &Json,
                      statements: &mut Vec<Statement>|
     -> CompileResult<()> {
        let mut params = ParamBuilder::new(options.inline_params);
        let source_bound = params.bind(Value::try_from(source_id)?);
        let target_expr = resolve_link_target(models, &target_slug, item, &mut params)?;
        statements.push(Statement {
            statement: format!(
                "DELETE FROM {assoc_table} WHERE \"source\" = {source_bound} AND \"target\" = {target_expr}"
            ),
            params: params.params,
            returning: false,
        });
        Ok(())
    };

    match value {
        Json::Array(items) => {
            let mut params = ParamBuilder::new(options.inline_params);
            let source_bound = params.bind(Value::try_from(source_id)?);
            statements.push(Statement {
                statement: format!("DELETE FROM {assoc_table} WHERE (\"source\" = {source_bound})"),
                params: params.params,
                returning: false,
            });
            for item in items {
                insert_one(item, &mut statements, random, clock)?;
            }
        }
        Json::Object(map) if map.len() == 1 && map.contains_key("containing") => {
            let items = map["containing"].as_array().ok_or_else(|| {
                CompileError::invalid_to_value("`containing` must be an array")
            })?;
            for item in items {
                insert_one(item, &mut statements, random, clock)?;
            }
        }
        Json::Object(map) if map.len() == 1 && map.contains_key("notContaining") => {
            let items = map["notContaining"].as_array().ok_or_else(|| {
                CompileError::invalid_to_value("`notContaining` must be an array")
            })?;
            for item in items {
                delete_one(item, &mut statements)?;
            }
        }
        _ => {
            return Err(CompileError::invalid_to_value(format!(
                "`{}` must be an array, `{{containing:...}}`, or `{{notContaining:...}}`",
                field.slug
            )))
        }
    }

    Ok(statements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::idgen::SeededSource;
    use crate::model::{build_model_list, FieldType, LinkKind};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn fixed_clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2022, 11, 4, 15, 19, 53).unwrap())
    }

    fn post_comment_models() -> Vec<Model> {
        let mut post = Model::bare("post");
        post.fields.push(Field::new("title", FieldType::String));
        let mut comments = Field::new("comments", FieldType::Link);
        comments.kind = Some(LinkKind::Many);
        comments.target = Some("comment".to_string());
        post.fields.push(comments);

        let mut comment = Model::bare("comment");
        comment.fields.push(Field::new("content", FieldType::String));

        let mut source = SeededSource::new(1);
        build_model_list(vec![post, comment], &mut source).unwrap()
    }

    #[test]
    fn set_with_bare_array_emits_delete_then_insert() {
        let models = post_comment_models();
        let post = models.iter().find(|m| m.slug == "post").unwrap();
        let mut to = IndexMap::new();
        to.insert("comments".to_string(), json!([{"content": "Great post!"}]));

        let mut params = ParamBuilder::new(false);
        let mut random = SeededSource::new(1);
        let mut clock = fixed_clock();
        let options = TransactionOptions::default();
        let plan = build_to(
            QueryKind::Set,
            post,
            &models,
            &to,
            Some(&json!("pos_1")),
            &mut params,
            &options,
            &mut random,
            &mut clock,
        )
        .unwrap();

        assert_eq!(plan.dependencies.len(), 2);
        assert!(plan.dependencies[0].statement.starts_with("DELETE FROM"));
        assert!(plan.dependencies[1].statement.starts_with("INSERT INTO"));
        assert_eq!(plan.set_sql, "\"ronin.updatedAt\" = ?1");
    }

    #[test]
    fn add_generates_id_and_timestamps() {
        let models = post_comment_models();
        let comment = models.iter().find(|m| m.slug == "comment").unwrap();
        let mut to = IndexMap::new();
        to.insert("content".to_string(), json!("hi"));

        let mut params = ParamBuilder::new(false);
        let mut random = SeededSource::new(1);
        let mut clock = fixed_clock();
        let options = TransactionOptions::default();
        let plan = build_to(
            QueryKind::Add,
            comment,
            &models,
            &to,
            None,
            &mut params,
            &options,
            &mut random,
            &mut clock,
        )
        .unwrap();

        assert!(plan.insert_sql.starts_with("(\"id\", \"content\", \"ronin.createdAt\", \"ronin.updatedAt\")"));
        assert_eq!(params.params.len(), 4);
    }
}
