//! Statement composer (C5): orchestrates the instruction handlers, picks the
//! SQL verb, and assembles the final statement text per §4.5's composition
//! order: `<verb> <columns> FROM <table> [<joins>] [SET] [VALUES] [WHERE]
//! [ORDER BY] [LIMIT] [RETURNING *]`.

use crate::clock::ClockSource;
use crate::ddl::transform_meta_query;
use crate::error::{CompileError, CompileResult};
use crate::idgen::RandomSource;
use crate::instructions::cursor::build_cursor_predicate;
use crate::instructions::including::build_including;
use crate::instructions::limit::resolve_limit;
use crate::instructions::order::build_order_by;
use crate::instructions::preset::apply_presets;
use crate::instructions::select::{resolve_selection, LoadedField, Selection};
use crate::instructions::to::build_to;
use crate::instructions::with::build_with;
use crate::model::{get_model_by_slug, Model};
use crate::query::{Instructions, Query, QueryBody, QueryKind};
use crate::value::Value;

/// One SQL statement ready for the driver: its text, its bound parameters
/// (empty when `inline_params = true`), and whether it produces output rows.
#[derive(Debug, Clone)]
pub struct Statement {
    pub statement: String,
    pub params: Vec<Value>,
    pub returning: bool,
}

/// Options controlling value/column rendering (§4.6 "Option semantics").
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionOptions {
    pub inline_params: bool,
    pub expand_columns: bool,
    pub inline_defaults: bool,
}

/// Accumulates bound parameters for one statement, or inlines them into the
/// SQL text directly when `inline` is set (§4.6's `inlineParams` option).
pub struct ParamBuilder {
    pub inline: bool,
    pub params: Vec<Value>,
}

impl ParamBuilder {
    pub fn new(inline: bool) -> Self {
        Self {
            inline,
            params: Vec::new(),
        }
    }

    /// Bind a plain scalar value, returning the text to splice into SQL.
    pub fn bind(&mut self, value: Value) -> String {
        if self.inline {
            value.render_inline()
        } else {
            self.params.push(value);
            format!("?{}", self.params.len())
        }
    }

    /// Bind a value known to be stored in a `json`-typed column, wrapping it
    /// in `json(...)` so SQLite recognises the stored value as JSON (§6).
    pub fn bind_json(&mut self, value: Value) -> String {
        if self.inline {
            format!("json({})", value.render_inline())
        } else {
            self.params.push(value);
            format!("json(?{})", self.params.len())
        }
    }
}

/// The full result of compiling one input query: dependency statements (run
/// first), the main statement (if any — DDL creating the root model itself
/// emits none), and the fields the main statement loads (for reshaping).
pub struct CompiledQuery {
    pub dependencies: Vec<Statement>,
    pub main: Option<Statement>,
    pub loaded_fields: Vec<LoadedField>,
    pub query_kind: QueryKind,
    pub model_slug: String,
    pub ordered_by: crate::query::OrderedBy,
    pub limited_to: Option<u32>,
    pub paging_backwards: bool,
    pub is_single_record: bool,
}

/// Compile one query, recursively compiling any embedded sub-queries.
///
/// `models` is mutated in place by DDL lowering so later queries in the same
/// batch observe earlier schema changes (§3 Lifecycle, §9 design note).
pub fn compile_query(
    query: &Query,
    models: &mut Vec<Model>,
    options: &TransactionOptions,
    random: &mut dyn RandomSource,
    clock: &mut dyn ClockSource,
) -> CompileResult<CompiledQuery> {
    match &query.body {
        QueryBody::Ddl(operation) => {
            let lowered = transform_meta_query(operation, models, random)?;
            let mut dependencies = lowered.dependencies;
            let (main, is_single_record) = match lowered.dml {
                Some(dml_query) => {
                    let mut compiled = compile_query(&dml_query, models, options, random, clock)?;
                    dependencies.append(&mut compiled.dependencies);
                    (compiled.main, compiled.is_single_record)
                }
                None => (None, true),
            };
            Ok(CompiledQuery {
                dependencies,
                main,
                loaded_fields: Vec::new(),
                query_kind: query.kind,
                model_slug: "model".to_string(),
                ordered_by: Default::default(),
                limited_to: None,
                paging_backwards: false,
                is_single_record,
            })
        }
        QueryBody::Dml { model, instructions } => {
            compile_dml(query.kind, model, instructions.clone(), models, options, random, clock)
        }
    }
}

fn compile_dml(
    kind: QueryKind,
    model_slug: &str,
    instructions: Option<Instructions>,
    models: &[Model],
    options: &TransactionOptions,
    random: &mut dyn RandomSource,
    clock: &mut dyn ClockSource,
) -> CompileResult<CompiledQuery> {
    let model = get_model_by_slug(models, model_slug)?;
    let mut instructions = apply_presets(model, instructions)?;

    // A query addresses its model by the singular or plural slug (§3); the
    // singular form is a single-record read/write, the plural form multi.
    let is_single_record =
        matches!(kind, QueryKind::Set | QueryKind::Add) || model_slug == model.slug;

    let mut params = ParamBuilder::new(options.inline_params);
    let mut dependencies = Vec::new();

    // The record id a `many`-link assignment's dependency statements bind
    // against: for `set` this is the caller's `with.id` filter value.
    let with_id_literal = instructions
        .as_ref()
        .and_then(|i| i.with.as_ref())
        .and_then(|w| w.get("id"))
        .cloned();

    // `to`/many-link expansion (C4 `to`) happens first: it may append
    // dependency statements and determines INSERT's VALUES or UPDATE's SET.
    let to_plan = match kind {
        QueryKind::Add | QueryKind::Set => {
            let instr = instructions.clone().unwrap_or_default();
            let to = instr.to.clone().ok_or_else(|| {
                CompileError::invalid_to_value("`to` is required for `set`/`add`")
            })?;
            if to.is_empty() {
                return Err(CompileError::invalid_to_value("`to` must not be empty"));
            }
            Some(build_to(
                kind,
                model,
                models,
                &to,
                with_id_literal.as_ref(),
                &mut params,
                options,
                random,
                clock,
            )?)
        }
        _ => None,
    };

    let selection = resolve_selection(
        model,
        instructions.as_ref().and_then(|i| i.selecting.as_deref()),
        kind,
    )?;

    let including_sql = match instructions.as_ref().and_then(|i| i.including.as_ref()) {
        Some(including) => Some(build_including(models, model, including, &mut params)?),
        None => None,
    };

    let with_sql = match instructions.as_ref().and_then(|i| i.with.as_ref()) {
        Some(tree) => build_with(models, model, "", "", tree, &mut params)?,
        None => None,
    };

    let (before, after) = instructions
        .as_ref()
        .map(|i| (i.before.clone(), i.after.clone()))
        .unwrap_or((None, None));
    if before.is_some() && after.is_some() {
        return Err(CompileError::mutually_exclusive("before", "after"));
    }
    if (before.is_some() || after.is_some()) && is_single_record {
        return Err(CompileError::invalid_before_or_after(
            "`before`/`after` is only valid on multi-record queries",
        ));
    }

    let mut ordered_by = instructions
        .as_ref()
        .map(|i| i.ordered_by.clone())
        .unwrap_or_default();

    let limited_to = instructions.as_ref().and_then(|i| i.limited_to);
    if limited_to.is_some() && !ordered_by.has_field("ronin.createdAt") {
        ordered_by.descending.push("ronin.createdAt".to_string());
    }

    let cursor_sql = match (&before, &after) {
        (Some(cursor), _) => Some(build_cursor_predicate(model, &ordered_by, cursor, true, &mut params)?),
        (None, Some(cursor)) => Some(build_cursor_predicate(model, &ordered_by, cursor, false, &mut params)?),
        (None, None) => None,
    };

    let where_sql = combine_where(with_sql, cursor_sql);

    let order_sql = build_order_by(model, &ordered_by)?;
    let limit_sql = resolve_limit(kind, is_single_record, limited_to);

    let wants_returning = !matches!(kind, QueryKind::Get | QueryKind::Count);
    let mut loaded_fields = selection.loaded_fields.clone();
    if let Some(plan) = &including_sql {
        loaded_fields.extend(plan.loaded_fields.clone());
    }

    let statement_text = match kind {
        QueryKind::Get => build_select(model, &selection, None, including_sql.as_ref(), where_sql.as_deref(), order_sql.as_deref(), limit_sql.as_deref()),
        QueryKind::Count => build_select(model, &selection, Some("COUNT(*)"), None, where_sql.as_deref(), None, None),
        QueryKind::Add => build_insert(model, &to_plan.as_ref().unwrap().insert_sql, wants_returning),
        QueryKind::Set => build_update(model, &to_plan.as_ref().unwrap().set_sql, where_sql.as_deref(), wants_returning),
        QueryKind::Remove => build_delete(model, where_sql.as_deref(), wants_returning),
        QueryKind::Create | QueryKind::Alter | QueryKind::Drop => unreachable!("DDL handled above"),
    };

    if let Some(plan) = &to_plan {
        dependencies.extend(plan.dependencies.clone());
    }

    let main = Statement {
        statement: statement_text,
        params: params.params,
        returning: wants_returning || matches!(kind, QueryKind::Get | QueryKind::Count),
    };

    Ok(CompiledQuery {
        dependencies,
        main: Some(main),
        loaded_fields,
        query_kind: kind,
        model_slug: model.slug.clone(),
        ordered_by,
        limited_to,
        paging_backwards: before.is_some(),
        is_single_record,
    })
}

fn combine_where(with_sql: Option<String>, cursor_sql: Option<String>) -> Option<String> {
    match (with_sql, cursor_sql) {
        (Some(w), Some(c)) => Some(format!("{w} AND {c}")),
        (Some(w), None) => Some(w),
        (None, Some(c)) => Some(c),
        (None, None) => None,
    }
}

fn build_select(
    model: &Model,
    selection: &Selection,
    aggregate: Option<&str>,
    including: Option<&crate::instructions::including::IncludingPlan>,
    where_sql: Option<&str>,
    order_sql: Option<&str>,
    limit_sql: Option<&str>,
) -> String {
    let table = crate::ident::Ident::new(&model.table).expect("validated table name");
    let mut columns = if let Some(agg) = aggregate {
        agg.to_string()
    } else if selection.explicit {
        selection
            .loaded_fields
            .iter()
            .map(|f| f.select_sql.clone())
            .collect::<Vec<_>>()
            .join(", ")
    } else {
        "*".to_string()
    };

    let mut sql = String::from("SELECT ");
    if let Some(plan) = including {
        if !plan.extra_columns.is_empty() {
            if columns == "*" {
                let star = crate::ident::Ident::new(&model.table).expect("validated table name");
                columns = format!("{star}.*");
            }
            columns = format!("{columns}, {}", plan.extra_columns.join(", "));
        }
    }
    sql.push_str(&columns);
    sql.push_str(" FROM ");
    sql.push_str(&table.to_string());
    if let Some(plan) = including {
        for join in &plan.joins {
            sql.push(' ');
            sql.push_str(join);
        }
    }
    if let Some(w) = where_sql {
        sql.push_str(" WHERE ");
        sql.push_str(w);
    }
    if let Some(o) = order_sql {
        sql.push(' ');
        sql.push_str(o);
    }
    if let Some(l) = limit_sql {
        sql.push(' ');
        sql.push_str(l);
    }
    sql
}

fn build_insert(model: &Model, values_sql: &str, returning: bool) -> String {
    let table = crate::ident::Ident::new(&model.table).expect("validated table name");
    let mut sql = format!("INSERT INTO {table} {values_sql}");
    if returning {
        sql.push_str(" RETURNING *");
    }
    sql
}

fn build_update(model: &Model, set_sql: &str, where_sql: Option<&str>, returning: bool) -> String {
    let table = crate::ident::Ident::new(&model.table).expect("validated table name");
    let mut sql = format!("UPDATE {table} SET {set_sql}");
    if let Some(w) = where_sql {
        sql.push_str(" WHERE ");
        sql.push_str(w);
    }
    if returning {
        sql.push_str(" RETURNING *");
    }
    sql
}

fn build_delete(model: &Model, where_sql: Option<&str>, returning: bool) -> String {
    let table = crate::ident::Ident::new(&model.table).expect("validated table name");
    let mut sql = format!("DELETE FROM {table}");
    if let Some(w) = where_sql {
        sql.push_str(" WHERE ");
        sql.push_str(w);
    }
    if returning {
        sql.push_str(" RETURNING *");
    }
    sql
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::idgen::SeededSource;
    use crate::model::{build_model_list, Field, FieldType};
    use serde_json::json;

    fn account_models() -> Vec<Model> {
        let mut m = Model::bare("account");
        m.fields.push(Field::new("handle", FieldType::String));
        let mut source = SeededSource::new(1);
        build_model_list(vec![m], &mut source).unwrap()
    }

    #[test]
    fn filter_by_equality_scenario() {
        let models = account_models();
        let query = Query::from_json(&json!({
            "get": { "account": { "with": { "handle": { "being": "elaine" } } } }
        }))
        .unwrap();
        let mut models_mut = models;
        let mut random = SeededSource::new(1);
        let mut clock = SystemClock;
        let options = TransactionOptions::default();
        let compiled = compile_query(&query, &mut models_mut, &options, &mut random, &mut clock).unwrap();
        let main = compiled.main.unwrap();
        assert_eq!(
            main.statement,
            "SELECT * FROM \"accounts\" WHERE (\"handle\" = ?1) LIMIT 1"
        );
        assert_eq!(main.params, vec![Value::String("elaine".to_string())]);
        assert!(main.returning);
    }

    #[test]
    fn count_scenario() {
        let models = account_models();
        let query = Query::from_json(&json!({ "count": { "accounts": null } })).unwrap();
        let mut models_mut = models;
        let mut random = SeededSource::new(1);
        let mut clock = SystemClock;
        let options = TransactionOptions::default();
        let compiled = compile_query(&query, &mut models_mut, &options, &mut random, &mut clock).unwrap();
        let main = compiled.main.unwrap();
        assert_eq!(main.statement, "SELECT COUNT(*) FROM \"accounts\"");
    }
}
