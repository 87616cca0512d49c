//! `including` (§4.4.3, second half): computed columns and sub-query JOINs.

use crate::compose::ParamBuilder;
use crate::error::{CompileError, CompileResult};
use crate::instructions::select::LoadedField;
use crate::instructions::with::build_with;
use crate::model::{get_model_by_slug, Model};
use crate::query::QueryBody;
use crate::symbol::Symbol;
use crate::value::Value;
use indexmap::IndexMap;
use serde_json::Value as Json;

/// The extra SELECT columns and JOIN clauses an `including` member adds.
#[derive(Default)]
pub struct IncludingPlan {
    pub extra_columns: Vec<String>,
    pub joins: Vec<String>,
    pub loaded_fields: Vec<LoadedField>,
}

pub fn build_including(
    models: &[Model],
    model: &Model,
    including: &IndexMap<String, Json>,
    params: &mut ParamBuilder,
) -> CompileResult<IncludingPlan> {
    let mut plan = IncludingPlan::default();
    let root_table = crate::ident::Ident::new(&model.table)?.to_sql();

    for (alias_name, value) in including {
        let symbol = Symbol::from_json(value)?;
        match symbol {
            Symbol::Literal(json) => {
                let bound = params.bind(Value::try_from(&json)?);
                plan.extra_columns
                    .push(format!("{bound} as \"{alias_name}\""));
                plan.loaded_fields.push(LoadedField {
                    mounting_path: alias_name.clone(),
                    select_sql: String::new(),
                });
            }
            Symbol::Expression(expr) => {
                let resolved = crate::symbol::resolve_field_tokens(&expr, "", &root_table, alias_name);
                plan.extra_columns
                    .push(format!("({resolved}) as \"{alias_name}\""));
                plan.loaded_fields.push(LoadedField {
                    mounting_path: alias_name.clone(),
                    select_sql: String::new(),
                });
            }
            Symbol::SubQuery(sub_query) => {
                let QueryBody::Dml {
                    model: target_slug,
                    instructions,
                } = &sub_query.body
                else {
                    return Err(CompileError::invalid_with_value(
                        "`including` sub-query must target a model",
                    ));
                };
                let target = get_model_by_slug(models, target_slug)?;
                let target_table = crate::ident::Ident::new(&target.table)?.to_sql();
                let join_alias = format!("including_{alias_name}");

                // A sub-query filtered by `id` returns at most one row and folds
                // directly into the parent record; anything else is a to-many
                // join whose rows are later folded into an array (§4.6 step 4).
                let is_many = !instructions
                    .as_ref()
                    .and_then(|i| i.with.as_ref())
                    .map(|w| w.get("id").is_some())
                    .unwrap_or(false);

                let where_sql = match instructions.as_ref().and_then(|i| i.with.as_ref()) {
                    Some(tree) => build_with(models, target, &join_alias, &root_table, tree, params)?,
                    None => None,
                };
                let on_clause = where_sql.unwrap_or_else(|| "(1=1)".to_string());
                plan.joins
                    .push(format!("LEFT JOIN {target_table} as {join_alias} ON {on_clause}"));

                let mount_prefix = if is_many {
                    format!("{alias_name}[0]")
                } else {
                    alias_name.clone()
                };
                for field in &target.fields {
                    let mounting_path = format!("{mount_prefix}.{}", field.slug);
                    plan.extra_columns.push(format!(
                        "{join_alias}.\"{}\" as \"{mounting_path}\"",
                        field.slug
                    ));
                    plan.loaded_fields.push(LoadedField {
                        mounting_path,
                        select_sql: String::new(),
                    });
                }
            }
        }
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Field, FieldType};
    use serde_json::json;

    #[test]
    fn literal_including_adds_bound_column() {
        let model = Model::bare("account");
        let mut including = IndexMap::new();
        including.insert("isActive".to_string(), json!(true));
        let mut params = ParamBuilder::new(false);
        let plan = build_including(&[], &model, &including, &mut params).unwrap();
        assert_eq!(plan.extra_columns, vec!["?1 as \"isActive\"".to_string()]);
    }

    #[test]
    fn sub_query_including_adds_join() {
        let mut account = Model::bare("account");
        account.table = "accounts".to_string();
        account.fields.push(Field::new("name", FieldType::String));

        let mut post = Model::bare("post");
        post.table = "posts".to_string();
        post.plural_slug = "posts".to_string();

        let models = vec![account.clone(), post];
        let mut including = IndexMap::new();
        including.insert(
            "author".to_string(),
            json!({"QUERY": {"get": {"account": {"with": {"id": {"EXPRESSION": "FIELD_PARENTauthor"}}}}}}),
        );
        let mut params = ParamBuilder::new(false);
        let plan = build_including(&models, &models[1], &including, &mut params).unwrap();
        assert_eq!(plan.joins.len(), 1);
        assert!(plan.joins[0].starts_with("LEFT JOIN \"accounts\" as including_author ON"));
    }
}
