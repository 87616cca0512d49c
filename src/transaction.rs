//! Transaction facade (C6, §4.6): builds the defaulted model list, expands
//! `all`-pseudo-model queries, and compiles an ordered query batch against a
//! single mutable model list so later DDL is visible to later queries.

use crate::clock::ClockSource;
use crate::compose::{compile_query, CompiledQuery, Statement, TransactionOptions};
use crate::error::CompileResult;
use crate::idgen::RandomSource;
use crate::model::{build_model_list, FieldType, Model};
use crate::query::{Query, QueryBody, UsingPresets, ALL_MODEL_SLUG};
use crate::reshape::{format_results, ResultShape};
use serde_json::Value as Json;

/// One compiled slot in the batch: either a single query's compiled form, or
/// an `all`-expansion's per-model compiled forms (§4.6, result shape
/// `{ models: { <pluralSlug>: <result> } }`).
enum Slot {
    Single(CompiledQuery),
    All(Vec<(String, CompiledQuery)>),
}

/// A fully compiled query batch. Owns the defaulted model list and the
/// produced statements; reusable across any number of [`Transaction::format_results`] calls (§5).
pub struct Transaction {
    pub models: Vec<Model>,
    options: TransactionOptions,
    slots: Vec<Slot>,
}

impl Transaction {
    /// Compile `queries` against `models` (caller-supplied, minimally `{ slug }`
    /// each) under `options`. `random` supplies model/record id generation.
    pub fn new(
        queries: Vec<Query>,
        models: Vec<Model>,
        options: TransactionOptions,
        random: &mut dyn RandomSource,
        clock: &mut dyn ClockSource,
    ) -> CompileResult<Transaction> {
        let mut models = build_model_list(models, random)?;
        let mut slots = Vec::with_capacity(queries.len());

        for query in queries {
            match &query.body {
                QueryBody::Dml { model, instructions } if model == ALL_MODEL_SLUG => {
                    let restrict_to = instructions
                        .as_ref()
                        .and_then(|i| i.using.as_ref())
                        .and_then(|using| match using {
                            UsingPresets::List(list) if list.len() == 1 => Some(list[0].clone()),
                            _ => None,
                        });
                    // Each expanded sub-query addresses its model by the
                    // *plural* slug: `all` always reads every matching
                    // record, never a single one (§3 singular/plural rule).
                    let target_plural_slugs: Vec<String> = match &restrict_to {
                        Some(slug) => linked_model_slugs(&models, slug),
                        None => models
                            .iter()
                            .filter(|m| !m.is_system())
                            .map(|m| m.plural_slug.clone())
                            .collect(),
                    };

                    let mut compiled = Vec::with_capacity(target_plural_slugs.len());
                    for plural_slug in target_plural_slugs {
                        let sub = Query {
                            kind: query.kind,
                            body: QueryBody::Dml {
                                model: plural_slug.clone(),
                                instructions: instructions.clone(),
                            },
                        };
                        let result = compile_query(&sub, &mut models, &options, random, clock)?;
                        compiled.push((plural_slug, result));
                    }
                    slots.push(Slot::All(compiled));
                }
                _ => {
                    let result = compile_query(&query, &mut models, &options, random, clock)?;
                    slots.push(Slot::Single(result));
                }
            }
        }

        Ok(Transaction {
            models,
            options,
            slots,
        })
    }

    /// All statements in execution order: every slot's dependency statements
    /// first, then its main statement(s), preserving input query order.
    pub fn statements(&self) -> Vec<&Statement> {
        let mut out = Vec::new();
        for slot in &self.slots {
            match slot {
                Slot::Single(compiled) => push_compiled(compiled, &mut out),
                Slot::All(group) => {
                    for (_, compiled) in group {
                        push_compiled(compiled, &mut out);
                    }
                }
            }
        }
        out
    }

    /// Reshape the driver's per-statement row sets (same order as
    /// [`Transaction::statements`]) back into one result value per input query.
    pub fn format_results(&self, rows_by_statement: &[Vec<Json>]) -> CompileResult<Vec<Json>> {
        let mut cursor = 0usize;
        let mut outputs = Vec::with_capacity(self.slots.len());

        for slot in &self.slots {
            match slot {
                Slot::Single(compiled) => {
                    let (result, consumed) = self.format_one(compiled, &rows_by_statement[cursor..])?;
                    cursor += consumed;
                    outputs.push(result);
                }
                Slot::All(group) => {
                    let mut models_obj = serde_json::Map::new();
                    for (plural_slug, compiled) in group {
                        let (result, consumed) = self.format_one(compiled, &rows_by_statement[cursor..])?;
                        cursor += consumed;
                        models_obj.insert(plural_slug.clone(), result);
                    }
                    outputs.push(Json::Object(models_obj));
                }
            }
        }
        Ok(outputs)
    }

    /// Reshape a single compiled query's slice of row sets (dependencies
    /// first, main last), returning its result and how many it consumed.
    fn format_one(&self, compiled: &CompiledQuery, rows: &[Vec<Json>]) -> CompileResult<(Json, usize)> {
        let consumed = compiled.dependencies.len() + compiled.main.is_some() as usize;
        let main_rows = compiled
            .main
            .as_ref()
            .filter(|s| s.returning)
            .map(|_| rows[compiled.dependencies.len()].as_slice())
            .unwrap_or(&[]);

        let shape = ResultShape {
            kind: compiled.query_kind,
            is_single_record: compiled.is_single_record,
            loaded_fields: &compiled.loaded_fields,
            ordered_by: &compiled.ordered_by,
            limited_to: compiled.limited_to,
            paging_backwards: compiled.paging_backwards,
        };
        Ok((format_results(&shape, main_rows)?, consumed))
    }
}

fn push_compiled<'a>(compiled: &'a CompiledQuery, out: &mut Vec<&'a Statement>) {
    out.extend(compiled.dependencies.iter());
    if let Some(main) = &compiled.main {
        out.push(main);
    }
}

/// Models directly link-connected to `slug`, either direction (§4.6 `for`).
fn linked_model_slugs(models: &[Model], slug: &str) -> Vec<String> {
    let source = models.iter().find(|m| m.slug == slug || m.plural_slug == slug);
    let Some(source) = source else {
        return Vec::new();
    };
    models
        .iter()
        .filter(|m| !m.is_system() && m.slug != source.slug)
        .filter(|m| {
            m.fields
                .iter()
                .any(|f| f.r#type == FieldType::Link && f.target.as_deref() == Some(source.slug.as_str()))
                || source
                    .fields
                    .iter()
                    .any(|f| f.r#type == FieldType::Link && f.target.as_deref() == Some(m.slug.as_str()))
        })
        .map(|m| m.plural_slug.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::idgen::SeededSource;
    use crate::model::{Field, FieldType as FT};
    use serde_json::json;

    fn account_model() -> Model {
        let mut m = Model::bare("account");
        m.fields.push(Field::new("handle", FT::String));
        m
    }

    #[test]
    fn compiles_single_query_and_collects_statements() {
        let query = Query::from_json(&json!({
            "get": { "account": { "with": { "handle": { "being": "elaine" } } } }
        }))
        .unwrap();
        let mut random = SeededSource::new(1);
        let mut clock = SystemClock;
        let tx = Transaction::new(
            vec![query],
            vec![account_model()],
            TransactionOptions::default(),
            &mut random,
            &mut clock,
        )
        .unwrap();
        let statements = tx.statements();
        assert_eq!(statements.len(), 1);
        assert_eq!(
            statements[0].statement,
            "SELECT * FROM \"accounts\" WHERE (\"handle\" = ?1) LIMIT 1"
        );
    }

    #[test]
    fn expands_all_pseudo_model_into_one_query_per_model() {
        let query = Query::from_json(&json!({ "count": { "all": null } })).unwrap();
        let mut random = SeededSource::new(1);
        let mut clock = SystemClock;
        let tx = Transaction::new(
            vec![query],
            vec![account_model()],
            TransactionOptions::default(),
            &mut random,
            &mut clock,
        )
        .unwrap();
        let statements = tx.statements();
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].statement, "SELECT COUNT(*) FROM \"accounts\"");

        let out = tx.format_results(&[vec![json!([1])]]).unwrap();
        assert_eq!(out[0], json!({ "accounts": { "amount": 1 } }));
    }

    #[test]
    fn get_single_record_reshapes_to_record_key() {
        let query = Query::from_json(&json!({
            "get": { "account": { "with": { "handle": { "being": "elaine" } } } }
        }))
        .unwrap();
        let mut random = SeededSource::new(1);
        let mut clock = SystemClock;
        let tx = Transaction::new(
            vec![query],
            vec![account_model()],
            TransactionOptions::default(),
            &mut random,
            &mut clock,
        )
        .unwrap();
        let out = tx
            .format_results(&[vec![json!(["acc_1", "elaine"])]])
            .unwrap();
        assert_eq!(out[0]["record"]["id"], json!("acc_1"));
    }
}
