//! End-to-end scenarios against the public API (§8): preset merge, DDL create,
//! and the no-leakage / join-fold invariants.

use chrono::{TimeZone, Utc};
use ronin_compiler::clock::{FixedClock, SystemClock};
use ronin_compiler::compose::{compile_query, TransactionOptions};
use ronin_compiler::idgen::SeededSource;
use ronin_compiler::model::{build_model_list, Field, FieldType, Model, Preset};
use ronin_compiler::value::Value;
use ronin_compiler::Query;
use serde_json::json;

fn fixed_clock() -> FixedClock {
    FixedClock(Utc.with_ymd_and_hms(2022, 11, 4, 15, 19, 53).unwrap())
}

/// Scenario 4: preset merge with an existing filter.
///
/// `get member { with: { account: 'acc_1' }, using: ['specificTeam'] }` where
/// preset `specificTeam` sets `with.team = 'tea_1'`.
#[test]
fn preset_merges_with_existing_filter() {
    let mut member = Model::bare("member");
    member.fields.push(Field::new("account", FieldType::String));
    member.fields.push(Field::new("team", FieldType::String));
    member.presets.push(Preset {
        slug: "specificTeam".to_string(),
        instructions: json!({ "with": { "team": "tea_1" } }),
    });

    let mut source = SeededSource::new(7);
    let mut models = build_model_list(vec![member], &mut source).unwrap();

    let query = Query::from_json(&json!({
        "get": { "member": { "with": { "account": "acc_1" }, "using": ["specificTeam"] } }
    }))
    .unwrap();

    let options = TransactionOptions::default();
    let mut clock = SystemClock;
    let compiled = compile_query(&query, &mut models, &options, &mut source, &mut clock).unwrap();
    let main = compiled.main.unwrap();

    assert_eq!(
        main.statement,
        "SELECT * FROM \"members\" WHERE (\"team\" = ?1 AND \"account\" = ?2) LIMIT 1"
    );
    assert_eq!(
        main.params,
        vec![Value::String("tea_1".to_string()), Value::String("acc_1".to_string())]
    );
}

/// Scenario 5: DDL lowering for `create model`.
#[test]
fn create_model_lowers_to_table_and_schema_insert() {
    let mut source = SeededSource::new(3);
    let mut models = build_model_list(Vec::new(), &mut source).unwrap();

    let query = Query::from_json(&json!({
        "create": {
            "model": {
                "slug": "account",
                "fields": [{ "slug": "activeAt", "type": "date" }]
            }
        }
    }))
    .unwrap();

    let options = TransactionOptions::default();
    let mut clock = SystemClock;
    let compiled = compile_query(&query, &mut models, &options, &mut source, &mut clock).unwrap();

    assert!(!compiled.dependencies.is_empty());
    let create_table = &compiled.dependencies[0].statement;
    assert!(create_table.starts_with("CREATE TABLE \"accounts\""));
    assert!(create_table.contains("\"activeAt\""));

    let main = compiled.main.expect("create emits a schema insert");
    assert!(main.statement.starts_with("INSERT INTO \"ronin_schema\""));

    // the next query in the same batch observes the new model
    let follow_up = Query::from_json(&json!({
        "get": { "account": { "with": { "handle": { "being": "x" } } } }
    }))
    .unwrap();
    let err = compile_query(&follow_up, &mut models, &options, &mut source, &mut clock).unwrap_err();
    assert!(err.to_string().contains("handle"), "handle isn't a field on the freshly created model");

    let get_by_id = Query::from_json(&json!({ "count": { "accounts": null } })).unwrap();
    let compiled_count = compile_query(&get_by_id, &mut models, &options, &mut source, &mut clock).unwrap();
    assert_eq!(
        compiled_count.main.unwrap().statement,
        "SELECT COUNT(*) FROM \"accounts\""
    );
}

/// §8 universal invariant: with `inlineParams=false`, no user-provided string
/// value appears literally in the statement text.
#[test]
fn no_leakage_when_params_not_inlined() {
    let mut account = Model::bare("account");
    account.fields.push(Field::new("handle", FieldType::String));
    let mut source = SeededSource::new(9);
    let mut models = build_model_list(vec![account], &mut source).unwrap();

    let secret = "super-secret-handle-value";
    let query = Query::from_json(&json!({
        "get": { "account": { "with": { "handle": { "being": secret } } } }
    }))
    .unwrap();

    let options = TransactionOptions { inline_params: false, ..Default::default() };
    let mut clock = SystemClock;
    let compiled = compile_query(&query, &mut models, &options, &mut source, &mut clock).unwrap();
    let main = compiled.main.unwrap();

    assert!(!main.statement.contains(secret));
    assert!(main.params.contains(&Value::String(secret.to_string())));
}

/// §8 universal invariant: compiling the same query twice (fresh model lists,
/// seeded RNG) produces byte-identical statements and params.
#[test]
fn compilation_is_deterministic() {
    let make_models = || {
        let mut account = Model::bare("account");
        account.fields.push(Field::new("handle", FieldType::String));
        let mut source = SeededSource::new(42);
        build_model_list(vec![account], &mut source).unwrap()
    };

    let query = Query::from_json(&json!({
        "get": { "account": { "with": { "handle": { "being": "elaine" } } } }
    }))
    .unwrap();
    let options = TransactionOptions::default();

    let mut models_a = make_models();
    let mut random_a = SeededSource::new(42);
    let mut clock_a = SystemClock;
    let a = compile_query(&query, &mut models_a, &options, &mut random_a, &mut clock_a).unwrap();

    let mut models_b = make_models();
    let mut random_b = SeededSource::new(42);
    let mut clock_b = SystemClock;
    let b = compile_query(&query, &mut models_b, &options, &mut random_b, &mut clock_b).unwrap();

    assert_eq!(a.main.as_ref().unwrap().statement, b.main.as_ref().unwrap().statement);
    assert_eq!(a.main.unwrap().params, b.main.unwrap().params);
}

/// Same invariant for an `add`, which stamps `ronin.createdAt`/`updatedAt`
/// from the injected clock rather than the system clock (§9) — this is the
/// case a `get`-only check can't catch.
#[test]
fn add_compilation_is_deterministic_under_a_fixed_clock() {
    let make_models = || {
        let mut account = Model::bare("account");
        account.fields.push(Field::new("handle", FieldType::String));
        let mut source = SeededSource::new(42);
        build_model_list(vec![account], &mut source).unwrap()
    };

    let query = Query::from_json(&json!({
        "add": { "account": { "to": { "handle": "elaine" } } }
    }))
    .unwrap();
    let options = TransactionOptions::default();

    let mut models_a = make_models();
    let mut random_a = SeededSource::new(42);
    let mut clock_a = fixed_clock();
    let a = compile_query(&query, &mut models_a, &options, &mut random_a, &mut clock_a).unwrap();

    let mut models_b = make_models();
    let mut random_b = SeededSource::new(42);
    let mut clock_b = fixed_clock();
    let b = compile_query(&query, &mut models_b, &options, &mut random_b, &mut clock_b).unwrap();

    assert_eq!(a.main.as_ref().unwrap().statement, b.main.as_ref().unwrap().statement);
    assert_eq!(a.main.unwrap().params, b.main.unwrap().params);
}
