//! Benchmark query compilation at increasing `with`-filter and `orderedBy` width.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ronin_compiler::clock::SystemClock;
use ronin_compiler::compose::{compile_query, TransactionOptions};
use ronin_compiler::idgen::SeededSource;
use ronin_compiler::model::{build_model_list, Field, FieldType, Model};
use ronin_compiler::Query;
use serde_json::json;

fn account_models(n_fields: usize) -> Vec<Model> {
    let mut model = Model::bare("account");
    for i in 0..n_fields {
        model.fields.push(Field::new(format!("field{i}"), FieldType::String));
    }
    let mut source = SeededSource::new(1);
    build_model_list(vec![model], &mut source).unwrap()
}

fn filter_query(n_fields: usize) -> Query {
    let mut with = serde_json::Map::new();
    for i in 0..n_fields {
        with.insert(format!("field{i}"), json!({ "being": format!("value{i}") }));
    }
    Query::from_json(&json!({ "get": { "account": { "with": with } } })).unwrap()
}

fn bench_filter_width(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile/filter_width");

    for n in [1usize, 5, 20, 50] {
        let models = account_models(n);
        let query = filter_query(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &(models, query), |b, (models, query)| {
            b.iter(|| {
                let mut models = models.clone();
                let mut random = SeededSource::new(1);
                let mut clock = SystemClock;
                let options = TransactionOptions::default();
                black_box(compile_query(query, &mut models, &options, &mut random, &mut clock).unwrap());
            });
        });
    }

    group.finish();
}

fn bench_add_scenario(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile/add_single_record");
    let models = account_models(5);
    let mut to = serde_json::Map::new();
    for i in 0..5 {
        to.insert(format!("field{i}"), json!(format!("value{i}")));
    }
    let query = Query::from_json(&json!({ "add": { "account": { "to": to } } })).unwrap();

    group.bench_function("add", |b| {
        b.iter(|| {
            let mut models = models.clone();
            let mut random = SeededSource::new(1);
            let mut clock = SystemClock;
            let options = TransactionOptions::default();
            black_box(compile_query(&query, &mut models, &options, &mut random, &mut clock).unwrap());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_filter_width, bench_add_scenario);
criterion_main!(benches);
