//! Benchmarks for column classification, sample planning and the overview
//! stage.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use std::time::Duration;

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use term_profile::classifier::{ColumnClassifier, ColumnEvidence};
use term_profile::config::{ProfileConfig, SamplingConfig};
use term_profile::sampling::SamplingEngine;
use term_profile::stages::OverviewStage;
use term_profile::table::{DeclaredType, TableHandle};
use tokio::runtime::Runtime;

fn text_sample(rows: usize, make: impl Fn(usize) -> String) -> Vec<Option<String>> {
    (0..rows).map(|i| Some(make(i))).collect()
}

fn bench_classify(c: &mut Criterion) {
    let classifier = ColumnClassifier::default();
    let mut group = c.benchmark_group("classify");

    let emails = text_sample(100, |i| format!("user{i}@example.com"));
    let urls = text_sample(100, |i| format!("https://example.com/items/{i}"));
    let words = text_sample(100, |i| ["red", "green", "blue"][i % 3].to_string());
    let ids = text_sample(100, |i| format!("ID-{i:08}"));

    let cases = vec![
        ("email", DeclaredType::Text, 10_000u64, &emails),
        ("url", DeclaredType::Text, 10_000, &urls),
        ("categorical", DeclaredType::Text, 3, &words),
        ("identifier", DeclaredType::Text, 100_000, &ids),
        ("numeric", DeclaredType::Numeric, 5_000, &ids),
    ];

    for (name, declared, distinct, sample) in cases {
        group.bench_with_input(BenchmarkId::new("rule_table", name), sample, |b, sample| {
            b.iter(|| {
                classifier.classify(std::hint::black_box(&ColumnEvidence::new(
                    name, declared, distinct, 100_000, sample,
                )))
            });
        });
    }

    group.finish();
}

fn bench_sampling_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("sampling_plan");
    let engine = SamplingEngine::new(SamplingConfig::default());

    for partitions in [4usize, 64, 1024] {
        let sizes: Vec<usize> = (0..partitions).map(|i| 1_000 + (i * 7_919) % 90_000).collect();
        group.bench_with_input(
            BenchmarkId::new("partitions", partitions),
            &sizes,
            |b, sizes| b.iter(|| engine.plan(std::hint::black_box(sizes))),
        );
    }

    group.finish();
}

fn wide_table(rows: usize) -> TableHandle {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("segment", DataType::Utf8, false),
        Field::new("contact", DataType::Utf8, true),
        Field::new("value", DataType::Float64, true),
    ]));
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from((0..rows as i64).collect::<Vec<_>>())) as ArrayRef,
            Arc::new(StringArray::from(
                (0..rows).map(|i| ["a", "b", "c", "d"][i % 4]).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                (0..rows)
                    .map(|i| (i % 13 != 0).then(|| format!("user{i}@example.com")))
                    .collect::<Vec<_>>(),
            )),
            Arc::new(Float64Array::from(
                (0..rows)
                    .map(|i| (i % 17 != 0).then_some(i as f64 * 0.37))
                    .collect::<Vec<_>>(),
            )),
        ],
    )
    .unwrap();
    TableHandle::from_batch("bench", batch).unwrap()
}

fn bench_overview(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("overview");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(10);

    for rows in [1_000usize, 100_000] {
        let table = wide_table(rows);
        let stage = OverviewStage::new(ProfileConfig::default());
        group.bench_with_input(BenchmarkId::new("rows", rows), &table, |b, table| {
            b.iter(|| rt.block_on(stage.run(std::hint::black_box(table))));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_classify, bench_sampling_plan, bench_overview);
criterion_main!(benches);
