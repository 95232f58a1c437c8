//! Profiling CSV files from disk with a file-based configuration.

use std::fmt::Write as _;
use std::fs;

use term_profile::prelude::*;
use term_profile::stages::insights::InsightCategory;

/// 120 orders: `total` tracks `units` exactly, `tier` is a three-level
/// category, `contact` holds emails, and two totals are extreme.
fn write_orders_csv(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let mut csv = String::from("order_ref,units,total,tier,contact\n");
    for i in 0..120 {
        let units = i + 1;
        let total = if i >= 118 { 50_000.0 } else { units as f64 * 4.0 };
        let tier = ["bronze", "silver", "gold"][i % 3];
        writeln!(csv, "R{i:05},{units},{total},{tier},user{i}@shop.example.com").unwrap();
    }
    let path = dir.path().join("orders.csv");
    fs::write(&path, csv).unwrap();
    path
}

#[tokio::test]
async fn test_profile_csv_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_orders_csv(&dir);

    let pipeline = Pipeline::builder()
        .without_tracing()
        .standard_stages()
        .build()
        .unwrap();
    let report = pipeline.run_csv(&path, Some("tier")).await.unwrap();

    assert_eq!(report.dataset_name, "orders.csv");
    let overview = report.overview().unwrap();
    assert_eq!(overview.dataset_snapshot.row_count, 120);
    assert_eq!(
        overview.descriptor("contact").unwrap().type_label,
        TypeLabel::Semantic(SemanticKind::Email)
    );
    assert_eq!(overview.descriptor("order_ref").unwrap().type_label, TypeLabel::UniqueId);
    assert_eq!(overview.descriptor("tier").unwrap().type_label, TypeLabel::Categorical);
    assert_eq!(overview.descriptor("units").unwrap().type_label, TypeLabel::Numeric);

    let outliers = report
        .payload("outliers")
        .and_then(StagePayload::as_outliers)
        .unwrap();
    assert_eq!(outliers.columns.get("total").unwrap().high_count, 2);

    let target = report
        .payload("target_analysis")
        .and_then(StagePayload::as_target_analysis)
        .unwrap();
    assert_eq!(target.target.class_balance.len(), 3);

    let interactions = report
        .payload("interactions")
        .and_then(StagePayload::as_interactions)
        .unwrap();
    assert_eq!(interactions.numeric.len(), 1);
    assert!(interactions.categorical.is_empty());

    let tests = report
        .payload("hypothesis_tests")
        .and_then(StagePayload::as_hypothesis_tests)
        .unwrap();
    assert!(tests.chi_squared_tests.is_empty());
    assert!(tests
        .mean_comparison_tests
        .iter()
        .any(|t| t.numeric_variable == "units" && t.categorical_variable == "tier" && t.groups == 3));

    let insights = report
        .payload("insights")
        .and_then(StagePayload::as_insights)
        .unwrap();
    assert!(insights
        .insights
        .iter()
        .any(|i| i.category == InsightCategory::RiskAndQuality));
    assert!(insights
        .insights
        .iter()
        .any(|i| i.category == InsightCategory::KeyDrivers));

    let recommendations = report
        .payload("recommendations")
        .and_then(StagePayload::as_recommendations)
        .unwrap();
    assert!(!recommendations.recommendations.is_empty());
}

#[tokio::test]
async fn test_config_file_drives_sampling() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_orders_csv(&dir);
    let config_path = dir.path().join("profile.json");
    fs::write(
        &config_path,
        r#"{ "sampling": { "sample_size": 40, "seed": 9 }, "preview_rows": 3 }"#,
    )
    .unwrap();

    let config = ProfileConfig::load(&config_path).unwrap();
    assert_eq!(config.sampling.sample_size, 40);
    assert_eq!(config.sampling.min_rows_per_partition, 10);

    let pipeline = Pipeline::builder()
        .config(config)
        .without_tracing()
        .standard_stages()
        .build()
        .unwrap();
    let report = pipeline.run_csv(&path, None).await.unwrap();
    let overview = report.overview().unwrap();

    assert!(overview.dataset_snapshot.sample_rows <= 40);
    assert_ne!(overview.dataset_snapshot.sampling_strategy, SamplingStrategy::Full);
    assert_eq!(overview.preview.head.len(), 3);
    assert_eq!(overview.dataset_snapshot.row_count, 120);
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("bad.json");
    fs::write(&config_path, r#"{ "sampling": { "sample_size": 0 } }"#).unwrap();

    let err = ProfileConfig::load(&config_path).unwrap_err();
    assert!(matches!(err, ProfileError::Configuration(_)));
}
