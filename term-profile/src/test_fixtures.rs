//! In-memory tables and a stage harness for tests.
//!
//! The batches are small and fully deterministic so tests can assert exact
//! counts. Enable the `test-utils` feature to use them from integration
//! tests or downstream crates.

use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;

use crate::config::ProfileConfig;
use crate::error::ProfileResult;
use crate::pipeline::{ResultMap, StageContext, StageOutcome, StageResult};
use crate::sampling::Sample;
use crate::stages::{OverviewReport, OverviewStage};
use crate::table::TableHandle;

fn batch(fields: Vec<Field>, columns: Vec<ArrayRef>) -> RecordBatch {
    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
        .expect("fixture columns match their schema")
}

/// Ten customers with a constant `country`, two missing ages and one
/// missing email.
pub fn customers_batch() -> RecordBatch {
    batch(
        vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, false),
            Field::new("email", DataType::Utf8, true),
            Field::new("country", DataType::Utf8, false),
            Field::new("age", DataType::Int64, true),
            Field::new("active", DataType::Boolean, false),
        ],
        vec![
            Arc::new(Int64Array::from((1..=10).collect::<Vec<i64>>())),
            Arc::new(StringArray::from(vec![
                "Alice", "Bob", "Charlie", "David", "Eve", "Frank", "Grace", "Heidi", "Ivan",
                "Judy",
            ])),
            Arc::new(StringArray::from(vec![
                Some("alice@example.com"),
                Some("bob@example.com"),
                Some("charlie@example.com"),
                None,
                Some("eve@example.org"),
                Some("frank@example.com"),
                Some("grace@example.net"),
                Some("heidi@example.com"),
                Some("ivan@example.com"),
                Some("judy@example.com"),
            ])),
            Arc::new(StringArray::from(vec!["US"; 10])),
            Arc::new(Int64Array::from(vec![
                Some(34),
                Some(28),
                None,
                Some(45),
                Some(52),
                None,
                Some(23),
                Some(39),
                Some(61),
                Some(30),
            ])),
            Arc::new(BooleanArray::from(vec![
                true, false, true, true, false, true, false, true, true, false,
            ])),
        ],
    )
}

/// Ten complete rows: a unique text id, a constant `status`, a float score
/// and a three-valued category.
pub fn clean_batch() -> RecordBatch {
    batch(
        vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("status", DataType::Utf8, false),
            Field::new("score", DataType::Float64, false),
            Field::new("category", DataType::Utf8, false),
        ],
        vec![
            Arc::new(StringArray::from(
                (1..=10).map(|i| format!("row-{i:02}")).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(vec!["ok"; 10])),
            Arc::new(Float64Array::from(
                (0..10).map(|i| 50.0 + i as f64 * 2.5).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                (0..10).map(|i| ["a", "b", "c"][i % 3]).collect::<Vec<_>>(),
            )),
        ],
    )
}

/// Sixty orders. `discount` is exactly a tenth of `amount`, `channel` is
/// determined by `region`, the last two amounts are outliers and `note`
/// has six nulls, eight leading-space and five trailing-space values.
pub fn sales_batch() -> RecordBatch {
    const ROWS: usize = 60;
    let amount: Vec<f64> = (0..ROWS)
        .map(|i| match i {
            58 => 1000.0,
            59 => 1500.0,
            _ => 10.0 + 3.0 * i as f64,
        })
        .collect();
    let region: Vec<&str> = (0..ROWS).map(|i| ["north", "south", "west"][i % 3]).collect();
    let note: Vec<Option<&str>> = (0..ROWS)
        .map(|i| {
            if i % 10 == 0 {
                None
            } else if i % 7 == 1 {
                Some(" late")
            } else if i % 11 == 2 {
                Some("late ")
            } else {
                Some("ok")
            }
        })
        .collect();

    batch(
        vec![
            Field::new("order_id", DataType::Utf8, false),
            Field::new("region", DataType::Utf8, false),
            Field::new("channel", DataType::Utf8, false),
            Field::new("amount", DataType::Float64, false),
            Field::new("discount", DataType::Float64, false),
            Field::new("returned", DataType::Boolean, false),
            Field::new("note", DataType::Utf8, true),
        ],
        vec![
            Arc::new(StringArray::from(
                (0..ROWS).map(|i| format!("ORD-{i:04}")).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(region.clone())),
            Arc::new(StringArray::from(
                region
                    .iter()
                    .map(|r| if *r == "north" { "web" } else { "store" })
                    .collect::<Vec<_>>(),
            )),
            Arc::new(Float64Array::from(amount.clone())),
            Arc::new(Float64Array::from(
                amount.iter().map(|a| a * 0.1).collect::<Vec<_>>(),
            )),
            Arc::new(BooleanArray::from(
                (0..ROWS).map(|i| i % 4 == 0).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(note)),
        ],
    )
}

/// A single `id` column split into partitions of the given sizes, with ids
/// numbered sequentially across partitions.
pub fn partitioned_table(sizes: &[usize]) -> ProfileResult<TableHandle> {
    let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
    let mut next = 0i64;
    let mut partitions = Vec::with_capacity(sizes.len());
    for &size in sizes {
        if size == 0 {
            partitions.push(vec![]);
            continue;
        }
        let ids: Vec<i64> = (next..next + size as i64).collect();
        next += size as i64;
        let batch = RecordBatch::try_new(schema.clone(), vec![Arc::new(Int64Array::from(ids))])?;
        partitions.push(vec![batch]);
    }
    TableHandle::from_partitions("partitioned", schema, partitions)
}

/// Runs the overview once and builds stage contexts over its output.
pub struct StageHarness {
    pub table: TableHandle,
    pub config: ProfileConfig,
    pub overview: OverviewReport,
    pub sample: Sample,
    pub results: ResultMap,
}

impl StageHarness {
    pub async fn new(table: TableHandle) -> Self {
        Self::with_config(table, ProfileConfig::default()).await
    }

    pub async fn from_batch(name: &str, batch: RecordBatch) -> Self {
        let table = TableHandle::from_batch(name, batch).expect("fixture table registers");
        Self::new(table).await
    }

    pub async fn with_config(table: TableHandle, config: ProfileConfig) -> Self {
        let (overview, sample) = OverviewStage::new(config.clone())
            .run(&table)
            .await
            .expect("overview succeeds on fixture tables");
        Self {
            table,
            config,
            overview,
            sample,
            results: ResultMap::new(),
        }
    }

    pub fn context<'a>(&'a self, target: Option<&'a str>) -> StageContext<'a> {
        StageContext {
            table: &self.table,
            overview: &self.overview,
            sample: &self.sample,
            target,
            results: &self.results,
            config: &self.config,
        }
    }

    /// Records an earlier stage's outcome so later stages can read it.
    pub fn record(&mut self, stage: &str, outcome: StageOutcome) {
        self.results
            .push(StageResult {
                stage: stage.to_string(),
                outcome,
                duration_ms: 0,
            })
            .expect("stage recorded once");
    }
}
