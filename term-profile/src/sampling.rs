//! Bounded row sampling and partition diagnostics.
//!
//! Tables within the row budget are materialized whole. Larger
//! single-partition tables keep their leading rows, which is
//! deterministic and costs one partial scan. Larger partitioned tables
//! take the leading rows of *every* partition so no single partition's
//! key range dominates the sample.

use arrow::array::{Array, ArrayRef, Float64Array};
use arrow::compute::{cast, concat_batches};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::SamplingConfig;
use crate::error::{ProfileError, ProfileResult};
use crate::table::{stringify_column, TableHandle};

/// How the sample was drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamplingStrategy {
    /// The whole table fits in the budget
    Full,
    /// Leading rows of a single partition
    Head,
    /// Leading rows of every partition
    PerPartition,
}

/// Rows to take from each partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingPlan {
    pub strategy: SamplingStrategy,
    pub rows_per_partition: Vec<usize>,
}

impl SamplingPlan {
    pub fn total_rows(&self) -> usize {
        self.rows_per_partition.iter().sum()
    }
}

/// Partition size balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionStats {
    pub partition_count: usize,
    pub mean_rows: f64,
    pub min_rows: usize,
    pub max_rows: usize,
    /// `(max - mean) / mean`, zero for empty input
    pub skew: f64,
    pub is_skewed: bool,
}

/// A materialized, immutable row subset owned by one profiling run.
#[derive(Debug, Clone)]
pub struct Sample {
    batch: RecordBatch,
    strategy: SamplingStrategy,
    source_rows: usize,
}

impl Sample {
    pub fn new(batch: RecordBatch, strategy: SamplingStrategy, source_rows: usize) -> Self {
        Self {
            batch,
            strategy,
            source_rows,
        }
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.num_rows() == 0
    }

    pub fn strategy(&self) -> SamplingStrategy {
        self.strategy
    }

    /// Row count of the table the sample was drawn from.
    pub fn source_rows(&self) -> usize {
        self.source_rows
    }

    /// True when the sample holds every row of the source.
    pub fn is_complete(&self) -> bool {
        self.num_rows() == self.source_rows
    }

    pub fn column(&self, name: &str) -> ProfileResult<&ArrayRef> {
        self.batch
            .column_by_name(name)
            .ok_or_else(|| ProfileError::column_not_found(name))
    }

    /// A column's values rendered as strings.
    pub fn string_values(&self, name: &str) -> ProfileResult<Vec<Option<String>>> {
        stringify_column(self.column(name)?.as_ref())
    }

    /// A column's values cast to `f64`; unparsable values become `None`.
    pub fn numeric_values(&self, name: &str) -> ProfileResult<Vec<Option<f64>>> {
        let casted = cast(self.column(name)?.as_ref(), &DataType::Float64)?;
        let floats = casted
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| ProfileError::internal("Float64 cast produced another type"))?;
        Ok(floats.iter().collect())
    }

    /// Up to `count` distinct row indices chosen with a seeded RNG, ascending.
    pub fn random_rows(&self, count: usize, seed: u64) -> Vec<usize> {
        let len = self.num_rows();
        let amount = count.min(len);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut rows = rand::seq::index::sample(&mut rng, len, amount).into_vec();
        rows.sort_unstable();
        rows
    }
}

/// Decides which rows to materialize and diagnoses partition balance.
#[derive(Debug, Clone, Default)]
pub struct SamplingEngine {
    config: SamplingConfig,
}

impl SamplingEngine {
    pub fn new(config: SamplingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SamplingConfig {
        &self.config
    }

    /// Plans the per-partition row counts for the given partition sizes.
    pub fn plan(&self, partition_sizes: &[usize]) -> SamplingPlan {
        let budget = self.config.sample_size;
        let total: usize = partition_sizes.iter().sum();

        if total <= budget {
            return SamplingPlan {
                strategy: SamplingStrategy::Full,
                rows_per_partition: partition_sizes.to_vec(),
            };
        }

        if partition_sizes.len() == 1 {
            return SamplingPlan {
                strategy: SamplingStrategy::Head,
                rows_per_partition: vec![budget],
            };
        }

        let partitions = partition_sizes.len();
        let even_share = budget / partitions;
        // The floor cannot push the total over budget
        let floor = self.config.min_rows_per_partition.min(even_share);
        let quota = floor.max(even_share);

        let mut rows: Vec<usize> = partition_sizes.iter().map(|&s| s.min(quota)).collect();
        let mut leftover = budget.saturating_sub(rows.iter().sum());

        // Hand unused quota to partitions that still have rows
        while leftover > 0 {
            let open: Vec<usize> = (0..partitions)
                .filter(|&i| rows[i] < partition_sizes[i])
                .collect();
            if open.is_empty() {
                break;
            }
            let share = (leftover / open.len()).max(1);
            for i in open {
                if leftover == 0 {
                    break;
                }
                let extra = share.min(partition_sizes[i] - rows[i]).min(leftover);
                rows[i] += extra;
                leftover -= extra;
            }
        }

        SamplingPlan {
            strategy: SamplingStrategy::PerPartition,
            rows_per_partition: rows,
        }
    }

    /// Materializes the sample for a table.
    #[instrument(skip(self, table), fields(table = %table.name()))]
    pub fn select_sample(&self, table: &TableHandle) -> ProfileResult<Sample> {
        let sizes = table.partition_sizes();
        let source_rows: usize = sizes.iter().sum();
        let plan = self.plan(&sizes);
        if table.log_config().log_sampling {
            debug!(
                strategy = ?plan.strategy,
                rows = plan.total_rows(),
                source_rows,
                partitions = sizes.len(),
                "Sampling plan"
            );
        }

        let batch = match plan.strategy {
            SamplingStrategy::Full => table.materialize_all()?,
            SamplingStrategy::Head => table.head(plan.total_rows())?,
            SamplingStrategy::PerPartition => {
                let mut batches = Vec::new();
                for (partition, &rows) in plan.rows_per_partition.iter().enumerate() {
                    batches.extend(table.partition_head(partition, rows)?);
                }
                concat_batches(&table.schema(), &batches)?
            }
        };

        Ok(Sample::new(batch, plan.strategy, source_rows))
    }

    /// Summarizes partition size balance.
    pub fn diagnose_partitions(&self, partition_sizes: &[usize]) -> PartitionStats {
        diagnose_partitions(partition_sizes, self.config.skew_threshold)
    }
}

/// Mean, extremes and skew of partition sizes. Empty or all-empty input
/// yields zero skew.
pub fn diagnose_partitions(partition_sizes: &[usize], skew_threshold: f64) -> PartitionStats {
    let count = partition_sizes.len();
    if count == 0 {
        return PartitionStats {
            partition_count: 0,
            mean_rows: 0.0,
            min_rows: 0,
            max_rows: 0,
            skew: 0.0,
            is_skewed: false,
        };
    }

    let total: usize = partition_sizes.iter().sum();
    let mean = total as f64 / count as f64;
    let min = partition_sizes.iter().copied().min().unwrap_or(0);
    let max = partition_sizes.iter().copied().max().unwrap_or(0);
    let skew = if mean > 0.0 {
        (max as f64 - mean) / mean
    } else {
        0.0
    };

    PartitionStats {
        partition_count: count,
        mean_rows: mean,
        min_rows: min,
        max_rows: max,
        skew,
        is_skewed: skew > skew_threshold,
    }
}
