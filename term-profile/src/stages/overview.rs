//! The overview stage: dataset snapshot, column classification and
//! structural checks.
//!
//! Every other stage reads the overview's column descriptors, so the
//! pipeline aborts when this stage fails. Aggregate counts come from SQL
//! over the whole table; anything needing row-level inspection (semantic
//! classification, string lengths, previews, composite keys) uses the
//! run's [`Sample`].

use std::collections::BTreeMap;

use arrow::datatypes::DataType;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use super::structural::{self, Alert, StructuralReport};
use crate::classifier::{ColumnClassifier, ColumnEvidence, TypeLabel};
use crate::config::ProfileConfig;
use crate::error::{ErrorContext, ProfileResult};
use crate::health::{HealthInputs, HealthScore, HealthScorer};
use crate::sampling::{PartitionStats, Sample, SamplingEngine, SamplingStrategy};
use crate::stats::{self, round_to};
use crate::table::{DeclaredType, TableHandle};

/// Rows hashed into the dataset fingerprint.
const FINGERPRINT_ROWS: usize = 100;
const TOP_MEMORY_COLUMNS: usize = 5;

/// Dataset-level counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSnapshot {
    pub row_count: u64,
    pub column_count: u64,
    pub total_cells: u64,
    pub memory_bytes: u64,
    pub memory_mb: f64,
    pub missing_cell_count: u64,
    pub missing_pct: f64,
    pub duplicate_row_count: u64,
    pub duplicate_pct: f64,
    pub density_pct: f64,
    pub partition_count: usize,
    pub partition_stats: PartitionStats,
    pub sample_rows: usize,
    pub sampling_strategy: SamplingStrategy,
    /// SHA-256 over the column names and leading sample rows
    pub fingerprint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub min: String,
    pub max: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringLengthStats {
    pub min: usize,
    pub max: usize,
    pub mean: f64,
}

/// Coarse shape of a numeric distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistributionShape {
    Unknown,
    #[serde(rename = "Normal (Gaussian)")]
    Normal,
    #[serde(rename = "Log-Normal")]
    LogNormal,
    #[serde(rename = "Skewed (Right)")]
    SkewedRight,
    #[serde(rename = "Skewed (Left)")]
    SkewedLeft,
    #[serde(rename = "Non-Normal")]
    NonNormal,
}

/// Everything later stages know about one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub declared_dtype: DeclaredType,
    pub physical_type: String,
    pub type_label: TypeLabel,
    pub distinct_count: u64,
    pub null_count: u64,
    pub memory_bytes: u64,
    pub date_range: Option<DateRange>,
    pub string_length_stats: Option<StringLengthStats>,
    pub distribution_shape: Option<DistributionShape>,
}

/// Head, tail and random rows of the sample, rendered as strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preview {
    pub columns: Vec<String>,
    pub head: Vec<Vec<Option<String>>>,
    pub tail: Vec<Vec<Option<String>>>,
    pub random: Vec<Vec<Option<String>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverviewReport {
    pub dataset_snapshot: DatasetSnapshot,
    pub column_descriptors: Vec<ColumnDescriptor>,
    /// Type label -> number of columns
    pub variable_types: BTreeMap<String, usize>,
    pub structural: StructuralReport,
    pub alerts: Vec<Alert>,
    pub preview: Preview,
    /// Preliminary score without anomaly data
    pub health: HealthScore,
}

impl OverviewReport {
    pub fn descriptor(&self, column: &str) -> Option<&ColumnDescriptor> {
        self.column_descriptors.iter().find(|d| d.name == column)
    }

    /// Descriptors whose label satisfies the predicate, in column order.
    pub fn columns_where<F>(&self, predicate: F) -> Vec<&ColumnDescriptor>
    where
        F: Fn(&TypeLabel) -> bool,
    {
        self.column_descriptors
            .iter()
            .filter(|d| predicate(&d.type_label))
            .collect()
    }

    pub fn numeric_columns(&self) -> Vec<&ColumnDescriptor> {
        self.columns_where(TypeLabel::is_numeric)
    }
}

/// Classifies a numeric distribution from its values.
pub fn distribution_shape(values: &[f64], min_values: usize) -> DistributionShape {
    if values.len() < min_values {
        return DistributionShape::Unknown;
    }
    let is_normal = |v: &[f64]| stats::jarque_bera(v).is_some_and(|(_, p)| p > 0.05);

    if is_normal(values) {
        return DistributionShape::Normal;
    }
    if values.iter().all(|&v| v > 0.0) {
        let logs: Vec<f64> = values.iter().map(|v| v.ln()).collect();
        if is_normal(&logs) {
            return DistributionShape::LogNormal;
        }
    }
    match stats::skewness(values) {
        Some(skew) if skew > 1.0 => DistributionShape::SkewedRight,
        Some(skew) if skew < -1.0 => DistributionShape::SkewedLeft,
        _ => DistributionShape::NonNormal,
    }
}

fn string_length_stats(values: &[Option<String>]) -> Option<StringLengthStats> {
    let lengths: Vec<usize> = values.iter().flatten().map(|v| v.chars().count()).collect();
    let min = *lengths.iter().min()?;
    let max = *lengths.iter().max()?;
    let mean = lengths.iter().sum::<usize>() as f64 / lengths.len() as f64;
    Some(StringLengthStats {
        min,
        max,
        mean: round_to(mean, 2),
    })
}

fn fingerprint(columns: &[String], values: &[Vec<Option<String>>]) -> String {
    let mut hasher = Sha256::new();
    for name in columns {
        hasher.update(name.as_bytes());
        hasher.update([0x1f]);
    }
    let rows = values.first().map_or(0, Vec::len).min(FINGERPRINT_ROWS);
    for row in 0..rows {
        hasher.update([0x1e]);
        for column in values {
            if let Some(value) = &column[row] {
                hasher.update(value.as_bytes());
            }
            hasher.update([0x1f]);
        }
    }
    hex::encode(hasher.finalize())
}

fn preview_rows(values: &[Vec<Option<String>>], rows: &[usize]) -> Vec<Vec<Option<String>>> {
    rows.iter()
        .map(|&r| values.iter().map(|column| column[r].clone()).collect())
        .collect()
}

fn pct(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round_to(part as f64 / whole as f64 * 100.0, 2)
    }
}

/// The mandatory first stage.
#[derive(Debug, Clone)]
pub struct OverviewStage {
    config: ProfileConfig,
    classifier: ColumnClassifier,
    sampling: SamplingEngine,
}

impl OverviewStage {
    pub fn new(config: ProfileConfig) -> Self {
        Self {
            classifier: ColumnClassifier::new(config.classifier.clone()),
            sampling: SamplingEngine::new(config.sampling.clone()),
            config,
        }
    }

    /// Builds the overview and the run's sample.
    #[instrument(skip(self, table), fields(table = %table.name()))]
    pub async fn run(&self, table: &TableHandle) -> ProfileResult<(OverviewReport, Sample)> {
        let row_count = table.row_count() as u64;
        let column_count = table.column_count() as u64;
        let names = table.column_names();
        let schema = table.schema();

        let counts = table.column_counts().await.context("column counts")?;
        let duplicate_row_count = table
            .duplicate_row_count()
            .await
            .context("duplicate rows")?;
        let memory = table.memory_bytes_per_column();

        let sample = self.sampling.select_sample(table)?;
        let partition_stats = self.sampling.diagnose_partitions(&table.partition_sizes());
        if table.log_config().log_sampling {
            debug!(
                sample_rows = sample.num_rows(),
                strategy = ?sample.strategy(),
                skew = partition_stats.skew,
                "Sample selected"
            );
        }

        let mut values = Vec::with_capacity(names.len());
        for name in &names {
            values.push(sample.string_values(name)?);
        }

        let mut descriptors = Vec::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            let field = schema.field(idx);
            let declared = DeclaredType::from_arrow(field.data_type());
            let column_counts = &counts[idx];
            let evidence = ColumnEvidence::new(
                name,
                declared,
                column_counts.distinct,
                row_count,
                &values[idx],
            );
            let (rule, type_label) = self.classifier.explain(&evidence);
            debug!(column = %name, label = %type_label, rule, "Classified column");

            let date_range = if type_label == TypeLabel::Datetime {
                table
                    .min_max_strings(name)
                    .await?
                    .map(|(min, max)| DateRange { min, max })
            } else {
                None
            };
            let string_length_stats = if declared.is_text() {
                string_length_stats(&values[idx])
            } else {
                None
            };
            let distribution_shape = if type_label.is_numeric()
                && column_counts.distinct > self.config.distribution_min_distinct
            {
                let numeric: Vec<f64> = sample
                    .numeric_values(name)?
                    .into_iter()
                    .flatten()
                    .filter(|v| v.is_finite())
                    .collect();
                Some(distribution_shape(
                    &numeric,
                    self.config.distribution_min_distinct as usize,
                ))
            } else {
                None
            };

            descriptors.push(ColumnDescriptor {
                name: name.clone(),
                declared_dtype: declared,
                physical_type: field.data_type().to_string(),
                type_label,
                distinct_count: column_counts.distinct,
                null_count: column_counts.nulls,
                memory_bytes: memory[idx],
                date_range,
                string_length_stats,
                distribution_shape,
            });
        }

        let total_cells = row_count * column_count;
        let missing_cell_count: u64 = descriptors.iter().map(|d| d.null_count).sum();
        let memory_bytes: u64 = memory.iter().sum();
        let missing_pct = pct(missing_cell_count, total_cells);
        let duplicate_pct = pct(duplicate_row_count, row_count);

        let mut variable_types = BTreeMap::new();
        for descriptor in &descriptors {
            *variable_types
                .entry(descriptor.type_label.to_string())
                .or_insert(0) += 1;
        }

        let mut int_ranges = Vec::with_capacity(descriptors.len());
        for (idx, name) in names.iter().enumerate() {
            let range = if schema.field(idx).data_type() == &DataType::Int64 {
                table.min_max_strings(name).await?.and_then(|(lo, hi)| {
                    Some((lo.parse::<i64>().ok()?, hi.parse::<i64>().ok()?))
                })
            } else {
                None
            };
            int_ranges.push(range);
        }
        let data_types: Vec<_> = schema
            .fields()
            .iter()
            .map(|f| f.data_type().clone())
            .collect();
        let schema_fields: Vec<_> = schema
            .fields()
            .iter()
            .map(|f| (f.name().clone(), f.data_type().clone(), f.is_nullable()))
            .collect();

        let pii_risks = structural::pii_risks(&names);
        let structural = StructuralReport {
            duplicate_columns: structural::duplicate_columns(&names, &values),
            top_memory_columns: structural::top_memory_columns(&descriptors, TOP_MEMORY_COLUMNS),
            optimization_tips: structural::optimization_tips(
                &descriptors,
                &data_types,
                &int_ranges,
                row_count,
                self.config.max_optimization_tips,
            ),
            composite_keys: structural::composite_keys(
                &names,
                &values,
                self.config.composite_key_column_limit,
                self.config.max_composite_keys,
            ),
            sql_schema: structural::sql_schema(table.name(), &schema_fields)?,
            pii_risks,
        };
        let alerts = structural::alerts(
            &descriptors,
            &values,
            &partition_stats,
            &structural.pii_risks,
            &self.config,
        );

        let sample_rows = sample.num_rows();
        let preview_count = self.config.preview_rows.min(sample_rows);
        let head: Vec<usize> = (0..preview_count).collect();
        let tail: Vec<usize> = (sample_rows - preview_count..sample_rows).collect();
        let random = sample.random_rows(preview_count, self.config.sampling.seed);
        let preview = Preview {
            columns: names.clone(),
            head: preview_rows(&values, &head),
            tail: preview_rows(&values, &tail),
            random: preview_rows(&values, &random),
        };

        let health = HealthScorer::structural().score(HealthInputs::new(missing_pct, duplicate_pct));

        let dataset_snapshot = DatasetSnapshot {
            row_count,
            column_count,
            total_cells,
            memory_bytes,
            memory_mb: round_to(memory_bytes as f64 / (1024.0 * 1024.0), 2),
            missing_cell_count,
            missing_pct,
            duplicate_row_count,
            duplicate_pct,
            density_pct: round_to(100.0 - missing_pct, 2),
            partition_count: table.partition_count(),
            partition_stats,
            sample_rows,
            sampling_strategy: sample.strategy(),
            fingerprint: fingerprint(&names, &values),
        };

        info!(
            rows = row_count,
            columns = column_count,
            missing_pct,
            duplicate_pct,
            alerts = alerts.len(),
            "Overview complete"
        );

        let report = OverviewReport {
            dataset_snapshot,
            column_descriptors: descriptors,
            variable_types,
            structural,
            alerts,
            preview,
            health,
        };
        Ok((report, sample))
    }
}
