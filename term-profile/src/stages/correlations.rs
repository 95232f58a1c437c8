//! Pairwise association between columns.
//!
//! Pearson correlation runs over the whole table as a single SQL aggregate
//! of running sums per column pair, using only rows where both values are
//! present. Cramér's V needs the joint distribution and is computed on the
//! sample.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::classifier::TypeLabel;
use crate::confidence::{association_confidence, Confidence};
use crate::error::{ProfileError, ProfileResult};
use crate::pipeline::{ProfilingStage, StageContext, StagePayload};
use crate::stats::{cramers_v, pearson_from_sums, round_to};
use crate::table::{extract_optional_f64, extract_u64, TableHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationMethod {
    Pearson,
    CramersV,
}

/// A symmetric matrix with a unit diagonal. Undefined cells are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    fn identity(columns: Vec<String>) -> Self {
        let n = columns.len();
        let values = (0..n)
            .map(|i| (0..n).map(|j| (i == j).then_some(1.0)).collect())
            .collect();
        Self { columns, values }
    }

    fn set(&mut self, i: usize, j: usize, value: Option<f64>) {
        self.values[i][j] = value;
        self.values[j][i] = value;
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        self.values[i][j]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrongPair {
    pub column_a: String,
    pub column_b: String,
    pub method: AssociationMethod,
    pub value: f64,
    pub samples: usize,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrelationReport {
    pub pearson: Option<CorrelationMatrix>,
    pub cramers_v: Option<CorrelationMatrix>,
    /// Pairs at or above the strength threshold, strongest first
    pub strong_pairs: Vec<StrongPair>,
}

/// Pearson r and the pair count for two numeric columns.
async fn pearson_pair(table: &TableHandle, a: &str, b: &str) -> ProfileResult<(Option<f64>, usize)> {
    let x = format!("CAST({} AS DOUBLE)", table.quoted_column(a)?);
    let y = format!("CAST({} AS DOUBLE)", table.quoted_column(b)?);
    let sql = format!(
        "SELECT COUNT(*) AS n, SUM({x}) AS sx, SUM({y}) AS sy, SUM({x} * {x}) AS sxx, \
         SUM({y} * {y}) AS syy, SUM({x} * {y}) AS sxy FROM {} \
         WHERE {x} IS NOT NULL AND {y} IS NOT NULL",
        table.table_ref()
    );
    let batches = table.query(&sql).await?;
    let batch = batches
        .iter()
        .find(|b| b.num_rows() > 0)
        .ok_or_else(|| ProfileError::internal("correlation query returned no rows"))?;

    let n = extract_u64(batch, 0, "n")?;
    let sums: Option<Vec<f64>> = (1..6).map(|idx| extract_optional_f64(batch, idx)).collect();
    let r = sums.and_then(|s| pearson_from_sums(n as f64, s[0], s[1], s[2], s[3], s[4]));
    Ok((r, n as usize))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CorrelationStage;

#[async_trait]
impl ProfilingStage for CorrelationStage {
    fn name(&self) -> &str {
        "correlations"
    }

    #[instrument(skip(self, ctx), fields(stage = "correlations"))]
    async fn analyze(&self, ctx: &StageContext<'_>) -> ProfileResult<StagePayload> {
        let numeric: Vec<String> = ctx
            .overview
            .numeric_columns()
            .into_iter()
            .map(|d| d.name.clone())
            .collect();
        let categorical: Vec<String> = ctx
            .overview
            .columns_where(TypeLabel::is_categorical_like)
            .into_iter()
            .map(|d| d.name.clone())
            .collect();
        if numeric.len() < 2 && categorical.len() < 2 {
            return Err(ProfileError::precondition(
                "fewer than two numeric or categorical columns",
            ));
        }

        let threshold = ctx.config.strong_correlation_threshold;
        let mut report = CorrelationReport::default();

        if numeric.len() >= 2 {
            let mut matrix = CorrelationMatrix::identity(numeric.clone());
            for i in 0..numeric.len() {
                for j in (i + 1)..numeric.len() {
                    let (r, samples) = pearson_pair(ctx.table, &numeric[i], &numeric[j]).await?;
                    let r = r.map(|v| round_to(v, 4));
                    matrix.set(i, j, r);
                    if let Some(value) = r.filter(|v| v.abs() >= threshold) {
                        report.strong_pairs.push(StrongPair {
                            column_a: numeric[i].clone(),
                            column_b: numeric[j].clone(),
                            method: AssociationMethod::Pearson,
                            value,
                            samples,
                            confidence: association_confidence(value, samples),
                        });
                    }
                }
            }
            report.pearson = Some(matrix);
        }

        if categorical.len() >= 2 {
            let mut values = Vec::with_capacity(categorical.len());
            for name in &categorical {
                values.push(ctx.sample.string_values(name)?);
            }
            let mut matrix = CorrelationMatrix::identity(categorical.clone());
            for i in 0..categorical.len() {
                for j in (i + 1)..categorical.len() {
                    let pairs: Vec<(&str, &str)> = values[i]
                        .iter()
                        .zip(&values[j])
                        .filter_map(|(a, b)| Some((a.as_deref()?, b.as_deref()?)))
                        .collect();
                    let v = cramers_v(&pairs).map(|v| round_to(v, 4));
                    matrix.set(i, j, v);
                    if let Some(value) = v.filter(|v| *v >= threshold) {
                        report.strong_pairs.push(StrongPair {
                            column_a: categorical[i].clone(),
                            column_b: categorical[j].clone(),
                            method: AssociationMethod::CramersV,
                            value,
                            samples: pairs.len(),
                            confidence: association_confidence(value, pairs.len()),
                        });
                    }
                }
            }
            report.cramers_v = Some(matrix);
        }

        report
            .strong_pairs
            .sort_by(|a, b| b.value.abs().total_cmp(&a.value.abs()));
        debug!(strong_pairs = report.strong_pairs.len(), "Correlations computed");
        Ok(StagePayload::Correlations(report))
    }
}
