//! IQR outlier detection on numeric columns.
//!
//! Quartiles come from the full column; the outlier counts are SQL
//! aggregates so they cover every row rather than only the sample.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::confidence::{outlier_confidence, Confidence};
use crate::error::{ProfileError, ProfileResult};
use crate::pipeline::{ProfilingStage, StageContext, StagePayload};
use crate::stats::{quantile_sorted, round_to};
use crate::table::extract_u64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnOutliers {
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub low_count: u64,
    pub high_count: u64,
    pub total_outliers: u64,
    /// Outliers as a share of all rows, in percent
    pub percentage: f64,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutlierReport {
    pub columns: BTreeMap<String, ColumnOutliers>,
    pub total_outliers: u64,
    /// Flagged cells over `rows x numeric columns`, in percent
    pub anomaly_pct: f64,
}

impl OutlierReport {
    /// Columns with at least one outlier, in name order.
    pub fn affected_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|(_, c)| c.total_outliers > 0)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OutlierStage;

#[async_trait]
impl ProfilingStage for OutlierStage {
    fn name(&self) -> &str {
        "outliers"
    }

    #[instrument(skip(self, ctx), fields(stage = "outliers"))]
    async fn analyze(&self, ctx: &StageContext<'_>) -> ProfileResult<StagePayload> {
        let numeric = ctx.overview.numeric_columns();
        if numeric.is_empty() {
            return Err(ProfileError::precondition("no numeric columns to scan"));
        }
        let rows = ctx.overview.dataset_snapshot.row_count;
        let multiplier = ctx.config.outlier_iqr_multiplier;

        let mut report = OutlierReport::default();
        for descriptor in &numeric {
            let mut values = ctx.table.numeric_values(&descriptor.name).await?;
            values.sort_by(f64::total_cmp);
            let (Some(q1), Some(q3)) = (
                quantile_sorted(&values, 0.25),
                quantile_sorted(&values, 0.75),
            ) else {
                continue;
            };
            let iqr = q3 - q1;
            let lower_bound = q1 - multiplier * iqr;
            let upper_bound = q3 + multiplier * iqr;

            let col = ctx.table.quoted_column(&descriptor.name)?;
            let sql = format!(
                "SELECT \
                 COUNT(CASE WHEN CAST({col} AS DOUBLE) < {lower_bound:?} THEN 1 END) AS low, \
                 COUNT(CASE WHEN CAST({col} AS DOUBLE) > {upper_bound:?} THEN 1 END) AS high \
                 FROM {}",
                ctx.table.table_ref()
            );
            let batches = ctx.table.query(&sql).await?;
            let batch = batches
                .iter()
                .find(|b| b.num_rows() > 0)
                .ok_or_else(|| ProfileError::internal("outlier count returned no rows"))?;
            let low_count = extract_u64(batch, 0, "low")?;
            let high_count = extract_u64(batch, 1, "high")?;
            let total = low_count + high_count;
            debug!(column = %descriptor.name, lower_bound, upper_bound, total, "Outliers counted");

            report.total_outliers += total;
            report.columns.insert(
                descriptor.name.clone(),
                ColumnOutliers {
                    q1,
                    q3,
                    iqr,
                    lower_bound,
                    upper_bound,
                    low_count,
                    high_count,
                    total_outliers: total,
                    percentage: if rows == 0 {
                        0.0
                    } else {
                        round_to(total as f64 / rows as f64 * 100.0, 2)
                    },
                    confidence: outlier_confidence(total, rows),
                },
            );
        }

        let cells = rows * numeric.len() as u64;
        report.anomaly_pct = if cells == 0 {
            0.0
        } else {
            round_to(report.total_outliers as f64 / cells as f64 * 100.0, 2)
        };
        Ok(StagePayload::Outliers(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{clean_batch, sales_batch, StageHarness};

    #[tokio::test]
    async fn test_iqr_outliers() {
        let harness = StageHarness::from_batch("sales", sales_batch()).await;
        let payload = OutlierStage.analyze(&harness.context(None)).await.unwrap();
        let report = payload.as_outliers().unwrap();

        let amount = report.columns.get("amount").unwrap();
        assert_eq!(amount.high_count, 2);
        assert_eq!(amount.low_count, 0);
        assert!(amount.upper_bound < 1000.0);
        assert_eq!(amount.confidence.score, 0.85);
        assert_eq!(report.total_outliers, 4);
        assert_eq!(report.anomaly_pct, 3.33);
        assert_eq!(report.affected_columns(), vec!["amount", "discount"]);
    }

    #[tokio::test]
    async fn test_no_numeric_columns_is_precondition() {
        let harness = StageHarness::from_batch("clean", clean_batch()).await;
        let err = OutlierStage.analyze(&harness.context(None)).await.unwrap_err();
        assert!(matches!(err, ProfileError::Precondition(_)));
    }
}
