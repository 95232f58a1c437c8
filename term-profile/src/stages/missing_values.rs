//! Per-column missingness, read from the overview descriptors.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProfileResult;
use crate::pipeline::{ProfilingStage, StageContext, StagePayload};
use crate::stats::round_to;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingColumn {
    pub missing_count: u64,
    pub missing_percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MissingValuesReport {
    pub columns: BTreeMap<String, MissingColumn>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MissingValuesStage;

#[async_trait]
impl ProfilingStage for MissingValuesStage {
    fn name(&self) -> &str {
        "missing_values"
    }

    async fn analyze(&self, ctx: &StageContext<'_>) -> ProfileResult<StagePayload> {
        let rows = ctx.overview.dataset_snapshot.row_count;
        let columns: BTreeMap<String, MissingColumn> = ctx
            .overview
            .column_descriptors
            .iter()
            .filter(|d| d.null_count > 0)
            .map(|d| {
                let pct = if rows == 0 {
                    0.0
                } else {
                    round_to(d.null_count as f64 / rows as f64 * 100.0, 2)
                };
                (
                    d.name.clone(),
                    MissingColumn {
                        missing_count: d.null_count,
                        missing_percentage: pct,
                    },
                )
            })
            .collect();

        let message = columns
            .is_empty()
            .then(|| "No missing values found in any column.".to_string());
        Ok(StagePayload::MissingValues(MissingValuesReport { columns, message }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{clean_batch, customers_batch, StageHarness};

    #[tokio::test]
    async fn test_missing_columns() {
        let harness = StageHarness::from_batch("customers", customers_batch()).await;
        let payload = MissingValuesStage
            .analyze(&harness.context(None))
            .await
            .unwrap();
        let report = payload.as_missing_values().unwrap();

        let age = report.columns.get("age").unwrap();
        assert_eq!(age.missing_count, 2);
        assert_eq!(age.missing_percentage, 20.0);
        assert!(!report.columns.contains_key("id"));
        assert!(report.message.is_none());
    }

    #[tokio::test]
    async fn test_nothing_missing() {
        let harness = StageHarness::from_batch("clean", clean_batch()).await;
        let payload = MissingValuesStage
            .analyze(&harness.context(None))
            .await
            .unwrap();
        let report = payload.as_missing_values().unwrap();
        assert!(report.columns.is_empty());
        assert!(report.message.is_some());
    }
}
