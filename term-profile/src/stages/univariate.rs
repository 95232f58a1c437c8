//! Per-column descriptive statistics.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::classifier::TypeLabel;
use crate::error::{ErrorContext, ProfileResult};
use crate::pipeline::{ProfilingStage, StageContext, StagePayload};
use crate::stats::{self, NumericSummary};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueCount {
    pub value: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalSummary {
    pub type_label: TypeLabel,
    pub total_unique: u64,
    /// Most frequent values, most common first
    pub top_values: Vec<ValueCount>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnivariateReport {
    pub numeric: BTreeMap<String, NumericSummary>,
    pub categorical: BTreeMap<String, CategoricalSummary>,
}

/// Summaries of `Numeric` and categorical-like columns over the full table.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnivariateStage;

#[async_trait]
impl ProfilingStage for UnivariateStage {
    fn name(&self) -> &str {
        "univariate"
    }

    #[instrument(skip(self, ctx), fields(stage = "univariate"))]
    async fn analyze(&self, ctx: &StageContext<'_>) -> ProfileResult<StagePayload> {
        let mut report = UnivariateReport::default();

        for descriptor in ctx.overview.numeric_columns() {
            let values = ctx
                .table
                .numeric_values(&descriptor.name)
                .await
                .with_context(|| format!("reading values of {}", descriptor.name))?;
            if let Some(summary) = stats::summarize(&values) {
                report.numeric.insert(descriptor.name.clone(), summary);
            }
        }

        for descriptor in ctx.overview.columns_where(TypeLabel::is_categorical_like) {
            let counts = ctx
                .table
                .value_counts(&descriptor.name, ctx.config.top_categories)
                .await?;
            report.categorical.insert(
                descriptor.name.clone(),
                CategoricalSummary {
                    type_label: descriptor.type_label,
                    total_unique: descriptor.distinct_count,
                    top_values: counts
                        .into_iter()
                        .map(|(value, count)| ValueCount { value, count })
                        .collect(),
                },
            );
        }

        debug!(
            numeric = report.numeric.len(),
            categorical = report.categorical.len(),
            "Univariate summaries computed"
        );
        Ok(StagePayload::Univariate(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{sales_batch, StageHarness};

    #[tokio::test]
    async fn test_univariate_summaries() {
        let harness = StageHarness::from_batch("sales", sales_batch()).await;
        let payload = UnivariateStage.analyze(&harness.context(None)).await.unwrap();
        let report = payload.as_univariate().unwrap();

        let amount = report.numeric.get("amount").unwrap();
        assert_eq!(amount.count, 60);
        assert!(amount.min <= amount.q1 && amount.q1 <= amount.median);
        assert!(amount.median <= amount.q3 && amount.q3 <= amount.max);

        let region = report.categorical.get("region").unwrap();
        assert_eq!(region.total_unique, 3);
        assert_eq!(region.top_values.iter().map(|v| v.count).sum::<u64>(), 60);
        assert!(!report.categorical.contains_key("order_id"));
    }
}
