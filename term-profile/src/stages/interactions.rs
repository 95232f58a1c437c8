//! Feature interaction suggestions.
//!
//! Numeric columns are ranked by coefficient of variation on the sample and
//! the most variable ones are paired as products. Categorical columns are
//! ranked by cardinality and the smallest ones are paired as crossings, which
//! keeps the number of combined categories manageable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::classifier::TypeLabel;
use crate::error::{ProfileError, ProfileResult};
use crate::pipeline::{ProfilingStage, StageContext, StagePayload};
use crate::stats::{mean, round_to, std_dev};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Product,
    Crossing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionSuggestion {
    pub left: String,
    pub right: String,
    pub kind: InteractionKind,
}

impl InteractionSuggestion {
    /// `a * b` for products, `a & b` for crossings.
    pub fn expression(&self) -> String {
        let op = match self.kind {
            InteractionKind::Product => "*",
            InteractionKind::Crossing => "&",
        };
        format!("{} {op} {}", self.left, self.right)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionsReport {
    /// Numeric columns with their coefficient of variation, highest first
    pub variability: Vec<(String, f64)>,
    pub numeric: Vec<InteractionSuggestion>,
    pub categorical: Vec<InteractionSuggestion>,
}

impl InteractionsReport {
    pub fn expressions(&self) -> Vec<String> {
        self.numeric
            .iter()
            .chain(&self.categorical)
            .map(InteractionSuggestion::expression)
            .collect()
    }
}

/// Every unordered pair of `columns`, in rank order.
fn pairs(columns: &[String], kind: InteractionKind) -> Vec<InteractionSuggestion> {
    let mut out = Vec::new();
    for (i, left) in columns.iter().enumerate() {
        for right in &columns[i + 1..] {
            out.push(InteractionSuggestion {
                left: left.clone(),
                right: right.clone(),
                kind,
            });
        }
    }
    out
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InteractionsStage;

#[async_trait]
impl ProfilingStage for InteractionsStage {
    fn name(&self) -> &str {
        "interactions"
    }

    #[instrument(skip(self, ctx), fields(stage = "interactions"))]
    async fn analyze(&self, ctx: &StageContext<'_>) -> ProfileResult<StagePayload> {
        let top = ctx.config.interaction_features;
        let mut report = InteractionsReport::default();

        let numeric = ctx.overview.numeric_columns();
        if numeric.len() >= 2 {
            for descriptor in numeric {
                let values: Vec<f64> = ctx
                    .sample
                    .numeric_values(&descriptor.name)?
                    .into_iter()
                    .flatten()
                    .filter(|v| v.is_finite())
                    .collect();
                // zero mean leaves the ratio undefined
                let cv = match (mean(&values), std_dev(&values)) {
                    (Some(m), Some(s)) if m != 0.0 => (s / m).abs(),
                    _ => continue,
                };
                if cv.is_finite() {
                    report.variability.push((descriptor.name.clone(), round_to(cv, 4)));
                }
            }
            report.variability.sort_by(|a, b| b.1.total_cmp(&a.1));
            let ranked: Vec<String> = report
                .variability
                .iter()
                .take(top)
                .map(|(name, _)| name.clone())
                .collect();
            report.numeric = pairs(&ranked, InteractionKind::Product);
        }

        let mut categorical = ctx
            .overview
            .columns_where(|label| matches!(label, TypeLabel::Categorical | TypeLabel::Boolean));
        if categorical.len() >= 2 {
            // stable sort keeps column order among equal cardinalities
            categorical.sort_by_key(|d| d.distinct_count);
            let ranked: Vec<String> = categorical
                .iter()
                .take(top)
                .map(|d| d.name.clone())
                .collect();
            report.categorical = pairs(&ranked, InteractionKind::Crossing);
        }

        if report.numeric.is_empty() && report.categorical.is_empty() {
            return Err(ProfileError::precondition(
                "not enough numeric or categorical columns to suggest interactions",
            ));
        }
        debug!(
            numeric = report.numeric.len(),
            categorical = report.categorical.len(),
            "Interactions suggested"
        );
        Ok(StagePayload::Interactions(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProfileConfig;
    use crate::test_fixtures::{partitioned_table, sales_batch, StageHarness};

    #[tokio::test]
    async fn test_suggests_products_and_crossings() {
        let harness = StageHarness::from_batch("sales", sales_batch()).await;
        let payload = InteractionsStage
            .analyze(&harness.context(None))
            .await
            .unwrap();
        let report = payload.as_interactions().unwrap();

        assert_eq!(report.variability.len(), 2);
        assert_eq!(report.numeric.len(), 1);
        let product = &report.numeric[0];
        let mut columns = [product.left.as_str(), product.right.as_str()];
        columns.sort_unstable();
        assert_eq!(columns, ["amount", "discount"]);

        let crossings: Vec<String> = report
            .categorical
            .iter()
            .map(InteractionSuggestion::expression)
            .collect();
        assert_eq!(crossings[0], "channel & returned");
        assert!(crossings.contains(&"channel & region".to_string()));
        assert!(!crossings.iter().any(|c| c.contains("order_id")));
        assert!(report.expressions().iter().any(|e| e.contains(" * ")));
    }

    #[tokio::test]
    async fn test_feature_limit_bounds_pairs() {
        let config = ProfileConfig::builder()
            .interaction_features(2)
            .build()
            .unwrap();
        let mut harness = StageHarness::from_batch("sales", sales_batch()).await;
        harness.config = config;
        let payload = InteractionsStage
            .analyze(&harness.context(None))
            .await
            .unwrap();
        let report = payload.as_interactions().unwrap();

        assert_eq!(report.categorical.len(), 1);
        assert_eq!(report.categorical[0].expression(), "channel & returned");
    }

    #[tokio::test]
    async fn test_no_candidates_is_precondition() {
        let harness = StageHarness::new(partitioned_table(&[5, 5]).unwrap()).await;
        let err = InteractionsStage
            .analyze(&harness.context(None))
            .await
            .unwrap_err();
        assert!(matches!(err, ProfileError::Precondition(_)));
    }
}
