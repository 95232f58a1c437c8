//! Final dataset health, including the anomaly rate from outlier detection.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ProfileResult;
use crate::health::{HealthInputs, HealthScore, HealthScorer};
use crate::pipeline::{ProfilingStage, StageContext, StagePayload};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub health: HealthScore,
    pub missing_pct: f64,
    pub duplicate_pct: f64,
    pub anomaly_pct: f64,
    /// Whether the anomaly rate came from a successful outlier stage
    pub anomaly_measured: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HealthStage;

#[async_trait]
impl ProfilingStage for HealthStage {
    fn name(&self) -> &str {
        "health"
    }

    fn runs_after(&self) -> Vec<String> {
        vec!["outliers".to_string()]
    }

    async fn analyze(&self, ctx: &StageContext<'_>) -> ProfileResult<StagePayload> {
        let snapshot = &ctx.overview.dataset_snapshot;
        let measured = ctx
            .result("outliers")
            .and_then(StagePayload::as_outliers)
            .map(|o| o.anomaly_pct);
        let anomaly_pct = measured.unwrap_or(0.0);

        let health = HealthScorer::default().score(
            HealthInputs::new(snapshot.missing_pct, snapshot.duplicate_pct).with_anomaly(anomaly_pct),
        );
        info!(score = ?health.score, label = ?health.label, "Dataset health computed");

        Ok(StagePayload::Health(HealthReport {
            health,
            missing_pct: snapshot.missing_pct,
            duplicate_pct: snapshot.duplicate_pct,
            anomaly_pct,
            anomaly_measured: measured.is_some(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{HealthFormula, HealthLabel};
    use crate::pipeline::StageOutcome;
    use crate::stages::OutlierStage;
    use crate::test_fixtures::{clean_batch, sales_batch, StageHarness};

    #[tokio::test]
    async fn test_clean_table_is_excellent() {
        let harness = StageHarness::from_batch("clean", clean_batch()).await;
        let payload = HealthStage.analyze(&harness.context(None)).await.unwrap();
        let report = payload.as_health().unwrap();
        assert_eq!(report.health.score, Some(100.0));
        assert_eq!(report.health.label, Some(HealthLabel::Excellent));
        assert_eq!(report.health.formula, HealthFormula::Final);
        assert!(!report.anomaly_measured);
    }

    #[tokio::test]
    async fn test_anomaly_rate_lowers_score() {
        let mut harness = StageHarness::from_batch("sales", sales_batch()).await;
        let outliers = OutlierStage.analyze(&harness.context(None)).await.unwrap();
        harness.record("outliers", StageOutcome::Succeeded { payload: outliers });

        let payload = HealthStage.analyze(&harness.context(None)).await.unwrap();
        let report = payload.as_health().unwrap();
        assert!(report.anomaly_measured);
        assert_eq!(report.anomaly_pct, 3.33);
        let expected = 100.0 - report.missing_pct - 0.5 * 3.33;
        assert_eq!(report.health.score, Some((expected * 10.0_f64).round() / 10.0));
    }

    #[tokio::test]
    async fn test_failed_outliers_count_as_zero() {
        let mut harness = StageHarness::from_batch("sales", sales_batch()).await;
        harness.record(
            "outliers",
            StageOutcome::Failed {
                kind: crate::error::ErrorKind::StageFailure,
                message: "boom".into(),
            },
        );
        let payload = HealthStage.analyze(&harness.context(None)).await.unwrap();
        assert_eq!(payload.as_health().unwrap().anomaly_pct, 0.0);
    }
}
