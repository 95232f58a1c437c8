//! Synthesizes findings from earlier stages into ranked insights.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::confidence::{outlier_confidence, Confidence};
use crate::error::ProfileResult;
use crate::health::HealthLabel;
use crate::pipeline::{ProfilingStage, StageContext, StagePayload};

/// Outlier totals above this are reported with high severity.
const HIGH_SEVERITY_OUTLIERS: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InsightCategory {
    #[serde(rename = "Risk & Quality")]
    RiskAndQuality,
    #[serde(rename = "Key Relationships")]
    KeyRelationships,
    #[serde(rename = "Key Drivers")]
    KeyDrivers,
    #[serde(rename = "Data Health")]
    DataHealth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub category: InsightCategory,
    pub severity: Severity,
    pub insight: String,
    pub detail: String,
    pub confidence_score: f64,
    pub confidence_reason: String,
}

impl Insight {
    fn new(
        category: InsightCategory,
        severity: Severity,
        insight: String,
        detail: String,
        confidence: Confidence,
    ) -> Self {
        Self {
            category,
            severity,
            insight,
            detail,
            confidence_score: confidence.score,
            confidence_reason: confidence.reason,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsightsReport {
    pub insights: Vec<Insight>,
}

fn preview_list(items: &[&str], limit: usize) -> String {
    let mut shown = items
        .iter()
        .take(limit)
        .copied()
        .collect::<Vec<_>>()
        .join(", ");
    if items.len() > limit {
        shown.push_str(", ...");
    }
    shown
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InsightsStage;

#[async_trait]
impl ProfilingStage for InsightsStage {
    fn name(&self) -> &str {
        "insights"
    }

    fn runs_after(&self) -> Vec<String> {
        ["outliers", "correlations", "target_analysis", "health"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    async fn analyze(&self, ctx: &StageContext<'_>) -> ProfileResult<StagePayload> {
        let mut insights = Vec::new();
        let rows = ctx.overview.dataset_snapshot.row_count;

        if let Some(outliers) = ctx.result("outliers").and_then(StagePayload::as_outliers) {
            let affected = outliers.affected_columns();
            if outliers.total_outliers > 0 {
                let severity = if outliers.total_outliers > HIGH_SEVERITY_OUTLIERS {
                    Severity::High
                } else {
                    Severity::Medium
                };
                insights.push(Insight::new(
                    InsightCategory::RiskAndQuality,
                    severity,
                    format!(
                        "Detected {} potential anomalies across {} columns.",
                        outliers.total_outliers,
                        affected.len()
                    ),
                    format!(
                        "Outliers found in: {}. These records deviate significantly from the norm.",
                        preview_list(&affected, 3)
                    ),
                    outlier_confidence(outliers.total_outliers, rows),
                ));
            }
        }

        if let Some(correlations) = ctx
            .result("correlations")
            .and_then(StagePayload::as_correlations)
        {
            for pair in &correlations.strong_pairs {
                let direction = if pair.value < 0.0 { "negative" } else { "positive" };
                insights.push(Insight::new(
                    InsightCategory::KeyRelationships,
                    Severity::Medium,
                    format!(
                        "{} and {} are strongly related ({:.2}).",
                        pair.column_a, pair.column_b, pair.value
                    ),
                    format!(
                        "A {direction} association over {} rows; one may be redundant or derived from the other.",
                        pair.samples
                    ),
                    pair.confidence.clone(),
                ));
            }
        }

        if let Some(target) = ctx
            .result("target_analysis")
            .and_then(StagePayload::as_target_analysis)
        {
            let top = target.top_features(3);
            if let Some(best) = target.associations.first() {
                insights.push(Insight::new(
                    InsightCategory::KeyDrivers,
                    Severity::High,
                    format!(
                        "The primary factors associated with {} are: {}.",
                        target.target.column,
                        top.join(", ")
                    ),
                    "Focusing on these variables will have the highest impact on the target outcome."
                        .to_string(),
                    best.confidence.clone(),
                ));
            }
        }

        if let Some(health) = ctx.result("health").and_then(StagePayload::as_health) {
            if let (Some(score), Some(label)) = (health.health.score, health.health.label) {
                if matches!(label, HealthLabel::Fair | HealthLabel::Poor) {
                    let severity = if label == HealthLabel::Poor {
                        Severity::Critical
                    } else {
                        Severity::High
                    };
                    insights.push(Insight::new(
                        InsightCategory::DataHealth,
                        severity,
                        format!("Overall data health is {label} ({score:.1}/100)."),
                        format!(
                            "Missing cells {:.2}%, duplicate rows {:.2}%, anomalies {:.2}%.",
                            health.missing_pct, health.duplicate_pct, health.anomaly_pct
                        ),
                        Confidence::new(0.9, "Computed from exact dataset-wide counts."),
                    ));
                }
            }
        }

        Ok(StagePayload::Insights(InsightsReport { insights }))
    }
}
