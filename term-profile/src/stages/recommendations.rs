//! Maps insights to concrete follow-up actions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::insights::{Insight, InsightCategory};
use crate::confidence::normalize;
use crate::error::{ProfileError, ProfileResult};
use crate::pipeline::{ProfilingStage, StageContext, StagePayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    Operational,
    Strategic,
    Analytical,
    Technical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: String,
    pub action_type: ActionType,
    pub priority: Priority,
    pub rationale: String,
    pub confidence_score: Option<f64>,
    pub confidence_reason: Option<String>,
    /// The insight this was derived from
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationsReport {
    pub recommendations: Vec<Recommendation>,
}

struct Playbook {
    action: &'static str,
    action_type: ActionType,
    priority: Priority,
    rationale: &'static str,
    multiplier: f64,
    reason_prefix: &'static str,
}

fn playbook(category: InsightCategory) -> Playbook {
    match category {
        InsightCategory::RiskAndQuality => Playbook {
            action: "Conduct a root cause analysis on the identified anomalies.",
            action_type: ActionType::Operational,
            priority: Priority::High,
            rationale: "Outliers often indicate data quality issues or high-risk events that need human review.",
            multiplier: 1.0,
            reason_prefix: "Directly actionable",
        },
        InsightCategory::KeyDrivers => Playbook {
            action: "Prioritize the top driver variables when allocating effort on the target metric.",
            action_type: ActionType::Strategic,
            priority: Priority::High,
            rationale: "Small improvements in high-impact variables yield outsized returns on the target.",
            multiplier: 0.85,
            reason_prefix: "Strategic alignment",
        },
        InsightCategory::KeyRelationships => Playbook {
            action: "Review strongly related columns for redundancy before modeling.",
            action_type: ActionType::Analytical,
            priority: Priority::Medium,
            rationale: "Highly associated features carry overlapping information and can destabilize models.",
            multiplier: 0.80,
            reason_prefix: "Analytical follow-up",
        },
        InsightCategory::DataHealth => Playbook {
            action: "Clean missing and duplicate records at the source before further analysis.",
            action_type: ActionType::Technical,
            priority: Priority::Critical,
            rationale: "Low health scores propagate into every downstream result.",
            multiplier: 0.95,
            reason_prefix: "Technical necessity",
        },
    }
}

fn recommend(insight: &Insight) -> Recommendation {
    let play = playbook(insight.category);
    Recommendation {
        action: play.action.to_string(),
        action_type: play.action_type,
        priority: play.priority,
        rationale: play.rationale.to_string(),
        confidence_score: Some(normalize(insight.confidence_score * play.multiplier)),
        confidence_reason: Some(format!(
            "{}. Source: {}",
            play.reason_prefix, insight.confidence_reason
        )),
        source: Some(insight.insight.clone()),
    }
}

fn fallback() -> Recommendation {
    Recommendation {
        action: "Review the data collection pipeline for potential gaps.".to_string(),
        action_type: ActionType::Technical,
        priority: Priority::Low,
        rationale: "No specific insights were generated, suggesting the data may be uniform or insufficient."
            .to_string(),
        confidence_score: None,
        confidence_reason: None,
        source: None,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RecommendationsStage;

#[async_trait]
impl ProfilingStage for RecommendationsStage {
    fn name(&self) -> &str {
        "recommendations"
    }

    fn requires(&self) -> Vec<String> {
        vec!["insights".to_string()]
    }

    async fn analyze(&self, ctx: &StageContext<'_>) -> ProfileResult<StagePayload> {
        let insights = ctx
            .result("insights")
            .and_then(StagePayload::as_insights)
            .ok_or_else(|| ProfileError::precondition("insights are not available"))?;

        let mut recommendations: Vec<Recommendation> =
            insights.insights.iter().map(recommend).collect();
        if recommendations.is_empty() {
            recommendations.push(fallback());
        }
        Ok(StagePayload::Recommendations(RecommendationsReport {
            recommendations,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::StageOutcome;
    use crate::stages::insights::{InsightsReport, Severity};
    use crate::test_fixtures::{clean_batch, StageHarness};

    fn insight(category: InsightCategory, confidence: f64) -> Insight {
        Insight {
            category,
            severity: Severity::High,
            insight: "finding".into(),
            detail: String::new(),
            confidence_score: confidence,
            confidence_reason: "because".into(),
        }
    }

    #[test]
    fn test_multipliers() {
        let cases = [
            (InsightCategory::RiskAndQuality, 0.8, Priority::High),
            (InsightCategory::KeyDrivers, 0.68, Priority::High),
            (InsightCategory::KeyRelationships, 0.64, Priority::Medium),
            (InsightCategory::DataHealth, 0.76, Priority::Critical),
        ];
        for (category, expected, priority) in cases {
            let rec = recommend(&insight(category, 0.8));
            assert!((rec.confidence_score.unwrap() - expected).abs() < 1e-9);
            assert_eq!(rec.priority, priority);
            assert!(rec.confidence_reason.unwrap().ends_with("Source: because"));
        }
    }

    #[tokio::test]
    async fn test_fallback_when_no_insights() {
        let mut harness = StageHarness::from_batch("clean", clean_batch()).await;
        harness.record(
            "insights",
            StageOutcome::Succeeded {
                payload: StagePayload::Insights(InsightsReport::default()),
            },
        );
        let payload = RecommendationsStage
            .analyze(&harness.context(None))
            .await
            .unwrap();
        let report = payload.as_recommendations().unwrap();
        assert_eq!(report.recommendations.len(), 1);
        assert_eq!(report.recommendations[0].priority, Priority::Low);
        assert!(report.recommendations[0].confidence_score.is_none());
    }
}
