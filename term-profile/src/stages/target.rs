//! Target column summary and feature association ranking.
//!
//! Associations are computed on the sample with the measure that fits each
//! pair of column kinds:
//!
//! | feature \ target | numeric | categorical |
//! |---|---|---|
//! | numeric | `abs(pearson r)` | correlation ratio |
//! | categorical | correlation ratio | Cramér's V |

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::classifier::TypeLabel;
use crate::confidence::{association_confidence, Confidence};
use crate::error::ProfileResult;
use crate::pipeline::{ProfilingStage, StageContext, StagePayload};
use crate::stats::{self, correlation_ratio, cramers_v, pearson, round_to};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

impl ColumnKind {
    fn of(label: &TypeLabel) -> Option<Self> {
        if label.is_numeric() {
            Some(ColumnKind::Numeric)
        } else if label.is_categorical_like() {
            Some(ColumnKind::Categorical)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationMeasure {
    Pearson,
    CorrelationRatio,
    CramersV,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassShare {
    pub value: String,
    pub count: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSummary {
    pub column: String,
    pub type_label: TypeLabel,
    pub kind: Option<ColumnKind>,
    pub null_count: u64,
    /// Class frequencies for categorical targets
    pub class_balance: Vec<ClassShare>,
    pub mean: Option<f64>,
    pub std: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureAssociation {
    pub feature: String,
    pub measure: AssociationMeasure,
    /// Association strength in `[0, 1]`
    pub strength: f64,
    pub samples: usize,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetReport {
    pub target: TargetSummary,
    /// Strongest first
    pub associations: Vec<FeatureAssociation>,
}

impl TargetReport {
    pub fn top_features(&self, n: usize) -> Vec<&str> {
        self.associations
            .iter()
            .take(n)
            .map(|a| a.feature.as_str())
            .collect()
    }
}

/// Strength and pair count between two sampled columns.
fn associate(
    feature: (&[Option<String>], Option<&[Option<f64>]>, ColumnKind),
    target: (&[Option<String>], Option<&[Option<f64>]>, ColumnKind),
) -> Option<(AssociationMeasure, f64, usize)> {
    let (f_text, f_num, f_kind) = feature;
    let (t_text, t_num, t_kind) = target;
    match (f_kind, t_kind) {
        (ColumnKind::Numeric, ColumnKind::Numeric) => {
            let pairs: Vec<(f64, f64)> = f_num?
                .iter()
                .zip(t_num?)
                .filter_map(|(x, y)| Some((x.filter(|v| v.is_finite())?, y.filter(|v| v.is_finite())?)))
                .collect();
            let r = pearson(&pairs)?;
            Some((AssociationMeasure::Pearson, r.abs(), pairs.len()))
        }
        (ColumnKind::Numeric, ColumnKind::Categorical) => {
            let pairs: Vec<(&str, f64)> = t_text
                .iter()
                .zip(f_num?)
                .filter_map(|(k, v)| Some((k.as_deref()?, v.filter(|v| v.is_finite())?)))
                .collect();
            let eta = correlation_ratio(&pairs)?;
            Some((AssociationMeasure::CorrelationRatio, eta, pairs.len()))
        }
        (ColumnKind::Categorical, ColumnKind::Numeric) => {
            let pairs: Vec<(&str, f64)> = f_text
                .iter()
                .zip(t_num?)
                .filter_map(|(k, v)| Some((k.as_deref()?, v.filter(|v| v.is_finite())?)))
                .collect();
            let eta = correlation_ratio(&pairs)?;
            Some((AssociationMeasure::CorrelationRatio, eta, pairs.len()))
        }
        (ColumnKind::Categorical, ColumnKind::Categorical) => {
            let pairs: Vec<(&str, &str)> = f_text
                .iter()
                .zip(t_text)
                .filter_map(|(a, b)| Some((a.as_deref()?, b.as_deref()?)))
                .collect();
            let v = cramers_v(&pairs)?;
            Some((AssociationMeasure::CramersV, v, pairs.len()))
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TargetAnalysisStage;

#[async_trait]
impl ProfilingStage for TargetAnalysisStage {
    fn name(&self) -> &str {
        "target_analysis"
    }

    fn requires_target(&self) -> bool {
        true
    }

    #[instrument(skip(self, ctx), fields(stage = "target_analysis", target = ?ctx.target))]
    async fn analyze(&self, ctx: &StageContext<'_>) -> ProfileResult<StagePayload> {
        let target = ctx.target_column()?;
        let descriptor = ctx.descriptor(target)?;
        let kind = ColumnKind::of(&descriptor.type_label);
        let rows = ctx.overview.dataset_snapshot.row_count;

        let class_balance = if kind == Some(ColumnKind::Categorical) {
            ctx.table
                .value_counts(target, ctx.config.top_categories)
                .await?
                .into_iter()
                .map(|(value, count)| ClassShare {
                    value,
                    count,
                    percentage: if rows == 0 {
                        0.0
                    } else {
                        round_to(count as f64 / rows as f64 * 100.0, 2)
                    },
                })
                .collect()
        } else {
            vec![]
        };
        let (mean, std) = if kind == Some(ColumnKind::Numeric) {
            let values = ctx.table.numeric_values(target).await?;
            (stats::mean(&values), stats::std_dev(&values))
        } else {
            (None, None)
        };

        let mut associations = Vec::new();
        if let Some(target_kind) = kind {
            let t_text = ctx.sample.string_values(target)?;
            let t_num = match target_kind {
                ColumnKind::Numeric => Some(ctx.sample.numeric_values(target)?),
                ColumnKind::Categorical => None,
            };

            for feature in &ctx.overview.column_descriptors {
                if feature.name == target {
                    continue;
                }
                let Some(feature_kind) = ColumnKind::of(&feature.type_label) else {
                    continue;
                };
                let f_text = ctx.sample.string_values(&feature.name)?;
                let f_num = match feature_kind {
                    ColumnKind::Numeric => Some(ctx.sample.numeric_values(&feature.name)?),
                    ColumnKind::Categorical => None,
                };
                let Some((measure, strength, samples)) = associate(
                    (&f_text, f_num.as_deref(), feature_kind),
                    (&t_text, t_num.as_deref(), target_kind),
                ) else {
                    continue;
                };
                let strength = round_to(strength, 4);
                associations.push(FeatureAssociation {
                    feature: feature.name.clone(),
                    measure,
                    strength,
                    samples,
                    confidence: association_confidence(strength, samples),
                });
            }
        }
        associations.sort_by(|a, b| {
            b.strength
                .total_cmp(&a.strength)
                .then_with(|| a.feature.cmp(&b.feature))
        });
        debug!(associations = associations.len(), "Target associations ranked");

        Ok(StagePayload::TargetAnalysis(TargetReport {
            target: TargetSummary {
                column: target.to_string(),
                type_label: descriptor.type_label,
                kind,
                null_count: descriptor.null_count,
                class_balance,
                mean,
                std,
            },
            associations,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProfileError;
    use crate::test_fixtures::{sales_batch, StageHarness};

    #[tokio::test]
    async fn test_numeric_target() {
        let harness = StageHarness::from_batch("sales", sales_batch()).await;
        let payload = TargetAnalysisStage
            .analyze(&harness.context(Some("amount")))
            .await
            .unwrap();
        let report = payload.as_target_analysis().unwrap();

        assert_eq!(report.target.kind, Some(ColumnKind::Numeric));
        assert!(report.target.mean.is_some());
        assert!(report.target.class_balance.is_empty());

        let top = &report.associations[0];
        assert_eq!(top.feature, "discount");
        assert_eq!(top.measure, AssociationMeasure::Pearson);
        assert_eq!(top.strength, 1.0);
        assert!(report
            .associations
            .windows(2)
            .all(|w| w[0].strength >= w[1].strength));
    }

    #[tokio::test]
    async fn test_categorical_target() {
        let harness = StageHarness::from_batch("sales", sales_batch()).await;
        let payload = TargetAnalysisStage
            .analyze(&harness.context(Some("region")))
            .await
            .unwrap();
        let report = payload.as_target_analysis().unwrap();

        assert_eq!(report.target.kind, Some(ColumnKind::Categorical));
        let total: u64 = report.target.class_balance.iter().map(|c| c.count).sum();
        assert_eq!(total, 60);
        assert_eq!(report.top_features(1), vec!["channel"]);
        assert_eq!(report.associations[0].measure, AssociationMeasure::CramersV);
    }

    #[tokio::test]
    async fn test_missing_and_unknown_target() {
        let harness = StageHarness::from_batch("sales", sales_batch()).await;
        let err = TargetAnalysisStage
            .analyze(&harness.context(None))
            .await
            .unwrap_err();
        assert!(matches!(err, ProfileError::Precondition(_)));

        let err = TargetAnalysisStage
            .analyze(&harness.context(Some("nope")))
            .await
            .unwrap_err();
        assert!(matches!(err, ProfileError::ColumnNotFound { .. }));
    }
}
