//! Significance tests between columns, run on the sample.
//!
//! Pairs of categorical columns get a chi-squared test of independence.
//! Each numeric column is compared across the groups of every categorical
//! column: a t-test for two groups, a one-way ANOVA for more.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::classifier::TypeLabel;
use crate::error::{ProfileError, ProfileResult};
use crate::pipeline::{ProfilingStage, StageContext, StagePayload};
use crate::stats::{chi_squared_test, one_way_anova, round_to, t_test, TestStatistic};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChiSquaredTest {
    pub variables: [String; 2],
    pub statistic: f64,
    pub dof: usize,
    pub p_value: f64,
    pub significant: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeanTestKind {
    #[serde(rename = "t_test")]
    TTest,
    #[serde(rename = "anova")]
    Anova,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanComparisonTest {
    pub numeric_variable: String,
    pub categorical_variable: String,
    pub test_type: MeanTestKind,
    pub groups: usize,
    pub statistic: f64,
    pub p_value: f64,
    pub significant: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HypothesisTestReport {
    pub chi_squared_tests: Vec<ChiSquaredTest>,
    pub mean_comparison_tests: Vec<MeanComparisonTest>,
}

impl HypothesisTestReport {
    pub fn significant_count(&self) -> usize {
        self.chi_squared_tests.iter().filter(|t| t.significant).count()
            + self
                .mean_comparison_tests
                .iter()
                .filter(|t| t.significant)
                .count()
    }
}

/// Numeric values grouped by category, in category order. Rows missing
/// either value are left out.
fn group_by_category(categories: &[Option<String>], values: &[Option<f64>]) -> Vec<Vec<f64>> {
    let mut groups: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for (category, value) in categories.iter().zip(values) {
        if let (Some(category), Some(value)) = (category, value) {
            if value.is_finite() {
                groups.entry(category.as_str()).or_default().push(*value);
            }
        }
    }
    groups.into_values().collect()
}

fn rounded(test: TestStatistic) -> (f64, f64) {
    (round_to(test.statistic, 4), round_to(test.p_value, 4))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HypothesisTestStage;

#[async_trait]
impl ProfilingStage for HypothesisTestStage {
    fn name(&self) -> &str {
        "hypothesis_tests"
    }

    #[instrument(skip(self, ctx), fields(stage = "hypothesis_tests"))]
    async fn analyze(&self, ctx: &StageContext<'_>) -> ProfileResult<StagePayload> {
        let alpha = ctx.config.significance_level;
        let categorical: Vec<String> = ctx
            .overview
            .columns_where(|label| matches!(label, TypeLabel::Categorical | TypeLabel::Boolean))
            .into_iter()
            .map(|d| d.name.clone())
            .collect();
        let numeric: Vec<String> = ctx
            .overview
            .numeric_columns()
            .into_iter()
            .map(|d| d.name.clone())
            .collect();
        if categorical.is_empty() || (categorical.len() < 2 && numeric.is_empty()) {
            return Err(ProfileError::precondition(
                "no categorical pairs or numeric-categorical pairs to test",
            ));
        }

        let mut category_values = Vec::with_capacity(categorical.len());
        for name in &categorical {
            category_values.push(ctx.sample.string_values(name)?);
        }
        let mut report = HypothesisTestReport::default();

        for i in 0..categorical.len() {
            for j in (i + 1)..categorical.len() {
                let pairs: Vec<(&str, &str)> = category_values[i]
                    .iter()
                    .zip(&category_values[j])
                    .filter_map(|(a, b)| Some((a.as_deref()?, b.as_deref()?)))
                    .collect();
                let Some((test, dof)) = chi_squared_test(&pairs) else {
                    continue;
                };
                let (statistic, p_value) = rounded(test);
                report.chi_squared_tests.push(ChiSquaredTest {
                    variables: [categorical[i].clone(), categorical[j].clone()],
                    statistic,
                    dof,
                    p_value,
                    significant: test.p_value < alpha,
                });
            }
        }

        for numeric_name in &numeric {
            let values = ctx.sample.numeric_values(numeric_name)?;
            for (category_name, categories) in categorical.iter().zip(&category_values) {
                let groups = group_by_category(categories, &values);
                let (test_type, test) = match groups.len() {
                    0 | 1 => continue,
                    2 => (MeanTestKind::TTest, t_test(&groups[0], &groups[1])),
                    _ => (MeanTestKind::Anova, one_way_anova(&groups)),
                };
                let Some(test) = test else {
                    continue;
                };
                let (statistic, p_value) = rounded(test);
                report.mean_comparison_tests.push(MeanComparisonTest {
                    numeric_variable: numeric_name.clone(),
                    categorical_variable: category_name.clone(),
                    test_type,
                    groups: groups.len(),
                    statistic,
                    p_value,
                    significant: test.p_value < alpha,
                });
            }
        }

        if report.chi_squared_tests.is_empty() && report.mean_comparison_tests.is_empty() {
            return Err(ProfileError::precondition(
                "no column pair produced a defined test statistic",
            ));
        }
        debug!(
            chi_squared = report.chi_squared_tests.len(),
            mean_comparisons = report.mean_comparison_tests.len(),
            significant = report.significant_count(),
            "Hypothesis tests computed"
        );
        Ok(StagePayload::HypothesisTests(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{partitioned_table, sales_batch, StageHarness};

    #[test]
    fn test_groups_follow_category_order() {
        let categories = vec![
            Some("b".to_string()),
            Some("a".to_string()),
            None,
            Some("b".to_string()),
        ];
        let values = vec![Some(1.0), Some(2.0), Some(3.0), None];
        assert_eq!(group_by_category(&categories, &values), vec![vec![2.0], vec![1.0]]);
    }

    #[tokio::test]
    async fn test_chi_squared_and_mean_comparisons() {
        let harness = StageHarness::from_batch("sales", sales_batch()).await;
        let payload = HypothesisTestStage
            .analyze(&harness.context(None))
            .await
            .unwrap();
        let report = payload.as_hypothesis_tests().unwrap();

        // channel is derived from region
        let dependent = report
            .chi_squared_tests
            .iter()
            .find(|t| t.variables == ["region".to_string(), "channel".to_string()])
            .unwrap();
        assert_eq!(dependent.dof, 2);
        assert!(dependent.statistic > 50.0);
        assert_eq!(dependent.p_value, 0.0);
        assert!(dependent.significant);

        let by_region = report
            .mean_comparison_tests
            .iter()
            .find(|t| t.numeric_variable == "amount" && t.categorical_variable == "region")
            .unwrap();
        assert_eq!(by_region.test_type, MeanTestKind::Anova);
        assert_eq!(by_region.groups, 3);

        let by_channel = report
            .mean_comparison_tests
            .iter()
            .find(|t| t.numeric_variable == "discount" && t.categorical_variable == "channel")
            .unwrap();
        assert_eq!(by_channel.test_type, MeanTestKind::TTest);
        assert!((0.0..=1.0).contains(&by_channel.p_value));

        assert!(!report
            .mean_comparison_tests
            .iter()
            .any(|t| t.categorical_variable == "order_id"));
        assert!(report.significant_count() >= 1);
    }

    #[tokio::test]
    async fn test_no_candidates_is_precondition() {
        let harness = StageHarness::new(partitioned_table(&[5, 5]).unwrap()).await;
        let err = HypothesisTestStage
            .analyze(&harness.context(None))
            .await
            .unwrap_err();
        assert!(matches!(err, ProfileError::Precondition(_)));
    }
}
