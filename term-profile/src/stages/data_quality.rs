//! Constant and quasi-constant columns, and whitespace padding in text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::structural::top_value_share;
use crate::classifier::TypeLabel;
use crate::error::ProfileResult;
use crate::pipeline::{ProfilingStage, StageContext, StagePayload};
use crate::security::SqlSecurity;
use crate::stats::round_to;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuasiConstantColumn {
    pub column: String,
    /// Share of the sample held by the most frequent value, in percent
    pub top_value_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhitespaceIssue {
    pub column: String,
    pub leading: u64,
    pub trailing: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataQualityReport {
    pub constant_columns: Vec<String>,
    pub quasi_constant_columns: Vec<QuasiConstantColumn>,
    pub whitespace_issues: Vec<WhitespaceIssue>,
}

impl DataQualityReport {
    pub fn is_clean(&self) -> bool {
        self.constant_columns.is_empty()
            && self.quasi_constant_columns.is_empty()
            && self.whitespace_issues.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DataQualityStage;

#[async_trait]
impl ProfilingStage for DataQualityStage {
    fn name(&self) -> &str {
        "data_quality"
    }

    #[instrument(skip(self, ctx), fields(stage = "data_quality"))]
    async fn analyze(&self, ctx: &StageContext<'_>) -> ProfileResult<StagePayload> {
        let mut report = DataQualityReport::default();

        for descriptor in &ctx.overview.column_descriptors {
            if descriptor.type_label == TypeLabel::Constant {
                report.constant_columns.push(descriptor.name.clone());
                continue;
            }
            let values = ctx.sample.string_values(&descriptor.name)?;
            if let Some(share) = top_value_share(&values) {
                if share > ctx.config.quasi_constant_ratio {
                    report.quasi_constant_columns.push(QuasiConstantColumn {
                        column: descriptor.name.clone(),
                        top_value_pct: round_to(share * 100.0, 2),
                    });
                }
            }

            // LIKE only applies to string columns
            if descriptor.declared_dtype.is_text()
                && matches!(
                    descriptor.type_label,
                    TypeLabel::Categorical | TypeLabel::HighCardinalityText
                )
            {
                let col = ctx.table.quoted_column(&descriptor.name)?;
                let leading_pattern = SqlSecurity::quote_literal(" %")?;
                let trailing_pattern = SqlSecurity::quote_literal("% ")?;
                let leading = ctx
                    .table
                    .count_where(&format!("{col} LIKE {leading_pattern}"))
                    .await?;
                let trailing = ctx
                    .table
                    .count_where(&format!("{col} LIKE {trailing_pattern}"))
                    .await?;
                if leading > 0 || trailing > 0 {
                    report.whitespace_issues.push(WhitespaceIssue {
                        column: descriptor.name.clone(),
                        leading,
                        trailing,
                    });
                }
            }
        }

        Ok(StagePayload::DataQuality(report))
    }
}
