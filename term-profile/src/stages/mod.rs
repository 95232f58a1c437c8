//! Built-in profiling stages.
//!
//! The overview always runs first and is driven directly by the pipeline.
//! The remaining stages implement [`ProfilingStage`] and are returned in
//! registration order by [`standard_stages`]; the pipeline sorts them by
//! their declared dependencies.

use std::sync::Arc;

use crate::pipeline::ProfilingStage;

pub mod correlations;
pub mod data_quality;
pub mod health;
pub mod hypothesis_tests;
pub mod insights;
pub mod interactions;
pub mod missing_values;
pub mod outliers;
pub mod overview;
pub mod recommendations;
pub mod structural;
pub mod target;
pub mod univariate;

pub use correlations::{CorrelationReport, CorrelationStage};
pub use data_quality::{DataQualityReport, DataQualityStage};
pub use health::{HealthReport, HealthStage};
pub use hypothesis_tests::{HypothesisTestReport, HypothesisTestStage};
pub use insights::{InsightsReport, InsightsStage};
pub use interactions::{InteractionsReport, InteractionsStage};
pub use missing_values::{MissingValuesReport, MissingValuesStage};
pub use outliers::{OutlierReport, OutlierStage};
pub use overview::{ColumnDescriptor, DatasetSnapshot, OverviewReport, OverviewStage};
pub use recommendations::{RecommendationsReport, RecommendationsStage};
pub use structural::{Alert, AlertKind, StructuralReport};
pub use target::{TargetAnalysisStage, TargetReport};
pub use univariate::{UnivariateReport, UnivariateStage};

/// The eleven stages that follow the overview.
pub fn standard_stages() -> Vec<Arc<dyn ProfilingStage>> {
    vec![
        Arc::new(UnivariateStage),
        Arc::new(DataQualityStage),
        Arc::new(OutlierStage),
        Arc::new(MissingValuesStage),
        Arc::new(CorrelationStage),
        Arc::new(InteractionsStage),
        Arc::new(HypothesisTestStage),
        Arc::new(HealthStage),
        Arc::new(TargetAnalysisStage),
        Arc::new(InsightsStage),
        Arc::new(RecommendationsStage),
    ]
}
