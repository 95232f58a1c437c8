//! The stage abstraction and the data a stage sees.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::result_map::ResultMap;
use crate::config::ProfileConfig;
use crate::error::{ErrorKind, ProfileError, ProfileResult};
use crate::sampling::Sample;
use crate::stages::{
    ColumnDescriptor, CorrelationReport, DataQualityReport, HealthReport, HypothesisTestReport,
    InsightsReport, InteractionsReport, MissingValuesReport, OutlierReport, OverviewReport,
    RecommendationsReport, TargetReport, UnivariateReport,
};
use crate::table::TableHandle;

/// Name of the mandatory first stage.
pub const OVERVIEW_STAGE: &str = "overview";

/// One unit of profiling analysis.
///
/// Stages run sequentially after the overview. A stage reads the table,
/// the overview and the results of earlier stages, and returns a typed
/// payload. Returning [`ProfileError::Precondition`] marks the stage as
/// skipped; any other error (or a panic) marks it as failed without
/// stopping the run.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use term_profile::prelude::*;
///
/// struct RowCount;
///
/// #[async_trait]
/// impl ProfilingStage for RowCount {
///     fn name(&self) -> &str {
///         "row_count"
///     }
///
///     async fn analyze(&self, ctx: &StageContext<'_>) -> ProfileResult<StagePayload> {
///         Ok(StagePayload::Custom(serde_json::json!({
///             "rows": ctx.overview.dataset_snapshot.row_count
///         })))
///     }
/// }
/// ```
#[async_trait]
pub trait ProfilingStage: Send + Sync {
    /// Unique stage identifier used as the result-map key.
    fn name(&self) -> &str;

    /// Stages that must have succeeded before this one runs.
    fn requires(&self) -> Vec<String> {
        vec![OVERVIEW_STAGE.to_string()]
    }

    /// Stages that must run first if present, whatever their outcome.
    fn runs_after(&self) -> Vec<String> {
        vec![]
    }

    /// Whether the stage needs a target column.
    fn requires_target(&self) -> bool {
        false
    }

    async fn analyze(&self, ctx: &StageContext<'_>) -> ProfileResult<StagePayload>;
}

/// Read-only inputs handed to a stage.
pub struct StageContext<'a> {
    pub table: &'a TableHandle,
    pub overview: &'a OverviewReport,
    pub sample: &'a Sample,
    pub target: Option<&'a str>,
    pub results: &'a ResultMap,
    pub config: &'a ProfileConfig,
}

impl<'a> StageContext<'a> {
    /// The target column, or a precondition error when none was supplied.
    pub fn target_column(&self) -> ProfileResult<&'a str> {
        self.target
            .ok_or_else(|| ProfileError::precondition("no target column supplied"))
    }

    pub fn descriptor(&self, column: &str) -> ProfileResult<&'a ColumnDescriptor> {
        self.overview
            .descriptor(column)
            .ok_or_else(|| ProfileError::column_not_found(column))
    }

    /// Payload of an earlier stage that succeeded.
    pub fn result(&self, stage: &str) -> Option<&'a StagePayload> {
        self.results.payload(stage)
    }
}

/// Typed success payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StagePayload {
    Overview(Box<OverviewReport>),
    Univariate(UnivariateReport),
    DataQuality(DataQualityReport),
    Outliers(OutlierReport),
    MissingValues(MissingValuesReport),
    Correlations(CorrelationReport),
    Interactions(InteractionsReport),
    HypothesisTests(HypothesisTestReport),
    Health(HealthReport),
    TargetAnalysis(TargetReport),
    Insights(InsightsReport),
    Recommendations(RecommendationsReport),
    /// Free-form output from user-defined stages
    Custom(serde_json::Value),
}

impl StagePayload {
    pub fn as_overview(&self) -> Option<&OverviewReport> {
        match self {
            StagePayload::Overview(report) => Some(report),
            _ => None,
        }
    }

    pub fn as_univariate(&self) -> Option<&UnivariateReport> {
        match self {
            StagePayload::Univariate(report) => Some(report),
            _ => None,
        }
    }

    pub fn as_data_quality(&self) -> Option<&DataQualityReport> {
        match self {
            StagePayload::DataQuality(report) => Some(report),
            _ => None,
        }
    }

    pub fn as_outliers(&self) -> Option<&OutlierReport> {
        match self {
            StagePayload::Outliers(report) => Some(report),
            _ => None,
        }
    }

    pub fn as_missing_values(&self) -> Option<&MissingValuesReport> {
        match self {
            StagePayload::MissingValues(report) => Some(report),
            _ => None,
        }
    }

    pub fn as_correlations(&self) -> Option<&CorrelationReport> {
        match self {
            StagePayload::Correlations(report) => Some(report),
            _ => None,
        }
    }

    pub fn as_interactions(&self) -> Option<&InteractionsReport> {
        match self {
            StagePayload::Interactions(report) => Some(report),
            _ => None,
        }
    }

    pub fn as_hypothesis_tests(&self) -> Option<&HypothesisTestReport> {
        match self {
            StagePayload::HypothesisTests(report) => Some(report),
            _ => None,
        }
    }

    pub fn as_health(&self) -> Option<&HealthReport> {
        match self {
            StagePayload::Health(report) => Some(report),
            _ => None,
        }
    }

    pub fn as_target_analysis(&self) -> Option<&TargetReport> {
        match self {
            StagePayload::TargetAnalysis(report) => Some(report),
            _ => None,
        }
    }

    pub fn as_insights(&self) -> Option<&InsightsReport> {
        match self {
            StagePayload::Insights(report) => Some(report),
            _ => None,
        }
    }

    pub fn as_recommendations(&self) -> Option<&RecommendationsReport> {
        match self {
            StagePayload::Recommendations(report) => Some(report),
            _ => None,
        }
    }

    pub fn as_custom(&self) -> Option<&serde_json::Value> {
        match self {
            StagePayload::Custom(value) => Some(value),
            _ => None,
        }
    }
}

/// Lifecycle of a stage within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageState {
    Pending,
    Running,
    Succeeded,
    Skipped,
    Failed,
}

impl StageState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StageState::Succeeded | StageState::Skipped | StageState::Failed
        )
    }

    /// Legal moves: `Pending -> Running | Skipped` and
    /// `Running -> Succeeded | Skipped | Failed`.
    pub fn can_transition_to(self, next: StageState) -> bool {
        matches!(
            (self, next),
            (StageState::Pending, StageState::Running)
                | (StageState::Pending, StageState::Skipped)
                | (StageState::Running, StageState::Succeeded)
                | (StageState::Running, StageState::Skipped)
                | (StageState::Running, StageState::Failed)
        )
    }
}

impl std::fmt::Display for StageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StageState::Pending => "pending",
            StageState::Running => "running",
            StageState::Succeeded => "succeeded",
            StageState::Skipped => "skipped",
            StageState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Terminal result of one stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StageOutcome {
    Succeeded { payload: StagePayload },
    Skipped { reason: String },
    Failed { kind: ErrorKind, message: String },
}

impl StageOutcome {
    pub fn state(&self) -> StageState {
        match self {
            StageOutcome::Succeeded { .. } => StageState::Succeeded,
            StageOutcome::Skipped { .. } => StageState::Skipped,
            StageOutcome::Failed { .. } => StageState::Failed,
        }
    }

    pub fn payload(&self) -> Option<&StagePayload> {
        match self {
            StageOutcome::Succeeded { payload } => Some(payload),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_machine() {
        use StageState::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Pending.can_transition_to(Skipped));
        assert!(Running.can_transition_to(Succeeded));
        assert!(Running.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Succeeded));
        assert!(!Succeeded.can_transition_to(Running));
        assert!(!Failed.can_transition_to(Pending));
        assert!(Skipped.is_terminal());
        assert!(!Running.is_terminal());
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = StageOutcome::Failed {
            kind: ErrorKind::StageFailure,
            message: "boom".into(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["kind"], "StageFailure");

        let custom = StageOutcome::Succeeded {
            payload: StagePayload::Custom(serde_json::json!({"rows": 3})),
        };
        let json = serde_json::to_value(&custom).unwrap();
        assert_eq!(json["payload"]["type"], "custom");
        assert_eq!(json["payload"]["data"]["rows"], 3);
        assert_eq!(custom.state(), StageState::Succeeded);
    }
}
