//! The final output of a profiling run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::result_map::ResultMap;
use super::stage::{StagePayload, StageState};
use crate::error::ProfileResult;
use crate::stages::OverviewReport;

/// Everything a run produced. The sample is not part of the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileReport {
    pub dataset_name: String,
    pub target_column: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: ResultMap,
}

impl ProfileReport {
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    pub fn overview(&self) -> Option<&OverviewReport> {
        self.results.overview()
    }

    pub fn payload(&self, stage: &str) -> Option<&StagePayload> {
        self.results.payload(stage)
    }

    pub fn state_of(&self, stage: &str) -> Option<StageState> {
        self.results.state_of(stage)
    }

    /// Final state of every stage in execution order.
    pub fn stage_states(&self) -> Vec<(&str, StageState)> {
        self.results
            .iter()
            .map(|r| (r.stage.as_str(), r.state()))
            .collect()
    }

    pub fn to_json(&self) -> ProfileResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> ProfileResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
