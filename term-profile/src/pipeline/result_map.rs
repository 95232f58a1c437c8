//! Ordered, append-only collection of stage results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::stage::{StageOutcome, StagePayload, StageState, OVERVIEW_STAGE};
use crate::error::{ProfileError, ProfileResult};
use crate::stages::OverviewReport;

/// The recorded result of one stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: String,
    #[serde(flatten)]
    pub outcome: StageOutcome,
    pub duration_ms: u64,
}

impl StageResult {
    pub fn state(&self) -> StageState {
        self.outcome.state()
    }
}

/// Stage results in execution order, looked up by stage name.
///
/// Only the orchestrator appends; stages receive a shared reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<StageResult>", into = "Vec<StageResult>")]
pub struct ResultMap {
    entries: Vec<StageResult>,
    index: HashMap<String, usize>,
}

impl ResultMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a result. A stage name can be recorded only once.
    pub(crate) fn push(&mut self, result: StageResult) -> ProfileResult<()> {
        if self.index.contains_key(&result.stage) {
            return Err(ProfileError::internal(format!(
                "Result for stage '{}' already recorded",
                result.stage
            )));
        }
        self.index.insert(result.stage.clone(), self.entries.len());
        self.entries.push(result);
        Ok(())
    }

    pub fn get(&self, stage: &str) -> Option<&StageResult> {
        self.index.get(stage).map(|&idx| &self.entries[idx])
    }

    /// Payload of a stage that succeeded.
    pub fn payload(&self, stage: &str) -> Option<&StagePayload> {
        self.get(stage).and_then(|r| r.outcome.payload())
    }

    pub fn state_of(&self, stage: &str) -> Option<StageState> {
        self.get(stage).map(StageResult::state)
    }

    pub fn succeeded(&self, stage: &str) -> bool {
        self.state_of(stage) == Some(StageState::Succeeded)
    }

    pub fn overview(&self) -> Option<&OverviewReport> {
        self.payload(OVERVIEW_STAGE)
            .and_then(StagePayload::as_overview)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StageResult> {
        self.entries.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|r| r.stage.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of results in the given state.
    pub fn count(&self, state: StageState) -> usize {
        self.entries.iter().filter(|r| r.state() == state).count()
    }
}

impl TryFrom<Vec<StageResult>> for ResultMap {
    type Error = ProfileError;

    /// Rebuilds a map; a stage recorded twice is rejected.
    fn try_from(results: Vec<StageResult>) -> ProfileResult<Self> {
        let mut map = ResultMap::new();
        for result in results {
            map.push(result)?;
        }
        Ok(map)
    }
}

impl From<ResultMap> for Vec<StageResult> {
    fn from(map: ResultMap) -> Self {
        map.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn skipped(stage: &str) -> StageResult {
        StageResult {
            stage: stage.to_string(),
            outcome: StageOutcome::Skipped {
                reason: "n/a".into(),
            },
            duration_ms: 0,
        }
    }

    #[test]
    fn test_append_only_and_ordered() {
        let mut map = ResultMap::new();
        map.push(skipped("b")).unwrap();
        map.push(StageResult {
            stage: "a".into(),
            outcome: StageOutcome::Failed {
                kind: ErrorKind::StageFailure,
                message: "boom".into(),
            },
            duration_ms: 3,
        })
        .unwrap();

        assert_eq!(map.names(), vec!["b", "a"]);
        assert!(map.push(skipped("a")).is_err());
        assert_eq!(map.state_of("a"), Some(StageState::Failed));
        assert_eq!(map.count(StageState::Skipped), 1);
        assert!(map.payload("a").is_none());
        assert!(map.get("missing").is_none());
    }

    #[test]
    fn test_serde_round_trip_keeps_order() {
        let mut map = ResultMap::new();
        map.push(skipped("z")).unwrap();
        map.push(StageResult {
            stage: "custom".into(),
            outcome: StageOutcome::Succeeded {
                payload: StagePayload::Custom(serde_json::json!({"k": 1})),
            },
            duration_ms: 1,
        })
        .unwrap();

        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json[0]["stage"], "z");
        assert_eq!(json[0]["state"], "skipped");
        assert_eq!(json[1]["payload"]["data"]["k"], 1);

        let back: ResultMap = serde_json::from_value(json).unwrap();
        assert_eq!(back.names(), vec!["z", "custom"]);
        assert!(back.succeeded("custom"));
    }

    #[test]
    fn test_duplicate_stage_fails_to_load() {
        let json = serde_json::to_value(vec![skipped("outliers"), skipped("outliers")]).unwrap();
        let err = serde_json::from_value::<ResultMap>(json).unwrap_err();
        assert!(err.to_string().contains("outliers"));

        let err = ResultMap::try_from(vec![skipped("a"), skipped("b"), skipped("a")]).unwrap_err();
        assert!(matches!(err, ProfileError::Internal(_)));
    }
}
