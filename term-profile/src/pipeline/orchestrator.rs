//! Runs the overview and then every registered stage in dependency order.

use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use tracing::{debug, instrument};

use super::events::{FnObserver, PipelineEvent, PipelineObserver, TracingObserver};
use super::report::ProfileReport;
use super::result_map::{ResultMap, StageResult};
use super::stage::{
    ProfilingStage, StageContext, StageOutcome, StagePayload, StageState, OVERVIEW_STAGE,
};
use crate::config::ProfileConfig;
use crate::error::{ProfileError, ProfileResult};
use crate::logging::LogConfig;
use crate::stages::{self, OverviewStage};
use crate::table::TableHandle;

/// A configured, dependency-ordered profiling pipeline.
///
/// # Example
///
/// ```rust,no_run
/// use term_profile::prelude::*;
///
/// # async fn example() -> ProfileResult<()> {
/// let pipeline = Pipeline::standard(ProfileConfig::default())?;
/// let table = TableHandle::from_csv("customers.csv").await?;
/// let report = pipeline.run(&table, Some("churned")).await?;
///
/// for (stage, state) in report.stage_states() {
///     println!("{stage}: {state}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct Pipeline {
    config: ProfileConfig,
    overview: OverviewStage,
    stages: Vec<Arc<dyn ProfilingStage>>,
    observers: Vec<Arc<dyn PipelineObserver>>,
    log_config: LogConfig,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// The overview plus the eleven built-in stages.
    pub fn standard(config: ProfileConfig) -> ProfileResult<Self> {
        Self::builder().config(config).standard_stages().build()
    }

    pub fn config(&self) -> &ProfileConfig {
        &self.config
    }

    /// Stage names in execution order, overview first.
    pub fn stage_names(&self) -> Vec<&str> {
        std::iter::once(OVERVIEW_STAGE)
            .chain(self.stages.iter().map(|s| s.name()))
            .collect()
    }

    /// Loads a CSV file and profiles it. A load failure aborts before any stage runs.
    ///
    /// The loaded table logs queries and sampling plans according to the
    /// pipeline's [`LogConfig`].
    pub async fn run_csv(
        &self,
        path: impl AsRef<Path>,
        target: Option<&str>,
    ) -> ProfileResult<ProfileReport> {
        let table = match TableHandle::from_csv(path).await {
            Ok(table) => table.with_log_config(self.log_config.clone()),
            Err(e) => return Err(self.abort(e)),
        };
        self.run(&table, target).await
    }

    /// Profiles a table.
    ///
    /// Fails only when the overview fails. Every other stage ends up in the
    /// report as succeeded, skipped or failed.
    #[instrument(skip(self, table), fields(dataset = %table.name()))]
    pub async fn run(
        &self,
        table: &TableHandle,
        target: Option<&str>,
    ) -> ProfileResult<ProfileReport> {
        let started_at = Utc::now();
        let run_start = Instant::now();
        self.emit(PipelineEvent::RunStarted {
            dataset: table.name().to_string(),
            stages: self.stages.len() + 1,
        });

        let mut tracker = StageTracker::new(self.stage_names());
        let mut results = ResultMap::new();

        tracker.transition(OVERVIEW_STAGE, StageState::Running)?;
        self.emit(PipelineEvent::StageStarted {
            stage: OVERVIEW_STAGE.to_string(),
        });
        let overview_start = Instant::now();
        let (overview, sample) = match AssertUnwindSafe(self.overview.run(table))
            .catch_unwind()
            .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(self.abort(e)),
            Err(panic) => {
                return Err(self.abort(ProfileError::overview(format!(
                    "overview panicked: {}",
                    panic_message(panic.as_ref())
                ))))
            }
        };
        tracker.transition(OVERVIEW_STAGE, StageState::Succeeded)?;
        let duration_ms = elapsed_ms(overview_start);
        self.emit(PipelineEvent::StageSucceeded {
            stage: OVERVIEW_STAGE.to_string(),
            duration_ms,
        });
        results.push(StageResult {
            stage: OVERVIEW_STAGE.to_string(),
            outcome: StageOutcome::Succeeded {
                payload: StagePayload::Overview(Box::new(overview)),
            },
            duration_ms,
        })?;

        for stage in &self.stages {
            let name = stage.name().to_string();
            let stage_start = Instant::now();

            let outcome = match skip_reason(stage.as_ref(), target, &results) {
                Some(reason) => StageOutcome::Skipped { reason },
                None => {
                    tracker.transition(&name, StageState::Running)?;
                    self.emit(PipelineEvent::StageStarted {
                        stage: name.clone(),
                    });
                    let overview = results
                        .overview()
                        .ok_or_else(|| ProfileError::internal("overview result missing"))?;
                    let ctx = StageContext {
                        table,
                        overview,
                        sample: &sample,
                        target,
                        results: &results,
                        config: &self.config,
                    };
                    let result = AssertUnwindSafe(stage.analyze(&ctx)).catch_unwind().await;
                    outcome_from(&name, result)
                }
            };

            tracker.transition(&name, outcome.state())?;
            let duration_ms = elapsed_ms(stage_start);
            self.emit(match &outcome {
                StageOutcome::Succeeded { .. } => PipelineEvent::StageSucceeded {
                    stage: name.clone(),
                    duration_ms,
                },
                StageOutcome::Skipped { reason } => PipelineEvent::StageSkipped {
                    stage: name.clone(),
                    reason: reason.clone(),
                },
                StageOutcome::Failed { kind, message } => PipelineEvent::StageFailed {
                    stage: name.clone(),
                    kind: *kind,
                    message: message.clone(),
                },
            });
            results.push(StageResult {
                stage: name,
                outcome,
                duration_ms,
            })?;
        }

        self.emit(PipelineEvent::RunFinished {
            succeeded: results.count(StageState::Succeeded),
            skipped: results.count(StageState::Skipped),
            failed: results.count(StageState::Failed),
            duration_ms: elapsed_ms(run_start),
        });

        Ok(ProfileReport {
            dataset_name: table.name().to_string(),
            target_column: target.map(str::to_string),
            started_at,
            finished_at: Utc::now(),
            results,
        })
    }

    fn emit(&self, event: PipelineEvent) {
        for observer in &self.observers {
            observer.on_event(&event);
        }
    }

    /// Normalizes a fatal error and reports the abort.
    fn abort(&self, err: ProfileError) -> ProfileError {
        let err = match err {
            ProfileError::Load { .. } | ProfileError::Overview(_) => err,
            other => ProfileError::overview(other.to_string()),
        };
        self.emit(PipelineEvent::RunAborted {
            kind: err.kind(),
            message: err.to_string(),
        });
        err
    }
}

fn skip_reason(
    stage: &dyn ProfilingStage,
    target: Option<&str>,
    results: &ResultMap,
) -> Option<String> {
    if stage.requires_target() && target.is_none() {
        return Some("requires a target column but none was supplied".to_string());
    }
    stage
        .requires()
        .into_iter()
        .find(|dep| !results.succeeded(dep))
        .map(|dep| format!("dependency '{dep}' did not succeed"))
}

fn outcome_from(
    stage: &str,
    result: Result<ProfileResult<StagePayload>, Box<dyn Any + Send>>,
) -> StageOutcome {
    let err = match result {
        Ok(Ok(payload)) => return StageOutcome::Succeeded { payload },
        Ok(Err(ProfileError::Precondition(reason))) => return StageOutcome::Skipped { reason },
        Ok(Err(e)) => ProfileError::stage(stage, e.to_string()),
        Err(panic) => ProfileError::stage(
            stage,
            format!("stage panicked: {}", panic_message(panic.as_ref())),
        ),
    };
    StageOutcome::Failed {
        kind: err.kind(),
        message: err.to_string(),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Enforces the per-stage state machine within one run.
struct StageTracker {
    states: Vec<(String, StageState)>,
}

impl StageTracker {
    fn new(names: Vec<&str>) -> Self {
        Self {
            states: names
                .into_iter()
                .map(|n| (n.to_string(), StageState::Pending))
                .collect(),
        }
    }

    fn transition(&mut self, stage: &str, next: StageState) -> ProfileResult<()> {
        let entry = self
            .states
            .iter_mut()
            .find(|(name, _)| name == stage)
            .ok_or_else(|| ProfileError::internal(format!("Unknown stage '{stage}'")))?;
        if !entry.1.can_transition_to(next) {
            return Err(ProfileError::internal(format!(
                "Illegal transition for stage '{stage}': {} -> {next}",
                entry.1
            )));
        }
        debug!(stage, from = %entry.1, to = %next, "Stage transition");
        entry.1 = next;
        Ok(())
    }
}

/// Builder for [`Pipeline`].
pub struct PipelineBuilder {
    config: ProfileConfig,
    stages: Vec<Arc<dyn ProfilingStage>>,
    observers: Vec<Arc<dyn PipelineObserver>>,
    tracing: Option<LogConfig>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self {
            config: ProfileConfig::default(),
            stages: Vec::new(),
            observers: Vec::new(),
            tracing: Some(LogConfig::default()),
        }
    }
}

impl PipelineBuilder {
    pub fn config(mut self, config: ProfileConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers a stage. Registration order breaks ordering ties.
    pub fn stage<S>(mut self, stage: S) -> Self
    where
        S: ProfilingStage + 'static,
    {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Registers the eleven built-in stages that follow the overview.
    pub fn standard_stages(mut self) -> Self {
        self.stages.extend(stages::standard_stages());
        self
    }

    pub fn observer<O>(mut self, observer: O) -> Self
    where
        O: PipelineObserver + 'static,
    {
        self.observers.push(Arc::new(observer));
        self
    }

    /// Subscribes a closure to pipeline events.
    pub fn on_event<F>(self, callback: F) -> Self
    where
        F: Fn(&PipelineEvent) + Send + Sync + 'static,
    {
        self.observer(FnObserver(callback))
    }

    /// Configures the built-in tracing observer.
    pub fn log_config(mut self, config: LogConfig) -> Self {
        self.tracing = Some(config);
        self
    }

    /// Removes the built-in tracing observer.
    pub fn without_tracing(mut self) -> Self {
        self.tracing = None;
        self
    }

    /// Validates the configuration and orders the stages.
    pub fn build(self) -> ProfileResult<Pipeline> {
        self.config.validate()?;
        let stages = order_stages(self.stages)?;

        let log_config = self.tracing.clone().unwrap_or_default();
        let mut observers: Vec<Arc<dyn PipelineObserver>> = Vec::new();
        if let Some(tracing_config) = self.tracing {
            observers.push(Arc::new(TracingObserver::new(tracing_config)));
        }
        observers.extend(self.observers);

        Ok(Pipeline {
            overview: OverviewStage::new(self.config.clone()),
            config: self.config,
            stages,
            observers,
            log_config,
        })
    }
}

/// Stable topological order over `requires` and `runs_after`.
fn order_stages(stages: Vec<Arc<dyn ProfilingStage>>) -> ProfileResult<Vec<Arc<dyn ProfilingStage>>> {
    let mut names: HashSet<String> = HashSet::new();
    for stage in &stages {
        let name = stage.name();
        if name.is_empty() {
            return Err(ProfileError::configuration("Stage names must not be empty"));
        }
        if name == OVERVIEW_STAGE || !names.insert(name.to_string()) {
            return Err(ProfileError::configuration(format!(
                "Duplicate stage name '{name}'"
            )));
        }
    }

    let mut deps: Vec<Vec<String>> = Vec::with_capacity(stages.len());
    for stage in &stages {
        let mut edges = Vec::new();
        for dep in stage.requires() {
            if dep == OVERVIEW_STAGE {
                continue;
            }
            if !names.contains(&dep) {
                return Err(ProfileError::configuration(format!(
                    "Stage '{}' requires unknown stage '{dep}'",
                    stage.name()
                )));
            }
            edges.push(dep);
        }
        // Soft ordering only applies to stages that are registered
        edges.extend(
            stage
                .runs_after()
                .into_iter()
                .filter(|dep| names.contains(dep)),
        );
        deps.push(edges);
    }

    let mut placed = vec![false; stages.len()];
    let mut placed_names: HashSet<&str> = HashSet::new();
    let mut order = Vec::with_capacity(stages.len());
    while order.len() < stages.len() {
        let next = (0..stages.len()).find(|&i| {
            !placed[i] && deps[i].iter().all(|d| placed_names.contains(d.as_str()))
        });
        match next {
            Some(i) => {
                placed[i] = true;
                placed_names.insert(stages[i].name());
                order.push(i);
            }
            None => {
                let stuck: Vec<&str> = (0..stages.len())
                    .filter(|&i| !placed[i])
                    .map(|i| stages[i].name())
                    .collect();
                return Err(ProfileError::configuration(format!(
                    "Dependency cycle among stages: {}",
                    stuck.join(", ")
                )));
            }
        }
    }

    Ok(order.into_iter().map(|i| stages[i].clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use async_trait::async_trait;

    struct Named {
        name: &'static str,
        requires: Vec<&'static str>,
        after: Vec<&'static str>,
    }

    #[async_trait]
    impl ProfilingStage for Named {
        fn name(&self) -> &str {
            self.name
        }

        fn requires(&self) -> Vec<String> {
            self.requires.iter().map(|s| s.to_string()).collect()
        }

        fn runs_after(&self) -> Vec<String> {
            self.after.iter().map(|s| s.to_string()).collect()
        }

        async fn analyze(&self, _ctx: &StageContext<'_>) -> ProfileResult<StagePayload> {
            Ok(StagePayload::Custom(serde_json::Value::Null))
        }
    }

    fn named(name: &'static str, requires: &[&'static str], after: &[&'static str]) -> Named {
        Named {
            name,
            requires: requires.to_vec(),
            after: after.to_vec(),
        }
    }

    #[test]
    fn test_dependencies_reorder_registration() {
        let pipeline = Pipeline::builder()
            .without_tracing()
            .stage(named("synthesis", &["overview", "b"], &["a"]))
            .stage(named("a", &["overview"], &[]))
            .stage(named("b", &["overview"], &[]))
            .build()
            .unwrap();
        assert_eq!(pipeline.stage_names(), vec!["overview", "a", "b", "synthesis"]);
    }

    #[test]
    fn test_soft_dependency_on_absent_stage_is_ignored() {
        let pipeline = Pipeline::builder()
            .stage(named("x", &["overview"], &["not_registered"]))
            .build()
            .unwrap();
        assert_eq!(pipeline.stage_names(), vec!["overview", "x"]);
    }

    #[test]
    fn test_invalid_definitions() {
        let unknown = Pipeline::builder()
            .stage(named("x", &["missing"], &[]))
            .build()
            .unwrap_err();
        assert!(unknown.to_string().contains("unknown stage 'missing'"));

        let duplicate = Pipeline::builder()
            .stage(named("x", &[], &[]))
            .stage(named("x", &[], &[]))
            .build()
            .unwrap_err();
        assert!(duplicate.to_string().contains("Duplicate stage name"));

        let reserved = Pipeline::builder()
            .stage(named("overview", &[], &[]))
            .build();
        assert!(reserved.is_err());

        let cycle = Pipeline::builder()
            .stage(named("a", &["b"], &[]))
            .stage(named("b", &[], &["a"]))
            .build()
            .unwrap_err();
        assert!(matches!(cycle, ProfileError::Configuration(_)));
        assert!(cycle.to_string().contains("cycle"));
    }

    #[test]
    fn test_standard_order() {
        let pipeline = Pipeline::standard(ProfileConfig::default()).unwrap();
        let names = pipeline.stage_names();
        assert_eq!(names[0], "overview");
        assert_eq!(names.len(), 12);
        let pos = |n: &str| names.iter().position(|&x| x == n).unwrap();
        assert!(pos("outliers") < pos("health"));
        assert!(pos("health") < pos("insights"));
        assert!(pos("correlations") < pos("insights"));
        assert!(pos("correlations") < pos("interactions"));
        assert!(pos("interactions") < pos("hypothesis_tests"));
        assert!(pos("target_analysis") < pos("insights"));
        assert!(pos("insights") < pos("recommendations"));
    }

    #[test]
    fn test_tracker_rejects_illegal_moves() {
        let mut tracker = StageTracker::new(vec!["a"]);
        assert!(tracker.transition("a", StageState::Succeeded).is_err());
        tracker.transition("a", StageState::Running).unwrap();
        tracker.transition("a", StageState::Failed).unwrap();
        assert!(tracker.transition("a", StageState::Running).is_err());
        assert!(tracker.transition("b", StageState::Running).is_err());
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }

    #[test]
    fn test_failures_name_their_stage() {
        let outcome = outcome_from("outliers", Ok(Err(ProfileError::invalid_data("bad cast"))));
        match outcome {
            StageOutcome::Failed { kind, message } => {
                assert_eq!(kind, ErrorKind::StageFailure);
                assert_eq!(message, "Stage 'outliers' failed: Invalid data: bad cast");
            }
            other => panic!("expected failure, got {other:?}"),
        }

        let panicked: Box<dyn Any + Send> = Box::new("boom");
        match outcome_from("univariate", Err(panicked)) {
            StageOutcome::Failed { message, .. } => {
                assert_eq!(message, "Stage 'univariate' failed: stage panicked: boom");
            }
            other => panic!("expected failure, got {other:?}"),
        }

        let skipped = outcome_from(
            "correlations",
            Ok(Err(ProfileError::precondition("fewer than two columns"))),
        );
        assert_eq!(skipped.state(), StageState::Skipped);
    }
}
