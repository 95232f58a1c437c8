//! Pipeline progress events and their observers.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, info, warn, Level};

use crate::error::ErrorKind;
use crate::logging::{truncate_field, LogConfig};

/// Something that happened during a profiling run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    RunStarted {
        dataset: String,
        stages: usize,
    },
    StageStarted {
        stage: String,
    },
    StageSucceeded {
        stage: String,
        duration_ms: u64,
    },
    StageSkipped {
        stage: String,
        reason: String,
    },
    StageFailed {
        stage: String,
        kind: ErrorKind,
        message: String,
    },
    RunFinished {
        succeeded: usize,
        skipped: usize,
        failed: usize,
        duration_ms: u64,
    },
    RunAborted {
        kind: ErrorKind,
        message: String,
    },
}

impl PipelineEvent {
    /// Stage the event refers to, if any.
    pub fn stage(&self) -> Option<&str> {
        match self {
            PipelineEvent::StageStarted { stage }
            | PipelineEvent::StageSucceeded { stage, .. }
            | PipelineEvent::StageSkipped { stage, .. }
            | PipelineEvent::StageFailed { stage, .. } => Some(stage),
            _ => None,
        }
    }
}

/// Receives pipeline events. Observers must not block for long; they run
/// inline between stages.
pub trait PipelineObserver: Send + Sync {
    fn on_event(&self, event: &PipelineEvent);
}

/// Turns events into structured `tracing` records.
#[derive(Debug, Clone, Default)]
pub struct TracingObserver {
    config: LogConfig,
}

impl TracingObserver {
    pub fn new(config: LogConfig) -> Self {
        Self { config }
    }
}

impl PipelineObserver for TracingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        let max = self.config.max_field_length;
        match event {
            PipelineEvent::RunStarted { dataset, stages } => {
                info!(dataset = %dataset, stages, "Profiling run started");
            }
            PipelineEvent::StageStarted { stage } => {
                if self.config.log_stage_details && self.config.base_level >= Level::DEBUG {
                    debug!(stage = %stage, "Stage started");
                }
            }
            PipelineEvent::StageSucceeded { stage, duration_ms } => {
                if self.config.log_stage_details {
                    info!(stage = %stage, duration_ms, "Stage succeeded");
                }
            }
            PipelineEvent::StageSkipped { stage, reason } => {
                if self.config.log_stage_details {
                    info!(stage = %stage, reason = %truncate_field(reason, max), "Stage skipped");
                }
            }
            PipelineEvent::StageFailed {
                stage,
                kind,
                message,
            } => {
                warn!(
                    stage = %stage,
                    kind = %kind,
                    error = %truncate_field(message, max),
                    "Stage failed"
                );
            }
            PipelineEvent::RunFinished {
                succeeded,
                skipped,
                failed,
                duration_ms,
            } => {
                info!(
                    succeeded,
                    skipped,
                    failed,
                    duration_ms,
                    "Profiling run completed"
                );
            }
            PipelineEvent::RunAborted { kind, message } => {
                warn!(kind = %kind, error = %truncate_field(message, max), "Profiling run aborted");
            }
        }
    }
}

/// Adapts a closure into an observer.
pub struct FnObserver<F>(pub F);

impl<F> PipelineObserver for FnObserver<F>
where
    F: Fn(&PipelineEvent) + Send + Sync,
{
    fn on_event(&self, event: &PipelineEvent) {
        (self.0)(event)
    }
}

/// Keeps every event in memory. Useful for front ends that render progress
/// after the fact, and for tests.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<PipelineEvent>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far.
    pub fn events(&self) -> Vec<PipelineEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl PipelineObserver for EventRecorder {
    fn on_event(&self, event: &PipelineEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}
