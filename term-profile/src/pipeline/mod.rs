//! Stage orchestration.
//!
//! A [`Pipeline`] runs the overview, hands its column descriptors and the
//! run's sample to every later stage, and collects each stage's outcome in
//! an append-only [`ResultMap`]. Only a load or overview failure aborts a
//! run; any other stage failure is recorded and the run continues.

pub mod events;
pub mod orchestrator;
pub mod report;
pub mod result_map;
pub mod stage;

pub use events::{EventRecorder, FnObserver, PipelineEvent, PipelineObserver, TracingObserver};
pub use orchestrator::{Pipeline, PipelineBuilder};
pub use report::ProfileReport;
pub use result_map::{ResultMap, StageResult};
pub use stage::{
    ProfilingStage, StageContext, StageOutcome, StagePayload, StageState, OVERVIEW_STAGE,
};
