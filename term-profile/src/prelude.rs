//! Prelude for commonly used types and traits in term-profile.

pub use crate::classifier::{ColumnClassifier, ColumnEvidence, SemanticKind, TypeLabel};
pub use crate::config::{ClassifierConfig, ProfileConfig, SamplingConfig};
pub use crate::error::{ErrorContext, ErrorKind, ProfileError, ProfileResult};
pub use crate::health::{HealthFormula, HealthLabel, HealthScore, HealthScorer};
pub use crate::logging::LogConfig;
pub use crate::pipeline::{
    EventRecorder, Pipeline, PipelineBuilder, PipelineEvent, PipelineObserver, ProfileReport,
    ProfilingStage, ResultMap, StageContext, StageOutcome, StagePayload, StageState,
};
pub use crate::sampling::{PartitionStats, Sample, SamplingEngine, SamplingStrategy};
pub use crate::stages::{ColumnDescriptor, DatasetSnapshot, OverviewReport};
pub use crate::table::{DeclaredType, TableHandle};
