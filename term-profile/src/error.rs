//! Error types for the profiling engine.
//!
//! Every fallible operation in the crate returns [`ProfileError`]. The
//! pipeline folds errors into four coarse kinds (see [`ErrorKind`]):
//! load and overview failures abort a run, stage failures are recorded
//! against a single stage, and precondition errors mark a stage as
//! skipped rather than failed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for the profiling engine.
#[derive(Error, Debug)]
pub enum ProfileError {
    /// The input table could not be loaded or registered.
    #[error("Failed to load data from {source_name}: {message}")]
    Load {
        /// Path or description of the input
        source_name: String,
        /// Detailed error message
        message: String,
    },

    /// The overview stage failed; no later stage can run without it.
    #[error("Overview analysis failed: {0}")]
    Overview(String),

    /// A non-overview stage failed.
    #[error("Stage '{stage}' failed: {message}")]
    Stage {
        /// Name of the stage that failed
        stage: String,
        /// Detailed error message
        message: String,
    },

    /// A stage cannot run on this dataset (not an error for the run).
    #[error("Precondition not met: {0}")]
    Precondition(String),

    /// A referenced column does not exist in the table.
    #[error("Column '{column}' not found in dataset")]
    ColumnNotFound { column: String },

    /// Invalid configuration or pipeline definition.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Data did not have the expected shape or type.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// DataFusion query execution error.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Arrow computation error.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Unexpected internal condition.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, ProfileError>`.
pub type ProfileResult<T> = std::result::Result<T, ProfileError>;

/// Coarse error taxonomy surfaced in stage results and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Input could not be loaded; the run never started.
    LoadFailure,
    /// Overview failed; the run aborted.
    OverviewFailure,
    /// A single stage failed; the run continued.
    StageFailure,
    /// A stage was not applicable. Informational only.
    SkippedPrecondition,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::LoadFailure => "LoadFailure",
            ErrorKind::OverviewFailure => "OverviewFailure",
            ErrorKind::StageFailure => "StageFailure",
            ErrorKind::SkippedPrecondition => "SkippedPrecondition",
        };
        f.write_str(name)
    }
}

impl ProfileError {
    /// Creates a load error for the given input.
    pub fn load(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Load {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Creates an overview failure with the given message.
    pub fn overview(msg: impl Into<String>) -> Self {
        Self::Overview(msg.into())
    }

    /// Creates a stage failure for the named stage.
    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Creates a precondition error; the pipeline records the stage as skipped.
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Creates a column-not-found error.
    pub fn column_not_found(column: impl Into<String>) -> Self {
        Self::ColumnNotFound {
            column: column.into(),
        }
    }

    /// Creates a configuration error with the given message.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates an invalid data error with the given message.
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Maps this error into the run-level taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProfileError::Load { .. } => ErrorKind::LoadFailure,
            ProfileError::Overview(_) => ErrorKind::OverviewFailure,
            ProfileError::Precondition(_) => ErrorKind::SkippedPrecondition,
            _ => ErrorKind::StageFailure,
        }
    }

    /// Returns true when the error should abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::LoadFailure | ErrorKind::OverviewFailure
        )
    }
}

impl From<serde_json::Error> for ProfileError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> ProfileResult<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> ProfileResult<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<ProfileError>,
{
    fn context(self, msg: &str) -> ProfileResult<T> {
        self.map_err(|e| wrap(msg, e.into()))
    }

    fn with_context<F>(self, f: F) -> ProfileResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| wrap(&f(), e.into()))
    }
}

// Fatal and precondition errors keep their variant so `kind()` is stable.
fn wrap(msg: &str, err: ProfileError) -> ProfileError {
    match err {
        ProfileError::Load {
            source_name,
            message,
        } => ProfileError::Load {
            source_name,
            message: format!("{msg}: {message}"),
        },
        ProfileError::Overview(inner) => ProfileError::Overview(format!("{msg}: {inner}")),
        ProfileError::Precondition(inner) => {
            ProfileError::Precondition(format!("{msg}: {inner}"))
        }
        ProfileError::Internal(inner) => ProfileError::Internal(format!("{msg}: {inner}")),
        other => ProfileError::Internal(format!("{msg}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            ProfileError::load("data.csv", "missing").kind(),
            ErrorKind::LoadFailure
        );
        assert_eq!(
            ProfileError::overview("boom").kind(),
            ErrorKind::OverviewFailure
        );
        assert_eq!(
            ProfileError::precondition("no numeric columns").kind(),
            ErrorKind::SkippedPrecondition
        );
        assert_eq!(
            ProfileError::column_not_found("target").kind(),
            ErrorKind::StageFailure
        );
        assert!(ProfileError::overview("boom").is_fatal());
        assert!(!ProfileError::stage("outliers", "boom").is_fatal());
    }

    #[test]
    fn test_context_preserves_precondition() {
        let result: Result<(), ProfileError> = Err(ProfileError::precondition("too few columns"));
        let err = result.context("correlations").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SkippedPrecondition);
        assert!(err.to_string().contains("correlations: too few columns"));
    }

    #[test]
    fn test_context_wraps_other_errors() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "gone",
        ));
        let err = result.with_context(|| "reading config".to_string()).unwrap_err();
        assert!(matches!(err, ProfileError::Internal(_)));
        assert!(err.to_string().contains("reading config"));
    }

    #[test]
    fn test_display_messages() {
        let err = ProfileError::stage("outliers", "division by zero");
        assert_eq!(err.to_string(), "Stage 'outliers' failed: division by zero");
        assert_eq!(ErrorKind::StageFailure.to_string(), "StageFailure");
    }
}
