//! # term-profile - Staged Dataset Profiling for Rust
//!
//! term-profile characterizes an arbitrary tabular dataset in a sequence of
//! profiling stages: an overview that classifies every column, followed by
//! univariate statistics, data-quality checks, outlier detection,
//! missing-value analysis, correlations, interaction suggestions,
//! hypothesis tests, a health score, target analysis, and a synthesis of
//! insights and recommendations. It runs on DataFusion, so reductions over
//! partitioned tables are parallelized by the engine.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use term_profile::prelude::*;
//!
//! # async fn example() -> ProfileResult<()> {
//! let config = ProfileConfig::builder()
//!     .sample_size(20_000)
//!     .seed(7)
//!     .build()?;
//! let pipeline = Pipeline::standard(config)?;
//!
//! let table = TableHandle::from_csv("orders.csv").await?;
//! let report = pipeline.run(&table, Some("returned")).await?;
//!
//! if let Some(overview) = report.overview() {
//!     println!(
//!         "{} rows, {} columns, {:.2}% missing",
//!         overview.dataset_snapshot.row_count,
//!         overview.dataset_snapshot.column_count,
//!         overview.dataset_snapshot.missing_pct,
//!     );
//! }
//! for (stage, state) in report.stage_states() {
//!     println!("{stage}: {state}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Key Features
//!
//! ### Column classification
//!
//! Every column receives exactly one [`classifier::TypeLabel`] from an
//! ordered rule table (constant, semantic pattern, boolean, datetime,
//! numeric, identifier, categorical). Downstream stages select their
//! columns by label.
//!
//! ### Adaptive sampling
//!
//! Small tables are materialized whole. Larger ones are sampled per
//! partition so the sample is not biased toward one partition's key range.
//! Partition size skew is diagnosed and surfaced as an alert.
//!
//! ### Resilient orchestration
//!
//! Stages declare hard and soft dependencies and are topologically
//! ordered. A failing or panicking stage is recorded as failed and the run
//! continues; stages whose preconditions do not hold are skipped.
//!
//! ### Observability
//!
//! Progress is published as [`pipeline::PipelineEvent`]s to any number of
//! observers. The default observer writes structured `tracing` records;
//! see [`logging::setup`] to install a subscriber.
//!
//! ## Architecture
//!
//! - **`table`**: the DataFusion-backed table handle and its reductions
//! - **`classifier`**: column type labels
//! - **`sampling`**: sample selection and partition diagnostics
//! - **`health`**: health score formulas
//! - **`stats`** / **`confidence`**: numeric helpers
//! - **`pipeline`**: stage trait, orchestrator, result map and events
//! - **`stages`**: the built-in profiling stages

pub mod classifier;
pub mod confidence;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod pipeline;
pub mod prelude;
pub mod sampling;
pub mod security;
pub mod stages;
pub mod stats;
pub mod table;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_fixtures;
