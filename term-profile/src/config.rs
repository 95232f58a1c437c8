//! Configuration for profiling runs.
//!
//! [`ProfileConfig`] carries every threshold the classifier, the sampling
//! engine and the stages use. Defaults reproduce the documented
//! heuristics; JSON files may override any subset of fields.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ProfileError, ProfileResult};
use crate::security::InputValidator;

/// Thresholds used by [`ColumnClassifier`](crate::classifier::ColumnClassifier).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Maximum distinct count for a column to count as categorical
    pub categorical_threshold: u64,
    /// Fraction of sampled values a semantic pattern must match (strictly greater)
    pub semantic_match_ratio: f64,
    /// Distinct/row ratio above which a column is a high-cardinality identifier
    pub high_cardinality_ratio: f64,
    /// Number of non-null values inspected by semantic patterns
    pub semantic_sample_size: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            categorical_threshold: 50,
            semantic_match_ratio: 0.80,
            high_cardinality_ratio: 0.90,
            semantic_sample_size: 100,
        }
    }
}

/// Policy knobs for [`SamplingEngine`](crate::sampling::SamplingEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Row budget for the materialized sample
    pub sample_size: usize,
    /// Per-partition floor when sampling a partitioned table
    pub min_rows_per_partition: usize,
    /// Seed for the random preview rows
    pub seed: u64,
    /// Partition skew above which the table is flagged as imbalanced
    pub skew_threshold: f64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            sample_size: 50_000,
            min_rows_per_partition: 10,
            seed: 42,
            skew_threshold: 0.5,
        }
    }
}

/// Top-level configuration for a profiling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub classifier: ClassifierConfig,
    pub sampling: SamplingConfig,
    /// Rows shown in each of the head/tail/random previews
    pub preview_rows: usize,
    /// Top-value share above which a column is quasi-constant
    pub quasi_constant_ratio: f64,
    /// Maximum string length that does not raise a long-string alert
    pub long_string_threshold: usize,
    /// Only the first N columns are searched for composite keys
    pub composite_key_column_limit: usize,
    /// Maximum number of composite keys reported
    pub max_composite_keys: usize,
    /// Share of numeric-parsable values that marks a text column as mixed-type
    pub mixed_type_ratio: f64,
    /// Minimum distinct values before a distribution shape is estimated
    pub distribution_min_distinct: u64,
    /// IQR multiplier for outlier fences
    pub outlier_iqr_multiplier: f64,
    /// Absolute correlation at or above which a pair is reported as strong
    pub strong_correlation_threshold: f64,
    /// Number of categories reported per categorical column
    pub top_categories: usize,
    /// Maximum number of memory optimization tips
    pub max_optimization_tips: usize,
    /// Columns of each kind considered for interaction suggestions
    pub interaction_features: usize,
    /// p-value below which a hypothesis test is significant
    pub significance_level: f64,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            sampling: SamplingConfig::default(),
            preview_rows: 5,
            quasi_constant_ratio: 0.99,
            long_string_threshold: 1000,
            composite_key_column_limit: 20,
            max_composite_keys: 3,
            mixed_type_ratio: 0.95,
            distribution_min_distinct: 20,
            outlier_iqr_multiplier: 1.5,
            strong_correlation_threshold: 0.7,
            top_categories: 20,
            max_optimization_tips: 5,
            interaction_features: 5,
            significance_level: 0.05,
        }
    }
}

impl ProfileConfig {
    /// Creates a builder starting from the defaults.
    pub fn builder() -> ProfileConfigBuilder {
        ProfileConfigBuilder::default()
    }

    /// Parses a JSON document; missing fields keep their defaults.
    pub fn from_json(json: &str) -> ProfileResult<Self> {
        let config: ProfileConfig = serde_json::from_str(json)
            .map_err(|e| ProfileError::configuration(format!("Invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> ProfileResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ProfileError::configuration(format!("Cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&contents)
    }

    /// Checks that every threshold is in range.
    pub fn validate(&self) -> ProfileResult<()> {
        if self.sampling.sample_size == 0 {
            return Err(ProfileError::configuration(
                "sampling.sample_size must be greater than zero",
            ));
        }
        if self.classifier.semantic_sample_size == 0 {
            return Err(ProfileError::configuration(
                "classifier.semantic_sample_size must be greater than zero",
            ));
        }
        InputValidator::validate_ratio(
            self.classifier.semantic_match_ratio,
            "classifier.semantic_match_ratio",
        )?;
        InputValidator::validate_ratio(
            self.classifier.high_cardinality_ratio,
            "classifier.high_cardinality_ratio",
        )?;
        InputValidator::validate_threshold(self.sampling.skew_threshold, "sampling.skew_threshold")?;
        if self.sampling.skew_threshold < 0.0 {
            return Err(ProfileError::configuration(
                "sampling.skew_threshold must not be negative",
            ));
        }
        InputValidator::validate_ratio(self.quasi_constant_ratio, "quasi_constant_ratio")?;
        InputValidator::validate_ratio(self.mixed_type_ratio, "mixed_type_ratio")?;
        InputValidator::validate_ratio(
            self.strong_correlation_threshold,
            "strong_correlation_threshold",
        )?;
        InputValidator::validate_positive(self.outlier_iqr_multiplier, "outlier_iqr_multiplier")?;
        InputValidator::validate_ratio(self.significance_level, "significance_level")?;
        Ok(())
    }
}

/// Builder for [`ProfileConfig`].
#[derive(Debug, Clone, Default)]
pub struct ProfileConfigBuilder {
    config: ProfileConfig,
}

impl ProfileConfigBuilder {
    /// Set the row budget for the materialized sample
    pub fn sample_size(mut self, size: usize) -> Self {
        self.config.sampling.sample_size = size;
        self
    }

    /// Set the per-partition sampling floor
    pub fn min_rows_per_partition(mut self, rows: usize) -> Self {
        self.config.sampling.min_rows_per_partition = rows;
        self
    }

    /// Set the random seed used for previews
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.sampling.seed = seed;
        self
    }

    /// Set the partition skew alert threshold
    pub fn skew_threshold(mut self, threshold: f64) -> Self {
        self.config.sampling.skew_threshold = threshold;
        self
    }

    /// Set the categorical cardinality threshold
    pub fn categorical_threshold(mut self, threshold: u64) -> Self {
        self.config.classifier.categorical_threshold = threshold;
        self
    }

    /// Set the semantic pattern match ratio
    pub fn semantic_match_ratio(mut self, ratio: f64) -> Self {
        self.config.classifier.semantic_match_ratio = ratio;
        self
    }

    /// Set the number of preview rows
    pub fn preview_rows(mut self, rows: usize) -> Self {
        self.config.preview_rows = rows;
        self
    }

    /// Set the IQR multiplier for outlier detection
    pub fn outlier_iqr_multiplier(mut self, multiplier: f64) -> Self {
        self.config.outlier_iqr_multiplier = multiplier;
        self
    }

    /// Set the strong correlation threshold
    pub fn strong_correlation_threshold(mut self, threshold: f64) -> Self {
        self.config.strong_correlation_threshold = threshold;
        self
    }

    /// Set the number of reported top categories
    pub fn top_categories(mut self, count: usize) -> Self {
        self.config.top_categories = count;
        self
    }

    /// Set how many columns of each kind feed interaction suggestions
    pub fn interaction_features(mut self, count: usize) -> Self {
        self.config.interaction_features = count;
        self
    }

    /// Set the hypothesis test significance level
    pub fn significance_level(mut self, level: f64) -> Self {
        self.config.significance_level = level;
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> ProfileResult<ProfileConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
