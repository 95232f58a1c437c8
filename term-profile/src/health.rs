//! Dataset health scoring.
//!
//! Two formulas exist. [`HealthFormula::Final`] is the canonical one and
//! includes the anomaly rate from outlier detection:
//!
//! ```text
//! raw = 100 - missing_pct - duplicate_pct - 0.5 * anomaly_pct
//! ```
//!
//! [`HealthFormula::Structural`] is the preliminary score reported by the
//! overview before any anomaly data exists:
//!
//! ```text
//! raw = 100 - (0.4 * missing_pct + 0.3 * duplicate_pct + 0.3 * anomaly_pct)
//! ```
//!
//! Both round `raw` to one decimal and clamp it to `[0, 100]`. Scoring is a
//! pure function of its inputs.

use serde::{Deserialize, Serialize};

/// Which weighting to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthFormula {
    Structural,
    Final,
}

/// Qualitative health band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HealthLabel {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl std::fmt::Display for HealthLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            HealthLabel::Excellent => "Excellent",
            HealthLabel::Good => "Good",
            HealthLabel::Fair => "Fair",
            HealthLabel::Poor => "Poor",
        };
        f.write_str(name)
    }
}

/// A computed score. Both fields are `None` when an input was unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthScore {
    pub score: Option<f64>,
    pub label: Option<HealthLabel>,
    pub formula: HealthFormula,
}

impl HealthScore {
    fn unavailable(formula: HealthFormula) -> Self {
        Self {
            score: None,
            label: None,
            formula,
        }
    }

    pub fn is_available(&self) -> bool {
        self.score.is_some()
    }
}

/// Percentages feeding the score. Missing and duplicate rates are required;
/// the anomaly rate defaults to zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HealthInputs {
    pub missing_pct: Option<f64>,
    pub duplicate_pct: Option<f64>,
    pub anomaly_pct: Option<f64>,
}

impl HealthInputs {
    pub fn new(missing_pct: f64, duplicate_pct: f64) -> Self {
        Self {
            missing_pct: Some(missing_pct),
            duplicate_pct: Some(duplicate_pct),
            anomaly_pct: None,
        }
    }

    pub fn with_anomaly(mut self, anomaly_pct: f64) -> Self {
        self.anomaly_pct = Some(anomaly_pct);
        self
    }
}

/// Computes [`HealthScore`]s with a fixed formula.
#[derive(Debug, Clone, Copy)]
pub struct HealthScorer {
    formula: HealthFormula,
}

impl Default for HealthScorer {
    fn default() -> Self {
        Self::new(HealthFormula::Final)
    }
}

impl HealthScorer {
    pub fn new(formula: HealthFormula) -> Self {
        Self { formula }
    }

    pub fn structural() -> Self {
        Self::new(HealthFormula::Structural)
    }

    pub fn formula(&self) -> HealthFormula {
        self.formula
    }

    /// Scores the given inputs. Missing, NaN or infinite inputs give an
    /// unavailable score instead of an error.
    pub fn score(&self, inputs: HealthInputs) -> HealthScore {
        let (Some(missing), Some(duplicate)) = (inputs.missing_pct, inputs.duplicate_pct) else {
            return HealthScore::unavailable(self.formula);
        };
        let anomaly = inputs.anomaly_pct.unwrap_or(0.0);
        if !(missing.is_finite() && duplicate.is_finite() && anomaly.is_finite()) {
            return HealthScore::unavailable(self.formula);
        }

        let raw = match self.formula {
            HealthFormula::Final => 100.0 - missing - duplicate - 0.5 * anomaly,
            HealthFormula::Structural => {
                100.0 - (0.4 * missing + 0.3 * duplicate + 0.3 * anomaly)
            }
        };
        let score = ((raw * 10.0).round() / 10.0).clamp(0.0, 100.0);

        HealthScore {
            score: Some(score),
            label: Some(self.label_for(score)),
            formula: self.formula,
        }
    }

    fn label_for(&self, score: f64) -> HealthLabel {
        match self.formula {
            HealthFormula::Final => {
                if score >= 90.0 {
                    HealthLabel::Excellent
                } else if score >= 80.0 {
                    HealthLabel::Good
                } else if score >= 60.0 {
                    HealthLabel::Fair
                } else {
                    HealthLabel::Poor
                }
            }
            HealthFormula::Structural => {
                if score >= 80.0 {
                    HealthLabel::Good
                } else if score >= 50.0 {
                    HealthLabel::Fair
                } else {
                    HealthLabel::Poor
                }
            }
        }
    }
}
