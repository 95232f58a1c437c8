//! Heuristic confidence for reported findings.

use serde::{Deserialize, Serialize};

/// A confidence in `[0, 1]` with a short explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Confidence {
    pub score: f64,
    pub reason: String,
}

impl Confidence {
    pub fn new(score: f64, reason: impl Into<String>) -> Self {
        Self {
            score: normalize(score),
            reason: reason.into(),
        }
    }
}

/// Clamps to `[0, 1]`; NaN becomes zero.
pub fn normalize(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Rare outliers are more likely to be genuine anomalies.
pub fn outlier_confidence(outliers: u64, total_rows: u64) -> Confidence {
    if total_rows == 0 {
        return Confidence::new(0.0, "No data rows available.");
    }
    let proportion = outliers as f64 / total_rows as f64;
    if proportion < 0.01 {
        Confidence::new(0.95, "Anomalies are rare (<1%), indicating strong signal.")
    } else if proportion < 0.05 {
        Confidence::new(0.85, "Anomalies are distinct but common (1-5%).")
    } else if proportion < 0.10 {
        Confidence::new(0.70, "High frequency of outliers (>5%) suggests heavy tails.")
    } else {
        Confidence::new(
            0.50,
            "Excessive outliers (>10%) may indicate distribution mismatch.",
        )
    }
}

/// Strength-banded confidence, penalized below 30 observations.
pub fn association_confidence(strength: f64, samples: usize) -> Confidence {
    let abs = strength.abs();
    let (base, description) = if abs > 0.8 {
        (0.95, "Very strong relationship")
    } else if abs > 0.6 {
        (0.85, "Strong relationship")
    } else if abs > 0.4 {
        (0.70, "Moderate relationship")
    } else {
        (0.50, "Weak relationship")
    };

    if samples < 30 {
        Confidence::new(
            base * 0.8,
            format!("{description} but low sample size ({samples})."),
        )
    } else {
        Confidence::new(base, format!("{description} supported by sufficient data."))
    }
}
