//! Probability scorer capability
//!
//! The engine only needs `features -> P(default)`. The tree ensemble in
//! `forest.rs` is the trained implementation; `LogisticScorer` covers
//! externally calibrated scorecards shipped as an artifact.

use serde::{Deserialize, Serialize};

use crate::models::{AppError, AppResult, FeatureVector, FEATURE_COUNT};

/// Trained, immutable default-probability scorer
pub trait RiskModel: Send + Sync {
    /// Probability of default in [0, 1]
    fn predict(&self, features: &FeatureVector) -> f64;

    /// Model name/type
    fn name(&self) -> &str;
}

/// Logistic scorecard: sigmoid(intercept + coefficients · x)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticScorer {
    pub intercept: f64,
    /// One coefficient per feature, in feature order
    pub coefficients: [f64; FEATURE_COUNT],
}

impl LogisticScorer {
    pub fn new(intercept: f64, coefficients: [f64; FEATURE_COUNT]) -> Self {
        Self {
            intercept,
            coefficients,
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(AppError::model_incompatible(
                "Logistic scorer has non-finite parameters",
            ));
        }
        Ok(())
    }
}

impl RiskModel for LogisticScorer {
    fn predict(&self, features: &FeatureVector) -> f64 {
        let z = self.intercept
            + self
                .coefficients
                .iter()
                .zip(features.to_array().iter())
                .map(|(c, x)| c * x)
                .sum::<f64>();
        1.0 / (1.0 + (-z).exp())
    }

    fn name(&self) -> &str {
        "logistic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_scorer_is_half() {
        let scorer = LogisticScorer::new(0.0, [0.0; FEATURE_COUNT]);
        let p = scorer.predict(&FeatureVector::from_array([1.0; FEATURE_COUNT]));
        assert!((p - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_output_bounded_and_monotone() {
        let mut coefficients = [0.0; FEATURE_COUNT];
        coefficients[4] = 2.0; // debt_to_income
        let scorer = LogisticScorer::new(-1.0, coefficients);

        let mut prev = 0.0;
        for dti in [-3.0, -1.0, 0.0, 1.0, 3.0] {
            let mut x = [0.0; FEATURE_COUNT];
            x[4] = dti;
            let p = scorer.predict(&FeatureVector::from_array(x));
            assert!((0.0..=1.0).contains(&p));
            assert!(p > prev);
            prev = p;
        }
    }

    #[test]
    fn test_non_finite_parameters_rejected() {
        let scorer = LogisticScorer::new(f64::NAN, [0.0; FEATURE_COUNT]);
        assert!(scorer.validate().is_err());
    }
}
