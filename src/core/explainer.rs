//! Per-feature attribution ("why this score")
//!
//! `ShapleyExplainer` computes exact interventional Shapley values against a
//! reference (background) set: with 7 features all 128 coalitions are
//! enumerated, so no sampling noise and identical inputs give identical
//! outputs. Impacts sum to `f(x) - baseline`.

use rayon::prelude::*;

use super::risk_model::RiskModel;
use crate::models::{AppError, AppResult, Feature, FeatureVector, KeyFactor, FEATURE_COUNT};

/// Local attribution capability
pub trait Explainer: Send + Sync {
    /// One signed impact per feature, in feature order
    fn explain(&self, features: &FeatureVector, model: &dyn RiskModel) -> Vec<KeyFactor>;

    /// Expected model output over the reference distribution
    fn baseline(&self, model: &dyn RiskModel) -> f64;

    /// Number of reference samples the attribution is taken against
    fn background_size(&self) -> usize;
}

const COALITIONS: usize = 1 << FEATURE_COUNT;

/// Exact Shapley values over a fixed background set
#[derive(Debug, Clone)]
pub struct ShapleyExplainer {
    background: Vec<[f64; FEATURE_COUNT]>,
    /// Shapley weight indexed by coalition size
    weights: [f64; FEATURE_COUNT],
}

impl ShapleyExplainer {
    pub fn new(background: &[FeatureVector]) -> AppResult<Self> {
        if background.is_empty() {
            return Err(AppError::model_incompatible(
                "Explainer needs at least one background sample",
            ));
        }
        if background.iter().any(|b| !b.is_finite()) {
            return Err(AppError::model_incompatible(
                "Explainer background contains non-finite values",
            ));
        }

        Ok(Self {
            background: background.iter().map(FeatureVector::to_array).collect(),
            weights: shapley_weights(),
        })
    }

    /// v(S): mean prediction with features in `mask` taken from `x`,
    /// the rest from each background row
    fn coalition_value(&self, x: &[f64; FEATURE_COUNT], mask: usize, model: &dyn RiskModel) -> f64 {
        let total: f64 = self
            .background
            .iter()
            .map(|b| {
                let mut mixed = *b;
                for (i, value) in mixed.iter_mut().enumerate() {
                    if mask & (1 << i) != 0 {
                        *value = x[i];
                    }
                }
                model.predict(&FeatureVector::from_array(mixed))
            })
            .sum();
        total / self.background.len() as f64
    }
}

impl Explainer for ShapleyExplainer {
    fn explain(&self, features: &FeatureVector, model: &dyn RiskModel) -> Vec<KeyFactor> {
        let x = features.to_array();

        // Indexed collect keeps coalition order fixed regardless of scheduling
        let values: Vec<f64> = (0..COALITIONS)
            .into_par_iter()
            .map(|mask| self.coalition_value(&x, mask, model))
            .collect();

        Feature::ALL
            .iter()
            .map(|feature| {
                let bit = 1 << feature.index();
                let impact = (0..COALITIONS)
                    .filter(|mask| mask & bit == 0)
                    .map(|mask| {
                        self.weights[mask.count_ones() as usize] * (values[mask | bit] - values[mask])
                    })
                    .sum();
                KeyFactor {
                    feature: feature.name().to_string(),
                    impact,
                }
            })
            .collect()
    }

    fn baseline(&self, model: &dyn RiskModel) -> f64 {
        self.coalition_value(&[0.0; FEATURE_COUNT], 0, model)
    }

    fn background_size(&self) -> usize {
        self.background.len()
    }
}

/// |S|! (n - |S| - 1)! / n!
fn shapley_weights() -> [f64; FEATURE_COUNT] {
    let factorial = |k: usize| (1..=k).map(|i| i as f64).product::<f64>();
    let n = FEATURE_COUNT;
    let mut weights = [0.0; FEATURE_COUNT];
    for (size, w) in weights.iter_mut().enumerate() {
        *w = factorial(size) * factorial(n - size - 1) / factorial(n);
    }
    weights
}
