//! Random forest default scorer
//!
//! Bootstrap-sampled CART trees with weighted Gini impurity. With
//! `class_balanced` each class is weighted `n / (2 * n_class)` so rare
//! defaults are not drowned out. The forest probability is the mean of the
//! per-tree leaf probabilities.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::risk_model::RiskModel;
use crate::models::{AppError, AppResult, FeatureVector, FEATURE_COUNT};
use crate::utils::constants::{
    DEFAULT_MAX_DEPTH, DEFAULT_MIN_SAMPLES_SPLIT, DEFAULT_N_TREES, DEFAULT_SEED,
};

/// Random forest configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees in the forest
    pub n_trees: usize,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Candidate features per split (floor(sqrt(7)) if None)
    pub max_features: Option<usize>,
    /// Weight classes inversely to their frequency
    pub class_balanced: bool,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Random seed
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: DEFAULT_N_TREES,
            max_depth: DEFAULT_MAX_DEPTH,
            min_samples_split: DEFAULT_MIN_SAMPLES_SPLIT,
            max_features: None,
            class_balanced: true,
            bootstrap: true,
            seed: DEFAULT_SEED,
        }
    }
}

impl ForestConfig {
    fn resolved_max_features(&self) -> usize {
        self.max_features
            .unwrap_or_else(|| (FEATURE_COUNT as f64).sqrt() as usize)
            .clamp(1, FEATURE_COUNT)
    }
}

// ============================================
// TRAINING DATA
// ============================================

/// Scaled feature matrix with binary default outcomes
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    pub features: Vec<[f64; FEATURE_COUNT]>,
    pub outcomes: Vec<bool>,
}

impl TrainingSet {
    pub fn new(features: Vec<[f64; FEATURE_COUNT]>, outcomes: Vec<bool>) -> AppResult<Self> {
        if features.len() != outcomes.len() {
            return Err(AppError::training_failed(format!(
                "Feature rows ({}) and outcomes ({}) differ in length",
                features.len(),
                outcomes.len()
            )));
        }
        Ok(Self { features, outcomes })
    }

    pub fn n_samples(&self) -> usize {
        self.features.len()
    }

    pub fn n_positive(&self) -> usize {
        self.outcomes.iter().filter(|&&y| y).count()
    }

    /// [negative weight, positive weight]
    fn class_weights(&self, balanced: bool) -> [f64; 2] {
        if !balanced {
            return [1.0, 1.0];
        }
        let n = self.n_samples() as f64;
        let n_pos = self.n_positive() as f64;
        let n_neg = n - n_pos;
        [n / (2.0 * n_neg), n / (2.0 * n_pos)]
    }
}

// ============================================
// TREE
// ============================================

/// Tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum TreeNode {
    Leaf {
        /// Weighted fraction of defaults reaching this leaf
        probability: f64,
    },
    Split {
        feature: usize,
        /// `x[feature] <= threshold` goes left
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn predict(&self, x: &[f64; FEATURE_COUNT]) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { probability } => return *probability,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if x[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn validate(&self) -> AppResult<()> {
        match self {
            TreeNode::Leaf { probability } => {
                if !(0.0..=1.0).contains(probability) {
                    return Err(AppError::model_incompatible(format!(
                        "Leaf probability {} outside [0, 1]",
                        probability
                    )));
                }
                Ok(())
            }
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if *feature >= FEATURE_COUNT {
                    return Err(AppError::model_incompatible(format!(
                        "Split on feature index {} but the model has {} features",
                        feature, FEATURE_COUNT
                    )));
                }
                if !threshold.is_finite() {
                    return Err(AppError::model_incompatible("Non-finite split threshold"));
                }
                left.validate()?;
                right.validate()
            }
        }
    }
}

/// Single classification tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    root: TreeNode,
}

impl DecisionTree {
    pub fn predict(&self, x: &[f64; FEATURE_COUNT]) -> f64 {
        self.root.predict(x)
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }
}

struct TreeBuilder<'a> {
    data: &'a TrainingSet,
    class_weights: [f64; 2],
    max_depth: usize,
    min_samples_split: usize,
    max_features: usize,
    rng: StdRng,
}

impl<'a> TreeBuilder<'a> {
    fn build(&mut self, indices: Vec<usize>, depth: usize) -> TreeNode {
        let (w_neg, w_pos) = self.class_totals(&indices);
        let total = w_neg + w_pos;
        let probability = if total > 0.0 { w_pos / total } else { 0.0 };

        if depth >= self.max_depth
            || indices.len() < self.min_samples_split
            || w_neg == 0.0
            || w_pos == 0.0
        {
            return TreeNode::Leaf { probability };
        }

        let Some((feature, threshold)) = self.best_split(&indices, w_neg, w_pos) else {
            return TreeNode::Leaf { probability };
        };

        let data = self.data;
        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| data.features[i][feature] <= threshold);

        if left.is_empty() || right.is_empty() {
            return TreeNode::Leaf { probability };
        }

        TreeNode::Split {
            feature,
            threshold,
            left: Box::new(self.build(left, depth + 1)),
            right: Box::new(self.build(right, depth + 1)),
        }
    }

    fn class_totals(&self, indices: &[usize]) -> (f64, f64) {
        indices.iter().fold((0.0, 0.0), |(neg, pos), &i| {
            if self.data.outcomes[i] {
                (neg, pos + self.class_weights[1])
            } else {
                (neg + self.class_weights[0], pos)
            }
        })
    }

    /// Best (feature, threshold) among a random subset of features
    fn best_split(&mut self, indices: &[usize], w_neg: f64, w_pos: f64) -> Option<(usize, f64)> {
        let total = w_neg + w_pos;
        let parent = gini(w_neg, w_pos);

        let mut candidates: Vec<usize> = (0..FEATURE_COUNT).collect();
        candidates.shuffle(&mut self.rng);
        candidates.truncate(self.max_features);

        let mut best: Option<(usize, f64, f64)> = None;

        for feature in candidates {
            let mut column: Vec<(f64, bool)> = indices
                .iter()
                .map(|&i| (self.data.features[i][feature], self.data.outcomes[i]))
                .collect();
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            let (mut left_neg, mut left_pos) = (0.0, 0.0);
            for k in 0..column.len() - 1 {
                if column[k].1 {
                    left_pos += self.class_weights[1];
                } else {
                    left_neg += self.class_weights[0];
                }

                let (value, next) = (column[k].0, column[k + 1].0);
                if value >= next {
                    continue;
                }

                let left_total = left_neg + left_pos;
                let right_neg = w_neg - left_neg;
                let right_pos = w_pos - left_pos;
                let right_total = right_neg + right_pos;
                let impurity = (left_total * gini(left_neg, left_pos)
                    + right_total * gini(right_neg, right_pos))
                    / total;

                if impurity < parent && best.map_or(true, |(_, _, b)| impurity < b) {
                    let mut threshold = (value + next) / 2.0;
                    if threshold >= next || !threshold.is_finite() {
                        threshold = value;
                    }
                    best = Some((feature, threshold, impurity));
                }
            }
        }

        best.map(|(feature, threshold, _)| (feature, threshold))
    }
}

fn gini(neg: f64, pos: f64) -> f64 {
    let total = neg + pos;
    if total <= 0.0 {
        return 0.0;
    }
    let p = pos / total;
    let q = neg / total;
    1.0 - p * p - q * q
}

// ============================================
// FOREST
// ============================================

/// Random Forest model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    config: ForestConfig,
    trees: Vec<DecisionTree>,
    n_training_samples: usize,
}

impl RandomForest {
    /// Train the random forest
    pub fn fit(data: &TrainingSet, config: ForestConfig) -> AppResult<Self> {
        let n = data.n_samples();
        let n_pos = data.n_positive();

        if n < 2 {
            return Err(AppError::training_failed(format!(
                "Need at least 2 training samples, got {}",
                n
            )));
        }
        if n_pos == 0 || n_pos == n {
            return Err(AppError::training_failed(
                "Training outcomes contain a single class",
            ));
        }
        if config.n_trees == 0 {
            return Err(AppError::training_failed("n_trees must be at least 1"));
        }

        let class_weights = data.class_weights(config.class_balanced);
        let max_features = config.resolved_max_features();

        info!(
            samples = n,
            defaults = n_pos,
            trees = config.n_trees,
            max_depth = config.max_depth,
            "Training random forest"
        );

        // Build trees in parallel; per-tree seeds keep the result reproducible
        let trees: Vec<DecisionTree> = (0..config.n_trees)
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(i as u64));
                let indices: Vec<usize> = if config.bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };

                let mut builder = TreeBuilder {
                    data,
                    class_weights,
                    max_depth: config.max_depth,
                    min_samples_split: config.min_samples_split.max(2),
                    max_features,
                    rng,
                };
                DecisionTree {
                    root: builder.build(indices, 0),
                }
            })
            .collect();

        info!(trees = trees.len(), "Random forest trained");

        Ok(Self {
            config,
            trees,
            n_training_samples: n,
        })
    }

    /// Structural checks for a deserialized forest
    pub fn validate(&self) -> AppResult<()> {
        if self.trees.is_empty() {
            return Err(AppError::model_incompatible("Random forest has no trees"));
        }
        for tree in &self.trees {
            tree.root.validate()?;
        }
        Ok(())
    }

    pub fn predict_row(&self, x: &[f64; FEATURE_COUNT]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees.iter().map(|t| t.predict(x)).sum::<f64>() / self.trees.len() as f64
    }

    /// Number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn max_tree_depth(&self) -> usize {
        self.trees.iter().map(|t| t.depth()).max().unwrap_or(0)
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn n_training_samples(&self) -> usize {
        self.n_training_samples
    }
}

impl RiskModel for RandomForest {
    fn predict(&self, features: &FeatureVector) -> f64 {
        self.predict_row(&features.to_array())
    }

    fn name(&self) -> &str {
        "random_forest"
    }
}
