//! Model artifact provider
//!
//! One JSON document holds everything serving needs: scaler statistics,
//! the scorer and the attribution background. `ArtifactStore` loads, saves
//! and trains artifacts, and owns the process-wide engine instance.

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::engine::RiskAssessmentEngine;
use crate::core::features::{FeatureEngineer, ScalerStats};
use crate::core::forest::{ForestConfig, RandomForest, TrainingSet};
use crate::core::risk_model::{LogisticScorer, RiskModel};
use crate::models::{AppError, AppResult, ErrorCode, FeatureVector, LabeledApplication};
use crate::utils::constants::{ARTIFACT_FORMAT_VERSION, MAX_BACKGROUND_SAMPLES};

/// Serialized scorer, tagged by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScorerArtifact {
    RandomForest(RandomForest),
    Logistic(LogisticScorer),
}

impl ScorerArtifact {
    pub fn validate(&self) -> AppResult<()> {
        match self {
            Self::RandomForest(forest) => forest.validate(),
            Self::Logistic(scorer) => scorer.validate(),
        }
    }

    pub fn to_model(&self) -> Arc<dyn RiskModel> {
        match self {
            Self::RandomForest(forest) => Arc::new(forest.clone()),
            Self::Logistic(scorer) => Arc::new(scorer.clone()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::RandomForest(_) => "random_forest",
            Self::Logistic(_) => "logistic",
        }
    }
}

/// Trained model plus the statistics it was trained against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub created_at: DateTime<Utc>,
    pub scaler: ScalerStats,
    pub scorer: ScorerArtifact,
    /// Scaled reference rows for attribution
    pub background: Vec<FeatureVector>,
}

impl ModelArtifact {
    pub fn new(scaler: ScalerStats, scorer: ScorerArtifact, background: Vec<FeatureVector>) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            created_at: Utc::now(),
            scaler,
            scorer,
            background,
        }
    }

    /// Structural checks; anything that fails here would break serving
    pub fn validate(&self) -> AppResult<()> {
        if self.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(AppError::model_incompatible(format!(
                "Artifact format version {} is not supported (expected {})",
                self.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }
        self.scaler.validate()?;
        self.scorer.validate()?;
        if self.background.is_empty() {
            return Err(AppError::model_incompatible("Artifact has no background samples"));
        }
        if self.background.iter().any(|b| !b.is_finite()) {
            return Err(AppError::model_incompatible(
                "Artifact background contains non-finite values",
            ));
        }
        Ok(())
    }
}

/// Engine loaded once per process, remembered with the path it came from
struct SharedEngine {
    path: PathBuf,
    engine: Arc<RiskAssessmentEngine>,
}

static SHARED_ENGINE: OnceCell<SharedEngine> = OnceCell::new();

/// Artifact persistence and training
pub struct ArtifactStore;

impl ArtifactStore {
    /// Read and validate an artifact. Idempotent.
    pub fn load(path: impl AsRef<Path>) -> AppResult<ModelArtifact> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::with_source(
                ErrorCode::ModelLoadFailed,
                format!("Cannot read model artifact {}", path.display()),
                e,
            )
        })?;

        let artifact: ModelArtifact = serde_json::from_str(&raw).map_err(|e| {
            AppError::with_source(
                ErrorCode::ModelIncompatible,
                format!("Model artifact {} is not a valid artifact", path.display()),
                e,
            )
        })?;
        artifact.validate()?;

        info!(
            path = %path.display(),
            scorer = artifact.scorer.kind(),
            background = artifact.background.len(),
            created_at = %artifact.created_at,
            "Model artifact loaded"
        );
        Ok(artifact)
    }

    /// Write an artifact, creating parent directories as needed
    pub fn save(artifact: &ModelArtifact, path: impl AsRef<Path>) -> AppResult<()> {
        let path = path.as_ref();
        let write_err = |e: std::io::Error| {
            AppError::with_source(
                ErrorCode::ArtifactWriteFailed,
                format!("Cannot write model artifact {}", path.display()),
                e,
            )
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string(artifact).map_err(|e| {
            AppError::with_source(ErrorCode::ArtifactWriteFailed, "Cannot serialize artifact", e)
        })?;
        fs::write(path, json).map_err(write_err)?;

        info!(path = %path.display(), scorer = artifact.scorer.kind(), "Model artifact saved");
        Ok(())
    }

    /// Offline training: derive, fit scaler, scale, fit forest, pick background
    pub fn train(records: &[LabeledApplication], config: ForestConfig) -> AppResult<ModelArtifact> {
        let mut raw = Vec::with_capacity(records.len());
        let mut outcomes = Vec::with_capacity(records.len());

        for (i, record) in records.iter().enumerate() {
            match FeatureEngineer::derive(&record.application) {
                Ok(features) => {
                    raw.push(features);
                    outcomes.push(record.defaulted);
                }
                Err(e) => warn!(record = i, error = %e, "Skipping training record"),
            }
        }

        if raw.len() < 2 {
            return Err(AppError::training_failed(format!(
                "Need at least 2 usable records, got {} of {}",
                raw.len(),
                records.len()
            )));
        }

        let scaler = ScalerStats::fit(&raw)?;
        let scaled: Vec<FeatureVector> = raw.iter().map(|r| scaler.apply(r)).collect();
        let data = TrainingSet::new(scaled.iter().map(FeatureVector::to_array).collect(), outcomes)?;

        info!(
            usable = data.n_samples(),
            skipped = records.len() - data.n_samples(),
            defaults = data.n_positive(),
            "Training data prepared"
        );

        let forest = RandomForest::fit(&data, config)?;
        let background = select_background(&scaled, MAX_BACKGROUND_SAMPLES);

        Ok(ModelArtifact::new(
            scaler,
            ScorerArtifact::RandomForest(forest),
            background,
        ))
    }

    /// Process-wide engine, loaded at most once.
    ///
    /// Concurrent first callers block on a single load. A failed load is not
    /// cached. Asking for a different path once loaded is a config error.
    pub fn shared_engine(path: impl AsRef<Path>) -> AppResult<Arc<RiskAssessmentEngine>> {
        let path = path.as_ref();
        let shared = SHARED_ENGINE.get_or_try_init(|| {
            let artifact = Self::load(path)?;
            let engine = RiskAssessmentEngine::from_artifact(&artifact)?;
            Ok::<_, AppError>(SharedEngine {
                path: path.to_path_buf(),
                engine: Arc::new(engine),
            })
        })?;

        if shared.path != path {
            return Err(AppError::invalid_config(
                "CREDIT_RISK_ARTIFACT",
                &path.display().to_string(),
            ));
        }
        Ok(Arc::clone(&shared.engine))
    }
}

/// Evenly strided subset, first row always included
pub fn select_background(rows: &[FeatureVector], max: usize) -> Vec<FeatureVector> {
    if rows.len() <= max {
        return rows.to_vec();
    }
    (0..max).map(|i| rows[i * rows.len() / max]).collect()
}
