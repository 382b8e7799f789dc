//! Credit Risk Engine Library
//!
//! Scores credit applications and explains the score:
//! - Feature engineering (affordability ratios, employment ordinal, scaling)
//! - Tree-ensemble default probability from a trained artifact
//! - Exact Shapley attribution per feature
//! - Category, expected profit, recommendation and pricing policy

pub mod api;
pub mod core;
pub mod models;
pub mod providers;
pub mod utils;

pub use crate::core::engine::{ModelInfo, RiskAssessmentEngine};
pub use crate::core::forest::ForestConfig;
pub use crate::core::policy::PolicyEngine;
pub use models::{
    AppError, AppResult, CreditApplication, EngineConfig, ErrorCode, LabeledApplication,
    RiskAssessmentResult, RiskCategory,
};
pub use providers::{ArtifactStore, ModelArtifact};
pub use utils::telemetry::AssessmentTelemetry;
