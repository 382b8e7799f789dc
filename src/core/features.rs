//! Feature Engineering Module
//!
//! Turns a raw credit application into the 7-feature model input:
//!
//! 1. Ratios - monthly payment, DTI, LTV, PTI derived from amounts
//! 2. Job ordinal - employment type mapped to 0..=3 (unmapped -> full-time)
//! 3. Scaling - the five amount/ratio features are z-scored with fitted stats
//!
//! `age` and `job` pass through unscaled.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::models::{AppError, AppResult, CreditApplication, EmploymentType, Feature, FeatureVector};
use crate::utils::constants::{MIN_COLLATERAL_FOR_LTV, UNMAPPED_JOB_ORDINAL};

/// Number of standardized features
pub const SCALED_FEATURE_COUNT: usize = 5;

/// Features standardized by [`ScalerStats`], in scaler column order
pub const SCALED_FEATURES: [Feature; SCALED_FEATURE_COUNT] = [
    Feature::LoanAmount,
    Feature::LoanDuration,
    Feature::DebtToIncome,
    Feature::LoanToValue,
    Feature::PaymentToIncome,
];

// ============================================
// SCALER
// ============================================

/// Per-feature mean / standard deviation, fitted once offline.
///
/// Read-only while serving; shared by every request through an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerStats {
    pub mean: [f64; SCALED_FEATURE_COUNT],
    /// Population standard deviation (1.0 for constant columns)
    pub scale: [f64; SCALED_FEATURE_COUNT],
    pub n_samples: usize,
}

impl ScalerStats {
    /// Fit on unscaled feature vectors
    pub fn fit(rows: &[FeatureVector]) -> AppResult<Self> {
        if rows.is_empty() {
            return Err(AppError::training_failed(
                "Cannot fit scaler on an empty dataset",
            ));
        }

        let n = rows.len() as f64;
        let mut mean = [0.0; SCALED_FEATURE_COUNT];
        let mut scale = [0.0; SCALED_FEATURE_COUNT];

        for (col, feature) in SCALED_FEATURES.iter().enumerate() {
            let m = rows.iter().map(|r| r.get(*feature)).sum::<f64>() / n;
            let var = rows
                .iter()
                .map(|r| (r.get(*feature) - m).powi(2))
                .sum::<f64>()
                / n;
            let std = var.sqrt();

            mean[col] = m;
            scale[col] = if std > f64::EPSILON { std } else { 1.0 };
        }

        let stats = Self {
            mean,
            scale,
            n_samples: rows.len(),
        };
        stats.validate()?;
        Ok(stats)
    }

    /// Reject statistics that would produce non-finite features
    pub fn validate(&self) -> AppResult<()> {
        for (col, feature) in SCALED_FEATURES.iter().enumerate() {
            if !self.mean[col].is_finite() {
                return Err(AppError::model_incompatible(format!(
                    "Scaler mean for {} is not finite",
                    feature.name()
                )));
            }
            if !self.scale[col].is_finite() || self.scale[col] <= 0.0 {
                return Err(AppError::model_incompatible(format!(
                    "Scaler scale for {} must be positive, got {}",
                    feature.name(),
                    self.scale[col]
                )));
            }
        }
        Ok(())
    }

    /// Standardize the scaled columns of an unscaled vector
    pub fn apply(&self, raw: &FeatureVector) -> FeatureVector {
        let mut values = raw.to_array();
        for (col, feature) in SCALED_FEATURES.iter().enumerate() {
            let idx = feature.index();
            values[idx] = (values[idx] - self.mean[col]) / self.scale[col];
        }
        FeatureVector::from_array(values)
    }
}

// ============================================
// FEATURE ENGINEER
// ============================================

/// Application -> model features
#[derive(Debug, Clone)]
pub struct FeatureEngineer {
    stats: Arc<ScalerStats>,
}

impl FeatureEngineer {
    pub fn new(stats: Arc<ScalerStats>) -> Self {
        Self { stats }
    }

    pub fn stats(&self) -> &ScalerStats {
        &self.stats
    }

    /// Validate, derive ratios and standardize
    pub fn transform(&self, application: &CreditApplication) -> AppResult<FeatureVector> {
        let raw = Self::derive(application)?;
        Ok(self.stats.apply(&raw))
    }

    /// Validated, unscaled features. Used for fitting and by `transform`.
    pub fn derive(application: &CreditApplication) -> AppResult<FeatureVector> {
        application.validate()?;

        let loan_amount = application.loan_amount;
        let duration = application.loan_duration as f64;
        let income = application.income;

        let monthly_payment = loan_amount / duration;
        let debt_to_income = (monthly_payment + application.existing_debt) / income;
        let loan_to_value = loan_amount / application.collateral_value.max(MIN_COLLATERAL_FOR_LTV);
        let payment_to_income = monthly_payment / income;

        let features = FeatureVector {
            age: application.age as f64,
            job: job_ordinal(&application.employment_type),
            loan_amount,
            loan_duration: duration,
            debt_to_income,
            loan_to_value,
            payment_to_income,
        };

        if !features.is_finite() {
            return Err(AppError::invalid_input(
                "Application produces non-finite features",
            ));
        }

        Ok(features)
    }
}

/// Ordinal for an employment label; unrecognized labels fall back to full-time
pub fn job_ordinal(label: &str) -> f64 {
    match EmploymentType::parse(label) {
        Some(kind) => kind.ordinal() as f64,
        None => {
            warn!(
                employment_type = %label,
                fallback = UNMAPPED_JOB_ORDINAL,
                "Unmapped employment type, using full-time ordinal"
            );
            UNMAPPED_JOB_ORDINAL
        }
    }
}
