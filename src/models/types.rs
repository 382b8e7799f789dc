//! Type definitions for the credit risk engine
//! Application input, engineered features and assessment output

use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::{AppError, AppResult};
use crate::utils::constants::{LOW_RISK_UPPER, MEDIUM_RISK_UPPER};

// ============================================
// APPLICATION INPUT
// ============================================

/// Raw credit application as received from the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditApplication {
    pub age: i32,
    /// Free text; mapped to an ordinal by the feature engineer
    pub employment_type: String,
    pub income: f64,
    pub loan_amount: f64,
    /// Months
    pub loan_duration: i32,
    #[serde(default)]
    pub existing_debt: f64,
    #[serde(default)]
    pub collateral_value: f64,
    #[serde(default)]
    pub credit_score: Option<i32>,
    #[serde(default)]
    pub recent_inquiries: i32,
    #[serde(default)]
    pub is_existing_client: bool,
    #[serde(default)]
    pub is_preferred_client: bool,
}

impl CreditApplication {
    /// Check every field against its declared domain.
    ///
    /// Must pass before any ratio is derived: a zero duration or income
    /// would otherwise turn into NaN/inf features.
    pub fn validate(&self) -> AppResult<()> {
        if self.age < 0 {
            return Err(AppError::invalid_input(format!(
                "age must be >= 0, got {}",
                self.age
            )));
        }
        if self.loan_duration <= 0 {
            return Err(AppError::invalid_input(format!(
                "loan_duration must be > 0 months, got {}",
                self.loan_duration
            )));
        }
        require_positive("income", self.income)?;
        require_positive("loan_amount", self.loan_amount)?;
        require_non_negative("existing_debt", self.existing_debt)?;
        require_non_negative("collateral_value", self.collateral_value)?;
        if self.recent_inquiries < 0 {
            return Err(AppError::invalid_input(format!(
                "recent_inquiries must be >= 0, got {}",
                self.recent_inquiries
            )));
        }
        Ok(())
    }
}

fn require_positive(field: &str, value: f64) -> AppResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(AppError::invalid_input(format!(
            "{} must be a finite value > 0, got {}",
            field, value
        )));
    }
    Ok(())
}

fn require_non_negative(field: &str, value: f64) -> AppResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(AppError::invalid_input(format!(
            "{} must be a finite value >= 0, got {}",
            field, value
        )));
    }
    Ok(())
}

/// Historical application with its observed outcome (training input)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledApplication {
    #[serde(flatten)]
    pub application: CreditApplication,
    /// True when the loan defaulted
    pub defaulted: bool,
}

/// Closed set of recognized employment types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmploymentType {
    Unemployed,
    PartTime,
    FullTime,
    Executive,
}

impl EmploymentType {
    pub const ALL: [EmploymentType; 4] = [
        EmploymentType::Unemployed,
        EmploymentType::PartTime,
        EmploymentType::FullTime,
        EmploymentType::Executive,
    ];

    /// Case-insensitive; accepts `-`, `_` or a space between words
    pub fn parse(label: &str) -> Option<Self> {
        let normalized: String = label
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "unemployed" => Some(Self::Unemployed),
            "parttime" => Some(Self::PartTime),
            "fulltime" => Some(Self::FullTime),
            "executive" => Some(Self::Executive),
            _ => None,
        }
    }

    pub fn ordinal(&self) -> u8 {
        match self {
            Self::Unemployed => 0,
            Self::PartTime => 1,
            Self::FullTime => 2,
            Self::Executive => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unemployed => "unemployed",
            Self::PartTime => "part-time",
            Self::FullTime => "full-time",
            Self::Executive => "executive",
        }
    }
}

/// Whether any collateral backs the loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollateralPresence {
    Secured,
    Unsecured,
}

impl CollateralPresence {
    /// Any positive collateral value secures the loan
    pub fn from_value(collateral_value: f64) -> Self {
        if collateral_value > 0.0 {
            Self::Secured
        } else {
            Self::Unsecured
        }
    }
}

// ============================================
// FEATURES
// ============================================

/// Number of model features
pub const FEATURE_COUNT: usize = 7;

/// Model features in their fixed order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Age,
    Job,
    LoanAmount,
    LoanDuration,
    DebtToIncome,
    LoanToValue,
    PaymentToIncome,
}

impl Feature {
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::Age,
        Feature::Job,
        Feature::LoanAmount,
        Feature::LoanDuration,
        Feature::DebtToIncome,
        Feature::LoanToValue,
        Feature::PaymentToIncome,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Age => "age",
            Self::Job => "job",
            Self::LoanAmount => "loan_amount",
            Self::LoanDuration => "loan_duration",
            Self::DebtToIncome => "debt_to_income",
            Self::LoanToValue => "loan_to_value",
            Self::PaymentToIncome => "payment_to_income",
        }
    }

    /// Position in the feature vector
    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// Engineered model input.
///
/// The last five fields are standardized with fitted scaler statistics;
/// `age` and `job` are passed through unscaled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub age: f64,
    pub job: f64,
    pub loan_amount: f64,
    pub loan_duration: f64,
    pub debt_to_income: f64,
    pub loan_to_value: f64,
    pub payment_to_income: f64,
}

impl FeatureVector {
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.age,
            self.job,
            self.loan_amount,
            self.loan_duration,
            self.debt_to_income,
            self.loan_to_value,
            self.payment_to_income,
        ]
    }

    pub fn from_array(values: [f64; FEATURE_COUNT]) -> Self {
        Self {
            age: values[0],
            job: values[1],
            loan_amount: values[2],
            loan_duration: values[3],
            debt_to_income: values[4],
            loan_to_value: values[5],
            payment_to_income: values[6],
        }
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.to_array()[feature.index()]
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

// ============================================
// ASSESSMENT OUTPUT
// ============================================

/// Risk band derived from the default probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskCategory {
    Low,
    Medium,
    High,
}

impl RiskCategory {
    pub const ALL: [RiskCategory; 3] = [RiskCategory::Low, RiskCategory::Medium, RiskCategory::High];

    /// Half-open bands: Low [0, 0.30), Medium [0.30, 0.70), High otherwise.
    pub fn from_probability(probability: f64) -> Self {
        if (0.0..LOW_RISK_UPPER).contains(&probability) {
            Self::Low
        } else if (LOW_RISK_UPPER..MEDIUM_RISK_UPPER).contains(&probability) {
            Self::Medium
        } else {
            Self::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signed contribution of one feature to the predicted probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyFactor {
    pub feature: String,
    pub impact: f64,
}

/// Complete assessment of one application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessmentResult {
    /// round(probability * 100, 1)
    pub risk_score: f64,
    pub risk_category: RiskCategory,
    pub expected_profit: f64,
    pub recommendation: String,
    pub pricing_adjustment: String,
    /// One entry per feature, in feature order
    pub key_factors: Vec<KeyFactor>,
}
