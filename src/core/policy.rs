//! Business policy: probability -> category, score, profit, recommendation
//!
//! Pure functions of (probability, loan_amount, collateral_value,
//! is_existing_client). Recommendation and pricing come from a
//! (category × collateral) table rather than nested conditionals.

use std::fmt;

use crate::models::{AppError, AppResult, CollateralPresence, RiskCategory};
use crate::utils::constants::{
    round1, BASE_RATE, EXISTING_CLIENT_RATE_ADJUSTMENT, HIGH_RISK_SECURED_BPS, LOSS_GIVEN_DEFAULT,
    LOW_RISK_UPPER, MEDIUM_RISK_BPS_SLOPE,
};

/// Lending recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    Approve,
    ApproveWithConditions,
    ApproveWithCollateral,
    Decline,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "Approve",
            Self::ApproveWithConditions => "Approve with conditions",
            Self::ApproveWithCollateral => "Approve with collateral",
            Self::Decline => "Decline application",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rate adjustment applied to the offer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingAdjustment {
    StandardRate,
    BasisPoints(i64),
    NotApplicable,
}

impl fmt::Display for PricingAdjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StandardRate => f.write_str("Standard rate"),
            Self::BasisPoints(bps) => write!(f, "+{} bps", bps),
            Self::NotApplicable => f.write_str("N/A"),
        }
    }
}

/// How a table row prices the loan
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PricingRule {
    Standard,
    Fixed(i64),
    /// trunc((p - floor) * slope), toward zero
    ScaledAbove { floor: f64, slope: f64 },
    NotApplicable,
}

impl PricingRule {
    fn price(&self, probability: f64) -> PricingAdjustment {
        match *self {
            Self::Standard => PricingAdjustment::StandardRate,
            Self::Fixed(bps) => PricingAdjustment::BasisPoints(bps),
            Self::ScaledAbove { floor, slope } => {
                PricingAdjustment::BasisPoints(((probability - floor) * slope).trunc() as i64)
            }
            Self::NotApplicable => PricingAdjustment::NotApplicable,
        }
    }
}

/// One row of the decision table; `collateral: None` matches either
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyRule {
    pub category: RiskCategory,
    pub collateral: Option<CollateralPresence>,
    pub recommendation: Recommendation,
    pub pricing: PricingRule,
}

/// Decision table, first match wins
pub const POLICY_TABLE: [PolicyRule; 4] = [
    PolicyRule {
        category: RiskCategory::High,
        collateral: Some(CollateralPresence::Secured),
        recommendation: Recommendation::ApproveWithCollateral,
        pricing: PricingRule::Fixed(HIGH_RISK_SECURED_BPS),
    },
    PolicyRule {
        category: RiskCategory::High,
        collateral: Some(CollateralPresence::Unsecured),
        recommendation: Recommendation::Decline,
        pricing: PricingRule::NotApplicable,
    },
    PolicyRule {
        category: RiskCategory::Medium,
        collateral: None,
        recommendation: Recommendation::ApproveWithConditions,
        pricing: PricingRule::ScaledAbove {
            floor: LOW_RISK_UPPER,
            slope: MEDIUM_RISK_BPS_SLOPE,
        },
    },
    PolicyRule {
        category: RiskCategory::Low,
        collateral: None,
        recommendation: Recommendation::Approve,
        pricing: PricingRule::Standard,
    },
];

/// Business fields the policy reads
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyInputs {
    pub loan_amount: f64,
    pub collateral_value: f64,
    pub is_existing_client: bool,
}

/// Everything the policy decides for one application
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyDecision {
    pub risk_score: f64,
    pub category: RiskCategory,
    pub expected_profit: f64,
    pub recommendation: Recommendation,
    pub pricing: PricingAdjustment,
}

/// Stateless policy engine
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyEngine;

impl PolicyEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn categorize(&self, probability: f64) -> RiskCategory {
        RiskCategory::from_probability(probability)
    }

    /// round(p * 100, 1)
    pub fn risk_score(&self, probability: f64) -> f64 {
        round1(probability * 100.0)
    }

    /// Interest at the (client-adjusted) rate minus expected loss
    pub fn expected_profit(&self, amount: f64, probability: f64, is_existing_client: bool) -> f64 {
        let rate = BASE_RATE
            + if is_existing_client {
                EXISTING_CLIENT_RATE_ADJUSTMENT
            } else {
                0.0
            };
        amount * rate - amount * probability * LOSS_GIVEN_DEFAULT
    }

    pub fn lookup(
        &self,
        category: RiskCategory,
        collateral: CollateralPresence,
    ) -> Option<&'static PolicyRule> {
        POLICY_TABLE.iter().find(|rule| {
            rule.category == category && rule.collateral.map_or(true, |c| c == collateral)
        })
    }

    pub fn recommend(
        &self,
        category: RiskCategory,
        probability: f64,
        collateral_value: f64,
    ) -> AppResult<(Recommendation, PricingAdjustment)> {
        let collateral = CollateralPresence::from_value(collateral_value);

        let rule = self.lookup(category, collateral).ok_or_else(|| {
            AppError::assessment_failed(format!(
                "No policy rule for {} / {:?}",
                category, collateral
            ))
        })?;

        Ok((rule.recommendation, rule.pricing.price(probability)))
    }

    pub fn decide(&self, probability: f64, inputs: &PolicyInputs) -> AppResult<PolicyDecision> {
        let category = self.categorize(probability);
        let (recommendation, pricing) =
            self.recommend(category, probability, inputs.collateral_value)?;

        Ok(PolicyDecision {
            risk_score: self.risk_score(probability),
            category,
            expected_profit: self.expected_profit(
                inputs.loan_amount,
                probability,
                inputs.is_existing_client,
            ),
            recommendation,
            pricing,
        })
    }
}
