//! Constants Module - Single Source of Truth
//!
//! Policy thresholds, pricing parameters, model defaults and service limits.
//! Other modules import from here instead of hardcoding values.

// ============================================
// APPLICATION CONSTANTS
// ============================================

/// Application name
pub const APP_NAME: &str = "CreditRiskEngine";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================
// RISK CATEGORY THRESHOLDS
// ============================================

/// Low = [0, LOW_RISK_UPPER)
pub const LOW_RISK_UPPER: f64 = 0.30;

/// Medium = [LOW_RISK_UPPER, MEDIUM_RISK_UPPER); everything else is High
pub const MEDIUM_RISK_UPPER: f64 = 0.70;

// ============================================
// PRICING / PROFIT PARAMETERS
// ============================================

/// Base lending rate applied to the loan amount
pub const BASE_RATE: f64 = 0.08;

/// Added to the base rate for existing clients
pub const EXISTING_CLIENT_RATE_ADJUSTMENT: f64 = 0.01;

/// Loss given default
pub const LOSS_GIVEN_DEFAULT: f64 = 0.85;

/// Fixed surcharge for secured high-risk loans (basis points)
pub const HIGH_RISK_SECURED_BPS: i64 = 400;

/// Medium surcharge slope: bps = trunc((p - LOW_RISK_UPPER) * slope)
pub const MEDIUM_RISK_BPS_SLOPE: f64 = 200.0;

// ============================================
// FEATURE ENGINEERING
// ============================================

/// Job ordinal used when employment_type is not recognized (full-time)
pub const UNMAPPED_JOB_ORDINAL: f64 = 2.0;

/// Floor applied to collateral before computing loan-to-value
pub const MIN_COLLATERAL_FOR_LTV: f64 = 1.0;

// ============================================
// MODEL DEFAULTS
// ============================================

/// Artifact format understood by this build
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Default artifact location
pub const DEFAULT_ARTIFACT_PATH: &str = "models/credit_risk_model.json";

/// Ensemble size
pub const DEFAULT_N_TREES: usize = 200;

/// Maximum tree depth
pub const DEFAULT_MAX_DEPTH: usize = 7;

/// Minimum samples required to split a node
pub const DEFAULT_MIN_SAMPLES_SPLIT: usize = 5;

/// Training seed
pub const DEFAULT_SEED: u64 = 42;

/// Maximum reference rows kept for attribution
pub const MAX_BACKGROUND_SAMPLES: usize = 50;

// ============================================
// SERVICE LIMITS
// ============================================

/// Default applications per batch request
pub const DEFAULT_MAX_BATCH: usize = 100;

/// Default requests per minute per client
pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 120;

/// Default bind port
pub const DEFAULT_PORT: u16 = 8080;

/// Rate limit window
pub const RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// In-flight HTTP requests before callers queue
pub const MAX_CONCURRENT_REQUESTS: usize = 512;

/// Round to one decimal place.
///
/// Formatting rounds the exact binary value (ties to even), so 0.15 stays
/// below the tie and goes down. Scaling by 10 first would push it onto it.
pub fn round1(value: f64) -> f64 {
    format!("{:.1}", value).parse().unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds_ordered() {
        assert!(0.0 < LOW_RISK_UPPER);
        assert!(LOW_RISK_UPPER < MEDIUM_RISK_UPPER);
        assert!(MEDIUM_RISK_UPPER < 1.0);
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(15.04), 15.0);
        assert_eq!(round1(15.06), 15.1);
        assert_eq!(round1(100.0), 100.0);
        assert_eq!(round1(0.15), 0.1);
        assert_eq!(round1(0.25), 0.2);
        assert_eq!(round1(1.25), 1.2);
        assert_eq!(round1(-0.06), -0.1);
    }
}
