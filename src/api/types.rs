//! API Request/Response Types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::engine::ModelInfo;
use crate::models::{AppError, CreditApplication, RiskAssessmentResult};
use crate::utils::telemetry::TelemetryStats;

/// API Response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub latency_ms: f64,
    pub timestamp: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T, latency_ms: f64) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            latency_ms,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

impl ApiResponse<()> {
    pub fn error(error: ApiError, latency_ms: f64) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            latency_ms,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// API Error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn rate_limited(retry_after: u64) -> Self {
        Self {
            code: "API_RATE_LIMITED".to_string(),
            message: format!("Rate limit exceeded. Retry after {} seconds", retry_after),
            details: Some(format!("retry_after: {}", retry_after)),
        }
    }
}

impl From<&AppError> for ApiError {
    fn from(err: &AppError) -> Self {
        Self {
            code: err.code_str().to_string(),
            message: err.message.clone(),
            details: std::error::Error::source(err).map(|s| s.to_string()),
        }
    }
}

// ============================================
// Single Assessment
// ============================================

#[derive(Debug, Serialize, Deserialize)]
pub struct AssessmentData {
    pub assessment_id: String,
    #[serde(flatten)]
    pub result: RiskAssessmentResult,
}

// ============================================
// Batch Assessment
// ============================================

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchAssessmentRequest {
    pub applications: Vec<CreditApplication>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchAssessmentData {
    pub total_requested: usize,
    pub total_assessed: usize,
    pub total_failed: usize,
    /// Successful assessments per risk category
    pub by_category: HashMap<String, usize>,
    pub results: Vec<BatchItemResult>,
    pub processing_time_ms: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchItemResult {
    /// Position in the request
    pub index: usize,
    pub status: String, // "success" | "error"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<RiskAssessmentResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

// ============================================
// Model / Stats / Health
// ============================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelData {
    #[serde(flatten)]
    pub info: ModelInfo,
    pub artifact_path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsData {
    #[serde(flatten)]
    pub telemetry: TelemetryStats,
    pub uptime_seconds: u64,
    pub api_version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthData {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub scorer: String,
}
