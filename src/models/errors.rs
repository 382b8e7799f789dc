//! Centralized Error Handling Module
//!
//! Every failure carries a unique code so logs and API responses can be
//! correlated without parsing messages.
//!
//! Error codes follow pattern: CATEGORY_SPECIFIC_ERROR
//! - INPUT_xxx: application fields outside their domain
//! - MODEL_xxx: artifact loading and training
//! - ASSESS_xxx: scoring / attribution failures
//! - API_xxx: HTTP layer errors
//! - CFG_xxx: configuration errors

use std::fmt;

/// Application-wide error type
#[derive(Debug)]
pub struct AppError {
    /// Unique error code for logging/monitoring
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Optional underlying error
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new AppError
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create AppError with source error
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get error code as string (for logging)
    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    /// True for errors caused by the caller's input rather than the service
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.code.http_status())
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Unique error codes for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // ============================================
    // Input Errors
    // ============================================
    /// A field is outside its declared domain (income <= 0, duration <= 0, ...)
    InvalidInput,

    // ============================================
    // Model / Artifact Errors
    // ============================================
    /// Artifact missing or unreadable
    ModelLoadFailed,
    /// Artifact readable but structurally incompatible
    ModelIncompatible,
    /// Artifact could not be written
    ArtifactWriteFailed,
    /// Training data unusable
    TrainingFailed,

    // ============================================
    // Assessment Errors
    // ============================================
    /// Scoring or attribution produced an unusable value
    AssessmentFailed,

    // ============================================
    // API Errors
    // ============================================
    /// Invalid request format
    ApiBadRequest,
    /// Rate limit exceeded
    ApiRateLimited,
    /// Internal server error
    ApiInternalError,

    // ============================================
    // Configuration Errors
    // ============================================
    /// Invalid configuration value
    ConfigInvalidValue,

    // ============================================
    // Generic Errors
    // ============================================
    /// Unknown error
    Unknown,
}

impl ErrorCode {
    /// Get string representation of error code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "INPUT_INVALID",

            Self::ModelLoadFailed => "MODEL_LOAD_FAILED",
            Self::ModelIncompatible => "MODEL_INCOMPATIBLE",
            Self::ArtifactWriteFailed => "MODEL_WRITE_FAILED",
            Self::TrainingFailed => "MODEL_TRAINING_FAILED",

            Self::AssessmentFailed => "ASSESS_FAILED",

            Self::ApiBadRequest => "API_BAD_REQUEST",
            Self::ApiRateLimited => "API_RATE_LIMITED",
            Self::ApiInternalError => "API_INTERNAL_ERROR",

            Self::ConfigInvalidValue => "CFG_INVALID_VALUE",

            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Get HTTP status code for API responses
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidInput | Self::ApiBadRequest => 400,
            Self::ApiRateLimited => 429,
            Self::ModelLoadFailed | Self::ModelIncompatible => 503,
            _ => 500,
        }
    }
}

// ============================================
// Convenience constructors
// ============================================

impl AppError {
    /// Application field outside its domain
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, msg)
    }

    /// Artifact structurally incompatible
    pub fn model_incompatible(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ModelIncompatible, msg)
    }

    /// Training data unusable
    pub fn training_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::TrainingFailed, msg)
    }

    /// Scoring / attribution failure
    pub fn assessment_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::AssessmentFailed, msg)
    }

    /// Invalid configuration value
    pub fn invalid_config(key: &str, value: &str) -> Self {
        Self::new(
            ErrorCode::ConfigInvalidValue,
            format!("Invalid value for {}: {:?}", key, value),
        )
    }

    /// API bad request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiBadRequest, msg)
    }

    /// API internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiInternalError, msg)
    }
}

// ============================================
// Result type alias
// ============================================

/// Application Result type
pub type AppResult<T> = Result<T, AppError>;

// ============================================
// Conversion from common error types
// ============================================

impl From<eyre::Report> for AppError {
    fn from(err: eyre::Report) -> Self {
        Self::new(ErrorCode::Unknown, err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorCode::Unknown, "IO error", err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(ErrorCode::ApiBadRequest, "JSON parse error", err)
    }
}
