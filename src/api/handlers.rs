//! API Request Handlers

use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::StatusCode,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::types::*;
use crate::core::engine::RiskAssessmentEngine;
use crate::models::{AppError, CreditApplication, EngineConfig, RiskCategory};
use crate::utils::constants::APP_VERSION;
use crate::utils::telemetry::AssessmentTelemetry;

/// Shared application state
pub struct AppState {
    pub engine: Arc<RiskAssessmentEngine>,
    pub telemetry: Arc<AssessmentTelemetry>,
    pub config: EngineConfig,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        engine: Arc<RiskAssessmentEngine>,
        telemetry: Arc<AssessmentTelemetry>,
        config: EngineConfig,
    ) -> Self {
        Self {
            engine,
            telemetry,
            config,
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

type ApiFailure = (StatusCode, Json<ApiResponse<()>>);

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn failure(err: &AppError, start: Instant) -> ApiFailure {
    let status =
        StatusCode::from_u16(err.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(ApiResponse::error(ApiError::from(err), elapsed_ms(start))),
    )
}

fn log_error(err: &AppError) {
    if err.is_client_error() {
        warn!(code = err.code_str(), message = %err.message, "Assessment rejected");
    } else {
        error!(code = err.code_str(), error = %err, "Assessment failed");
    }
}

// ============================================
// Health Check
// ============================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthData>> {
    let start = Instant::now();

    let data = HealthData {
        status: "healthy".to_string(),
        version: APP_VERSION.to_string(),
        uptime_seconds: state.uptime_seconds(),
        scorer: state.engine.model_info().scorer.clone(),
    };

    Json(ApiResponse::success(data, elapsed_ms(start)))
}

// ============================================
// Single Assessment
// ============================================

pub async fn assess_application(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreditApplication>, JsonRejection>,
) -> Result<Json<ApiResponse<AssessmentData>>, ApiFailure> {
    let start = Instant::now();

    let Json(application) = payload.map_err(|rejection| {
        let err = AppError::bad_request(rejection.body_text());
        state.telemetry.record_error(&err);
        failure(&err, start)
    })?;

    // CPU-bound; keep it off the async workers
    let engine = state.engine.clone();
    let outcome = tokio::task::spawn_blocking(move || engine.assess(&application))
        .await
        .map_err(|e| failure(&AppError::internal(format!("Assessment task failed: {}", e)), start))?;

    match outcome {
        Ok(result) => {
            state
                .telemetry
                .record_assessment(&result, start.elapsed().as_micros() as u64);

            let data = AssessmentData {
                assessment_id: Uuid::new_v4().to_string(),
                result,
            };
            Ok(Json(ApiResponse::success(data, elapsed_ms(start))))
        }
        Err(err) => {
            state.telemetry.record_error(&err);
            log_error(&err);
            Err(failure(&err, start))
        }
    }
}

// ============================================
// Batch Assessment
// ============================================

pub async fn assess_batch(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BatchAssessmentRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<BatchAssessmentData>>, ApiFailure> {
    let start = Instant::now();

    let Json(req) = payload.map_err(|rejection| {
        let err = AppError::bad_request(rejection.body_text());
        state.telemetry.record_error(&err);
        failure(&err, start)
    })?;

    // Validate request
    if req.applications.is_empty() {
        return Err(failure(
            &AppError::bad_request("applications array cannot be empty"),
            start,
        ));
    }

    let max_batch = state.config.max_batch;
    if req.applications.len() > max_batch {
        return Err(failure(
            &AppError::bad_request(format!(
                "Maximum {} applications per batch request, got {}",
                max_batch,
                req.applications.len()
            )),
            start,
        ));
    }

    let total_requested = req.applications.len();
    let engine = state.engine.clone();
    let outcomes = tokio::task::spawn_blocking(move || engine.assess_batch(&req.applications))
        .await
        .map_err(|e| failure(&AppError::internal(format!("Batch task failed: {}", e)), start))?;

    let per_item_us = start.elapsed().as_micros() as u64 / total_requested as u64;
    let mut by_category: HashMap<String, usize> = RiskCategory::ALL
        .iter()
        .map(|c| (c.as_str().to_string(), 0))
        .collect();

    let results: Vec<BatchItemResult> = outcomes
        .into_iter()
        .enumerate()
        .map(|(index, outcome)| match outcome {
            Ok(result) => {
                state.telemetry.record_assessment(&result, per_item_us);
                *by_category
                    .entry(result.risk_category.as_str().to_string())
                    .or_insert(0) += 1;
                BatchItemResult {
                    index,
                    status: "success".to_string(),
                    assessment_id: Some(Uuid::new_v4().to_string()),
                    result: Some(result),
                    error: None,
                }
            }
            Err(err) => {
                state.telemetry.record_error(&err);
                log_error(&err);
                BatchItemResult {
                    index,
                    status: "error".to_string(),
                    assessment_id: None,
                    result: None,
                    error: Some(ApiError::from(&err)),
                }
            }
        })
        .collect();

    let total_assessed = results.iter().filter(|r| r.result.is_some()).count();
    let processing_time_ms = elapsed_ms(start);

    info!(
        requested = total_requested,
        assessed = total_assessed,
        latency_ms = processing_time_ms,
        "Batch assessment completed"
    );

    let data = BatchAssessmentData {
        total_requested,
        total_assessed,
        total_failed: total_requested - total_assessed,
        by_category,
        results,
        processing_time_ms,
    };

    Ok(Json(ApiResponse::success(data, processing_time_ms)))
}

// ============================================
// Model / Stats
// ============================================

pub async fn get_model(State(state): State<Arc<AppState>>) -> Json<ApiResponse<ModelData>> {
    let start = Instant::now();

    let data = ModelData {
        info: state.engine.model_info().clone(),
        artifact_path: state.config.artifact_path.display().to_string(),
    };

    Json(ApiResponse::success(data, elapsed_ms(start)))
}

pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<ApiResponse<StatsData>> {
    let start = Instant::now();

    let data = StatsData {
        telemetry: state.telemetry.get_stats(),
        uptime_seconds: state.uptime_seconds(),
        api_version: APP_VERSION.to_string(),
    };

    Json(ApiResponse::success(data, elapsed_ms(start)))
}
