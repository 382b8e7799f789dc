//! Credit Risk Assessment API Server
//!
//! Usage:
//!   cargo run --bin credit_api
//!
//! Environment:
//!   CREDIT_RISK_ARTIFACT     - Model artifact (default: models/credit_risk_model.json)
//!   PORT / CREDIT_RISK_PORT  - Server port (default: 8080)
//!   CREDIT_RISK_HOST         - Server host (default: 0.0.0.0)
//!   RUST_LOG                 - Log filter (default: info)

use credit_risk_engine::api::{create_router, handlers::AppState, start_cleanup_task};
use credit_risk_engine::utils::constants::{APP_NAME, APP_VERSION};
use credit_risk_engine::{ArtifactStore, AssessmentTelemetry, EngineConfig};
use eyre::WrapErr;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    info!("{} v{} starting", APP_NAME, APP_VERSION);

    let config = EngineConfig::from_env()?;

    // Load the model before accepting traffic; no artifact, no server
    let artifact_path = config.artifact_path.clone();
    let engine = tokio::task::spawn_blocking(move || ArtifactStore::shared_engine(&artifact_path))
        .await
        .wrap_err("Model loading task panicked")?
        .wrap_err_with(|| {
            format!(
                "Cannot start without a model artifact at {}",
                config.artifact_path.display()
            )
        })?;

    let info = engine.model_info();
    info!(
        scorer = %info.scorer,
        background = info.background_size,
        baseline = info.baseline_probability,
        "Assessment engine ready"
    );

    let telemetry = Arc::new(AssessmentTelemetry::new());
    let telemetry_for_shutdown = telemetry.clone();

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .wrap_err_with(|| format!("Invalid bind address {}", config.bind_address()))?;

    let state = Arc::new(AppState::new(engine, telemetry, config));

    // Start background cleanup task for rate limiter
    start_cleanup_task();

    let app = create_router(state);

    info!("Listening on http://{}", addr);
    info!("  POST /api/v1/assessment/assess  - Assess one application");
    info!("  POST /api/v1/assessment/batch   - Assess a batch of applications");
    info!("  GET  /api/v1/model              - Loaded model info");
    info!("  GET  /api/v1/stats              - Assessment statistics");
    info!("  GET  /api/v1/health             - Health check");

    let listener = TcpListener::bind(addr).await?;

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    let stats = telemetry_for_shutdown.get_stats();
    info!(
        assessed = stats.total_assessed,
        rejected = stats.total_rejected,
        failed = stats.total_failed,
        avg_latency_ms = stats.avg_latency_ms,
        "Shutdown complete"
    );

    Ok(())
}
