//! HTTP API tests (router driven in-process)

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use credit_risk_engine::api::{create_router, handlers::AppState};
use credit_risk_engine::core::features::ScalerStats;
use credit_risk_engine::core::risk_model::LogisticScorer;
use credit_risk_engine::models::FeatureVector;
use credit_risk_engine::providers::ScorerArtifact;
use credit_risk_engine::{
    AssessmentTelemetry, EngineConfig, ModelArtifact, RiskAssessmentEngine,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

fn engine() -> Arc<RiskAssessmentEngine> {
    let artifact = ModelArtifact::new(
        ScalerStats {
            mean: [15000.0, 30.0, 0.35, 3.0, 0.1],
            scale: [8000.0, 18.0, 0.2, 4.0, 0.08],
            n_samples: 1000,
        },
        ScorerArtifact::Logistic(LogisticScorer::new(
            -1.2,
            [-0.01, -0.3, 0.2, 0.1, 0.9, 0.3, 0.8],
        )),
        vec![
            FeatureVector::from_array([35.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            FeatureVector::from_array([50.0, 3.0, -0.5, 1.0, -0.5, -0.2, -0.4]),
        ],
    );
    Arc::new(RiskAssessmentEngine::from_artifact(&artifact).unwrap())
}

fn app_with(config: EngineConfig) -> Router {
    let state = Arc::new(AppState::new(
        engine(),
        Arc::new(AssessmentTelemetry::new()),
        config,
    ));
    create_router(state)
}

fn app() -> Router {
    app_with(EngineConfig::default())
}

fn application() -> Value {
    json!({
        "age": 35,
        "employment_type": "Full-time",
        "income": 5000.0,
        "loan_amount": 12000.0,
        "loan_duration": 24,
        "existing_debt": 400.0,
        "collateral_value": 0.0
    })
}

/// Every test gets its own rate limit bucket
fn request(method: &str, uri: &str, body: Option<String>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-api-key", Uuid::new_v4().to_string())
        .header("content-type", "application/json");
    builder
        .body(body.map(Body::from).unwrap_or_else(Body::empty))
        .unwrap()
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health_endpoints() {
    for uri in ["/health", "/api/v1/health"] {
        let (status, body) = send(app(), request("GET", uri, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["status"], "healthy");
        assert_eq!(body["data"]["scorer"], "logistic");
    }
}

#[tokio::test]
async fn test_assess_returns_full_result() {
    let (status, body) = send(
        app(),
        request(
            "POST",
            "/api/v1/assessment/assess",
            Some(application().to_string()),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert!(Uuid::parse_str(data["assessment_id"].as_str().unwrap()).is_ok());

    let score = data["risk_score"].as_f64().unwrap();
    assert!((0.0..=100.0).contains(&score));
    assert!(["Low", "Medium", "High"].contains(&data["risk_category"].as_str().unwrap()));
    assert!(data["expected_profit"].is_number());
    assert!(data["recommendation"].is_string());
    assert!(data["pricing_adjustment"].is_string());

    let factors = data["key_factors"].as_array().unwrap();
    assert_eq!(factors.len(), 7);
    assert_eq!(factors[0]["feature"], "age");
}

#[tokio::test]
async fn test_invalid_application_is_bad_request() {
    let mut app_json = application();
    app_json["loan_duration"] = json!(0);

    let (status, body) = send(
        app(),
        request("POST", "/api/v1/assessment/assess", Some(app_json.to_string())),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "INPUT_INVALID");
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let (status, body) = send(
        app(),
        request(
            "POST",
            "/api/v1/assessment/assess",
            Some("{\"age\": \"thirty\"}".to_string()),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "API_BAD_REQUEST");
}

#[tokio::test]
async fn test_batch_reports_per_item_status() {
    let mut bad = application();
    bad["income"] = json!(0.0);
    let mut secured = application();
    secured["collateral_value"] = json!(9000.0);

    let payload = json!({ "applications": [application(), bad, secured] });
    let (status, body) = send(
        app(),
        request(
            "POST",
            "/api/v1/assessment/batch",
            Some(payload.to_string()),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["total_requested"], 3);
    assert_eq!(data["total_assessed"], 2);
    assert_eq!(data["total_failed"], 1);

    let results = data["results"].as_array().unwrap();
    assert_eq!(results[0]["status"], "success");
    assert_eq!(results[1]["status"], "error");
    assert_eq!(results[1]["error"]["code"], "INPUT_INVALID");
    assert_eq!(results[2]["index"], 2);

    let by_category = data["by_category"].as_object().unwrap();
    let counted: u64 = by_category.values().map(|v| v.as_u64().unwrap()).sum();
    assert_eq!(counted, 2);
}

#[tokio::test]
async fn test_batch_size_limits() {
    let empty = json!({ "applications": [] });
    let (status, _) = send(
        app(),
        request("POST", "/api/v1/assessment/batch", Some(empty.to_string())),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let config = EngineConfig {
        max_batch: 2,
        ..EngineConfig::default()
    };
    let too_many = json!({ "applications": [application(), application(), application()] });
    let (status, body) = send(
        app_with(config),
        request("POST", "/api/v1/assessment/batch", Some(too_many.to_string())),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "API_BAD_REQUEST");
}

#[tokio::test]
async fn test_stats_track_assessments() {
    let router = app();

    let (status, _) = send(
        router.clone(),
        request(
            "POST",
            "/api/v1/assessment/assess",
            Some(application().to_string()),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let mut bad = application();
    bad["loan_amount"] = json!(-1.0);
    let (status, _) = send(
        router.clone(),
        request("POST", "/api/v1/assessment/assess", Some(bad.to_string())),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(router, request("GET", "/api/v1/stats", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_assessed"], 1);
    assert_eq!(body["data"]["total_rejected"], 1);
    assert_eq!(body["data"]["total_failed"], 0);
}

#[tokio::test]
async fn test_malformed_bodies_are_counted_as_rejected() {
    let router = app();

    for uri in ["/api/v1/assessment/assess", "/api/v1/assessment/batch"] {
        let (status, _) = send(
            router.clone(),
            request("POST", uri, Some("{\"applications\": 3".to_string())),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (_, body) = send(router, request("GET", "/api/v1/stats", None)).await;
    assert_eq!(body["data"]["total_rejected"], 2);
    assert_eq!(body["data"]["total_assessed"], 0);
    assert_eq!(body["data"]["total_failed"], 0);
}

#[tokio::test]
async fn test_model_info() {
    let (status, body) = send(app(), request("GET", "/api/v1/model", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["scorer"], "logistic");
    assert_eq!(body["data"]["background_size"], 2);
    let baseline = body["data"]["baseline_probability"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&baseline));
}

#[tokio::test]
async fn test_rate_limit_exempts_health() {
    let router = app();
    let key = Uuid::new_v4().to_string();
    let limit = EngineConfig::default().rate_limit_per_minute;

    let get = |uri: &str| {
        Request::builder()
            .method("GET")
            .uri(uri)
            .header("x-api-key", key.as_str())
            .body(Body::empty())
            .unwrap()
    };

    for _ in 0..limit {
        let response = router.clone().oneshot(get("/api/v1/model")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = router.clone().oneshot(get("/api/v1/model")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let response = router.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
