//! Integration tests for the assessment pipeline

use credit_risk_engine::providers::dataset::generate_synthetic;
use credit_risk_engine::{
    ArtifactStore, CreditApplication, ErrorCode, ForestConfig, ModelArtifact,
    RiskAssessmentEngine, RiskCategory,
};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

fn temp_artifact_path() -> PathBuf {
    std::env::temp_dir().join(format!("credit_it_{}.json", Uuid::new_v4()))
}

fn quick_config() -> ForestConfig {
    ForestConfig {
        n_trees: 25,
        max_depth: 5,
        ..ForestConfig::default()
    }
}

fn trained_artifact() -> ModelArtifact {
    let records = generate_synthetic(400, 11);
    ArtifactStore::train(&records, quick_config()).unwrap()
}

fn safe_application() -> CreditApplication {
    CreditApplication {
        age: 45,
        employment_type: "executive".to_string(),
        income: 12000.0,
        loan_amount: 2000.0,
        loan_duration: 72,
        existing_debt: 0.0,
        collateral_value: 5000.0,
        credit_score: Some(800),
        recent_inquiries: 0,
        is_existing_client: true,
        is_preferred_client: true,
    }
}

fn risky_application() -> CreditApplication {
    CreditApplication {
        age: 21,
        employment_type: "unemployed".to_string(),
        income: 900.0,
        loan_amount: 39000.0,
        loan_duration: 6,
        existing_debt: 350.0,
        collateral_value: 0.0,
        credit_score: Some(420),
        recent_inquiries: 6,
        is_existing_client: false,
        is_preferred_client: false,
    }
}

#[test]
fn test_train_save_load_assess() {
    let artifact = trained_artifact();
    let path = temp_artifact_path();
    ArtifactStore::save(&artifact, &path).unwrap();

    let loaded = ArtifactStore::load(&path).unwrap();
    let _ = std::fs::remove_file(&path);
    let engine = RiskAssessmentEngine::from_artifact(&loaded).unwrap();

    assert_eq!(engine.model_info().scorer, "random_forest");
    assert_eq!(engine.model_info().background_size, 50);

    let safe = engine.assess(&safe_application()).unwrap();
    let risky = engine.assess(&risky_application()).unwrap();

    for result in [&safe, &risky] {
        assert!((0.0..=100.0).contains(&result.risk_score));
        assert_eq!(result.key_factors.len(), 7);
        assert!(result.key_factors.iter().all(|f| f.impact.is_finite()));
    }
    assert!(risky.risk_score > safe.risk_score);
}

#[test]
fn test_attribution_accounts_for_score() {
    let engine = RiskAssessmentEngine::from_artifact(&trained_artifact()).unwrap();
    let baseline = engine.model_info().baseline_probability;

    for app in [safe_application(), risky_application()] {
        let result = engine.assess(&app).unwrap();
        let explained = baseline + result.key_factors.iter().map(|f| f.impact).sum::<f64>();
        // risk_score is rounded to 0.1 points
        assert!((explained * 100.0 - result.risk_score).abs() <= 0.05 + 1e-6);
    }
}

#[test]
fn test_assessment_is_deterministic() {
    let engine = RiskAssessmentEngine::from_artifact(&trained_artifact()).unwrap();
    let app = risky_application();
    assert_eq!(engine.assess(&app).unwrap(), engine.assess(&app).unwrap());
}

#[test]
fn test_training_is_reproducible() {
    let a = trained_artifact();
    let b = trained_artifact();
    assert_eq!(a.scorer, b.scorer);
    assert_eq!(a.scaler, b.scaler);
    assert_eq!(a.background, b.background);
}

#[test]
fn test_invalid_application_fails_fast() {
    let engine = RiskAssessmentEngine::from_artifact(&trained_artifact()).unwrap();

    let mut app = safe_application();
    app.loan_duration = 0;
    assert_eq!(engine.assess(&app).unwrap_err().code, ErrorCode::InvalidInput);

    let mut app = safe_application();
    app.income = 0.0;
    assert_eq!(engine.assess(&app).unwrap_err().code, ErrorCode::InvalidInput);
}

#[test]
fn test_unknown_employment_scored_as_full_time() {
    let engine = RiskAssessmentEngine::from_artifact(&trained_artifact()).unwrap();

    let mut intern = safe_application();
    intern.employment_type = "Intern".to_string();
    let mut full_time = safe_application();
    full_time.employment_type = "FULL_TIME".to_string();

    assert_eq!(
        engine.assess(&intern).unwrap(),
        engine.assess(&full_time).unwrap()
    );
}

#[test]
fn test_externally_authored_logistic_artifact() {
    let json = r#"{
        "format_version": 1,
        "created_at": "2024-01-01T00:00:00Z",
        "scaler": {
            "mean": [15000.0, 30.0, 0.35, 3.0, 0.1],
            "scale": [8000.0, 18.0, 0.2, 4.0, 0.08],
            "n_samples": 1000
        },
        "scorer": {
            "kind": "logistic",
            "intercept": -1.2,
            "coefficients": [-0.01, -0.3, 0.2, 0.1, 0.9, 0.3, 0.8]
        },
        "background": [
            {"age": 35.0, "job": 2.0, "loan_amount": 0.0, "loan_duration": 0.0,
             "debt_to_income": 0.0, "loan_to_value": 0.0, "payment_to_income": 0.0}
        ]
    }"#;
    let path = temp_artifact_path();
    std::fs::write(&path, json).unwrap();
    let artifact = ArtifactStore::load(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    let engine = RiskAssessmentEngine::from_artifact(&artifact).unwrap();
    assert_eq!(engine.model_info().scorer, "logistic");

    let risky = engine.assess(&risky_application()).unwrap();
    let safe = engine.assess(&safe_application()).unwrap();
    assert_eq!(risky.risk_category, RiskCategory::High);
    assert_eq!(risky.recommendation, "Decline application");
    assert_eq!(risky.pricing_adjustment, "N/A");
    assert!(safe.risk_score < risky.risk_score);
}

#[test]
fn test_shared_engine_loads_once() {
    // Failed loads are not cached
    let missing = temp_artifact_path();
    let err = ArtifactStore::shared_engine(&missing).unwrap_err();
    assert_eq!(err.code, ErrorCode::ModelLoadFailed);

    let path = temp_artifact_path();
    ArtifactStore::save(&trained_artifact(), &path).unwrap();

    let engines: Vec<Arc<RiskAssessmentEngine>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| ArtifactStore::shared_engine(&path).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(engines.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));

    // Loaded: the file is no longer read
    let _ = std::fs::remove_file(&path);
    let again = ArtifactStore::shared_engine(&path).unwrap();
    assert!(Arc::ptr_eq(&again, &engines[0]));

    let err = ArtifactStore::shared_engine(&missing).unwrap_err();
    assert_eq!(err.code, ErrorCode::ConfigInvalidValue);
}
