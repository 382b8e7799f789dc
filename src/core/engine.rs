//! Assessment orchestrator
//! FeatureEngineer -> RiskModel -> Explainer -> PolicyEngine

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::explainer::{Explainer, ShapleyExplainer};
use super::features::FeatureEngineer;
use super::policy::{PolicyEngine, PolicyInputs};
use super::risk_model::RiskModel;
use crate::models::{
    AppError, AppResult, CreditApplication, KeyFactor, RiskAssessmentResult, FEATURE_COUNT,
};
use crate::providers::artifact::ModelArtifact;

/// Static description of the loaded model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub scorer: String,
    pub background_size: usize,
    /// Mean model output over the background set
    pub baseline_probability: f64,
    pub scaler_samples: usize,
}

/// Stateless per call; every component is read-only once built
pub struct RiskAssessmentEngine {
    features: FeatureEngineer,
    model: Arc<dyn RiskModel>,
    explainer: Arc<dyn Explainer>,
    policy: PolicyEngine,
    info: ModelInfo,
}

impl std::fmt::Debug for RiskAssessmentEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskAssessmentEngine")
            .field("features", &self.features)
            .field("policy", &self.policy)
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl RiskAssessmentEngine {
    pub fn new(
        features: FeatureEngineer,
        model: Arc<dyn RiskModel>,
        explainer: Arc<dyn Explainer>,
    ) -> Self {
        let info = ModelInfo {
            scorer: model.name().to_string(),
            background_size: explainer.background_size(),
            baseline_probability: explainer.baseline(model.as_ref()),
            scaler_samples: features.stats().n_samples,
        };

        Self {
            features,
            model,
            explainer,
            policy: PolicyEngine::new(),
            info,
        }
    }

    /// Build from a validated artifact
    pub fn from_artifact(artifact: &ModelArtifact) -> AppResult<Self> {
        artifact.validate()?;

        let features = FeatureEngineer::new(Arc::new(artifact.scaler.clone()));
        let explainer = ShapleyExplainer::new(&artifact.background)?;
        Ok(Self::new(features, artifact.scorer.to_model(), Arc::new(explainer)))
    }

    /// Assess one application. Either a complete result or an error.
    pub fn assess(&self, application: &CreditApplication) -> AppResult<RiskAssessmentResult> {
        let features = self.features.transform(application)?;

        let probability = self.model.predict(&features);
        if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
            return Err(AppError::assessment_failed(format!(
                "{} returned invalid probability {}",
                self.model.name(),
                probability
            )));
        }

        let key_factors = self.explainer.explain(&features, self.model.as_ref());
        check_factors(&key_factors)?;

        let decision = self.policy.decide(
            probability,
            &PolicyInputs {
                loan_amount: application.loan_amount,
                collateral_value: application.collateral_value,
                is_existing_client: application.is_existing_client,
            },
        )?;

        debug!(
            probability,
            category = %decision.category,
            recommendation = %decision.recommendation,
            "Application assessed"
        );

        Ok(RiskAssessmentResult {
            risk_score: decision.risk_score,
            risk_category: decision.category,
            expected_profit: decision.expected_profit,
            recommendation: decision.recommendation.to_string(),
            pricing_adjustment: decision.pricing.to_string(),
            key_factors,
        })
    }

    /// One result per application, in input order
    pub fn assess_batch(
        &self,
        applications: &[CreditApplication],
    ) -> Vec<AppResult<RiskAssessmentResult>> {
        applications.par_iter().map(|app| self.assess(app)).collect()
    }

    pub fn model_info(&self) -> &ModelInfo {
        &self.info
    }

    pub fn policy(&self) -> &PolicyEngine {
        &self.policy
    }
}

fn check_factors(factors: &[KeyFactor]) -> AppResult<()> {
    if factors.len() != FEATURE_COUNT {
        return Err(AppError::assessment_failed(format!(
            "Explainer returned {} factors, expected {}",
            factors.len(),
            FEATURE_COUNT
        )));
    }
    if let Some(bad) = factors.iter().find(|f| !f.impact.is_finite()) {
        return Err(AppError::assessment_failed(format!(
            "Non-finite impact for {}",
            bad.feature
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::{ScalerStats, SCALED_FEATURE_COUNT};
    use crate::core::risk_model::LogisticScorer;
    use crate::models::{ErrorCode, FeatureVector, RiskCategory};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn identity_engineer() -> FeatureEngineer {
        FeatureEngineer::new(Arc::new(ScalerStats {
            mean: [0.0; SCALED_FEATURE_COUNT],
            scale: [1.0; SCALED_FEATURE_COUNT],
            n_samples: 3,
        }))
    }

    fn explainer() -> Arc<dyn Explainer> {
        Arc::new(
            ShapleyExplainer::new(&[
                FeatureVector::from_array([30.0, 2.0, 5000.0, 24.0, 0.2, 1.0, 0.05]),
                FeatureVector::from_array([45.0, 3.0, 20000.0, 48.0, 0.4, 2.0, 0.1]),
            ])
            .unwrap(),
        )
    }

    fn application() -> CreditApplication {
        CreditApplication {
            age: 35,
            employment_type: "full-time".to_string(),
            income: 5000.0,
            loan_amount: 10000.0,
            loan_duration: 24,
            existing_debt: 300.0,
            collateral_value: 0.0,
            credit_score: Some(700),
            recent_inquiries: 1,
            is_existing_client: false,
            is_preferred_client: false,
        }
    }

    /// Always returns the same probability, counting calls
    struct FixedModel {
        probability: f64,
        calls: AtomicUsize,
    }

    impl FixedModel {
        fn new(probability: f64) -> Self {
            Self {
                probability,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl RiskModel for FixedModel {
        fn predict(&self, _features: &FeatureVector) -> f64 {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.probability
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct ShortExplainer;

    impl Explainer for ShortExplainer {
        fn explain(&self, _features: &FeatureVector, _model: &dyn RiskModel) -> Vec<KeyFactor> {
            vec![KeyFactor {
                feature: "age".to_string(),
                impact: 0.1,
            }]
        }

        fn baseline(&self, _model: &dyn RiskModel) -> f64 {
            0.0
        }

        fn background_size(&self) -> usize {
            0
        }
    }

    fn logistic_engine() -> RiskAssessmentEngine {
        let model = LogisticScorer::new(-2.0, [0.0, -0.2, 0.0, 0.0, 3.0, 0.0, 2.0]);
        RiskAssessmentEngine::new(identity_engineer(), Arc::new(model), explainer())
    }

    #[test]
    fn test_assess_produces_complete_result() {
        let engine = logistic_engine();
        let result = engine.assess(&application()).unwrap();

        assert!((0.0..=100.0).contains(&result.risk_score));
        assert_eq!(result.key_factors.len(), FEATURE_COUNT);
        assert_eq!(result.key_factors[0].feature, "age");
        assert_eq!(result.key_factors[6].feature, "payment_to_income");

        let p = engine_probability(&engine);
        assert_eq!(result.risk_category, RiskCategory::from_probability(p));
        assert_eq!(result.risk_score, engine.policy().risk_score(p));
    }

    fn engine_probability(engine: &RiskAssessmentEngine) -> f64 {
        let features = engine.features.transform(&application()).unwrap();
        engine.model.predict(&features)
    }

    #[test]
    fn test_impacts_sum_to_prediction_minus_baseline() {
        let engine = logistic_engine();
        let result = engine.assess(&application()).unwrap();
        let sum: f64 = result.key_factors.iter().map(|f| f.impact).sum();
        let expected = engine_probability(&engine) - engine.model_info().baseline_probability;
        assert!((sum - expected).abs() < 1e-9);
    }

    #[test]
    fn test_zero_duration_never_reaches_model() {
        let model = Arc::new(FixedModel::new(0.2));
        let engine = RiskAssessmentEngine::new(identity_engineer(), model.clone(), explainer());
        let calls_after_setup = model.calls.load(Ordering::SeqCst);

        let mut app = application();
        app.loan_duration = 0;
        let err = engine.assess(&app).unwrap_err();

        assert_eq!(err.code, ErrorCode::InvalidInput);
        assert_eq!(model.calls.load(Ordering::SeqCst), calls_after_setup);
    }

    #[test]
    fn test_unrecognized_employment_proceeds() {
        let engine = logistic_engine();
        let mut app = application();
        app.employment_type = "Intern".to_string();
        let intern = engine.assess(&app).unwrap();

        app.employment_type = "Full-time".to_string();
        let full_time = engine.assess(&app).unwrap();

        assert_eq!(intern, full_time);
    }

    #[test]
    fn test_policy_applied_to_fixed_probability() {
        let engine = RiskAssessmentEngine::new(
            identity_engineer(),
            Arc::new(FixedModel::new(0.15)),
            explainer(),
        );
        let result = engine.assess(&application()).unwrap();

        assert_eq!(result.risk_category, RiskCategory::Low);
        assert_eq!(result.risk_score, 15.0);
        assert!((result.expected_profit - (-475.0)).abs() < 1e-6);
        assert_eq!(result.recommendation, "Approve");
        assert_eq!(result.pricing_adjustment, "Standard rate");
        // Constant model: nothing to attribute
        assert!(result.key_factors.iter().all(|f| f.impact.abs() < 1e-12));
    }

    #[test]
    fn test_out_of_range_probability_fails() {
        for p in [1.5, -0.1, f64::NAN] {
            let engine = RiskAssessmentEngine::new(
                identity_engineer(),
                Arc::new(FixedModel::new(p)),
                explainer(),
            );
            let err = engine.assess(&application()).unwrap_err();
            assert_eq!(err.code, ErrorCode::AssessmentFailed);
        }
    }

    #[test]
    fn test_short_attribution_fails() {
        let engine = RiskAssessmentEngine::new(
            identity_engineer(),
            Arc::new(FixedModel::new(0.4)),
            Arc::new(ShortExplainer),
        );
        let err = engine.assess(&application()).unwrap_err();
        assert_eq!(err.code, ErrorCode::AssessmentFailed);
    }

    #[test]
    fn test_batch_preserves_order() {
        let engine = logistic_engine();
        let mut bad = application();
        bad.income = 0.0;
        let mut secured = application();
        secured.collateral_value = 8000.0;

        let apps = vec![application(), bad, secured.clone()];
        let results = engine.assess_batch(&apps);

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap(), &engine.assess(&apps[0]).unwrap());
        assert_eq!(
            results[1].as_ref().unwrap_err().code,
            ErrorCode::InvalidInput
        );
        assert_eq!(results[2].as_ref().unwrap(), &engine.assess(&secured).unwrap());
    }

    #[test]
    fn test_model_info() {
        let engine = logistic_engine();
        let info = engine.model_info();
        assert_eq!(info.scorer, "logistic");
        assert_eq!(info.background_size, 2);
        assert_eq!(info.scaler_samples, 3);
        assert!((0.0..=1.0).contains(&info.baseline_probability));
    }
}
