//! Historical application datasets
//!
//! Labeled applications are read from a JSON array or, for `.jsonl` files,
//! one JSON object per line. `generate_synthetic` produces a reproducible
//! book of loans for demos and tests.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::models::{
    AppError, AppResult, CreditApplication, EmploymentType, ErrorCode, LabeledApplication,
};
use crate::utils::constants::MIN_COLLATERAL_FOR_LTV;

/// Loan terms offered, in months
const TERMS: [i32; 8] = [6, 12, 18, 24, 36, 48, 60, 72];

fn is_json_lines(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("jsonl"))
        .unwrap_or(false)
}

/// Load labeled applications from `.json` (array) or `.jsonl`
pub fn load_labeled(path: impl AsRef<Path>) -> AppResult<Vec<LabeledApplication>> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|e| {
        AppError::with_source(
            ErrorCode::TrainingFailed,
            format!("Cannot read dataset {}", path.display()),
            e,
        )
    })?;

    let records = if is_json_lines(path) {
        raw.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str::<LabeledApplication>(line).map_err(|e| {
                    AppError::with_source(
                        ErrorCode::TrainingFailed,
                        format!("{}:{}: invalid record", path.display(), i + 1),
                        e,
                    )
                })
            })
            .collect::<AppResult<Vec<_>>>()?
    } else {
        serde_json::from_str::<Vec<LabeledApplication>>(&raw).map_err(|e| {
            AppError::with_source(
                ErrorCode::TrainingFailed,
                format!("{}: expected a JSON array of labeled applications", path.display()),
                e,
            )
        })?
    };

    info!(path = %path.display(), records = records.len(), "Dataset loaded");
    Ok(records)
}

/// Write labeled applications in the format implied by the extension
pub fn save_labeled(records: &[LabeledApplication], path: impl AsRef<Path>) -> AppResult<()> {
    let path = path.as_ref();
    let write_err = |e: std::io::Error| {
        AppError::with_source(
            ErrorCode::ArtifactWriteFailed,
            format!("Cannot write dataset {}", path.display()),
            e,
        )
    };
    let encode_err = |e: serde_json::Error| {
        AppError::with_source(
            ErrorCode::ArtifactWriteFailed,
            format!("Cannot serialize dataset {}", path.display()),
            e,
        )
    };

    let body = if is_json_lines(path) {
        let mut out = String::new();
        for record in records {
            out.push_str(&serde_json::to_string(record).map_err(encode_err)?);
            out.push('\n');
        }
        out
    } else {
        serde_json::to_string_pretty(records).map_err(encode_err)?
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    fs::write(path, body).map_err(write_err)?;

    info!(path = %path.display(), records = records.len(), "Dataset saved");
    Ok(())
}

/// Reproducible synthetic loan book.
///
/// Outcomes follow a logistic ground truth driven by debt burden,
/// collateral coverage, employment and age, so a trained model has real
/// signal to find.
pub fn generate_synthetic(count: usize, seed: u64) -> Vec<LabeledApplication> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count).map(|_| synthetic_record(&mut rng)).collect()
}

fn synthetic_record(rng: &mut StdRng) -> LabeledApplication {
    let employment = match rng.gen_range(0..100) {
        0..=7 => EmploymentType::Unemployed,
        8..=24 => EmploymentType::PartTime,
        25..=89 => EmploymentType::FullTime,
        _ => EmploymentType::Executive,
    };
    let (income_lo, income_hi) = match employment {
        EmploymentType::Unemployed => (800.0, 1500.0),
        EmploymentType::PartTime => (1200.0, 3000.0),
        EmploymentType::FullTime => (2500.0, 7000.0),
        EmploymentType::Executive => (6000.0, 15000.0),
    };

    let age = rng.gen_range(19..=75);
    let income: f64 = rng.gen_range(income_lo..income_hi);
    let income = income.round();
    let loan_amount: f64 = rng.gen_range(1000.0..40000.0);
    let loan_amount = loan_amount.round();
    let loan_duration = TERMS[rng.gen_range(0..TERMS.len())];
    let existing_debt = (rng.gen_range(0.0..0.4) * income).round();
    let collateral_value = if rng.gen_bool(0.45) {
        (rng.gen_range(0.3..1.5) * loan_amount).round()
    } else {
        0.0
    };
    let is_existing_client = rng.gen_bool(0.3);

    let application = CreditApplication {
        age,
        employment_type: employment.as_str().to_string(),
        income,
        loan_amount,
        loan_duration,
        existing_debt,
        collateral_value,
        credit_score: Some(rng.gen_range(300..=850)),
        recent_inquiries: rng.gen_range(0..=6),
        is_existing_client,
        is_preferred_client: is_existing_client && rng.gen_bool(0.3),
    };

    let defaulted = rng.gen::<f64>() < ground_truth_probability(&application, employment);
    LabeledApplication {
        application,
        defaulted,
    }
}

fn ground_truth_probability(app: &CreditApplication, employment: EmploymentType) -> f64 {
    let monthly_payment = app.loan_amount / app.loan_duration as f64;
    let dti = (monthly_payment + app.existing_debt) / app.income;
    let pti = monthly_payment / app.income;
    let coverage = if app.collateral_value > 0.0 {
        (app.loan_amount / app.collateral_value.max(MIN_COLLATERAL_FOR_LTV)).min(3.0) - 1.0
    } else {
        1.5
    };

    let z = -1.6 + 2.5 * (dti - 0.4) + 0.8 * coverage + 4.0 * pti
        - 0.45 * (employment.ordinal() as f64 - 1.5)
        - 0.02 * (app.age as f64 - 40.0);
    1.0 / (1.0 + (-z).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_path(ext: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("credit_dataset_{}.{}", Uuid::new_v4(), ext))
    }

    #[test]
    fn test_synthetic_is_reproducible_and_valid() {
        let a = generate_synthetic(200, 7);
        let b = generate_synthetic(200, 7);
        assert_eq!(a, b);
        assert_ne!(a, generate_synthetic(200, 8));

        for record in &a {
            record.application.validate().unwrap();
            assert!(EmploymentType::parse(&record.application.employment_type).is_some());
        }
    }

    #[test]
    fn test_synthetic_has_both_outcomes() {
        let records = generate_synthetic(500, 42);
        let defaults = records.iter().filter(|r| r.defaulted).count();
        assert!(defaults > 0 && defaults < records.len());
    }

    #[test]
    fn test_json_and_jsonl_round_trip() {
        let records = generate_synthetic(20, 1);
        for ext in ["json", "jsonl"] {
            let path = temp_path(ext);
            save_labeled(&records, &path).unwrap();
            let loaded = load_labeled(&path).unwrap();
            let _ = fs::remove_file(&path);
            assert_eq!(loaded, records);
        }
    }

    #[test]
    fn test_jsonl_skips_blank_lines_and_defaults_optional_fields() {
        let path = temp_path("jsonl");
        fs::write(
            &path,
            "{\"age\":30,\"employment_type\":\"full-time\",\"income\":3000,\"loan_amount\":5000,\"loan_duration\":12,\"defaulted\":false}\n\n",
        )
        .unwrap();
        let loaded = load_labeled(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].application.collateral_value, 0.0);
        assert!(!loaded[0].application.is_existing_client);
    }

    #[test]
    fn test_malformed_dataset_reports_training_error() {
        let path = temp_path("json");
        fs::write(&path, "{not json").unwrap();
        let err = load_labeled(&path).unwrap_err();
        let _ = fs::remove_file(&path);
        assert_eq!(err.code, ErrorCode::TrainingFailed);

        let err = load_labeled(temp_path("json")).unwrap_err();
        assert_eq!(err.code, ErrorCode::TrainingFailed);
    }

    #[test]
    fn test_unwritable_dataset_reports_write_error() {
        // Parent "directory" is a regular file
        let blocker = temp_path("json");
        fs::write(&blocker, "x").unwrap();
        let err = save_labeled(&generate_synthetic(3, 1), blocker.join("book.jsonl")).unwrap_err();
        let _ = fs::remove_file(&blocker);

        assert_eq!(err.code, ErrorCode::ArtifactWriteFailed);
        assert!(err.message.contains("book.jsonl"));
    }
}
