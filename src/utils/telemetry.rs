//! Assessment telemetry
//!
//! In-process counters for the serving path: volume, outcomes by category,
//! latency and booked expected profit. No application data is retained.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::models::{AppError, RiskAssessmentResult, RiskCategory};

/// Snapshot returned by [`AssessmentTelemetry::get_stats`]
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TelemetryStats {
    /// Applications scored successfully
    pub total_assessed: u64,
    /// Rejected for invalid input
    pub total_rejected: u64,
    /// Internal failures (model / attribution)
    pub total_failed: u64,
    pub by_category: HashMap<String, u64>,
    pub avg_latency_ms: f64,
    /// Sum of expected profit over assessed applications
    pub total_expected_profit: f64,
    pub session_start: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
}

/// Thread-safe collector shared by all request handlers
pub struct AssessmentTelemetry {
    total_assessed: AtomicU64,
    total_rejected: AtomicU64,
    total_failed: AtomicU64,
    total_latency_us: AtomicU64,
    total_profit: RwLock<f64>,
    category_counts: RwLock<HashMap<RiskCategory, u64>>,
    session_start: DateTime<Utc>,
}

impl AssessmentTelemetry {
    pub fn new() -> Self {
        Self {
            total_assessed: AtomicU64::new(0),
            total_rejected: AtomicU64::new(0),
            total_failed: AtomicU64::new(0),
            total_latency_us: AtomicU64::new(0),
            total_profit: RwLock::new(0.0),
            category_counts: RwLock::new(HashMap::new()),
            session_start: Utc::now(),
        }
    }

    /// Record a completed assessment
    pub fn record_assessment(&self, result: &RiskAssessmentResult, latency_us: u64) {
        self.total_assessed.fetch_add(1, Ordering::Relaxed);
        self.total_latency_us.fetch_add(latency_us, Ordering::Relaxed);

        if let Ok(mut profit) = self.total_profit.write() {
            *profit += result.expected_profit;
        }
        if let Ok(mut counts) = self.category_counts.write() {
            *counts.entry(result.risk_category).or_insert(0) += 1;
        }
    }

    /// Record a failed assessment, split by cause
    pub fn record_error(&self, error: &AppError) {
        if error.is_client_error() {
            self.total_rejected.fetch_add(1, Ordering::Relaxed);
        } else {
            self.total_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn get_stats(&self) -> TelemetryStats {
        let total_assessed = self.total_assessed.load(Ordering::Relaxed);
        let total_latency_us = self.total_latency_us.load(Ordering::Relaxed);

        let avg_latency_ms = if total_assessed > 0 {
            total_latency_us as f64 / total_assessed as f64 / 1000.0
        } else {
            0.0
        };

        // Every category is reported, zero or not
        let by_category = self
            .category_counts
            .read()
            .map(|counts| {
                RiskCategory::ALL
                    .iter()
                    .map(|c| (c.as_str().to_string(), counts.get(c).copied().unwrap_or(0)))
                    .collect()
            })
            .unwrap_or_default();

        TelemetryStats {
            total_assessed,
            total_rejected: self.total_rejected.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
            by_category,
            avg_latency_ms,
            total_expected_profit: self.total_profit.read().map(|p| *p).unwrap_or(0.0),
            session_start: self.session_start,
            generated_at: Utc::now(),
        }
    }

    /// Reset counters (new reporting period)
    pub fn reset(&self) {
        self.total_assessed.store(0, Ordering::Relaxed);
        self.total_rejected.store(0, Ordering::Relaxed);
        self.total_failed.store(0, Ordering::Relaxed);
        self.total_latency_us.store(0, Ordering::Relaxed);

        if let Ok(mut profit) = self.total_profit.write() {
            *profit = 0.0;
        }
        if let Ok(mut counts) = self.category_counts.write() {
            counts.clear();
        }
    }
}

impl Default for AssessmentTelemetry {
    fn default() -> Self {
        Self::new()
    }
}
