//! Core Module - Assessment Pipeline
//!
//! Feature engineering, scoring, attribution and business policy, wired
//! together by the orchestrator in `engine`.

pub mod engine;
pub mod explainer;
pub mod features;
pub mod forest;
pub mod policy;
pub mod risk_model;

pub use engine::*;
pub use explainer::*;
pub use features::*;
pub use forest::*;
pub use policy::*;
pub use risk_model::*;
