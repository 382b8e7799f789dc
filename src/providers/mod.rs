//! Providers Module - Model Artifacts & Datasets
//!
//! Everything that touches the filesystem: trained model artifacts and
//! historical labeled applications.

pub mod artifact;
pub mod dataset;

pub use artifact::*;
pub use dataset::*;
