//! Utils Module - Shared Constants & Telemetry
//!
//! Single source of truth for policy/model constants, plus the in-process
//! assessment counters used by the API.

pub mod constants;
pub mod telemetry;

pub use constants::*;
pub use telemetry::*;
