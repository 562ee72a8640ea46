//! Adapters layer: Concrete implementations of ports.
//!
//! - `ckks_sim`: reference CKKS engine (numeric contract only, no confidentiality)
//! - `json`: record loading and synthetic population generation
//! - `report`: text and JSON rendering of statistic outcomes
//! - `sanitize`: PII filtering for logs

pub mod ckks_sim;
pub mod json;
pub mod report;
pub mod sanitize;

pub use json::LoadError;
