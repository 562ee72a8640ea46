//! # Cohortseal
//!
//! Population statistics over encrypted health records using an
//! approximate-arithmetic (CKKS-style) homomorphic pipeline.
//!
//! This crate provides:
//! - Encrypted sums, means, percentages, variances, covariances and weighted
//!   means over a record set, decrypting only the final scalar of each
//! - Explicit scale/level tracking for every ciphertext handle
//! - Independent failure per statistic
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core types (records, statistic requests, keys, scale tracker)
//! - `ports`: The `CkksEngine` trait
//! - `adapters`: Reference engine, JSON loading, log sanitization
//! - `application`: Evaluator, decryptor, operators and the pipeline driver

pub mod adapters;
pub mod application;
pub mod domain;
pub mod ports;

pub use application::{AggregationPipeline, FoldStrategy, PipelineConfig};
pub use domain::{AggregationError, AggregationResult, StatisticSpec};
