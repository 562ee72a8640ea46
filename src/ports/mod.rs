//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, the homomorphic engine sits behind a
//! trait so the aggregation pipeline never depends on a concrete scheme.

mod ckks_engine;

pub use ckks_engine::CkksEngine;
