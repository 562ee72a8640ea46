//! Application layer: Use cases and services.
//!
//! This module orchestrates the domain types and the engine port into the
//! aggregation operators and the pipeline that drives them.

pub mod accumulator;
mod config;
mod decryptor;
mod evaluator;
pub mod mean;
pub mod moment;
mod pipeline;
pub mod weighted;

pub use accumulator::FoldStrategy;
pub use config::PipelineConfig;
pub use decryptor::Decryptor;
pub use evaluator::Evaluator;
pub use pipeline::AggregationPipeline;
