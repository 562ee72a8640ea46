//! Domain layer: Core types of the aggregation pipeline.
//!
//! Pure Rust types with no engine dependency: records, statistic requests,
//! scheme parameters, key/ciphertext handles and the scale tracker.

mod crypto;
mod params;
mod record;
mod statistic;
mod tracker;

pub use crypto::{
    Ciphertext, CryptoError, EvaluationKey, KeySet, Plaintext, PublicKey, SecretKey, Sensitive,
};
pub use params::{SchemeParameters, SecurityLevel};
pub use record::{Record, RecordSet};
pub use statistic::{
    AggregationError, AggregationResult, PostScale, StatisticFailure, StatisticKind,
    StatisticOutcome, StatisticSpec,
};
pub use tracker::{PlaintextConstant, ScaleTracker, ScaledCiphertext};
