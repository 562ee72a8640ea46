//! Mean operator: `sum × (1/count)`, rescaled and pinned.

use super::evaluator::Evaluator;
use crate::domain::{AggregationError, ScaledCiphertext};
use crate::ports::CkksEngine;

/// Divide an encrypted sum by a public count. Consumes one level.
///
/// # Errors
/// `DivisionByZero` when `count` is 0, `LevelExhausted` when `sum` is at level 0.
pub fn mean<E: CkksEngine>(
    evaluator: &Evaluator<E>,
    sum: &ScaledCiphertext,
    count: usize,
) -> Result<ScaledCiphertext, AggregationError> {
    if count == 0 {
        return Err(AggregationError::DivisionByZero);
    }
    evaluator.tracker().check_rescalable(sum)?;

    let reciprocal = evaluator.encode_constant(1.0 / count as f64, sum.level())?;
    let out = evaluator.multiply_plain_rescale(sum, &reciprocal)?;

    tracing::debug!(count, level = out.level(), "Applied mean operator");
    Ok(out)
}
