//! Pairwise moment operator: `mean((a_i - mean_a) * (b_i - mean_b))`.
//!
//! Variance is the self-moment (`a == b`), covariance the cross-moment.
//! Each term costs one ciphertext product (relinearized, rescaled, pinned)
//! and the final mean costs one more level, so two levels of headroom are
//! checked up front.

use super::accumulator::{fold_terms, FoldStrategy};
use super::evaluator::Evaluator;
use super::mean::mean;
use crate::domain::{AggregationError, ScaledCiphertext, Sensitive};
use crate::ports::CkksEngine;

/// Levels consumed by a moment: one product per term plus the final mean.
pub const MOMENT_LEVELS: usize = 2;

/// Encrypted central cross-moment of two equally long series.
///
/// The means are decrypted intermediates and stay wrapped in `Sensitive`.
///
/// # Errors
/// `LengthMismatch`, `EmptyInput`, or `LevelExhausted` when fewer than two
/// levels remain.
pub fn moment<E: CkksEngine>(
    evaluator: &Evaluator<E>,
    series_a: &[f64],
    series_b: &[f64],
    mean_a: &Sensitive<f64>,
    mean_b: &Sensitive<f64>,
    strategy: FoldStrategy,
) -> Result<ScaledCiphertext, AggregationError> {
    if series_a.len() != series_b.len() {
        return Err(AggregationError::LengthMismatch {
            left: series_a.len(),
            right: series_b.len(),
        });
    }
    if series_a.is_empty() {
        return Err(AggregationError::EmptyInput);
    }

    let level = evaluator.top_level();
    evaluator.tracker().ensure_headroom(level, MOMENT_LEVELS)?;

    let center_a = evaluator.encode_sensitive(mean_a, level)?;
    let center_b = evaluator.encode_sensitive(mean_b, level)?;

    let sum = fold_terms(evaluator, series_a.len(), strategy, |i| {
        let dev_a = evaluator.sub_plain(&evaluator.encrypt_value(series_a[i])?, &center_a)?;
        let dev_b = evaluator.sub_plain(&evaluator.encrypt_value(series_b[i])?, &center_b)?;
        evaluator.multiply_rescale(&dev_a, &dev_b)
    })?;
    tracing::debug!(terms = series_a.len(), level = sum.level(), "Accumulated deviation products");

    mean(evaluator, &sum, series_a.len())
}

/// Population variance of `values` around a known mean.
///
/// # Errors
/// Same as [`moment`].
pub fn variance<E: CkksEngine>(
    evaluator: &Evaluator<E>,
    values: &[f64],
    mean_value: &Sensitive<f64>,
    strategy: FoldStrategy,
) -> Result<ScaledCiphertext, AggregationError> {
    moment(evaluator, values, values, mean_value, mean_value, strategy)
}
