//! Weighted-sum mean (e.g. a per-individual risk score).
//!
//! Per record every selected field is encrypted, multiplied by its public
//! weight, rescaled and pinned; the weighted terms are added into one
//! per-record score and the scores are averaged by the mean operator.

use super::accumulator::{fold_terms, FoldStrategy};
use super::evaluator::Evaluator;
use super::mean::mean;
use crate::domain::{AggregationError, ScaledCiphertext};
use crate::ports::CkksEngine;

pub const WEIGHTED_LEVELS: usize = 2;

/// `mean_i(Σ_j weights[j] * columns[j][i])`.
///
/// # Errors
/// `LengthMismatch` when weights and columns or column lengths disagree,
/// `EmptyInput` without columns or records, `LevelExhausted` below two levels.
pub fn weighted_mean<E: CkksEngine>(
    evaluator: &Evaluator<E>,
    columns: &[Vec<f64>],
    weights: &[f64],
    strategy: FoldStrategy,
) -> Result<ScaledCiphertext, AggregationError> {
    if columns.len() != weights.len() {
        return Err(AggregationError::LengthMismatch {
            left: columns.len(),
            right: weights.len(),
        });
    }
    let count = columns.first().map(Vec::len).ok_or(AggregationError::EmptyInput)?;
    if let Some(column) = columns.iter().find(|c| c.len() != count) {
        return Err(AggregationError::LengthMismatch {
            left: count,
            right: column.len(),
        });
    }

    let level = evaluator.top_level();
    evaluator.tracker().ensure_headroom(level, WEIGHTED_LEVELS)?;

    let encoded_weights = weights
        .iter()
        .map(|&w| evaluator.encode_constant(w, level))
        .collect::<Result<Vec<_>, _>>()?;

    let sum = fold_terms(evaluator, count, strategy, |i| {
        let mut score: Option<ScaledCiphertext> = None;
        for (column, weight) in columns.iter().zip(&encoded_weights) {
            let term = evaluator.multiply_plain_rescale(&evaluator.encrypt_value(column[i])?, weight)?;
            score = Some(match score {
                Some(acc) => evaluator.add(&acc, &term)?,
                None => term,
            });
        }
        score.ok_or(AggregationError::EmptyInput)
    })?;

    mean(evaluator, &sum, count)
}
