//! Encrypted accumulator: Folds encrypted terms into one encrypted sum.
//!
//! The sequential fold encrypts and adds one element at a time in input
//! order. The tree fold encrypts in parallel and combines partial sums
//! pairwise with rayon; every merge goes through `Evaluator::add`, so the
//! scale/level checks run at each merge point.

use rayon::prelude::*;

use super::evaluator::Evaluator;
use crate::domain::{AggregationError, ScaledCiphertext};
use crate::ports::CkksEngine;

/// How the terms of one statistic are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FoldStrategy {
    /// Strict left-to-right fold, reproducible term order.
    #[default]
    Sequential,
    /// Parallel encryption with a pairwise reduction of partial sums.
    Tree,
}

/// Encrypt `values` at `scale` and sum them in input order.
///
/// `scale` must be the evaluator's canonical scale: every later rescale pins
/// results back to it.
///
/// # Errors
/// `EmptyInput` for an empty sequence, `ScaleMismatch` for a foreign scale;
/// encryption or tracker failures otherwise.
pub fn accumulate<E: CkksEngine>(
    evaluator: &Evaluator<E>,
    values: &[f64],
    scale: f64,
) -> Result<ScaledCiphertext, AggregationError> {
    accumulate_with(evaluator, values, scale, FoldStrategy::Sequential)
}

/// Tree-reduction variant of [`accumulate`].
///
/// # Errors
/// Same as [`accumulate`].
pub fn accumulate_parallel<E: CkksEngine>(
    evaluator: &Evaluator<E>,
    values: &[f64],
    scale: f64,
) -> Result<ScaledCiphertext, AggregationError> {
    accumulate_with(evaluator, values, scale, FoldStrategy::Tree)
}

fn accumulate_with<E: CkksEngine>(
    evaluator: &Evaluator<E>,
    values: &[f64],
    scale: f64,
    strategy: FoldStrategy,
) -> Result<ScaledCiphertext, AggregationError> {
    evaluator
        .tracker()
        .check_scale(scale, evaluator.tracker().canonical_scale())?;
    fold_terms(evaluator, values.len(), strategy, |i| {
        evaluator.encrypt_at(values[i], scale)
    })
}

/// Produce `count` encrypted terms with `term` and add them up.
///
/// # Errors
/// `EmptyInput` when `count` is 0, or the first error raised by a term or a merge.
pub(crate) fn fold_terms<E, F>(
    evaluator: &Evaluator<E>,
    count: usize,
    strategy: FoldStrategy,
    term: F,
) -> Result<ScaledCiphertext, AggregationError>
where
    E: CkksEngine,
    F: Fn(usize) -> Result<ScaledCiphertext, AggregationError> + Sync + Send,
{
    if count == 0 {
        return Err(AggregationError::EmptyInput);
    }

    match strategy {
        FoldStrategy::Sequential => {
            let mut sum = term(0)?;
            for i in 1..count {
                let next = term(i)?;
                sum = evaluator.add(&sum, &next)?;
                tracing::trace!(index = i, "Folded term");
            }
            Ok(sum)
        }
        FoldStrategy::Tree => (0..count)
            .into_par_iter()
            .map(&term)
            .try_reduce_with(|left, right| evaluator.add(&left, &right))
            .unwrap_or(Err(AggregationError::EmptyInput)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::adapters::ckks_sim::SimulatedCkksEngine;
    use crate::application::Decryptor;
    use crate::domain::SchemeParameters;

    const SCALE: f64 = 1_099_511_627_776.0;

    fn setup() -> (Evaluator<SimulatedCkksEngine>, Decryptor<SimulatedCkksEngine>) {
        let engine = Arc::new(
            SimulatedCkksEngine::with_seed(SchemeParameters::default(), [2u8; 32])
                .expect("valid parameters"),
        );
        let (keys, secret) = engine.generate_keys().expect("keys");
        (
            Evaluator::new(Arc::clone(&engine), keys),
            Decryptor::new(engine, secret),
        )
    }

    #[test]
    fn test_accumulate_sums_values() {
        let (evaluator, decryptor) = setup();
        let sum = accumulate(&evaluator, &[20.0, 30.0, 40.0, 50.0], SCALE).expect("accumulate");

        assert_eq!(sum.level(), evaluator.top_level());
        let value = decryptor.decrypt_value(&sum).expect("decrypt");
        assert!((value.expose() - 140.0).abs() < 1e-6);
    }

    #[test]
    fn test_accumulate_single_value() {
        let (evaluator, decryptor) = setup();
        let sum = accumulate(&evaluator, &[-7.25], SCALE).expect("accumulate");
        let value = decryptor.decrypt_value(&sum).expect("decrypt");
        assert!((value.expose() + 7.25).abs() < 1e-6);
    }

    #[test]
    fn test_accumulate_empty_input() {
        let (evaluator, _) = setup();
        assert_eq!(
            accumulate(&evaluator, &[], SCALE).expect_err("empty"),
            AggregationError::EmptyInput
        );
        assert_eq!(
            accumulate_parallel(&evaluator, &[], SCALE).expect_err("empty"),
            AggregationError::EmptyInput
        );
    }

    #[test]
    fn test_tree_matches_sequential() {
        let (evaluator, decryptor) = setup();
        let values: Vec<f64> = (1..=257).map(|i| f64::from(i) * 0.5).collect();

        let sequential = accumulate(&evaluator, &values, SCALE).expect("sequential");
        let tree = accumulate_parallel(&evaluator, &values, SCALE).expect("tree");
        assert_eq!(tree.level(), sequential.level());
        assert_eq!(tree.scale(), sequential.scale());

        let a = decryptor.decrypt_value(&sequential).expect("decrypt");
        let b = decryptor.decrypt_value(&tree).expect("decrypt");
        let expected: f64 = values.iter().sum();
        assert!((a.expose() - expected).abs() < 1e-6);
        assert!((b.expose() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_accumulate_rejects_non_canonical_scale() {
        let (evaluator, _) = setup();
        assert_eq!(evaluator.tracker().canonical_scale(), SCALE);
        assert!(matches!(
            accumulate(&evaluator, &[1.0, 2.0], 2f64.powi(30)),
            Err(AggregationError::ScaleMismatch { .. })
        ));
        assert!(matches!(
            accumulate_parallel(&evaluator, &[1.0, 2.0], SCALE * SCALE),
            Err(AggregationError::ScaleMismatch { .. })
        ));
    }

    #[test]
    fn test_fold_stops_at_first_failing_term() {
        let (evaluator, _) = setup();
        let err = fold_terms(&evaluator, 3, FoldStrategy::Sequential, |i| {
            if i == 1 {
                Err(AggregationError::MissingField {
                    field: "age".into(),
                    record: i,
                })
            } else {
                evaluator.encrypt_value(1.0)
            }
        })
        .expect_err("term 1 fails");
        assert!(matches!(err, AggregationError::MissingField { record: 1, .. }));
    }
}
