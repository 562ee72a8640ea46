//! Aggregation pipeline: Runs a list of statistic requests over a record set.
//!
//! Each statistic is computed independently: a failure is reported against
//! its label and the remaining statistics still run. Only the final scalar
//! of each statistic is decrypted (variance and covariance additionally
//! decrypt the means they center on).

use std::sync::Arc;

use rayon::prelude::*;

use super::accumulator::{accumulate, accumulate_parallel, FoldStrategy};
use super::decryptor::Decryptor;
use super::evaluator::Evaluator;
use super::mean::mean;
use super::moment::moment;
use super::weighted::weighted_mean;
use crate::domain::{
    AggregationError, AggregationResult, RecordSet, ScaledCiphertext, Sensitive,
    StatisticFailure, StatisticKind, StatisticOutcome, StatisticSpec,
};
use crate::ports::CkksEngine;

/// Orchestrates accumulate → mean (→ moment) per statistic.
pub struct AggregationPipeline<E: CkksEngine> {
    evaluator: Evaluator<E>,
    decryptor: Decryptor<E>,
    strategy: FoldStrategy,
}

impl<E: CkksEngine> AggregationPipeline<E> {
    /// Generate a fresh key set and split it between evaluator and decryptor.
    ///
    /// # Errors
    /// Key generation failure.
    pub fn new(engine: Arc<E>, strategy: FoldStrategy) -> Result<Self, AggregationError> {
        let (keys, secret) = engine.generate_keys()?;
        let decryptor = Decryptor::new(Arc::clone(&engine), secret);
        tracing::debug!(key_set = decryptor.key_set(), ?strategy, "Pipeline ready");
        Ok(Self {
            evaluator: Evaluator::new(engine, keys),
            decryptor,
            strategy,
        })
    }

    /// Compute every statistic. Outcomes are returned in request order.
    ///
    /// With the tree strategy the statistics themselves also run concurrently.
    pub fn run(&self, records: &RecordSet, specs: &[StatisticSpec]) -> Vec<StatisticOutcome> {
        tracing::info!(
            "Running {} statistic(s) over {} record(s)",
            specs.len(),
            records.len()
        );

        match self.strategy {
            FoldStrategy::Sequential => specs.iter().map(|s| self.run_one(records, s)).collect(),
            FoldStrategy::Tree => specs.par_iter().map(|s| self.run_one(records, s)).collect(),
        }
    }

    /// Compute one statistic, converting any error into a labelled failure.
    pub fn run_one(&self, records: &RecordSet, spec: &StatisticSpec) -> StatisticOutcome {
        tracing::info!("Computing '{}' ({})", spec.label, spec.kind.name());

        match self.compute(records, spec) {
            Ok(value) => {
                tracing::info!("Finished '{}'", spec.label);
                Ok(AggregationResult::new(&spec.label, &spec.kind, value))
            }
            Err(error) => {
                tracing::warn!("Statistic '{}' failed: {}", spec.label, error);
                Err(StatisticFailure {
                    label: spec.label.clone(),
                    error,
                })
            }
        }
    }

    fn compute(&self, records: &RecordSet, spec: &StatisticSpec) -> Result<f64, AggregationError> {
        spec.validate()?;
        self.evaluator
            .tracker()
            .ensure_headroom(self.evaluator.top_level(), spec.kind.required_levels())?;

        let ct = match &spec.kind {
            StatisticKind::Sum => self.sum(&records.extract(&spec.fields[0])?)?,
            StatisticKind::Mean => self.mean_of(&records.extract(&spec.fields[0])?)?,
            StatisticKind::Variance => {
                let values = records.extract(&spec.fields[0])?;
                let center = self.decrypted_mean(&values)?;
                moment(&self.evaluator, &values, &values, &center, &center, self.strategy)?
            }
            StatisticKind::Covariance => {
                let a = records.extract(&spec.fields[0])?;
                let b = records.extract(&spec.fields[1])?;
                let center_a = self.decrypted_mean(&a)?;
                let center_b = self.decrypted_mean(&b)?;
                moment(&self.evaluator, &a, &b, &center_a, &center_b, self.strategy)?
            }
            StatisticKind::WeightedMean { weights } => {
                let columns = spec
                    .fields
                    .iter()
                    .map(|f| records.extract(f))
                    .collect::<Result<Vec<_>, _>>()?;
                weighted_mean(&self.evaluator, &columns, weights, self.strategy)?
            }
        };

        tracing::debug!(
            label = %spec.label,
            levels_left = ct.level(),
            "Decrypting final result"
        );
        let value = self.decryptor.decrypt_value(&ct)?;
        Ok(spec.post_scale.apply(value.into_inner()))
    }

    fn sum(&self, values: &[f64]) -> Result<ScaledCiphertext, AggregationError> {
        let scale = self.evaluator.tracker().canonical_scale();
        match self.strategy {
            FoldStrategy::Sequential => accumulate(&self.evaluator, values, scale),
            FoldStrategy::Tree => accumulate_parallel(&self.evaluator, values, scale),
        }
    }

    fn mean_of(&self, values: &[f64]) -> Result<ScaledCiphertext, AggregationError> {
        let sum = self.sum(values)?;
        mean(&self.evaluator, &sum, values.len())
    }

    /// Encrypted mean, decrypted to center a moment.
    fn decrypted_mean(&self, values: &[f64]) -> Result<Sensitive<f64>, AggregationError> {
        let ct = self.mean_of(values)?;
        self.decryptor.decrypt_value(&ct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ckks_sim::SimulatedCkksEngine;
    use crate::domain::{PostScale, Record, SchemeParameters};

    fn pipeline(strategy: FoldStrategy) -> AggregationPipeline<SimulatedCkksEngine> {
        let engine = SimulatedCkksEngine::with_seed(SchemeParameters::default(), [9u8; 32])
            .expect("valid parameters");
        AggregationPipeline::new(Arc::new(engine), strategy).expect("keys")
    }

    fn population() -> RecordSet {
        let rows = [
            (20.0, 1.0, 180.0, 120.0),
            (30.0, 0.0, 200.0, 130.0),
            (40.0, 0.0, 220.0, 110.0),
            (50.0, 1.0, 260.0, 140.0),
            (35.0, 0.0, 190.0, 125.0),
        ];
        rows.iter()
            .map(|&(age, disease, chol, sys)| {
                Record::new()
                    .with_field("age", age)
                    .with_field("disease_indicator", disease)
                    .with_field("cholesterol", chol)
                    .with_field("blood_pressure.systolic", sys)
            })
            .collect::<Vec<_>>()
            .into()
    }

    fn value(outcome: &StatisticOutcome) -> f64 {
        outcome.as_ref().expect("statistic succeeded").value
    }

    #[test]
    fn test_mean_of_ages() {
        let records: RecordSet = [20.0, 30.0, 40.0, 50.0]
            .iter()
            .map(|&a| Record::new().with_field("age", a))
            .collect::<Vec<_>>()
            .into();
        let out = pipeline(FoldStrategy::Sequential)
            .run(&records, &[StatisticSpec::mean("Average Age", "age")]);

        assert_eq!(out.len(), 1);
        assert!((value(&out[0]) - 35.0).abs() < 1e-4);
        assert_eq!(out[0].as_ref().expect("ok").label, "Average Age");
    }

    #[test]
    fn test_prevalence_percent() {
        let records: RecordSet = [1.0, 0.0, 0.0, 1.0, 0.0]
            .iter()
            .map(|&d| Record::new().with_field("disease_indicator", d))
            .collect::<Vec<_>>()
            .into();
        let out = pipeline(FoldStrategy::Sequential).run(
            &records,
            &[StatisticSpec::prevalence("Disease Prevalence (%)", "disease_indicator")],
        );
        assert!((value(&out[0]) - 40.0).abs() < 1e-2);
    }

    #[test]
    fn test_variance_end_to_end() {
        let records: RecordSet = [1.0, 2.0, 3.0]
            .iter()
            .map(|&v| Record::new().with_field("x", v))
            .collect::<Vec<_>>()
            .into();
        let out = pipeline(FoldStrategy::Sequential)
            .run(&records, &[StatisticSpec::variance("Variance of x", "x")]);
        assert!((value(&out[0]) - 0.667).abs() < 1e-3);
    }

    #[test]
    fn test_sum_and_custom_post_scale() {
        let specs = [
            StatisticSpec::sum("Total age", "age"),
            StatisticSpec::mean("Mean age (months)", "age")
                .with_post_scale(PostScale::Factor(12.0)),
        ];
        let out = pipeline(FoldStrategy::Sequential).run(&population(), &specs);
        assert!((value(&out[0]) - 175.0).abs() < 1e-4);
        assert!((value(&out[1]) - 420.0).abs() < 1e-2);
    }

    #[test]
    fn test_missing_field_does_not_abort_others() {
        let specs = [
            StatisticSpec::mean("Average Age", "age"),
            StatisticSpec::mean("Average Heart Rate", "heart_rate"),
            StatisticSpec::prevalence("Disease Prevalence (%)", "disease_indicator"),
        ];
        let out = pipeline(FoldStrategy::Sequential).run(&population(), &specs);

        assert_eq!(out.len(), 3);
        assert!((value(&out[0]) - 35.0).abs() < 1e-4);
        let failure = out[1].as_ref().expect_err("no heart_rate field");
        assert_eq!(failure.label, "Average Heart Rate");
        assert_eq!(
            failure.error,
            AggregationError::MissingField {
                field: "heart_rate".into(),
                record: 0
            }
        );
        assert!((value(&out[2]) - 40.0).abs() < 1e-2);
    }

    #[test]
    fn test_invalid_spec_is_reported() {
        let mut bad = StatisticSpec::covariance("broken", "age", "cholesterol");
        bad.fields.pop();
        let out = pipeline(FoldStrategy::Sequential).run(&population(), &[bad]);
        assert!(matches!(
            out[0].as_ref().expect_err("arity"),
            StatisticFailure {
                error: AggregationError::InvalidSpec(_),
                ..
            }
        ));
    }

    #[test]
    fn test_empty_record_set() {
        let out = pipeline(FoldStrategy::Sequential).run(
            &RecordSet::new(Vec::new()),
            &[StatisticSpec::mean("Average Age", "age")],
        );
        assert_eq!(
            out[0].as_ref().expect_err("empty").error,
            AggregationError::EmptyInput
        );
    }

    #[test]
    fn test_parallel_run_preserves_order_and_values() {
        let specs = [
            StatisticSpec::mean("Average Age", "age"),
            StatisticSpec::mean("Average Cholesterol Level", "cholesterol"),
            StatisticSpec::variance("Variance of Age", "age"),
            StatisticSpec::covariance("Covariance", "age", "cholesterol"),
            StatisticSpec::weighted_mean(
                "Average Risk Score",
                &[
                    ("age", 0.3),
                    ("cholesterol", 0.4),
                    ("blood_pressure.systolic", 0.3),
                ],
            ),
        ];
        let records = population();
        let sequential = pipeline(FoldStrategy::Sequential).run(&records, &specs);
        let parallel = pipeline(FoldStrategy::Tree).run(&records, &specs);

        // Plaintext reference values.
        let expected = [35.0, 210.0, 100.0, 260.0, 132.0];
        for ((seq, par), (spec, want)) in sequential
            .iter()
            .zip(&parallel)
            .zip(specs.iter().zip(expected))
        {
            assert_eq!(par.as_ref().expect("ok").label, spec.label);
            assert!((value(seq) - want).abs() < 1e-3 * want, "{}", spec.label);
            assert!((value(par) - want).abs() < 1e-3 * want, "{}", spec.label);
        }
    }

    #[test]
    fn test_shallow_chain_reports_level_exhaustion_per_statistic() {
        let params = SchemeParameters {
            coeff_modulus_bits: vec![60, 40, 60],
            ..Default::default()
        };
        let engine = SimulatedCkksEngine::with_seed(params, [9u8; 32]).expect("valid");
        let pipeline =
            AggregationPipeline::new(Arc::new(engine), FoldStrategy::Sequential).expect("keys");

        let out = pipeline.run(
            &population(),
            &[
                StatisticSpec::variance("Variance of Age", "age"),
                StatisticSpec::mean("Average Age", "age"),
            ],
        );
        assert_eq!(
            out[0].as_ref().expect_err("needs two levels").error,
            AggregationError::LevelExhausted {
                available: 1,
                required: 2
            }
        );
        assert!((value(&out[1]) - 35.0).abs() < 1e-4);
    }
}
