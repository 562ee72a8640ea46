//! Evaluator: Scale-tracked homomorphic operations on public key material.
//!
//! The evaluator never holds the secret key. It wraps every engine call with
//! the tracker's level/scale checks and pins the scale after each rescale.

use std::sync::Arc;

use crate::domain::{
    AggregationError, KeySet, PlaintextConstant, ScaleTracker, ScaledCiphertext, Sensitive,
};
use crate::ports::CkksEngine;

/// Encrypts inputs and evaluates operations under one key set.
pub struct Evaluator<E: CkksEngine> {
    engine: Arc<E>,
    keys: KeySet,
    tracker: ScaleTracker,
}

impl<E: CkksEngine> Evaluator<E> {
    #[must_use]
    pub fn new(engine: Arc<E>, keys: KeySet) -> Self {
        let tracker = ScaleTracker::new(engine.parameters().canonical_scale());
        Self {
            engine,
            keys,
            tracker,
        }
    }

    #[must_use]
    pub fn tracker(&self) -> &ScaleTracker {
        &self.tracker
    }

    #[must_use]
    pub fn top_level(&self) -> usize {
        self.engine.top_level()
    }

    /// Encrypt a scalar at the canonical scale and the top level.
    ///
    /// # Errors
    /// Propagates encoding/encryption failures.
    pub fn encrypt_value(&self, value: f64) -> Result<ScaledCiphertext, AggregationError> {
        self.encrypt_at(value, self.tracker.canonical_scale())
    }

    /// Encrypt a scalar at an explicit scale and the top level.
    ///
    /// # Errors
    /// Propagates encoding/encryption failures.
    pub fn encrypt_at(&self, value: f64, scale: f64) -> Result<ScaledCiphertext, AggregationError> {
        let level = self.engine.top_level();
        let plain = self.engine.encode(value, scale, level)?;
        let ct = self.engine.encrypt(&plain, &self.keys.public)?;
        Ok(ScaledCiphertext::new(ct, scale, level))
    }

    /// Encode a public constant at the canonical scale for `level`.
    ///
    /// # Errors
    /// Propagates encoding failures.
    pub fn encode_constant(
        &self,
        value: f64,
        level: usize,
    ) -> Result<PlaintextConstant, AggregationError> {
        let scale = self.tracker.canonical_scale();
        Ok(PlaintextConstant {
            plaintext: self.engine.encode(value, scale, level)?,
            scale,
            level,
            sensitive: false,
        })
    }

    /// Encode a value derived from decrypted data.
    ///
    /// # Errors
    /// Propagates encoding failures.
    pub fn encode_sensitive(
        &self,
        value: &Sensitive<f64>,
        level: usize,
    ) -> Result<PlaintextConstant, AggregationError> {
        let mut constant = self.encode_constant(*value.expose(), level)?;
        constant.sensitive = true;
        Ok(constant)
    }

    /// # Errors
    /// `LevelMismatch`/`ScaleMismatch` before touching the engine.
    pub fn add(
        &self,
        left: &ScaledCiphertext,
        right: &ScaledCiphertext,
    ) -> Result<ScaledCiphertext, AggregationError> {
        self.tracker.check_add(left, right)?;
        let ct = self.engine.add(left.ciphertext(), right.ciphertext())?;
        Ok(ScaledCiphertext::new(ct, left.scale(), left.level()))
    }

    /// # Errors
    /// `LevelMismatch`/`ScaleMismatch` before touching the engine.
    pub fn sub_plain(
        &self,
        ct: &ScaledCiphertext,
        plain: &PlaintextConstant,
    ) -> Result<ScaledCiphertext, AggregationError> {
        self.tracker.check_plain(ct, plain, true)?;
        let out = self.engine.sub_plain(ct.ciphertext(), &plain.plaintext)?;
        Ok(ScaledCiphertext::new(out, ct.scale(), ct.level()))
    }

    /// Multiply by a plaintext, rescale and pin the scale. Consumes one level.
    ///
    /// # Errors
    /// `LevelExhausted` at level 0, `LevelMismatch` for a misplaced constant.
    pub fn multiply_plain_rescale(
        &self,
        ct: &ScaledCiphertext,
        plain: &PlaintextConstant,
    ) -> Result<ScaledCiphertext, AggregationError> {
        self.tracker.check_rescalable(ct)?;
        self.tracker.check_plain(ct, plain, false)?;

        let product = self
            .engine
            .multiply_plain(ct.ciphertext(), &plain.plaintext)?;
        self.rescale_and_pin(product, ct.level())
    }

    /// Multiply two ciphertexts, relinearize, rescale and pin. Consumes one level.
    ///
    /// # Errors
    /// `LevelExhausted` at level 0, `LevelMismatch` for operands at different levels.
    pub fn multiply_rescale(
        &self,
        left: &ScaledCiphertext,
        right: &ScaledCiphertext,
    ) -> Result<ScaledCiphertext, AggregationError> {
        self.tracker.check_level(left.level(), right.level())?;
        self.tracker.check_rescalable(left)?;

        let product = self.engine.multiply(left.ciphertext(), right.ciphertext())?;
        let relin = self.engine.relinearize(&product, &self.keys.evaluation)?;
        self.rescale_and_pin(relin, left.level())
    }

    fn rescale_and_pin(
        &self,
        product: crate::domain::Ciphertext,
        from_level: usize,
    ) -> Result<ScaledCiphertext, AggregationError> {
        let rescaled = self.engine.rescale(&product)?;
        let pinned = self
            .engine
            .set_scale(&rescaled, self.tracker.canonical_scale())?;
        let handle = self.tracker.pin_rescaled(pinned, from_level)?;
        self.verify(&handle)?;
        Ok(handle)
    }

    /// Cross-check a handle's tracked level and scale against the engine's
    /// own view of the ciphertext.
    ///
    /// # Errors
    /// `LevelMismatch`/`ScaleMismatch` (tracked value first) when they disagree.
    pub fn verify(&self, handle: &ScaledCiphertext) -> Result<(), AggregationError> {
        let ct = handle.ciphertext();
        self.tracker
            .check_level(handle.level(), self.engine.level_of(ct)?)?;
        self.tracker
            .check_scale(handle.scale(), self.engine.scale_of(ct)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ckks_sim::SimulatedCkksEngine;
    use crate::application::Decryptor;
    use crate::domain::SchemeParameters;

    fn setup() -> (Evaluator<SimulatedCkksEngine>, Decryptor<SimulatedCkksEngine>) {
        let engine = Arc::new(
            SimulatedCkksEngine::with_seed(SchemeParameters::default(), [1u8; 32])
                .expect("valid parameters"),
        );
        let (keys, secret) = engine.generate_keys().expect("keys");
        (
            Evaluator::new(Arc::clone(&engine), keys),
            Decryptor::new(engine, secret),
        )
    }

    #[test]
    fn test_fresh_ciphertext_metadata() {
        let (evaluator, _) = setup();
        let ct = evaluator.encrypt_value(42.0).expect("encrypt");
        assert_eq!(ct.level(), 2);
        assert_eq!(ct.scale(), evaluator.tracker().canonical_scale());
    }

    #[test]
    fn test_multiply_plain_rescale_pins_scale() {
        let (evaluator, decryptor) = setup();
        let ct = evaluator.encrypt_value(80.0).expect("encrypt");
        let half = evaluator.encode_constant(0.5, 2).expect("encode");

        let out = evaluator.multiply_plain_rescale(&ct, &half).expect("multiply");
        assert_eq!(out.level(), 1);
        assert_eq!(out.scale(), evaluator.tracker().canonical_scale());

        let value = decryptor.decrypt_value(&out).expect("decrypt");
        assert!((value.expose() - 40.0).abs() < 1e-3);
    }

    #[test]
    fn test_constant_at_wrong_level_is_rejected() {
        let (evaluator, _) = setup();
        let ct = evaluator.encrypt_value(1.0).expect("encrypt");
        let misplaced = evaluator.encode_constant(0.5, 1).expect("encode");
        assert_eq!(
            evaluator
                .multiply_plain_rescale(&ct, &misplaced)
                .expect_err("level mismatch"),
            AggregationError::LevelMismatch { left: 2, right: 1 }
        );
    }

    #[test]
    fn test_add_after_rescale_requires_matching_levels() {
        let (evaluator, _) = setup();
        let a = evaluator.encrypt_value(1.0).expect("encrypt");
        let one = evaluator.encode_constant(1.0, 2).expect("encode");
        let lowered = evaluator.multiply_plain_rescale(&a, &one).expect("multiply");
        assert!(matches!(
            evaluator.add(&a, &lowered),
            Err(AggregationError::LevelMismatch { .. })
        ));
    }

    #[test]
    fn test_multiply_rescale_squares() {
        let (evaluator, decryptor) = setup();
        let ct = evaluator.encrypt_value(-4.0).expect("encrypt");
        let sq = evaluator.multiply_rescale(&ct, &ct).expect("square");
        assert_eq!(sq.level(), 1);
        let value = decryptor.decrypt_value(&sq).expect("decrypt");
        assert!((value.expose() - 16.0).abs() < 1e-3);
    }

    #[test]
    fn test_verify_detects_stale_metadata() {
        let (evaluator, _) = setup();
        let ct = evaluator.encrypt_value(3.0).expect("encrypt");
        assert!(evaluator.verify(&ct).is_ok());

        let wrong_level = ScaledCiphertext::new(ct.ciphertext().clone(), ct.scale(), 1);
        assert_eq!(
            evaluator.verify(&wrong_level).expect_err("level differs"),
            AggregationError::LevelMismatch { left: 1, right: 2 }
        );

        let wrong_scale = ScaledCiphertext::new(ct.ciphertext().clone(), 2.0 * ct.scale(), 2);
        assert!(matches!(
            evaluator.verify(&wrong_scale),
            Err(AggregationError::ScaleMismatch { .. })
        ));
    }

    #[test]
    fn test_encrypt_at_explicit_scale() {
        let (evaluator, decryptor) = setup();
        let scale = 2f64.powi(30);
        let ct = evaluator.encrypt_at(12.5, scale).expect("encrypt");
        assert_eq!(ct.scale(), scale);
        assert!(evaluator.verify(&ct).is_ok());
        let value = decryptor.decrypt_value(&ct).expect("decrypt");
        assert!((value.expose() - 12.5).abs() < 1e-6);
    }

    #[test]
    fn test_sensitive_constant_is_marked() {
        let (evaluator, _) = setup();
        let mean = Sensitive::new(2.0);
        let constant = evaluator.encode_sensitive(&mean, 2).expect("encode");
        assert!(constant.sensitive);
        assert!(!evaluator.encode_constant(2.0, 2).expect("encode").sensitive);
    }
}
