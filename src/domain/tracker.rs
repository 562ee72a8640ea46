//! Explicit scale and level bookkeeping for ciphertext handles.
//!
//! Every binary homomorphic operation requires equal levels; addition and
//! plaintext subtraction also require equal scales. Multiplication yields a
//! nominal scale equal to the product of the operand scales, and the
//! following rescale drops one level. After each rescale the recorded scale is
//! pinned to the canonical constant instead of the engine's drifting value.

use super::crypto::{Ciphertext, Plaintext};
use super::statistic::AggregationError;

/// Relative tolerance when comparing two pinned scales.
const SCALE_TOLERANCE: f64 = 1e-9;

/// A ciphertext handle with its tracked scale and level.
#[derive(Debug, Clone)]
pub struct ScaledCiphertext {
    ciphertext: Ciphertext,
    scale: f64,
    level: usize,
}

impl ScaledCiphertext {
    pub fn new(ciphertext: Ciphertext, scale: f64, level: usize) -> Self {
        Self {
            ciphertext,
            scale,
            level,
        }
    }

    #[must_use]
    pub fn ciphertext(&self) -> &Ciphertext {
        &self.ciphertext
    }

    #[must_use]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    #[must_use]
    pub fn level(&self) -> usize {
        self.level
    }
}

/// An encoded scalar used as the right-hand operand of a plaintext operation.
///
/// `sensitive` marks constants derived from decrypted data (e.g. a mean fed
/// back for a deviation step) as opposed to public ones like `1/count`.
#[derive(Debug, Clone)]
pub struct PlaintextConstant {
    pub plaintext: Plaintext,
    pub scale: f64,
    pub level: usize,
    pub sensitive: bool,
}

/// Enforces scale/level compatibility between operands.
#[derive(Debug, Clone, Copy)]
pub struct ScaleTracker {
    canonical_scale: f64,
}

impl ScaleTracker {
    #[must_use]
    pub fn new(canonical_scale: f64) -> Self {
        Self { canonical_scale }
    }

    #[must_use]
    pub fn canonical_scale(&self) -> f64 {
        self.canonical_scale
    }

    fn scales_match(left: f64, right: f64) -> bool {
        (left - right).abs() <= SCALE_TOLERANCE * left.abs().max(right.abs())
    }

    /// Two scales must agree within a relative tolerance.
    ///
    /// # Errors
    /// `ScaleMismatch` otherwise.
    pub fn check_scale(&self, left: f64, right: f64) -> Result<(), AggregationError> {
        if Self::scales_match(left, right) {
            Ok(())
        } else {
            Err(AggregationError::ScaleMismatch { left, right })
        }
    }

    /// Both operands must sit at the same level.
    ///
    /// # Errors
    /// `LevelMismatch` otherwise.
    pub fn check_level(&self, left: usize, right: usize) -> Result<(), AggregationError> {
        if left == right {
            Ok(())
        } else {
            Err(AggregationError::LevelMismatch { left, right })
        }
    }

    /// Addition requires equal level and equal scale.
    ///
    /// # Errors
    /// `LevelMismatch` or `ScaleMismatch`.
    pub fn check_add(
        &self,
        left: &ScaledCiphertext,
        right: &ScaledCiphertext,
    ) -> Result<(), AggregationError> {
        self.check_level(left.level, right.level)?;
        self.check_scale(left.scale, right.scale)
    }

    /// A plaintext operand must match the ciphertext's level; for
    /// scale-preserving operations (subtraction) also its scale.
    ///
    /// # Errors
    /// `LevelMismatch` or `ScaleMismatch`.
    pub fn check_plain(
        &self,
        ct: &ScaledCiphertext,
        plain: &PlaintextConstant,
        same_scale: bool,
    ) -> Result<(), AggregationError> {
        self.check_level(ct.level, plain.level)?;
        if same_scale {
            self.check_scale(ct.scale, plain.scale)?;
        }
        Ok(())
    }

    /// A ciphertext can be multiplied and rescaled only above level 0.
    ///
    /// # Errors
    /// `LevelExhausted` at the bottom of the chain.
    pub fn check_rescalable(&self, ct: &ScaledCiphertext) -> Result<(), AggregationError> {
        self.ensure_headroom(ct.level, 1)
    }

    /// Fail early when `required` multiply + rescale steps do not fit in `available`.
    ///
    /// # Errors
    /// `LevelExhausted`.
    pub fn ensure_headroom(&self, available: usize, required: usize) -> Result<(), AggregationError> {
        if available >= required {
            Ok(())
        } else {
            Err(AggregationError::LevelExhausted {
                available,
                required,
            })
        }
    }

    /// Record a freshly rescaled ciphertext one level down at the canonical scale.
    ///
    /// # Errors
    /// `LevelExhausted` if `from_level` is already 0.
    pub fn pin_rescaled(
        &self,
        ciphertext: Ciphertext,
        from_level: usize,
    ) -> Result<ScaledCiphertext, AggregationError> {
        let level = from_level
            .checked_sub(1)
            .ok_or(AggregationError::LevelExhausted {
                available: 0,
                required: 1,
            })?;
        Ok(ScaledCiphertext::new(ciphertext, self.canonical_scale, level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCALE: f64 = 1_099_511_627_776.0;

    fn handle(scale: f64, level: usize) -> ScaledCiphertext {
        ScaledCiphertext::new(Ciphertext::new(vec![0u8; 4], "ks"), scale, level)
    }

    fn constant(scale: f64, level: usize) -> PlaintextConstant {
        PlaintextConstant {
            plaintext: Plaintext::new(vec![1]),
            scale,
            level,
            sensitive: false,
        }
    }

    #[test]
    fn test_add_requires_same_level() {
        let tracker = ScaleTracker::new(SCALE);
        let err = tracker
            .check_add(&handle(SCALE, 2), &handle(SCALE, 1))
            .expect_err("levels differ");
        assert_eq!(err, AggregationError::LevelMismatch { left: 2, right: 1 });
    }

    #[test]
    fn test_add_requires_same_scale() {
        let tracker = ScaleTracker::new(SCALE);
        let err = tracker
            .check_add(&handle(SCALE, 1), &handle(SCALE * SCALE, 1))
            .expect_err("scales differ");
        assert!(matches!(err, AggregationError::ScaleMismatch { .. }));
        assert!(tracker.check_add(&handle(SCALE, 1), &handle(SCALE, 1)).is_ok());
    }

    #[test]
    fn test_plain_subtraction_checks_scale_but_multiplication_does_not() {
        let tracker = ScaleTracker::new(SCALE);
        let ct = handle(SCALE, 2);
        assert!(tracker.check_plain(&ct, &constant(SCALE, 2), true).is_ok());
        assert!(tracker.check_plain(&ct, &constant(2.0 * SCALE, 2), true).is_err());
        assert!(tracker.check_plain(&ct, &constant(2.0 * SCALE, 2), false).is_ok());
        assert!(tracker.check_plain(&ct, &constant(SCALE, 1), false).is_err());
    }

    #[test]
    fn test_pin_rescaled_drops_level_and_restores_canonical_scale() {
        let tracker = ScaleTracker::new(SCALE);
        let pinned = tracker
            .pin_rescaled(Ciphertext::new(vec![1], "ks"), 2)
            .expect("level 2 can rescale");
        assert_eq!(pinned.level(), 1);
        assert_eq!(pinned.scale(), SCALE);

        let err = tracker
            .pin_rescaled(Ciphertext::new(vec![1], "ks"), 0)
            .expect_err("level 0 cannot rescale");
        assert!(matches!(err, AggregationError::LevelExhausted { .. }));
    }

    #[test]
    fn test_headroom() {
        let tracker = ScaleTracker::new(SCALE);
        assert!(tracker.ensure_headroom(2, 2).is_ok());
        assert_eq!(
            tracker.ensure_headroom(1, 2),
            Err(AggregationError::LevelExhausted {
                available: 1,
                required: 2
            })
        );
        assert!(tracker.check_rescalable(&handle(SCALE, 0)).is_err());
    }
}
