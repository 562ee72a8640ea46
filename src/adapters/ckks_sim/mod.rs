//! Simulated CKKS adapter: Reference implementation of `CkksEngine`.
//!
//! Models the numeric contract of a leveled CKKS engine without performing
//! any lattice encryption:
//!
//! - Fixed-point encoding: `round(value * scale)` held as `i128`
//! - A real modulus chain of NTT-friendly primes generated from the
//!   configured bit sizes; the last prime is the special key-switching prime
//! - Gaussian encryption noise (σ = 3.2, truncated at 6σ)
//! - Rescale divides by the dropped prime, so the raw scale drifts away from
//!   the canonical power of two exactly as in a real engine
//! - Overflow detection against `Q_level / 2`
//! - Chains whose rescaling primes sit further than `MAX_PIN_DRIFT` from the
//!   scale are rejected, since pinning would exceed the accuracy target
//! - Ciphertext products carry three components until relinearized
//!
//! # Security
//!
//! This engine provides NO confidentiality: the payload holds the noisy
//! fixed-point value. It exists to test and dry-run the aggregation
//! pipeline. Production deployments plug a real engine in behind
//! `CkksEngine`. Key-set binding is still enforced so misuse surfaces here
//! the same way it would with a real engine.

mod prime;

use std::sync::Mutex;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::domain::{
    AggregationError, Ciphertext, CryptoError, EvaluationKey, KeySet, Plaintext, PublicKey,
    SchemeParameters, SecretKey,
};
use crate::ports::CkksEngine;

/// Standard deviation of the encryption error.
const NOISE_STD_DEV: f64 = 3.2;

/// Relative tolerance when comparing operand scales.
const SCALE_TOLERANCE: f64 = 1e-9;

/// Largest accepted `|q - scale| / scale` for a prime dropped by rescale.
/// Pinning the scale after a rescale is off by exactly this ratio.
pub const MAX_PIN_DRIFT: f64 = 1e-5;

/// Domain separators for key derivation.
const PUBLIC_KEY_LABEL: &[u8] = b"cohortseal/public-key";
const RELIN_KEY_LABEL: &[u8] = b"cohortseal/relinearization-key";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EncodedScalar {
    value: i128,
    scale: f64,
    level: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SimCiphertext {
    value: i128,
    scale: f64,
    level: usize,
    /// Number of polynomial components (2 fresh, 3 after a product).
    size: u8,
}

fn derive_key(label: &[u8], secret: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(label);
    hasher.update(secret);
    hasher.finalize().to_vec()
}

/// Round-half-away-from-zero division.
fn div_round(value: i128, divisor: i128) -> i128 {
    let half = divisor / 2;
    if value >= 0 {
        (value + half) / divisor
    } else {
        -((-value + half) / divisor)
    }
}

fn scales_match(left: f64, right: f64) -> bool {
    (left - right).abs() <= SCALE_TOLERANCE * left.abs().max(right.abs())
}

/// Reference CKKS engine (see module docs).
pub struct SimulatedCkksEngine {
    params: SchemeParameters,

    /// Data-level primes; `data_primes[l]` is dropped when rescaling from level `l`.
    data_primes: Vec<u64>,

    special_prime: u64,

    /// `log2(q_0 * ... * q_l)` for every level `l`.
    log2_modulus: Vec<f64>,

    /// CSPRNG for encryption noise
    rng: Mutex<ChaCha20Rng>,
}

impl SimulatedCkksEngine {
    /// Validate `params`, build the modulus chain and seed the noise RNG from OS entropy.
    ///
    /// # Errors
    /// Returns `AggregationError::InvalidParameters` before any key exists.
    pub fn new(params: SchemeParameters) -> Result<Self, AggregationError> {
        Self::with_rng(params, ChaCha20Rng::from_entropy())
    }

    #[cfg(test)]
    pub(crate) fn with_seed(
        params: SchemeParameters,
        seed: [u8; 32],
    ) -> Result<Self, AggregationError> {
        Self::with_rng(params, ChaCha20Rng::from_seed(seed))
    }

    fn with_rng(params: SchemeParameters, rng: ChaCha20Rng) -> Result<Self, AggregationError> {
        params
            .validate()
            .map_err(|errors| AggregationError::InvalidParameters(errors.join("; ")))?;

        let mut primes =
            prime::generate_chain(&params.coeff_modulus_bits, params.poly_modulus_degree)
                .map_err(AggregationError::InvalidParameters)?;
        let special_prime = primes.pop().ok_or_else(|| {
            AggregationError::InvalidParameters("empty coefficient modulus".into())
        })?;

        let scale = params.canonical_scale();
        // data_primes[0] is never dropped.
        for (level, &q) in primes.iter().enumerate().skip(1) {
            let drift = (q as f64 - scale).abs() / scale;
            if drift > MAX_PIN_DRIFT {
                return Err(AggregationError::InvalidParameters(format!(
                    "prime {q} at level {level} is {drift:.2e} away from the scale \
                     2^{} (at most {MAX_PIN_DRIFT:e} keeps rescaled results accurate)",
                    params.scale_bits
                )));
            }
        }

        let log2_modulus = primes
            .iter()
            .scan(0.0_f64, |acc, &p| {
                *acc += (p as f64).log2();
                Some(*acc)
            })
            .collect();

        tracing::info!(
            "Initialized simulated CKKS engine (N={}, data levels={}, scale=2^{}, security={})",
            params.poly_modulus_degree,
            primes.len(),
            params.scale_bits,
            params.security
        );

        Ok(Self {
            params,
            data_primes: primes,
            special_prime,
            log2_modulus,
            rng: Mutex::new(rng),
        })
    }

    /// The data-level primes of the modulus chain, lowest level first.
    #[must_use]
    pub fn data_primes(&self) -> &[u64] {
        &self.data_primes
    }

    #[must_use]
    pub fn special_prime(&self) -> u64 {
        self.special_prime
    }

    fn sample_noise(&self) -> Result<i128, CryptoError> {
        let normal = Normal::new(0.0, NOISE_STD_DEV)
            .map_err(|e| CryptoError::Encryption(format!("Invalid noise distribution: {e}")))?;
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| CryptoError::Encryption("Noise RNG unavailable".into()))?;

        loop {
            let sample: f64 = normal.sample(&mut *rng);
            if sample.abs() < 6.0 * NOISE_STD_DEV {
                return Ok(sample.round() as i128);
            }
        }
    }

    /// `|value|` must stay below `Q_level / 2`, otherwise it wraps the modulus.
    fn check_fits(&self, value: i128, level: usize) -> Result<(), CryptoError> {
        let log2_q = self.log2_modulus.get(level).ok_or_else(|| {
            CryptoError::Computation(format!("Level {level} is outside the modulus chain"))
        })?;
        let magnitude = value.unsigned_abs();
        if magnitude == 0 || (magnitude as f64).log2() < log2_q - 1.0 {
            Ok(())
        } else {
            Err(CryptoError::Overflow { level })
        }
    }

    fn read_ct(ct: &Ciphertext) -> Result<SimCiphertext, CryptoError> {
        bincode::deserialize(ct.payload()).map_err(|e| {
            CryptoError::Serialization(format!("Failed to deserialize ciphertext: {e}"))
        })
    }

    fn write_ct(inner: &SimCiphertext, key_set: &str) -> Result<Ciphertext, CryptoError> {
        let payload = bincode::serialize(inner).map_err(|e| {
            CryptoError::Serialization(format!("Failed to serialize ciphertext: {e}"))
        })?;
        Ok(Ciphertext::new(payload, key_set))
    }

    fn read_pt(plain: &Plaintext) -> Result<EncodedScalar, CryptoError> {
        bincode::deserialize(plain.payload()).map_err(|e| {
            CryptoError::Serialization(format!("Failed to deserialize plaintext: {e}"))
        })
    }

    fn same_key_set(left: &Ciphertext, right: &Ciphertext) -> Result<(), CryptoError> {
        if left.key_set == right.key_set {
            Ok(())
        } else {
            Err(CryptoError::KeyMismatch {
                expected: left.key_set.clone(),
                actual: right.key_set.clone(),
            })
        }
    }

    fn same_level(left: usize, right: usize) -> Result<(), CryptoError> {
        if left == right {
            Ok(())
        } else {
            Err(CryptoError::LevelMismatch { left, right })
        }
    }

    fn same_scale(left: f64, right: f64) -> Result<(), CryptoError> {
        if scales_match(left, right) {
            Ok(())
        } else {
            Err(CryptoError::ScaleMismatch { left, right })
        }
    }
}

impl CkksEngine for SimulatedCkksEngine {
    fn parameters(&self) -> &SchemeParameters {
        &self.params
    }

    fn generate_keys(&self) -> Result<(KeySet, SecretKey), CryptoError> {
        tracing::info!("Generating CKKS key set...");

        let mut secret = Zeroizing::new([0u8; 32]);
        ChaCha20Rng::from_entropy()
            .try_fill_bytes(&mut *secret)
            .map_err(|e| CryptoError::KeyGeneration(format!("Entropy source failed: {e}")))?;

        let public = PublicKey::from_bytes(derive_key(PUBLIC_KEY_LABEL, &*secret));
        let evaluation = EvaluationKey::from_bytes(
            derive_key(RELIN_KEY_LABEL, &*secret),
            public.fingerprint.clone(),
        );
        let secret_key = SecretKey::from_bytes(secret.to_vec(), public.fingerprint.clone());

        tracing::info!("Generated key set {}", public.fingerprint);

        Ok((KeySet::new(public, evaluation), secret_key))
    }

    fn encode(&self, value: f64, scale: f64, level: usize) -> Result<Plaintext, CryptoError> {
        if !value.is_finite() {
            return Err(CryptoError::Encoding("value is not finite".into()));
        }
        if !scale.is_finite() || scale < 1.0 {
            return Err(CryptoError::Encoding(format!("invalid scale {scale}")));
        }
        if level > self.top_level() {
            return Err(CryptoError::Encoding(format!(
                "level {level} above top level {}",
                self.top_level()
            )));
        }

        let scaled = (value * scale).round();
        if !(scaled.abs() < 2f64.powi(126)) {
            return Err(CryptoError::Overflow { level });
        }
        let encoded = EncodedScalar {
            value: scaled as i128,
            scale,
            level,
        };
        self.check_fits(encoded.value, level)?;

        let payload = bincode::serialize(&encoded).map_err(|e| {
            CryptoError::Serialization(format!("Failed to serialize plaintext: {e}"))
        })?;
        Ok(Plaintext::new(payload))
    }

    fn decode(&self, plain: &Plaintext) -> Result<f64, CryptoError> {
        let encoded = Self::read_pt(plain)?;
        Ok(encoded.value as f64 / encoded.scale)
    }

    fn encrypt(&self, plain: &Plaintext, key: &PublicKey) -> Result<Ciphertext, CryptoError> {
        let encoded = Self::read_pt(plain)?;
        let value = encoded
            .value
            .checked_add(self.sample_noise()?)
            .ok_or(CryptoError::Overflow {
                level: encoded.level,
            })?;
        self.check_fits(value, encoded.level)?;

        Self::write_ct(
            &SimCiphertext {
                value,
                scale: encoded.scale,
                level: encoded.level,
                size: 2,
            },
            &key.fingerprint,
        )
    }

    fn decrypt(&self, ct: &Ciphertext, key: &SecretKey) -> Result<Plaintext, CryptoError> {
        let public = PublicKey::from_bytes(derive_key(PUBLIC_KEY_LABEL, key.as_bytes()));
        if public.fingerprint != ct.key_set || key.key_set != ct.key_set {
            return Err(CryptoError::KeyMismatch {
                expected: ct.key_set.clone(),
                actual: key.key_set.clone(),
            });
        }

        let inner = Self::read_ct(ct)?;
        self.check_fits(inner.value, inner.level)?;

        let payload = bincode::serialize(&EncodedScalar {
            value: inner.value,
            scale: inner.scale,
            level: inner.level,
        })
        .map_err(|e| CryptoError::Decryption(format!("Failed to serialize plaintext: {e}")))?;
        Ok(Plaintext::new(payload))
    }

    fn add(&self, left: &Ciphertext, right: &Ciphertext) -> Result<Ciphertext, CryptoError> {
        Self::same_key_set(left, right)?;
        let (a, b) = (Self::read_ct(left)?, Self::read_ct(right)?);
        Self::same_level(a.level, b.level)?;
        Self::same_scale(a.scale, b.scale)?;

        let value = a
            .value
            .checked_add(b.value)
            .ok_or(CryptoError::Overflow { level: a.level })?;
        self.check_fits(value, a.level)?;

        Self::write_ct(
            &SimCiphertext {
                value,
                scale: a.scale,
                level: a.level,
                size: a.size.max(b.size),
            },
            &left.key_set,
        )
    }

    fn sub_plain(&self, ct: &Ciphertext, plain: &Plaintext) -> Result<Ciphertext, CryptoError> {
        let (a, p) = (Self::read_ct(ct)?, Self::read_pt(plain)?);
        Self::same_level(a.level, p.level)?;
        Self::same_scale(a.scale, p.scale)?;

        let value = a
            .value
            .checked_sub(p.value)
            .ok_or(CryptoError::Overflow { level: a.level })?;
        self.check_fits(value, a.level)?;

        Self::write_ct(&SimCiphertext { value, ..a }, &ct.key_set)
    }

    fn multiply_plain(
        &self,
        ct: &Ciphertext,
        plain: &Plaintext,
    ) -> Result<Ciphertext, CryptoError> {
        let (a, p) = (Self::read_ct(ct)?, Self::read_pt(plain)?);
        Self::same_level(a.level, p.level)?;

        let value = a
            .value
            .checked_mul(p.value)
            .ok_or(CryptoError::Overflow { level: a.level })?;
        self.check_fits(value, a.level)?;

        Self::write_ct(
            &SimCiphertext {
                value,
                scale: a.scale * p.scale,
                ..a
            },
            &ct.key_set,
        )
    }

    fn multiply(&self, left: &Ciphertext, right: &Ciphertext) -> Result<Ciphertext, CryptoError> {
        Self::same_key_set(left, right)?;
        let (a, b) = (Self::read_ct(left)?, Self::read_ct(right)?);
        if a.size != 2 || b.size != 2 {
            return Err(CryptoError::Computation(
                "relinearize product ciphertexts before multiplying again".into(),
            ));
        }
        Self::same_level(a.level, b.level)?;

        let value = a
            .value
            .checked_mul(b.value)
            .ok_or(CryptoError::Overflow { level: a.level })?;
        self.check_fits(value, a.level)?;

        Self::write_ct(
            &SimCiphertext {
                value,
                scale: a.scale * b.scale,
                level: a.level,
                size: 3,
            },
            &left.key_set,
        )
    }

    fn relinearize(
        &self,
        ct: &Ciphertext,
        key: &EvaluationKey,
    ) -> Result<Ciphertext, CryptoError> {
        if key.key_set != ct.key_set {
            return Err(CryptoError::KeyMismatch {
                expected: ct.key_set.clone(),
                actual: key.key_set.clone(),
            });
        }
        let inner = Self::read_ct(ct)?;
        if inner.size != 3 {
            return Err(CryptoError::Computation(format!(
                "relinearization expects 3 components, got {}",
                inner.size
            )));
        }
        Self::write_ct(&SimCiphertext { size: 2, ..inner }, &ct.key_set)
    }

    fn rescale(&self, ct: &Ciphertext) -> Result<Ciphertext, CryptoError> {
        let inner = Self::read_ct(ct)?;
        if inner.level == 0 {
            return Err(CryptoError::LevelExhausted(0));
        }
        let prime = *self.data_primes.get(inner.level).ok_or_else(|| {
            CryptoError::Computation(format!("Level {} is outside the modulus chain", inner.level))
        })?;
        let level = inner.level - 1;

        let value = div_round(inner.value, i128::from(prime));
        self.check_fits(value, level)?;

        tracing::trace!("Rescaled from level {} to {level}", inner.level);

        Self::write_ct(
            &SimCiphertext {
                value,
                scale: inner.scale / prime as f64,
                level,
                size: inner.size,
            },
            &ct.key_set,
        )
    }

    fn set_scale(&self, ct: &Ciphertext, scale: f64) -> Result<Ciphertext, CryptoError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(CryptoError::Computation(format!("invalid scale {scale}")));
        }
        let inner = Self::read_ct(ct)?;
        Self::write_ct(&SimCiphertext { scale, ..inner }, &ct.key_set)
    }

    fn scale_of(&self, ct: &Ciphertext) -> Result<f64, CryptoError> {
        Ok(Self::read_ct(ct)?.scale)
    }

    fn level_of(&self, ct: &Ciphertext) -> Result<usize, CryptoError> {
        Ok(Self::read_ct(ct)?.level)
    }
}
