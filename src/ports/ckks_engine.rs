//! CKKS engine port: Trait for the approximate-arithmetic homomorphic engine.
//!
//! This trait abstracts the encryption scheme from the aggregation pipeline.
//! Implementations own the polynomial arithmetic; the pipeline only relies on
//! the numeric contract described on each method.

use crate::domain::{
    Ciphertext, CryptoError, EvaluationKey, KeySet, Plaintext, PublicKey, SchemeParameters,
    SecretKey,
};

/// Trait for CKKS-style engine operations.
///
/// Implementations provide:
/// - Key generation (public, evaluation and secret keys)
/// - Fixed-point encoding of scalars at an explicit scale and level
/// - Encryption / decryption
/// - Homomorphic add, plaintext subtract/multiply, ciphertext multiply,
///   relinearization and rescale
///
/// Binary operations reject operands at different levels; additions and
/// subtractions also reject operands at different scales.
pub trait CkksEngine: Send + Sync {
    /// The validated parameter set this engine was built with.
    fn parameters(&self) -> &SchemeParameters;

    /// Level of a freshly encrypted ciphertext.
    fn top_level(&self) -> usize {
        self.parameters().top_level()
    }

    /// Generate a key set and its secret key.
    ///
    /// # Errors
    /// Returns `CryptoError::KeyGeneration` if generation fails.
    fn generate_keys(&self) -> Result<(KeySet, SecretKey), CryptoError>;

    /// Encode `value` at `scale` for use at `level`.
    ///
    /// # Errors
    /// Returns `CryptoError::Encoding` for non-finite input or an invalid
    /// level, `CryptoError::Overflow` if the scaled value does not fit.
    fn encode(&self, value: f64, scale: f64, level: usize) -> Result<Plaintext, CryptoError>;

    /// Decode a plaintext back to a scalar.
    ///
    /// # Errors
    /// Returns `CryptoError::Serialization` for a foreign payload.
    fn decode(&self, plain: &Plaintext) -> Result<f64, CryptoError>;

    /// Encrypt a plaintext under the public key.
    ///
    /// # Errors
    /// Returns `CryptoError::Encryption` if encryption fails.
    fn encrypt(&self, plain: &Plaintext, key: &PublicKey) -> Result<Ciphertext, CryptoError>;

    /// Decrypt a ciphertext with the secret key.
    ///
    /// # Errors
    /// Returns `CryptoError::KeyMismatch` for a ciphertext of another key set,
    /// `CryptoError::Overflow` if the value wrapped the modulus.
    fn decrypt(&self, ct: &Ciphertext, key: &SecretKey) -> Result<Plaintext, CryptoError>;

    /// Homomorphic addition. Scale and level are preserved.
    ///
    /// # Errors
    /// `LevelMismatch`, `ScaleMismatch`, `KeyMismatch` or `Overflow`.
    fn add(&self, left: &Ciphertext, right: &Ciphertext) -> Result<Ciphertext, CryptoError>;

    /// Subtract a plaintext. Scale and level are preserved.
    ///
    /// # Errors
    /// `LevelMismatch`, `ScaleMismatch` or `Overflow`.
    fn sub_plain(&self, ct: &Ciphertext, plain: &Plaintext) -> Result<Ciphertext, CryptoError>;

    /// Multiply by a plaintext. Nominal scale becomes the product of both
    /// scales; the level is unchanged until the next rescale.
    ///
    /// # Errors
    /// `LevelMismatch` or `Overflow`.
    fn multiply_plain(&self, ct: &Ciphertext, plain: &Plaintext)
        -> Result<Ciphertext, CryptoError>;

    /// Multiply two ciphertexts. The result has three components and must be
    /// relinearized before it can be multiplied again.
    ///
    /// # Errors
    /// `LevelMismatch`, `KeyMismatch`, `Overflow`, or `Computation` for an
    /// operand that was not relinearized.
    fn multiply(&self, left: &Ciphertext, right: &Ciphertext) -> Result<Ciphertext, CryptoError>;

    /// Reduce a product ciphertext back to two components.
    ///
    /// # Errors
    /// `KeyMismatch` or `Computation` if there is nothing to relinearize.
    fn relinearize(&self, ct: &Ciphertext, key: &EvaluationKey)
        -> Result<Ciphertext, CryptoError>;

    /// Divide out the current level's prime: level drops by one and the raw
    /// scale is divided by that prime.
    ///
    /// # Errors
    /// `LevelExhausted` at level 0.
    fn rescale(&self, ct: &Ciphertext) -> Result<Ciphertext, CryptoError>;

    /// Overwrite the scale metadata without touching the value.
    ///
    /// # Errors
    /// `Computation` for a non-positive or non-finite scale.
    fn set_scale(&self, ct: &Ciphertext, scale: f64) -> Result<Ciphertext, CryptoError>;

    /// The engine's own view of a ciphertext's scale.
    ///
    /// # Errors
    /// `Serialization` for a foreign payload.
    fn scale_of(&self, ct: &Ciphertext) -> Result<f64, CryptoError>;

    /// The engine's own view of a ciphertext's level.
    ///
    /// # Errors
    /// `Serialization` for a foreign payload.
    fn level_of(&self, ct: &Ciphertext) -> Result<usize, CryptoError>;
}
