//! Key material and opaque ciphertext handles.
//!
//! The homomorphic engine is external to the pipeline: these types only carry
//! the engine's serialized payloads plus the metadata needed to check that
//! handles belong to the same key set.
//!
//! # Memory Security
//!
//! `SecretKey` implements `Zeroize` and `ZeroizeOnDrop` and is deliberately not
//! `Clone`: exactly one owner (the decryptor) holds it for the whole run.

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Error type for engine-level cryptographic operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CryptoError {
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Encoding failed: {0}")]
    Encoding(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Homomorphic computation failed: {0}")]
    Computation(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Key set mismatch: expected {expected}, got {actual}")]
    KeyMismatch { expected: String, actual: String },

    #[error("Operand levels differ: {left} vs {right}")]
    LevelMismatch { left: usize, right: usize },

    #[error("Operand scales differ: {left} vs {right}")]
    ScaleMismatch { left: f64, right: f64 },

    #[error("Modulus chain exhausted at level {0}")]
    LevelExhausted(usize),

    #[error("Value exceeds the coefficient modulus at level {level}")]
    Overflow { level: usize },
}

/// Secret decryption key.
///
/// # Security
///
/// - Implements `ZeroizeOnDrop`: key material is erased when dropped
/// - `Debug` implementation does NOT expose key bytes
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretKey {
    pub(crate) inner: Vec<u8>,

    /// Fingerprint of the public key this secret key decrypts for (NOT secret)
    #[zeroize(skip)]
    pub key_set: String,
}

impl SecretKey {
    /// Wrap raw secret bytes belonging to the key set `key_set`.
    pub fn from_bytes(bytes: Vec<u8>, key_set: impl Into<String>) -> Self {
        Self {
            inner: bytes,
            key_set: key_set.into(),
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.inner
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKey")
            .field("key_set", &self.key_set)
            .field("size_bytes", &self.inner.len())
            .finish()
    }
}

/// Public encryption key. Its fingerprint identifies the key set.
#[derive(Clone, Serialize, Deserialize)]
pub struct PublicKey {
    pub(crate) inner: Vec<u8>,

    pub fingerprint: String,
}

impl PublicKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let fingerprint = compute_fingerprint(&bytes);
        Self {
            inner: bytes,
            fingerprint,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.inner
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicKey")
            .field("fingerprint", &self.fingerprint)
            .field("size_bytes", &self.inner.len())
            .finish()
    }
}

/// Relinearization key used after ciphertext × ciphertext products.
///
/// Allows evaluation but CANNOT decrypt.
#[derive(Clone, Serialize, Deserialize)]
pub struct EvaluationKey {
    pub(crate) inner: Vec<u8>,

    pub key_set: String,
}

impl EvaluationKey {
    pub fn from_bytes(bytes: Vec<u8>, key_set: impl Into<String>) -> Self {
        Self {
            inner: bytes,
            key_set: key_set.into(),
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.inner
    }
}

impl std::fmt::Debug for EvaluationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluationKey")
            .field("key_set", &self.key_set)
            .field("size_bytes", &self.inner.len())
            .finish()
    }
}

/// The keys an evaluator may hold: everything except the secret key.
#[derive(Debug, Clone)]
pub struct KeySet {
    pub public: PublicKey,
    pub evaluation: EvaluationKey,
}

impl KeySet {
    pub fn new(public: PublicKey, evaluation: EvaluationKey) -> Self {
        Self { public, evaluation }
    }

    /// Identifier shared by every key and ciphertext of this set.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.public.fingerprint
    }
}

/// Opaque engine ciphertext.
#[derive(Clone, Serialize, Deserialize)]
pub struct Ciphertext {
    pub(crate) payload: Vec<u8>,

    /// Fingerprint of the public key used for encryption
    pub key_set: String,
}

impl Ciphertext {
    pub fn new(payload: Vec<u8>, key_set: impl Into<String>) -> Self {
        Self {
            payload,
            key_set: key_set.into(),
        }
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.payload.len()
    }
}

impl std::fmt::Debug for Ciphertext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ciphertext")
            .field("size_bytes", &self.payload.len())
            .field("key_set", &self.key_set)
            .finish()
    }
}

/// Opaque engine plaintext (an encoded, unencrypted scalar).
#[derive(Clone, Serialize, Deserialize)]
pub struct Plaintext {
    pub(crate) payload: Vec<u8>,
}

impl Plaintext {
    pub fn new(payload: Vec<u8>) -> Self {
        Self { payload }
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

impl std::fmt::Debug for Plaintext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plaintext")
            .field("size_bytes", &self.payload.len())
            .finish()
    }
}

/// A value derived from decrypted data that must not reach logs.
///
/// Used for intermediates such as a decrypted mean fed back into a
/// deviation step.
#[derive(Clone, Copy, PartialEq)]
pub struct Sensitive<T>(T);

impl<T> Sensitive<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> From<T> for Sensitive<T> {
    fn from(value: T) -> Self {
        Self(value)
    }
}

impl<T> std::fmt::Debug for Sensitive<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Sensitive([REDACTED])")
    }
}

/// Compute a key fingerprint: first 8 bytes of SHA-256, hex encoded.
pub(crate) fn compute_fingerprint(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};

    let digest = Sha256::digest(bytes);
    digest[..8].iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_key_debug_no_leak() {
        let key = SecretKey::from_bytes(vec![11, 22, 33, 44, 55, 66], "abcd");
        let debug_output = format!("{key:?}");

        assert!(!debug_output.contains("11, 22, 33"));
        assert!(debug_output.contains("key_set"));
        assert!(debug_output.contains("size_bytes: 6"));
    }

    #[test]
    fn test_public_key_fingerprint_is_hash() {
        let key = PublicKey::from_bytes(vec![0xde, 0xad, 0xbe, 0xef]);
        assert_ne!(key.fingerprint, "deadbeef");
        assert_eq!(key.fingerprint.len(), 16);
        assert_eq!(key.fingerprint, compute_fingerprint(&[0xde, 0xad, 0xbe, 0xef]));
    }

    #[test]
    fn test_key_set_fingerprint_follows_public_key() {
        let public = PublicKey::from_bytes(vec![1, 2, 3]);
        let fp = public.fingerprint.clone();
        let keys = KeySet::new(public, EvaluationKey::from_bytes(vec![4, 5], fp.clone()));
        assert_eq!(keys.fingerprint(), fp);
    }

    #[test]
    fn test_sensitive_debug_redacts() {
        let mean = Sensitive::new(42.125_f64);
        let debug_output = format!("{mean:?}");
        assert!(!debug_output.contains("42"));
        assert_eq!(*mean.expose(), 42.125);
    }

    #[test]
    fn test_ciphertext_debug_shows_only_metadata() {
        let ct = Ciphertext::new(vec![9u8; 48], "feed");
        let debug_output = format!("{ct:?}");
        assert!(debug_output.contains("size_bytes: 48"));
        assert!(!debug_output.contains("9, 9"));
        assert_eq!(ct.size_bytes(), 48);
    }
}
