//! Decryptor: The only holder of the secret key.

use std::sync::Arc;

use crate::domain::{AggregationError, ScaledCiphertext, SecretKey, Sensitive};
use crate::ports::CkksEngine;

/// Decrypts aggregate ciphertexts. Values come back wrapped in `Sensitive`
/// so they cannot be logged by accident.
pub struct Decryptor<E: CkksEngine> {
    engine: Arc<E>,
    secret: SecretKey,
}

impl<E: CkksEngine> Decryptor<E> {
    #[must_use]
    pub fn new(engine: Arc<E>, secret: SecretKey) -> Self {
        Self { engine, secret }
    }

    /// Fingerprint of the key set this decryptor belongs to.
    #[must_use]
    pub fn key_set(&self) -> &str {
        &self.secret.key_set
    }

    /// # Errors
    /// `KeyMismatch` for a ciphertext of another key set.
    pub fn decrypt_value(
        &self,
        ct: &ScaledCiphertext,
    ) -> Result<Sensitive<f64>, AggregationError> {
        let plain = self.engine.decrypt(ct.ciphertext(), &self.secret)?;
        Ok(Sensitive::new(self.engine.decode(&plain)?))
    }
}
