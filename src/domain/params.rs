//! Scheme parameters and their validation.
//!
//! Bounds follow the Homomorphic Encryption Standard table for ternary
//! secrets (maximum total coefficient-modulus bits per ring degree).

use serde::{Deserialize, Serialize};

/// Target security level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SecurityLevel {
    #[default]
    Bits128,
    Bits192,
    Bits256,
}

impl SecurityLevel {
    /// Parse from a bit count (128, 192, 256).
    #[must_use]
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            128 => Some(Self::Bits128),
            192 => Some(Self::Bits192),
            256 => Some(Self::Bits256),
            _ => None,
        }
    }

    /// Maximum total coefficient-modulus bit count for a ring degree.
    #[must_use]
    pub fn max_coeff_modulus_bits(self, poly_modulus_degree: usize) -> Option<u32> {
        let row = match poly_modulus_degree {
            1024 => [27, 19, 14],
            2048 => [54, 37, 29],
            4096 => [109, 75, 58],
            8192 => [218, 152, 118],
            16384 => [438, 305, 237],
            32768 => [881, 611, 476],
            _ => return None,
        };
        Some(match self {
            Self::Bits128 => row[0],
            Self::Bits192 => row[1],
            Self::Bits256 => row[2],
        })
    }
}

impl std::fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bits128 => write!(f, "128-bit"),
            Self::Bits192 => write!(f, "192-bit"),
            Self::Bits256 => write!(f, "256-bit"),
        }
    }
}

/// CKKS parameter set.
///
/// `coeff_modulus_bits` lists every prime of the modulus chain. The last entry
/// is the special key-switching prime; the others form the data chain, and the
/// number of rescales a fresh ciphertext supports is one less than their count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemeParameters {
    pub poly_modulus_degree: usize,
    pub coeff_modulus_bits: Vec<u32>,
    pub scale_bits: u32,
    pub security: SecurityLevel,
}

impl Default for SchemeParameters {
    fn default() -> Self {
        Self {
            poly_modulus_degree: 8192,
            coeff_modulus_bits: vec![60, 40, 40, 60],
            scale_bits: 40,
            security: SecurityLevel::Bits128,
        }
    }
}

impl SchemeParameters {
    /// Bit sizes of the data-level moduli (chain without the special prime).
    #[must_use]
    pub fn data_modulus_bits(&self) -> &[u32] {
        let n = self.coeff_modulus_bits.len().saturating_sub(1);
        &self.coeff_modulus_bits[..n]
    }

    /// Level of a freshly encrypted ciphertext.
    #[must_use]
    pub fn top_level(&self) -> usize {
        self.data_modulus_bits().len().saturating_sub(1)
    }

    /// Number of multiply + rescale steps available before exhaustion.
    #[must_use]
    pub fn chain_depth(&self) -> usize {
        self.top_level()
    }

    /// The canonical scale every ciphertext is pinned to: `2^scale_bits`.
    #[must_use]
    pub fn canonical_scale(&self) -> f64 {
        2f64.powi(self.scale_bits as i32)
    }

    /// Validate the parameter set.
    ///
    /// # Errors
    /// Returns every violated constraint as a human-readable message.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        let max_bits = self
            .security
            .max_coeff_modulus_bits(self.poly_modulus_degree);
        if max_bits.is_none() {
            errors.push(format!(
                "Polynomial modulus degree {} must be a power of two in [1024, 32768]",
                self.poly_modulus_degree
            ));
        }

        if self.coeff_modulus_bits.len() < 2 {
            errors.push(format!(
                "Coefficient modulus needs at least 2 primes (data + special), got {}",
                self.coeff_modulus_bits.len()
            ));
        }

        for (i, &bits) in self.coeff_modulus_bits.iter().enumerate() {
            if !(2..=60).contains(&bits) {
                errors.push(format!("Modulus {i} has {bits} bits, expected [2, 60]"));
            }
        }

        let total: u32 = self.coeff_modulus_bits.iter().sum();
        if let Some(max) = max_bits {
            if total > max {
                errors.push(format!(
                    "Coefficient modulus too large: {total} bits > {max} max for {} at degree {}",
                    self.security, self.poly_modulus_degree
                ));
            }
        }

        if self.scale_bits == 0 {
            errors.push("Scale must be at least 2^1".to_string());
        }

        let data = self.data_modulus_bits();
        if let Some(&first) = data.first() {
            if self.scale_bits >= first {
                errors.push(format!(
                    "Scale 2^{} leaves no integer headroom in the first modulus ({first} bits)",
                    self.scale_bits
                ));
            }
        }
        // Rescaling divides by these primes; pinning back to 2^scale_bits is only
        // accurate when they sit just below that power of two.
        for (i, &bits) in data.iter().enumerate().skip(1) {
            if bits != self.scale_bits {
                errors.push(format!(
                    "Intermediate modulus {i} has {bits} bits but scale is 2^{}",
                    self.scale_bits
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
