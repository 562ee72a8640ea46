//! NTT-friendly prime generation for the modulus chain.

use num_bigint_dig::BigUint;

/// Miller-Rabin rounds on top of the Baillie-PSW check.
const PRIMALITY_ROUNDS: usize = 20;

fn is_probably_prime(candidate: u64) -> bool {
    num_bigint_dig::prime::probably_prime(&BigUint::from(candidate), PRIMALITY_ROUNDS)
}

/// Largest prime `p` with exactly `num_bits` bits, `p < upper_bound` and
/// `p % modulo == 1`.
pub(super) fn generate_prime(num_bits: u32, modulo: u64, upper_bound: u64) -> Option<u64> {
    let lower = 1u64 << (num_bits - 1);
    if modulo == 0 || upper_bound < 2 {
        return None;
    }

    let mut candidate = ((upper_bound - 2) / modulo) * modulo + 1;
    while candidate >= lower {
        if is_probably_prime(candidate) {
            return Some(candidate);
        }
        candidate = candidate.checked_sub(modulo)?;
    }
    None
}

/// One distinct prime per requested bit size, each `≡ 1 mod 2N`.
///
/// # Errors
/// Returns a message when a bit size has no remaining prime in range.
pub(super) fn generate_chain(sizes: &[u32], poly_modulus_degree: usize) -> Result<Vec<u64>, String> {
    let modulo = 2 * poly_modulus_degree as u64;
    let mut primes: Vec<u64> = Vec::with_capacity(sizes.len());

    for &bits in sizes {
        if !(2..=62).contains(&bits) {
            return Err(format!("Cannot generate a {bits}-bit prime"));
        }
        let mut upper_bound = 1u64 << bits;
        loop {
            let p = generate_prime(bits, modulo, upper_bound).ok_or_else(|| {
                format!("Not enough {bits}-bit primes congruent to 1 mod {modulo}")
            })?;
            if primes.contains(&p) {
                upper_bound = p;
            } else {
                primes.push(p);
                break;
            }
        }
    }

    Ok(primes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_primes_are_ntt_friendly_and_distinct() {
        let primes = generate_chain(&[60, 40, 40, 60], 8192).expect("primes exist");
        assert_eq!(primes.len(), 4);

        for (&p, bits) in primes.iter().zip([60u32, 40, 40, 60]) {
            assert_eq!(p % 16384, 1, "{p} is not 1 mod 2N");
            assert_eq!(64 - p.leading_zeros(), bits);
            assert!(is_probably_prime(p));
        }
        assert_ne!(primes[1], primes[2]);
        assert_ne!(primes[0], primes[3]);
        assert!(primes[2] < primes[1]);
    }

    #[test]
    fn test_small_known_prime() {
        // 113 = 7 * 16 + 1 is the largest 7-bit prime that is 1 mod 16.
        assert_eq!(generate_prime(7, 16, 128), Some(113));
        assert_eq!(generate_prime(7, 16, 113), Some(97));
    }

    #[test]
    fn test_exhausted_range() {
        // No 3-bit number is 1 mod 64.
        assert_eq!(generate_prime(3, 64, 8), None);
        assert!(generate_chain(&[3], 32).is_err());
    }
}
