//! Run configuration from environment overrides.

use crate::domain::{SchemeParameters, SecurityLevel};

use super::accumulator::FoldStrategy;

/// Scheme parameters plus execution mode for one run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineConfig {
    pub params: SchemeParameters,
    pub parallel: bool,
}

impl PipelineConfig {
    /// Defaults overridden by `COHORTSEAL_*` environment variables.
    ///
    /// Unparseable values are ignored and the default is kept; range checks
    /// happen later in `SchemeParameters::validate`.
    #[must_use]
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(degree) = lookup("COHORTSEAL_POLY_DEGREE").and_then(|v| v.trim().parse().ok())
        {
            config.params.poly_modulus_degree = degree;
        }
        if let Some(bits) = lookup("COHORTSEAL_COEFF_BITS").and_then(|v| parse_bit_list(&v)) {
            config.params.coeff_modulus_bits = bits;
        }
        if let Some(scale) = lookup("COHORTSEAL_SCALE_BITS").and_then(|v| v.trim().parse().ok()) {
            config.params.scale_bits = scale;
        }
        if let Some(security) = lookup("COHORTSEAL_SECURITY_BITS")
            .and_then(|v| v.trim().parse().ok())
            .and_then(SecurityLevel::from_bits)
        {
            config.params.security = security;
        }
        if let Some(parallel) = lookup("COHORTSEAL_PARALLEL").and_then(|v| parse_flag(&v)) {
            config.parallel = parallel;
        }

        config
    }

    #[must_use]
    pub fn strategy(&self) -> FoldStrategy {
        if self.parallel {
            FoldStrategy::Tree
        } else {
            FoldStrategy::Sequential
        }
    }
}

fn parse_bit_list(value: &str) -> Option<Vec<u32>> {
    let bits = value
        .split(',')
        .map(|b| b.trim().parse::<u32>().ok())
        .collect::<Option<Vec<_>>>()?;
    (!bits.is_empty()).then_some(bits)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> PipelineConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        PipelineConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults_without_overrides() {
        let config = config_from(&[]);
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.strategy(), FoldStrategy::Sequential);
    }

    #[test]
    fn test_overrides_apply() {
        let config = config_from(&[
            ("COHORTSEAL_POLY_DEGREE", "16384"),
            ("COHORTSEAL_COEFF_BITS", "60, 40, 40, 40, 60"),
            ("COHORTSEAL_SCALE_BITS", "40"),
            ("COHORTSEAL_SECURITY_BITS", "192"),
            ("COHORTSEAL_PARALLEL", "yes"),
        ]);
        assert_eq!(config.params.poly_modulus_degree, 16384);
        assert_eq!(config.params.coeff_modulus_bits, vec![60, 40, 40, 40, 60]);
        assert_eq!(config.params.security, SecurityLevel::Bits192);
        assert_eq!(config.params.top_level(), 3);
        assert_eq!(config.strategy(), FoldStrategy::Tree);
    }

    #[test]
    fn test_invalid_values_are_ignored() {
        let config = config_from(&[
            ("COHORTSEAL_POLY_DEGREE", "lots"),
            ("COHORTSEAL_COEFF_BITS", "60,forty,60"),
            ("COHORTSEAL_SECURITY_BITS", "100"),
            ("COHORTSEAL_PARALLEL", "maybe"),
        ]);
        assert_eq!(config, PipelineConfig::default());
    }
}
