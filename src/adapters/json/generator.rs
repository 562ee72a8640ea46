//! Synthetic population for demos and load tests.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

const FIRST_NAMES: [&str; 10] = [
    "John", "Jane", "Alice", "Bob", "Carol", "Dave", "Eve", "Frank", "Grace", "Heidi",
];
const LAST_NAMES: [&str; 10] = [
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Miller", "Davis", "Garcia", "Rodriguez",
    "Wilson",
];

/// Probability that an individual carries the disease indicator.
const DISEASE_RATE: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloodPressure {
    pub systolic: u32,
    pub diastolic: u32,
}

/// One generated individual, in the on-disk layout the loader reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    pub id: u64,
    pub name: String,
    pub surname: String,
    pub age: u32,
    pub heart_rate: u32,
    pub blood_pressure: BloodPressure,
    pub cholesterol: u32,
    pub disease_indicator: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Population {
    pub individuals: Vec<Individual>,
}

/// Generates individuals with uniformly drawn measurements.
pub struct PopulationGenerator {
    rng: ChaCha20Rng,
}

impl PopulationGenerator {
    /// A generator seeded from OS entropy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: ChaCha20Rng::from_entropy(),
        }
    }

    /// A reproducible generator.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    pub fn individual(&mut self, id: u64) -> Individual {
        let rng = &mut self.rng;
        Individual {
            id,
            name: FIRST_NAMES[rng.gen_range(0..FIRST_NAMES.len())].to_string(),
            surname: LAST_NAMES[rng.gen_range(0..LAST_NAMES.len())].to_string(),
            age: rng.gen_range(20..70),
            heart_rate: rng.gen_range(60..100),
            blood_pressure: BloodPressure {
                systolic: rng.gen_range(90..150),
                diastolic: rng.gen_range(60..100),
            },
            cholesterol: rng.gen_range(100..300),
            disease_indicator: u8::from(rng.gen_bool(DISEASE_RATE)),
        }
    }

    /// `count` individuals with ids starting at 1.
    pub fn generate(&mut self, count: usize) -> Population {
        Population {
            individuals: (1..=count as u64).map(|id| self.individual(id)).collect(),
        }
    }
}

impl Default for PopulationGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::json::parse_records;

    #[test]
    fn test_ranges() {
        let population = PopulationGenerator::with_seed(11).generate(500);
        assert_eq!(population.individuals.len(), 500);

        for ind in &population.individuals {
            assert!((20..70).contains(&ind.age));
            assert!((60..100).contains(&ind.heart_rate));
            assert!((90..150).contains(&ind.blood_pressure.systolic));
            assert!((60..100).contains(&ind.blood_pressure.diastolic));
            assert!((100..300).contains(&ind.cholesterol));
            assert!(ind.disease_indicator <= 1);
        }

        let diseased = population
            .individuals
            .iter()
            .filter(|i| i.disease_indicator == 1)
            .count();
        assert!((100..200).contains(&diseased), "{diseased} of 500");
    }

    #[test]
    fn test_seed_is_reproducible() {
        let a = PopulationGenerator::with_seed(42).generate(20);
        let b = PopulationGenerator::with_seed(42).generate(20);
        let c = PopulationGenerator::with_seed(43).generate(20);
        assert_eq!(a.individuals, b.individuals);
        assert_ne!(a.individuals, c.individuals);
    }

    #[test]
    fn test_output_loads_back() {
        let population = PopulationGenerator::with_seed(7).generate(10);
        let text = serde_json::to_string_pretty(&population).expect("serialize");
        let records = parse_records(&text).expect("parse");

        assert_eq!(records.len(), 10);
        let first = &records.records()[0];
        assert_eq!(
            first.get("blood_pressure.diastolic"),
            Some(f64::from(population.individuals[0].blood_pressure.diastolic))
        );
        assert_eq!(first.get("id"), None);
        for spec in crate::domain::StatisticSpec::default_suite() {
            for field in &spec.fields {
                assert!(records.extract(field).is_ok(), "{field}");
            }
        }
    }
}
