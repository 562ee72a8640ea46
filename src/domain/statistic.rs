//! Statistic requests, their results, and the aggregation error taxonomy.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::crypto::CryptoError;

/// Errors raised while computing one statistic.
///
/// Only `InvalidParameters` aborts a whole run; every other variant is
/// reported against the statistic that raised it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AggregationError {
    #[error("Invalid scheme parameters: {0}")]
    InvalidParameters(String),

    #[error("Invalid statistic request: {0}")]
    InvalidSpec(String),

    #[error("Cannot aggregate an empty input")]
    EmptyInput,

    #[error("Division by zero: count must be positive")]
    DivisionByZero,

    #[error("Record {record} has no field '{field}'")]
    MissingField { field: String, record: usize },

    #[error("Record {record} has a non-finite value for '{field}'")]
    InvalidValue { field: String, record: usize },

    #[error("Series lengths differ: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("Level mismatch: {left} vs {right}")]
    LevelMismatch { left: usize, right: usize },

    #[error("Scale mismatch: {left} vs {right}")]
    ScaleMismatch { left: f64, right: f64 },

    #[error("Modulus chain exhausted: {required} level(s) required, {available} remaining")]
    LevelExhausted { available: usize, required: usize },

    #[error(transparent)]
    Crypto(CryptoError),
}

impl AggregationError {
    /// Whether the error must abort the whole run rather than one statistic.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidParameters(_))
    }
}

impl From<CryptoError> for AggregationError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::LevelExhausted(level) => Self::LevelExhausted {
                available: level,
                required: level + 1,
            },
            CryptoError::LevelMismatch { left, right } => Self::LevelMismatch { left, right },
            CryptoError::ScaleMismatch { left, right } => Self::ScaleMismatch { left, right },
            other => Self::Crypto(other),
        }
    }
}

/// The aggregation a statistic performs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StatisticKind {
    Sum,
    Mean,
    Variance,
    Covariance,
    /// Mean of a per-record weighted sum of several fields.
    WeightedMean { weights: Vec<f64> },
}

impl StatisticKind {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Variance => "variance",
            Self::Covariance => "covariance",
            Self::WeightedMean { .. } => "weighted_mean",
        }
    }

    /// Multiply + rescale steps consumed from a fresh ciphertext.
    #[must_use]
    pub fn required_levels(&self) -> usize {
        match self {
            Self::Sum => 0,
            Self::Mean => 1,
            Self::Variance | Self::Covariance | Self::WeightedMean { .. } => 2,
        }
    }

    fn expected_fields(&self) -> usize {
        match self {
            Self::Sum | Self::Mean | Self::Variance => 1,
            Self::Covariance => 2,
            Self::WeightedMean { weights } => weights.len(),
        }
    }
}

/// Plaintext post-processing applied to a decoded result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PostScale {
    #[default]
    Identity,
    /// Multiply by 100 (indicator mean → prevalence percentage).
    Percent,
    Factor(f64),
}

impl PostScale {
    #[must_use]
    pub fn apply(self, value: f64) -> f64 {
        match self {
            Self::Identity => value,
            Self::Percent => value * 100.0,
            Self::Factor(f) => value * f,
        }
    }
}

/// A request for one statistic over one or more fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticSpec {
    pub label: String,
    pub fields: Vec<String>,
    pub kind: StatisticKind,
    #[serde(default)]
    pub post_scale: PostScale,
}

impl StatisticSpec {
    fn single(label: impl Into<String>, field: impl Into<String>, kind: StatisticKind) -> Self {
        Self {
            label: label.into(),
            fields: vec![field.into()],
            kind,
            post_scale: PostScale::Identity,
        }
    }

    pub fn sum(label: impl Into<String>, field: impl Into<String>) -> Self {
        Self::single(label, field, StatisticKind::Sum)
    }

    pub fn mean(label: impl Into<String>, field: impl Into<String>) -> Self {
        Self::single(label, field, StatisticKind::Mean)
    }

    /// Mean of a 0/1 indicator, reported as a percentage.
    pub fn prevalence(label: impl Into<String>, field: impl Into<String>) -> Self {
        Self::single(label, field, StatisticKind::Mean).with_post_scale(PostScale::Percent)
    }

    pub fn variance(label: impl Into<String>, field: impl Into<String>) -> Self {
        Self::single(label, field, StatisticKind::Variance)
    }

    pub fn covariance(
        label: impl Into<String>,
        first: impl Into<String>,
        second: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            fields: vec![first.into(), second.into()],
            kind: StatisticKind::Covariance,
            post_scale: PostScale::Identity,
        }
    }

    pub fn weighted_mean(label: impl Into<String>, terms: &[(&str, f64)]) -> Self {
        Self {
            label: label.into(),
            fields: terms.iter().map(|(f, _)| (*f).to_string()).collect(),
            kind: StatisticKind::WeightedMean {
                weights: terms.iter().map(|(_, w)| *w).collect(),
            },
            post_scale: PostScale::Identity,
        }
    }

    #[must_use]
    pub fn with_post_scale(mut self, post_scale: PostScale) -> Self {
        self.post_scale = post_scale;
        self
    }

    /// Check field arity against the kind.
    ///
    /// # Errors
    /// Returns `InvalidSpec` describing the mismatch.
    pub fn validate(&self) -> Result<(), AggregationError> {
        let expected = self.kind.expected_fields();
        if expected == 0 {
            return Err(AggregationError::InvalidSpec(format!(
                "'{}': weighted mean needs at least one term",
                self.label
            )));
        }
        if self.fields.len() != expected {
            return Err(AggregationError::InvalidSpec(format!(
                "'{}': {} expects {expected} field(s), got {}",
                self.label,
                self.kind.name(),
                self.fields.len()
            )));
        }
        if let StatisticKind::WeightedMean { weights } = &self.kind {
            if let Some(w) = weights.iter().find(|w| !w.is_finite()) {
                return Err(AggregationError::InvalidSpec(format!(
                    "'{}': weight {w} is not finite",
                    self.label
                )));
            }
        }
        Ok(())
    }

    /// The statistics the health-analysis report computes by default.
    #[must_use]
    pub fn default_suite() -> Vec<Self> {
        vec![
            Self::mean("Average Age", "age"),
            Self::mean("Average Heart Rate", "heart_rate"),
            Self::mean("Average Cholesterol Level", "cholesterol"),
            Self::mean("Average Systolic Blood Pressure", "blood_pressure.systolic"),
            Self::mean("Average Diastolic Blood Pressure", "blood_pressure.diastolic"),
            Self::prevalence("Disease Prevalence (%)", "disease_indicator"),
            Self::variance("Variance of Age", "age"),
            Self::covariance("Covariance between Age and Cholesterol", "age", "cholesterol"),
            Self::weighted_mean(
                "Average Risk Score",
                &[
                    ("age", 0.3),
                    ("cholesterol", 0.4),
                    ("blood_pressure.systolic", 0.3),
                ],
            ),
        ]
    }
}

/// Parses the command-line form `label=kind:field[,field...]`.
///
/// Kinds: `sum`, `mean`, `percent`, `variance`, `covariance`, `weighted`.
/// Weighted terms are written `field*weight`, e.g.
/// `Risk=weighted:age*0.3,cholesterol*0.7`.
impl FromStr for StatisticSpec {
    type Err = AggregationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |msg: &str| AggregationError::InvalidSpec(format!("{msg}: '{s}'"));

        let (label, rest) = s
            .split_once('=')
            .ok_or_else(|| invalid("expected label=kind:fields"))?;
        let (kind, fields) = rest
            .split_once(':')
            .ok_or_else(|| invalid("expected kind:fields after '='"))?;
        let label = label.trim();
        if label.is_empty() {
            return Err(invalid("empty label"));
        }
        let fields: Vec<&str> = fields
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .collect();
        if fields.is_empty() {
            return Err(invalid("no fields given"));
        }

        let spec = match kind.trim() {
            "sum" => Self::sum(label, fields[0]),
            "mean" => Self::mean(label, fields[0]),
            "percent" => Self::prevalence(label, fields[0]),
            "variance" => Self::variance(label, fields[0]),
            "covariance" => Self::covariance(label, fields[0], *fields.get(1).unwrap_or(&"")),
            "weighted" => {
                let mut terms = Vec::with_capacity(fields.len());
                for term in &fields {
                    let (field, weight) = term
                        .split_once('*')
                        .ok_or_else(|| invalid("weighted terms are field*weight"))?;
                    let weight: f64 = weight
                        .trim()
                        .parse()
                        .map_err(|_| invalid("weight is not a number"))?;
                    terms.push((field.trim(), weight));
                }
                Self::weighted_mean(label, &terms)
            }
            other => return Err(invalid(&format!("unknown kind '{other}'"))),
        };

        // Catch surplus fields for single-field kinds.
        let arity_ok = match &spec.kind {
            StatisticKind::Covariance => fields.len() == 2,
            StatisticKind::WeightedMean { .. } => true,
            _ => fields.len() == 1,
        };
        if !arity_ok {
            return Err(invalid("wrong number of fields for kind"));
        }

        Ok(spec)
    }
}

/// A successfully computed, decrypted statistic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationResult {
    pub label: String,
    pub kind: String,
    pub value: f64,
    pub computed_at: chrono::DateTime<chrono::Utc>,
}

impl AggregationResult {
    #[must_use]
    pub fn new(label: impl Into<String>, kind: &StatisticKind, value: f64) -> Self {
        Self {
            label: label.into(),
            kind: kind.name().to_string(),
            value,
            computed_at: chrono::Utc::now(),
        }
    }
}

/// A statistic that could not be computed, with the reason.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{label}: {error}")]
pub struct StatisticFailure {
    pub label: String,
    pub error: AggregationError,
}

/// Per-statistic outcome of a run.
pub type StatisticOutcome = Result<AggregationResult, StatisticFailure>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mean() {
        let spec: StatisticSpec = "Average Age=mean:age".parse().expect("valid spec");
        assert_eq!(spec, StatisticSpec::mean("Average Age", "age"));
    }

    #[test]
    fn test_parse_percent_sets_post_scale() {
        let spec: StatisticSpec = "prev=percent:disease_indicator".parse().expect("valid");
        assert_eq!(spec.kind, StatisticKind::Mean);
        assert_eq!(spec.post_scale, PostScale::Percent);
    }

    #[test]
    fn test_parse_covariance_and_weighted() {
        let cov: StatisticSpec = "c=covariance:age, cholesterol".parse().expect("valid");
        assert_eq!(cov.fields, vec!["age", "cholesterol"]);

        let risk: StatisticSpec = "risk=weighted:age*0.3,cholesterol*0.7"
            .parse()
            .expect("valid");
        assert_eq!(
            risk.kind,
            StatisticKind::WeightedMean {
                weights: vec![0.3, 0.7]
            }
        );
        assert!(risk.validate().is_ok());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("no-equals".parse::<StatisticSpec>().is_err());
        assert!("x=median:age".parse::<StatisticSpec>().is_err());
        assert!("x=mean:age,cholesterol".parse::<StatisticSpec>().is_err());
        assert!("x=covariance:age".parse::<StatisticSpec>().is_err());
        assert!("x=weighted:age".parse::<StatisticSpec>().is_err());
        assert!("x=weighted:0.3,0.7".parse::<StatisticSpec>().is_err());
        assert!("=mean:age".parse::<StatisticSpec>().is_err());
    }

    #[test]
    fn test_validate_arity() {
        let mut spec = StatisticSpec::covariance("c", "a", "b");
        assert!(spec.validate().is_ok());
        spec.fields.pop();
        assert!(matches!(
            spec.validate(),
            Err(AggregationError::InvalidSpec(_))
        ));
        assert!(StatisticSpec::weighted_mean("w", &[]).validate().is_err());
    }

    #[test]
    fn test_required_levels() {
        assert_eq!(StatisticKind::Sum.required_levels(), 0);
        assert_eq!(StatisticKind::Mean.required_levels(), 1);
        assert_eq!(StatisticKind::Variance.required_levels(), 2);
        assert_eq!(StatisticKind::Covariance.required_levels(), 2);
    }

    #[test]
    fn test_post_scale() {
        assert_eq!(PostScale::Identity.apply(0.4), 0.4);
        assert!((PostScale::Percent.apply(0.4) - 40.0).abs() < 1e-12);
        assert_eq!(PostScale::Factor(2.0).apply(3.0), 6.0);
    }

    #[test]
    fn test_crypto_level_errors_map_to_pipeline_errors() {
        let err: AggregationError = CryptoError::LevelExhausted(0).into();
        assert_eq!(
            err,
            AggregationError::LevelExhausted {
                available: 0,
                required: 1
            }
        );
        let err: AggregationError = CryptoError::Decryption("x".into()).into();
        assert!(matches!(err, AggregationError::Crypto(_)));
        assert!(!err.is_fatal());
        assert!(AggregationError::InvalidParameters("bad".into()).is_fatal());
    }

    #[test]
    fn test_default_suite_is_valid() {
        let suite = StatisticSpec::default_suite();
        assert_eq!(suite.len(), 9);
        assert!(suite.iter().all(|s| s.validate().is_ok()));
    }
}
