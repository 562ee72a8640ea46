//! Individual records and the population they form.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::statistic::AggregationError;

/// One individual's numeric measurements, keyed by field name.
///
/// Nested source fields use dotted names (`blood_pressure.systolic`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    fields: BTreeMap<String, f64>,
}

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: f64) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn from_fields<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<f64> {
        self.fields.get(field).copied()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// The loaded population. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct RecordSet {
    records: Vec<Record>,
    loaded_at: chrono::DateTime<chrono::Utc>,
}

impl RecordSet {
    #[must_use]
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            loaded_at: chrono::Utc::now(),
        }
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn loaded_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.loaded_at
    }

    /// Extract one field from every record, in record order.
    ///
    /// # Errors
    /// `MissingField` names the first record lacking the field; there is no
    /// default value. `InvalidValue` rejects NaN and infinities.
    pub fn extract(&self, field: &str) -> Result<Vec<f64>, AggregationError> {
        self.records
            .iter()
            .enumerate()
            .map(|(record, r)| match r.get(field) {
                Some(v) if v.is_finite() => Ok(v),
                Some(_) => Err(AggregationError::InvalidValue {
                    field: field.to_string(),
                    record,
                }),
                None => Err(AggregationError::MissingField {
                    field: field.to_string(),
                    record,
                }),
            })
            .collect()
    }
}

impl From<Vec<Record>> for RecordSet {
    fn from(records: Vec<Record>) -> Self {
        Self::new(records)
    }
}
