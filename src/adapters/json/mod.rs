//! JSON adapter: Record loading and synthetic population generation.
//!
//! Input files look like `{"individuals": [{...}, ...]}`. Each individual is
//! flattened into numeric fields:
//! - nested objects become dotted names (`blood_pressure.systolic`)
//! - booleans become 0/1
//! - strings, nulls and arrays are not measurements and are dropped, as is
//!   the top-level `id`

mod generator;

pub use generator::{BloodPressure, Individual, Population, PopulationGenerator};

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::domain::{Record, RecordSet};

/// Key holding the record array.
pub const INDIVIDUALS_KEY: &str = "individuals";

/// Error type for record loading.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unexpected document shape: {0}")]
    Shape(String),
}

/// Load a record set from a JSON file.
///
/// # Errors
/// `Io` if the file cannot be read, `Parse`/`Shape` for malformed content.
pub fn load_records(path: &Path) -> Result<RecordSet, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let records = parse_records(&text)?;
    tracing::info!(
        loaded_at = %records.loaded_at().to_rfc3339(),
        "Loaded {} record(s)",
        records.len()
    );
    Ok(records)
}

/// Parse a record set from JSON text.
///
/// # Errors
/// `Parse` for invalid JSON, `Shape` when the `individuals` array is missing
/// or one of its entries is not an object.
pub fn parse_records(text: &str) -> Result<RecordSet, LoadError> {
    let document: Value = serde_json::from_str(text)?;
    let individuals = document
        .get(INDIVIDUALS_KEY)
        .and_then(Value::as_array)
        .ok_or_else(|| LoadError::Shape(format!("expected an '{INDIVIDUALS_KEY}' array")))?;

    let records = individuals
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let object = entry
                .as_object()
                .ok_or_else(|| LoadError::Shape(format!("individual {i} is not an object")))?;
            Ok(flatten(object))
        })
        .collect::<Result<Vec<_>, LoadError>>()?;

    Ok(RecordSet::new(records))
}

fn flatten(object: &Map<String, Value>) -> Record {
    let mut fields = Vec::new();
    for (key, value) in object {
        if key == "id" {
            continue;
        }
        collect(key.clone(), value, &mut fields);
    }
    Record::from_fields(fields)
}

fn collect(name: String, value: &Value, out: &mut Vec<(String, f64)>) {
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_f64() {
                out.push((name, v));
            }
        }
        Value::Bool(b) => out.push((name, if *b { 1.0 } else { 0.0 })),
        Value::Object(inner) => {
            for (key, nested) in inner {
                collect(format!("{name}.{key}"), nested, out);
            }
        }
        Value::String(_) | Value::Array(_) | Value::Null => {}
    }
}
