//! Report adapter: Renders statistic outcomes for the command line.
//!
//! Text output is one line per statistic, `label: value` with four decimals
//! or `label: FAILED (reason)`. JSON output is an array of objects carrying
//! `label` plus either `kind`/`value` or `error`.

use std::fmt::Write as _;

use serde::Serialize;

use crate::domain::{StatisticFailure, StatisticOutcome};

/// One entry of the JSON report.
#[derive(Debug, Serialize)]
pub struct ReportLine<'a> {
    pub label: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<'a> From<&'a StatisticOutcome> for ReportLine<'a> {
    fn from(outcome: &'a StatisticOutcome) -> Self {
        match outcome {
            Ok(result) => Self {
                label: &result.label,
                kind: Some(result.kind.as_str()),
                value: Some(result.value),
                error: None,
            },
            Err(failure) => Self {
                label: &failure.label,
                kind: None,
                value: None,
                error: Some(failure.error.to_string()),
            },
        }
    }
}

#[must_use]
pub fn render_text(outcomes: &[StatisticOutcome]) -> String {
    let mut out = String::new();
    for outcome in outcomes {
        // Writing into a String cannot fail.
        let _ = match outcome {
            Ok(result) => writeln!(out, "{}: {:.4}", result.label, result.value),
            Err(failure) => writeln!(out, "{}: FAILED ({})", failure.label, failure.error),
        };
    }
    out
}

/// # Errors
/// Propagates serializer failures.
pub fn render_json(outcomes: &[StatisticOutcome]) -> Result<String, serde_json::Error> {
    let lines: Vec<ReportLine<'_>> = outcomes.iter().map(ReportLine::from).collect();
    serde_json::to_string_pretty(&lines)
}

/// The first failure that must abort the whole run, if any.
#[must_use]
pub fn fatal_failure(outcomes: &[StatisticOutcome]) -> Option<&StatisticFailure> {
    outcomes
        .iter()
        .filter_map(|o| o.as_ref().err())
        .find(|failure| failure.error.is_fatal())
}
