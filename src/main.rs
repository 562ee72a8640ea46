//! Cohortseal: Encrypted population statistics
//!
//! Loads a record file, encrypts every requested field and prints the
//! decrypted aggregates.
//!
//! # Usage
//!
//! ```bash
//! cohortseal --data <path> [--stat <label>=<kind>:<field>[,<field>...]]... [--json]
//! ```
//!
//! Without `--stat` the default health-analysis suite runs.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cohortseal::adapters::ckks_sim::SimulatedCkksEngine;
use cohortseal::adapters::json::load_records;
use cohortseal::adapters::report::{fatal_failure, render_json, render_text};
use cohortseal::adapters::sanitize::SanitizingMakeWriter;
use cohortseal::{AggregationPipeline, PipelineConfig, StatisticSpec};

const USAGE: &str = "Usage: cohortseal --data <path> [--stat <label>=<kind>:<fields>]... [--json]

Kinds: sum, mean, percent, variance, covariance (two fields),
       weighted (terms written field*weight).
Example: --stat \"Average Age=mean:age\" --stat \"Risk=weighted:age*0.3,cholesterol*0.7\"

Environment: COHORTSEAL_POLY_DEGREE, COHORTSEAL_COEFF_BITS, COHORTSEAL_SCALE_BITS,
             COHORTSEAL_SECURITY_BITS, COHORTSEAL_PARALLEL, COHORTSEAL_LOG_FILE, RUST_LOG";

struct Args {
    data: PathBuf,
    specs: Vec<StatisticSpec>,
    json: bool,
}

fn usage_error(message: &str) -> ! {
    eprintln!("{message}\n\n{USAGE}");
    std::process::exit(2);
}

fn parse_args() -> Args {
    let mut args = std::env::args().skip(1);
    let mut data = None;
    let mut specs = Vec::new();
    let mut json = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--data" => match args.next() {
                Some(path) if !path.is_empty() => data = Some(PathBuf::from(path)),
                _ => usage_error("--data needs a path"),
            },
            "--stat" => {
                let raw = args.next().unwrap_or_default();
                match raw.parse::<StatisticSpec>() {
                    Ok(spec) => specs.push(spec),
                    Err(e) => usage_error(&e.to_string()),
                }
            }
            "--json" => json = true,
            "-h" | "--help" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            _ => usage_error(&format!("Unknown arg: {arg}")),
        }
    }

    let data = data.unwrap_or_else(|| usage_error("--data is required"));
    if specs.is_empty() {
        specs = StatisticSpec::default_suite();
    }
    Args { data, specs, json }
}

/// Install the sanitizing subscriber. Logs go to stderr so stdout carries
/// only results, or to `COHORTSEAL_LOG_FILE` when set.
fn init_logging() -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let (writer, guard) = match std::env::var("COHORTSEAL_LOG_FILE") {
        Ok(log_file) if !log_file.is_empty() => {
            if let Some(parent) = std::path::Path::new(&log_file).parent() {
                // Best-effort: a missing directory surfaces on open below.
                let _ = std::fs::create_dir_all(parent);
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_file)
                .with_context(|| format!("cannot open log file {log_file}"))?;
            tracing_appender::non_blocking(file)
        }
        _ => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(SanitizingMakeWriter::new(writer)),
        )
        .init();

    Ok(guard)
}

fn main() -> Result<()> {
    let args = parse_args();
    let _guard = init_logging()?;

    tracing::info!("Starting Cohortseal...");

    let config = PipelineConfig::from_env_or_default();
    // Invalid parameters abort the run before any key exists.
    let engine = SimulatedCkksEngine::new(config.params.clone())
        .context("encryption parameters are not valid")?;
    tracing::warn!("Using the simulated CKKS engine: results are not confidential");

    let records = load_records(&args.data)?;
    let pipeline = AggregationPipeline::new(std::sync::Arc::new(engine), config.strategy())?;
    let outcomes = pipeline.run(&records, &args.specs);

    if let Some(failure) = fatal_failure(&outcomes) {
        bail!("run aborted: {failure}");
    }

    if args.json {
        println!("{}", render_json(&outcomes)?);
    } else {
        print!("{}", render_text(&outcomes));
    }

    let failed = outcomes.iter().filter(|o| o.is_err()).count();
    tracing::info!(
        "Cohortseal finished: {} succeeded, {failed} failed.",
        outcomes.len() - failed
    );
    Ok(())
}
