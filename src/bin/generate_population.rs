//! Synthetic population generator for demo runs.
//!
//! Writes `{"individuals": [...]}` with random ages, heart rates, blood
//! pressures, cholesterol levels and disease indicators.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin generate_population -- [--count <n>] [--seed <u64>] [--out <path>] [--force]
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use cohortseal::adapters::json::PopulationGenerator;

const USAGE: &str =
    "Usage: generate_population [--count <n>] [--seed <u64>] [--out <path>] [--force]";
const DEFAULT_COUNT: usize = 50;
const DEFAULT_OUT: &str = "data/individuals.json";

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let mut count = DEFAULT_COUNT;
    let mut seed: Option<u64> = None;
    let mut out = PathBuf::from(DEFAULT_OUT);
    let mut force = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--count" => {
                let value = args.next().unwrap_or_default();
                count = value
                    .parse()
                    .with_context(|| format!("--count expects a number, got '{value}'\n{USAGE}"))?;
            }
            "--seed" => {
                let value = args.next().unwrap_or_default();
                seed = Some(
                    value
                        .parse()
                        .with_context(|| format!("--seed expects a u64, got '{value}'\n{USAGE}"))?,
                );
            }
            "--out" => match args.next() {
                Some(path) if !path.is_empty() => out = PathBuf::from(path),
                _ => bail!("--out needs a path\n{USAGE}"),
            },
            "--force" => force = true,
            "-h" | "--help" => {
                println!("{USAGE}\n\nDefaults: {DEFAULT_COUNT} individuals written to {DEFAULT_OUT}.");
                return Ok(());
            }
            _ => bail!("Unknown arg: {arg}\n{USAGE}"),
        }
    }

    if out.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", out.display());
    }
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }

    let mut generator = match seed {
        Some(seed) => PopulationGenerator::with_seed(seed),
        None => PopulationGenerator::new(),
    };
    let population = generator.generate(count);

    let json = serde_json::to_string_pretty(&population)?;
    std::fs::write(&out, json).with_context(|| format!("cannot write {}", out.display()))?;

    println!("Generated data for {count} individuals in {}.", out.display());
    Ok(())
}
