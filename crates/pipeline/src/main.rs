//! LEO Handover Pipeline CLI
//!
//! Runs the four-stage core over a validated TLE catalog and writes the
//! canonical run document.
//!
//! Usage:
//!   leo-pipeline --catalog data/catalogs/starlink.tle \
//!                --catalog data/catalogs/oneweb.tle \
//!                --config pipeline.json \
//!                --output runs/latest.json

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use orbital_mechanics::{Constellation, TleRecord};
use pipeline::{Pipeline, PipelineConfig};

#[derive(Parser, Debug)]
#[command(
    name = "leo-pipeline",
    about = "LEO satellite pool analysis pipeline for handover research"
)]
struct Args {
    /// TLE catalog file(s): name line + two element lines per satellite.
    /// Repeat per constellation.
    #[arg(short = 't', long = "catalog", required = true)]
    catalogs: Vec<PathBuf>,

    /// Pipeline configuration JSON (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output document path
    #[arg(short, long, default_value = "run_output.json")]
    output: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    let mut records = Vec::new();
    for path in &args.catalogs {
        let loaded = load_catalog(path)
            .with_context(|| format!("loading catalog {}", path.display()))?;
        info!("Loaded {} satellites from {}", loaded.len(), path.display());
        records.extend(loaded);
    }
    if records.is_empty() {
        bail!("no satellites loaded from the supplied catalogs");
    }

    let pipeline = Pipeline::initialize(config).context("initializing pipeline")?;
    let document = pipeline.run(&records).context("running pipeline")?;

    info!("Writing run document to {}", args.output.display());
    let file = File::create(&args.output)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, &document)?;

    info!("{}", "=".repeat(60));
    info!("RUN SUMMARY");
    info!("{}", "=".repeat(60));
    info!(
        "Satellites: {} succeeded / {} failed (grade {})",
        document.statistics.succeeded, document.statistics.failed, document.statistics.grade
    );
    info!(
        "Pool plan: {} instants, {} coverage gaps, {} distinct satellites",
        document.pool_plan.instants.len(),
        document.pool_plan.coverage_gaps.len(),
        document.pool_plan.distinct_satellites_used
    );
    for (strategy, summary) in &document.pool_plan.strategy_scores {
        info!(
            "  {:12} | score {:.3} | won {}/{} instants",
            strategy,
            summary.mean_configuration_score,
            summary.pools_won,
            summary.pools_generated
        );
    }

    Ok(())
}

/// Read a classical three-line TLE catalog. The constellation tag is
/// inferred from the satellite name; a record that fails validation is
/// skipped with a warning (Stage 1 semantics).
fn load_catalog(path: &PathBuf) -> Result<Vec<TleRecord>> {
    let raw = std::fs::read_to_string(path)?;
    let lines: Vec<&str> = raw
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .collect();

    let mut records = Vec::new();
    let mut cursor = 0usize;
    while cursor + 1 < lines.len() {
        // Name line is optional in some feeds; detect by line-number column
        let (name, line1, line2, consumed) =
            if lines[cursor].starts_with('1') && lines[cursor].len() == 69 {
                ("UNKNOWN", lines[cursor], *lines.get(cursor + 1).unwrap_or(&""), 2)
            } else {
                (
                    lines[cursor],
                    *lines.get(cursor + 1).unwrap_or(&""),
                    *lines.get(cursor + 2).unwrap_or(&""),
                    3,
                )
            };

        if line1.is_empty() || line2.is_empty() {
            break;
        }

        let constellation = Constellation::parse(name);
        match TleRecord::from_lines(name, constellation, line1, line2) {
            Ok(record) => records.push(record),
            Err(e) => warn!("Skipping catalog entry '{name}': {e}"),
        }
        cursor += consumed;
    }

    Ok(records)
}
