use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use serde::Serialize;
use tally_core::config::resolve_config;
use tally_core::feed::{JsonSummaryFile, read_events, read_prior_summary};
use tally_core::lock::RunLock;
use tally_core::watermark::FileWatermarkStore;
use tally_core::{Aggregator, UnknownEvent};
use tracing::info;

use crate::Cli;

/// What one invocation did, for `--json` and the one-line summary.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub update: bool,
    pub previous_watermark: Option<i64>,
    pub watermark: Option<i64>,
    pub seeded: usize,
    pub processed: usize,
    pub skipped: usize,
    pub unknown: Vec<UnknownEvent>,
    pub records: usize,
}

/// Execute one aggregation run: lock, load, seed, fold, write, commit.
///
/// # Errors
///
/// Returns an error if config, lock, input, or output handling fails.
pub fn run(cli: &Cli, working_dir: &Path) -> Result<RunReport> {
    let mut config = resolve_config(working_dir, cli.config.as_deref())?;
    if let Some(path) = &cli.watermark_file {
        config.watermark.path.clone_from(path);
    }
    if let Some(order) = cli.order {
        config.events.order = order;
    }
    config.watermark.path = working_dir.join(&config.watermark.path);

    let lock_path = config.lock_path();
    let _lock = RunLock::acquire(&lock_path, config.lock.timeout())
        .with_context(|| format!("failed to lock {}", lock_path.display()))?;

    let store = FileWatermarkStore::new(&config.watermark.path);
    let mut aggregator = Aggregator::from_store(&store, config.events.order)
        .context("failed to load watermark")?;
    let previous_watermark = aggregator.watermark();

    let seeded = if cli.update {
        match read_prior_summary(&cli.output)? {
            Some(records) => aggregator.seed_from_prior_summary(records)?,
            None => {
                info!(output = %cli.output.display(), "no prior summary, starting fresh");
                0
            }
        }
    } else {
        0
    };

    let events = read_events(&cli.input)?;
    let processed = aggregator.process_events(events)?;
    if aggregator.table().is_empty() {
        info!(input = %cli.input.display(), "no activity to summarize");
    }

    let mut sink = JsonSummaryFile::new(&cli.output);
    let persisted = aggregator.flatten_and_persist(&mut sink, &store)?;

    info!(
        processed = processed.processed,
        skipped = processed.skipped,
        unknown = processed.unknown.len(),
        records = persisted.records,
        watermark = ?persisted.watermark,
        "run complete"
    );

    Ok(RunReport {
        input: cli.input.clone(),
        output: cli.output.clone(),
        update: cli.update,
        previous_watermark,
        watermark: persisted.watermark,
        seeded,
        processed: processed.processed,
        skipped: processed.skipped,
        unknown: processed.unknown,
        records: persisted.records,
    })
}

/// Print the run report to stdout.
///
/// # Errors
///
/// Returns an error if the report cannot be serialized.
pub fn print_report(report: &RunReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let watermark = report
        .watermark
        .map_or_else(|| "none".to_string(), |wm| wm.to_string());
    println!(
        "tally: processed={} skipped={} unknown={} seeded={} records={} watermark={}",
        report.processed,
        report.skipped,
        report.unknown.len(),
        report.seeded,
        report.records,
        watermark
    );
    Ok(())
}
