#![forbid(unsafe_code)]

mod run;

use clap::Parser;
use std::env;
use std::path::PathBuf;
use tally_core::EventOrder;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Aggregate user activity events into daily per-user summary reports",
    long_about = "Aggregate user activity events into daily per-user summary reports.\n\n\
        Only events newer than the persisted watermark are processed, so the same \
        input can be fed repeatedly without double counting.",
    after_help = "EXAMPLES:\n    # Build a fresh summary\n    tally -i events.json -o summary.json\n\n    # Fold new events into an existing summary\n    tally -i events.json -o summary.json --update\n\n    # Emit a machine-readable run report\n    tally -i events.json -o summary.json --update --json"
)]
pub struct Cli {
    /// Input JSON file path (array of events).
    #[arg(short, long, value_name = "PATH")]
    pub input: PathBuf,

    /// Output JSON file path (array of summary records).
    #[arg(short, long, value_name = "PATH")]
    pub output: PathBuf,

    /// Update existing summary reports with new events.
    #[arg(long)]
    pub update: bool,

    /// Watermark file (overrides config).
    #[arg(long, value_name = "PATH")]
    pub watermark_file: Option<PathBuf>,

    /// Config file (defaults to ./tally.toml when present).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Order in which events are folded (overrides config).
    #[arg(long, value_name = "ORDER", value_parser = parse_order)]
    pub order: Option<EventOrder>,

    /// Emit a JSON run report instead of a one-line summary.
    #[arg(long)]
    pub json: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_order(raw: &str) -> Result<EventOrder, String> {
    raw.parse()
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("TALLY_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "tally=debug,tally_core=debug,info"
        } else {
            "tally=info,tally_core=info,warn"
        })
    });

    let format = env::var("TALLY_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let working_dir = env::current_dir()?;
    let report = run::run(&cli, &working_dir)?;
    run::print_report(&report, cli.json)
}
