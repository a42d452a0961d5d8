//! mmflow simulator
//!
//! Runs population feedback scenarios and prints their trajectories.

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use mmflow_core::ScenarioConfig;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// mmflow-sim - max-min fair population feedback simulator
#[derive(Parser, Debug)]
#[command(name = "mmflow-sim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Scenario files (TOML); runs the built-in scenario when omitted
    scenarios: Vec<PathBuf>,

    /// Override the number of rounds of every scenario
    #[arg(long)]
    rounds: Option<u32>,

    /// Report format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log level (defaults to the first scenario's [logging] level)
    #[arg(long)]
    log_level: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let configs = if args.scenarios.is_empty() {
        vec![ScenarioConfig::default()]
    } else {
        args.scenarios
            .iter()
            .map(|path| {
                ScenarioConfig::from_file(path)
                    .with_context(|| format!("loading scenario {}", path.display()))
            })
            .collect::<anyhow::Result<Vec<_>>>()?
    };

    // Initialize logging
    let level = if args.verbose {
        "debug".to_string()
    } else {
        args.log_level
            .clone()
            .unwrap_or_else(|| configs[0].logging.level.clone())
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    info!("Starting mmflow-sim v{}", env!("CARGO_PKG_VERSION"));

    let results = mmflow_sim::run_scenarios(configs, args.rounds).await;

    let mut reports = Vec::with_capacity(results.len());
    for (index, result) in results.into_iter().enumerate() {
        match result {
            Ok(report) => reports.push(report),
            Err(e) => bail!("scenario {} failed: {}", index, e),
        }
    }

    let rendered = match args.format {
        Format::Text => reports
            .iter()
            .map(|r| r.render_text())
            .collect::<Vec<_>>()
            .join("\n"),
        Format::Json => serde_json::to_string_pretty(&reports)?,
    };

    match &args.output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("writing report to {}", path.display()))?;
            info!(path = %path.display(), "Report written");
        }
        None => println!("{}", rendered),
    }

    Ok(())
}
