use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use glidepath::commands::{self, RunOptions};
use glidepath::scenario::AssumptionRef;
use glidepath::{DataDirectory, init_logging};
use glidepath_core::analysis::StreamingOptions;
use glidepath_core::optimization::RiskBand;
use glidepath_core::service::AssumptionCache;
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "glidepath")]
#[command(about = "Monte Carlo projections and portfolio construction for household investors")]
struct Args {
    /// Path to the data directory (default: platform data dir/glidepath)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Mirror log output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write the JSON report here instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the data directory with baseline assumptions and an example scenario
    Init,
    /// Simulate a scenario (file path or name in the scenarios directory)
    Simulate {
        scenario: String,
        /// Override the scenario's number of paths
        #[arg(long)]
        paths: Option<usize>,
        /// Cancel the run after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Use streaming analytics above this many paths
        #[arg(long)]
        streaming_threshold: Option<usize>,
    },
    /// Efficient frontier and maximum-Sharpe portfolio
    Frontier {
        #[arg(long, default_value = "us_baseline")]
        assumptions: String,
        /// Assumption set version (default: latest)
        #[arg(long)]
        version: Option<u32>,
        #[arg(long, default_value_t = 20)]
        points: usize,
        /// Risk-free rate for the tangency portfolio
        #[arg(long)]
        risk_free_rate: Option<f64>,
    },
    /// Age- and risk-banded model portfolio
    Portfolio {
        #[arg(long, default_value = "moderate")]
        band: RiskBand,
        #[arg(long)]
        age: u32,
        /// Map each asset class to a fund, weighing cost (1.0) against
        /// tracking (0.0)
        #[arg(long)]
        cost_sensitivity: Option<f64>,
    },
    /// List available assumption sets
    Assumptions,
}

fn emit<T: Serialize>(report: &T, output: Option<&PathBuf>) -> color_eyre::Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    match output {
        Some(path) => {
            fs::write(path, json)?;
            tracing::info!(path = %path.display(), "report written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let data = DataDirectory::new(args.data_dir.unwrap_or_else(DataDirectory::default_path));
    let _guard = init_logging(data.root(), &args.log_level, args.verbose)?;
    let output = args.output.as_ref();

    match args.command {
        Command::Init => {
            let created = data.seed_defaults()?;
            for path in &created {
                eprintln!("created {}", path.display());
            }
            if created.is_empty() {
                eprintln!("{} is already initialized", data.root().display());
            }
        }
        Command::Simulate {
            scenario,
            paths,
            timeout_secs,
            streaming_threshold,
        } => {
            let scenario = data.load_scenario(&scenario)?;
            let cache = AssumptionCache::new(data.load_store()?);
            let mut streaming = StreamingOptions::default();
            if let Some(threshold) = streaming_threshold {
                streaming.threshold = threshold;
            }
            let options = RunOptions {
                paths,
                timeout: timeout_secs.map(Duration::from_secs),
                streaming,
            };
            emit(&commands::simulate(&cache, &scenario, &options)?, output)?;
        }
        Command::Frontier {
            assumptions,
            version,
            points,
            risk_free_rate,
        } => {
            let cache = AssumptionCache::new(data.load_store()?);
            let reference = AssumptionRef {
                name: assumptions,
                version,
            };
            emit(&commands::frontier(&cache, &reference, points, risk_free_rate)?, output)?;
        }
        Command::Portfolio {
            band,
            age,
            cost_sensitivity,
        } => {
            emit(&commands::portfolio(band, age, cost_sensitivity)?, output)?;
        }
        Command::Assumptions => {
            emit(&commands::list_assumptions(&data.load_store()?)?, output)?;
        }
    }

    tracing::info!("glidepath finished");
    Ok(())
}
