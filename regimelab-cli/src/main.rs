//! RegimeLab CLI: pipeline runs, model training, and filter inspection.
//!
//! Commands:
//! - `run`: analyze a universe, allocate a portfolio, print the run report
//! - `train`: train regime models and print them as JSON
//! - `filter`: compare adaptive-filter trading against buy-and-hold
//! - `config`: print the effective configuration and its hash
//!
//! Reports go to stdout; logs go to stderr (`RUST_LOG`, or `-v` for debug).

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use regimelab_core::domain::{Instrument, PriceSeries};
use regimelab_runner::data_loader::{load_series, load_universe, synthetic_series};
use regimelab_runner::pipeline::Pipeline;
use regimelab_runner::reporting::{generate_comparison_report, generate_run_report, ArtifactManager};
use regimelab_runner::PipelineConfig;

#[derive(Parser)]
#[command(
    name = "regimelab",
    version,
    about = "RegimeLab CLI: HMM regime strategies, backtests, and portfolio allocation"
)]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Where bars come from: CSV files or the synthetic generator.
#[derive(Args)]
struct DataArgs {
    /// A CSV file, or a directory of `<SYMBOL>.csv` files.
    #[arg(long, conflicts_with = "synthetic")]
    data: Option<PathBuf>,

    /// Generate deterministic synthetic series for these symbols (e.g. AAA,BBB).
    #[arg(long, value_delimiter = ',')]
    synthetic: Vec<String>,

    /// Weekdays per synthetic series.
    #[arg(long, default_value_t = 500)]
    days: usize,

    /// First synthetic date (YYYY-MM-DD).
    #[arg(long, default_value = "2020-01-01")]
    start: String,

    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze every instrument, allocate the portfolio, and print the report.
    Run {
        #[command(flatten)]
        input: DataArgs,

        /// Also write run artifacts (manifest, JSON, Markdown, CSV) here.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Process instruments one at a time.
        #[arg(long, default_value_t = false)]
        sequential: bool,
    },
    /// Train the regime model of each instrument and print it as JSON.
    Train {
        #[command(flatten)]
        input: DataArgs,
    },
    /// Compare adaptive-filter trading against buy-and-hold.
    Filter {
        #[command(flatten)]
        input: DataArgs,
    },
    /// Print the effective configuration as TOML, followed by its hash.
    Config {
        /// Path to a TOML config file. Defaults apply when omitted.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Only validate; print the hash without the TOML body.
        #[arg(long, default_value_t = false)]
        check: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            input,
            out,
            sequential,
        } => run_pipeline_cmd(&input, out.as_deref(), sequential),
        Commands::Train { input } => run_train_cmd(&input),
        Commands::Filter { input } => run_filter_cmd(&input),
        Commands::Config { file, check } => run_config_cmd(file.as_deref(), check),
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn load_input(input: &DataArgs, config: &PipelineConfig) -> Result<Vec<PriceSeries>> {
    if let Some(path) = &input.data {
        if path.is_file() {
            let symbol = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let instrument = config
                .instruments
                .iter()
                .find(|i| i.symbol == symbol)
                .cloned()
                .unwrap_or_else(|| Instrument::new(0, symbol));
            let series = load_series(path, instrument)
                .with_context(|| format!("failed to load {}", path.display()))?;
            return Ok(vec![series]);
        }
        let universe = load_universe(path, &config.instruments)
            .with_context(|| format!("failed to load universe from {}", path.display()))?;
        info!(instruments = universe.len(), dir = %path.display(), "universe loaded");
        return Ok(universe);
    }

    if input.synthetic.is_empty() {
        bail!("one of --data or --synthetic is required");
    }
    let start = NaiveDate::parse_from_str(&input.start, "%Y-%m-%d")
        .with_context(|| format!("invalid --start date '{}'", input.start))?;
    input
        .synthetic
        .iter()
        .enumerate()
        .map(|(i, symbol)| {
            let instrument = config
                .instruments
                .iter()
                .find(|known| &known.symbol == symbol)
                .cloned()
                .unwrap_or_else(|| Instrument::new(i as u32, symbol.clone()));
            synthetic_series(instrument, start, input.days)
                .with_context(|| format!("failed to generate synthetic series for {symbol}"))
        })
        .collect()
}

fn run_pipeline_cmd(input: &DataArgs, out: Option<&Path>, sequential: bool) -> Result<()> {
    let config = load_config(input.config.as_deref())?;
    let universe = load_input(input, &config)?;
    let pipeline = Pipeline::new(config)?.with_parallelism(!sequential);
    let report = pipeline.run(universe)?;

    println!("{}", generate_run_report(&report));

    if let Some(out) = out {
        let manager = ArtifactManager::new(out)?;
        let paths = manager.save_run(&report)?;
        eprintln!("Artifacts saved to: {}", paths.run_dir.display());
    }
    Ok(())
}

fn run_train_cmd(input: &DataArgs) -> Result<()> {
    let config = load_config(input.config.as_deref())?;
    let universe = load_input(input, &config)?;
    let pipeline = Pipeline::new(config)?;

    let mut models = Vec::with_capacity(universe.len());
    for series in universe {
        let symbol = series.instrument.symbol.clone();
        match pipeline.train_instrument(series)? {
            Some(model) => models.push(model),
            None => warn!(symbol = %symbol, "too few bars to train"),
        }
    }

    let json = serde_json::to_string_pretty(&models).context("failed to serialize models")?;
    println!("{json}");
    Ok(())
}

fn run_filter_cmd(input: &DataArgs) -> Result<()> {
    let config = load_config(input.config.as_deref())?;
    let universe = load_input(input, &config)?;
    let pipeline = Pipeline::new(config)?;

    let outcomes = universe
        .iter()
        .map(|series| pipeline.filter_instrument(series))
        .collect::<Result<Vec<_>, _>>()?;
    let report = generate_comparison_report(
        universe.iter().map(|s| &s.instrument).zip(outcomes.iter()),
    );
    println!("{report}");
    Ok(())
}

fn run_config_cmd(file: Option<&Path>, check: bool) -> Result<()> {
    let config = load_config(file)?;
    config.validate().context("invalid configuration")?;
    let hash = config.config_hash()?;
    if !check {
        print!("{}", config.to_toml()?);
    }
    println!("# config_hash = \"{hash}\"");
    Ok(())
}
