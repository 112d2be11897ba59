//! MarketLab CLI: autonomous research runs and direct tool calls.
//!
//! Commands:
//! - `run`: one orchestration run (plan, execute, reflect, report)
//! - `schedule`: run once a day at a local wall-clock time
//! - `screen` / `analyze` / `backtest` / `optimize`: call a single tool
//! - `reports list` / `reports show`: browse persisted runs

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use marketlab_core::optimizer::GridSpec;
use marketlab_runner::logging::{self, RunLogSink};
use marketlab_runner::schedule::{parse_hhmm, wait_until_next, DEFAULT_RUN_TIME};
use marketlab_runner::tools::engine_for;
use marketlab_runner::{
    AgentConfig, DataMode, HttpTools, LocalTools, OllamaPlanner, Orchestrator, ReportStore,
    RunMemory, RunReport, Tools,
};

#[derive(Parser)]
#[command(
    name = "marketlab",
    about = "MarketLab: autonomous market research agent (educational, not financial advice)"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Clone)]
struct CommonArgs {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use deterministic synthetic prices instead of live data.
    #[arg(long, default_value_t = false)]
    synthetic: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one agent run and write the report.
    Run {
        /// Comma-separated symbols. Defaults to the configured universe.
        #[arg(long, value_delimiter = ',')]
        universe: Vec<String>,

        /// Signal horizon in calendar days.
        #[arg(long)]
        days: Option<u32>,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Run the agent every day at a fixed local time.
    Schedule {
        /// Time of day, HH:MM (24h).
        #[arg(long, default_value = DEFAULT_RUN_TIME)]
        at: String,

        #[arg(long, value_delimiter = ',')]
        universe: Vec<String>,

        #[arg(long)]
        days: Option<u32>,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Score many symbols, best first.
    Screen {
        #[arg(required = true)]
        symbols: Vec<String>,

        #[arg(long, default_value_t = 365)]
        days: u32,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Detailed signals for one symbol.
    Analyze {
        symbol: String,

        #[arg(long, default_value_t = 365)]
        days: u32,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Backtest an SMA crossover.
    Backtest {
        symbol: String,

        #[arg(long, default_value_t = 50)]
        fast: usize,

        #[arg(long, default_value_t = 200)]
        slow: usize,

        #[arg(long, default_value_t = 1200)]
        days: u32,

        /// Include the downsampled equity curve.
        #[arg(long, default_value_t = false)]
        series: bool,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// In-sample/out-of-sample grid search of crossover windows.
    Optimize {
        symbol: String,

        #[arg(long, default_value_t = 1200)]
        days: u32,

        #[arg(long, value_delimiter = ',', default_values_t = [10, 20, 50])]
        fast: Vec<usize>,

        #[arg(long, value_delimiter = ',', default_values_t = [100, 150, 200, 250])]
        slow: Vec<usize>,

        #[arg(long, default_value_t = 0.7)]
        split: f64,

        #[arg(long, default_value_t = 5)]
        top_k: usize,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Browse persisted reports.
    Reports {
        #[command(subcommand)]
        action: ReportsAction,
    },
}

#[derive(Subcommand)]
enum ReportsAction {
    /// List report dates.
    List {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Print a run report as JSON (latest by default).
    Show {
        /// Report date (YYYY-MM-DD).
        #[arg(long)]
        date: Option<String>,

        #[command(flatten)]
        common: CommonArgs,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sink = logging::init()?;

    match cli.command {
        Commands::Run {
            universe,
            days,
            common,
        } => {
            let config = load_config(&common, universe, days)?;
            run_agent(&config, sink).map(|_| ())
        }
        Commands::Schedule {
            at,
            universe,
            days,
            common,
        } => {
            let config = load_config(&common, universe, days)?;
            run_schedule(&config, &at, sink)
        }
        Commands::Screen {
            symbols,
            days,
            common,
        } => {
            let tools = build_tools(&load_config(&common, Vec::new(), None)?, false)?;
            let symbols: Vec<String> = symbols.iter().map(|s| s.to_uppercase()).collect();
            print_json(&tools.screen(&symbols, days)?)
        }
        Commands::Analyze {
            symbol,
            days,
            common,
        } => {
            let tools = build_tools(&load_config(&common, Vec::new(), None)?, false)?;
            print_json(&tools.analyze(&symbol, days)?)
        }
        Commands::Backtest {
            symbol,
            fast,
            slow,
            days,
            series,
            common,
        } => {
            let tools = build_tools(&load_config(&common, Vec::new(), None)?, series)?;
            print_json(&tools.backtest(&symbol, fast, slow, days)?)
        }
        Commands::Optimize {
            symbol,
            days,
            fast,
            slow,
            split,
            top_k,
            common,
        } => {
            let tools = build_tools(&load_config(&common, Vec::new(), None)?, false)?;
            let grid = GridSpec {
                fast_values: fast,
                slow_values: slow,
                split,
                top_k,
            };
            print_json(&tools.optimize_backtest(&symbol, days, &grid)?)
        }
        Commands::Reports { action } => match action {
            ReportsAction::List { common } => {
                let config = load_config(&common, Vec::new(), None)?;
                let store = ReportStore::new(&config.reports_dir);
                for date in store.list_dates()? {
                    println!("{date}");
                }
                Ok(())
            }
            ReportsAction::Show { date, common } => {
                let config = load_config(&common, Vec::new(), None)?;
                let store = ReportStore::new(&config.reports_dir);
                let report = match date {
                    Some(d) => {
                        let date = NaiveDate::parse_from_str(&d, "%Y-%m-%d")
                            .with_context(|| format!("invalid --date {d:?}"))?;
                        store.load(date)?
                    }
                    None => store
                        .load_latest()?
                        .context("no reports yet; run `marketlab run` first")?,
                };
                print_json(&report)
            }
        },
    }
}

/// Config file + environment, then command-line overrides.
fn load_config(common: &CommonArgs, universe: Vec<String>, days: Option<u32>) -> Result<AgentConfig> {
    let mut config = AgentConfig::load(common.config.as_deref())?;
    if !universe.is_empty() {
        config.universe = universe;
    }
    if let Some(days) = days {
        config.default_days = days;
    }
    if common.synthetic {
        config.data_mode = DataMode::Synthetic;
    }
    config.validate()?;
    Ok(config)
}

fn build_tools(config: &AgentConfig, include_series: bool) -> Result<Box<dyn Tools>> {
    match &config.api_base {
        Some(base) => {
            info!(api_base = %base, "using remote tool service");
            Ok(Box::new(HttpTools::new(base.as_str())?))
        }
        None => {
            let engine = engine_for(config.data_mode).context("failed to set up data providers")?;
            Ok(Box::new(LocalTools::new(engine).with_series(include_series)))
        }
    }
}

fn run_agent(config: &AgentConfig, sink: RunLogSink) -> Result<RunReport> {
    let planner = OllamaPlanner::new(
        config.ollama_base.as_str(),
        config.ollama_model.as_str(),
        Duration::from_secs(config.planner_timeout_secs),
    )?;
    let tools = build_tools(config, false)?;
    let store = ReportStore::new(&config.reports_dir);
    let memory = RunMemory::in_dir(&config.reports_dir);

    let outcome = Orchestrator::new(config, &planner, tools.as_ref(), &memory, &store)
        .with_log_sink(sink)
        .run_once()?;

    println!("Top picks:");
    if outcome.report.picks.is_empty() {
        println!("  (none above confidence {:.2})", config.confidence_threshold);
    }
    for p in &outcome.report.picks {
        println!("  {:<6} {:<4} {:.2}", p.symbol, p.recommendation.as_str(), p.confidence);
    }
    println!("Report saved to: {}", outcome.paths.dir.display());
    Ok(outcome.report)
}

fn run_schedule(config: &AgentConfig, at: &str, sink: RunLogSink) -> Result<()> {
    let at = parse_hhmm(at)?;
    info!(%at, "scheduler started (Ctrl+C to stop)");
    loop {
        let wait = wait_until_next(Local::now().naive_local(), at);
        info!(wait_secs = wait.as_secs(), "sleeping until next run");
        std::thread::sleep(wait);
        match run_agent(config, sink.clone()) {
            Ok(report) => info!(picks = report.picks.len(), "scheduled run complete"),
            Err(e) => error!(error = %e, "scheduled run failed"),
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
