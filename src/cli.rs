//! CLI definition and dispatch.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_results_adapter::CsvResultsAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::text_report;
use crate::domain::backtest::BacktestSettings;
use crate::domain::config_validation::{
    backtest_settings_from_config, filter_criteria_from_config, search_space_from_config,
    strategy_from_config, sweep_limits_from_config, validate_backtest_config,
    validate_strategy_config, validate_sweep_config,
};
use crate::domain::error::RsitraderError;
use crate::domain::ohlcv::Bar;
use crate::domain::sweep::{FilterCriteria, ResultSet, SearchSpace, SweepOutcome};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::results_port::ResultsPort;

pub const DEFAULT_TOP: usize = 10;

#[derive(Parser, Debug)]
#[command(
    name = "rsitrader",
    about = "RSI mean-reversion backtester and parameter sweep"
)]
pub struct Cli {
    /// Log more (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one backtest with the [strategy] parameters
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Bar CSV, overriding [backtest] data_path
        #[arg(short, long)]
        data: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Sample the [sweep] grid and rank the configurations
    Sweep {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: Option<PathBuf>,
        #[arg(long)]
        max_combinations: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value_t = DEFAULT_TOP)]
        top: usize,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check a configuration file without running anything
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            config,
            data,
            output,
        } => run_backtest(&config, data.as_ref(), output.as_ref()),
        Command::Sweep {
            config,
            data,
            max_combinations,
            seed,
            top,
            output,
        } => run_sweep(
            &config,
            data.as_ref(),
            SweepOverrides {
                max_combinations,
                seed,
                top,
            },
            output.as_ref(),
        ),
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, RsitraderError> {
    info!(path = %path.display(), "loading config");
    FileConfigAdapter::from_file(path)
}

/// `--data` wins over `[backtest] data_path`, which resolves against the
/// config file's directory.
pub fn resolve_data_path(
    adapter: &FileConfigAdapter,
    data_override: Option<&PathBuf>,
) -> Result<PathBuf, RsitraderError> {
    if let Some(path) = data_override {
        return Ok(path.clone());
    }
    adapter
        .get_string("backtest", "data_path")
        .map(|raw| adapter.resolve_path(&raw))
        .ok_or_else(|| RsitraderError::ConfigMissing {
            section: "backtest".to_string(),
            key: "data_path".to_string(),
        })
}

pub fn resolve_output_dir(
    adapter: &FileConfigAdapter,
    output_override: Option<&PathBuf>,
) -> Option<PathBuf> {
    output_override.cloned().or_else(|| {
        adapter
            .get_string("backtest", "output_dir")
            .map(|raw| adapter.resolve_path(&raw))
    })
}

pub fn load_bars(data_port: &dyn DataPort) -> Result<Vec<Bar>, RsitraderError> {
    let bars = data_port.fetch_bars()?;
    if bars.is_empty() {
        return Err(RsitraderError::NoData {
            source_name: data_port.source_name(),
        });
    }
    info!(
        source = %data_port.source_name(),
        bars = bars.len(),
        first = %bars[0].timestamp,
        last = %bars[bars.len() - 1].timestamp,
        "bars loaded"
    );
    Ok(bars)
}

fn run_backtest(
    config_path: &PathBuf,
    data_override: Option<&PathBuf>,
    output_override: Option<&PathBuf>,
) -> Result<(), RsitraderError> {
    let adapter = load_config(config_path)?;
    let settings = backtest_settings_from_config(&adapter)?;
    let strategy = strategy_from_config(&adapter)?;

    let data = CsvAdapter::new(resolve_data_path(&adapter, data_override)?);
    let bars = load_bars(&data)?;

    info!(%strategy, "running backtest");
    let mut runner = settings.runner()?;
    let result = runner.run(&strategy, &bars)?;
    let summary = text_report::single_result(&result);
    println!("{summary}");

    if let Some(dir) = resolve_output_dir(&adapter, output_override) {
        let mut results = ResultSet::default();
        results.push(result);
        let sink = CsvResultsAdapter::new(dir);
        sink.write_results(&results)?;
        sink.write_summary(&summary)?;
    }
    Ok(())
}

pub struct SweepOverrides {
    pub max_combinations: Option<usize>,
    pub seed: Option<u64>,
    pub top: usize,
}

fn run_sweep(
    config_path: &PathBuf,
    data_override: Option<&PathBuf>,
    overrides: SweepOverrides,
    output_override: Option<&PathBuf>,
) -> Result<(), RsitraderError> {
    let adapter = load_config(config_path)?;
    let settings = backtest_settings_from_config(&adapter)?;
    let space = search_space_from_config(&adapter)?;
    let criteria = filter_criteria_from_config(&adapter)?;
    let (configured_max, configured_seed) = sweep_limits_from_config(&adapter)?;

    let max_combinations = overrides.max_combinations.unwrap_or(configured_max);
    if max_combinations == 0 {
        return Err(RsitraderError::invalid(
            "sweep",
            "max_combinations",
            "max_combinations must be at least 1",
        ));
    }
    let seed = overrides.seed.unwrap_or(configured_seed);

    let data = CsvAdapter::new(resolve_data_path(&adapter, data_override)?);
    let bars = load_bars(&data)?;

    let outcome = execute_sweep(&settings, &bars, &space, max_combinations, seed, criteria)?;
    outcome.require_results()?;

    println!("{}", text_report::top_results_table(&outcome.results, overrides.top));
    println!("{}", text_report::sensitivity_table(&outcome.results));
    let summary = text_report::summary_report(&outcome);
    println!("{summary}");

    if let Some(dir) = resolve_output_dir(&adapter, output_override) {
        let sink = CsvResultsAdapter::new(dir);
        sink.write_results(&outcome.results)?;
        sink.write_summary(&summary)?;
    }
    Ok(())
}

#[cfg(not(feature = "parallel"))]
fn execute_sweep(
    settings: &BacktestSettings,
    bars: &[Bar],
    space: &SearchSpace,
    max_combinations: usize,
    seed: u64,
    criteria: FilterCriteria,
) -> Result<SweepOutcome, RsitraderError> {
    use crate::domain::sweep::Optimizer;

    let mut optimizer = Optimizer::new(settings.runner()?, bars)
        .with_seed(seed)
        .with_criteria(criteria);
    Ok(optimizer.run(space, max_combinations))
}

#[cfg(feature = "parallel")]
fn execute_sweep(
    settings: &BacktestSettings,
    bars: &[Bar],
    space: &SearchSpace,
    max_combinations: usize,
    seed: u64,
    criteria: FilterCriteria,
) -> Result<SweepOutcome, RsitraderError> {
    // Fail fast on settings the workers would all reject.
    settings.build_engine()?;
    Ok(crate::domain::sweep::run_parallel(
        settings,
        bars,
        space,
        max_combinations,
        seed,
        criteria,
    ))
}

fn run_validate(config_path: &PathBuf) -> Result<(), RsitraderError> {
    let adapter = load_config(config_path)?;

    validate_backtest_config(&adapter)?;
    eprintln!("[backtest] OK");
    validate_strategy_config(&adapter)?;
    eprintln!("[strategy] OK");
    validate_sweep_config(&adapter)?;
    let space = search_space_from_config(&adapter)?;
    let (max_combinations, seed) = sweep_limits_from_config(&adapter)?;
    eprintln!(
        "[sweep] OK: {} combinations, evaluating up to {} (seed {})",
        space.combination_count(),
        max_combinations,
        seed
    );

    if !adapter.has_key("backtest", "data_path") {
        eprintln!("warning: [backtest] data_path not set; pass --data when running");
    }
    Ok(())
}
