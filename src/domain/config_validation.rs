//! Configuration validation and typed config assembly.
//!
//! Every value is checked before a run starts; the `*_from_config`
//! builders return the typed settings the runs use.

use crate::domain::backtest::BacktestSettings;
use crate::domain::error::RsitraderError;
use crate::domain::instrument::Instrument;
use crate::domain::strategy::StrategyConfig;
use crate::domain::sweep::{
    DEFAULT_MAX_COMBINATIONS, DEFAULT_SEED, FilterCriteria, Parameter, SearchSpace, parse_axis,
};
use crate::ports::config_port::ConfigPort;
use crate::ports::engine_port::FeeSchedule;

/// Reads a float key. Missing keys yield `None`; present but unparsable
/// values are a `ConfigInvalid`.
pub fn read_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, RsitraderError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(Some)
        .ok_or_else(|| {
            RsitraderError::invalid(section, key, format!("'{raw}' is not a number"))
        })
}

fn read_unsigned(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<u64>, RsitraderError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<u64>().map(Some).map_err(|_| {
        RsitraderError::invalid(
            section,
            key,
            format!("'{raw}' is not a non-negative integer"),
        )
    })
}

fn require(
    condition: bool,
    section: &str,
    key: &str,
    reason: &str,
) -> Result<(), RsitraderError> {
    if condition {
        Ok(())
    } else {
        Err(RsitraderError::invalid(section, key, reason))
    }
}

pub fn instrument_from_config(config: &dyn ConfigPort) -> Result<Instrument, RsitraderError> {
    let base = Instrument::default();
    let section = "instrument";

    let price_increment = read_double(config, section, "price_increment")?
        .unwrap_or(base.price_increment);
    require(
        price_increment > 0.0,
        section,
        "price_increment",
        "price_increment must be positive",
    )?;
    let size_increment =
        read_double(config, section, "size_increment")?.unwrap_or(base.size_increment);
    require(
        size_increment > 0.0,
        section,
        "size_increment",
        "size_increment must be positive",
    )?;
    let min_quantity = read_double(config, section, "min_quantity")?.unwrap_or(base.min_quantity);
    require(
        min_quantity >= 0.0,
        section,
        "min_quantity",
        "min_quantity must be non-negative",
    )?;
    let min_notional = read_double(config, section, "min_notional")?.unwrap_or(base.min_notional);
    require(
        min_notional >= 0.0,
        section,
        "min_notional",
        "min_notional must be non-negative",
    )?;

    Ok(Instrument {
        symbol: config
            .get_string(section, "symbol")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(base.symbol),
        price_increment,
        size_increment,
        min_quantity,
        min_notional,
        ..base
    })
}

pub fn backtest_settings_from_config(
    config: &dyn ConfigPort,
) -> Result<BacktestSettings, RsitraderError> {
    let defaults = BacktestSettings::default();
    let section = "backtest";

    let initial_capital =
        read_double(config, section, "initial_capital")?.unwrap_or(defaults.initial_capital);
    require(
        initial_capital > 0.0,
        section,
        "initial_capital",
        "initial_capital must be positive",
    )?;

    let maker = read_double(config, section, "maker_fee")?.unwrap_or(defaults.fees.maker);
    require(
        (0.0..1.0).contains(&maker),
        section,
        "maker_fee",
        "maker_fee must be in [0, 1)",
    )?;
    let taker = read_double(config, section, "taker_fee")?.unwrap_or(defaults.fees.taker);
    require(
        (0.0..1.0).contains(&taker),
        section,
        "taker_fee",
        "taker_fee must be in [0, 1)",
    )?;
    let slippage_bps =
        read_double(config, section, "slippage_bps")?.unwrap_or(defaults.fees.slippage_bps);
    require(
        slippage_bps >= 0.0,
        section,
        "slippage_bps",
        "slippage_bps must be non-negative",
    )?;

    let leverage = read_double(config, section, "leverage")?.unwrap_or(defaults.leverage);
    require(
        leverage >= 1.0,
        section,
        "leverage",
        "leverage must be at least 1",
    )?;
    let periods_per_year =
        read_double(config, section, "periods_per_year")?.unwrap_or(defaults.periods_per_year);
    require(
        periods_per_year > 0.0,
        section,
        "periods_per_year",
        "periods_per_year must be positive",
    )?;

    let mut instrument = instrument_from_config(config)?;
    instrument.maker_fee = maker;
    instrument.taker_fee = taker;
    instrument.margin_init = 1.0 / leverage;

    Ok(BacktestSettings {
        initial_capital,
        fees: FeeSchedule {
            maker,
            taker,
            slippage_bps,
        },
        leverage,
        periods_per_year,
        instrument,
        close_at_end: config.get_bool(section, "close_at_end", defaults.close_at_end),
    })
}

/// The `[strategy]` section over the defaults, checked against the
/// strategy invariants.
pub fn strategy_from_config(config: &dyn ConfigPort) -> Result<StrategyConfig, RsitraderError> {
    let mut strategy = StrategyConfig::default();
    if let Some(period) = read_unsigned(config, "strategy", "rsi_period")? {
        strategy.rsi_period = period as usize;
    }
    for parameter in Parameter::ALL
        .into_iter()
        .filter(|p| *p != Parameter::RsiPeriod)
    {
        if let Some(value) = read_double(config, "strategy", parameter.key())? {
            parameter.apply(&mut strategy, value);
        }
    }
    strategy.validate()?;
    Ok(strategy)
}

/// Axes under `[sweep]` override the default grid one parameter at a time.
pub fn search_space_from_config(config: &dyn ConfigPort) -> Result<SearchSpace, RsitraderError> {
    let mut space = SearchSpace::default();
    for parameter in Parameter::ALL {
        let Some(text) = config.get_string("sweep", parameter.key()) else {
            continue;
        };
        let values = parse_axis(&text)
            .map_err(|reason| RsitraderError::invalid("sweep", parameter.key(), reason))?;
        space.set_axis(parameter, values)?;
    }
    Ok(space)
}

/// `min_win_rate` and `max_drawdown` are percentages in the file.
pub fn filter_criteria_from_config(
    config: &dyn ConfigPort,
) -> Result<FilterCriteria, RsitraderError> {
    let defaults = FilterCriteria::default();

    let min_sharpe = read_double(config, "sweep", "min_sharpe")?.unwrap_or(defaults.min_sharpe);
    let min_win_rate = match read_double(config, "sweep", "min_win_rate")? {
        Some(pct) => {
            require(
                (0.0..=100.0).contains(&pct),
                "sweep",
                "min_win_rate",
                "min_win_rate must be a percentage between 0 and 100",
            )?;
            pct / 100.0
        }
        None => defaults.min_win_rate,
    };
    let max_drawdown = match read_double(config, "sweep", "max_drawdown")? {
        Some(pct) => {
            require(
                pct > 0.0 && pct <= 100.0,
                "sweep",
                "max_drawdown",
                "max_drawdown must be a percentage in (0, 100]",
            )?;
            Some(pct / 100.0)
        }
        None => defaults.max_drawdown,
    };

    Ok(FilterCriteria {
        min_sharpe,
        min_win_rate,
        max_drawdown,
    })
}

/// `(max_combinations, seed)` from `[sweep]`.
pub fn sweep_limits_from_config(config: &dyn ConfigPort) -> Result<(usize, u64), RsitraderError> {
    let max_combinations = read_unsigned(config, "sweep", "max_combinations")?
        .map_or(DEFAULT_MAX_COMBINATIONS, |n| n as usize);
    require(
        max_combinations >= 1,
        "sweep",
        "max_combinations",
        "max_combinations must be at least 1",
    )?;
    let seed = read_unsigned(config, "sweep", "seed")?.unwrap_or(DEFAULT_SEED);
    Ok((max_combinations, seed))
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), RsitraderError> {
    backtest_settings_from_config(config).map(|_| ())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), RsitraderError> {
    strategy_from_config(config).map(|_| ())
}

pub fn validate_sweep_config(config: &dyn ConfigPort) -> Result<(), RsitraderError> {
    search_space_from_config(config)?;
    filter_criteria_from_config(config)?;
    sweep_limits_from_config(config)?;
    Ok(())
}
