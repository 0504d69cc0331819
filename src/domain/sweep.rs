//! Parameter sweep: search space, capped seeded sampling, trial execution,
//! and the ranked/filtered result set with its sensitivity view.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::backtest::{TrialResult, TrialRunner};
use super::error::RsitraderError;
use super::ohlcv::Bar;
use super::strategy::StrategyConfig;
use crate::ports::engine_port::SimulationEngine;

pub const DEFAULT_MAX_COMBINATIONS: usize = 200;
pub const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    RsiPeriod,
    Oversold,
    Overbought,
    StopLoss,
    TakeProfit,
    PositionSize,
}

impl Parameter {
    pub const ALL: [Parameter; 6] = [
        Parameter::RsiPeriod,
        Parameter::Oversold,
        Parameter::Overbought,
        Parameter::StopLoss,
        Parameter::TakeProfit,
        Parameter::PositionSize,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Parameter::RsiPeriod => "rsi_period",
            Parameter::Oversold => "oversold",
            Parameter::Overbought => "overbought",
            Parameter::StopLoss => "stop_loss",
            Parameter::TakeProfit => "take_profit",
            Parameter::PositionSize => "position_size",
        }
    }

    pub fn from_key(key: &str) -> Option<Parameter> {
        Parameter::ALL.into_iter().find(|p| p.key() == key)
    }

    pub fn value_of(self, config: &StrategyConfig) -> f64 {
        match self {
            Parameter::RsiPeriod => config.rsi_period as f64,
            Parameter::Oversold => config.oversold,
            Parameter::Overbought => config.overbought,
            Parameter::StopLoss => config.stop_loss_pct,
            Parameter::TakeProfit => config.take_profit_pct,
            Parameter::PositionSize => config.position_size_pct,
        }
    }

    /// Writes `value` into `config`. A non-integral or sub-1 period becomes 0,
    /// which validation then rejects.
    pub fn apply(self, config: &mut StrategyConfig, value: f64) {
        match self {
            Parameter::RsiPeriod => {
                config.rsi_period = if value >= 1.0 && value.fract() == 0.0 {
                    value as usize
                } else {
                    0
                };
            }
            Parameter::Oversold => config.oversold = value,
            Parameter::Overbought => config.overbought = value,
            Parameter::StopLoss => config.stop_loss_pct = value,
            Parameter::TakeProfit => config.take_profit_pct = value,
            Parameter::PositionSize => config.position_size_pct = value,
        }
    }
}

impl std::fmt::Display for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Inclusive `start..=end` in `step` increments, computed by index so the
/// values don't accumulate float drift.
pub fn range_values(start: f64, end: f64, step: f64) -> Result<Vec<f64>, String> {
    if !(start.is_finite() && end.is_finite() && step.is_finite()) {
        return Err("range bounds must be finite".to_string());
    }
    if step <= 0.0 {
        return Err(format!("step must be positive, got {step}"));
    }
    if end < start {
        return Err(format!("range end {end} is below start {start}"));
    }
    let steps = ((end - start) / step + 1e-9).floor() as usize;
    Ok((0..=steps)
        .map(|i| {
            let v = start + i as f64 * step;
            (v * 1e10).round() / 1e10
        })
        .collect())
}

/// Parses an axis written as `a, b, c` or `start:end:step`.
pub fn parse_axis(text: &str) -> Result<Vec<f64>, String> {
    let text = text.trim();
    if text.is_empty() {
        return Err("axis has no values".to_string());
    }

    if text.contains(':') {
        let parts: Vec<&str> = text.split(':').map(str::trim).collect();
        let [start, end, step] = parts[..] else {
            return Err(format!("range must be start:end:step, got '{text}'"));
        };
        let num = |s: &str| {
            s.parse::<f64>()
                .map_err(|_| format!("'{s}' is not a number"))
        };
        return range_values(num(start)?, num(end)?, num(step)?);
    }

    text.split(',')
        .map(str::trim)
        .map(|s| {
            s.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| format!("'{s}' is not a number"))
        })
        .collect()
}

/// Candidate values per strategy parameter. Every parameter has at least one
/// value; the candidate set is the Cartesian product of the axes.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSpace {
    axes: Vec<(Parameter, Vec<f64>)>,
}

impl Default for SearchSpace {
    fn default() -> Self {
        let range = |start, end, step| range_values(start, end, step).unwrap_or_default();
        SearchSpace {
            axes: vec![
                (Parameter::RsiPeriod, vec![14.0]),
                (Parameter::Oversold, range(20.0, 40.0, 1.0)),
                (Parameter::Overbought, range(60.0, 80.0, 1.0)),
                (Parameter::StopLoss, range(0.5, 3.0, 0.25)),
                (Parameter::TakeProfit, range(1.0, 6.0, 0.5)),
                (Parameter::PositionSize, range(0.5, 5.0, 0.5)),
            ],
        }
    }
}

impl SearchSpace {
    /// A single-point space: every axis holds `base`'s value.
    pub fn from_base(base: &StrategyConfig) -> Self {
        SearchSpace {
            axes: Parameter::ALL
                .into_iter()
                .map(|p| (p, vec![p.value_of(base)]))
                .collect(),
        }
    }

    pub fn set_axis(&mut self, parameter: Parameter, values: Vec<f64>) -> Result<(), RsitraderError> {
        if values.is_empty() {
            return Err(RsitraderError::invalid(
                "sweep",
                parameter.key(),
                "axis has no values",
            ));
        }
        let others = self
            .axes
            .iter()
            .filter(|(p, _)| *p != parameter)
            .try_fold(1usize, |acc, (_, v)| acc.checked_mul(v.len()));
        if others.and_then(|n| n.checked_mul(values.len())).is_none() {
            return Err(RsitraderError::invalid(
                "sweep",
                parameter.key(),
                "search space has more combinations than can be indexed",
            ));
        }
        if let Some(axis) = self.axes.iter_mut().find(|(p, _)| *p == parameter) {
            axis.1 = values;
        }
        Ok(())
    }

    pub fn with_axis(mut self, parameter: Parameter, values: Vec<f64>) -> Result<Self, RsitraderError> {
        self.set_axis(parameter, values)?;
        Ok(self)
    }

    pub fn axis(&self, parameter: Parameter) -> &[f64] {
        self.axes
            .iter()
            .find(|(p, _)| *p == parameter)
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn axes(&self) -> impl Iterator<Item = (Parameter, &[f64])> {
        self.axes.iter().map(|(p, v)| (*p, v.as_slice()))
    }

    /// Size of the Cartesian product. `set_axis` keeps it within `usize`,
    /// so every index below it decodes to a distinct configuration.
    pub fn combination_count(&self) -> usize {
        self.axes.iter().map(|(_, v)| v.len()).product()
    }

    /// Decodes a product index (last axis varies fastest).
    pub fn config_at(&self, index: usize) -> StrategyConfig {
        let mut config = StrategyConfig::default();
        let mut rest = index;
        for (parameter, values) in self.axes.iter().rev() {
            let len = values.len().max(1);
            if let Some(&value) = values.get(rest % len) {
                parameter.apply(&mut config, value);
            }
            rest /= len;
        }
        config
    }
}

/// `k` distinct indices from `0..total`, via a sparse partial Fisher-Yates
/// shuffle. Order is the draw order.
pub fn sample_indices(total: usize, k: usize, seed: u64) -> Vec<usize> {
    let k = k.min(total);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut swapped: HashMap<usize, usize> = HashMap::with_capacity(k * 2);
    let mut picked = Vec::with_capacity(k);

    for i in 0..k {
        let j = rng.gen_range(i..total);
        let at_i = swapped.get(&i).copied().unwrap_or(i);
        let at_j = swapped.get(&j).copied().unwrap_or(j);
        swapped.insert(j, at_i);
        picked.push(at_j);
    }
    picked
}

/// The configurations a sweep will evaluate: the whole product when it fits
/// under `max_combinations`, else a seeded sample of exactly that many.
pub fn select_candidates(
    space: &SearchSpace,
    max_combinations: usize,
    seed: u64,
) -> Vec<StrategyConfig> {
    let total = space.combination_count();
    if total <= max_combinations {
        return (0..total).map(|i| space.config_at(i)).collect();
    }
    info!(
        total,
        max_combinations, seed, "search space exceeds cap, sampling"
    );
    sample_indices(total, max_combinations, seed)
        .into_iter()
        .map(|i| space.config_at(i))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterCriteria {
    pub min_sharpe: f64,
    /// Fraction in [0, 1].
    pub min_win_rate: f64,
    /// Fraction of peak; no limit when `None`.
    pub max_drawdown: Option<f64>,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        FilterCriteria {
            min_sharpe: 1.5,
            min_win_rate: 0.55,
            max_drawdown: None,
        }
    }
}

impl FilterCriteria {
    pub fn passes(&self, result: &TrialResult) -> bool {
        let m = &result.metrics;
        m.sharpe_ratio > self.min_sharpe
            && m.win_rate > self.min_win_rate
            && self.max_drawdown.is_none_or(|limit| m.max_drawdown <= limit)
    }
}

fn desc_nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.total_cmp(&a),
    }
}

/// Sharpe descending (undefined last), then P&L, then win rate.
pub fn rank_order(a: &TrialResult, b: &TrialResult) -> Ordering {
    desc_nan_last(a.sharpe_ratio(), b.sharpe_ratio())
        .then_with(|| desc_nan_last(a.total_pnl(), b.total_pnl()))
        .then_with(|| desc_nan_last(a.win_rate(), b.win_rate()))
}

/// Mean statistics of all results sharing one parameter value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensitivityRow {
    pub parameter: Parameter,
    pub value: f64,
    pub count: usize,
    /// Mean over the defined Sharpe ratios; NaN if none are defined.
    pub mean_sharpe: f64,
    pub mean_pnl: f64,
    pub mean_win_rate: f64,
}

/// Trial results in evaluation order plus the filter that tags them.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    results: Vec<TrialResult>,
    criteria: FilterCriteria,
}

impl ResultSet {
    pub fn new(criteria: FilterCriteria) -> Self {
        ResultSet {
            results: Vec::new(),
            criteria,
        }
    }

    pub fn push(&mut self, result: TrialResult) {
        self.results.push(result);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    /// Evaluation order.
    pub fn results(&self) -> &[TrialResult] {
        &self.results
    }

    pub fn passes_filter(&self, result: &TrialResult) -> bool {
        self.criteria.passes(result)
    }

    /// All results, best first. Equal keys keep evaluation order.
    pub fn ranked(&self) -> Vec<&TrialResult> {
        let mut ranked: Vec<&TrialResult> = self.results.iter().collect();
        ranked.sort_by(|a, b| rank_order(a, b));
        ranked
    }

    /// Results passing the filter, best first.
    pub fn filtered(&self) -> Vec<&TrialResult> {
        self.ranked()
            .into_iter()
            .filter(|r| self.criteria.passes(r))
            .collect()
    }

    pub fn best(&self) -> Option<&TrialResult> {
        self.results.iter().min_by(|a, b| rank_order(a, b))
    }

    /// Per-parameter grouping by value, values ascending.
    pub fn sensitivity(&self, parameter: Parameter) -> Vec<SensitivityRow> {
        let mut groups: Vec<(f64, Vec<&TrialResult>)> = Vec::new();
        for result in &self.results {
            let value = parameter.value_of(&result.config);
            match groups.iter_mut().find(|(v, _)| v.total_cmp(&value).is_eq()) {
                Some((_, members)) => members.push(result),
                None => groups.push((value, vec![result])),
            }
        }
        groups.sort_by(|a, b| a.0.total_cmp(&b.0));

        groups
            .into_iter()
            .map(|(value, members)| {
                let count = members.len();
                let n = count as f64;
                let sharpes: Vec<f64> = members
                    .iter()
                    .map(|r| r.sharpe_ratio())
                    .filter(|s| !s.is_nan())
                    .collect();
                let mean_sharpe = if sharpes.is_empty() {
                    f64::NAN
                } else {
                    sharpes.iter().sum::<f64>() / sharpes.len() as f64
                };
                SensitivityRow {
                    parameter,
                    value,
                    count,
                    mean_sharpe,
                    mean_pnl: members.iter().map(|r| r.total_pnl()).sum::<f64>() / n,
                    mean_win_rate: members.iter().map(|r| r.win_rate()).sum::<f64>() / n,
                }
            })
            .collect()
    }

    /// Sensitivity rows for every parameter that takes more than one value.
    pub fn sensitivity_all(&self) -> Vec<SensitivityRow> {
        Parameter::ALL
            .into_iter()
            .map(|p| self.sensitivity(p))
            .filter(|rows| rows.len() > 1)
            .flatten()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedTrial {
    pub config: StrategyConfig,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct SweepOutcome {
    pub results: ResultSet,
    pub total_combinations: usize,
    pub sampled: bool,
    pub skipped: usize,
    pub failed: Vec<FailedTrial>,
}

impl SweepOutcome {
    pub fn evaluated(&self) -> usize {
        self.results.len()
    }

    /// Fails when not a single configuration produced a result.
    pub fn require_results(&self) -> Result<(), RsitraderError> {
        if self.results.is_empty() {
            return Err(RsitraderError::NoValidConfiguration {
                skipped: self.skipped,
                failed: self.failed.len(),
            });
        }
        Ok(())
    }
}

enum TrialOutcome {
    Completed(TrialResult),
    Skipped,
    Failed(FailedTrial),
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn evaluate<E: SimulationEngine>(
    runner: &mut TrialRunner<E>,
    config: &StrategyConfig,
    bars: &[Bar],
) -> TrialOutcome {
    if let Err(e) = config.validate() {
        debug!(%config, error = %e, "skipping invalid configuration");
        return TrialOutcome::Skipped;
    }

    let attempt = catch_unwind(AssertUnwindSafe(|| runner.run(config, bars)));
    let error = match attempt {
        Ok(Ok(result)) => return TrialOutcome::Completed(result),
        Ok(Err(e)) => e.to_string(),
        Err(payload) => format!("panic: {}", panic_message(payload.as_ref())),
    };
    error!(%config, %error, "trial failed");
    TrialOutcome::Failed(FailedTrial {
        config: config.clone(),
        error,
    })
}

fn assemble(
    outcomes: impl IntoIterator<Item = TrialOutcome>,
    criteria: FilterCriteria,
    total_combinations: usize,
    sampled: bool,
) -> SweepOutcome {
    let mut outcome = SweepOutcome {
        results: ResultSet::new(criteria),
        total_combinations,
        sampled,
        skipped: 0,
        failed: Vec::new(),
    };
    for trial in outcomes {
        match trial {
            TrialOutcome::Completed(result) => outcome.results.push(result),
            TrialOutcome::Skipped => outcome.skipped += 1,
            TrialOutcome::Failed(failure) => outcome.failed.push(failure),
        }
    }
    info!(
        evaluated = outcome.evaluated(),
        skipped = outcome.skipped,
        failed = outcome.failed.len(),
        passing = outcome.results.filtered().len(),
        "sweep complete"
    );
    outcome
}

/// Runs the Trial Runner over a search space, one configuration at a time,
/// on a single reused engine.
pub struct Optimizer<'a, E: SimulationEngine> {
    runner: TrialRunner<E>,
    bars: &'a [Bar],
    seed: u64,
    criteria: FilterCriteria,
}

impl<'a, E: SimulationEngine> Optimizer<'a, E> {
    pub fn new(runner: TrialRunner<E>, bars: &'a [Bar]) -> Self {
        Optimizer {
            runner,
            bars,
            seed: DEFAULT_SEED,
            criteria: FilterCriteria::default(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_criteria(mut self, criteria: FilterCriteria) -> Self {
        self.criteria = criteria;
        self
    }

    pub fn run(&mut self, space: &SearchSpace, max_combinations: usize) -> SweepOutcome {
        let total = space.combination_count();
        let candidates = select_candidates(space, max_combinations, self.seed);
        let count = candidates.len();
        info!(total, evaluating = count, "starting sweep");

        let report_every = (count / 10).max(1);
        let mut outcomes = Vec::with_capacity(count);
        for (i, config) in candidates.iter().enumerate() {
            outcomes.push(evaluate(&mut self.runner, config, self.bars));
            if (i + 1) % report_every == 0 {
                info!(done = i + 1, total = count, "sweep progress");
            }
        }

        if count == 0 {
            warn!("no configurations selected");
        }
        assemble(outcomes, self.criteria, total, total > max_combinations)
    }
}

/// Same selection and assembly as [`Optimizer::run`], with trials spread over
/// the rayon pool. Each worker owns its own runner and engine.
#[cfg(feature = "parallel")]
pub fn run_parallel(
    settings: &super::backtest::BacktestSettings,
    bars: &[Bar],
    space: &SearchSpace,
    max_combinations: usize,
    seed: u64,
    criteria: FilterCriteria,
) -> SweepOutcome {
    use rayon::prelude::*;

    let total = space.combination_count();
    let candidates = select_candidates(space, max_combinations, seed);
    info!(total, evaluating = candidates.len(), "starting parallel sweep");

    let outcomes: Vec<TrialOutcome> = candidates
        .par_iter()
        .map_init(
            || settings.runner(),
            |runner, config| match runner {
                Ok(runner) => evaluate(runner, config, bars),
                Err(e) => TrialOutcome::Failed(FailedTrial {
                    config: config.clone(),
                    error: e.to_string(),
                }),
            },
        )
        .collect();

    assemble(outcomes, criteria, total, total > max_combinations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metrics::TrialMetrics;

    fn result(sharpe: f64, pnl: f64, win_rate: f64) -> TrialResult {
        TrialResult {
            config: StrategyConfig::default(),
            metrics: TrialMetrics {
                starting_equity: 100_000.0,
                ending_equity: 100_000.0 + pnl,
                total_pnl: pnl,
                return_pct: pnl / 1_000.0,
                total_trades: 10,
                winning_trades: (win_rate * 10.0) as usize,
                losing_trades: 10 - (win_rate * 10.0) as usize,
                win_rate,
                sharpe_ratio: sharpe,
                max_drawdown: 0.05,
                profit_factor: 1.0,
                avg_win: 0.0,
                avg_loss: 0.0,
            },
        }
    }

    fn with_oversold(mut r: TrialResult, oversold: f64) -> TrialResult {
        r.config.oversold = oversold;
        r
    }

    #[test]
    fn parameter_keys_round_trip() {
        for p in Parameter::ALL {
            assert_eq!(Parameter::from_key(p.key()), Some(p));
        }
        assert_eq!(Parameter::from_key("leverage"), None);
    }

    #[test]
    fn apply_period_rejects_fractions() {
        let mut c = StrategyConfig::default();
        Parameter::RsiPeriod.apply(&mut c, 21.0);
        assert_eq!(c.rsi_period, 21);
        Parameter::RsiPeriod.apply(&mut c, 7.5);
        assert_eq!(c.rsi_period, 0);
        assert!(!c.is_valid());
    }

    #[test]
    fn range_is_inclusive_and_drift_free() {
        let v = range_values(0.5, 3.0, 0.25).unwrap();
        assert_eq!(v.len(), 11);
        assert_eq!(v[0], 0.5);
        assert_eq!(v[10], 3.0);
        assert_eq!(v[3], 1.25);
        let v = range_values(0.1, 0.3, 0.1).unwrap();
        assert_eq!(v, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn range_errors() {
        assert!(range_values(1.0, 0.0, 0.5).is_err());
        assert!(range_values(0.0, 1.0, 0.0).is_err());
        assert!(range_values(0.0, f64::INFINITY, 1.0).is_err());
    }

    #[test]
    fn parse_axis_forms() {
        assert_eq!(parse_axis("20, 25,30").unwrap(), vec![20.0, 25.0, 30.0]);
        assert_eq!(parse_axis("1:2:0.5").unwrap(), vec![1.0, 1.5, 2.0]);
        assert_eq!(parse_axis(" 14 ").unwrap(), vec![14.0]);
        assert!(parse_axis("").is_err());
        assert!(parse_axis("1:2").is_err());
        assert!(parse_axis("a, b").is_err());
        assert!(parse_axis("1, NaN").is_err());
    }

    #[test]
    fn default_space_matches_documented_grid() {
        let space = SearchSpace::default();
        assert_eq!(space.axis(Parameter::RsiPeriod), &[14.0]);
        assert_eq!(space.axis(Parameter::Oversold).len(), 21);
        assert_eq!(space.axis(Parameter::Overbought).len(), 21);
        assert_eq!(space.axis(Parameter::StopLoss).len(), 11);
        assert_eq!(space.axis(Parameter::TakeProfit).len(), 11);
        assert_eq!(space.axis(Parameter::PositionSize).len(), 10);
        assert_eq!(space.combination_count(), 21 * 21 * 11 * 11 * 10);
    }

    #[test]
    fn empty_axis_is_rejected() {
        let err = SearchSpace::default()
            .with_axis(Parameter::Oversold, vec![])
            .unwrap_err();
        assert!(err.is_config());
    }

    fn wide_axis() -> Vec<f64> {
        (1..=2_000).map(f64::from).collect()
    }

    #[test]
    fn unindexable_space_is_rejected() {
        let mut space = SearchSpace::from_base(&StrategyConfig::default());
        for parameter in &Parameter::ALL[..5] {
            space.set_axis(*parameter, wide_axis()).unwrap();
        }
        assert_eq!(space.combination_count(), 2_000usize.pow(5));

        let before = space.clone();
        let err = space.set_axis(Parameter::ALL[5], wide_axis()).unwrap_err();
        assert!(matches!(err, RsitraderError::ConfigInvalid { ref section, .. } if section == "sweep"));
        assert_eq!(space, before);
    }

    #[test]
    fn sample_of_large_space_decodes_distinct_configs() {
        let mut space = SearchSpace::from_base(&StrategyConfig::default());
        for parameter in &Parameter::ALL[..5] {
            space.set_axis(*parameter, wide_axis()).unwrap();
        }
        let mut seen: Vec<String> = select_candidates(&space, 200, 42)
            .iter()
            .map(|c| c.to_string())
            .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 200);
    }

    #[test]
    fn config_at_enumerates_whole_product() {
        let space = SearchSpace::from_base(&StrategyConfig::default())
            .with_axis(Parameter::Oversold, vec![20.0, 30.0])
            .unwrap()
            .with_axis(Parameter::Overbought, vec![70.0, 80.0, 90.0])
            .unwrap();
        assert_eq!(space.combination_count(), 6);

        let configs: Vec<(f64, f64)> = (0..6)
            .map(|i| space.config_at(i))
            .map(|c| (c.oversold, c.overbought))
            .collect();
        assert_eq!(
            configs,
            vec![
                (20.0, 70.0),
                (20.0, 80.0),
                (20.0, 90.0),
                (30.0, 70.0),
                (30.0, 80.0),
                (30.0, 90.0)
            ]
        );
    }

    #[test]
    fn sample_is_distinct_in_range_and_reproducible() {
        let a = sample_indices(500, 200, 42);
        let b = sample_indices(500, 200, 42);
        assert_eq!(a, b);
        assert_eq!(a.len(), 200);
        let mut unique = a.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), 200);
        assert!(a.iter().all(|&i| i < 500));
        assert_ne!(a, sample_indices(500, 200, 7));
    }

    #[test]
    fn sample_larger_than_population_takes_all() {
        let mut all = sample_indices(5, 10, 1);
        all.sort_unstable();
        assert_eq!(all, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn sample_of_huge_space_does_not_materialize() {
        let picked = sample_indices(usize::MAX, 3, 9);
        assert_eq!(picked.len(), 3);
    }

    #[test]
    fn candidates_under_cap_are_exhaustive_in_order() {
        let space = SearchSpace::from_base(&StrategyConfig::default())
            .with_axis(Parameter::Oversold, vec![20.0, 25.0, 30.0, 35.0])
            .unwrap()
            .with_axis(Parameter::Overbought, vec![65.0, 70.0, 75.0, 80.0])
            .unwrap()
            .with_axis(Parameter::StopLoss, vec![1.0, 1.5, 2.0])
            .unwrap();
        let candidates = select_candidates(&space, 200, 42);
        assert_eq!(candidates.len(), 48);
        assert_eq!(candidates[0], space.config_at(0));
        assert_eq!(candidates[47], space.config_at(47));
    }

    #[test]
    fn filter_is_strict_and_rejects_nan() {
        let criteria = FilterCriteria::default();
        assert!(criteria.passes(&result(2.0, 100.0, 0.6)));
        assert!(!criteria.passes(&result(1.5, 100.0, 0.6)));
        assert!(!criteria.passes(&result(2.0, 100.0, 0.55)));
        assert!(!criteria.passes(&result(f64::NAN, 100.0, 0.9)));

        let capped = FilterCriteria {
            max_drawdown: Some(0.05),
            ..criteria
        };
        assert!(capped.passes(&result(2.0, 100.0, 0.6)));
        let capped = FilterCriteria {
            max_drawdown: Some(0.04),
            ..criteria
        };
        assert!(!capped.passes(&result(2.0, 100.0, 0.6)));
    }

    #[test]
    fn ranking_tie_breaks() {
        let mut set = ResultSet::new(FilterCriteria::default());
        set.push(with_oversold(result(1.0, 50.0, 0.5), 21.0));
        set.push(with_oversold(result(f64::NAN, 900.0, 0.9), 22.0));
        set.push(with_oversold(result(2.0, 10.0, 0.5), 23.0));
        set.push(with_oversold(result(1.0, 50.0, 0.7), 24.0));
        set.push(with_oversold(result(1.0, 80.0, 0.1), 25.0));
        set.push(with_oversold(result(1.0, 50.0, 0.5), 26.0));

        let order: Vec<f64> = set.ranked().iter().map(|r| r.config.oversold).collect();
        assert_eq!(order, vec![23.0, 25.0, 24.0, 21.0, 26.0, 22.0]);
        assert_eq!(set.best().unwrap().config.oversold, 23.0);
    }

    #[test]
    fn filtering_only_tags() {
        let mut set = ResultSet::new(FilterCriteria::default());
        set.push(result(2.0, 100.0, 0.6));
        set.push(result(0.5, 100.0, 0.6));
        set.push(result(3.0, 100.0, 0.8));
        assert_eq!(set.len(), 3);
        let filtered = set.filtered();
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered[0].sharpe_ratio(), 3.0);
        assert_eq!(set.results().len(), 3);
    }

    #[test]
    fn sensitivity_groups_by_value() {
        let mut set = ResultSet::new(FilterCriteria::default());
        set.push(with_oversold(result(1.0, 100.0, 0.5), 30.0));
        set.push(with_oversold(result(3.0, 300.0, 0.7), 30.0));
        set.push(with_oversold(result(f64::NAN, -50.0, 0.0), 20.0));
        set.push(with_oversold(result(2.0, 0.0, 0.4), 20.0));

        let rows = set.sensitivity(Parameter::Oversold);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value, 20.0);
        assert_eq!(rows[0].count, 2);
        assert_eq!(rows[0].mean_sharpe, 2.0);
        assert_eq!(rows[0].mean_pnl, -25.0);
        assert_eq!(rows[1].value, 30.0);
        assert_eq!(rows[1].mean_sharpe, 2.0);
        assert_eq!(rows[1].mean_pnl, 200.0);
        assert!((rows[1].mean_win_rate - 0.6).abs() < 1e-12);

        // Only oversold varies.
        let all = set.sensitivity_all();
        assert!(all.iter().all(|r| r.parameter == Parameter::Oversold));
    }

    #[test]
    fn empty_outcome_is_an_error() {
        let outcome = assemble(
            vec![
                TrialOutcome::Skipped,
                TrialOutcome::Failed(FailedTrial {
                    config: StrategyConfig::default(),
                    error: "boom".to_string(),
                }),
            ],
            FilterCriteria::default(),
            2,
            false,
        );
        assert_eq!(outcome.evaluated(), 0);
        let err = outcome.require_results().unwrap_err();
        assert!(matches!(
            err,
            RsitraderError::NoValidConfiguration {
                skipped: 1,
                failed: 1
            }
        ));
    }
}
