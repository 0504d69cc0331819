//! Trial runner: drives one strategy configuration through the bar series on
//! a reusable simulation engine.

use serde::Serialize;
use tracing::{debug, warn};

use super::error::RsitraderError;
use super::execution::SimulatedExchange;
use super::instrument::Instrument;
use super::metrics::{DEFAULT_PERIODS_PER_YEAR, TrialMetrics};
use super::ohlcv::Bar;
use super::oscillator::RsiTracker;
use super::position::{CloseReason, OpenPosition, Position, Side};
use super::signal::{Action, SignalEngine};
use super::strategy::StrategyConfig;
use crate::ports::engine_port::{EngineEvent, FeeSchedule, OrderRequest, SimulationEngine};

/// Account and market settings shared by every trial of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestSettings {
    pub initial_capital: f64,
    pub fees: FeeSchedule,
    pub leverage: f64,
    pub periods_per_year: f64,
    pub instrument: Instrument,
    /// Close any open position at the last bar's close.
    pub close_at_end: bool,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        let instrument = Instrument::default();
        BacktestSettings {
            initial_capital: 100_000.0,
            fees: FeeSchedule {
                maker: instrument.maker_fee,
                taker: instrument.taker_fee,
                slippage_bps: 0.0,
            },
            leverage: instrument.max_leverage(),
            periods_per_year: DEFAULT_PERIODS_PER_YEAR,
            instrument,
            close_at_end: true,
        }
    }
}

impl BacktestSettings {
    pub fn build_engine(&self) -> Result<SimulatedExchange, RsitraderError> {
        SimulatedExchange::new(self.initial_capital, self.fees, self.leverage)
    }

    /// A runner on a freshly constructed exchange.
    pub fn runner(&self) -> Result<TrialRunner<SimulatedExchange>, RsitraderError> {
        Ok(TrialRunner::new(
            self.build_engine()?,
            self.instrument.clone(),
            self.periods_per_year,
        )
        .with_close_at_end(self.close_at_end))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialResult {
    pub config: StrategyConfig,
    pub metrics: TrialMetrics,
}

impl TrialResult {
    pub fn sharpe_ratio(&self) -> f64 {
        self.metrics.sharpe_ratio
    }

    pub fn total_pnl(&self) -> f64 {
        self.metrics.total_pnl
    }

    pub fn win_rate(&self) -> f64 {
        self.metrics.win_rate
    }
}

pub struct TrialRunner<E: SimulationEngine> {
    engine: E,
    instrument: Instrument,
    periods_per_year: f64,
    close_at_end: bool,
}

impl<E: SimulationEngine> TrialRunner<E> {
    pub fn new(engine: E, instrument: Instrument, periods_per_year: f64) -> Self {
        TrialRunner {
            engine,
            instrument,
            periods_per_year,
            close_at_end: true,
        }
    }

    pub fn with_close_at_end(mut self, close_at_end: bool) -> Self {
        self.close_at_end = close_at_end;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Runs one configuration over `bars`. The engine is reset first, so
    /// repeated runs of the same configuration give identical results.
    pub fn run(
        &mut self,
        config: &StrategyConfig,
        bars: &[Bar],
    ) -> Result<TrialResult, RsitraderError> {
        config.validate()?;
        self.engine.reset();

        let mut tracker = RsiTracker::new(config.rsi_period, config.oversold, config.overbought);
        let signal = SignalEngine::new(config.clone(), self.instrument.clone());
        let mut position = Position::Flat;
        let last_valid = bars.iter().rposition(Bar::is_valid);

        for (i, bar) in bars.iter().enumerate() {
            if let Err(reason) = bar.validate() {
                warn!(timestamp = %bar.timestamp, %reason, "skipping malformed bar");
                continue;
            }

            let snapshot = tracker.update(bar.close);
            let mut action = signal.on_bar(bar, &snapshot, &position, self.engine.equity());
            if self.close_at_end && Some(i) == last_valid {
                action = end_of_data(action, &position, bar);
            }

            self.submit(&action, &position)?;
            for event in self.engine.on_bar(bar)? {
                apply_event(&mut position, event, &self.instrument);
            }
        }

        let metrics = TrialMetrics::compute(
            self.engine.starting_equity(),
            self.engine.equity_curve(),
            self.engine.closed_trades(),
            self.periods_per_year,
        );
        debug!(
            %config,
            trades = metrics.total_trades,
            pnl = metrics.total_pnl,
            sharpe = metrics.sharpe_ratio,
            "trial complete"
        );

        Ok(TrialResult {
            config: config.clone(),
            metrics,
        })
    }

    fn submit(&mut self, action: &Action, position: &Position) -> Result<(), RsitraderError> {
        let order = match action {
            Action::NoOp => return Ok(()),
            Action::OpenLong(entry) => OrderRequest::entry(
                Side::Long,
                entry.size,
                entry.entry_price,
                entry.stop_loss,
                entry.take_profit,
            ),
            Action::OpenShort(entry) => OrderRequest::entry(
                Side::Short,
                entry.size,
                entry.entry_price,
                entry.stop_loss,
                entry.take_profit,
            ),
            Action::Close { reason, price } => {
                let Some(open) = position.open() else {
                    return Ok(());
                };
                OrderRequest::close(open.side.opposite(), open.size, *price, *reason)
            }
        };
        self.engine.submit_order(order)?;
        Ok(())
    }
}

/// On the final bar: keep a pending exit, otherwise close what is open and
/// never open anything new.
fn end_of_data(action: Action, position: &Position, bar: &Bar) -> Action {
    match (action, position.open()) {
        (close @ Action::Close { .. }, _) => close,
        (_, Some(_)) => Action::Close {
            reason: CloseReason::EndOfData,
            price: bar.close,
        },
        (_, None) => Action::NoOp,
    }
}

/// Mirrors engine events into the runner's view of the position. Bracket
/// levels snap to the instrument's price tick.
fn apply_event(position: &mut Position, event: EngineEvent, instrument: &Instrument) {
    match event {
        EngineEvent::Filled {
            side,
            size,
            price,
            stop_loss,
            take_profit,
            ..
        } => {
            *position = Position::Open(OpenPosition {
                side,
                entry_price: price,
                size,
                stop_loss: instrument.normalize_price(stop_loss),
                take_profit: instrument.normalize_price(take_profit),
            });
        }
        EngineEvent::Closed { trade, .. } => {
            debug!(
                side = %trade.side,
                reason = %trade.reason,
                pnl = trade.pnl,
                "trade closed"
            );
            *position = Position::Flat;
        }
        EngineEvent::Rejected { order_id, reason } => {
            warn!(order_id, %reason, "order rejected");
        }
    }
}
