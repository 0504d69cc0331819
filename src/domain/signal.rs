//! RSI mean-reversion signal engine.
//!
//! Entry: long when RSI crosses up through oversold, short when RSI crosses
//! down through overbought, only while flat. Exit: the attached bracket
//! (stop first), then an opposing crossing. Sizing is one shared function
//! for both sides.

use tracing::{debug, info, warn};

use super::instrument::Instrument;
use super::ohlcv::Bar;
use super::oscillator::OscillatorSnapshot;
use super::position::{CloseReason, OpenPosition, Position, Side};
use super::strategy::StrategyConfig;

/// Bracketed entry order produced by the signal engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryOrder {
    pub size: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    NoOp,
    OpenLong(EntryOrder),
    OpenShort(EntryOrder),
    Close { reason: CloseReason, price: f64 },
}

impl Action {
    pub fn is_noop(&self) -> bool {
        matches!(self, Action::NoOp)
    }
}

/// Position size in base units: (equity * pct / 100) / entry_price, floored
/// to the instrument's size increment.
///
/// Returns `None` when the inputs cannot produce a tradable size: non-positive
/// equity or price, or a result below the minimum quantity or notional.
pub fn calculate_position_size(
    equity: f64,
    position_size_pct: f64,
    entry_price: f64,
    instrument: &Instrument,
) -> Option<f64> {
    if !entry_price.is_finite() || entry_price <= 0.0 {
        return None;
    }
    if !equity.is_finite() || equity <= 0.0 {
        return None;
    }
    if !position_size_pct.is_finite() || position_size_pct <= 0.0 {
        return None;
    }

    let raw = equity * position_size_pct / 100.0 / entry_price;
    let size = instrument.normalize_quantity(raw);

    if size <= 0.0 || size < instrument.min_quantity {
        return None;
    }
    if size * entry_price < instrument.min_notional {
        return None;
    }
    Some(size)
}

/// Stop-loss and take-profit levels for an entry at `entry_price`.
pub fn bracket_levels(side: Side, entry_price: f64, config: &StrategyConfig) -> (f64, f64) {
    let sl = config.stop_loss_pct / 100.0;
    let tp = config.take_profit_pct / 100.0;
    match side {
        Side::Long => (entry_price * (1.0 - sl), entry_price * (1.0 + tp)),
        Side::Short => (entry_price * (1.0 + sl), entry_price * (1.0 - tp)),
    }
}

#[derive(Debug, Clone)]
pub struct SignalEngine {
    config: StrategyConfig,
    instrument: Instrument,
}

impl SignalEngine {
    pub fn new(config: StrategyConfig, instrument: Instrument) -> Self {
        SignalEngine { config, instrument }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Decides the action for one bar. Pure: the position and oscillator
    /// state are owned by the caller.
    pub fn on_bar(
        &self,
        bar: &Bar,
        snapshot: &OscillatorSnapshot,
        position: &Position,
        equity: f64,
    ) -> Action {
        if let Err(reason) = bar.validate() {
            warn!(timestamp = %bar.timestamp, %reason, "skipping malformed bar");
            return Action::NoOp;
        }

        match position {
            Position::Open(open) => self.manage_open(bar, snapshot, open),
            Position::Flat => self.check_entry(bar, snapshot, equity),
        }
    }

    fn manage_open(
        &self,
        bar: &Bar,
        snapshot: &OscillatorSnapshot,
        open: &OpenPosition,
    ) -> Action {
        if let Some((reason, price)) = open.bracket_hit(bar) {
            info!(
                side = %open.side,
                %reason,
                price,
                entry = open.entry_price,
                "bracket triggered"
            );
            return Action::Close { reason, price };
        }

        let opposing = match open.side {
            Side::Long => snapshot.crossed_below_overbought,
            Side::Short => snapshot.crossed_above_oversold,
        };
        if opposing {
            info!(
                side = %open.side,
                rsi = snapshot.value.unwrap_or(f64::NAN),
                price = bar.close,
                "opposing signal, closing position"
            );
            return Action::Close {
                reason: CloseReason::Signal,
                price: bar.close,
            };
        }

        debug!(side = %open.side, "position open, no exit");
        Action::NoOp
    }

    fn check_entry(&self, bar: &Bar, snapshot: &OscillatorSnapshot, equity: f64) -> Action {
        if !snapshot.crossed_above_oversold && !snapshot.crossed_below_overbought {
            return Action::NoOp;
        }
        if !equity.is_finite() || equity <= 0.0 {
            warn!(equity, timestamp = %bar.timestamp, "non-positive equity, entry skipped");
            return Action::NoOp;
        }

        let prev = snapshot.previous.unwrap_or(f64::NAN);
        let curr = snapshot.value.unwrap_or(f64::NAN);

        if snapshot.crossed_above_oversold {
            info!(
                "LONG signal: RSI crossed above {} ({:.2} -> {:.2})",
                self.config.oversold, prev, curr
            );
            self.long_entry(bar.close, equity)
                .map(Action::OpenLong)
                .unwrap_or(Action::NoOp)
        } else {
            info!(
                "SHORT signal: RSI crossed below {} ({:.2} -> {:.2})",
                self.config.overbought, prev, curr
            );
            self.short_entry(bar.close, equity)
                .map(Action::OpenShort)
                .unwrap_or(Action::NoOp)
        }
    }

    pub fn long_entry(&self, entry_price: f64, equity: f64) -> Option<EntryOrder> {
        self.entry(Side::Long, entry_price, equity)
    }

    pub fn short_entry(&self, entry_price: f64, equity: f64) -> Option<EntryOrder> {
        self.entry(Side::Short, entry_price, equity)
    }

    fn entry(&self, side: Side, entry_price: f64, equity: f64) -> Option<EntryOrder> {
        let Some(size) = calculate_position_size(
            equity,
            self.config.position_size_pct,
            entry_price,
            &self.instrument,
        ) else {
            warn!(
                %side,
                equity,
                entry_price,
                pct = self.config.position_size_pct,
                "position size rounds to zero, no trade"
            );
            return None;
        };

        let (stop_loss, take_profit) = bracket_levels(side, entry_price, &self.config);
        Some(EntryOrder {
            size,
            entry_price,
            stop_loss,
            take_profit,
        })
    }
}
