//! Simulated exchange: market-order fills with slippage, fees and a
//! leverage-based margin check, on a single netting account.

use tracing::{debug, warn};

use super::error::RsitraderError;
use super::ohlcv::Bar;
use super::portfolio::{EquityPoint, Portfolio};
use super::position::{CloseReason, ClosedTrade, OpenPosition, Side};
use crate::ports::engine_port::{EngineEvent, FeeSchedule, OrderId, OrderRequest, SimulationEngine};

/// Buy fills above the reference price, sell fills below it.
pub fn apply_slippage(price: f64, side: Side, slippage_bps: f64) -> f64 {
    let slip = slippage_bps / 10_000.0;
    match side {
        Side::Long => price * (1.0 + slip),
        Side::Short => price * (1.0 - slip),
    }
}

pub fn calculate_fee(notional: f64, rate: f64) -> f64 {
    notional.abs() * rate
}

/// Moves bracket levels set around `reference` so they sit at the same
/// relative distance from `fill`.
pub fn rebase_bracket(reference: f64, fill: f64, stop_loss: f64, take_profit: f64) -> (f64, f64) {
    let scale = fill / reference;
    (stop_loss * scale, take_profit * scale)
}

#[derive(Debug, Clone)]
pub struct SimulatedExchange {
    starting_equity: f64,
    fees: FeeSchedule,
    leverage: f64,
    portfolio: Portfolio,
    pending: Vec<(OrderId, OrderRequest)>,
    next_order_id: OrderId,
    last_price: Option<f64>,
}

impl SimulatedExchange {
    pub fn new(
        starting_equity: f64,
        fees: FeeSchedule,
        leverage: f64,
    ) -> Result<Self, RsitraderError> {
        if !starting_equity.is_finite() || starting_equity <= 0.0 {
            return Err(RsitraderError::simulation(format!(
                "starting equity must be positive, got {starting_equity}"
            )));
        }
        if !leverage.is_finite() || leverage <= 0.0 {
            return Err(RsitraderError::simulation(format!(
                "leverage must be positive, got {leverage}"
            )));
        }
        for (name, value) in [
            ("maker fee", fees.maker),
            ("taker fee", fees.taker),
            ("slippage", fees.slippage_bps),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(RsitraderError::simulation(format!(
                    "{name} must be non-negative, got {value}"
                )));
            }
        }

        Ok(SimulatedExchange {
            starting_equity,
            fees,
            leverage,
            portfolio: Portfolio::new(starting_equity),
            pending: Vec::new(),
            next_order_id: 1,
            last_price: None,
        })
    }

    pub fn fees(&self) -> &FeeSchedule {
        &self.fees
    }

    pub fn leverage(&self) -> f64 {
        self.leverage
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn pending_orders(&self) -> usize {
        self.pending.len()
    }

    fn free_equity(&self) -> f64 {
        self.portfolio.total_equity(self.last_price)
            - self.portfolio.used_margin(self.last_price, self.leverage)
    }

    fn fill(&mut self, order_id: OrderId, order: OrderRequest, bar: &Bar) -> EngineEvent {
        let reference = order.price.clamp(bar.low, bar.high);
        if order.reduce_only {
            self.fill_close(order_id, order, reference, bar)
        } else {
            self.fill_open(order_id, order, reference, bar)
        }
    }

    fn fill_open(
        &mut self,
        order_id: OrderId,
        order: OrderRequest,
        reference: f64,
        bar: &Bar,
    ) -> EngineEvent {
        if self.portfolio.has_position() {
            return EngineEvent::Rejected {
                order_id,
                reason: "position already open".to_string(),
            };
        }
        let (Some(stop_loss), Some(take_profit)) = (order.stop_loss, order.take_profit) else {
            return EngineEvent::Rejected {
                order_id,
                reason: "entry without bracket".to_string(),
            };
        };

        let price = apply_slippage(reference, order.side, self.fees.slippage_bps);
        // Brackets keep their distance from the actual fill, not the reference.
        let (stop_loss, take_profit) = rebase_bracket(order.price, price, stop_loss, take_profit);
        let notional = price * order.size;
        let fee = calculate_fee(notional, self.fees.taker);
        let required = notional / self.leverage + fee;
        let free = self.free_equity();
        if required > free {
            warn!(order_id, required, free, "insufficient margin, order rejected");
            return EngineEvent::Rejected {
                order_id,
                reason: format!("insufficient margin: required {required:.2}, free {free:.2}"),
            };
        }

        self.portfolio.open(
            OpenPosition {
                side: order.side,
                entry_price: price,
                size: order.size,
                stop_loss,
                take_profit,
            },
            bar.timestamp,
            fee,
        );
        debug!(order_id, side = %order.side, size = order.size, price, fee, "entry filled");
        EngineEvent::Filled {
            order_id,
            side: order.side,
            size: order.size,
            price,
            fee,
            stop_loss,
            take_profit,
        }
    }

    fn fill_close(
        &mut self,
        order_id: OrderId,
        order: OrderRequest,
        reference: f64,
        bar: &Bar,
    ) -> EngineEvent {
        let held = self.portfolio.holding.as_ref().map(|h| h.position.side);
        if held != Some(order.side.opposite()) {
            return EngineEvent::Rejected {
                order_id,
                reason: "no opposing position to reduce".to_string(),
            };
        }

        let reason = order.reason.unwrap_or(CloseReason::Signal);
        // Take-profit exits rest as limit orders: no slippage, maker fee.
        let (price, rate) = if reason == CloseReason::TakeProfit {
            (reference, self.fees.maker)
        } else {
            (
                apply_slippage(reference, order.side, self.fees.slippage_bps),
                self.fees.taker,
            )
        };
        let size = self
            .portfolio
            .holding
            .as_ref()
            .map_or(order.size, |h| h.position.size);
        let fee = calculate_fee(price * size, rate);

        match self.portfolio.close(price, bar.timestamp, fee, reason) {
            Some(trade) => {
                debug!(order_id, %reason, price, pnl = trade.pnl, "position closed");
                EngineEvent::Closed { order_id, trade }
            }
            None => EngineEvent::Rejected {
                order_id,
                reason: "no position to close".to_string(),
            },
        }
    }
}

impl SimulationEngine for SimulatedExchange {
    fn reset(&mut self) {
        self.portfolio = Portfolio::new(self.starting_equity);
        self.pending.clear();
        self.next_order_id = 1;
        self.last_price = None;
    }

    fn submit_order(&mut self, order: OrderRequest) -> Result<OrderId, RsitraderError> {
        if !order.size.is_finite() || order.size <= 0.0 {
            return Err(RsitraderError::simulation(format!(
                "order size must be positive, got {}",
                order.size
            )));
        }
        if !order.price.is_finite() || order.price <= 0.0 {
            return Err(RsitraderError::simulation(format!(
                "order price must be positive, got {}",
                order.price
            )));
        }
        if order.reduce_only {
            let pending_open = self.pending.iter().any(|(_, o)| !o.reduce_only);
            if !self.portfolio.has_position() && !pending_open {
                return Err(RsitraderError::simulation(
                    "reduce-only order submitted with no open position",
                ));
            }
        } else if order.stop_loss.is_none() || order.take_profit.is_none() {
            return Err(RsitraderError::simulation(
                "entry orders must carry a stop-loss and take-profit",
            ));
        }

        let order_id = self.next_order_id;
        self.next_order_id += 1;
        self.pending.push((order_id, order));
        Ok(order_id)
    }

    fn on_bar(&mut self, bar: &Bar) -> Result<Vec<EngineEvent>, RsitraderError> {
        bar.validate().map_err(RsitraderError::data)?;

        let pending = std::mem::take(&mut self.pending);
        let events = pending
            .into_iter()
            .map(|(order_id, order)| self.fill(order_id, order, bar))
            .collect();

        self.last_price = Some(bar.close);
        let equity = self.portfolio.total_equity(self.last_price);
        self.portfolio.record_equity(bar.timestamp, equity);
        Ok(events)
    }

    fn starting_equity(&self) -> f64 {
        self.starting_equity
    }

    fn equity(&self) -> f64 {
        self.portfolio.total_equity(self.last_price)
    }

    fn equity_curve(&self) -> &[EquityPoint] {
        &self.portfolio.equity_curve
    }

    fn closed_trades(&self) -> &[ClosedTrade] {
        &self.portfolio.closed_trades
    }
}
