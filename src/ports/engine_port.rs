//! Simulation engine port: the seam between the trial runner and the
//! exchange that fills orders and tracks the account.

use crate::domain::error::RsitraderError;
use crate::domain::ohlcv::Bar;
use crate::domain::portfolio::EquityPoint;
use crate::domain::position::{CloseReason, ClosedTrade, Side};

pub type OrderId = u64;

/// Fee and slippage model applied to every fill.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeSchedule {
    pub maker: f64,
    pub taker: f64,
    /// Adverse slippage in basis points of the reference price.
    pub slippage_bps: f64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        FeeSchedule {
            maker: 0.0002,
            taker: 0.0005,
            slippage_bps: 0.0,
        }
    }
}

/// A market order, filled on the next processed bar at `price`.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub side: Side,
    pub size: f64,
    /// Reference fill price before slippage.
    pub price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    /// Only closes an existing position.
    pub reduce_only: bool,
    /// Recorded on the closed trade for reduce-only orders.
    pub reason: Option<CloseReason>,
}

impl OrderRequest {
    pub fn entry(side: Side, size: f64, price: f64, stop_loss: f64, take_profit: f64) -> Self {
        OrderRequest {
            side,
            size,
            price,
            stop_loss: Some(stop_loss),
            take_profit: Some(take_profit),
            reduce_only: false,
            reason: None,
        }
    }

    pub fn close(side: Side, size: f64, price: f64, reason: CloseReason) -> Self {
        OrderRequest {
            side,
            size,
            price,
            stop_loss: None,
            take_profit: None,
            reduce_only: true,
            reason: Some(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// An opening order was filled.
    Filled {
        order_id: OrderId,
        side: Side,
        size: f64,
        price: f64,
        fee: f64,
        stop_loss: f64,
        take_profit: f64,
    },
    /// A reduce-only order closed the position.
    Closed { order_id: OrderId, trade: ClosedTrade },
    /// The order could not be filled (insufficient margin, position conflict).
    Rejected { order_id: OrderId, reason: String },
}

pub trait SimulationEngine {
    /// Restores the exact state the engine had right after construction.
    fn reset(&mut self);

    /// Queues an order. Malformed orders are a simulation error.
    fn submit_order(&mut self, order: OrderRequest) -> Result<OrderId, RsitraderError>;

    /// Fills pending orders against `bar`, marks the account to its close
    /// and appends one equity point.
    fn on_bar(&mut self, bar: &Bar) -> Result<Vec<EngineEvent>, RsitraderError>;

    fn starting_equity(&self) -> f64;

    fn equity(&self) -> f64;

    fn equity_curve(&self) -> &[EquityPoint];

    fn closed_trades(&self) -> &[ClosedTrade];
}
