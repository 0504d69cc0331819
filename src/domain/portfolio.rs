//! Account state and equity tracking for a single-instrument margin account.

use chrono::NaiveDateTime;

use super::position::{CloseReason, ClosedTrade, OpenPosition, Position};

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
}

/// An open position plus what the account needs to settle it later.
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub position: OpenPosition,
    pub entry_time: NaiveDateTime,
    pub entry_fee: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub initial_capital: f64,
    /// Realized balance: initial capital plus realized P&L, net of fees.
    pub balance: f64,
    pub holding: Option<Holding>,
    pub closed_trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            initial_capital,
            balance: initial_capital,
            holding: None,
            closed_trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn has_position(&self) -> bool {
        self.holding.is_some()
    }

    pub fn position(&self) -> Position {
        match &self.holding {
            Some(h) => Position::Open(h.position.clone()),
            None => Position::Flat,
        }
    }

    pub fn open(&mut self, position: OpenPosition, entry_time: NaiveDateTime, entry_fee: f64) {
        self.balance -= entry_fee;
        self.holding = Some(Holding {
            position,
            entry_time,
            entry_fee,
        });
    }

    /// Settles the open position at `exit_price`. Returns `None` when flat.
    pub fn close(
        &mut self,
        exit_price: f64,
        exit_time: NaiveDateTime,
        exit_fee: f64,
        reason: CloseReason,
    ) -> Option<ClosedTrade> {
        let holding = self.holding.take()?;
        let price_pnl = holding.position.unrealized_pnl(exit_price);
        self.balance += price_pnl - exit_fee;

        let fees = holding.entry_fee + exit_fee;
        let trade = ClosedTrade {
            side: holding.position.side,
            size: holding.position.size,
            entry_price: holding.position.entry_price,
            exit_price,
            entry_time: holding.entry_time,
            exit_time,
            fees,
            pnl: price_pnl - fees,
            reason,
        };
        self.closed_trades.push(trade.clone());
        Some(trade)
    }

    pub fn record_equity(&mut self, timestamp: NaiveDateTime, equity: f64) {
        self.equity_curve.push(EquityPoint { timestamp, equity });
    }

    /// Balance plus unrealized P&L marked at `mark_price`.
    pub fn total_equity(&self, mark_price: Option<f64>) -> f64 {
        let unrealized = match (&self.holding, mark_price) {
            (Some(h), Some(price)) => h.position.unrealized_pnl(price),
            _ => 0.0,
        };
        self.balance + unrealized
    }

    /// Margin locked by the open position at the given leverage.
    pub fn used_margin(&self, mark_price: Option<f64>, leverage: f64) -> f64 {
        match (&self.holding, mark_price) {
            (Some(h), Some(price)) if leverage > 0.0 => h.position.notional(price) / leverage,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::Side;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn ts(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn long(size: f64, entry: f64) -> OpenPosition {
        OpenPosition {
            side: Side::Long,
            entry_price: entry,
            size,
            stop_loss: entry * 0.9,
            take_profit: entry * 1.1,
        }
    }

    #[test]
    fn new_portfolio() {
        let portfolio = Portfolio::new(100_000.0);
        assert_relative_eq!(portfolio.balance, 100_000.0);
        assert!(!portfolio.has_position());
        assert!(portfolio.closed_trades.is_empty());
        assert!(portfolio.equity_curve.is_empty());
        assert_eq!(portfolio.position(), Position::Flat);
    }

    #[test]
    fn open_charges_entry_fee() {
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.open(long(1.0, 2_000.0), ts(1), 1.0);
        assert!(portfolio.has_position());
        assert_relative_eq!(portfolio.balance, 99_999.0);
        assert!(matches!(portfolio.position(), Position::Open(_)));
    }

    #[test]
    fn total_equity_marks_to_market() {
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.open(long(2.0, 2_000.0), ts(1), 0.0);
        assert_relative_eq!(portfolio.total_equity(Some(2_100.0)), 100_200.0);
        assert_relative_eq!(portfolio.total_equity(None), 100_000.0);
    }

    #[test]
    fn close_records_trade_net_of_fees() {
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.open(long(1.0, 2_000.0), ts(1), 1.0);
        let trade = portfolio
            .close(2_050.0, ts(2), 1.025, CloseReason::TakeProfit)
            .unwrap();

        assert_relative_eq!(trade.pnl, 50.0 - 2.025);
        assert_relative_eq!(trade.fees, 2.025);
        assert_eq!(trade.reason, CloseReason::TakeProfit);
        assert_relative_eq!(portfolio.balance, 100_000.0 + 50.0 - 2.025);
        assert_eq!(portfolio.closed_trades.len(), 1);
        assert!(!portfolio.has_position());
    }

    #[test]
    fn close_when_flat_is_none() {
        let mut portfolio = Portfolio::new(100_000.0);
        assert!(
            portfolio
                .close(2_000.0, ts(1), 0.0, CloseReason::Signal)
                .is_none()
        );
    }

    #[test]
    fn short_close_profits_when_price_falls() {
        let mut portfolio = Portfolio::new(10_000.0);
        let short = OpenPosition {
            side: Side::Short,
            ..long(1.0, 2_000.0)
        };
        portfolio.open(short, ts(1), 0.0);
        let trade = portfolio
            .close(1_900.0, ts(2), 0.0, CloseReason::TakeProfit)
            .unwrap();
        assert_relative_eq!(trade.pnl, 100.0);
        assert_relative_eq!(portfolio.balance, 10_100.0);
    }

    #[test]
    fn used_margin_scales_with_leverage() {
        let mut portfolio = Portfolio::new(100_000.0);
        assert_relative_eq!(portfolio.used_margin(Some(2_000.0), 20.0), 0.0);
        portfolio.open(long(1.0, 2_000.0), ts(1), 0.0);
        assert_relative_eq!(portfolio.used_margin(Some(2_000.0), 20.0), 100.0);
    }

    #[test]
    fn record_equity() {
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.record_equity(ts(3), 105_000.0);
        assert_eq!(portfolio.equity_curve.len(), 1);
        assert_eq!(portfolio.equity_curve[0].timestamp, ts(3));
        assert_relative_eq!(portfolio.equity_curve[0].equity, 105_000.0);
    }
}
