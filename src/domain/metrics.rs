//! Trial statistics computed from an equity curve and the closed trades.

use serde::Serialize;

use super::portfolio::EquityPoint;
use super::position::ClosedTrade;

/// Fifteen-minute bars, around the clock.
pub const DEFAULT_PERIODS_PER_YEAR: f64 = 35_040.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialMetrics {
    pub starting_equity: f64,
    pub ending_equity: f64,
    pub total_pnl: f64,
    /// Percent of starting equity.
    pub return_pct: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Fraction in [0, 1].
    pub win_rate: f64,
    /// NaN when the curve has fewer than two points or zero variance.
    pub sharpe_ratio: f64,
    /// Fraction of the running peak.
    pub max_drawdown: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
}

impl TrialMetrics {
    pub fn compute(
        starting_equity: f64,
        equity_curve: &[EquityPoint],
        trades: &[ClosedTrade],
        periods_per_year: f64,
    ) -> Self {
        let ending_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(starting_equity);
        let total_pnl = ending_equity - starting_equity;
        let return_pct = if starting_equity > 0.0 {
            total_pnl / starting_equity * 100.0
        } else {
            0.0
        };

        let mut winning_trades = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        for trade in trades {
            if trade.is_win() {
                winning_trades += 1;
                total_wins += trade.pnl;
            } else {
                total_losses += trade.pnl.abs();
            }
        }
        let total_trades = trades.len();
        let losing_trades = total_trades - winning_trades;

        let win_rate = if total_trades > 0 {
            winning_trades as f64 / total_trades as f64
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_win = if winning_trades > 0 {
            total_wins / winning_trades as f64
        } else {
            0.0
        };
        let avg_loss = if losing_trades > 0 {
            total_losses / losing_trades as f64
        } else {
            0.0
        };

        TrialMetrics {
            starting_equity,
            ending_equity,
            total_pnl,
            return_pct,
            total_trades,
            winning_trades,
            losing_trades,
            win_rate,
            sharpe_ratio: sharpe_ratio(equity_curve, periods_per_year),
            max_drawdown: max_drawdown(starting_equity, equity_curve),
            profit_factor,
            avg_win,
            avg_loss,
        }
    }
}

/// Per-period simple returns of the curve.
pub fn period_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            if prev > 0.0 {
                (w[1].equity - prev) / prev
            } else {
                0.0
            }
        })
        .collect()
}

/// Annualized Sharpe ratio (zero risk-free rate, population stdev).
pub fn sharpe_ratio(equity_curve: &[EquityPoint], periods_per_year: f64) -> f64 {
    let returns = period_returns(equity_curve);
    if returns.is_empty() {
        return f64::NAN;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    if stddev > 0.0 {
        mean / stddev * periods_per_year.sqrt()
    } else {
        f64::NAN
    }
}

/// Largest peak-to-trough decline as a fraction of the peak. The starting
/// equity is the first peak.
pub fn max_drawdown(starting_equity: f64, equity_curve: &[EquityPoint]) -> f64 {
    let mut peak = starting_equity;
    let mut max_dd = 0.0_f64;

    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
        } else if peak > 0.0 {
            let dd = (peak - point.equity) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }

    max_dd
}
