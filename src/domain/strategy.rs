//! RSI strategy parameters.

use serde::Serialize;

use super::error::RsitraderError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyConfig {
    pub rsi_period: usize,
    pub oversold: f64,
    pub overbought: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub position_size_pct: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig {
            rsi_period: 14,
            oversold: 30.0,
            overbought: 70.0,
            stop_loss_pct: 1.5,
            take_profit_pct: 3.0,
            position_size_pct: 2.0,
        }
    }
}

impl StrategyConfig {
    /// Checks the parameter invariants. The first violation is reported as a
    /// `ConfigInvalid` against the `[strategy]` key it concerns.
    pub fn validate(&self) -> Result<(), RsitraderError> {
        if self.rsi_period == 0 {
            return Err(RsitraderError::invalid(
                "strategy",
                "rsi_period",
                "rsi_period must be at least 1",
            ));
        }
        for (key, value) in [("oversold", self.oversold), ("overbought", self.overbought)] {
            if !(value > 0.0 && value < 100.0) {
                return Err(RsitraderError::invalid(
                    "strategy",
                    key,
                    format!("{key} must be between 0 and 100 (exclusive), got {value}"),
                ));
            }
        }
        if self.oversold >= self.overbought {
            return Err(RsitraderError::invalid(
                "strategy",
                "oversold",
                format!(
                    "oversold ({}) must be below overbought ({})",
                    self.oversold, self.overbought
                ),
            ));
        }
        for (key, value) in [
            ("stop_loss", self.stop_loss_pct),
            ("take_profit", self.take_profit_pct),
            ("position_size", self.position_size_pct),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(RsitraderError::invalid(
                    "strategy",
                    key,
                    format!("{key} must be positive, got {value}"),
                ));
            }
        }
        if self.stop_loss_pct >= 100.0 {
            return Err(RsitraderError::invalid(
                "strategy",
                "stop_loss",
                "stop_loss must be below 100%",
            ));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

impl std::fmt::Display for StrategyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "RSI({}) OS={} OB={} SL={}% TP={}% Size={}%",
            self.rsi_period,
            self.oversold,
            self.overbought,
            self.stop_loss_pct,
            self.take_profit_pct,
            self.position_size_pct
        )
    }
}
