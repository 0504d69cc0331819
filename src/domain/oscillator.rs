//! Streaming RSI (Relative Strength Index) tracker.
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over the first n price changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Warmup: the first n closes yield no value; close n+1 produces the first RSI.
//! Each update also reports threshold crossings against the previous value.

use std::collections::VecDeque;

/// Output of one [`RsiTracker::update`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OscillatorSnapshot {
    pub value: Option<f64>,
    pub previous: Option<f64>,
    /// Previous value below oversold, current value at or above it.
    pub crossed_above_oversold: bool,
    /// Previous value above overbought, current value at or below it.
    pub crossed_below_overbought: bool,
}

impl OscillatorSnapshot {
    pub fn warming_up() -> Self {
        OscillatorSnapshot {
            value: None,
            previous: None,
            crossed_above_oversold: false,
            crossed_below_overbought: false,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.value.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct RsiTracker {
    period: usize,
    oversold: f64,
    overbought: f64,
    closes: VecDeque<f64>,
    avg_gain: f64,
    avg_loss: f64,
    value: Option<f64>,
}

impl RsiTracker {
    pub fn new(period: usize, oversold: f64, overbought: f64) -> Self {
        RsiTracker {
            period,
            oversold,
            overbought,
            closes: VecDeque::with_capacity(period + 1),
            avg_gain: 0.0,
            avg_loss: 0.0,
            value: None,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn avg_gain(&self) -> f64 {
        self.avg_gain
    }

    pub fn avg_loss(&self) -> f64 {
        self.avg_loss
    }

    /// The most recent closes, oldest first (at most `period + 1`).
    pub fn window(&self) -> impl Iterator<Item = &f64> {
        self.closes.iter()
    }

    pub fn reset(&mut self) {
        self.closes.clear();
        self.avg_gain = 0.0;
        self.avg_loss = 0.0;
        self.value = None;
    }

    pub fn update(&mut self, close: f64) -> OscillatorSnapshot {
        let previous = self.value;

        if self.period == 0 || !close.is_finite() {
            return OscillatorSnapshot {
                value: previous,
                previous,
                crossed_above_oversold: false,
                crossed_below_overbought: false,
            };
        }

        let prev_close = self.closes.back().copied();
        self.closes.push_back(close);
        if self.closes.len() > self.period + 1 {
            self.closes.pop_front();
        }

        match (self.value, prev_close) {
            (Some(_), Some(prev)) => {
                let (gain, loss) = split_change(close - prev);
                let n = self.period as f64;
                self.avg_gain = (self.avg_gain * (n - 1.0) + gain) / n;
                self.avg_loss = (self.avg_loss * (n - 1.0) + loss) / n;
                self.value = Some(rsi_from_averages(self.avg_gain, self.avg_loss));
            }
            _ if self.closes.len() == self.period + 1 => {
                let (gains, losses) = self
                    .closes
                    .iter()
                    .zip(self.closes.iter().skip(1))
                    .map(|(a, b)| split_change(b - a))
                    .fold((0.0, 0.0), |(g, l), (gain, loss)| (g + gain, l + loss));
                self.avg_gain = gains / self.period as f64;
                self.avg_loss = losses / self.period as f64;
                self.value = Some(rsi_from_averages(self.avg_gain, self.avg_loss));
            }
            _ => {}
        }

        let (crossed_above_oversold, crossed_below_overbought) = match (previous, self.value) {
            (Some(prev), Some(curr)) => (
                prev < self.oversold && curr >= self.oversold,
                prev > self.overbought && curr <= self.overbought,
            ),
            _ => (false, false),
        };

        OscillatorSnapshot {
            value: self.value,
            previous,
            crossed_above_oversold,
            crossed_below_overbought,
        }
    }
}

fn split_change(change: f64) -> (f64, f64) {
    if change > 0.0 {
        (change, 0.0)
    } else {
        (0.0, -change)
    }
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}
