#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rsitrader::domain::error::RsitraderError;
use rsitrader::domain::execution::SimulatedExchange;
pub use rsitrader::domain::ohlcv::Bar;
use rsitrader::domain::portfolio::EquityPoint;
use rsitrader::domain::position::ClosedTrade;
use rsitrader::ports::data_port::DataPort;
use rsitrader::ports::engine_port::{EngineEvent, OrderId, OrderRequest, SimulationEngine};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

pub fn ts(i: usize) -> NaiveDateTime {
    start() + Duration::minutes(15 * i as i64)
}

pub fn make_bar(i: usize, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar {
        timestamp: ts(i),
        open,
        high,
        low,
        close,
        volume: 100.0,
    }
}

/// 15-minute bars with a 0.1% range around each close.
pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(i, c, c * 1.001, c * 0.999, c))
        .collect()
}

/// Oscillating closes that cross both RSI thresholds repeatedly.
pub fn wave(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| 2_000.0 + 80.0 * ((i as f64) / 6.0).sin() + 15.0 * ((i as f64) / 1.7).cos())
        .collect()
}

pub fn wave_bars(len: usize) -> Vec<Bar> {
    bars_from_closes(&wave(len))
}

pub fn bars_to_csv(bars: &[Bar]) -> String {
    let mut out = String::from("timestamp,open,high,low,close,volume\n");
    for b in bars {
        let _ = writeln!(
            out,
            "{},{},{},{},{},{}",
            b.timestamp.format("%Y-%m-%d %H:%M:%S"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        );
    }
    out
}

pub fn write_bars_csv(dir: &Path, name: &str, bars: &[Bar]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bars_to_csv(bars)).unwrap();
    path
}

pub struct MockDataPort {
    pub bars: Vec<Bar>,
}

impl DataPort for MockDataPort {
    fn fetch_bars(&self) -> Result<Vec<Bar>, RsitraderError> {
        Ok(self.bars.clone())
    }

    fn source_name(&self) -> String {
        "mock".to_string()
    }
}

/// Exchange that panics on any order above `max_notional`, for exercising
/// the sweep's failure capture.
pub struct NotionalCapEngine {
    pub inner: SimulatedExchange,
    pub max_notional: f64,
}

impl SimulationEngine for NotionalCapEngine {
    fn reset(&mut self) {
        self.inner.reset();
    }

    fn submit_order(&mut self, order: OrderRequest) -> Result<OrderId, RsitraderError> {
        if order.size * order.price > self.max_notional {
            panic!("order notional above {}", self.max_notional);
        }
        self.inner.submit_order(order)
    }

    fn on_bar(&mut self, bar: &Bar) -> Result<Vec<EngineEvent>, RsitraderError> {
        self.inner.on_bar(bar)
    }

    fn starting_equity(&self) -> f64 {
        self.inner.starting_equity()
    }

    fn equity(&self) -> f64 {
        self.inner.equity()
    }

    fn equity_curve(&self) -> &[EquityPoint] {
        self.inner.equity_curve()
    }

    fn closed_trades(&self) -> &[ClosedTrade] {
        self.inner.closed_trades()
    }
}
