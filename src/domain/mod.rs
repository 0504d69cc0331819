//! Core domain types and logic.

pub mod ohlcv;
pub mod instrument;
pub mod oscillator;
pub mod position;
pub mod strategy;
pub mod signal;
pub mod portfolio;
pub mod execution;
pub mod metrics;
pub mod backtest;
pub mod sweep;
pub mod config_validation;
pub mod error;
