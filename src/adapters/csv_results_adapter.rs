//! Writes sweep results as CSV tables plus the text summary.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{error, info};

use crate::domain::backtest::TrialResult;
use crate::domain::error::RsitraderError;
use crate::domain::sweep::ResultSet;
use crate::ports::results_port::ResultsPort;

pub const ALL_RESULTS_FILE: &str = "all_results.csv";
pub const FILTERED_RESULTS_FILE: &str = "filtered_results.csv";
pub const SUMMARY_FILE: &str = "summary_report.txt";

#[derive(Debug, Serialize)]
struct ResultRow {
    rank: usize,
    rsi_period: usize,
    oversold: f64,
    overbought: f64,
    stop_loss_pct: f64,
    take_profit_pct: f64,
    position_size_pct: f64,
    total_pnl: f64,
    return_pct: f64,
    total_trades: usize,
    winning_trades: usize,
    losing_trades: usize,
    win_rate: f64,
    sharpe_ratio: f64,
    max_drawdown: f64,
    profit_factor: f64,
    passes_filter: bool,
}

impl ResultRow {
    fn new(rank: usize, r: &TrialResult, passes_filter: bool) -> Self {
        let c = &r.config;
        let m = &r.metrics;
        ResultRow {
            rank,
            rsi_period: c.rsi_period,
            oversold: c.oversold,
            overbought: c.overbought,
            stop_loss_pct: c.stop_loss_pct,
            take_profit_pct: c.take_profit_pct,
            position_size_pct: c.position_size_pct,
            total_pnl: m.total_pnl,
            return_pct: m.return_pct,
            total_trades: m.total_trades,
            winning_trades: m.winning_trades,
            losing_trades: m.losing_trades,
            win_rate: m.win_rate,
            sharpe_ratio: m.sharpe_ratio,
            max_drawdown: m.max_drawdown,
            profit_factor: m.profit_factor,
            passes_filter,
        }
    }
}

pub struct CsvResultsAdapter {
    output_dir: PathBuf,
}

impl CsvResultsAdapter {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn resource_error(target: &Path, reason: impl ToString) -> RsitraderError {
        let err = RsitraderError::Resource {
            target: target.display().to_string(),
            reason: reason.to_string(),
        };
        error!(error = %err, "write failed");
        err
    }

    fn ensure_dir(&self) -> Result<(), RsitraderError> {
        fs::create_dir_all(&self.output_dir)
            .map_err(|e| Self::resource_error(&self.output_dir, e))
    }

    fn write_table(
        &self,
        name: &str,
        rows: &[&TrialResult],
        results: &ResultSet,
    ) -> Result<PathBuf, RsitraderError> {
        let path = self.output_dir.join(name);
        let mut writer =
            csv::Writer::from_path(&path).map_err(|e| Self::resource_error(&path, e))?;
        for (i, r) in rows.iter().enumerate() {
            writer
                .serialize(ResultRow::new(i + 1, r, results.passes_filter(r)))
                .map_err(|e| Self::resource_error(&path, e))?;
        }
        writer.flush().map_err(|e| Self::resource_error(&path, e))?;
        Ok(path)
    }
}

impl ResultsPort for CsvResultsAdapter {
    fn write_results(&self, results: &ResultSet) -> Result<(), RsitraderError> {
        self.ensure_dir()?;
        let all = self.write_table(ALL_RESULTS_FILE, &results.ranked(), results)?;
        let filtered = self.write_table(FILTERED_RESULTS_FILE, &results.filtered(), results)?;
        info!(
            all = %all.display(),
            filtered = %filtered.display(),
            "results written"
        );
        Ok(())
    }

    fn write_summary(&self, summary: &str) -> Result<(), RsitraderError> {
        self.ensure_dir()?;
        let path = self.output_dir.join(SUMMARY_FILE);
        fs::write(&path, summary).map_err(|e| Self::resource_error(&path, e))?;
        info!(path = %path.display(), "summary written");
        Ok(())
    }
}
