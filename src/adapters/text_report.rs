//! Plain-text tables and the sweep summary report.

use std::fmt::Write;

use crate::domain::backtest::TrialResult;
use crate::domain::sweep::{ResultSet, SweepOutcome};

const RULE_WIDTH: usize = 80;

fn rule(c: char) -> String {
    std::iter::repeat_n(c, RULE_WIDTH).collect()
}

/// `n/a` for an undefined ratio.
pub fn format_ratio(value: f64) -> String {
    if value.is_nan() {
        "n/a".to_string()
    } else {
        format!("{value:.2}")
    }
}

/// `$1,234.56`, `-$75.00`.
pub fn format_money(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let cents = format!("{:.2}", value.abs());
    let (whole, frac) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    format!("{sign}${grouped}.{frac}")
}

fn table_header(out: &mut String) {
    let _ = writeln!(
        out,
        "{:>4} {:>7} {:>13} {:>8} {:>6} {:>6} {:>4} {:>5} {:>5} {:>5} {:>5} {:>5}",
        "#", "Sharpe", "PnL", "Return%", "Win%", "Trades", "RSI", "OS", "OB", "SL%", "TP%", "Size%"
    );
}

fn table_row(out: &mut String, rank: usize, r: &TrialResult) {
    let m = &r.metrics;
    let c = &r.config;
    let _ = writeln!(
        out,
        "{:>4} {:>7} {:>13} {:>8.2} {:>6.1} {:>6} {:>4} {:>5} {:>5} {:>5} {:>5} {:>5}",
        rank,
        format_ratio(m.sharpe_ratio),
        format_money(m.total_pnl),
        m.return_pct,
        m.win_rate * 100.0,
        m.total_trades,
        c.rsi_period,
        c.oversold,
        c.overbought,
        c.stop_loss_pct,
        c.take_profit_pct,
        c.position_size_pct
    );
}

/// Rows in the given order, numbered from 1.
pub fn results_table(rows: &[&TrialResult]) -> String {
    let mut out = String::new();
    if rows.is_empty() {
        out.push_str("(no results)\n");
        return out;
    }
    table_header(&mut out);
    for (i, r) in rows.iter().enumerate() {
        table_row(&mut out, i + 1, r);
    }
    out
}

pub fn top_results_table(results: &ResultSet, n: usize) -> String {
    let ranked = results.ranked();
    let shown = &ranked[..n.min(ranked.len())];

    let mut out = String::new();
    let _ = writeln!(out, "{}", rule('='));
    let _ = writeln!(out, "TOP {} PARAMETERS (sorted by Sharpe ratio)", shown.len());
    let _ = writeln!(out, "{}", rule('='));
    out.push_str(&results_table(shown));
    out
}

pub fn sensitivity_table(results: &ResultSet) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", rule('='));
    let _ = writeln!(out, "PARAMETER IMPACT");
    let _ = writeln!(out, "{}", rule('='));

    let rows = results.sensitivity_all();
    if rows.is_empty() {
        out.push_str("(no parameter varies)\n");
        return out;
    }

    let mut current = None;
    for row in rows {
        if current != Some(row.parameter) {
            current = Some(row.parameter);
            let _ = writeln!(out, "\n{}:", row.parameter);
            let _ = writeln!(
                out,
                "{:>10} {:>6} {:>12} {:>14} {:>10}",
                "value", "n", "mean Sharpe", "mean PnL", "mean Win%"
            );
        }
        let _ = writeln!(
            out,
            "{:>10} {:>6} {:>12} {:>14} {:>10.1}",
            row.value,
            row.count,
            format_ratio(row.mean_sharpe),
            format_money(row.mean_pnl),
            row.mean_win_rate * 100.0
        );
    }
    out
}

/// Metrics and parameters of one backtest.
pub fn single_result(result: &TrialResult) -> String {
    let m = &result.metrics;
    let mut out = String::new();
    let _ = writeln!(out, "{}", rule('='));
    let _ = writeln!(out, "BACKTEST RESULT: {}", result.config);
    let _ = writeln!(out, "{}", rule('='));
    let _ = writeln!(out, "  Starting Equity: {}", format_money(m.starting_equity));
    let _ = writeln!(out, "  Ending Equity:   {}", format_money(m.ending_equity));
    let _ = writeln!(out, "  Total PnL:       {}", format_money(m.total_pnl));
    let _ = writeln!(out, "  Total Return:    {:.2}%", m.return_pct);
    let _ = writeln!(out, "  Sharpe Ratio:    {}", format_ratio(m.sharpe_ratio));
    let _ = writeln!(out, "  Max Drawdown:    {:.2}%", m.max_drawdown * 100.0);
    let _ = writeln!(
        out,
        "  Trades:          {} ({} won, {} lost)",
        m.total_trades, m.winning_trades, m.losing_trades
    );
    let _ = writeln!(out, "  Win Rate:        {:.2}%", m.win_rate * 100.0);
    let _ = writeln!(out, "  Profit Factor:   {}", format_ratio(m.profit_factor));
    out
}

pub fn summary_report(outcome: &SweepOutcome) -> String {
    let results = &outcome.results;
    let mut out = String::new();
    let _ = writeln!(out, "{}", rule('='));
    let _ = writeln!(out, "RSI STRATEGY OPTIMIZATION SUMMARY REPORT");
    let _ = writeln!(out, "{}", rule('='));
    let _ = writeln!(out);

    let profitable = results
        .results()
        .iter()
        .filter(|r| r.total_pnl() > 0.0)
        .count();
    let _ = writeln!(out, "OVERALL STATISTICS:");
    let _ = writeln!(out, "  Search space size: {}", outcome.total_combinations);
    let _ = writeln!(
        out,
        "  Combinations tested: {}{}",
        outcome.evaluated(),
        if outcome.sampled { " (sampled)" } else { "" }
    );
    let _ = writeln!(out, "  Skipped (invalid): {}", outcome.skipped);
    let _ = writeln!(out, "  Failed trials: {}", outcome.failed.len());
    let _ = writeln!(out, "  Profitable: {profitable}");
    let _ = writeln!(out, "  Unprofitable: {}", outcome.evaluated() - profitable);
    let _ = writeln!(out, "  Passing filter: {}", results.filtered().len());
    let _ = writeln!(out);

    let ranked = results.ranked();
    let Some(best) = ranked.first() else {
        let _ = writeln!(out, "No configuration produced a result.");
        let _ = writeln!(out, "{}", rule('='));
        return out;
    };

    let m = &best.metrics;
    let c = &best.config;
    let _ = writeln!(out, "BEST PERFORMANCE:");
    let _ = writeln!(out, "  Sharpe Ratio: {}", format_ratio(m.sharpe_ratio));
    let _ = writeln!(out, "  Total PnL: {}", format_money(m.total_pnl));
    let _ = writeln!(out, "  Total Return: {:.2}%", m.return_pct);
    let _ = writeln!(out, "  Win Rate: {:.2}%", m.win_rate * 100.0);
    let _ = writeln!(out, "  Max Drawdown: {:.2}%", m.max_drawdown * 100.0);
    let _ = writeln!(out, "  Total Trades: {}", m.total_trades);
    let _ = writeln!(out);

    let _ = writeln!(out, "OPTIMAL PARAMETERS:");
    let _ = writeln!(out, "  RSI Period: {}", c.rsi_period);
    let _ = writeln!(out, "  RSI Oversold: {}", c.oversold);
    let _ = writeln!(out, "  RSI Overbought: {}", c.overbought);
    let _ = writeln!(out, "  Stop Loss: {}%", c.stop_loss_pct);
    let _ = writeln!(out, "  Take Profit: {}%", c.take_profit_pct);
    let _ = writeln!(out, "  Position Size: {}%", c.position_size_pct);
    let _ = writeln!(out);

    let _ = writeln!(out, "TOP 3 PARAMETER COMBINATIONS:");
    for (i, r) in ranked.iter().take(3).enumerate() {
        let _ = writeln!(
            out,
            "\n  #{}: Sharpe={}, PnL={}",
            i + 1,
            format_ratio(r.sharpe_ratio()),
            format_money(r.total_pnl())
        );
        let _ = writeln!(out, "      {}", r.config);
    }

    if !outcome.failed.is_empty() {
        let _ = writeln!(out, "\nFAILED TRIALS:");
        for failure in &outcome.failed {
            let _ = writeln!(out, "  {}: {}", failure.config, failure.error);
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", rule('='));
    out
}
