//! End-to-end tests over the public API: bar feed, trial runner, sweep and
//! result set, without touching the CLI.

mod common;

use approx::assert_relative_eq;
use common::*;
use rsitrader::adapters::csv_adapter::CsvAdapter;
use rsitrader::domain::backtest::{BacktestSettings, TrialRunner};
use rsitrader::domain::oscillator::OscillatorSnapshot;
use rsitrader::domain::position::{Position, Side};
use rsitrader::domain::signal::{Action, SignalEngine};
use rsitrader::domain::strategy::StrategyConfig;
use rsitrader::domain::sweep::{FilterCriteria, Optimizer, Parameter, SearchSpace};
use rsitrader::ports::data_port::DataPort;

fn base() -> StrategyConfig {
    StrategyConfig {
        rsi_period: 5,
        ..StrategyConfig::default()
    }
}

/// 4 x 4 x 3 = 48 valid combinations around `base()`.
fn small_space() -> SearchSpace {
    SearchSpace::from_base(&base())
        .with_axis(Parameter::Oversold, vec![20.0, 25.0, 30.0, 35.0])
        .unwrap()
        .with_axis(Parameter::Overbought, vec![65.0, 70.0, 75.0, 80.0])
        .unwrap()
        .with_axis(Parameter::StopLoss, vec![1.0, 1.5, 2.0])
        .unwrap()
}

/// 5 x 10 x 10 = 500 combinations.
fn large_space() -> SearchSpace {
    SearchSpace::from_base(&base())
        .with_axis(Parameter::RsiPeriod, vec![3.0, 4.0, 5.0, 6.0, 7.0])
        .unwrap()
        .with_axis(
            Parameter::Oversold,
            (0..10).map(|i| 20.0 + i as f64).collect(),
        )
        .unwrap()
        .with_axis(
            Parameter::Overbought,
            (0..10).map(|i| 70.0 + i as f64).collect(),
        )
        .unwrap()
}

mod trial_runner {
    use super::*;

    #[test]
    fn csv_feed_drives_a_trial() {
        let dir = tempfile::tempdir().unwrap();
        let bars = wave_bars(300);
        let path = write_bars_csv(dir.path(), "bars.csv", &bars);

        let feed = CsvAdapter::new(path);
        let loaded = feed.fetch_bars().unwrap();
        assert_eq!(loaded.len(), bars.len());

        let settings = BacktestSettings::default();
        let from_csv = settings.runner().unwrap().run(&base(), &loaded).unwrap();
        let from_memory = settings.runner().unwrap().run(&base(), &bars).unwrap();
        assert_eq!(from_csv.metrics.total_trades, from_memory.metrics.total_trades);
        assert_relative_eq!(
            from_csv.metrics.total_pnl,
            from_memory.metrics.total_pnl,
            epsilon = 1e-6
        );
    }

    #[test]
    fn same_config_same_result_on_reused_engine() {
        let port = MockDataPort {
            bars: wave_bars(400),
        };
        let bars = port.fetch_bars().unwrap();
        let mut runner = BacktestSettings::default().runner().unwrap();

        let first = runner.run(&base(), &bars).unwrap();
        for period in [3, 9, 14] {
            let other = StrategyConfig {
                rsi_period: period,
                ..base()
            };
            runner.run(&other, &bars).unwrap();
        }
        let again = runner.run(&base(), &bars).unwrap();
        assert_eq!(format!("{first:?}"), format!("{again:?}"));
    }

    #[test]
    fn pnl_matches_equity_change() {
        let bars = wave_bars(400);
        let mut runner = BacktestSettings::default().runner().unwrap();
        let result = runner.run(&base(), &bars).unwrap();
        let m = &result.metrics;
        assert!(m.total_trades > 0);
        assert_relative_eq!(m.total_pnl, m.ending_equity - m.starting_equity, epsilon = 1e-6);
        assert_relative_eq!(
            m.return_pct,
            m.total_pnl / m.starting_equity * 100.0,
            epsilon = 1e-9
        );
        assert!(m.max_drawdown >= 0.0 && m.max_drawdown <= 1.0);
        assert!(m.win_rate >= 0.0 && m.win_rate <= 1.0);
    }
}

mod signals {
    use super::*;

    #[test]
    fn crossing_above_oversold_opens_long() {
        let engine = SignalEngine::new(StrategyConfig::default(), Default::default());
        let bar = make_bar(20, 2_000.0, 2_004.0, 1_995.0, 2_000.0);
        let snapshot = OscillatorSnapshot {
            value: Some(32.0),
            previous: Some(25.0),
            crossed_above_oversold: true,
            crossed_below_overbought: false,
        };

        match engine.on_bar(&bar, &snapshot, &Position::Flat, 100_000.0) {
            Action::OpenLong(order) => {
                // 2% of 100k at 2000 = 1.0 ETH.
                assert_relative_eq!(order.size, 1.0, epsilon = 1e-9);
                assert_relative_eq!(order.entry_price, 2_000.0);
                assert_relative_eq!(order.stop_loss, 1_970.0, epsilon = 1e-9);
                assert_relative_eq!(order.take_profit, 2_060.0, epsilon = 1e-9);
            }
            other => panic!("expected OpenLong, got {other:?}"),
        }
    }

    #[test]
    fn no_entry_while_position_open() {
        let engine = SignalEngine::new(StrategyConfig::default(), Default::default());
        let bar = make_bar(20, 2_000.0, 2_004.0, 1_995.0, 2_000.0);
        let snapshot = OscillatorSnapshot {
            value: Some(32.0),
            previous: Some(25.0),
            crossed_above_oversold: true,
            crossed_below_overbought: false,
        };
        let open = Position::Open(rsitrader::domain::position::OpenPosition {
            side: Side::Long,
            entry_price: 1_990.0,
            size: 1.0,
            stop_loss: 1_960.0,
            take_profit: 2_050.0,
        });
        assert_eq!(engine.on_bar(&bar, &snapshot, &open, 100_000.0), Action::NoOp);
    }
}

mod sweep {
    use super::*;

    #[test]
    fn small_space_is_evaluated_exhaustively() {
        let bars = wave_bars(300);
        let space = small_space();
        assert_eq!(space.combination_count(), 48);

        let mut optimizer = Optimizer::new(BacktestSettings::default().runner().unwrap(), &bars);
        let outcome = optimizer.run(&space, 200);

        assert!(!outcome.sampled);
        assert_eq!(outcome.total_combinations, 48);
        assert_eq!(outcome.evaluated(), 48);
        assert_eq!(outcome.skipped, 0);
        assert!(outcome.failed.is_empty());
        outcome.require_results().unwrap();
    }

    #[test]
    fn large_space_is_capped_and_reproducible() {
        let bars = wave_bars(200);
        let space = large_space();
        assert_eq!(space.combination_count(), 500);

        let run = |seed| {
            Optimizer::new(BacktestSettings::default().runner().unwrap(), &bars)
                .with_seed(seed)
                .run(&space, 200)
        };
        let first = run(42);
        let second = run(42);
        let other = run(7);

        assert!(first.sampled);
        assert_eq!(first.evaluated() + first.skipped + first.failed.len(), 200);

        let configs = |o: &rsitrader::domain::sweep::SweepOutcome| {
            o.results
                .results()
                .iter()
                .map(|r| r.config.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(configs(&first), configs(&second));
        assert_ne!(configs(&first), configs(&other));

        let mut distinct = configs(&first)
            .iter()
            .map(|c| format!("{c}"))
            .collect::<Vec<_>>();
        distinct.sort();
        distinct.dedup();
        assert_eq!(distinct.len(), first.evaluated());
    }

    #[test]
    fn ranking_is_deterministic() {
        let bars = wave_bars(300);
        let run = || {
            Optimizer::new(BacktestSettings::default().runner().unwrap(), &bars)
                .run(&small_space(), 200)
        };
        let a = run();
        let b = run();
        let order = |o: &rsitrader::domain::sweep::SweepOutcome| {
            o.results
                .ranked()
                .iter()
                .map(|r| format!("{}", r.config))
                .collect::<Vec<_>>()
        };
        assert_eq!(order(&a), order(&b));

        let ranked = a.results.ranked();
        for pair in ranked.windows(2) {
            let (x, y) = (pair[0].sharpe_ratio(), pair[1].sharpe_ratio());
            assert!(y.is_nan() || x >= y, "{x} ranked before {y}");
        }
    }

    #[test]
    fn invalid_combinations_are_skipped_not_failed() {
        let bars = wave_bars(120);
        let space = SearchSpace::from_base(&base())
            .with_axis(Parameter::Oversold, vec![30.0, 75.0])
            .unwrap();

        let outcome =
            Optimizer::new(BacktestSettings::default().runner().unwrap(), &bars).run(&space, 10);
        assert_eq!(outcome.evaluated(), 1);
        assert_eq!(outcome.skipped, 1);
        assert!(outcome.failed.is_empty());
    }

    #[test]
    fn engine_failures_are_recorded_and_sweep_continues() {
        let bars = wave_bars(400);
        let settings = BacktestSettings::default();
        let engine = NotionalCapEngine {
            inner: settings.build_engine().unwrap(),
            max_notional: 3_000.0,
        };
        let runner = TrialRunner::new(engine, settings.instrument.clone(), settings.periods_per_year);
        let space = SearchSpace::from_base(&base())
            .with_axis(Parameter::PositionSize, vec![1.0, 5.0])
            .unwrap();

        let outcome = Optimizer::new(runner, &bars).run(&space, 10);

        assert_eq!(outcome.evaluated(), 1);
        assert_eq!(outcome.failed.len(), 1);
        let failure = &outcome.failed[0];
        assert_relative_eq!(failure.config.position_size_pct, 5.0);
        assert!(failure.error.contains("notional"), "{}", failure.error);
        assert_relative_eq!(outcome.results.results()[0].config.position_size_pct, 1.0);
    }

    #[test]
    fn nothing_passing_the_filter_is_still_a_result() {
        let bars = wave_bars(300);
        let strict = FilterCriteria {
            min_sharpe: 1e9,
            min_win_rate: 0.99,
            max_drawdown: Some(0.0),
        };
        let outcome = Optimizer::new(BacktestSettings::default().runner().unwrap(), &bars)
            .with_criteria(strict)
            .run(&small_space(), 200);
        assert_eq!(outcome.evaluated(), 48);
        assert!(outcome.results.filtered().is_empty());
        assert!(outcome.results.best().is_some());
        outcome.require_results().unwrap();
    }

    #[test]
    fn no_bars_gives_results_without_trades() {
        let outcome = Optimizer::new(BacktestSettings::default().runner().unwrap(), &[])
            .run(&small_space(), 5);
        assert_eq!(outcome.evaluated(), 5);
        assert!(outcome
            .results
            .results()
            .iter()
            .all(|r| r.metrics.total_trades == 0 && r.sharpe_ratio().is_nan()));
    }
}
