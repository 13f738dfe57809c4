//! Backtest engine: the per-bar FLAT/LONG state machine.
//!
//! Per-bar transition order is fixed so that same-bar ties resolve the same
//! way on every run:
//!
//! 1. LONG: raise the trailing high, then check stop loss, take profit, and
//!    trailing stop, in that priority. The first hit closes at this bar's
//!    close.
//! 2. LONG, no risk exit: evaluate the exit rule (`rule_exit`).
//! 3. FLAT: evaluate the entry rule; a fill opens at this bar's close. A bar
//!    that opens a position never also evaluates an exit.
//!
//! A position still open after the last bar is force-closed there with
//! reason `end_of_data`. Equity is recorded for every bar, flat or long.
//! All fills use the bar close; intrabar highs/lows are never consulted.

use chrono::NaiveDate;
use std::collections::HashMap;

use crate::domain::code_data::{build_unified_timeline, CodeData};
use crate::domain::error::StratsimError;
use crate::domain::execution::{enter_long, exit_long, EntryDecision, ExecutionConfig, SkipReason};
use crate::domain::indicator::{IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::indicator_helpers::compute_indicators;
use crate::domain::metrics::Metrics;
use crate::domain::ohlcv::{validate_series, OhlcvBar};
use crate::domain::portfolio::{EquityPoint, Portfolio};
use crate::domain::position::{ClosedTrade, ExitReason};
use crate::domain::rule::{extract_indicators, min_bars_required};
use crate::domain::rule_eval::evaluate;
use crate::domain::strategy::{SizingMode, Strategy};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub commission_per_trade: f64,
    pub commission_pct: f64,
    pub slippage_pct: f64,
    pub risk_free_rate: f64,
    pub portfolio_mode: bool,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: 100_000.0,
            commission_per_trade: 0.0,
            commission_pct: 0.0,
            slippage_pct: 0.0,
            risk_free_rate: 0.0,
            portfolio_mode: false,
        }
    }
}

impl BacktestConfig {
    fn execution(&self) -> ExecutionConfig {
        ExecutionConfig {
            commission_per_trade: self.commission_per_trade,
            commission_pct: self.commission_pct,
            slippage_pct: self.slippage_pct,
        }
    }
}

/// An entry signal that produced no position, kept for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedEntry {
    pub code: String,
    pub bar_index: usize,
    pub date: NaiveDate,
    pub reason: SkipReason,
}

/// The immutable outcome of a run.
#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
    pub metrics: Metrics,
    pub skipped_entries: Vec<SkippedEntry>,
}

fn invalid_config(key: &str, reason: &str) -> StratsimError {
    StratsimError::ConfigInvalid {
        section: "backtest".to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

/// Reject configurations the engine cannot run meaningfully. Surfaced before
/// the first bar; the engine never degrades to a partial result.
pub fn validate_run_inputs(
    strategy: &Strategy,
    config: &BacktestConfig,
) -> Result<(), StratsimError> {
    if config.initial_capital <= 0.0 {
        return Err(invalid_config("initial_capital", "must be positive"));
    }
    if config.commission_per_trade < 0.0 || config.commission_pct < 0.0 {
        return Err(invalid_config("commission", "must be non-negative"));
    }
    if config.slippage_pct < 0.0 {
        return Err(invalid_config("slippage_pct", "must be non-negative"));
    }
    if strategy.sizing_param <= 0.0 {
        return Err(invalid_config(
            "sizing_param",
            "sizing mode requires a positive parameter",
        ));
    }
    if strategy.sizing_mode == SizingMode::RiskBased {
        if strategy.atr_period == 0 {
            return Err(invalid_config(
                "atr_period",
                "risk_based sizing requires a positive ATR period",
            ));
        }
        if strategy.atr_multiplier <= 0.0 {
            return Err(invalid_config(
                "atr_multiplier",
                "risk_based sizing requires a positive ATR multiplier",
            ));
        }
    }
    if !(0.0..100.0).contains(&strategy.stop_loss_pct) {
        return Err(invalid_config("stop_loss_pct", "must be in [0, 100)"));
    }
    if strategy.take_profit_pct < 0.0 {
        return Err(invalid_config("take_profit_pct", "must be non-negative"));
    }
    if !(0.0..100.0).contains(&strategy.trailing_stop_pct) {
        return Err(invalid_config("trailing_stop_pct", "must be in [0, 100)"));
    }
    Ok(())
}

/// Every indicator a run needs: whatever the rules reference, plus the ATR
/// series risk-based sizing reads at entry bars.
fn required_indicators(strategy: &Strategy) -> Vec<IndicatorType> {
    let mut indicators = extract_indicators(&strategy.entry);
    for t in extract_indicators(&strategy.exit) {
        if !indicators.contains(&t) {
            indicators.push(t);
        }
    }
    if strategy.sizing_mode == SizingMode::RiskBased {
        let atr = IndicatorType::Atr(strategy.atr_period);
        if !indicators.contains(&atr) {
            indicators.push(atr);
        }
    }
    indicators
}

fn check_min_bars(code: &str, bars: usize, strategy: &Strategy) -> Result<(), StratsimError> {
    let mut minimum = min_bars_required(&[&strategy.entry, &strategy.exit]);
    if strategy.sizing_mode == SizingMode::RiskBased {
        minimum = minimum.max(IndicatorType::Atr(strategy.atr_period).warmup_bars());
    }
    if bars < minimum {
        return Err(StratsimError::InsufficientData {
            code: code.to_string(),
            bars,
            minimum,
        });
    }
    Ok(())
}

fn atr_at(
    indicators: &HashMap<IndicatorType, IndicatorSeries>,
    period: usize,
    bar_index: usize,
) -> Option<f64> {
    let series = indicators.get(&IndicatorType::Atr(period))?;
    let point = series.values.get(bar_index)?;
    if !point.valid {
        return None;
    }
    match point.value {
        IndicatorValue::Simple(v) if !v.is_nan() => Some(v),
        _ => None,
    }
}

/// Which exit fires for an open position at this bar, if any. Risk exits are
/// checked before the exit rule, in stop / take / trail priority.
fn risk_exit_reason(
    portfolio: &Portfolio,
    code: &str,
    close: f64,
    trailing_stop_pct: f64,
) -> Option<ExitReason> {
    let position = portfolio.get_position(code)?;
    if position.should_stop_loss(close) {
        Some(ExitReason::StopLoss)
    } else if position.should_take_profit(close) {
        Some(ExitReason::TakeProfit)
    } else if position.should_trailing_stop(close, trailing_stop_pct) {
        Some(ExitReason::TrailingStop)
    } else {
        None
    }
}

/// Run a single-code backtest. Strictly sequential over bars: position state
/// at bar t depends on bar t-1, so nothing here may run out of order.
pub fn run_backtest(
    bars: &[OhlcvBar],
    strategy: &Strategy,
    config: &BacktestConfig,
) -> Result<BacktestResult, StratsimError> {
    validate_run_inputs(strategy, config)?;

    let code = bars.first().map(|b| b.code.clone()).unwrap_or_default();
    validate_series(&code, bars)?;
    check_min_bars(&code, bars.len(), strategy)?;

    let indicators = compute_indicators(bars, &required_indicators(strategy));
    let exec = config.execution();

    let mut portfolio = Portfolio::new(config.initial_capital);
    let mut skipped_entries = Vec::new();

    for (i, bar) in bars.iter().enumerate() {
        if portfolio.has_position(&code) {
            portfolio
                .get_position_mut(&code)
                .unwrap()
                .update_trailing_high(bar.close);

            let reason = risk_exit_reason(&portfolio, &code, bar.close, strategy.trailing_stop_pct)
                .or_else(|| {
                    let entry_price = portfolio.get_position(&code).map(|p| p.entry_price);
                    evaluate(&strategy.exit, bars, &indicators, i, entry_price)
                        .then_some(ExitReason::RuleExit)
                });

            if let Some(reason) = reason {
                exit_long(&mut portfolio, &code, i, bar.date, bar.close, reason, &exec);
            }
        } else if evaluate(&strategy.entry, bars, &indicators, i, None) {
            let atr = atr_at(&indicators, strategy.atr_period, i);
            let equity = portfolio.cash;
            let decision = enter_long(
                &mut portfolio,
                &code,
                i,
                bar.date,
                bar.close,
                equity,
                strategy,
                &exec,
                atr,
            );
            if let EntryDecision::Skipped(reason) = decision {
                skipped_entries.push(SkippedEntry {
                    code: code.clone(),
                    bar_index: i,
                    date: bar.date,
                    reason,
                });
            }
        }

        let equity = match portfolio.get_position(&code) {
            Some(pos) => portfolio.cash + pos.market_value(bar.close),
            None => portfolio.cash,
        };
        portfolio.record_equity(bar.date, equity);
    }

    // terminal flattening at the final bar
    if portfolio.has_position(&code) {
        let last = bars.last().unwrap();
        exit_long(
            &mut portfolio,
            &code,
            bars.len() - 1,
            last.date,
            last.close,
            ExitReason::EndOfData,
            &exec,
        );
        // re-mark the final equity point at realized cash
        let final_cash = portfolio.cash;
        portfolio.equity_curve.last_mut().unwrap().equity = final_cash;
    }

    let metrics = Metrics::compute(
        &portfolio.closed_trades,
        &portfolio.equity_curve,
        config.initial_capital,
        config.risk_free_rate,
    );

    Ok(BacktestResult {
        trades: portfolio.closed_trades,
        equity_curve: portfolio.equity_curve,
        metrics,
        skipped_entries,
    })
}

/// Run a shared-cash backtest across several codes. One cash pool; within a
/// date, exits for every code settle before any entry, and entries compete
/// for cash in the order the codes were supplied (the deterministic
/// timestamp-then-ledger-order tie-break). At most one open position per
/// code.
pub fn run_portfolio_backtest(
    data: &[CodeData],
    strategy: &Strategy,
    config: &BacktestConfig,
) -> Result<BacktestResult, StratsimError> {
    validate_run_inputs(strategy, config)?;
    if data.is_empty() {
        return Err(StratsimError::Data {
            reason: "portfolio backtest requires at least one code".into(),
        });
    }
    for cd in data {
        validate_series(&cd.code, &cd.bars)?;
        check_min_bars(&cd.code, cd.bar_count(), strategy)?;
    }

    let required = required_indicators(strategy);
    let indicator_tables: Vec<HashMap<IndicatorType, IndicatorSeries>> = data
        .iter()
        .map(|cd| compute_indicators(&cd.bars, &required))
        .collect();

    let timeline = build_unified_timeline(data);
    let exec = config.execution();

    let mut portfolio = Portfolio::new(config.initial_capital);
    let mut skipped_entries = Vec::new();
    let mut last_close: HashMap<String, f64> = HashMap::new();

    for &date in &timeline {
        // exits first, across all codes
        for (cd, indicators) in data.iter().zip(&indicator_tables) {
            let Some(i) = cd.index_on(date) else { continue };
            let bar = &cd.bars[i];
            last_close.insert(cd.code.clone(), bar.close);

            if !portfolio.has_position(&cd.code) {
                continue;
            }
            portfolio
                .get_position_mut(&cd.code)
                .unwrap()
                .update_trailing_high(bar.close);

            let reason =
                risk_exit_reason(&portfolio, &cd.code, bar.close, strategy.trailing_stop_pct)
                    .or_else(|| {
                        let entry_price = portfolio.get_position(&cd.code).map(|p| p.entry_price);
                        evaluate(&strategy.exit, &cd.bars, indicators, i, entry_price)
                            .then_some(ExitReason::RuleExit)
                    });

            if let Some(reason) = reason {
                exit_long(
                    &mut portfolio,
                    &cd.code,
                    i,
                    bar.date,
                    bar.close,
                    reason,
                    &exec,
                );
            }
        }

        // entries second, first-come-first-served in supplied code order
        for (cd, indicators) in data.iter().zip(&indicator_tables) {
            let Some(i) = cd.index_on(date) else { continue };
            if portfolio.has_position(&cd.code) {
                continue;
            }
            let bar = &cd.bars[i];
            if !evaluate(&strategy.entry, &cd.bars, indicators, i, None) {
                continue;
            }

            let atr = atr_at(indicators, strategy.atr_period, i);
            let equity = portfolio.total_equity(&last_close);
            let decision = enter_long(
                &mut portfolio,
                &cd.code,
                i,
                bar.date,
                bar.close,
                equity,
                strategy,
                &exec,
                atr,
            );
            if let EntryDecision::Skipped(reason) = decision {
                skipped_entries.push(SkippedEntry {
                    code: cd.code.clone(),
                    bar_index: i,
                    date: bar.date,
                    reason,
                });
            }
        }

        portfolio.record_equity(date, portfolio.total_equity(&last_close));
    }

    // flatten whatever is still open at each code's final bar, in supplied
    // code order so the ledger tail is deterministic
    for cd in data {
        if !portfolio.has_position(&cd.code) {
            continue;
        }
        let last_index = cd.bar_count() - 1;
        let last = &cd.bars[last_index];
        exit_long(
            &mut portfolio,
            &cd.code,
            last_index,
            last.date,
            last.close,
            ExitReason::EndOfData,
            &exec,
        );
        last_close.insert(cd.code.clone(), last.close);
    }
    let final_equity = portfolio.total_equity(&last_close);
    if let Some(point) = portfolio.equity_curve.last_mut() {
        point.equity = final_equity;
    }

    let metrics = Metrics::compute(
        &portfolio.closed_trades,
        &portfolio.equity_curve,
        config.initial_capital,
        config.risk_free_rate,
    );

    Ok(BacktestResult {
        trades: portfolio.closed_trades,
        equity_curve: portfolio.equity_curve,
        metrics,
        skipped_entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rule_parser::compile;

    fn close_bar(code: &str, day: u32, close: f64) -> OhlcvBar {
        OhlcvBar {
            code: code.into(),
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000,
        }
    }

    fn bars_from(code: &str, closes: &[f64]) -> Vec<OhlcvBar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| close_bar(code, (i + 1) as u32, c))
            .collect()
    }

    fn make_strategy(entry: &str, exit: &str) -> Strategy {
        Strategy {
            name: "test".into(),
            description: String::new(),
            entry: compile(entry).unwrap(),
            exit: compile(exit).unwrap(),
            sizing_mode: SizingMode::PctCapital,
            sizing_param: 100.0,
            stop_loss_pct: 0.0,
            take_profit_pct: 0.0,
            trailing_stop_pct: 0.0,
            atr_period: 14,
            atr_multiplier: 2.0,
        }
    }

    #[test]
    fn equity_curve_length_equals_bar_count() {
        let bars = bars_from("T", &[100.0, 101.0, 102.0, 103.0, 104.0]);
        let strategy = make_strategy("price > 1000", "price < 0");
        let result = run_backtest(&bars, &strategy, &BacktestConfig::default()).unwrap();

        assert_eq!(result.equity_curve.len(), 5);
        assert!(result.trades.is_empty());
    }

    #[test]
    fn no_signal_means_flat_curve() {
        let bars = bars_from("T", &[100.0, 101.0, 102.0]);
        let strategy = make_strategy("price > 1000", "price < 0");
        let result = run_backtest(&bars, &strategy, &BacktestConfig::default()).unwrap();

        for point in &result.equity_curve {
            assert!((point.equity - 100_000.0).abs() < f64::EPSILON);
        }
        assert!(result.metrics.win_rate.is_nan());
        assert!(result.metrics.profit_factor.is_nan());
        assert!((result.metrics.total_return - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn entry_and_rule_exit() {
        // enters at 101 (price > 100.5), exits at 99 (price < 100)
        let bars = bars_from("T", &[100.0, 101.0, 102.0, 99.0, 98.0]);
        let strategy = make_strategy("price > 100.5", "price < 100");
        let result = run_backtest(&bars, &strategy, &BacktestConfig::default()).unwrap();

        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.entry_index, 1);
        assert_eq!(trade.exit_index, 3);
        assert_eq!(trade.exit_reason, ExitReason::RuleExit);
    }

    #[test]
    fn no_same_bar_round_trip() {
        // exit rule true on the entry bar must not close it that bar
        let bars = bars_from("T", &[100.0, 101.0, 102.0]);
        let strategy = make_strategy("price > 100.5", "price > 100.5");
        let result = run_backtest(&bars, &strategy, &BacktestConfig::default()).unwrap();

        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.entry_index, 1);
        assert_eq!(trade.exit_index, 2, "exit evaluated from the next bar on");
    }

    #[test]
    fn end_of_data_force_close() {
        let bars = bars_from("T", &[100.0, 101.0, 102.0, 103.0]);
        let strategy = make_strategy("price > 100.5", "price < 0");
        let result = run_backtest(&bars, &strategy, &BacktestConfig::default()).unwrap();

        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::EndOfData);
        assert_eq!(trade.exit_index, 3);
        assert!((trade.exit_price - 103.0).abs() < f64::EPSILON);
    }

    #[test]
    fn stop_loss_fires_before_rule_exit() {
        // both the stop and the exit rule would fire on bar 2; stop wins
        let bars = bars_from("T", &[100.0, 100.0, 94.0]);
        let mut strategy = make_strategy("price >= 100", "price < 95");
        strategy.stop_loss_pct = 5.0;
        let result = run_backtest(&bars, &strategy, &BacktestConfig::default()).unwrap();

        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].exit_reason, ExitReason::StopLoss);
    }

    #[test]
    fn stop_loss_scenario_pnl() {
        // entry at 100, next close 94, 5% stop, zero costs → -6%
        let bars = bars_from("T", &[100.0, 94.0, 94.0]);
        let mut strategy = make_strategy("price >= 100", "price < 0");
        strategy.stop_loss_pct = 5.0;
        let result = run_backtest(&bars, &strategy, &BacktestConfig::default()).unwrap();

        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::StopLoss);
        assert_eq!(trade.exit_index, 1);
        assert!((trade.pnl_pct - (-6.0)).abs() < 1e-9);
    }

    #[test]
    fn take_profit_fires() {
        let bars = bars_from("T", &[100.0, 112.0, 120.0]);
        let mut strategy = make_strategy("price >= 100", "price < 0");
        strategy.take_profit_pct = 10.0;
        let result = run_backtest(&bars, &strategy, &BacktestConfig::default()).unwrap();

        assert_eq!(result.trades[0].exit_reason, ExitReason::TakeProfit);
        assert_eq!(result.trades[0].exit_index, 1);
    }

    #[test]
    fn trailing_stop_follows_the_high() {
        // rises to 120, then a close at 107 breaches the 10% trail (108)
        let bars = bars_from("T", &[100.0, 110.0, 120.0, 113.0, 107.0, 100.0]);
        let mut strategy = make_strategy("price >= 100", "price < 0");
        strategy.trailing_stop_pct = 10.0;
        let result = run_backtest(&bars, &strategy, &BacktestConfig::default()).unwrap();

        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::TrailingStop);
        assert_eq!(trade.exit_index, 4);
        assert!((trade.exit_price - 107.0).abs() < f64::EPSILON);
    }

    #[test]
    fn trailing_high_updates_before_check() {
        // entry bar close is the initial high; a higher close the same bar
        // as a drawdown cannot happen with close-only fills, but the high
        // must ratchet on the exit bar itself before the check
        let bars = bars_from("T", &[100.0, 200.0, 100.0]);
        let mut strategy = make_strategy("price >= 100", "price < 0");
        strategy.trailing_stop_pct = 10.0;
        let result = run_backtest(&bars, &strategy, &BacktestConfig::default()).unwrap();

        // high ratchets to 200 on bar 1, bar 2 close 100 < 180 → trail exit
        assert_eq!(result.trades[0].exit_reason, ExitReason::TrailingStop);
        assert_eq!(result.trades[0].exit_index, 2);
    }

    #[test]
    fn stop_priority_over_trailing_stop() {
        // a close breaching both the fixed stop and the trail reports the
        // fixed stop, per the priority order
        let bars = bars_from("T", &[100.0, 80.0]);
        let mut strategy = make_strategy("price >= 100", "price < 0");
        strategy.stop_loss_pct = 5.0;
        strategy.trailing_stop_pct = 10.0;
        let result = run_backtest(&bars, &strategy, &BacktestConfig::default()).unwrap();
        assert_eq!(result.trades[0].exit_reason, ExitReason::StopLoss);
    }

    #[test]
    fn equity_marks_open_position_at_close() {
        let bars = bars_from("T", &[100.0, 110.0, 120.0]);
        let strategy = make_strategy("price >= 100", "price < 0");
        let config = BacktestConfig::default();
        let result = run_backtest(&bars, &strategy, &config).unwrap();

        // 1000 shares at 100 on bar 0; bar 1 equity = cash + 1000*110
        let qty = 1000.0;
        let cash_after_entry = 100_000.0 - qty * 100.0;
        assert!((result.equity_curve[1].equity - (cash_after_entry + qty * 110.0)).abs() < 1e-9);
    }

    #[test]
    fn insufficient_data_is_an_error() {
        let bars = bars_from("T", &[100.0, 101.0, 102.0]);
        let strategy = make_strategy("sma(5) > 0", "price < 0");
        let err = run_backtest(&bars, &strategy, &BacktestConfig::default()).unwrap_err();

        match err {
            StratsimError::InsufficientData { bars, minimum, .. } => {
                assert_eq!(bars, 3);
                assert_eq!(minimum, 5);
            }
            other => panic!("expected InsufficientData, got {:?}", other),
        }
    }

    #[test]
    fn negative_capital_is_config_error() {
        let bars = bars_from("T", &[100.0, 101.0]);
        let strategy = make_strategy("price > 0", "price < 0");
        let config = BacktestConfig {
            initial_capital: -5.0,
            ..Default::default()
        };
        assert!(matches!(
            run_backtest(&bars, &strategy, &config),
            Err(StratsimError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn risk_based_without_atr_skips_and_reports() {
        let bars = bars_from("T", &[100.0, 101.0, 102.0, 103.0]);
        let mut strategy = make_strategy("price > 0", "price < 0");
        strategy.sizing_mode = SizingMode::RiskBased;
        strategy.sizing_param = 1.0;
        strategy.atr_period = 3;

        let result = run_backtest(&bars, &strategy, &BacktestConfig::default()).unwrap();

        // ATR(3) is undefined on bars 0-1: those signals are skipped, the
        // bar-2 signal enters
        assert!(result
            .skipped_entries
            .iter()
            .any(|s| s.reason == SkipReason::AtrUnavailable));
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].entry_index, 2);
    }

    #[test]
    fn ledger_never_overlaps() {
        let closes: Vec<f64> = (0..30)
            .map(|i| 100.0 + ((i % 6) as f64 - 3.0) * 2.0)
            .collect();
        let bars = bars_from("T", &closes);
        let strategy = make_strategy("price > 100", "price < 100");
        let result = run_backtest(&bars, &strategy, &BacktestConfig::default()).unwrap();

        for pair in result.trades.windows(2) {
            assert!(pair[0].exit_index <= pair[1].entry_index);
        }
        for trade in &result.trades {
            assert!(trade.entry_index < trade.exit_index || trade.exit_reason == ExitReason::EndOfData);
        }
    }

    #[test]
    fn commission_and_slippage_reduce_returns() {
        let bars = bars_from("T", &[100.0, 101.0, 102.0, 103.0, 104.0]);
        let strategy = make_strategy("price > 100.5", "price < 0");

        let clean = run_backtest(&bars, &strategy, &BacktestConfig::default()).unwrap();
        let costly = run_backtest(
            &bars,
            &strategy,
            &BacktestConfig {
                commission_pct: 0.5,
                slippage_pct: 0.5,
                ..Default::default()
            },
        )
        .unwrap();

        assert!(costly.metrics.total_return < clean.metrics.total_return);
    }

    mod portfolio_mode {
        use super::*;

        fn make_data(specs: &[(&str, &[f64])]) -> Vec<CodeData> {
            specs
                .iter()
                .map(|(code, closes)| CodeData::new(code.to_string(), bars_from(code, closes)))
                .collect()
        }

        #[test]
        fn shared_cash_first_come_first_served() {
            // both codes signal on bar 0; A is supplied first and takes the
            // whole pool, B's entry is skipped for cash
            let data = make_data(&[("A", &[100.0, 101.0]), ("B", &[50.0, 51.0])]);
            let mut strategy = make_strategy("price > 0", "price < 0");
            strategy.sizing_param = 100.0;
            let config = BacktestConfig {
                portfolio_mode: true,
                ..Default::default()
            };

            let result = run_portfolio_backtest(&data, &strategy, &config).unwrap();

            let a_trades: Vec<_> = result.trades.iter().filter(|t| t.code == "A").collect();
            let b_trades: Vec<_> = result.trades.iter().filter(|t| t.code == "B").collect();
            assert_eq!(a_trades.len(), 1);
            assert!(b_trades.is_empty());
            assert!(result
                .skipped_entries
                .iter()
                .any(|s| s.code == "B" && s.reason == SkipReason::InsufficientCash));
        }

        #[test]
        fn splitting_the_pool_funds_both() {
            let data = make_data(&[("A", &[100.0, 101.0]), ("B", &[50.0, 51.0])]);
            let mut strategy = make_strategy("price > 0", "price < 0");
            strategy.sizing_param = 40.0;
            let config = BacktestConfig {
                portfolio_mode: true,
                ..Default::default()
            };

            let result = run_portfolio_backtest(&data, &strategy, &config).unwrap();
            assert_eq!(result.trades.len(), 2);
        }

        #[test]
        fn equity_curve_covers_unified_timeline() {
            // A trades days 1-2, B days 2-3 → timeline has 3 dates
            let data = vec![
                CodeData::new("A".into(), bars_from("A", &[100.0, 101.0])),
                CodeData::new(
                    "B".into(),
                    vec![close_bar("B", 2, 50.0), close_bar("B", 3, 51.0)],
                ),
            ];
            let strategy = make_strategy("price > 1000", "price < 0");
            let config = BacktestConfig {
                portfolio_mode: true,
                ..Default::default()
            };

            let result = run_portfolio_backtest(&data, &strategy, &config).unwrap();
            assert_eq!(result.equity_curve.len(), 3);
        }

        #[test]
        fn open_positions_flattened_at_each_codes_last_bar() {
            let data = make_data(&[("A", &[100.0, 101.0, 102.0])]);
            let strategy = make_strategy("price > 0", "price < 0");
            let config = BacktestConfig {
                portfolio_mode: true,
                ..Default::default()
            };

            let result = run_portfolio_backtest(&data, &strategy, &config).unwrap();
            assert_eq!(result.trades.len(), 1);
            assert_eq!(result.trades[0].exit_reason, ExitReason::EndOfData);
            assert_eq!(result.trades[0].exit_index, 2);
        }

        #[test]
        fn insufficient_data_for_any_code_fails_the_run() {
            let data = make_data(&[("A", &[100.0; 10]), ("B", &[50.0, 51.0])]);
            let strategy = make_strategy("sma(5) > 0", "price < 0");
            let config = BacktestConfig {
                portfolio_mode: true,
                ..Default::default()
            };

            assert!(matches!(
                run_portfolio_backtest(&data, &strategy, &config),
                Err(StratsimError::InsufficientData { .. })
            ));
        }
    }
}
