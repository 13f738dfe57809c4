//! Performance metrics derived from the trade ledger and equity curve.
//!
//! Ratios that are undefined for a given run (no trades, no losing trades,
//! zero return variance, zero-day span) are reported as NaN, never as zero —
//! a flat result and an unmeasurable one must stay distinguishable.

use super::portfolio::EquityPoint;
use super::position::ClosedTrade;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const CALENDAR_DAYS_PER_YEAR: f64 = 365.25;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub total_return: f64,
    pub cagr: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    pub max_drawdown_duration: i64,
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub expectancy: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_holding_days: f64,
}

impl Metrics {
    pub fn compute(
        trades: &[ClosedTrade],
        equity_curve: &[EquityPoint],
        initial_capital: f64,
        risk_free_rate: f64,
    ) -> Self {
        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_capital);

        let total_return = if initial_capital > 0.0 {
            final_equity / initial_capital - 1.0
        } else {
            0.0
        };

        let cagr = compute_cagr(equity_curve, initial_capital, final_equity);

        let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
        let (sharpe_ratio, sortino_ratio) = compute_risk_adjusted(equity_curve, daily_rf);
        let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity_curve);

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut total_pnl = 0.0_f64;
        let mut total_holding_days = 0i64;

        for trade in trades {
            let pnl = trade.pnl;
            total_pnl += pnl;
            total_holding_days += trade.holding_days();
            if pnl > 0.0 {
                trades_won += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                trades_lost += 1;
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            } else {
                trades_breakeven += 1;
            }
        }

        let total_trades = trades.len();
        let win_rate = if total_trades > 0 {
            trades_won as f64 / total_trades as f64
        } else {
            f64::NAN
        };

        let profit_factor = if total_trades == 0 || trades_lost == 0 {
            f64::NAN
        } else {
            total_wins / total_losses
        };

        let expectancy = if total_trades > 0 {
            total_pnl / total_trades as f64
        } else {
            0.0
        };

        let avg_win = if trades_won > 0 {
            total_wins / trades_won as f64
        } else {
            0.0
        };
        let avg_loss = if trades_lost > 0 {
            total_losses / trades_lost as f64
        } else {
            0.0
        };
        let avg_holding_days = if total_trades > 0 {
            total_holding_days as f64 / total_trades as f64
        } else {
            0.0
        };

        Metrics {
            total_return,
            cagr,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            max_drawdown_duration,
            total_trades,
            trades_won,
            trades_lost,
            trades_breakeven,
            win_rate,
            profit_factor,
            expectancy,
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
            avg_holding_days,
        }
    }
}

/// (final/initial)^(365.25/days) - 1 over the curve's calendar span.
fn compute_cagr(equity_curve: &[EquityPoint], initial_capital: f64, final_equity: f64) -> f64 {
    if initial_capital <= 0.0 || equity_curve.len() < 2 {
        return f64::NAN;
    }
    let days = (equity_curve.last().unwrap().date - equity_curve[0].date).num_days();
    if days <= 0 {
        return f64::NAN;
    }
    (final_equity / initial_capital).powf(CALENDAR_DAYS_PER_YEAR / days as f64) - 1.0
}

fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, i64) {
    if equity_curve.is_empty() {
        return (0.0, 0);
    }

    let mut peak = equity_curve[0].equity;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0i64;
    let mut current_dd_duration = 0i64;

    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
            current_dd_duration = 0;
        } else if peak > 0.0 {
            let dd = (peak - point.equity) / peak;
            max_dd = max_dd.max(dd);
            current_dd_duration += 1;
            max_dd_duration = max_dd_duration.max(current_dd_duration);
        }
    }

    (max_dd, max_dd_duration)
}

fn compute_risk_adjusted(equity_curve: &[EquityPoint], daily_rf: f64) -> (f64, f64) {
    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            if w[0].equity > 0.0 {
                w[1].equity / w[0].equity - 1.0
            } else {
                0.0
            }
        })
        .collect();

    if returns.len() < 2 {
        return (f64::NAN, f64::NAN);
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    let excess = mean - daily_rf;
    let sharpe = if stddev > 0.0 {
        excess / stddev * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        f64::NAN
    };

    let downside_sq_sum: f64 = returns
        .iter()
        .filter(|&&r| r < daily_rf)
        .map(|&r| (r - daily_rf).powi(2))
        .sum();
    let downside_stddev = (downside_sq_sum / n).sqrt();
    let sortino = if downside_stddev > 0.0 {
        excess / downside_stddev * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        f64::NAN
    };

    (sharpe, sortino)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::ExitReason;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn make_curve(values: &[f64]) -> Vec<EquityPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| EquityPoint {
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                    + chrono::Duration::days(i as i64),
                equity: v,
            })
            .collect()
    }

    fn make_trade(pnl: f64, days: i64) -> ClosedTrade {
        let entry_date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        ClosedTrade {
            code: "AAPL".into(),
            quantity: 100,
            entry_index: 0,
            exit_index: days as usize,
            entry_date,
            exit_date: entry_date + chrono::Duration::days(days),
            entry_price: 100.0,
            exit_price: 100.0 + pnl / 100.0,
            exit_reason: ExitReason::RuleExit,
            pnl,
            pnl_pct: pnl / 100.0,
        }
    }

    #[test]
    fn zero_trades_round_trip() {
        let curve = make_curve(&[100_000.0, 100_000.0, 100_000.0]);
        let m = Metrics::compute(&[], &curve, 100_000.0, 0.0);

        assert!((m.total_return - 0.0).abs() < f64::EPSILON);
        assert!(m.win_rate.is_nan());
        assert!(m.profit_factor.is_nan());
        assert_eq!(m.total_trades, 0);
    }

    #[test]
    fn total_return_signs() {
        let m = Metrics::compute(&[], &make_curve(&[100_000.0, 110_000.0]), 100_000.0, 0.0);
        assert_relative_eq!(m.total_return, 0.10, max_relative = 1e-12);

        let m = Metrics::compute(&[], &make_curve(&[100_000.0, 90_000.0]), 100_000.0, 0.0);
        assert_relative_eq!(m.total_return, -0.10, max_relative = 1e-12);
    }

    #[test]
    fn cagr_uses_calendar_span() {
        // 10% over 365.25-ish days should be close to 10% annualized; use a
        // curve spanning exactly 365 days
        let mut curve = make_curve(&vec![100_000.0; 366]);
        curve.last_mut().unwrap().equity = 110_000.0;
        let m = Metrics::compute(&[], &curve, 100_000.0, 0.0);

        let expected = (1.1_f64).powf(365.25 / 365.0) - 1.0;
        assert_relative_eq!(m.cagr, expected, max_relative = 1e-12);
    }

    #[test]
    fn cagr_zero_span_is_nan() {
        let m = Metrics::compute(&[], &make_curve(&[100_000.0]), 100_000.0, 0.0);
        assert!(m.cagr.is_nan());
    }

    #[test]
    fn sharpe_flat_curve_is_nan() {
        let m = Metrics::compute(&[], &make_curve(&[100.0, 100.0, 100.0]), 100.0, 0.0);
        assert!(m.sharpe_ratio.is_nan(), "zero stddev must be NaN, not 0");
    }

    #[test]
    fn sharpe_too_few_observations_is_nan() {
        let m = Metrics::compute(&[], &make_curve(&[100.0, 101.0]), 100.0, 0.0);
        assert!(m.sharpe_ratio.is_nan());
    }

    #[test]
    fn sharpe_positive_for_steady_gains() {
        let values: Vec<f64> = (0..100).map(|i| 100_000.0 * 1.001_f64.powi(i)).collect();
        let m = Metrics::compute(&[], &make_curve(&values), 100_000.0, 0.0);
        assert!(m.sharpe_ratio > 0.0);
    }

    #[test]
    fn sortino_nan_without_downside() {
        let values: Vec<f64> = (0..10).map(|i| 100_000.0 + 100.0 * i as f64).collect();
        let m = Metrics::compute(&[], &make_curve(&values), 100_000.0, 0.0);
        assert!(m.sortino_ratio.is_nan());
    }

    #[test]
    fn max_drawdown_peak_to_trough() {
        let m = Metrics::compute(
            &[],
            &make_curve(&[100.0, 110.0, 90.0, 95.0, 80.0, 100.0]),
            100.0,
            0.0,
        );
        assert!((m.max_drawdown - (110.0 - 80.0) / 110.0).abs() < 1e-9);
    }

    #[test]
    fn max_drawdown_duration_in_bars() {
        let m = Metrics::compute(
            &[],
            &make_curve(&[100.0, 110.0, 100.0, 90.0, 85.0, 95.0]),
            100.0,
            0.0,
        );
        assert_eq!(m.max_drawdown_duration, 4);
    }

    #[test]
    fn trade_stats() {
        let trades = vec![
            make_trade(100.0, 5),
            make_trade(-50.0, 3),
            make_trade(200.0, 10),
            make_trade(0.0, 2),
        ];
        let m = Metrics::compute(&trades, &make_curve(&[100.0, 101.0, 102.0]), 100.0, 0.0);

        assert_eq!(m.total_trades, 4);
        assert_eq!(m.trades_won, 2);
        assert_eq!(m.trades_lost, 1);
        assert_eq!(m.trades_breakeven, 1);
        assert!((m.win_rate - 0.5).abs() < f64::EPSILON);
        assert!((m.profit_factor - 6.0).abs() < 1e-9);
        assert!((m.expectancy - 62.5).abs() < 1e-9);
        assert!((m.avg_win - 150.0).abs() < 1e-9);
        assert!((m.avg_loss - 50.0).abs() < 1e-9);
        assert!((m.largest_win - 200.0).abs() < 1e-9);
        assert!((m.largest_loss - 50.0).abs() < 1e-9);
        assert!((m.avg_holding_days - 5.0).abs() < 1e-9);
    }

    #[test]
    fn profit_factor_nan_without_losses() {
        let trades = vec![make_trade(100.0, 5), make_trade(50.0, 2)];
        let m = Metrics::compute(&trades, &make_curve(&[100.0, 102.0]), 100.0, 0.0);
        assert!(m.profit_factor.is_nan());
        assert!((m.win_rate - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_curve_defaults() {
        let m = Metrics::compute(&[], &[], 100_000.0, 0.0);
        assert!((m.total_return - 0.0).abs() < f64::EPSILON);
        assert!(m.cagr.is_nan());
        assert!(m.sharpe_ratio.is_nan());
        assert!((m.max_drawdown - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn risk_free_rate_lowers_sharpe() {
        let values: Vec<f64> = (0..100).map(|i| 100_000.0 * 1.001_f64.powi(i)).collect();
        let with_rf = Metrics::compute(&[], &make_curve(&values), 100_000.0, 0.05);
        let without_rf = Metrics::compute(&[], &make_curve(&values), 100_000.0, 0.0);
        assert!(with_rf.sharpe_ratio < without_rf.sharpe_ratio);
    }
}
