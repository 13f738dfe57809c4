//! Position tracking and the closed-trade ledger record.

use chrono::NaiveDate;
use std::fmt;

/// A single open long position. Stop and take-profit levels of 0.0 mean the
/// corresponding rule is disabled. `trailing_high` tracks the highest close
/// since entry and never falls.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub code: String,
    pub quantity: i64,
    pub entry_index: usize,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub trailing_high: f64,
    pub entry_commission: f64,
}

impl Position {
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity as f64 * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity as f64 * (price - self.entry_price)
    }

    /// Raise the trailing-stop reference high. Called once per bar while the
    /// position is open, before any exit check.
    pub fn update_trailing_high(&mut self, close: f64) {
        if close > self.trailing_high {
            self.trailing_high = close;
        }
    }

    pub fn should_stop_loss(&self, close: f64) -> bool {
        self.stop_loss > 0.0 && close <= self.stop_loss
    }

    pub fn should_take_profit(&self, close: f64) -> bool {
        self.take_profit > 0.0 && close >= self.take_profit
    }

    pub fn should_trailing_stop(&self, close: f64, trail_pct: f64) -> bool {
        trail_pct > 0.0 && close <= self.trailing_high * (1.0 - trail_pct / 100.0)
    }
}

/// Why a position was closed, in risk-priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    TrailingStop,
    RuleExit,
    EndOfData,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::RuleExit => "rule_exit",
            ExitReason::EndOfData => "end_of_data",
        };
        f.write_str(s)
    }
}

/// An immutable ledger entry, appended on every exit. `pnl` nets out the
/// entry and exit commissions; `pnl_pct` is the raw price move in percent.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub code: String,
    pub quantity: i64,
    pub entry_index: usize,
    pub exit_index: usize,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub entry_price: f64,
    pub exit_price: f64,
    pub exit_reason: ExitReason,
    pub pnl: f64,
    pub pnl_pct: f64,
}

impl ClosedTrade {
    pub fn holding_days(&self) -> i64 {
        (self.exit_date - self.entry_date).num_days()
    }
}
