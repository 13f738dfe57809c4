//! Trade execution and fill simulation.
//!
//! Entry/exit fills at the bar close with slippage applied against the trade
//! direction, flat + percentage commissions charged to the cash ledger on
//! both legs, and the three position-sizing modes.

use chrono::NaiveDate;

use super::portfolio::Portfolio;
use super::position::{ClosedTrade, ExitReason, Position};
use super::strategy::{SizingMode, Strategy};

/// Cost model for a backtest run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub commission_per_trade: f64,
    pub commission_pct: f64,
    pub slippage_pct: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            commission_per_trade: 0.0,
            commission_pct: 0.0,
            slippage_pct: 0.0,
        }
    }
}

/// flat_fee + trade_value * pct / 100
pub fn calculate_commission(trade_value: f64, config: &ExecutionConfig) -> f64 {
    config.commission_per_trade + trade_value * config.commission_pct / 100.0
}

/// Buy fill: close * (1 + slippage_pct / 100)
pub fn entry_fill_price(close: f64, slippage_pct: f64) -> f64 {
    close * (1.0 + slippage_pct / 100.0)
}

/// Sell fill: close * (1 - slippage_pct / 100)
pub fn exit_fill_price(close: f64, slippage_pct: f64) -> f64 {
    close * (1.0 - slippage_pct / 100.0)
}

/// Why an entry signal produced no position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    ZeroQuantity,
    InsufficientCash,
    AtrUnavailable,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SkipReason::ZeroQuantity => "sized to zero shares",
            SkipReason::InsufficientCash => "insufficient cash",
            SkipReason::AtrUnavailable => "ATR not yet defined",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryDecision {
    Entered {
        quantity: i64,
        execution_price: f64,
        cost: f64,
        commission: f64,
    },
    Skipped(SkipReason),
}

/// Convert an entry signal into a share quantity per the strategy's sizing
/// mode. Risk-based sizing requires a defined ATR at the entry bar.
pub fn size_entry(
    strategy: &Strategy,
    equity: f64,
    price: f64,
    atr: Option<f64>,
) -> Result<i64, SkipReason> {
    if price <= 0.0 {
        return Err(SkipReason::ZeroQuantity);
    }
    let quantity = match strategy.sizing_mode {
        SizingMode::PctCapital => (equity * strategy.sizing_param / 100.0 / price).floor(),
        SizingMode::Fixed => (strategy.sizing_param / price).floor(),
        SizingMode::RiskBased => match atr {
            Some(atr) if atr > 0.0 => {
                let risk_amount = equity * strategy.sizing_param / 100.0;
                (risk_amount / (atr * strategy.atr_multiplier)).floor()
            }
            _ => return Err(SkipReason::AtrUnavailable),
        },
    };

    if quantity < 1.0 {
        Err(SkipReason::ZeroQuantity)
    } else {
        Ok(quantity as i64)
    }
}

/// Open a long position at this bar's close.
///
/// 1. Apply entry slippage to the fill price
/// 2. Size the position against current equity
/// 3. Reject fills the cash ledger cannot fund
/// 4. Deduct cost + commission, initialize stop/take/trailing levels
#[allow(clippy::too_many_arguments)]
pub fn enter_long(
    portfolio: &mut Portfolio,
    code: &str,
    bar_index: usize,
    date: NaiveDate,
    close: f64,
    equity: f64,
    strategy: &Strategy,
    config: &ExecutionConfig,
    atr: Option<f64>,
) -> EntryDecision {
    let execution_price = entry_fill_price(close, config.slippage_pct);

    let quantity = match size_entry(strategy, equity, execution_price, atr) {
        Ok(q) => q,
        Err(reason) => return EntryDecision::Skipped(reason),
    };

    let cost = quantity as f64 * execution_price;
    let commission = calculate_commission(cost, config);
    if cost + commission > portfolio.cash {
        return EntryDecision::Skipped(SkipReason::InsufficientCash);
    }

    portfolio.cash -= cost + commission;

    let stop_loss = if strategy.stop_loss_pct > 0.0 {
        execution_price * (1.0 - strategy.stop_loss_pct / 100.0)
    } else {
        0.0
    };
    let take_profit = if strategy.take_profit_pct > 0.0 {
        execution_price * (1.0 + strategy.take_profit_pct / 100.0)
    } else {
        0.0
    };

    portfolio.add_position(Position {
        code: code.to_string(),
        quantity,
        entry_index: bar_index,
        entry_date: date,
        entry_price: execution_price,
        stop_loss,
        take_profit,
        trailing_high: close,
        entry_commission: commission,
    });

    EntryDecision::Entered {
        quantity,
        execution_price,
        cost,
        commission,
    }
}

/// Close an open position at this bar's close, crediting proceeds minus
/// commission to cash and appending the ledger record.
pub fn exit_long(
    portfolio: &mut Portfolio,
    code: &str,
    bar_index: usize,
    date: NaiveDate,
    close: f64,
    reason: ExitReason,
    config: &ExecutionConfig,
) -> Option<ClosedTrade> {
    let position = portfolio.remove_position(code)?;

    let exit_price = exit_fill_price(close, config.slippage_pct);
    let exit_value = position.quantity as f64 * exit_price;
    let exit_commission = calculate_commission(exit_value, config);

    portfolio.cash += exit_value - exit_commission;

    let price_pnl = position.quantity as f64 * (exit_price - position.entry_price);
    let trade = ClosedTrade {
        code: position.code.clone(),
        quantity: position.quantity,
        entry_index: position.entry_index,
        exit_index: bar_index,
        entry_date: position.entry_date,
        exit_date: date,
        entry_price: position.entry_price,
        exit_price,
        exit_reason: reason,
        pnl: price_pnl - position.entry_commission - exit_commission,
        pnl_pct: (exit_price - position.entry_price) / position.entry_price * 100.0,
    };

    portfolio.record_trade(trade.clone());
    Some(trade)
}
