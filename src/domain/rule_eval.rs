//! Rule evaluation engine.
//!
//! Evaluates a compiled rule at a single bar index against OHLCV data,
//! pre-computed indicators, and the live position state.
//!
//! # Evaluation Semantics
//!
//! - Operands resolve to `f64`, with NaN for anything undefined: an
//!   indicator inside its warm-up window, a missing series, or
//!   `entry_price` while flat.
//! - A comparison with NaN on either side is false for every operator,
//!   including `!=` (fail-closed; no trade signal from incomplete data).
//! - `==` / `!=` on defined values compare bit-for-bit, no epsilon.
//! - `And` short-circuits on the first false, `Or` on the first true.

use crate::domain::indicator::{IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::rule::{ArithOp, CmpOp, Expr, IndicatorField, IndicatorRef, PriceField, Rule};
use std::collections::HashMap;

pub fn evaluate(
    rule: &Rule,
    bars: &[OhlcvBar],
    indicators: &HashMap<IndicatorType, IndicatorSeries>,
    bar_index: usize,
    entry_price: Option<f64>,
) -> bool {
    match rule {
        Rule::Comparison { left, op, right } => {
            let l = resolve_expr(left, bars, indicators, bar_index, entry_price);
            let r = resolve_expr(right, bars, indicators, bar_index, entry_price);
            if l.is_nan() || r.is_nan() {
                return false;
            }
            match op {
                CmpOp::Lt => l < r,
                CmpOp::Le => l <= r,
                CmpOp::Gt => l > r,
                CmpOp::Ge => l >= r,
                CmpOp::Eq => l == r,
                CmpOp::Ne => l != r,
            }
        }
        Rule::And(rules) => {
            for r in rules {
                if !evaluate(r, bars, indicators, bar_index, entry_price) {
                    return false;
                }
            }
            true
        }
        Rule::Or(rules) => {
            for r in rules {
                if evaluate(r, bars, indicators, bar_index, entry_price) {
                    return true;
                }
            }
            false
        }
        Rule::Not(inner) => !evaluate(inner, bars, indicators, bar_index, entry_price),
    }
}

fn resolve_expr(
    expr: &Expr,
    bars: &[OhlcvBar],
    indicators: &HashMap<IndicatorType, IndicatorSeries>,
    bar_index: usize,
    entry_price: Option<f64>,
) -> f64 {
    match expr {
        Expr::Number(v) => *v,
        Expr::Price(field) => {
            let bar = &bars[bar_index];
            match field {
                PriceField::Open => bar.open,
                PriceField::High => bar.high,
                PriceField::Low => bar.low,
                PriceField::Close => bar.close,
                PriceField::Volume => bar.volume as f64,
            }
        }
        Expr::EntryPrice => entry_price.unwrap_or(f64::NAN),
        Expr::Indicator(ind_ref) => resolve_indicator(ind_ref, indicators, bar_index),
        Expr::Arith { op, left, right } => {
            let l = resolve_expr(left, bars, indicators, bar_index, entry_price);
            let r = resolve_expr(right, bars, indicators, bar_index, entry_price);
            match op {
                ArithOp::Add => l + r,
                ArithOp::Sub => l - r,
                ArithOp::Mul => l * r,
                ArithOp::Div => l / r,
            }
        }
    }
}

fn resolve_indicator(
    ind_ref: &IndicatorRef,
    indicators: &HashMap<IndicatorType, IndicatorSeries>,
    bar_index: usize,
) -> f64 {
    let series = match indicators.get(&ind_ref.indicator_type) {
        Some(s) => s,
        None => return f64::NAN,
    };

    if bar_index >= series.values.len() {
        return f64::NAN;
    }

    let point = &series.values[bar_index];
    if !point.valid {
        return f64::NAN;
    }

    extract_field(&point.value, ind_ref.field)
}

fn extract_field(value: &IndicatorValue, field: IndicatorField) -> f64 {
    match (value, field) {
        (IndicatorValue::Simple(v), IndicatorField::Value) => *v,
        (IndicatorValue::Macd { line, .. }, IndicatorField::MacdLine) => *line,
        (IndicatorValue::Macd { signal, .. }, IndicatorField::MacdSignal) => *signal,
        (IndicatorValue::Macd { histogram, .. }, IndicatorField::MacdHistogram) => *histogram,
        (IndicatorValue::Stochastic { k, .. }, IndicatorField::StochasticK) => *k,
        (IndicatorValue::Stochastic { d, .. }, IndicatorField::StochasticD) => *d,
        (IndicatorValue::Bollinger { upper, .. }, IndicatorField::BollingerUpper) => *upper,
        (IndicatorValue::Bollinger { middle, .. }, IndicatorField::BollingerMiddle) => *middle,
        (IndicatorValue::Bollinger { lower, .. }, IndicatorField::BollingerLower) => *lower,
        _ => f64::NAN,
    }
}
