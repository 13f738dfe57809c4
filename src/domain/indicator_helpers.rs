//! Indicator computation dispatch.
//!
//! `compute_indicators` precomputes every indicator a strategy references
//! over the full bar series, keyed by `IndicatorType`. Consumers read the
//! table causally (index <= current bar) during simulation.

use crate::domain::indicator::{
    adx::calculate_adx, atr::calculate_atr, bollinger::calculate_bollinger, cci::calculate_cci,
    ema::calculate_ema, macd::calculate_macd, momentum::calculate_momentum, obv::calculate_obv,
    roc::calculate_roc, rsi::calculate_rsi, sma::calculate_sma, stochastic::calculate_stochastic,
    vwap::calculate_vwap, williams_r::calculate_williams_r, wma::calculate_wma,
};
use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;
use std::collections::HashMap;

pub fn compute_indicators(
    bars: &[OhlcvBar],
    indicators: &[IndicatorType],
) -> HashMap<IndicatorType, IndicatorSeries> {
    let mut table = HashMap::new();

    for indicator_type in indicators {
        if table.contains_key(indicator_type) {
            continue;
        }
        let series = compute_one(bars, indicator_type);
        table.insert(indicator_type.clone(), series);
    }

    table
}

fn compute_one(bars: &[OhlcvBar], indicator_type: &IndicatorType) -> IndicatorSeries {
    match indicator_type {
        IndicatorType::Sma(n) => calculate_sma(bars, *n),
        IndicatorType::Ema(n) => calculate_ema(bars, *n),
        IndicatorType::Wma(n) => calculate_wma(bars, *n),
        IndicatorType::Rsi(n) => calculate_rsi(bars, *n),
        IndicatorType::Stochastic { k_period, d_period } => {
            calculate_stochastic(bars, *k_period, *d_period)
        }
        IndicatorType::WilliamsR(n) => calculate_williams_r(bars, *n),
        IndicatorType::Macd { fast, slow, signal } => calculate_macd(bars, *fast, *slow, *signal),
        IndicatorType::Adx(n) => calculate_adx(bars, *n),
        IndicatorType::Bollinger {
            period,
            stddev_mult_x100,
        } => calculate_bollinger(bars, *period, *stddev_mult_x100),
        IndicatorType::Atr(n) => calculate_atr(bars, *n),
        IndicatorType::Obv => calculate_obv(bars),
        IndicatorType::Vwap => calculate_vwap(bars),
        IndicatorType::Roc(n) => calculate_roc(bars, *n),
        IndicatorType::Cci(n) => calculate_cci(bars, *n),
        IndicatorType::Momentum(n) => calculate_momentum(bars, *n),
    }
}
