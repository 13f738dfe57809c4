//! Configuration validation.
//!
//! Validates every config field before a backtest run. A bad rule or a
//! nonsensical parameter must fail here, never silently produce a flat
//! result.

use crate::domain::error::StratsimError;
use crate::domain::rule_parser;
use crate::domain::strategy::SizingMode;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), StratsimError> {
    validate_initial_capital(config)?;
    validate_commission(config)?;
    validate_slippage(config)?;
    validate_risk_free_rate(config)?;
    validate_dates(config)?;
    validate_codes(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), StratsimError> {
    validate_sizing(config)?;
    validate_risk_levels(config)?;
    validate_rules(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: &str) -> StratsimError {
    StratsimError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn missing(section: &str, key: &str) -> StratsimError {
    StratsimError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), StratsimError> {
    let value = config.get_double("backtest", "initial_capital", 0.0);
    if value <= 0.0 {
        return Err(invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    Ok(())
}

fn validate_commission(config: &dyn ConfigPort) -> Result<(), StratsimError> {
    if config.get_double("backtest", "commission_per_trade", 0.0) < 0.0 {
        return Err(invalid(
            "backtest",
            "commission_per_trade",
            "commission_per_trade must be non-negative",
        ));
    }
    if config.get_double("backtest", "commission_pct", 0.0) < 0.0 {
        return Err(invalid(
            "backtest",
            "commission_pct",
            "commission_pct must be non-negative",
        ));
    }
    Ok(())
}

fn validate_slippage(config: &dyn ConfigPort) -> Result<(), StratsimError> {
    if config.get_double("backtest", "slippage_pct", 0.0) < 0.0 {
        return Err(invalid(
            "backtest",
            "slippage_pct",
            "slippage_pct must be non-negative",
        ));
    }
    Ok(())
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), StratsimError> {
    let value = config.get_double("backtest", "risk_free_rate", 0.0);
    if !(0.0..1.0).contains(&value) {
        return Err(invalid(
            "backtest",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), StratsimError> {
    let start = parse_date(config.get_string("backtest", "start_date").as_deref(), "start_date")?;
    let end = parse_date(config.get_string("backtest", "end_date").as_deref(), "end_date")?;
    if start >= end {
        return Err(invalid(
            "backtest",
            "start_date",
            "start_date must be before end_date",
        ));
    }
    Ok(())
}

fn parse_date(value: Option<&str>, field: &str) -> Result<NaiveDate, StratsimError> {
    match value {
        None => Err(missing("backtest", field)),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
            invalid(
                "backtest",
                field,
                &format!("invalid {} format, expected YYYY-MM-DD", field),
            )
        }),
    }
}

fn validate_codes(config: &dyn ConfigPort) -> Result<(), StratsimError> {
    let codes = config.get_string("backtest", "codes");
    let code = config.get_string("backtest", "code");

    match (codes, code) {
        (Some(c), _) if !c.trim().is_empty() => Ok(()),
        (None, Some(c)) if !c.trim().is_empty() => Ok(()),
        _ => Err(missing("backtest", "code")),
    }
}

fn validate_sizing(config: &dyn ConfigPort) -> Result<(), StratsimError> {
    let mode_str = config
        .get_string("strategy", "sizing_mode")
        .unwrap_or_else(|| "pct_capital".to_string());
    let mode = SizingMode::parse(&mode_str).ok_or_else(|| {
        invalid(
            "strategy",
            "sizing_mode",
            "sizing_mode must be pct_capital, fixed, or risk_based",
        )
    })?;

    let param = config.get_double("strategy", "sizing_param", 0.0);
    if param <= 0.0 {
        return Err(invalid(
            "strategy",
            "sizing_param",
            "sizing_param must be positive",
        ));
    }
    if matches!(mode, SizingMode::PctCapital | SizingMode::RiskBased) && param > 100.0 {
        return Err(invalid(
            "strategy",
            "sizing_param",
            "percentage sizing_param must be at most 100",
        ));
    }

    if mode == SizingMode::RiskBased {
        if config.get_int("strategy", "atr_period", 14) < 1 {
            return Err(invalid(
                "strategy",
                "atr_period",
                "atr_period must be at least 1",
            ));
        }
        if config.get_double("strategy", "atr_multiplier", 2.0) <= 0.0 {
            return Err(invalid(
                "strategy",
                "atr_multiplier",
                "atr_multiplier must be positive",
            ));
        }
    }
    Ok(())
}

fn validate_risk_levels(config: &dyn ConfigPort) -> Result<(), StratsimError> {
    let stop = config.get_double("strategy", "stop_loss_pct", 0.0);
    if !(0.0..100.0).contains(&stop) {
        return Err(invalid(
            "strategy",
            "stop_loss_pct",
            "stop_loss_pct must be in [0, 100)",
        ));
    }
    if config.get_double("strategy", "take_profit_pct", 0.0) < 0.0 {
        return Err(invalid(
            "strategy",
            "take_profit_pct",
            "take_profit_pct must be non-negative",
        ));
    }
    let trail = config.get_double("strategy", "trailing_stop_pct", 0.0);
    if !(0.0..100.0).contains(&trail) {
        return Err(invalid(
            "strategy",
            "trailing_stop_pct",
            "trailing_stop_pct must be in [0, 100)",
        ));
    }
    Ok(())
}

fn validate_rules(config: &dyn ConfigPort) -> Result<(), StratsimError> {
    for key in ["entry", "exit"] {
        match config.get_string("strategy", key) {
            Some(s) if !s.trim().is_empty() => {
                rule_parser::compile(&s)?;
            }
            _ => return Err(missing("strategy", key)),
        }
    }
    Ok(())
}
