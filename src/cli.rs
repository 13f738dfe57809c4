//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{
    run_backtest, run_portfolio_backtest, BacktestConfig, BacktestResult,
};
use crate::domain::code_data::CodeData;
use crate::domain::config_validation::{validate_backtest_config, validate_strategy_config};
use crate::domain::error::StratsimError;
use crate::domain::metrics::Metrics;
use crate::domain::rule_parser;
use crate::domain::strategy::{SizingMode, Strategy};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;

#[derive(Parser, Debug)]
#[command(name = "stratsim", about = "Rule-driven trading strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Strategy file; defaults to the [strategy] section of --config
        #[arg(short, long)]
        strategy: Option<PathBuf>,
        /// Write the trade ledger to a CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Override the configured code list
        #[arg(long)]
        code: Option<String>,
        /// Validate inputs and print the plan without running
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a strategy configuration
    Validate {
        #[arg(short, long)]
        strategy: PathBuf,
    },
    /// Show data range for configured symbol(s)
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        code: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            strategy,
            output,
            code,
            dry_run,
        } => run_backtest_cmd(
            &config,
            strategy.as_deref(),
            output.as_deref(),
            code.as_deref(),
            dry_run,
        ),
        Command::Validate { strategy } => run_validate(&strategy),
        Command::Info { config, code } => run_info(&config, code.as_deref()),
    }
}

fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = StratsimError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Split a comma-separated code list, trimming and dropping duplicates while
/// preserving first-seen order (the portfolio tie-break order).
pub fn parse_codes(input: &str) -> Vec<String> {
    let mut codes: Vec<String> = Vec::new();
    for token in input.split(',') {
        let code = token.trim().to_string();
        if !code.is_empty() && !codes.contains(&code) {
            codes.push(code);
        }
    }
    codes
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> BacktestConfig {
    BacktestConfig {
        initial_capital: adapter.get_double("backtest", "initial_capital", 100_000.0),
        commission_per_trade: adapter.get_double("backtest", "commission_per_trade", 0.0),
        commission_pct: adapter.get_double("backtest", "commission_pct", 0.0),
        slippage_pct: adapter.get_double("backtest", "slippage_pct", 0.0),
        risk_free_rate: adapter.get_double("backtest", "risk_free_rate", 0.0),
        portfolio_mode: adapter.get_bool("backtest", "portfolio_mode", false),
    }
}

pub fn build_strategy(adapter: &dyn ConfigPort) -> Result<Strategy, ExitCode> {
    let name = adapter
        .get_string("strategy", "name")
        .unwrap_or_else(|| "Unnamed".to_string());
    let description = adapter
        .get_string("strategy", "description")
        .unwrap_or_default();

    let compile_rule = |key: &str| -> Result<crate::domain::rule::Rule, ExitCode> {
        let text = adapter.get_string("strategy", key).unwrap_or_default();
        rule_parser::compile(&text).map_err(|e| {
            eprintln!(
                "error: failed to compile {} rule:\n{}",
                key,
                e.display_with_context(&text)
            );
            ExitCode::from(4)
        })
    };
    let entry = compile_rule("entry")?;
    let exit = compile_rule("exit")?;

    let sizing_mode = adapter
        .get_string("strategy", "sizing_mode")
        .and_then(|s| SizingMode::parse(&s))
        .unwrap_or(SizingMode::PctCapital);

    Ok(Strategy {
        name,
        description,
        entry,
        exit,
        sizing_mode,
        sizing_param: adapter.get_double("strategy", "sizing_param", 10.0),
        stop_loss_pct: adapter.get_double("strategy", "stop_loss_pct", 0.0),
        take_profit_pct: adapter.get_double("strategy", "take_profit_pct", 0.0),
        trailing_stop_pct: adapter.get_double("strategy", "trailing_stop_pct", 0.0),
        atr_period: adapter.get_int("strategy", "atr_period", 14).max(0) as usize,
        atr_multiplier: adapter.get_double("strategy", "atr_multiplier", 2.0),
    })
}

fn parse_config_date(adapter: &dyn ConfigPort, key: &str) -> NaiveDate {
    // validated earlier; fall back to epoch on the impossible path
    adapter
        .get_string("backtest", key)
        .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
        .unwrap_or(NaiveDate::MIN)
}

fn run_backtest_cmd(
    config_path: &Path,
    strategy_path: Option<&Path>,
    output_path: Option<&Path>,
    code_override: Option<&str>,
    dry_run: bool,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_backtest_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    let strategy_adapter: Option<FileConfigAdapter>;
    let strategy_config: &dyn ConfigPort = if let Some(path) = strategy_path {
        eprintln!("Loading strategy from {}", path.display());
        strategy_adapter = Some(match load_config(path) {
            Ok(a) => a,
            Err(code) => return code,
        });
        strategy_adapter.as_ref().unwrap()
    } else {
        &adapter
    };

    if let Err(e) = validate_strategy_config(strategy_config) {
        eprintln!("error: {e}");
        return (&e).into();
    }
    let strategy = match build_strategy(strategy_config) {
        Ok(s) => s,
        Err(code) => return code,
    };
    eprintln!("Strategy: {}", strategy.name);

    let bt_config = build_backtest_config(&adapter);

    let codes_str = code_override
        .map(str::to_string)
        .or_else(|| adapter.get_string("backtest", "codes"))
        .or_else(|| adapter.get_string("backtest", "code"))
        .unwrap_or_default();
    let codes = parse_codes(&codes_str);
    if codes.is_empty() {
        eprintln!("error: no codes configured");
        return ExitCode::from(2);
    }

    let start_date = parse_config_date(&adapter, "start_date");
    let end_date = parse_config_date(&adapter, "end_date");

    if dry_run {
        eprintln!("Dry run: {} codes, {} to {}", codes.len(), start_date, end_date);
        eprintln!(
            "  mode: {}",
            if bt_config.portfolio_mode {
                "portfolio (shared cash)"
            } else {
                "independent per code"
            }
        );
        return ExitCode::SUCCESS;
    }

    let csv_dir = adapter
        .get_string("data", "csv_dir")
        .unwrap_or_else(|| "data".to_string());
    let data_port = CsvAdapter::new(PathBuf::from(csv_dir));

    run_backtest_pipeline(
        &data_port,
        &strategy,
        &bt_config,
        &codes,
        start_date,
        end_date,
        output_path,
    )
}

pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    strategy: &Strategy,
    bt_config: &BacktestConfig,
    codes: &[String],
    start_date: NaiveDate,
    end_date: NaiveDate,
    output_path: Option<&Path>,
) -> ExitCode {
    let mut all_results: Vec<(String, BacktestResult)> = Vec::new();

    if bt_config.portfolio_mode {
        let mut data = Vec::with_capacity(codes.len());
        for code in codes {
            match data_port.fetch_ohlcv(code, start_date, end_date) {
                Ok(bars) => data.push(CodeData::new(code.clone(), bars)),
                Err(e) => {
                    eprintln!("warning: skipping {} ({})", code, e);
                }
            }
        }
        if data.is_empty() {
            eprintln!("error: no codes with data to backtest");
            return ExitCode::from(5);
        }

        eprintln!("Running portfolio backtest: {} codes", data.len());
        match run_portfolio_backtest(&data, strategy, bt_config) {
            Ok(result) => all_results.push(("portfolio".to_string(), result)),
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        }
    } else {
        for code in codes {
            let bars = match data_port.fetch_ohlcv(code, start_date, end_date) {
                Ok(bars) => bars,
                Err(e) => {
                    eprintln!("warning: skipping {} ({})", code, e);
                    continue;
                }
            };
            match run_backtest(&bars, strategy, bt_config) {
                Ok(result) => all_results.push((code.clone(), result)),
                Err(e) => eprintln!("warning: skipping {} ({})", code, e),
            }
        }
        if all_results.is_empty() {
            eprintln!("error: every configured code failed");
            return ExitCode::from(5);
        }
    }

    for (label, result) in &all_results {
        print_report(label, result);
    }

    if let Some(path) = output_path {
        let trades: Vec<_> = all_results
            .iter()
            .flat_map(|(_, r)| r.trades.iter())
            .collect();
        if let Err(e) = write_trades_csv(path, &trades) {
            eprintln!("error: {e}");
            return (&e).into();
        }
        eprintln!("Wrote {} trades to {}", trades.len(), path.display());
    }

    ExitCode::SUCCESS
}

fn fmt_ratio(v: f64) -> String {
    if v.is_nan() {
        "n/a".to_string()
    } else {
        format!("{:.2}", v)
    }
}

fn fmt_pct(v: f64) -> String {
    if v.is_nan() {
        "n/a".to_string()
    } else {
        format!("{:.2}%", v * 100.0)
    }
}

fn print_report(label: &str, result: &BacktestResult) {
    let m: &Metrics = &result.metrics;
    println!("=== {} ===", label);
    println!("Total Return:     {}", fmt_pct(m.total_return));
    println!("CAGR:             {}", fmt_pct(m.cagr));
    println!("Sharpe Ratio:     {}", fmt_ratio(m.sharpe_ratio));
    println!("Sortino Ratio:    {}", fmt_ratio(m.sortino_ratio));
    println!("Max Drawdown:     {}", fmt_pct(m.max_drawdown));
    println!("Total Trades:     {}", m.total_trades);
    println!(
        "  won / lost / even: {} / {} / {}",
        m.trades_won, m.trades_lost, m.trades_breakeven
    );
    println!("Win Rate:         {}", fmt_pct(m.win_rate));
    println!("Profit Factor:    {}", fmt_ratio(m.profit_factor));
    println!("Expectancy:       {:.2}", m.expectancy);
    println!("Avg Hold (days):  {:.1}", m.avg_holding_days);
    for skipped in &result.skipped_entries {
        println!(
            "note: entry signal skipped for {} on {} ({})",
            skipped.code, skipped.date, skipped.reason
        );
    }
    println!();
}

fn write_trades_csv(
    path: &Path,
    trades: &[&crate::domain::position::ClosedTrade],
) -> Result<(), StratsimError> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| StratsimError::Data {
        reason: format!("failed to open {}: {}", path.display(), e),
    })?;

    wtr.write_record([
        "code",
        "entry_date",
        "exit_date",
        "entry_price",
        "exit_price",
        "quantity",
        "exit_reason",
        "pnl",
        "pnl_pct",
    ])
    .map_err(|e| StratsimError::Data {
        reason: e.to_string(),
    })?;

    for t in trades {
        wtr.write_record([
            t.code.clone(),
            t.entry_date.to_string(),
            t.exit_date.to_string(),
            format!("{:.4}", t.entry_price),
            format!("{:.4}", t.exit_price),
            t.quantity.to_string(),
            t.exit_reason.to_string(),
            format!("{:.2}", t.pnl),
            format!("{:.4}", t.pnl_pct),
        ])
        .map_err(|e| StratsimError::Data {
            reason: e.to_string(),
        })?;
    }

    wtr.flush().map_err(|e| StratsimError::Data {
        reason: e.to_string(),
    })
}

fn run_validate(strategy_path: &Path) -> ExitCode {
    let adapter = match load_config(strategy_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_strategy_config(&adapter) {
        if let StratsimError::RuleCompile(ref compile_err) = e {
            // re-read the failing text so the caret lines up
            for key in ["entry", "exit"] {
                if let Some(text) = adapter.get_string("strategy", key) {
                    if rule_parser::compile(&text).is_err() {
                        eprintln!(
                            "error: {} rule:\n{}",
                            key,
                            compile_err.display_with_context(&text)
                        );
                        return (&e).into();
                    }
                }
            }
        }
        eprintln!("error: {e}");
        return (&e).into();
    }

    println!("strategy ok");
    ExitCode::SUCCESS
}

fn run_info(config_path: &Path, code_override: Option<&str>) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let csv_dir = adapter
        .get_string("data", "csv_dir")
        .unwrap_or_else(|| "data".to_string());
    let data_port = CsvAdapter::new(PathBuf::from(csv_dir));

    let codes = match code_override {
        Some(c) => parse_codes(c),
        None => match data_port.list_symbols() {
            Ok(symbols) => symbols,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        },
    };

    for code in &codes {
        match data_port.get_data_range(code) {
            Ok(Some((first, last, count))) => {
                println!("{}: {} to {} ({} bars)", code, first, last, count)
            }
            Ok(None) => println!("{}: no data", code),
            Err(e) => println!("{}: error ({})", code, e),
        }
    }

    ExitCode::SUCCESS
}
