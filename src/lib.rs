//! stratsim — rule-driven trading strategy backtester.
//!
//! Strategies are plain text: an entry rule and an exit rule over technical
//! indicators, price fields, and `entry_price`, compiled once and replayed
//! bar by bar against historical daily data.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in
//! [`ports`], concrete implementations in [`adapters`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
