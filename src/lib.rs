//! riskgate: risk-gated paper execution engine for predictor signals
//!
//! This library provides the core components for:
//! - Signal validation and manual trade requests
//! - Circuit breakers, Kelly and volatility-aware position sizing
//! - Simulated fills with slippage and taker fees
//! - A virtual portfolio ledger with stop, target and trailing exits
//! - An orchestrating risk manager, its event bus and scheduler
//! - JSONL replay of recorded ticks and signals
//! - Logging and Prometheus metrics

pub mod cli;
pub mod config;
pub mod engine;
pub mod execution;
pub mod exit;
pub mod feed;
pub mod portfolio;
pub mod risk;
pub mod signal;
pub mod telemetry;
