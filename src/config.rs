//! Configuration types for riskgate

use crate::risk::{RiskSettings, MAX_DURATION_SECS};
use crate::telemetry::LogFormat;
use anyhow::Context;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub risk: RiskSettings,
    #[serde(default)]
    pub sizing: SizingConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub exit: ExitConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Engine bootstrap and scheduling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Starting portfolio balance (quote currency)
    #[serde(default = "default_initial_balance")]
    pub initial_balance: Decimal,

    /// Seconds between scheduled signal cycles
    #[serde(default = "default_signal_interval_secs")]
    pub signal_interval_secs: u64,
}

fn default_initial_balance() -> Decimal {
    Decimal::new(10_000, 0)
}
fn default_signal_interval_secs() -> u64 {
    3600
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_balance: default_initial_balance(),
            signal_interval_secs: default_signal_interval_secs(),
        }
    }
}

/// Position sizing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizingConfig {
    /// Fraction of balance per trade for the fixed and volatility methods
    #[serde(default = "default_risk_per_trade")]
    pub risk_per_trade: Decimal,

    /// Hard cap on any trade as a fraction of balance
    #[serde(default = "default_max_position_pct")]
    pub max_position_pct: Decimal,

    /// Smallest notional worth trading
    #[serde(default = "default_min_notional")]
    pub min_notional: Decimal,

    /// Multiplier on full Kelly (0.5 = half Kelly)
    #[serde(default = "default_kelly_fraction")]
    pub kelly_fraction: Decimal,

    /// Upper clamp on the Kelly fraction
    #[serde(default = "default_kelly_cap")]
    pub kelly_cap: Decimal,

    /// Closed trades needed before Kelly trusts realized statistics
    #[serde(default = "default_kelly_min_trades")]
    pub kelly_min_trades: usize,

    /// Upper clamp on average / current volatility
    #[serde(default = "default_volatility_cap")]
    pub volatility_cap: Decimal,

    /// ATR observations averaged per symbol
    #[serde(default = "default_volatility_window")]
    pub volatility_window: usize,
}

fn default_risk_per_trade() -> Decimal {
    Decimal::new(2, 2) // 0.02 = 2%
}
fn default_max_position_pct() -> Decimal {
    Decimal::new(25, 2) // 0.25 = 25%
}
fn default_min_notional() -> Decimal {
    Decimal::new(10, 0)
}
fn default_kelly_fraction() -> Decimal {
    Decimal::new(5, 1) // half Kelly
}
fn default_kelly_cap() -> Decimal {
    Decimal::new(25, 2)
}
fn default_kelly_min_trades() -> usize {
    10
}
fn default_volatility_cap() -> Decimal {
    Decimal::new(2, 0)
}
fn default_volatility_window() -> usize {
    20
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            risk_per_trade: default_risk_per_trade(),
            max_position_pct: default_max_position_pct(),
            min_notional: default_min_notional(),
            kelly_fraction: default_kelly_fraction(),
            kelly_cap: default_kelly_cap(),
            kelly_min_trades: default_kelly_min_trades(),
            volatility_cap: default_volatility_cap(),
            volatility_window: default_volatility_window(),
        }
    }
}

/// Fill simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Price slippage as a fraction of the reference price
    #[serde(default = "default_slippage_rate")]
    pub slippage_rate: Decimal,

    /// Taker fee as a fraction of notional
    #[serde(default = "default_taker_fee_rate")]
    pub taker_fee_rate: Decimal,
}

fn default_slippage_rate() -> Decimal {
    Decimal::new(5, 4) // 0.0005 = 5 bps
}
fn default_taker_fee_rate() -> Decimal {
    Decimal::new(1, 3) // 0.001 = 10 bps
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            slippage_rate: default_slippage_rate(),
            taker_fee_rate: default_taker_fee_rate(),
        }
    }
}

/// Exit monitoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitConfig {
    #[serde(default = "default_true")]
    pub trailing_enabled: bool,

    /// Favorable move from entry that arms the trailing stop
    #[serde(default = "default_trailing_activation_pct")]
    pub trailing_activation_pct: Decimal,

    /// Distance the trailing stop keeps behind price
    #[serde(default = "default_trailing_distance_pct")]
    pub trailing_distance_pct: Decimal,

    /// Price data older than this is stale
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,

    /// ATR stand-in as a fraction of price when a signal carries none
    #[serde(default = "default_fallback_atr_pct")]
    pub fallback_atr_pct: Decimal,
}

fn default_true() -> bool {
    true
}
fn default_trailing_activation_pct() -> Decimal {
    Decimal::new(1, 2) // 1%
}
fn default_trailing_distance_pct() -> Decimal {
    Decimal::new(5, 3) // 0.5%
}
fn default_stale_after_secs() -> u64 {
    60
}
fn default_fallback_atr_pct() -> Decimal {
    Decimal::new(1, 2)
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            trailing_enabled: true,
            trailing_activation_pct: default_trailing_activation_pct(),
            trailing_distance_pct: default_trailing_distance_pct(),
            stale_after_secs: default_stale_after_secs(),
            fallback_atr_pct: default_fallback_atr_pct(),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Prometheus scrape port; no exporter when unset
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    /// Parse and validate TOML configuration
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.risk.validate()?;

        if self.engine.initial_balance <= Decimal::ZERO {
            anyhow::bail!("engine.initial_balance must be positive");
        }
        if self.engine.signal_interval_secs == 0 || self.engine.signal_interval_secs > MAX_DURATION_SECS {
            anyhow::bail!("engine.signal_interval_secs must be in [1, {MAX_DURATION_SECS}]");
        }
        if self.exit.stale_after_secs > MAX_DURATION_SECS {
            anyhow::bail!("exit.stale_after_secs must be at most {MAX_DURATION_SECS}");
        }
        if self.sizing.max_position_pct <= Decimal::ZERO || self.sizing.max_position_pct > Decimal::ONE
        {
            anyhow::bail!("sizing.max_position_pct must be in (0, 1]");
        }
        if self.execution.slippage_rate < Decimal::ZERO || self.execution.taker_fee_rate < Decimal::ZERO
        {
            anyhow::bail!("execution rates must not be negative");
        }
        if self.exit.trailing_distance_pct <= Decimal::ZERO
            || self.exit.trailing_distance_pct >= Decimal::ONE
        {
            anyhow::bail!("exit.trailing_distance_pct must be in (0, 1)");
        }
        Ok(())
    }
}
