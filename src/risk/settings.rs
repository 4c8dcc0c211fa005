//! Runtime-adjustable risk settings

use super::{RiskError, SizingMethod};
use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Longest configurable wait, in seconds (30 days)
pub const MAX_DURATION_SECS: u64 = 30 * 24 * 60 * 60;

/// Seconds as a duration, saturating instead of overflowing
pub fn seconds(secs: u64) -> Duration {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

/// Risk options read at the start of every processing cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskSettings {
    /// Daily realized loss that blocks new entries (fraction of day-start balance)
    pub max_daily_loss_percent: Decimal,
    /// Drawdown from peak equity that blocks new entries
    pub max_drawdown_percent: Decimal,
    /// Losing closes in a row that block new entries
    pub max_consecutive_losses: u32,
    /// Minimum spacing between trades
    pub cooldown_seconds: u64,
    /// Stop distance in ATRs
    pub stop_loss_atr_multiplier: Decimal,
    /// Target distance as a multiple of the stop distance
    pub take_profit_risk_reward: Decimal,
    /// Confidence floor for predictor signals
    pub min_confidence: Decimal,
    pub sizing_method: SizingMethod,
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            max_daily_loss_percent: dec!(0.05),
            max_drawdown_percent: dec!(0.15),
            max_consecutive_losses: 5,
            cooldown_seconds: 300,
            stop_loss_atr_multiplier: dec!(2.0),
            take_profit_risk_reward: dec!(2.0),
            min_confidence: dec!(0.6),
            sizing_method: SizingMethod::Kelly,
        }
    }
}

impl RiskSettings {
    pub fn validate(&self) -> Result<(), RiskError> {
        let fraction = |name: &str, value: Decimal| {
            if value <= Decimal::ZERO || value > Decimal::ONE {
                Err(RiskError::Validation(format!("{name} must be in (0, 1], got {value}")))
            } else {
                Ok(())
            }
        };
        fraction("max_daily_loss_percent", self.max_daily_loss_percent)?;
        fraction("max_drawdown_percent", self.max_drawdown_percent)?;

        if self.max_consecutive_losses == 0 {
            return Err(RiskError::Validation(
                "max_consecutive_losses must be at least 1".to_string(),
            ));
        }
        if self.cooldown_seconds > MAX_DURATION_SECS {
            return Err(RiskError::Validation(format!(
                "cooldown_seconds must be at most {MAX_DURATION_SECS}, got {}",
                self.cooldown_seconds
            )));
        }
        if self.stop_loss_atr_multiplier <= Decimal::ZERO {
            return Err(RiskError::Validation(
                "stop_loss_atr_multiplier must be positive".to_string(),
            ));
        }
        if self.take_profit_risk_reward <= Decimal::ZERO {
            return Err(RiskError::Validation(
                "take_profit_risk_reward must be positive".to_string(),
            ));
        }
        if self.min_confidence < Decimal::ZERO || self.min_confidence > Decimal::ONE {
            return Err(RiskError::Validation(format!(
                "min_confidence must be in [0, 1], got {}",
                self.min_confidence
            )));
        }
        Ok(())
    }
}

/// Partial settings change; absent fields keep their current value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskSettingsUpdate {
    pub max_daily_loss_percent: Option<Decimal>,
    pub max_drawdown_percent: Option<Decimal>,
    pub max_consecutive_losses: Option<u32>,
    pub cooldown_seconds: Option<u64>,
    pub stop_loss_atr_multiplier: Option<Decimal>,
    pub take_profit_risk_reward: Option<Decimal>,
    pub min_confidence: Option<Decimal>,
    pub sizing_method: Option<SizingMethod>,
}

impl RiskSettingsUpdate {
    /// Merge into `current` and validate the result
    pub fn apply_to(&self, current: &RiskSettings) -> Result<RiskSettings, RiskError> {
        let merged = RiskSettings {
            max_daily_loss_percent: self
                .max_daily_loss_percent
                .unwrap_or(current.max_daily_loss_percent),
            max_drawdown_percent: self
                .max_drawdown_percent
                .unwrap_or(current.max_drawdown_percent),
            max_consecutive_losses: self
                .max_consecutive_losses
                .unwrap_or(current.max_consecutive_losses),
            cooldown_seconds: self.cooldown_seconds.unwrap_or(current.cooldown_seconds),
            stop_loss_atr_multiplier: self
                .stop_loss_atr_multiplier
                .unwrap_or(current.stop_loss_atr_multiplier),
            take_profit_risk_reward: self
                .take_profit_risk_reward
                .unwrap_or(current.take_profit_risk_reward),
            min_confidence: self.min_confidence.unwrap_or(current.min_confidence),
            sizing_method: self.sizing_method.unwrap_or(current.sizing_method),
        };
        merged.validate()?;
        Ok(merged)
    }
}
