//! Stop-loss, take-profit and trailing-stop evaluation

use crate::config::ExitConfig;
use crate::feed::PriceTick;
use crate::portfolio::{ExitReason, Position};
use crate::risk::{self, RiskError, RiskSettings};
use crate::signal::Side;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

/// What to do with an open position at the current price
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitDecision {
    Hold,
    Close(ExitReason),
    /// Move the stop loss to this (tighter) level
    Trail(Decimal),
}

/// Evaluates open positions against their exit levels.
///
/// Decisions are pure; the ledger applies them, and it alone enforces that a
/// stop never loosens.
#[derive(Debug, Clone)]
pub struct ExitMonitor {
    config: ExitConfig,
}

impl ExitMonitor {
    pub fn new(config: ExitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExitConfig {
        &self.config
    }

    /// Maximum tick age accepted for decisions
    pub fn stale_after(&self) -> Duration {
        risk::seconds(self.config.stale_after_secs)
    }

    /// Stale ticks must be skipped, never acted on
    pub fn check_freshness(&self, tick: &PriceTick, now: DateTime<Utc>) -> Result<(), RiskError> {
        if now - tick.timestamp > self.stale_after() {
            return Err(RiskError::StaleFeed {
                symbol: tick.symbol.clone(),
                age_secs: tick.age_secs(now),
            });
        }
        Ok(())
    }

    /// Decide on one position at `price`. A stop hit wins over a target hit.
    pub fn evaluate(&self, position: &Position, price: Decimal) -> ExitDecision {
        let (stop_hit, target_hit) = match position.side {
            Side::Long => (price <= position.stop_loss, price >= position.take_profit),
            Side::Short => (price >= position.stop_loss, price <= position.take_profit),
        };

        if stop_hit {
            let reason = if position.trailing_active {
                ExitReason::TrailingStop
            } else {
                ExitReason::StopLoss
            };
            return ExitDecision::Close(reason);
        }
        if target_hit {
            return ExitDecision::Close(ExitReason::TakeProfit);
        }

        match self.trailing_candidate(position, price) {
            Some(candidate) => ExitDecision::Trail(candidate),
            None => ExitDecision::Hold,
        }
    }

    /// Trailing stop level at `price` when armed and strictly tighter
    fn trailing_candidate(&self, position: &Position, price: Decimal) -> Option<Decimal> {
        if !self.config.trailing_enabled
            || position.favorable_move(price) < self.config.trailing_activation_pct
        {
            return None;
        }

        let distance = self.config.trailing_distance_pct;
        let (candidate, tighter) = match position.side {
            Side::Long => {
                let candidate = price * (Decimal::ONE - distance);
                (candidate, candidate > position.stop_loss)
            }
            Side::Short => {
                let candidate = price * (Decimal::ONE + distance);
                (candidate, candidate < position.stop_loss)
            }
        };
        tighter.then_some(candidate)
    }

    /// Initial stop loss and take profit from ATR.
    ///
    /// Long: `entry - k*ATR` and `entry + k*ATR*RR`; short mirrored. A
    /// non-positive ATR falls back to `entry * fallback_atr_pct`.
    pub fn initial_levels(
        &self,
        side: Side,
        entry: Decimal,
        atr: Decimal,
        settings: &RiskSettings,
    ) -> Result<(Decimal, Decimal), RiskError> {
        let atr = if atr > Decimal::ZERO {
            atr
        } else {
            entry * self.config.fallback_atr_pct
        };
        let stop_distance = atr * settings.stop_loss_atr_multiplier;
        let target_distance = stop_distance * settings.take_profit_risk_reward;
        if stop_distance <= Decimal::ZERO {
            return Err(RiskError::Validation(format!(
                "no stop distance for entry {entry}"
            )));
        }

        let levels = match side {
            Side::Long => (entry - stop_distance, entry + target_distance),
            Side::Short => (entry + stop_distance, entry - target_distance),
        };
        if levels.0 <= Decimal::ZERO || levels.1 <= Decimal::ZERO {
            return Err(RiskError::Validation(format!(
                "ATR {atr} too wide for entry {entry}: stop {}, target {}",
                levels.0, levels.1
            )));
        }
        Ok(levels)
    }
}

impl Default for ExitMonitor {
    fn default() -> Self {
        Self::new(ExitConfig::default())
    }
}
