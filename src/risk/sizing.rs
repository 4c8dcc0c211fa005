//! Position sizing
//!
//! Turns a balance and a sizing policy into a trade notional. The policy is
//! a closed enum so every call site matches all of them.

use super::{KellyCalculator, RiskError, TradeStats};
use crate::config::SizingConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Sizing policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingMethod {
    /// Half-Kelly from realized win rate and payoff
    #[default]
    Kelly,
    /// Fixed fraction of balance
    FixedFractional,
    /// Fixed fraction scaled by average / current volatility
    VolatilityAdjusted,
}

impl SizingMethod {
    pub fn name(self) -> &'static str {
        match self {
            SizingMethod::Kelly => "kelly",
            SizingMethod::FixedFractional => "fixed_fractional",
            SizingMethod::VolatilityAdjusted => "volatility_adjusted",
        }
    }
}

/// Inputs for one sizing decision
#[derive(Debug, Clone)]
pub struct SizingInput {
    pub balance: Decimal,
    pub confidence: Decimal,
    /// Average volatility over current volatility
    pub volatility_ratio: Decimal,
    pub stats: TradeStats,
    /// Take-profit distance over stop distance, used as the payoff prior
    pub reward_risk: Decimal,
}

/// Computes trade notional for a sizing method
#[derive(Debug, Clone)]
pub struct PositionSizer {
    config: SizingConfig,
    kelly: KellyCalculator,
}

impl PositionSizer {
    pub fn new(config: SizingConfig) -> Self {
        let kelly = KellyCalculator::new(config.kelly_fraction, config.kelly_cap);
        Self { config, kelly }
    }

    pub fn config(&self) -> &SizingConfig {
        &self.config
    }

    /// Notional for `method`; never negative
    pub fn size(&self, input: &SizingInput, method: SizingMethod) -> Result<Decimal, RiskError> {
        if input.balance <= Decimal::ZERO {
            return Err(RiskError::InsufficientFunds {
                required: self.config.min_notional,
                available: input.balance,
            });
        }

        let notional = match method {
            SizingMethod::Kelly => input.balance * self.kelly_fraction(input),
            SizingMethod::FixedFractional => input.balance * self.config.risk_per_trade,
            SizingMethod::VolatilityAdjusted => {
                let base_size = input.balance * self.config.risk_per_trade;
                base_size * input.volatility_ratio.min(self.config.volatility_cap)
            }
        };

        let cap = input.balance * self.config.max_position_pct;
        Ok(notional.min(cap).max(Decimal::ZERO))
    }

    /// Reject notionals below the tradeable minimum
    pub fn ensure_minimum(&self, notional: Decimal) -> Result<Decimal, RiskError> {
        if notional < self.config.min_notional {
            return Err(RiskError::SizeTooSmall {
                notional,
                min: self.config.min_notional,
            });
        }
        Ok(notional)
    }

    /// Realized statistics once there is enough history, otherwise the
    /// request's confidence against the configured reward/risk
    fn kelly_fraction(&self, input: &SizingInput) -> Decimal {
        if input.stats.trades >= self.config.kelly_min_trades {
            self.kelly.from_stats(&input.stats)
        } else {
            self.kelly.fraction_for(input.confidence, input.reward_risk)
        }
    }
}

impl Default for PositionSizer {
    fn default() -> Self {
        Self::new(SizingConfig::default())
    }
}

/// Rolling volatility (ATR) observations per symbol
#[derive(Debug, Clone)]
pub struct VolatilityTracker {
    window: usize,
    history: HashMap<String, VecDeque<Decimal>>,
}

impl VolatilityTracker {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            history: HashMap::new(),
        }
    }

    /// Record an observation; non-positive values carry no information
    pub fn observe(&mut self, symbol: &str, atr: Decimal) {
        if atr <= Decimal::ZERO {
            return;
        }
        let series = self.history.entry(symbol.to_string()).or_default();
        series.push_back(atr);
        while series.len() > self.window {
            series.pop_front();
        }
    }

    pub fn average(&self, symbol: &str) -> Option<Decimal> {
        let series = self.history.get(symbol).filter(|s| !s.is_empty())?;
        Some(series.iter().sum::<Decimal>() / Decimal::from(series.len()))
    }

    /// Average over current volatility; 1 when either side is unknown
    pub fn ratio(&self, symbol: &str, current: Decimal) -> Decimal {
        if current <= Decimal::ZERO {
            return Decimal::ONE;
        }
        match self.average(symbol) {
            Some(avg) => avg / current,
            None => Decimal::ONE,
        }
    }
}

impl Default for VolatilityTracker {
    fn default() -> Self {
        Self::new(SizingConfig::default().volatility_window)
    }
}
