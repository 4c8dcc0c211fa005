//! Last known price per symbol

use super::PriceTick;
use crate::risk::RiskError;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Latest tick per symbol
#[derive(Debug, Default, Clone)]
pub struct PriceBook {
    last: HashMap<String, PriceTick>,
}

impl PriceBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a tick; out-of-order ticks older than the stored one are ignored
    pub fn update(&mut self, tick: &PriceTick) -> bool {
        match self.last.get(&tick.symbol) {
            Some(existing) if existing.timestamp > tick.timestamp => false,
            _ => {
                self.last.insert(tick.symbol.clone(), tick.clone());
                true
            }
        }
    }

    /// Last tick regardless of age
    pub fn last(&self, symbol: &str) -> Option<&PriceTick> {
        self.last.get(symbol)
    }

    /// Last price if it is no older than `max_age`
    pub fn fresh_price(
        &self,
        symbol: &str,
        now: DateTime<Utc>,
        max_age: Duration,
    ) -> Result<Decimal, RiskError> {
        let tick = self
            .last
            .get(symbol)
            .ok_or_else(|| RiskError::NoPrice(symbol.to_string()))?;

        if now - tick.timestamp > max_age {
            return Err(RiskError::StaleFeed {
                symbol: symbol.to_string(),
                age_secs: tick.age_secs(now),
            });
        }
        Ok(tick.price)
    }
}
