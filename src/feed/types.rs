//! Price feed types

use crate::risk::RiskError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single price observation for a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    /// Trading symbol (e.g., "BTCUSDT")
    pub symbol: String,
    /// Last traded price
    pub price: Decimal,
    /// Time the price was observed at the source
    pub timestamp: DateTime<Utc>,
}

impl PriceTick {
    pub fn new(symbol: impl Into<String>, price: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            timestamp,
        }
    }

    /// A usable tick names a symbol and carries a positive price
    pub fn validate(&self) -> Result<(), RiskError> {
        if self.symbol.trim().is_empty() {
            return Err(RiskError::Validation("tick symbol is empty".to_string()));
        }
        if self.price <= Decimal::ZERO {
            return Err(RiskError::Validation(format!(
                "non-positive price {} for {}",
                self.price, self.symbol
            )));
        }
        Ok(())
    }

    /// Seconds between observation and `now`
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.timestamp).num_seconds()
    }
}
