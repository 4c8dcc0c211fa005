//! Signal and request types

use crate::execution::OrderSide;
use crate::risk::RiskError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Position side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Profits when price rises
    Long,
    /// Profits when price falls
    Short,
}

impl Side {
    /// +1 for long, -1 for short
    pub fn sign(self) -> Decimal {
        match self {
            Side::Long => Decimal::ONE,
            Side::Short => Decimal::NEGATIVE_ONE,
        }
    }

    /// Order side that opens a position on this side
    pub fn entry_order(self) -> OrderSide {
        match self {
            Side::Long => OrderSide::Buy,
            Side::Short => OrderSide::Sell,
        }
    }

    /// Order side that closes a position on this side
    pub fn exit_order(self) -> OrderSide {
        match self {
            Side::Long => OrderSide::Sell,
            Side::Short => OrderSide::Buy,
        }
    }
}

/// Direction emitted by the predictor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
    Hold,
}

impl Direction {
    /// Side to open, or `None` for hold
    pub fn side(self) -> Option<Side> {
        match self {
            Direction::Buy => Some(Side::Long),
            Direction::Sell => Some(Side::Short),
            Direction::Hold => None,
        }
    }
}

/// A trading signal from the external predictor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Unique signal identifier
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// Instrument symbol
    pub symbol: String,
    /// Predicted direction
    pub direction: Direction,
    /// Model confidence in [0, 1]
    pub confidence: Decimal,
    /// Average true range at signal time
    pub atr: Decimal,
    /// Signal generation timestamp
    pub timestamp: DateTime<Utc>,
}

impl Signal {
    /// Create a new signal
    pub fn new(
        symbol: impl Into<String>,
        direction: Direction,
        confidence: Decimal,
        atr: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.into(),
            direction,
            confidence,
            atr,
            timestamp,
        }
    }

    /// Schema checks that do not depend on settings
    pub fn validate(&self) -> Result<(), RiskError> {
        if self.symbol.trim().is_empty() {
            return Err(RiskError::Validation("signal symbol is empty".to_string()));
        }
        if self.confidence < Decimal::ZERO || self.confidence > Decimal::ONE {
            return Err(RiskError::Validation(format!(
                "confidence {} outside [0, 1]",
                self.confidence
            )));
        }
        if self.atr.is_sign_negative() {
            return Err(RiskError::Validation(format!("negative atr {}", self.atr)));
        }
        Ok(())
    }
}

/// Operator request to open a position outside the scheduled cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualTradeRequest {
    pub symbol: String,
    /// Falls back to the latest signal's direction when absent
    #[serde(default)]
    pub side: Option<Side>,
    /// Falls back to the latest signal's confidence when absent
    #[serde(default)]
    pub confidence: Option<Decimal>,
    /// Skip the confidence gate
    #[serde(default)]
    pub force: bool,
}

/// Operator request to move the stops of an open position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionUpdateRequest {
    pub symbol: String,
    /// Position the caller observed; a mismatch is reported as a concurrent modification
    #[serde(default)]
    pub position_id: Option<Uuid>,
    #[serde(default)]
    pub stop_loss: Option<Decimal>,
    #[serde(default)]
    pub take_profit: Option<Decimal>,
}

impl PositionUpdateRequest {
    pub fn validate(&self) -> Result<(), RiskError> {
        if self.stop_loss.is_none() && self.take_profit.is_none() {
            return Err(RiskError::Validation(
                "update carries neither stop_loss nor take_profit".to_string(),
            ));
        }
        for level in [self.stop_loss, self.take_profit].into_iter().flatten() {
            if level <= Decimal::ZERO {
                return Err(RiskError::Validation(format!(
                    "stop level {level} must be positive"
                )));
            }
        }
        Ok(())
    }
}
