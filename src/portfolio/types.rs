//! Position and trade records

use crate::risk::RiskError;
use crate::signal::Side;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Position lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    Open,
    /// Terminal
    Closed,
}

/// Why a position was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    TrailingStop,
    Emergency,
    Manual,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExitReason::StopLoss => "STOP_LOSS",
            ExitReason::TakeProfit => "TAKE_PROFIT",
            ExitReason::TrailingStop => "TRAILING_STOP",
            ExitReason::Emergency => "EMERGENCY",
            ExitReason::Manual => "MANUAL",
        };
        f.write_str(label)
    }
}

/// An open (or, inside a `ClosedTrade`, closed) position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Position identifier
    pub id: Uuid,
    /// Instrument symbol
    pub symbol: String,
    /// Trade side
    pub side: Side,
    /// Entry fill price
    pub entry_price: Decimal,
    /// Base-asset quantity
    pub size: Decimal,
    /// Quote capital committed at entry
    pub notional: Decimal,
    /// Fee paid on entry
    pub entry_fee: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    /// Entry timestamp
    pub opened_at: DateTime<Utc>,
    pub status: PositionStatus,
    /// Confidence of the request that opened it
    pub confidence: Decimal,
    /// Price used for the last mark-to-market
    pub mark_price: Decimal,
    /// Gross P&L at `mark_price`
    pub unrealized_pnl: Decimal,
    /// Set once the trailing stop has moved the stop loss
    pub trailing_active: bool,
}

impl Position {
    /// Gross P&L if the position were valued at `price`
    pub fn pnl_at(&self, price: Decimal) -> Decimal {
        (price - self.entry_price) * self.size * self.side.sign()
    }

    /// Signed move from entry in the position's favor, as a fraction of entry
    pub fn favorable_move(&self, price: Decimal) -> Decimal {
        if self.entry_price.is_zero() {
            return Decimal::ZERO;
        }
        (price - self.entry_price) / self.entry_price * self.side.sign()
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }
}

/// Immutable record of a closed position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    /// Position as it stood when closed
    pub position: Position,
    pub exit_price: Decimal,
    pub exit_reason: ExitReason,
    /// Realized P&L net of entry and exit fees
    pub pnl: Decimal,
    /// Entry plus exit fees
    pub fees: Decimal,
    pub closed_at: DateTime<Utc>,
}

impl ClosedTrade {
    pub fn is_win(&self) -> bool {
        self.pnl >= Decimal::ZERO
    }
}

/// Check stop and target levels against a reference price.
///
/// Long: `stop_loss < reference < take_profit`. Short: reversed.
pub fn check_stop_order(
    side: Side,
    reference: Decimal,
    stop_loss: Option<Decimal>,
    take_profit: Option<Decimal>,
) -> Result<(), RiskError> {
    if let Some(sl) = stop_loss {
        let ok = match side {
            Side::Long => sl < reference,
            Side::Short => sl > reference,
        };
        if !ok {
            return Err(RiskError::Validation(format!(
                "stop loss {sl} on wrong side of {reference} for {side:?}"
            )));
        }
    }
    if let Some(tp) = take_profit {
        let ok = match side {
            Side::Long => tp > reference,
            Side::Short => tp < reference,
        };
        if !ok {
            return Err(RiskError::Validation(format!(
                "take profit {tp} on wrong side of {reference} for {side:?}"
            )));
        }
    }
    Ok(())
}
