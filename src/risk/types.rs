//! Risk management types

use rust_decimal::Decimal;
use thiserror::Error;

/// Risk management errors
///
/// Every variant except `InvariantViolation` is a recoverable rejection:
/// the request is dropped and the engine keeps running.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RiskError {
    /// Malformed request or stop ordering violation
    #[error("Validation failed: {0}")]
    Validation(String),
    /// Signal confidence below the configured floor
    #[error("Confidence {confidence} below minimum {min}")]
    LowConfidence { confidence: Decimal, min: Decimal },
    /// One or more circuit breakers tripped
    #[error("Circuit breaker tripped: {}", .0.join(", "))]
    CircuitBreakerTripped(Vec<String>),
    /// Not enough free capital for the order
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Decimal, available: Decimal },
    /// Sized notional below the tradeable minimum
    #[error("Position size {notional} below minimum {min}")]
    SizeTooSmall { notional: Decimal, min: Decimal },
    /// Price data older than the freshness window
    #[error("Price feed for {symbol} is stale ({age_secs}s old)")]
    StaleFeed { symbol: String, age_secs: i64 },
    /// No price has ever been observed for the symbol
    #[error("No price available for {0}")]
    NoPrice(String),
    /// Target changed underneath the request; retry the whole request
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),
    /// No open position matches the request
    #[error("No open position for {0}")]
    NoOpenPosition(String),
    /// Symbol already carries an open position
    #[error("Position already open for {0}")]
    PositionAlreadyOpen(String),
    /// Ledger accounting drifted; trading halts until reviewed
    #[error("Ledger invariant violated: equity {equity} != balance + unrealized {expected}")]
    InvariantViolation { equity: Decimal, expected: Decimal },
}

impl RiskError {
    /// Stable label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            RiskError::Validation(_) => "validation",
            RiskError::LowConfidence { .. } => "low_confidence",
            RiskError::CircuitBreakerTripped(_) => "circuit_breaker",
            RiskError::InsufficientFunds { .. } => "insufficient_funds",
            RiskError::SizeTooSmall { .. } => "size_too_small",
            RiskError::StaleFeed { .. } => "stale_feed",
            RiskError::NoPrice(_) => "no_price",
            RiskError::ConcurrentModification(_) => "concurrent_modification",
            RiskError::NoOpenPosition(_) => "no_open_position",
            RiskError::PositionAlreadyOpen(_) => "position_already_open",
            RiskError::InvariantViolation { .. } => "invariant_violation",
        }
    }

    /// Halts trading pending manual review
    pub fn is_fatal(&self) -> bool {
        matches!(self, RiskError::InvariantViolation { .. })
    }

    /// Worth retrying the same request later
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RiskError::ConcurrentModification(_) | RiskError::StaleFeed { .. }
        )
    }
}
