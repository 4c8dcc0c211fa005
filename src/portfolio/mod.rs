//! Portfolio module
//!
//! Account state, positions and the ledger that mutates them

mod account;
mod ledger;
mod types;

pub use account::{BreakerState, Portfolio};
pub use ledger::{OpenOrder, PositionLedger, EQUITY_TOLERANCE};
pub use types::{check_stop_order, ClosedTrade, ExitReason, Position, PositionStatus};
