//! Execution module
//!
//! Simulated fills with slippage and taker fees

mod simulator;
mod types;

pub use simulator::ExecutionSimulator;
pub use types::{Fill, FillId, OrderSide};

use rust_decimal::Decimal;

/// Scales the flat slippage rate by order size.
///
/// The size-dependent formula is not settled; `FlatImpact` is the only
/// shipped model and leaves slippage at the flat rate.
pub trait MarketImpact: Send + Sync {
    /// Multiplier applied to `price * slippage_rate`
    fn multiplier(&self, notional: Decimal, price: Decimal) -> Decimal;
}

/// Identity impact model
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatImpact;

impl MarketImpact for FlatImpact {
    fn multiplier(&self, _notional: Decimal, _price: Decimal) -> Decimal {
        Decimal::ONE
    }
}
