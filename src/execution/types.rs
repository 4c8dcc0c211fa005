//! Execution types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fill identifier
pub type FillId = Uuid;

/// Order direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Direction slippage moves the fill price: up for buys, down for sells
    pub fn slippage_sign(self) -> Decimal {
        match self {
            OrderSide::Buy => Decimal::ONE,
            OrderSide::Sell => Decimal::NEGATIVE_ONE,
        }
    }
}

/// A simulated fill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    /// Fill ID
    pub id: FillId,
    /// Instrument symbol
    pub symbol: String,
    /// Order direction
    pub side: OrderSide,
    /// Quoted price before slippage
    pub reference_price: Decimal,
    /// Executed price after slippage
    pub fill_price: Decimal,
    /// Base-asset quantity
    pub quantity: Decimal,
    /// Quote value of the fill (`quantity * fill_price`)
    pub notional: Decimal,
    /// Taker fee charged on the notional
    pub fee: Decimal,
    /// Quote cost of slippage against the reference price
    pub slippage_cost: Decimal,
    /// Fill timestamp
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_slippage_sign() {
        assert_eq!(OrderSide::Buy.slippage_sign(), dec!(1));
        assert_eq!(OrderSide::Sell.slippage_sign(), dec!(-1));
    }

    #[test]
    fn test_order_side_serde() {
        assert_eq!(serde_json::to_string(&OrderSide::Buy).unwrap(), r#""buy""#);
        let side: OrderSide = serde_json::from_str(r#""sell""#).unwrap();
        assert_eq!(side, OrderSide::Sell);
    }
}
