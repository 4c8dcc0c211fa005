//! Paper execution: converts a requested trade into a simulated fill

use super::{FlatImpact, Fill, MarketImpact, OrderSide};
use crate::config::ExecutionConfig;
use crate::risk::RiskError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Fill simulator with flat slippage and taker fees
#[derive(Clone)]
pub struct ExecutionSimulator {
    slippage_rate: Decimal,
    fee_rate: Decimal,
    impact: Arc<dyn MarketImpact>,
}

impl ExecutionSimulator {
    /// Create a new simulator with the flat impact model
    pub fn new(slippage_rate: Decimal, fee_rate: Decimal) -> Self {
        Self {
            slippage_rate,
            fee_rate,
            impact: Arc::new(FlatImpact),
        }
    }

    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self::new(config.slippage_rate, config.taker_fee_rate)
    }

    /// Replace the market impact model
    pub fn with_impact(mut self, impact: Arc<dyn MarketImpact>) -> Self {
        self.impact = impact;
        self
    }

    pub fn fee_rate(&self) -> Decimal {
        self.fee_rate
    }

    pub fn slippage_rate(&self) -> Decimal {
        self.slippage_rate
    }

    /// Fill a quote-notional order, as used for entries
    pub fn execute(
        &self,
        symbol: &str,
        current_price: Decimal,
        notional: Decimal,
        side: OrderSide,
        timestamp: DateTime<Utc>,
    ) -> Result<Fill, RiskError> {
        if notional <= Decimal::ZERO {
            return Err(RiskError::Validation(format!(
                "notional {notional} must be positive"
            )));
        }
        let fill_price = self.fill_price(current_price, notional, side)?;
        let quantity = notional / fill_price;
        Ok(self.build_fill(symbol, side, current_price, fill_price, quantity, notional, timestamp))
    }

    /// Fill a fixed base quantity, as used for exits
    pub fn execute_quantity(
        &self,
        symbol: &str,
        current_price: Decimal,
        quantity: Decimal,
        side: OrderSide,
        timestamp: DateTime<Utc>,
    ) -> Result<Fill, RiskError> {
        if quantity <= Decimal::ZERO {
            return Err(RiskError::Validation(format!(
                "quantity {quantity} must be positive"
            )));
        }
        let fill_price = self.fill_price(current_price, quantity * current_price, side)?;
        let notional = quantity * fill_price;
        Ok(self.build_fill(symbol, side, current_price, fill_price, quantity, notional, timestamp))
    }

    fn fill_price(
        &self,
        current_price: Decimal,
        notional: Decimal,
        side: OrderSide,
    ) -> Result<Decimal, RiskError> {
        if current_price <= Decimal::ZERO {
            return Err(RiskError::Validation(format!(
                "price {current_price} must be positive"
            )));
        }
        let slippage = current_price
            * self.slippage_rate
            * self.impact.multiplier(notional, current_price);
        let fill_price = current_price + slippage * side.slippage_sign();
        if fill_price <= Decimal::ZERO {
            return Err(RiskError::Validation(format!(
                "slippage pushed fill price to {fill_price}"
            )));
        }
        Ok(fill_price)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_fill(
        &self,
        symbol: &str,
        side: OrderSide,
        reference_price: Decimal,
        fill_price: Decimal,
        quantity: Decimal,
        notional: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Fill {
        let fill = Fill {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            side,
            reference_price,
            fill_price,
            quantity,
            notional,
            fee: notional * self.fee_rate,
            slippage_cost: (fill_price - reference_price).abs() * quantity,
            timestamp,
        };
        tracing::debug!(
            symbol,
            ?side,
            fill_price = %fill.fill_price,
            quantity = %fill.quantity,
            fee = %fill.fee,
            "Simulated fill"
        );
        fill
    }
}

impl Default for ExecutionSimulator {
    fn default() -> Self {
        Self::from_config(&ExecutionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    struct DoubleImpact;

    impl MarketImpact for DoubleImpact {
        fn multiplier(&self, _notional: Decimal, _price: Decimal) -> Decimal {
            dec!(2)
        }
    }

    #[test]
    fn test_buy_fill_slips_up() {
        let sim = ExecutionSimulator::new(dec!(0.0005), dec!(0.001));
        let fill = sim
            .execute("BTCUSDT", dec!(100), dec!(1000), OrderSide::Buy, Utc::now())
            .unwrap();

        assert_eq!(fill.fill_price, dec!(100.05));
        assert_eq!(fill.fee, dec!(1)); // 1000 * 0.001
        assert_eq!(fill.notional, dec!(1000));
        assert!((fill.quantity * fill.fill_price - dec!(1000)).abs() < dec!(0.000000001));
        assert!((fill.slippage_cost - dec!(0.5)).abs() < dec!(0.001));
    }

    #[test]
    fn test_sell_fill_slips_down() {
        let sim = ExecutionSimulator::new(dec!(0.0005), dec!(0.001));
        let fill = sim
            .execute("BTCUSDT", dec!(100), dec!(1000), OrderSide::Sell, Utc::now())
            .unwrap();
        assert_eq!(fill.fill_price, dec!(99.95));
    }

    #[test]
    fn test_zero_costs() {
        let sim = ExecutionSimulator::new(dec!(0), dec!(0));
        let fill = sim
            .execute("BTCUSDT", dec!(250), dec!(1000), OrderSide::Buy, Utc::now())
            .unwrap();
        assert_eq!(fill.fill_price, dec!(250));
        assert_eq!(fill.quantity, dec!(4));
        assert_eq!(fill.fee, dec!(0));
        assert_eq!(fill.slippage_cost, dec!(0));
    }

    #[test]
    fn test_execute_quantity_for_exit() {
        let sim = ExecutionSimulator::new(dec!(0), dec!(0.001));
        let fill = sim
            .execute_quantity("BTCUSDT", dec!(110), dec!(10), OrderSide::Sell, Utc::now())
            .unwrap();
        assert_eq!(fill.notional, dec!(1100));
        assert_eq!(fill.fee, dec!(1.1));
    }

    #[test]
    fn test_custom_impact() {
        let sim = ExecutionSimulator::new(dec!(0.0005), dec!(0)).with_impact(Arc::new(DoubleImpact));
        let fill = sim
            .execute("BTCUSDT", dec!(100), dec!(1000), OrderSide::Buy, Utc::now())
            .unwrap();
        assert_eq!(fill.fill_price, dec!(100.1));
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let sim = ExecutionSimulator::default();
        assert!(sim
            .execute("BTCUSDT", dec!(0), dec!(1000), OrderSide::Buy, Utc::now())
            .is_err());
        assert!(sim
            .execute("BTCUSDT", dec!(100), dec!(0), OrderSide::Buy, Utc::now())
            .is_err());
        assert!(sim
            .execute_quantity("BTCUSDT", dec!(100), dec!(-1), OrderSide::Sell, Utc::now())
            .is_err());
    }

    #[test]
    fn test_default_rates() {
        let sim = ExecutionSimulator::default();
        assert_eq!(sim.slippage_rate(), dec!(0.0005));
        assert_eq!(sim.fee_rate(), dec!(0.001));
    }
}
