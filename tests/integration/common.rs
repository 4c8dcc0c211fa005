//! Shared fixtures

use chrono::{DateTime, Duration, TimeZone, Utc};
use riskgate::config::Config;
use riskgate::engine::{EventBus, RiskManager};
use riskgate::feed::PriceTick;
use riskgate::risk::SizingMethod;
use riskgate::signal::{Direction, Signal};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

/// Midday, so a run of a few hours never crosses a UTC day
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

pub fn at(secs: i64) -> DateTime<Utc> {
    t0() + Duration::seconds(secs)
}

/// Frictionless fills, fixed 2% sizing, no cooldown
pub fn config() -> Config {
    let mut config = Config::default();
    config.risk.cooldown_seconds = 0;
    config.risk.sizing_method = SizingMethod::FixedFractional;
    config.execution.slippage_rate = dec!(0);
    config.execution.taker_fee_rate = dec!(0);
    config
}

pub fn manager(config: &Config) -> (Arc<RiskManager>, Arc<EventBus>) {
    let bus = Arc::new(EventBus::default());
    let manager = RiskManager::new(config, bus.clone(), t0());
    (Arc::new(manager), bus)
}

pub async fn tick(manager: &RiskManager, symbol: &str, price: Decimal, now: DateTime<Utc>) {
    manager
        .on_price_tick(PriceTick::new(symbol, price, now), now)
        .await
        .unwrap();
}

pub fn buy(symbol: &str, now: DateTime<Utc>) -> Signal {
    Signal::new(symbol, Direction::Buy, dec!(0.8), dec!(2), now)
}

/// `equity == balance + Σ unrealized` within tolerance
pub async fn assert_invariant(manager: &RiskManager) {
    let snapshot = manager.snapshot().await;
    let unrealized: Decimal = snapshot
        .open_positions
        .iter()
        .map(|p| p.unrealized_pnl)
        .sum();
    let drift = (snapshot.portfolio.equity - snapshot.portfolio.balance - unrealized).abs();
    assert!(drift <= dec!(0.000000001), "equity drift {drift}");
    assert!(snapshot.halted.is_none());
}
