//! Signal-to-close flows through the public manager API

use crate::common::*;
use riskgate::portfolio::ExitReason;
use riskgate::risk::{RiskError, RiskSettingsUpdate};
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_signal_opens_and_stop_closes() {
    let (manager, _bus) = manager(&config());
    tick(&manager, "BTCUSDT", dec!(100), at(0)).await;

    let position = manager
        .process_signal(buy("BTCUSDT", at(1)), at(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(position.notional, dec!(200));
    assert_eq!(position.stop_loss, dec!(96));
    assert_eq!(position.take_profit, dec!(108));
    assert_invariant(&manager).await;

    tick(&manager, "BTCUSDT", dec!(98), at(2)).await;
    assert_invariant(&manager).await;

    let closed = manager
        .on_price_tick(riskgate::feed::PriceTick::new("BTCUSDT", dec!(95), at(3)), at(3))
        .await
        .unwrap();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].exit_reason, ExitReason::StopLoss);
    assert_eq!(closed[0].pnl, dec!(-10));

    let snapshot = manager.snapshot().await;
    assert!(snapshot.open_positions.is_empty());
    assert_eq!(snapshot.portfolio.balance, dec!(9990));
    assert_eq!(snapshot.portfolio.equity, dec!(9990));
    assert_eq!(snapshot.breaker_state.consecutive_losses, 1);
}

#[tokio::test]
async fn test_round_trip_costs_both_fees() {
    let mut config = config();
    config.execution.taker_fee_rate = dec!(0.001);
    config.sizing.risk_per_trade = dec!(0.1);
    let (manager, _bus) = manager(&config);
    tick(&manager, "BTCUSDT", dec!(100), at(0)).await;

    let position = manager
        .process_signal(buy("BTCUSDT", at(1)), at(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(position.notional, dec!(1000));
    assert_eq!(position.entry_fee, dec!(1));

    let trade = manager
        .close_position("BTCUSDT", Some(position.id), at(2))
        .await
        .unwrap();
    assert_eq!(trade.exit_reason, ExitReason::Manual);
    assert_eq!(trade.pnl, dec!(-2));
    assert_eq!(trade.fees, dec!(2));

    let snapshot = manager.snapshot().await;
    assert_eq!(snapshot.portfolio.balance, dec!(9998));
    assert_invariant(&manager).await;
}

#[tokio::test]
async fn test_consecutive_losses_trip_and_win_resets() {
    let (manager, _bus) = manager(&config());

    let mut clock = 0;
    for _ in 0..5 {
        tick(&manager, "BTCUSDT", dec!(100), at(clock)).await;
        manager
            .process_signal(buy("BTCUSDT", at(clock + 1)), at(clock + 1))
            .await
            .unwrap()
            .unwrap();
        tick(&manager, "BTCUSDT", dec!(95), at(clock + 2)).await;
        clock += 10;
    }
    assert_eq!(manager.snapshot().await.breaker_state.consecutive_losses, 5);

    tick(&manager, "BTCUSDT", dec!(100), at(clock)).await;
    let err = manager
        .process_signal(buy("BTCUSDT", at(clock + 1)), at(clock + 1))
        .await
        .unwrap_err();
    match err {
        RiskError::CircuitBreakerTripped(reasons) => {
            assert_eq!(reasons, vec!["ConsecutiveLosses".to_string()]);
        }
        other => panic!("expected breaker trip, got {other:?}"),
    }

    // Loosen the limit, take a winner, restore the limit
    manager
        .update_settings(RiskSettingsUpdate {
            max_consecutive_losses: Some(10),
            ..Default::default()
        })
        .await
        .unwrap();
    manager
        .process_signal(buy("BTCUSDT", at(clock + 2)), at(clock + 2))
        .await
        .unwrap()
        .unwrap();
    let closed = manager
        .on_price_tick(
            riskgate::feed::PriceTick::new("BTCUSDT", dec!(109), at(clock + 3)),
            at(clock + 3),
        )
        .await
        .unwrap();
    assert_eq!(closed[0].exit_reason, ExitReason::TakeProfit);
    assert_eq!(manager.snapshot().await.breaker_state.consecutive_losses, 0);

    manager
        .update_settings(RiskSettingsUpdate {
            max_consecutive_losses: Some(5),
            ..Default::default()
        })
        .await
        .unwrap();
    tick(&manager, "BTCUSDT", dec!(100), at(clock + 4)).await;
    assert!(manager
        .process_signal(buy("BTCUSDT", at(clock + 5)), at(clock + 5))
        .await
        .unwrap()
        .is_some());
    assert_invariant(&manager).await;
}

#[tokio::test]
async fn test_cooldown_blocks_back_to_back_entries() {
    let mut config = config();
    config.risk.cooldown_seconds = 300;
    let (manager, _bus) = manager(&config);
    tick(&manager, "BTCUSDT", dec!(100), at(0)).await;
    tick(&manager, "ETHUSDT", dec!(50), at(0)).await;

    manager
        .process_signal(buy("BTCUSDT", at(1)), at(1))
        .await
        .unwrap()
        .unwrap();
    let err = manager
        .process_signal(buy("ETHUSDT", at(2)), at(2))
        .await
        .unwrap_err();
    assert!(matches!(err, RiskError::CircuitBreakerTripped(ref r) if r == &vec!["Cooldown".to_string()]));

    // Cooldown measured from the open; fresh ticks keep prices usable
    tick(&manager, "ETHUSDT", dec!(50), at(302)).await;
    assert!(manager
        .process_signal(buy("ETHUSDT", at(302)), at(302))
        .await
        .unwrap()
        .is_some());
}

/// One trade per engine lifetime
struct SingleShot;

impl riskgate::risk::Breaker for SingleShot {
    fn name(&self) -> &'static str {
        "SingleShot"
    }

    fn evaluate(&self, ctx: &riskgate::risk::BreakerContext<'_>) -> bool {
        ctx.state.last_trade_at.is_some()
    }
}

#[tokio::test]
async fn test_custom_breaker_and_simulator() {
    use riskgate::engine::{EventBus, RiskManager};
    use riskgate::execution::ExecutionSimulator;
    use riskgate::risk::CircuitBreakerBank;
    use std::sync::Arc;

    let mut config = config();
    // Overridden below
    config.execution.taker_fee_rate = dec!(0.5);
    let manager = RiskManager::new(&config, Arc::new(EventBus::default()), t0())
        .with_breakers(CircuitBreakerBank::standard().with_breaker(SingleShot))
        .with_simulator(ExecutionSimulator::new(dec!(0), dec!(0.001)));

    tick(&manager, "BTCUSDT", dec!(100), at(0)).await;
    tick(&manager, "ETHUSDT", dec!(50), at(0)).await;
    let position = manager
        .process_signal(buy("BTCUSDT", at(1)), at(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(position.entry_fee, dec!(0.2));

    let err = manager
        .process_signal(buy("ETHUSDT", at(2)), at(2))
        .await
        .unwrap_err();
    assert_eq!(err, RiskError::CircuitBreakerTripped(vec!["SingleShot".to_string()]));
    let snapshot = manager.snapshot().await;
    assert_eq!(snapshot.last_breaker.reasons, vec!["SingleShot".to_string()]);
}
