//! Emergency stop and resume

use crate::common::*;
use riskgate::engine::EngineEvent;
use riskgate::portfolio::ExitReason;
use riskgate::risk::RiskError;
use riskgate::signal::{ManualTradeRequest, Side};
use rust_decimal_macros::dec;

fn paused(err: RiskError) -> bool {
    matches!(err, RiskError::CircuitBreakerTripped(ref r) if r == &vec!["GlobalPause".to_string()])
}

#[tokio::test]
async fn test_emergency_stop_flattens_and_blocks_until_resume() {
    let (manager, bus) = manager(&config());
    let mut rx = bus.subscribe();

    tick(&manager, "BTCUSDT", dec!(100), at(0)).await;
    tick(&manager, "ETHUSDT", dec!(50), at(0)).await;
    manager
        .process_signal(buy("BTCUSDT", at(1)), at(1))
        .await
        .unwrap()
        .unwrap();
    manager
        .process_signal(buy("ETHUSDT", at(1)), at(1))
        .await
        .unwrap()
        .unwrap();
    tick(&manager, "BTCUSDT", dec!(100.5), at(2)).await;

    let closed = manager.emergency_stop(at(3)).await.unwrap();
    assert_eq!(closed.len(), 2);
    assert!(closed.iter().all(|t| t.exit_reason == ExitReason::Emergency));
    assert!(manager.is_emergency());

    let snapshot = manager.snapshot().await;
    assert!(snapshot.open_positions.is_empty());
    assert!(snapshot.emergency);
    assert!(snapshot.breaker_state.global_pause);
    // BTC up 0.5 on size 2, ETH flat
    assert_eq!(snapshot.portfolio.balance, dec!(10001));
    assert_invariant(&manager).await;

    let mut names = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let EngineEvent::EmergencyStop { closed } = &event {
            assert_eq!(closed.len(), 2);
        }
        names.push(event.name());
    }
    assert_eq!(
        names,
        vec![
            "trade_opened",
            "trade_opened",
            "trade_closed",
            "trade_closed",
            "emergency_stop"
        ]
    );

    // Every entry path is refused with only the pause as reason
    tick(&manager, "BTCUSDT", dec!(100), at(4)).await;
    let err = manager
        .process_signal(buy("BTCUSDT", at(5)), at(5))
        .await
        .unwrap_err();
    assert!(paused(err));
    let err = manager
        .manual_trade(
            ManualTradeRequest {
                symbol: "BTCUSDT".to_string(),
                side: Some(Side::Long),
                confidence: Some(dec!(0.9)),
                force: true,
            },
            at(5),
        )
        .await
        .unwrap_err();
    assert!(paused(err));

    manager.resume().await;
    assert!(!manager.is_emergency());
    assert!(manager
        .process_signal(buy("BTCUSDT", at(6)), at(6))
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_emergency_stop_with_nothing_open() {
    let (manager, _bus) = manager(&config());

    let closed = manager.emergency_stop(at(0)).await.unwrap();
    assert!(closed.is_empty());
    assert!(manager.is_emergency());

    // Ticks are still marked while paused
    tick(&manager, "BTCUSDT", dec!(100), at(1)).await;
    manager.resume().await;
    let snapshot = manager.snapshot().await;
    assert!(!snapshot.emergency);
    assert!(!snapshot.breaker_state.global_pause);
}
