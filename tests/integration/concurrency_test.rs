//! Concurrent producers against one manager

use crate::common::*;
use riskgate::risk::RiskError;
use riskgate::signal::{ManualTradeRequest, Side};
use rust_decimal_macros::dec;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_entries_respect_cooldown() {
    let mut config = config();
    config.risk.cooldown_seconds = 300;
    let (manager, _bus) = manager(&config);

    let symbols: Vec<String> = (0..16).map(|i| format!("SYM{i}USDT")).collect();
    for symbol in &symbols {
        tick(&manager, symbol, dec!(100), at(0)).await;
    }

    let mut handles = Vec::new();
    for (i, symbol) in symbols.iter().cloned().enumerate() {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                manager
                    .process_signal(buy(&symbol, at(1)), at(1))
                    .await
                    .map(|opened| opened.is_some())
            } else {
                manager
                    .manual_trade(
                        ManualTradeRequest {
                            symbol,
                            side: Some(Side::Long),
                            confidence: Some(dec!(0.8)),
                            force: false,
                        },
                        at(1),
                    )
                    .await
                    .map(|_| true)
            }
        }));
    }

    let mut opened = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(true) => opened += 1,
            Ok(false) => panic!("directional request produced no position"),
            Err(RiskError::CircuitBreakerTripped(reasons)) => {
                assert_eq!(reasons, vec!["Cooldown".to_string()]);
            }
            Err(other) => panic!("unexpected rejection {other:?}"),
        }
    }

    assert_eq!(opened, 1);
    assert_eq!(manager.snapshot().await.open_positions.len(), 1);
    assert_invariant(&manager).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_closes_settle_once() {
    let (manager, _bus) = manager(&config());
    tick(&manager, "BTCUSDT", dec!(100), at(0)).await;
    let position = manager
        .process_signal(buy("BTCUSDT", at(1)), at(1))
        .await
        .unwrap()
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let manager = manager.clone();
        let id = position.id;
        handles.push(tokio::spawn(async move {
            manager.close_position("BTCUSDT", Some(id), at(2)).await
        }));
    }

    let mut closed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => closed += 1,
            Err(err) => assert!(matches!(err, RiskError::ConcurrentModification(_))),
        }
    }

    assert_eq!(closed, 1);
    let snapshot = manager.snapshot().await;
    assert_eq!(snapshot.closed_trades.len(), 1);
    assert_eq!(snapshot.portfolio.balance, dec!(10000));
    assert_invariant(&manager).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_ticks_and_signals_interleave_safely() {
    let (manager, _bus) = manager(&config());
    tick(&manager, "BTCUSDT", dec!(100), at(0)).await;

    let ticker = {
        let manager = manager.clone();
        tokio::spawn(async move {
            for i in 1..=50 {
                let price = dec!(100) + rust_decimal::Decimal::from(i % 3);
                let _ = manager
                    .on_price_tick(riskgate::feed::PriceTick::new("BTCUSDT", price, at(i)), at(i))
                    .await;
            }
        })
    };
    let trader = {
        let manager = manager.clone();
        tokio::spawn(async move {
            for i in 1..=50 {
                let _ = manager.process_signal(buy("BTCUSDT", at(i)), at(i)).await;
            }
        })
    };
    ticker.await.unwrap();
    trader.await.unwrap();

    let snapshot = manager.snapshot().await;
    assert!(snapshot.open_positions.len() <= 1);
    assert_invariant(&manager).await;
}
