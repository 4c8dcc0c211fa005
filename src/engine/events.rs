//! Engine notifications for external listeners

use crate::portfolio::{ClosedTrade, Position};
use serde::Serialize;
use tokio::sync::broadcast;

/// State change published after the engine lock is released
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    TradeOpened(Position),
    TradeClosed(ClosedTrade),
    PositionUpdated(Position),
    CircuitBreakerTripped {
        symbol: String,
        reasons: Vec<String>,
    },
    EmergencyStop {
        closed: Vec<ClosedTrade>,
    },
    Resumed,
}

impl EngineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::TradeOpened(_) => "trade_opened",
            EngineEvent::TradeClosed(_) => "trade_closed",
            EngineEvent::PositionUpdated(_) => "position_updated",
            EngineEvent::CircuitBreakerTripped { .. } => "circuit_breaker_tripped",
            EngineEvent::EmergencyStop { .. } => "emergency_stop",
            EngineEvent::Resumed => "resumed",
        }
    }
}

/// Receiver of engine events. Must not block.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &EngineEvent);
}

/// Fan-out of engine events to any number of subscribers.
///
/// Slow subscribers lag and lose the oldest events; the engine never waits.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventSink for EventBus {
    fn publish(&self, event: &EngineEvent) {
        // No subscribers is fine
        let _ = self.tx.send(event.clone());
    }
}
