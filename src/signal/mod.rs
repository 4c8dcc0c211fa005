//! Signal module
//!
//! Predictor signals and operator requests consumed by the risk manager

mod source;
mod types;

pub use source::QueuedSignalSource;
pub use types::{Direction, ManualTradeRequest, PositionUpdateRequest, Side, Signal};

use async_trait::async_trait;

/// Trait for the external predictor feeding the scheduled cycle
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// Signals to process in the current cycle
    async fn next_signals(&self) -> anyhow::Result<Vec<Signal>>;
}
