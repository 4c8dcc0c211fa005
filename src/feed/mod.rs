//! Price feed module
//!
//! Price ticks, last-known-price book and replay feed

mod book;
mod replay;
mod types;

pub use book::PriceBook;
pub use replay::{read_jsonl, ReplayFeed};
pub use types::PriceTick;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Trait for price feed implementations
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Subscribe to price updates
    async fn subscribe(&self) -> anyhow::Result<mpsc::Receiver<PriceTick>>;
}
