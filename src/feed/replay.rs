//! JSONL replay of recorded ticks

use super::{PriceFeed, PriceTick};
use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;

/// Read a file with one JSON document per line, skipping blank lines
pub fn read_jsonl<T: DeserializeOwned>(path: impl AsRef<Path>) -> anyhow::Result<Vec<T>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid record", path.display(), idx + 1))
        })
        .collect()
}

/// Feed that replays a fixed list of ticks in order
pub struct ReplayFeed {
    ticks: Vec<PriceTick>,
    /// When set, ticks are spaced by this delay and restamped with the send time
    pace: Option<Duration>,
}

impl ReplayFeed {
    pub fn new(ticks: Vec<PriceTick>) -> Self {
        Self { ticks, pace: None }
    }

    /// Replay as a live stream: one tick per `pace`, timestamped on send
    pub fn paced(mut self, pace: Duration) -> Self {
        self.pace = Some(pace);
        self
    }

    pub fn from_jsonl(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        Ok(Self::new(read_jsonl(path)?))
    }

    pub fn ticks(&self) -> &[PriceTick] {
        &self.ticks
    }
}

#[async_trait]
impl PriceFeed for ReplayFeed {
    async fn subscribe(&self) -> anyhow::Result<mpsc::Receiver<PriceTick>> {
        let (tx, rx) = mpsc::channel(1024);
        let ticks = self.ticks.clone();
        let pace = self.pace;

        tokio::spawn(async move {
            for mut tick in ticks {
                if let Some(pace) = pace {
                    tokio::time::sleep(pace).await;
                    tick.timestamp = Utc::now();
                }
                if tx.send(tick).await.is_err() {
                    tracing::debug!("Replay receiver dropped");
                    break;
                }
            }
        });

        Ok(rx)
    }
}
