//! In-memory signal queue, optionally seeded from a JSONL file

use super::{Signal, SignalSource};
use crate::feed::read_jsonl;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use tokio::sync::Mutex;

/// Signal source that hands out everything queued since the last cycle
#[derive(Default)]
pub struct QueuedSignalSource {
    queue: Mutex<VecDeque<Signal>>,
}

impl QueuedSignalSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load signals from a file with one JSON object per line
    pub fn from_jsonl(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let signals: Vec<Signal> = read_jsonl(path)?;
        Ok(Self {
            queue: Mutex::new(signals.into()),
        })
    }

    /// Enqueue a signal for the next cycle
    pub async fn push(&self, signal: Signal) {
        self.queue.lock().await.push_back(signal);
    }

    pub async fn len(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.queue.lock().await.is_empty()
    }
}

#[async_trait]
impl SignalSource for QueuedSignalSource {
    async fn next_signals(&self) -> anyhow::Result<Vec<Signal>> {
        let mut queue = self.queue.lock().await;
        Ok(queue.drain(..).collect())
    }
}
