//! Serve command: run the scheduled engine until interrupted

use crate::config::Config;
use crate::engine::{EventBus, RiskManager, TradingService};
use crate::feed::ReplayFeed;
use crate::risk::MAX_DURATION_SECS;
use crate::signal::QueuedSignalSource;
use chrono::Utc;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// JSONL file of price ticks streamed into the engine
    #[arg(long)]
    pub ticks: PathBuf,

    /// JSONL file of signals handed to the first scheduled cycle, which
    /// runs once the first tick has been processed
    #[arg(long)]
    pub signals: Option<PathBuf>,

    /// Override the scheduled signal interval (seconds)
    #[arg(long)]
    pub interval: Option<u64>,

    /// Delay between streamed ticks (milliseconds)
    #[arg(long, default_value_t = 1000)]
    pub pace_ms: u64,
}

impl ServeArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let feed = Arc::new(
            ReplayFeed::from_jsonl(&self.ticks)?.paced(Duration::from_millis(self.pace_ms)),
        );
        let signals = match &self.signals {
            Some(path) => QueuedSignalSource::from_jsonl(path)?,
            None => QueuedSignalSource::new(),
        };
        let interval = self.interval.unwrap_or(config.engine.signal_interval_secs);

        let bus = Arc::new(EventBus::default());
        let mut events = bus.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                tracing::info!(event = event.name(), "Engine event");
            }
        });

        let manager = Arc::new(RiskManager::new(config, bus, Utc::now()));
        let handle = TradingService::new(
            manager,
            Arc::new(signals),
            feed,
            Duration::from_secs(interval.clamp(1, MAX_DURATION_SECS)),
        )
        .start()
        .await?;

        tracing::info!("Engine running, press Ctrl-C to stop");
        tokio::signal::ctrl_c().await?;

        let snapshot = handle.manager().snapshot().await;
        handle.shutdown().await?;
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        Ok(())
    }
}
