//! Background producers feeding the risk manager
//!
//! A scheduled signal cycle and a price-tick consumer run as tokio tasks
//! against one shared `RiskManager`; manual requests go straight to the
//! manager through the handle. The first signal cycle waits for the first
//! processed tick so queued signals are not judged against an empty book.

use super::RiskManager;
use crate::feed::{PriceFeed, PriceTick};
use crate::signal::SignalSource;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Wires producers to a shared manager
pub struct TradingService {
    manager: Arc<RiskManager>,
    signals: Arc<dyn SignalSource>,
    feed: Arc<dyn PriceFeed>,
    signal_interval: Duration,
}

impl TradingService {
    pub fn new(
        manager: Arc<RiskManager>,
        signals: Arc<dyn SignalSource>,
        feed: Arc<dyn PriceFeed>,
        signal_interval: Duration,
    ) -> Self {
        Self {
            manager,
            signals,
            feed,
            signal_interval,
        }
    }

    /// Subscribe to the feed and spawn both producer loops
    pub async fn start(self) -> anyhow::Result<ServiceHandle> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (primed_tx, primed_rx) = watch::channel(false);
        let ticks = self.feed.subscribe().await?;

        let tick_task = tokio::spawn(tick_loop(
            self.manager.clone(),
            ticks,
            primed_tx,
            shutdown_rx.clone(),
        ));
        let signal_task = tokio::spawn(signal_loop(
            self.manager.clone(),
            self.signals,
            self.signal_interval,
            primed_rx,
            shutdown_rx,
        ));

        tracing::info!(
            interval_secs = self.signal_interval.as_secs(),
            "Trading service started"
        );
        Ok(ServiceHandle {
            manager: self.manager,
            shutdown_tx,
            tasks: vec![tick_task, signal_task],
        })
    }
}

/// Running service
pub struct ServiceHandle {
    manager: Arc<RiskManager>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl ServiceHandle {
    /// Manager for manual operations while the service runs
    pub fn manager(&self) -> &Arc<RiskManager> {
        &self.manager
    }

    /// Signal both loops to stop and wait for them
    pub async fn shutdown(self) -> anyhow::Result<()> {
        // Receivers may already be gone if the feed ended
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            task.await?;
        }
        tracing::info!("Trading service stopped");
        Ok(())
    }
}

/// Process one batch from the signal source. Returns positions opened.
pub async fn run_signal_cycle(manager: &RiskManager, source: &dyn SignalSource) -> usize {
    let signals = match source.next_signals().await {
        Ok(signals) => signals,
        Err(e) => {
            tracing::warn!(error = %e, "Signal source failed, skipping cycle");
            return 0;
        }
    };

    let mut opened = 0;
    for signal in signals {
        match manager.process_signal(signal, Utc::now()).await {
            Ok(Some(_)) => opened += 1,
            Ok(None) => {}
            Err(err) if err.is_fatal() => {
                tracing::error!(error = %err, "Abandoning signal cycle");
                break;
            }
            // Rejections are logged by the pipeline
            Err(_) => {}
        }
    }
    opened
}

async fn signal_loop(
    manager: Arc<RiskManager>,
    source: Arc<dyn SignalSource>,
    period: Duration,
    mut primed: watch::Receiver<bool>,
    mut shutdown: watch::Receiver<bool>,
) {
    tokio::select! {
        ready = primed.wait_for(|ready| *ready) => {
            // Sender gone means the feed ended; run cycles on whatever prices exist
            if ready.is_err() {
                tracing::debug!("Price feed ended before its first tick");
            }
        }
        _ = shutdown.wait_for(|stop| *stop) => return,
    }

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let opened = run_signal_cycle(&manager, source.as_ref()).await;
                tracing::debug!(opened, "Signal cycle complete");
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

async fn tick_loop(
    manager: Arc<RiskManager>,
    mut ticks: mpsc::Receiver<PriceTick>,
    primed: watch::Sender<bool>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            tick = ticks.recv() => {
                let Some(tick) = tick else {
                    tracing::info!("Price feed closed");
                    break;
                };
                match manager.on_price_tick(tick, Utc::now()).await {
                    Ok(_) => {
                        if !*primed.borrow() {
                            primed.send_replace(true);
                        }
                    }
                    Err(err) if err.is_transient() => {
                        tracing::debug!(error = %err, "Tick skipped");
                    }
                    Err(err) => tracing::warn!(error = %err, "Tick processing failed"),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
