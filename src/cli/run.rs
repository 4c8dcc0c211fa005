//! Run command: deterministic replay of recorded ticks and signals

use crate::config::Config;
use crate::engine::{EventBus, RiskManager};
use crate::feed::{read_jsonl, PriceTick};
use crate::portfolio::ExitReason;
use crate::signal::Signal;
use chrono::{DateTime, Utc};
use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSONL file of price ticks
    #[arg(long)]
    pub ticks: PathBuf,

    /// JSONL file of predictor signals
    #[arg(long)]
    pub signals: Option<PathBuf>,

    /// Initial capital (overrides config)
    #[arg(long)]
    pub capital: Option<Decimal>,

    /// Close positions still open at the end of the replay
    #[arg(long)]
    pub flatten: bool,

    /// Output format: json or table
    #[arg(long, default_value = "table")]
    pub format: String,
}

impl RunArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let ticks: Vec<PriceTick> = read_jsonl(&self.ticks)?;
        let signals: Vec<Signal> = match &self.signals {
            Some(path) => read_jsonl(path)?,
            None => vec![],
        };
        tracing::info!(ticks = ticks.len(), signals = signals.len(), "Loaded replay data");

        let mut config = config.clone();
        if let Some(capital) = self.capital {
            config.engine.initial_balance = capital;
        }

        let start = replay_start(&ticks, &signals);
        let manager = RiskManager::new(&config, Arc::new(EventBus::default()), start);
        let summary = replay(&manager, ticks, signals, self.flatten).await;

        match self.format.as_str() {
            "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
            "table" => println!("{}", summary.format_table()),
            other => anyhow::bail!("unknown output format: {other}"),
        }
        Ok(())
    }
}

/// Outcome of a replay
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplaySummary {
    pub ticks: usize,
    pub signals: usize,
    pub opened: usize,
    pub closed: usize,
    /// Rejection count per error kind
    pub rejections: BTreeMap<String, usize>,
    /// Closes per exit reason
    pub exits: BTreeMap<String, usize>,
    pub initial_balance: Decimal,
    pub final_balance: Decimal,
    pub equity: Decimal,
    pub peak_equity: Decimal,
    pub drawdown_pct: Decimal,
    pub net_pnl: Decimal,
    pub fees: Decimal,
    pub win_rate: Decimal,
    pub open_positions: usize,
}

impl ReplaySummary {
    /// Closes recorded for `reason`
    pub fn exits_for(&self, reason: ExitReason) -> usize {
        self.exits.get(&reason.to_string()).copied().unwrap_or_default()
    }

    /// Format as table for CLI output
    pub fn format_table(&self) -> String {
        let rejections = if self.rejections.is_empty() {
            "  none".to_string()
        } else {
            self.rejections
                .iter()
                .map(|(kind, count)| format!("  {kind:<24}{count}"))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let return_pct = if self.initial_balance.is_zero() {
            Decimal::ZERO
        } else {
            self.net_pnl / self.initial_balance * dec!(100)
        };

        format!(
            r#"
══════════════════════════════════════════════════════
               REPLAY RESULTS
══════════════════════════════════════════════════════

PORTFOLIO
───────────────────────────────────────────────────────
Net P&L:          {:+.2} ({:+.2}%)
Balance:          {:.2}
Equity:           {:.2}
Peak Equity:      {:.2}
Drawdown:         {:.2}%
Fees Paid:        {:.2}

ACTIVITY
───────────────────────────────────────────────────────
Ticks:            {}
Signals:          {}
Opened:           {}
Closed:           {}
Still Open:       {}
Win Rate:         {:.1}%

REJECTIONS
───────────────────────────────────────────────────────
{}
══════════════════════════════════════════════════════
"#,
            self.net_pnl,
            return_pct,
            self.final_balance,
            self.equity,
            self.peak_equity,
            self.drawdown_pct * dec!(100),
            self.fees,
            self.ticks,
            self.signals,
            self.opened,
            self.closed,
            self.open_positions,
            self.win_rate * dec!(100),
            rejections,
        )
    }
}

enum ReplayEvent {
    Tick(PriceTick),
    Signal(Signal),
}

impl ReplayEvent {
    fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ReplayEvent::Tick(tick) => tick.timestamp,
            ReplayEvent::Signal(signal) => signal.timestamp,
        }
    }
}

fn replay_start(ticks: &[PriceTick], signals: &[Signal]) -> DateTime<Utc> {
    ticks
        .iter()
        .map(|t| t.timestamp)
        .chain(signals.iter().map(|s| s.timestamp))
        .min()
        .unwrap_or_else(Utc::now)
}

/// Drive `manager` through ticks and signals in timestamp order, using each
/// record's timestamp as the clock. At equal timestamps ticks go first.
pub async fn replay(
    manager: &RiskManager,
    ticks: Vec<PriceTick>,
    signals: Vec<Signal>,
    flatten: bool,
) -> ReplaySummary {
    let mut summary = ReplaySummary {
        ticks: ticks.len(),
        signals: signals.len(),
        ..Default::default()
    };

    let mut events: Vec<ReplayEvent> = ticks
        .into_iter()
        .map(ReplayEvent::Tick)
        .chain(signals.into_iter().map(ReplayEvent::Signal))
        .collect();
    // Stable sort keeps ticks ahead of signals at the same instant
    events.sort_by_key(ReplayEvent::timestamp);

    let mut clock = None;
    for event in events {
        let now = event.timestamp();
        clock = Some(now);
        let outcome = match event {
            ReplayEvent::Tick(tick) => manager.on_price_tick(tick, now).await.map(|_| ()),
            ReplayEvent::Signal(signal) => manager
                .process_signal(signal, now)
                .await
                .map(|opened| summary.opened += usize::from(opened.is_some())),
        };
        if let Err(err) = outcome {
            *summary.rejections.entry(err.kind().to_string()).or_default() += 1;
            if err.is_fatal() {
                tracing::error!(error = %err, "Replay halted");
                break;
            }
        }
    }

    if flatten {
        let now = clock.unwrap_or_else(Utc::now);
        for position in manager.snapshot().await.open_positions {
            if let Err(err) = manager
                .close_position(&position.symbol, Some(position.id), now)
                .await
            {
                tracing::warn!(symbol = %position.symbol, error = %err, "Could not flatten");
            }
        }
    }

    let snapshot = manager.snapshot().await;
    let trades = manager.closed_trades(0, snapshot.closed_count).await;
    summary.closed = trades.len();
    for trade in &trades {
        *summary.exits.entry(trade.exit_reason.to_string()).or_default() += 1;
    }
    summary.net_pnl = trades.iter().map(|t| t.pnl).sum();
    summary.fees = trades.iter().map(|t| t.fees).sum();
    if !trades.is_empty() {
        let wins = trades.iter().filter(|t| t.is_win()).count();
        summary.win_rate = Decimal::from(wins) / Decimal::from(trades.len());
    }
    summary.initial_balance = snapshot.portfolio.initial_balance;
    summary.final_balance = snapshot.portfolio.balance;
    summary.equity = snapshot.portfolio.equity;
    summary.peak_equity = snapshot.portfolio.peak_equity;
    summary.drawdown_pct = snapshot.portfolio.drawdown_pct();
    summary.open_positions = snapshot.open_positions.len();
    summary
}
