//! Prometheus metrics

use crate::portfolio::{BreakerState, ExitReason, Portfolio};
use ::metrics::{counter, gauge};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Current equity
    Equity,
    /// Realized balance
    Balance,
    /// Highest equity observed
    PeakEquity,
    /// Current drawdown fraction
    DrawdownPct,
    /// Open position count
    OpenPositions,
    /// Losing closes in a row
    ConsecutiveLosses,
}

impl GaugeMetric {
    fn name(self) -> &'static str {
        match self {
            GaugeMetric::Equity => "riskgate_equity_usd",
            GaugeMetric::Balance => "riskgate_balance_usd",
            GaugeMetric::PeakEquity => "riskgate_peak_equity_usd",
            GaugeMetric::DrawdownPct => "riskgate_drawdown_pct",
            GaugeMetric::OpenPositions => "riskgate_open_positions",
            GaugeMetric::ConsecutiveLosses => "riskgate_consecutive_losses",
        }
    }
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    gauge!(metric.name()).set(value);
}

fn as_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

/// Publish portfolio and breaker gauges
pub fn record_portfolio(portfolio: &Portfolio, state: &BreakerState, open_positions: usize) {
    set_gauge(GaugeMetric::Equity, as_f64(portfolio.equity));
    set_gauge(GaugeMetric::Balance, as_f64(portfolio.balance));
    set_gauge(GaugeMetric::PeakEquity, as_f64(portfolio.peak_equity));
    set_gauge(GaugeMetric::DrawdownPct, as_f64(portfolio.drawdown_pct()));
    set_gauge(GaugeMetric::OpenPositions, open_positions as f64);
    set_gauge(GaugeMetric::ConsecutiveLosses, f64::from(state.consecutive_losses));
}

pub fn record_signal() {
    counter!("riskgate_signals_processed_total").increment(1);
}

/// Count a rejected request by error kind and the stage it reached
pub fn record_rejection(kind: &'static str, stage: &'static str) {
    counter!("riskgate_rejections_total", "kind" => kind, "stage" => stage).increment(1);
}

pub fn record_trade_opened(symbol: &str) {
    counter!("riskgate_trades_opened_total", "symbol" => symbol.to_string()).increment(1);
}

pub fn record_trade_closed(reason: ExitReason) {
    counter!("riskgate_trades_closed_total", "reason" => reason.to_string()).increment(1);
}

/// One increment per tripped breaker
pub fn record_breaker_trips(reasons: &[String]) {
    for reason in reasons {
        counter!("riskgate_breaker_trips_total", "breaker" => reason.clone()).increment(1);
    }
}
