//! Account balances, equity tracking and breaker counters

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Virtual account state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    /// Realized account balance (initial + realized P&L - open entry fees)
    pub balance: Decimal,
    /// Balance plus unrealized P&L of open positions
    pub equity: Decimal,
    /// Quote capital tied up in open positions
    pub committed: Decimal,
    pub initial_balance: Decimal,
    /// Balance at the start of the current UTC day
    pub day_start_balance: Decimal,
    /// UTC day `day_start_balance` belongs to
    pub trading_day: NaiveDate,
    /// Highest equity ever observed; never decreases
    pub peak_equity: Decimal,
}

impl Portfolio {
    /// Create a flat portfolio
    pub fn new(initial_balance: Decimal, now: DateTime<Utc>) -> Self {
        Self {
            balance: initial_balance,
            equity: initial_balance,
            committed: Decimal::ZERO,
            initial_balance,
            day_start_balance: initial_balance,
            trading_day: now.date_naive(),
            peak_equity: initial_balance,
        }
    }

    /// Capital free for new positions
    pub fn available_funds(&self) -> Decimal {
        self.balance - self.committed
    }

    /// Loss since the start of the day as a fraction of the day's opening balance
    pub fn daily_loss_pct(&self) -> Decimal {
        if self.day_start_balance <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (self.day_start_balance - self.balance) / self.day_start_balance
    }

    /// Current drawdown from peak equity
    pub fn drawdown_pct(&self) -> Decimal {
        if self.peak_equity <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (self.peak_equity - self.equity) / self.peak_equity
    }

    /// Start a new trading day if `now` falls on a later UTC date
    pub fn roll_day(&mut self, now: DateTime<Utc>) -> bool {
        let today = now.date_naive();
        if today <= self.trading_day {
            return false;
        }
        tracing::info!(
            day = %today,
            previous_day_start = %self.day_start_balance,
            balance = %self.balance,
            "New trading day, resetting daily loss baseline"
        );
        self.trading_day = today;
        self.day_start_balance = self.balance;
        true
    }

    /// Recompute equity from the unrealized total and lift the peak if exceeded
    pub(crate) fn revalue(&mut self, unrealized: Decimal) {
        self.equity = self.balance + unrealized;
        if self.equity > self.peak_equity {
            self.peak_equity = self.equity;
        }
    }
}

/// Counters read by the circuit breakers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerState {
    pub consecutive_losses: u32,
    pub last_trade_at: Option<DateTime<Utc>>,
    /// Set by emergency stop, cleared only by resume
    pub global_pause: bool,
}

impl BreakerState {
    pub fn record_open(&mut self, now: DateTime<Utc>) {
        self.last_trade_at = Some(now);
    }

    pub fn record_close(&mut self, pnl: Decimal, now: DateTime<Utc>) {
        if pnl < Decimal::ZERO {
            self.consecutive_losses += 1;
        } else {
            self.consecutive_losses = 0;
        }
        self.last_trade_at = Some(now);
    }
}
