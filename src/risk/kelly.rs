//! Kelly criterion position sizing

use crate::portfolio::ClosedTrade;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Win/loss statistics over closed trades
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeStats {
    pub trades: usize,
    pub win_rate: Decimal,
    /// Mean P&L of winning trades
    pub avg_win: Decimal,
    /// Mean loss magnitude of losing trades (positive)
    pub avg_loss: Decimal,
}

impl TradeStats {
    pub fn new(trades: usize, win_rate: Decimal, avg_win: Decimal, avg_loss: Decimal) -> Self {
        Self {
            trades,
            win_rate,
            avg_win,
            avg_loss,
        }
    }

    /// Break-even trades count as wins
    pub fn from_trades(trades: &[ClosedTrade]) -> Self {
        let mut tally = TradeTally::default();
        for trade in trades {
            tally.record(trade.pnl);
        }
        tally.stats()
    }

    /// Win/loss payoff ratio `b`; zero without any losses
    pub fn payoff_ratio(&self) -> Decimal {
        if self.avg_loss.is_zero() {
            return Decimal::ZERO;
        }
        self.avg_win / self.avg_loss
    }
}

/// Running win/loss totals, updated once per close
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeTally {
    trades: usize,
    wins: usize,
    win_total: Decimal,
    /// Sum of loss magnitudes
    loss_total: Decimal,
}

impl TradeTally {
    /// Add one closed trade's net P&L; break-even counts as a win
    pub fn record(&mut self, pnl: Decimal) {
        self.trades += 1;
        if pnl >= Decimal::ZERO {
            self.wins += 1;
            self.win_total += pnl;
        } else {
            self.loss_total += pnl.abs();
        }
    }

    pub fn trades(&self) -> usize {
        self.trades
    }

    pub fn stats(&self) -> TradeStats {
        if self.trades == 0 {
            return TradeStats::default();
        }
        let losses = self.trades - self.wins;
        let mean = |total: Decimal, count: usize| {
            if count == 0 {
                Decimal::ZERO
            } else {
                total / Decimal::from(count)
            }
        };

        TradeStats {
            trades: self.trades,
            win_rate: Decimal::from(self.wins) / Decimal::from(self.trades),
            avg_win: mean(self.win_total, self.wins),
            avg_loss: mean(self.loss_total, losses),
        }
    }
}

/// Kelly criterion calculator
#[derive(Debug, Clone)]
pub struct KellyCalculator {
    /// Multiplier on full Kelly (0.5 = half Kelly)
    pub fraction: Decimal,
    /// Maximum fraction of balance
    pub max_fraction: Decimal,
}

impl KellyCalculator {
    /// Create a new Kelly calculator
    pub fn new(fraction: Decimal, max_fraction: Decimal) -> Self {
        Self {
            fraction,
            max_fraction,
        }
    }

    /// Fraction of balance to commit
    ///
    /// - b = avg_win / avg_loss
    /// - f* = (p*b - q) / b
    /// - result = clamp(f* * fraction, 0, max_fraction)
    pub fn fraction_for(&self, win_rate: Decimal, payoff_ratio: Decimal) -> Decimal {
        if payoff_ratio <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let lose_rate = Decimal::ONE - win_rate;
        let kelly = (win_rate * payoff_ratio - lose_rate) / payoff_ratio;

        (kelly * self.fraction)
            .max(Decimal::ZERO)
            .min(self.max_fraction)
    }

    /// Fraction from realized statistics
    pub fn from_stats(&self, stats: &TradeStats) -> Decimal {
        self.fraction_for(stats.win_rate, stats.payoff_ratio())
    }
}

impl Default for KellyCalculator {
    fn default() -> Self {
        Self::new(dec!(0.5), dec!(0.25))
    }
}
