//! Position ledger
//!
//! Sole owner of the portfolio, open positions and closed-trade history.
//! Every mutation leaves `equity == balance + Σ unrealized_pnl`.

use super::account::{BreakerState, Portfolio};
use super::types::{check_stop_order, ClosedTrade, ExitReason, Position, PositionStatus};
use crate::execution::Fill;
use crate::risk::{RiskError, TradeStats, TradeTally};
use crate::signal::Side;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Accepted drift between stored and recomputed equity
pub const EQUITY_TOLERANCE: Decimal = dec!(0.000000001);

/// Levels for a new position
#[derive(Debug, Clone, Copy)]
pub struct OpenOrder {
    pub side: Side,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub confidence: Decimal,
}

/// Tracks the portfolio and every position it holds or held
#[derive(Debug, Clone)]
pub struct PositionLedger {
    portfolio: Portfolio,
    breaker: BreakerState,
    open_positions: HashMap<Uuid, Position>,
    closed_trades: Vec<ClosedTrade>,
    closed_ids: HashSet<Uuid>,
    /// Kept in step with `closed_trades` so sizing never rescans history
    tally: TradeTally,
}

impl PositionLedger {
    /// Create a ledger with a flat portfolio
    pub fn new(initial_balance: Decimal, now: DateTime<Utc>) -> Self {
        Self {
            portfolio: Portfolio::new(initial_balance, now),
            breaker: BreakerState::default(),
            open_positions: HashMap::new(),
            closed_trades: vec![],
            closed_ids: HashSet::new(),
            tally: TradeTally::default(),
        }
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn breaker_state(&self) -> &BreakerState {
        &self.breaker
    }

    pub fn set_global_pause(&mut self, paused: bool) {
        self.breaker.global_pause = paused;
    }

    /// Reset the daily loss baseline when `now` is on a new UTC day
    pub fn roll_day(&mut self, now: DateTime<Utc>) -> bool {
        self.portfolio.roll_day(now)
    }

    /// Open a position from an entry fill
    pub fn open(
        &mut self,
        fill: &Fill,
        order: OpenOrder,
        now: DateTime<Utc>,
    ) -> Result<Position, RiskError> {
        if self.position_for(&fill.symbol).is_some() {
            return Err(RiskError::PositionAlreadyOpen(fill.symbol.clone()));
        }
        if fill.side != order.side.entry_order() {
            return Err(RiskError::Validation(format!(
                "{:?} fill cannot open a {:?} position",
                fill.side, order.side
            )));
        }
        check_stop_order(
            order.side,
            fill.fill_price,
            Some(order.stop_loss),
            Some(order.take_profit),
        )?;

        let required = fill.notional + fill.fee;
        let available = self.portfolio.available_funds();
        if required > available {
            return Err(RiskError::InsufficientFunds {
                required,
                available,
            });
        }

        let position = Position {
            id: Uuid::new_v4(),
            symbol: fill.symbol.clone(),
            side: order.side,
            entry_price: fill.fill_price,
            size: fill.quantity,
            notional: fill.notional,
            entry_fee: fill.fee,
            stop_loss: order.stop_loss,
            take_profit: order.take_profit,
            opened_at: now,
            status: PositionStatus::Open,
            confidence: order.confidence,
            mark_price: fill.fill_price,
            unrealized_pnl: Decimal::ZERO,
            trailing_active: false,
        };

        self.portfolio.balance -= fill.fee;
        self.portfolio.committed += fill.notional;
        self.breaker.record_open(now);
        self.open_positions.insert(position.id, position.clone());
        self.revalue();

        tracing::info!(
            position_id = %position.id,
            symbol = %position.symbol,
            side = ?position.side,
            entry = %position.entry_price,
            size = %position.size,
            stop_loss = %position.stop_loss,
            take_profit = %position.take_profit,
            "Position opened"
        );
        Ok(position)
    }

    /// Close a position against an exit fill
    pub fn close(
        &mut self,
        position_id: Uuid,
        fill: &Fill,
        reason: ExitReason,
        now: DateTime<Utc>,
    ) -> Result<ClosedTrade, RiskError> {
        let Some(position) = self.open_positions.get(&position_id) else {
            return Err(self.missing(position_id));
        };
        if fill.symbol != position.symbol || fill.side != position.side.exit_order() {
            return Err(RiskError::Validation(format!(
                "{:?} {} fill cannot close {:?} {}",
                fill.side, fill.symbol, position.side, position.symbol
            )));
        }

        let mut position = self
            .open_positions
            .remove(&position_id)
            .ok_or_else(|| self.missing(position_id))?;

        let fees = position.entry_fee + fill.fee;
        let pnl = position.pnl_at(fill.fill_price) - fees;

        // Entry fee was already debited at open
        self.portfolio.balance += pnl + position.entry_fee;
        self.portfolio.committed -= position.notional;
        self.breaker.record_close(pnl, now);

        position.status = PositionStatus::Closed;
        position.mark_price = fill.fill_price;
        position.unrealized_pnl = Decimal::ZERO;

        let closed = ClosedTrade {
            position,
            exit_price: fill.fill_price,
            exit_reason: reason,
            pnl,
            fees,
            closed_at: now,
        };
        self.closed_ids.insert(position_id);
        self.tally.record(pnl);
        self.closed_trades.push(closed.clone());
        self.revalue();

        tracing::info!(
            position_id = %position_id,
            symbol = %closed.position.symbol,
            reason = %reason,
            exit = %closed.exit_price,
            pnl = %pnl,
            consecutive_losses = self.breaker.consecutive_losses,
            "Position closed"
        );
        Ok(closed)
    }

    /// Replace stop loss and/or take profit after checking them against entry
    pub fn update_stops(
        &mut self,
        position_id: Uuid,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
    ) -> Result<Position, RiskError> {
        let missing = self.missing(position_id);
        let position = self.open_positions.get_mut(&position_id).ok_or(missing)?;

        check_stop_order(position.side, position.entry_price, stop_loss, take_profit)?;

        if let Some(sl) = stop_loss {
            position.stop_loss = sl;
            // An operator stop is no longer a trailing stop
            position.trailing_active = false;
        }
        if let Some(tp) = take_profit {
            position.take_profit = tp;
        }
        tracing::info!(
            position_id = %position_id,
            stop_loss = %position.stop_loss,
            take_profit = %position.take_profit,
            "Stops updated"
        );
        Ok(position.clone())
    }

    /// Tighten the stop loss; looser candidates are ignored.
    ///
    /// Returns whether the stop moved.
    pub fn ratchet_stop(&mut self, position_id: Uuid, candidate: Decimal) -> Result<bool, RiskError> {
        let missing = self.missing(position_id);
        let position = self.open_positions.get_mut(&position_id).ok_or(missing)?;

        let tighter = match position.side {
            Side::Long => candidate > position.stop_loss,
            Side::Short => candidate < position.stop_loss,
        };
        if !tighter {
            return Ok(false);
        }

        tracing::debug!(
            position_id = %position_id,
            from = %position.stop_loss,
            to = %candidate,
            "Trailing stop ratcheted"
        );
        position.stop_loss = candidate;
        position.trailing_active = true;
        Ok(true)
    }

    /// Mark positions on `symbol` to `price`
    pub fn mark(&mut self, symbol: &str, price: Decimal) {
        for position in self.open_positions.values_mut() {
            if position.symbol == symbol {
                position.mark_price = price;
                position.unrealized_pnl = position.pnl_at(price);
            }
        }
        self.revalue();
    }

    /// Confirm stored equity matches balance plus unrealized P&L
    pub fn verify_invariant(&self) -> Result<(), RiskError> {
        let expected = self.portfolio.balance + self.unrealized_total();
        if (self.portfolio.equity - expected).abs() > EQUITY_TOLERANCE {
            return Err(RiskError::InvariantViolation {
                equity: self.portfolio.equity,
                expected,
            });
        }
        Ok(())
    }

    pub fn unrealized_total(&self) -> Decimal {
        self.open_positions.values().map(|p| p.unrealized_pnl).sum()
    }

    pub fn position(&self, position_id: Uuid) -> Option<&Position> {
        self.open_positions.get(&position_id)
    }

    /// Open position by id; one closed in the meantime is a concurrent modification
    pub fn require_open(&self, position_id: Uuid) -> Result<&Position, RiskError> {
        self.open_positions
            .get(&position_id)
            .ok_or_else(|| self.missing(position_id))
    }

    pub fn position_for(&self, symbol: &str) -> Option<&Position> {
        self.open_positions.values().find(|p| p.symbol == symbol)
    }

    /// Open positions ordered by entry time
    pub fn open_positions(&self) -> Vec<Position> {
        let mut positions: Vec<Position> = self.open_positions.values().cloned().collect();
        positions.sort_by_key(|p| p.opened_at);
        positions
    }

    pub fn open_count(&self) -> usize {
        self.open_positions.len()
    }

    /// Append-only closed-trade history
    pub fn closed_trades(&self) -> &[ClosedTrade] {
        &self.closed_trades
    }

    pub fn closed_count(&self) -> usize {
        self.closed_trades.len()
    }

    /// Closed trades in close order, `limit` entries from `offset`
    pub fn trade_page(&self, offset: usize, limit: usize) -> &[ClosedTrade] {
        let start = offset.min(self.closed_trades.len());
        let end = start.saturating_add(limit).min(self.closed_trades.len());
        &self.closed_trades[start..end]
    }

    /// The most recent `limit` closed trades
    pub fn recent_trades(&self, limit: usize) -> &[ClosedTrade] {
        let start = self.closed_trades.len().saturating_sub(limit);
        &self.closed_trades[start..]
    }

    pub fn was_closed(&self, position_id: Uuid) -> bool {
        self.closed_ids.contains(&position_id)
    }

    /// Win/loss statistics over the closed history
    pub fn stats(&self) -> TradeStats {
        self.tally.stats()
    }

    fn revalue(&mut self) {
        let unrealized = self.unrealized_total();
        self.portfolio.revalue(unrealized);
    }

    fn missing(&self, position_id: Uuid) -> RiskError {
        if self.was_closed(position_id) {
            RiskError::ConcurrentModification(format!("position {position_id} already closed"))
        } else {
            RiskError::NoOpenPosition(position_id.to_string())
        }
    }

    #[cfg(test)]
    pub(crate) fn portfolio_mut(&mut self) -> &mut Portfolio {
        &mut self.portfolio
    }
}
