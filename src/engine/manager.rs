//! Risk manager
//!
//! Owns the single engine state and serializes every transition on it.
//! Scheduled signals, manual requests and price ticks all take the same
//! lock; breaker reads and ledger writes happen inside one critical section,
//! and events are published only after the lock is released.

use super::events::{EngineEvent, EventSink};
use super::pipeline::{PipelineRun, ProcessingStage, RequestOrigin};
use crate::config::Config;
use crate::execution::ExecutionSimulator;
use crate::exit::{ExitDecision, ExitMonitor};
use crate::feed::{PriceBook, PriceTick};
use crate::portfolio::{
    BreakerState, ClosedTrade, ExitReason, OpenOrder, Portfolio, Position, PositionLedger,
};
use crate::risk::{
    BreakerResult, CircuitBreakerBank, PositionSizer, RiskError, RiskSettings, RiskSettingsUpdate,
    SizingInput, VolatilityTracker,
};
use crate::signal::{ManualTradeRequest, PositionUpdateRequest, Side, Signal};
use crate::telemetry;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

const GLOBAL_PAUSE: &str = "GlobalPause";

/// Closed trades carried in a snapshot; older ones via `closed_trades`
pub const SNAPSHOT_TRADE_LIMIT: usize = 100;

/// Everything guarded by the mutation lock
struct EngineState {
    ledger: PositionLedger,
    prices: PriceBook,
    volatility: VolatilityTracker,
    /// Latest signal per symbol, used to fill gaps in manual requests
    last_signals: HashMap<String, Signal>,
    /// Latched fatal error; cleared only by `clear_halt`
    halted: Option<RiskError>,
    last_breaker: BreakerResult,
}

/// Entry request once origin-specific checks have passed
struct EntryRequest<'a> {
    symbol: &'a str,
    side: Side,
    confidence: Decimal,
    atr: Decimal,
    volatility_ratio: Decimal,
}

/// Point-in-time view for status reporting
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub portfolio: Portfolio,
    pub breaker_state: BreakerState,
    pub open_positions: Vec<Position>,
    /// Most recent closes, at most `SNAPSHOT_TRADE_LIMIT`
    pub closed_trades: Vec<ClosedTrade>,
    /// Closes since start, including those not carried above
    pub closed_count: usize,
    pub last_breaker: BreakerResult,
    pub halted: Option<String>,
    pub emergency: bool,
    pub settings: RiskSettings,
}

/// Risk-gated execution engine
pub struct RiskManager {
    state: Mutex<EngineState>,
    /// Read once per cycle; updates reach the next cycle only
    settings: RwLock<RiskSettings>,
    sizer: PositionSizer,
    simulator: ExecutionSimulator,
    breakers: CircuitBreakerBank,
    exits: ExitMonitor,
    events: Arc<dyn EventSink>,
    /// Priority stop flag, polled at every pipeline stage boundary
    emergency: AtomicBool,
}

impl RiskManager {
    pub fn new(config: &Config, events: Arc<dyn EventSink>, now: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new(EngineState {
                ledger: PositionLedger::new(config.engine.initial_balance, now),
                prices: PriceBook::new(),
                volatility: VolatilityTracker::new(config.sizing.volatility_window),
                last_signals: HashMap::new(),
                halted: None,
                last_breaker: BreakerResult::default(),
            }),
            settings: RwLock::new(config.risk.clone()),
            sizer: PositionSizer::new(config.sizing.clone()),
            simulator: ExecutionSimulator::from_config(&config.execution),
            breakers: CircuitBreakerBank::standard(),
            exits: ExitMonitor::new(config.exit.clone()),
            events,
            emergency: AtomicBool::new(false),
        }
    }

    /// Replace the breaker set
    pub fn with_breakers(mut self, breakers: CircuitBreakerBank) -> Self {
        self.breakers = breakers;
        self
    }

    /// Replace the fill simulator
    pub fn with_simulator(mut self, simulator: ExecutionSimulator) -> Self {
        self.simulator = simulator;
        self
    }

    /// Run a predictor signal through the full pipeline.
    ///
    /// Returns `Ok(None)` for hold signals.
    pub async fn process_signal(
        &self,
        signal: Signal,
        now: DateTime<Utc>,
    ) -> Result<Option<Position>, RiskError> {
        telemetry::record_signal();
        let settings = self.settings().await;
        let mut run = PipelineRun::new(RequestOrigin::Signal, &signal.symbol);
        let mut events = Vec::new();

        let result = {
            let mut state = self.state.lock().await;
            self.signal_entry(&mut state, &mut run, &signal, &settings, now, &mut events)
        };

        self.dispatch(events);
        run.finish(result)
    }

    /// Open a position on operator request.
    ///
    /// Missing side and confidence come from the latest signal for the
    /// symbol. Without `force` the confidence gate applies.
    pub async fn manual_trade(
        &self,
        request: ManualTradeRequest,
        now: DateTime<Utc>,
    ) -> Result<Position, RiskError> {
        let settings = self.settings().await;
        let mut run = PipelineRun::new(RequestOrigin::Manual, &request.symbol);
        let mut events = Vec::new();

        let result = {
            let mut state = self.state.lock().await;
            self.manual_entry(&mut state, &mut run, &request, &settings, now, &mut events)
        };

        self.dispatch(events);
        run.finish(result)
    }

    /// Move the stops of an open position
    pub async fn update_position(
        &self,
        request: PositionUpdateRequest,
    ) -> Result<Position, RiskError> {
        let mut run = PipelineRun::new(RequestOrigin::Manual, &request.symbol);
        let mut events = Vec::new();

        let result = {
            let mut state = self.state.lock().await;
            self.apply_update(&mut state, &mut run, &request, &mut events)
        };

        self.dispatch(events);
        run.finish(result)
    }

    /// Close a position at the last known price with reason `MANUAL`
    pub async fn close_position(
        &self,
        symbol: &str,
        position_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<ClosedTrade, RiskError> {
        let mut run = PipelineRun::new(RequestOrigin::Manual, symbol);
        let mut events = Vec::new();

        let result = {
            let mut state = self.state.lock().await;
            self.manual_close(&mut state, &mut run, symbol, position_id, now, &mut events)
        };

        self.dispatch(events);
        run.finish(result)
    }

    /// Mark to market and act on exit rules for the tick's symbol.
    ///
    /// Malformed ticks are rejected with `Validation` and stale ticks are
    /// skipped with `StaleFeed`; neither marks nor closes anything.
    pub async fn on_price_tick(
        &self,
        tick: PriceTick,
        now: DateTime<Utc>,
    ) -> Result<Vec<ClosedTrade>, RiskError> {
        if let Err(err) = tick.validate() {
            tracing::warn!(symbol = %tick.symbol, price = %tick.price, error = %err, "Rejecting tick");
            return Err(err);
        }
        if let Err(err) = self.exits.check_freshness(&tick, now) {
            tracing::debug!(symbol = %tick.symbol, error = %err, "Skipping stale tick");
            return Err(err);
        }

        let mut events = Vec::new();
        let result = {
            let mut state = self.state.lock().await;
            self.apply_tick(&mut state, &tick, now, &mut events)
        };

        self.dispatch(events);
        result
    }

    /// Close every open position and pause new entries until `resume`.
    ///
    /// In-flight requests observe the flag at their next stage boundary.
    /// Closes use the last known price, falling back to the last mark and
    /// then the entry price when a candidate cannot be filled.
    pub async fn emergency_stop(&self, now: DateTime<Utc>) -> Result<Vec<ClosedTrade>, RiskError> {
        self.emergency.store(true, Ordering::SeqCst);
        tracing::warn!("Emergency stop requested");

        let mut events = Vec::new();
        let result = {
            let mut state = self.state.lock().await;
            state.ledger.set_global_pause(true);

            let mut closed = Vec::new();
            for position in state.ledger.open_positions() {
                let candidates = [
                    state.prices.last(&position.symbol).map(|tick| tick.price),
                    Some(position.mark_price),
                    Some(position.entry_price),
                ];
                let mut outcome = Err(RiskError::NoPrice(position.symbol.clone()));
                for price in candidates.into_iter().flatten().filter(|p| *p > Decimal::ZERO) {
                    outcome = self.close_at(&mut state, &position, price, ExitReason::Emergency, now, &mut events);
                    match &outcome {
                        Ok(_) => break,
                        Err(err) => tracing::warn!(
                            position_id = %position.id,
                            price = %price,
                            error = %err,
                            "Emergency close attempt failed"
                        ),
                    }
                }
                match outcome {
                    Ok(trade) => closed.push(trade),
                    Err(err) => tracing::error!(
                        position_id = %position.id,
                        symbol = %position.symbol,
                        error = %err,
                        "Emergency close failed"
                    ),
                }
            }
            self.verify(&mut state).map(|_| closed)
        };

        if let Ok(closed) = &result {
            tracing::warn!(closed = closed.len(), "Emergency stop complete, trading paused");
            events.push(EngineEvent::EmergencyStop {
                closed: closed.clone(),
            });
        }
        self.dispatch(events);
        result
    }

    /// Clear the emergency pause
    pub async fn resume(&self) {
        {
            let mut state = self.state.lock().await;
            state.ledger.set_global_pause(false);
            self.emergency.store(false, Ordering::SeqCst);
        }
        tracing::info!("Trading resumed");
        self.dispatch(vec![EngineEvent::Resumed]);
    }

    /// Lift a latched invariant halt after manual review.
    ///
    /// Returns the error that caused the halt, if any.
    pub async fn clear_halt(&self) -> Option<RiskError> {
        let cleared = self.state.lock().await.halted.take();
        if let Some(err) = &cleared {
            tracing::warn!(error = %err, "Halt cleared by operator");
        }
        cleared
    }

    pub async fn settings(&self) -> RiskSettings {
        self.settings.read().await.clone()
    }

    /// Validate and store new settings for subsequent cycles
    pub async fn update_settings(
        &self,
        update: RiskSettingsUpdate,
    ) -> Result<RiskSettings, RiskError> {
        let mut current = self.settings.write().await;
        let merged = update.apply_to(&current)?;
        tracing::info!(settings = ?merged, "Risk settings updated");
        *current = merged.clone();
        Ok(merged)
    }

    pub async fn snapshot(&self) -> EngineSnapshot {
        let settings = self.settings().await;
        let state = self.state.lock().await;
        EngineSnapshot {
            portfolio: state.ledger.portfolio().clone(),
            breaker_state: state.ledger.breaker_state().clone(),
            open_positions: state.ledger.open_positions(),
            closed_trades: state.ledger.recent_trades(SNAPSHOT_TRADE_LIMIT).to_vec(),
            closed_count: state.ledger.closed_count(),
            last_breaker: state.last_breaker.clone(),
            halted: state.halted.as_ref().map(ToString::to_string),
            emergency: self.emergency.load(Ordering::SeqCst),
            settings,
        }
    }

    /// Page through the closed-trade history in close order
    pub async fn closed_trades(&self, offset: usize, limit: usize) -> Vec<ClosedTrade> {
        self.state.lock().await.ledger.trade_page(offset, limit).to_vec()
    }

    pub fn is_emergency(&self) -> bool {
        self.emergency.load(Ordering::SeqCst)
    }

    fn signal_entry(
        &self,
        state: &mut EngineState,
        run: &mut PipelineRun,
        signal: &Signal,
        settings: &RiskSettings,
        now: DateTime<Utc>,
        events: &mut Vec<EngineEvent>,
    ) -> Result<Option<Position>, RiskError> {
        Self::ensure_running(state)?;
        state.ledger.roll_day(now);

        signal.validate()?;
        state
            .last_signals
            .insert(signal.symbol.clone(), signal.clone());
        let volatility_ratio = state.volatility.ratio(&signal.symbol, signal.atr);
        state.volatility.observe(&signal.symbol, signal.atr);

        let Some(side) = signal.direction.side() else {
            run.advance(ProcessingStage::Validated);
            tracing::debug!(symbol = %signal.symbol, "Hold signal");
            return Ok(None);
        };
        if signal.confidence < settings.min_confidence {
            return Err(RiskError::LowConfidence {
                confidence: signal.confidence,
                min: settings.min_confidence,
            });
        }
        run.advance(ProcessingStage::Validated);

        let entry = EntryRequest {
            symbol: &signal.symbol,
            side,
            confidence: signal.confidence,
            atr: signal.atr,
            volatility_ratio,
        };
        self.open_entry(state, run, entry, settings, now, events)
            .map(Some)
    }

    fn manual_entry(
        &self,
        state: &mut EngineState,
        run: &mut PipelineRun,
        request: &ManualTradeRequest,
        settings: &RiskSettings,
        now: DateTime<Utc>,
        events: &mut Vec<EngineEvent>,
    ) -> Result<Position, RiskError> {
        Self::ensure_running(state)?;
        state.ledger.roll_day(now);

        if request.symbol.trim().is_empty() {
            return Err(RiskError::Validation("request symbol is empty".to_string()));
        }
        let last = state.last_signals.get(&request.symbol);

        let side = request
            .side
            .or_else(|| last.and_then(|s| s.direction.side()))
            .ok_or_else(|| {
                RiskError::Validation(format!(
                    "no side given and no directional signal for {}",
                    request.symbol
                ))
            })?;

        let confidence = request.confidence.or_else(|| last.map(|s| s.confidence));
        if let Some(c) = confidence {
            if c < Decimal::ZERO || c > Decimal::ONE {
                return Err(RiskError::Validation(format!("confidence {c} outside [0, 1]")));
            }
        }
        if !request.force {
            let c = confidence.ok_or_else(|| {
                RiskError::Validation("confidence required unless forced".to_string())
            })?;
            if c < settings.min_confidence {
                return Err(RiskError::LowConfidence {
                    confidence: c,
                    min: settings.min_confidence,
                });
            }
        }

        let atr = last.map(|s| s.atr).unwrap_or(Decimal::ZERO);
        let volatility_ratio = state.volatility.ratio(&request.symbol, atr);
        run.advance(ProcessingStage::Validated);

        let entry = EntryRequest {
            symbol: &request.symbol,
            side,
            confidence: confidence.unwrap_or(settings.min_confidence),
            atr,
            volatility_ratio,
        };
        self.open_entry(state, run, entry, settings, now, events)
    }

    /// Breakers, sizing, fill and ledger open, shared by every entry origin
    fn open_entry(
        &self,
        state: &mut EngineState,
        run: &mut PipelineRun,
        entry: EntryRequest<'_>,
        settings: &RiskSettings,
        now: DateTime<Utc>,
        events: &mut Vec<EngineEvent>,
    ) -> Result<Position, RiskError> {
        self.check_emergency()?;
        let breaker = self.breakers.check_all(
            state.ledger.portfolio(),
            state.ledger.breaker_state(),
            settings,
            now,
        );
        state.last_breaker = breaker.clone();
        if breaker.tripped {
            tracing::warn!(symbol = entry.symbol, reasons = ?breaker.reasons, "Circuit breaker tripped");
            telemetry::record_breaker_trips(&breaker.reasons);
            events.push(EngineEvent::CircuitBreakerTripped {
                symbol: entry.symbol.to_string(),
                reasons: breaker.reasons.clone(),
            });
            return Err(RiskError::CircuitBreakerTripped(breaker.reasons));
        }
        if state.ledger.position_for(entry.symbol).is_some() {
            return Err(RiskError::PositionAlreadyOpen(entry.symbol.to_string()));
        }
        run.advance(ProcessingStage::BreakerChecked);

        self.check_emergency()?;
        let price = state
            .prices
            .fresh_price(entry.symbol, now, self.exits.stale_after())?;
        let input = SizingInput {
            balance: state.ledger.portfolio().balance,
            confidence: entry.confidence,
            volatility_ratio: entry.volatility_ratio,
            stats: state.ledger.stats(),
            reward_risk: settings.take_profit_risk_reward,
        };
        let notional = self.sizer.size(&input, settings.sizing_method)?;
        let notional = self.sizer.ensure_minimum(notional)?;
        run.advance(ProcessingStage::Sized);

        self.check_emergency()?;
        let fill = self
            .simulator
            .execute(entry.symbol, price, notional, entry.side.entry_order(), now)?;
        let (stop_loss, take_profit) =
            self.exits
                .initial_levels(entry.side, fill.fill_price, entry.atr, settings)?;
        run.advance(ProcessingStage::Executed);

        // Last chance to abort; the ledger write below runs to completion
        self.check_emergency()?;
        let order = OpenOrder {
            side: entry.side,
            stop_loss,
            take_profit,
            confidence: entry.confidence,
        };
        let position = state.ledger.open(&fill, order, now)?;
        self.verify(state)?;
        run.advance(ProcessingStage::LedgerUpdated);

        telemetry::record_trade_opened(&position.symbol);
        events.push(EngineEvent::TradeOpened(position.clone()));
        Ok(position)
    }

    fn apply_update(
        &self,
        state: &mut EngineState,
        run: &mut PipelineRun,
        request: &PositionUpdateRequest,
        events: &mut Vec<EngineEvent>,
    ) -> Result<Position, RiskError> {
        Self::ensure_running(state)?;
        request.validate()?;
        let target = Self::resolve_position(state, &request.symbol, request.position_id)?;
        run.advance(ProcessingStage::Validated);

        let updated = state
            .ledger
            .update_stops(target.id, request.stop_loss, request.take_profit)?;
        self.verify(state)?;
        run.advance(ProcessingStage::LedgerUpdated);

        events.push(EngineEvent::PositionUpdated(updated.clone()));
        Ok(updated)
    }

    fn manual_close(
        &self,
        state: &mut EngineState,
        run: &mut PipelineRun,
        symbol: &str,
        position_id: Option<Uuid>,
        now: DateTime<Utc>,
        events: &mut Vec<EngineEvent>,
    ) -> Result<ClosedTrade, RiskError> {
        Self::ensure_running(state)?;
        let position = Self::resolve_position(state, symbol, position_id)?;
        run.advance(ProcessingStage::Validated);

        let price = state
            .prices
            .last(symbol)
            .map(|tick| tick.price)
            .unwrap_or(position.mark_price);
        let trade = self.close_at(state, &position, price, ExitReason::Manual, now, events)?;
        self.verify(state)?;
        run.advance(ProcessingStage::LedgerUpdated);
        Ok(trade)
    }

    fn apply_tick(
        &self,
        state: &mut EngineState,
        tick: &PriceTick,
        now: DateTime<Utc>,
        events: &mut Vec<EngineEvent>,
    ) -> Result<Vec<ClosedTrade>, RiskError> {
        if !state.prices.update(tick) {
            tracing::debug!(symbol = %tick.symbol, "Out-of-order tick ignored");
            return Ok(vec![]);
        }
        Self::ensure_running(state)?;
        state.ledger.roll_day(now);
        state.ledger.mark(&tick.symbol, tick.price);

        let positions: Vec<Position> = state
            .ledger
            .open_positions()
            .into_iter()
            .filter(|p| p.symbol == tick.symbol)
            .collect();

        let mut closed = Vec::new();
        for position in positions {
            match self.exits.evaluate(&position, tick.price) {
                ExitDecision::Hold => {}
                ExitDecision::Trail(stop) => {
                    if state.ledger.ratchet_stop(position.id, stop)? {
                        if let Some(updated) = state.ledger.position(position.id) {
                            events.push(EngineEvent::PositionUpdated(updated.clone()));
                        }
                    }
                }
                ExitDecision::Close(reason) => {
                    let trade = self.close_at(state, &position, tick.price, reason, now, events)?;
                    closed.push(trade);
                }
            }
        }

        self.verify(state)?;
        Ok(closed)
    }

    /// Exit fill on the opposite side, then ledger close
    fn close_at(
        &self,
        state: &mut EngineState,
        position: &Position,
        price: Decimal,
        reason: ExitReason,
        now: DateTime<Utc>,
        events: &mut Vec<EngineEvent>,
    ) -> Result<ClosedTrade, RiskError> {
        let fill = self.simulator.execute_quantity(
            &position.symbol,
            price,
            position.size,
            position.side.exit_order(),
            now,
        )?;
        let trade = state.ledger.close(position.id, &fill, reason, now)?;
        telemetry::record_trade_closed(reason);
        events.push(EngineEvent::TradeClosed(trade.clone()));
        Ok(trade)
    }

    fn resolve_position(
        state: &EngineState,
        symbol: &str,
        position_id: Option<Uuid>,
    ) -> Result<Position, RiskError> {
        let position = match position_id {
            Some(id) => state.ledger.require_open(id)?,
            None => state
                .ledger
                .position_for(symbol)
                .ok_or_else(|| RiskError::NoOpenPosition(symbol.to_string()))?,
        };
        if position.symbol != symbol {
            return Err(RiskError::Validation(format!(
                "position {} belongs to {}, not {symbol}",
                position.id, position.symbol
            )));
        }
        Ok(position.clone())
    }

    fn ensure_running(state: &EngineState) -> Result<(), RiskError> {
        match &state.halted {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn check_emergency(&self) -> Result<(), RiskError> {
        if self.emergency.load(Ordering::SeqCst) {
            return Err(RiskError::CircuitBreakerTripped(vec![GLOBAL_PAUSE.to_string()]));
        }
        Ok(())
    }

    /// Check the equity invariant, latching a halt on violation
    fn verify(&self, state: &mut EngineState) -> Result<(), RiskError> {
        if let Err(err) = state.ledger.verify_invariant() {
            tracing::error!(error = %err, "Ledger invariant violated, halting");
            state.halted = Some(err.clone());
            return Err(err);
        }
        telemetry::record_portfolio(
            state.ledger.portfolio(),
            state.ledger.breaker_state(),
            state.ledger.open_count(),
        );
        Ok(())
    }

    fn dispatch(&self, events: Vec<EngineEvent>) {
        for event in &events {
            tracing::debug!(event = event.name(), "Publishing event");
            self.events.publish(event);
        }
    }
}
