//! Risk management module
//!
//! Circuit breakers, position sizing, and the runtime-tunable risk settings

mod breakers;
mod kelly;
mod settings;
mod sizing;
mod types;

pub use breakers::{
    Breaker, BreakerContext, BreakerResult, CircuitBreakerBank, ConsecutiveLossesBreaker,
    CooldownBreaker, DailyLossBreaker, GlobalPauseBreaker, MaxDrawdownBreaker, VolatilityBreaker,
};
pub use kelly::{KellyCalculator, TradeStats, TradeTally};
pub use settings::{seconds, RiskSettings, RiskSettingsUpdate, MAX_DURATION_SECS};
pub use sizing::{PositionSizer, SizingInput, SizingMethod, VolatilityTracker};
pub use types::RiskError;
