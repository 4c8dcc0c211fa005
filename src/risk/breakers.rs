//! Circuit breakers
//!
//! Each breaker is an independent predicate over one snapshot of the
//! portfolio, breaker counters and settings. The bank evaluates all of
//! them; a trip in one never hides another.

use super::{settings, RiskSettings};
use crate::portfolio::{BreakerState, Portfolio};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything a breaker may read
#[derive(Debug, Clone, Copy)]
pub struct BreakerContext<'a> {
    pub portfolio: &'a Portfolio,
    pub state: &'a BreakerState,
    pub settings: &'a RiskSettings,
    pub now: DateTime<Utc>,
}

/// A single risk predicate
pub trait Breaker: Send + Sync {
    /// Name reported when tripped
    fn name(&self) -> &'static str;
    /// True when new entries must be blocked
    fn evaluate(&self, ctx: &BreakerContext<'_>) -> bool;
}

/// Trips when the day's realized loss reaches the limit
#[derive(Debug, Clone, Copy, Default)]
pub struct DailyLossBreaker;

impl Breaker for DailyLossBreaker {
    fn name(&self) -> &'static str {
        "DailyLoss"
    }

    fn evaluate(&self, ctx: &BreakerContext<'_>) -> bool {
        ctx.portfolio.day_start_balance > rust_decimal::Decimal::ZERO
            && ctx.portfolio.daily_loss_pct() >= ctx.settings.max_daily_loss_percent
    }
}

/// Trips when equity has fallen far enough from its peak
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxDrawdownBreaker;

impl Breaker for MaxDrawdownBreaker {
    fn name(&self) -> &'static str {
        "MaxDrawdown"
    }

    fn evaluate(&self, ctx: &BreakerContext<'_>) -> bool {
        ctx.portfolio.peak_equity > rust_decimal::Decimal::ZERO
            && ctx.portfolio.drawdown_pct() >= ctx.settings.max_drawdown_percent
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsecutiveLossesBreaker;

impl Breaker for ConsecutiveLossesBreaker {
    fn name(&self) -> &'static str {
        "ConsecutiveLosses"
    }

    fn evaluate(&self, ctx: &BreakerContext<'_>) -> bool {
        ctx.state.consecutive_losses >= ctx.settings.max_consecutive_losses
    }
}

/// Trips while the last trade is more recent than the cooldown
#[derive(Debug, Clone, Copy, Default)]
pub struct CooldownBreaker;

impl Breaker for CooldownBreaker {
    fn name(&self) -> &'static str {
        "Cooldown"
    }

    fn evaluate(&self, ctx: &BreakerContext<'_>) -> bool {
        let Some(last) = ctx.state.last_trade_at else {
            return false;
        };
        let cooldown = settings::seconds(ctx.settings.cooldown_seconds);
        ctx.now - last < cooldown
    }
}

/// Trips unconditionally while the emergency pause is set
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalPauseBreaker;

impl Breaker for GlobalPauseBreaker {
    fn name(&self) -> &'static str {
        "GlobalPause"
    }

    fn evaluate(&self, ctx: &BreakerContext<'_>) -> bool {
        ctx.state.global_pause
    }
}

/// Placeholder for a market-volatility breaker.
///
/// The trigger condition has not been defined, so this never trips. Swap in
/// a real implementation through `CircuitBreakerBank::with_breaker`.
#[derive(Debug, Clone, Copy, Default)]
pub struct VolatilityBreaker;

impl Breaker for VolatilityBreaker {
    fn name(&self) -> &'static str {
        "Volatility"
    }

    fn evaluate(&self, _ctx: &BreakerContext<'_>) -> bool {
        false
    }
}

/// Outcome of evaluating every breaker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerResult {
    pub tripped: bool,
    /// Names of tripped breakers in evaluation order
    pub reasons: Vec<String>,
}

/// Ordered set of breakers evaluated together
pub struct CircuitBreakerBank {
    breakers: Vec<Box<dyn Breaker>>,
}

impl CircuitBreakerBank {
    /// Empty bank
    pub fn empty() -> Self {
        Self { breakers: vec![] }
    }

    /// Daily loss, drawdown, loss streak, cooldown, global pause and the volatility hook
    pub fn standard() -> Self {
        Self::empty()
            .with_breaker(DailyLossBreaker)
            .with_breaker(MaxDrawdownBreaker)
            .with_breaker(ConsecutiveLossesBreaker)
            .with_breaker(CooldownBreaker)
            .with_breaker(GlobalPauseBreaker)
            .with_breaker(VolatilityBreaker)
    }

    /// Append a breaker
    pub fn with_breaker(mut self, breaker: impl Breaker + 'static) -> Self {
        self.breakers.push(Box::new(breaker));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.breakers.iter().map(|b| b.name()).collect()
    }

    /// Evaluate every breaker against the same snapshot
    pub fn check_all(
        &self,
        portfolio: &Portfolio,
        state: &BreakerState,
        settings: &RiskSettings,
        now: DateTime<Utc>,
    ) -> BreakerResult {
        let ctx = BreakerContext {
            portfolio,
            state,
            settings,
            now,
        };
        let reasons: Vec<String> = self
            .breakers
            .iter()
            .filter(|breaker| breaker.evaluate(&ctx))
            .map(|breaker| breaker.name().to_string())
            .collect();

        BreakerResult {
            tripped: !reasons.is_empty(),
            reasons,
        }
    }
}

impl Default for CircuitBreakerBank {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn settings() -> RiskSettings {
        RiskSettings {
            max_daily_loss_percent: dec!(0.05),
            max_drawdown_percent: dec!(0.10),
            max_consecutive_losses: 5,
            cooldown_seconds: 60,
            ..Default::default()
        }
    }

    fn check(portfolio: &Portfolio, state: &BreakerState, now: DateTime<Utc>) -> BreakerResult {
        CircuitBreakerBank::standard().check_all(portfolio, state, &settings(), now)
    }

    #[test]
    fn test_clean_state_passes() {
        let now = Utc::now();
        let result = check(&Portfolio::new(dec!(10000), now), &BreakerState::default(), now);
        assert!(!result.tripped);
        assert!(result.reasons.is_empty());
    }

    #[test]
    fn test_daily_loss_boundary() {
        let now = Utc::now();
        let mut portfolio = Portfolio::new(dec!(10000), now);

        portfolio.balance = dec!(9500);
        let result = check(&portfolio, &BreakerState::default(), now);
        assert!(result.reasons.contains(&"DailyLoss".to_string()));

        portfolio.balance = dec!(9501);
        let result = check(&portfolio, &BreakerState::default(), now);
        assert!(!result.reasons.contains(&"DailyLoss".to_string()));
    }

    #[test]
    fn test_drawdown() {
        let now = Utc::now();
        let mut portfolio = Portfolio::new(dec!(10000), now);
        portfolio.peak_equity = dec!(12000);
        portfolio.equity = dec!(10800); // exactly 10% below peak

        let result = check(&portfolio, &BreakerState::default(), now);
        assert_eq!(result.reasons, vec!["MaxDrawdown".to_string()]);

        portfolio.equity = dec!(10801);
        assert!(!check(&portfolio, &BreakerState::default(), now).tripped);
    }

    #[test]
    fn test_consecutive_losses() {
        let now = Utc::now();
        let portfolio = Portfolio::new(dec!(10000), now);
        let mut state = BreakerState {
            consecutive_losses: 4,
            ..Default::default()
        };
        assert!(!check(&portfolio, &state, now).tripped);

        state.consecutive_losses = 5;
        assert_eq!(
            check(&portfolio, &state, now).reasons,
            vec!["ConsecutiveLosses".to_string()]
        );
    }

    #[test]
    fn test_cooldown() {
        let now = Utc::now();
        let portfolio = Portfolio::new(dec!(10000), now);
        let state = BreakerState {
            last_trade_at: Some(now - Duration::seconds(59)),
            ..Default::default()
        };
        assert_eq!(
            check(&portfolio, &state, now).reasons,
            vec!["Cooldown".to_string()]
        );

        let state = BreakerState {
            last_trade_at: Some(now - Duration::seconds(60)),
            ..Default::default()
        };
        assert!(!check(&portfolio, &state, now).tripped);
    }

    #[test]
    fn test_all_breakers_reported() {
        let now = Utc::now();
        let mut portfolio = Portfolio::new(dec!(10000), now);
        portfolio.balance = dec!(9000);
        portfolio.equity = dec!(9000);
        let state = BreakerState {
            consecutive_losses: 7,
            last_trade_at: Some(now),
            global_pause: true,
        };

        let result = check(&portfolio, &state, now);
        assert!(result.tripped);
        assert_eq!(
            result.reasons,
            vec!["DailyLoss", "MaxDrawdown", "ConsecutiveLosses", "Cooldown", "GlobalPause"]
        );
    }

    #[test]
    fn test_global_pause_alone() {
        let now = Utc::now();
        let state = BreakerState {
            global_pause: true,
            ..Default::default()
        };
        let result = check(&Portfolio::new(dec!(10000), now), &state, now);
        assert_eq!(result.reasons, vec!["GlobalPause".to_string()]);
    }

    #[test]
    fn test_custom_breaker_extends_bank() {
        struct AlwaysTrips;
        impl Breaker for AlwaysTrips {
            fn name(&self) -> &'static str {
                "Always"
            }
            fn evaluate(&self, _ctx: &BreakerContext<'_>) -> bool {
                true
            }
        }

        let now = Utc::now();
        let bank = CircuitBreakerBank::standard().with_breaker(AlwaysTrips);
        assert!(bank.names().contains(&"Volatility"));
        let result = bank.check_all(
            &Portfolio::new(dec!(10000), now),
            &BreakerState::default(),
            &settings(),
            now,
        );
        assert_eq!(result.reasons, vec!["Always".to_string()]);
    }
}
