//! Processing stages of one trade request

use crate::risk::RiskError;
use crate::telemetry;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Furthest stage a request reached. Stages only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStage {
    Received,
    Validated,
    BreakerChecked,
    Sized,
    Executed,
    /// Terminal success
    LedgerUpdated,
}

impl ProcessingStage {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessingStage::Received => "RECEIVED",
            ProcessingStage::Validated => "VALIDATED",
            ProcessingStage::BreakerChecked => "BREAKER_CHECKED",
            ProcessingStage::Sized => "SIZED",
            ProcessingStage::Executed => "EXECUTED",
            ProcessingStage::LedgerUpdated => "LEDGER_UPDATED",
        }
    }
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a request came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOrigin {
    Signal,
    Manual,
}

/// Tracks one request through the stages
#[derive(Debug, Clone)]
pub struct PipelineRun {
    id: Uuid,
    origin: RequestOrigin,
    symbol: String,
    stage: ProcessingStage,
}

impl PipelineRun {
    pub fn new(origin: RequestOrigin, symbol: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            origin,
            symbol: symbol.to_string(),
            stage: ProcessingStage::Received,
        }
    }

    pub fn stage(&self) -> ProcessingStage {
        self.stage
    }

    pub fn origin(&self) -> RequestOrigin {
        self.origin
    }

    /// Move to `next`; moving backwards or standing still is ignored
    pub fn advance(&mut self, next: ProcessingStage) {
        if next <= self.stage {
            return;
        }
        tracing::trace!(run = %self.id, symbol = %self.symbol, from = %self.stage, to = %next, "Stage");
        self.stage = next;
    }

    /// Log and count the outcome; a rejection stays at the stage it reached
    pub fn finish<T>(&self, result: Result<T, RiskError>) -> Result<T, RiskError> {
        if let Err(err) = &result {
            telemetry::record_rejection(err.kind(), self.stage.as_str());
            if err.is_fatal() {
                tracing::error!(
                    run = %self.id,
                    origin = ?self.origin,
                    symbol = %self.symbol,
                    stage = %self.stage,
                    error = %err,
                    "Trading halted"
                );
            } else {
                tracing::warn!(
                    run = %self.id,
                    origin = ?self.origin,
                    symbol = %self.symbol,
                    stage = %self.stage,
                    kind = err.kind(),
                    error = %err,
                    "REJECTED"
                );
            }
        }
        result
    }
}
