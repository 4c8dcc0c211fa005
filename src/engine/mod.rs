//! Engine module
//!
//! The risk-gated pipeline, its events, and the scheduler that drives it

mod events;
mod manager;
mod pipeline;
mod service;

pub use events::{EngineEvent, EventBus, EventSink};
pub use manager::{EngineSnapshot, RiskManager, SNAPSHOT_TRADE_LIMIT};
pub use pipeline::{PipelineRun, ProcessingStage, RequestOrigin};
pub use service::{run_signal_cycle, ServiceHandle, TradingService};
