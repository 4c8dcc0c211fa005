//! Exit monitoring
//!
//! Price-driven stop-loss, take-profit and trailing-stop decisions for open
//! positions

mod monitor;

pub use monitor::{ExitDecision, ExitMonitor};
