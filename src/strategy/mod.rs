//! Strategy module - shock classification, signal generation, sizing,
//! and per-pool orchestration

pub mod flow;
pub mod orchestrator;
pub mod signal;
pub mod sizing;
pub mod types;

pub use orchestrator::StrategyOrchestrator;
pub use signal::{Signal, SignalGenerator};
pub use sizing::PositionSizer;
pub use types::{Action, ClosePositionRequest, FlowVerdict, OpenPositionRequest};
