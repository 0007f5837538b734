//! Shared strategy types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::market::TradeDirection;
use crate::position::ExitReason;

/// Outcome of the isolated-shock vs trend check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowVerdict {
    /// One-off shock, safe to fade
    Isolated,
    /// Directional flow, do not bet against it
    Trending,
    /// Window too thin or stale to support a verdict
    InsufficientData,
}

impl std::fmt::Display for FlowVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowVerdict::Isolated => write!(f, "isolated"),
            FlowVerdict::Trending => write!(f, "trending"),
            FlowVerdict::InsufficientData => write!(f, "insufficient-data"),
        }
    }
}

/// Request surfaced to the execution collaborator to enter a position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenPositionRequest {
    pub position_id: Uuid,
    pub pool_id: String,
    pub direction: TradeDirection,
    pub size: f64,
    pub entry_price: f64,
}

/// Request surfaced to the execution collaborator to exit a position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosePositionRequest {
    pub position_id: Uuid,
    pub pool_id: String,
    pub reason: ExitReason,
    pub exit_price: f64,
    pub pnl_bp: f64,
}

/// Action emitted by the orchestrator
#[derive(Debug, Clone)]
pub enum Action {
    Open(OpenPositionRequest),
    Close(ClosePositionRequest),
}
