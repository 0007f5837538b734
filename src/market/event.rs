//! Swap event types and validation
//!
//! One `SwapEvent` per observed swap, as delivered by the streaming
//! collaborator. Prices are quoted as token B per token A throughout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Direction of the observed swap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapDirection {
    /// Selling A into the pool - pushes the B-per-A price down
    AtoB,
    /// Selling B into the pool - pushes the B-per-A price up
    BtoA,
}

impl SwapDirection {
    pub fn opposite(self) -> Self {
        match self {
            SwapDirection::AtoB => SwapDirection::BtoA,
            SwapDirection::BtoA => SwapDirection::AtoB,
        }
    }

    /// The side a fade position takes against this swap
    pub fn fade(self) -> TradeDirection {
        match self {
            // A was sold off, we buy it back
            SwapDirection::AtoB => TradeDirection::BuyA,
            SwapDirection::BtoA => TradeDirection::BuyB,
        }
    }
}

impl std::fmt::Display for SwapDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SwapDirection::AtoB => write!(f, "AtoB"),
            SwapDirection::BtoA => write!(f, "BtoA"),
        }
    }
}

/// Side of a fade trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeDirection {
    BuyA,
    BuyB,
}

impl TradeDirection {
    /// Signed P&L in basis points for a position entered at `entry_price`
    /// with the pool now at `current_price` (both B per A).
    ///
    /// Buying A profits when the price rises; buying B when it falls.
    pub fn pnl_bp(self, entry_price: f64, current_price: f64) -> f64 {
        match self {
            TradeDirection::BuyA => (current_price / entry_price - 1.0) * 10_000.0,
            TradeDirection::BuyB => (entry_price / current_price - 1.0) * 10_000.0,
        }
    }
}

impl std::fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeDirection::BuyA => write!(f, "buy-A"),
            TradeDirection::BuyB => write!(f, "buy-B"),
        }
    }
}

/// A single observed swap, immutable once received
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapEvent {
    /// Pool identifier
    pub pool_id: String,
    /// Symbol of token A
    pub token_a: String,
    /// Symbol of token B
    pub token_b: String,
    /// Reserve of A before the swap
    pub reserve_a_before: f64,
    /// Reserve of B before the swap
    pub reserve_b_before: f64,
    /// Reserve of A after the swap
    pub reserve_a_after: f64,
    /// Reserve of B after the swap
    pub reserve_b_after: f64,
    /// Swap direction
    pub direction: SwapDirection,
    /// Source timestamp, monotonic per pool
    pub timestamp: DateTime<Utc>,
}

impl SwapEvent {
    /// Pool price (B per A) before the swap
    pub fn price_before(&self) -> f64 {
        self.reserve_b_before / self.reserve_a_before
    }

    /// Pool price (B per A) after the swap
    pub fn price_after(&self) -> f64 {
        self.reserve_b_after / self.reserve_a_after
    }

    /// Structural validation: all reserves must be positive and finite.
    ///
    /// Malformed events are rejected, not corrected.
    pub fn validate(&self) -> Result<()> {
        let reserves = [
            ("reserve_a_before", self.reserve_a_before),
            ("reserve_b_before", self.reserve_b_before),
            ("reserve_a_after", self.reserve_a_after),
            ("reserve_b_after", self.reserve_b_after),
        ];

        for (name, value) in reserves {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidEvent {
                    pool_id: self.pool_id.clone(),
                    reason: format!("{name} is non-positive ({value})"),
                });
            }
        }

        Ok(())
    }
}
