//! Price impact measurement
//!
//! Converts a raw swap event into a signed basis-point price move. Pure
//! functions of the event, no side effects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::{SwapDirection, SwapEvent};
use crate::error::{Error, Result};

/// A measured price impact, derived from one swap event and never mutated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactMeasurement {
    pub pool_id: String,
    /// Signed move in basis points: (post/pre - 1) * 10000
    pub impact_bp: f64,
    /// Direction of the swap that caused the move
    pub direction: SwapDirection,
    pub price_before: f64,
    pub price_after: f64,
    pub timestamp: DateTime<Utc>,
}

impl ImpactMeasurement {
    pub fn magnitude_bp(&self) -> f64 {
        self.impact_bp.abs()
    }
}

/// Measure the price impact of a validated swap event.
///
/// Fails with `InvalidEvent` if a reserve is non-positive or the implied
/// price move contradicts the swap direction: selling A cannot raise the
/// B-per-A price, selling B cannot lower it. Such events are rejected,
/// never corrected.
pub fn measure(event: &SwapEvent) -> Result<ImpactMeasurement> {
    event.validate()?;

    let price_before = event.price_before();
    let price_after = event.price_after();
    let impact_bp = (price_after / price_before - 1.0) * 10_000.0;

    let sign_mismatch = match event.direction {
        SwapDirection::AtoB => impact_bp > 0.0,
        SwapDirection::BtoA => impact_bp < 0.0,
    };

    if sign_mismatch {
        return Err(Error::InvalidEvent {
            pool_id: event.pool_id.clone(),
            reason: format!(
                "price moved {impact_bp:.2} bps against swap direction {}",
                event.direction
            ),
        });
    }

    Ok(ImpactMeasurement {
        pool_id: event.pool_id.clone(),
        impact_bp,
        direction: event.direction,
        price_before,
        price_after,
        timestamp: event.timestamp,
    })
}
