//! Signal generation
//!
//! Turns a qualifying isolated shock into a fade signal with a wait-time
//! deadline. The signal is not a position: conversion happens only when
//! the deadline arrives and the expiry policy agrees.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ExpiryPolicy, StrategyConfig};
use crate::market::{ImpactMeasurement, TradeDirection};
use crate::strategy::types::FlowVerdict;

/// A fade signal awaiting its entry deadline, at most one per pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub pool_id: String,
    /// Side that fades the shock
    pub direction: TradeDirection,
    pub trigger_impact_bp: f64,
    /// Pool price before the shock
    pub price_before: f64,
    /// Pool price right after the shock
    pub price_at_trigger: f64,
    pub created_at: DateTime<Utc>,
    pub entry_deadline: DateTime<Utc>,
}

impl Signal {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.entry_deadline
    }

    /// Whether the price has already crossed back past the pre-shock price
    pub fn reverted(&self, current_price: f64) -> bool {
        match self.direction {
            // Shock pushed the price down; reverted once it is back above
            TradeDirection::BuyA => current_price >= self.price_before,
            TradeDirection::BuyB => current_price <= self.price_before,
        }
    }
}

/// What to do with a signal whose deadline arrived
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExpiryOutcome {
    /// Convert to a position at the then-current price
    Enter { entry_price: f64 },
    /// Price already reverted, the edge is gone
    Stale,
}

/// Generates fade signals from classified impacts
#[derive(Debug, Clone)]
pub struct SignalGenerator {
    config: StrategyConfig,
}

impl SignalGenerator {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    /// Emit a signal for a classified impact, or None.
    ///
    /// `pool_busy` is true when the pool already holds an unexpired signal
    /// or a live position; the orchestrator owns that bookkeeping.
    pub fn evaluate(
        &self,
        impact: &ImpactMeasurement,
        verdict: FlowVerdict,
        pool_busy: bool,
    ) -> Option<Signal> {
        let magnitude = impact.magnitude_bp();
        if magnitude < self.config.min_impact_bp || magnitude > self.config.max_impact_bp {
            return None;
        }

        let qualifies = match verdict {
            FlowVerdict::Isolated => true,
            FlowVerdict::InsufficientData => self.config.fade_on_insufficient_data,
            FlowVerdict::Trending => false,
        };
        if !qualifies {
            debug!(
                "No signal for {}: verdict {} ({:.1} bps)",
                impact.pool_id, verdict, impact.impact_bp
            );
            return None;
        }

        if pool_busy {
            debug!(
                "No signal for {}: pending signal or live position exists",
                impact.pool_id
            );
            return None;
        }

        Some(Signal {
            pool_id: impact.pool_id.clone(),
            direction: impact.direction.fade(),
            trigger_impact_bp: impact.impact_bp,
            price_before: impact.price_before,
            price_at_trigger: impact.price_after,
            created_at: impact.timestamp,
            entry_deadline: impact.timestamp
                + Duration::seconds(self.config.wait_time_secs as i64),
        })
    }

    /// Resolve a due signal against the current price under the configured
    /// expiry policy. If price moved further in the shock's direction we
    /// still fade, from the better level; if it already reverted past the
    /// pre-shock price the signal is stale.
    pub fn resolve_expiry(&self, signal: &Signal, current_price: f64) -> ExpiryOutcome {
        match self.config.expiry_policy {
            ExpiryPolicy::AlwaysEnter => ExpiryOutcome::Enter {
                entry_price: current_price,
            },
            ExpiryPolicy::RevertCheck => {
                if signal.reverted(current_price) {
                    ExpiryOutcome::Stale
                } else {
                    ExpiryOutcome::Enter {
                        entry_price: current_price,
                    }
                }
            }
        }
    }
}
