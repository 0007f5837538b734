//! Depth-aware position sizing
//!
//! Size is a fraction of the pool's post-shock liquidity, scaled down as
//! impact grows so larger shocks do not receive proportionally larger bets.

use crate::config::SizingConfig;
use crate::error::{Error, Result};
use crate::market::TradeDirection;

/// Position sizer
#[derive(Debug, Clone)]
pub struct PositionSizer {
    config: SizingConfig,
}

impl PositionSizer {
    pub fn new(config: SizingConfig) -> Self {
        Self { config }
    }

    /// Liquidity depth backing a fade: the post-shock reserve of the token
    /// being bought.
    pub fn depth_for(reserves: (f64, f64), direction: TradeDirection) -> f64 {
        match direction {
            TradeDirection::BuyA => reserves.0,
            TradeDirection::BuyB => reserves.1,
        }
    }

    /// Compute the trade size for a fade against a shock of
    /// `impact_magnitude_bp` with `depth` units of liquidity behind it.
    ///
    /// impact_factor = max(0.1, 1 / (1 + bps/1000)):
    /// 100 bps -> 0.91, 1000 bps -> 0.50, capped at 0.1 for extreme moves.
    /// Fails when the result falls below the venue minimum tradable unit;
    /// the caller discards the signal, no retry.
    pub fn size(&self, depth: f64, impact_magnitude_bp: f64) -> Result<f64> {
        let impact_factor = (1.0 / (1.0 + impact_magnitude_bp / 1000.0)).max(0.1);
        let size = depth * self.config.max_position_ratio * impact_factor;

        if size < self.config.min_tradable_size {
            return Err(Error::InsufficientLiquidity {
                computed: size,
                minimum: self.config.min_tradable_size,
            });
        }

        Ok(size)
    }
}
