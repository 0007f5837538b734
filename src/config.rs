//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub flow: FlowConfig,
    #[serde(default)]
    pub sizing: SizingConfig,
    #[serde(default)]
    pub exits: ExitConfig,
    #[serde(default)]
    pub position: PositionConfig,
    #[serde(default)]
    pub feed: FeedConfig,
}

/// What happens to a pending signal when its wait deadline arrives
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryPolicy {
    /// Cancel as stale if price already reverted past the pre-shock price,
    /// otherwise enter at the then-current price
    RevertCheck,
    /// Always enter at the then-current price
    AlwaysEnter,
}

/// Signal generation thresholds and timing
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    /// Minimum price impact to consider fading
    #[serde(default = "default_min_impact_bp")]
    pub min_impact_bp: f64,
    /// Maximum impact to fade - beyond this the move is news, not noise
    #[serde(default = "default_max_impact_bp")]
    pub max_impact_bp: f64,
    /// Seconds to wait between shock and entry
    #[serde(default = "default_wait_time_secs")]
    pub wait_time_secs: u64,
    #[serde(default = "default_expiry_policy")]
    pub expiry_policy: ExpiryPolicy,
    /// Fade even when the flow window cannot support a verdict
    #[serde(default)]
    pub fade_on_insufficient_data: bool,
}

/// Isolated-shock vs trend classification thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct FlowConfig {
    /// Time window for flow context, entries older than this are evicted
    #[serde(default = "default_horizon_secs")]
    pub horizon_secs: u64,
    /// Same-direction event count above which flow is trending
    #[serde(default = "default_trend_count_threshold")]
    pub trend_count_threshold: usize,
    /// Trending when cumulative same-direction magnitude exceeds this
    /// fraction of the triggering impact
    #[serde(default = "default_trend_magnitude_ratio")]
    pub trend_magnitude_ratio: f64,
    /// Window entries required before a verdict is meaningful
    #[serde(default)]
    pub min_observations: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SizingConfig {
    /// Max position size as ratio of pool liquidity
    #[serde(default = "default_max_position_ratio")]
    pub max_position_ratio: f64,
    /// Venue minimum tradable unit, sizes below this are rejected
    #[serde(default = "default_min_tradable_size")]
    pub min_tradable_size: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExitConfig {
    /// Stop loss on adverse move (basis points)
    #[serde(default = "default_stop_loss_bp")]
    pub stop_loss_bp: f64,
    /// Take profit on favorable move (basis points)
    #[serde(default = "default_take_profit_bp")]
    pub take_profit_bp: f64,
    /// Maximum hold duration before timeout exit at market
    #[serde(default = "default_max_hold_secs")]
    pub max_hold_secs: u64,
    /// Poll interval for deadline checks between events
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PositionConfig {
    /// Where to persist live positions (none = in-memory only)
    #[serde(default)]
    pub persistence_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

// Default value functions
fn default_min_impact_bp() -> f64 {
    50.0
}

fn default_max_impact_bp() -> f64 {
    500.0
}

fn default_wait_time_secs() -> u64 {
    2
}

fn default_expiry_policy() -> ExpiryPolicy {
    ExpiryPolicy::RevertCheck
}

fn default_horizon_secs() -> u64 {
    30
}

fn default_trend_count_threshold() -> usize {
    1
}

fn default_trend_magnitude_ratio() -> f64 {
    1.0
}

fn default_max_position_ratio() -> f64 {
    0.05
}

fn default_min_tradable_size() -> f64 {
    0.01
}

fn default_stop_loss_bp() -> f64 {
    100.0
}

fn default_take_profit_bp() -> f64 {
    50.0
}

fn default_max_hold_secs() -> u64 {
    300
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_channel_capacity() -> usize {
    1024
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            min_impact_bp: default_min_impact_bp(),
            max_impact_bp: default_max_impact_bp(),
            wait_time_secs: default_wait_time_secs(),
            expiry_policy: default_expiry_policy(),
            fade_on_insufficient_data: false,
        }
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            horizon_secs: default_horizon_secs(),
            trend_count_threshold: default_trend_count_threshold(),
            trend_magnitude_ratio: default_trend_magnitude_ratio(),
            min_observations: 0,
        }
    }
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            max_position_ratio: default_max_position_ratio(),
            min_tradable_size: default_min_tradable_size(),
        }
    }
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            stop_loss_bp: default_stop_loss_bp(),
            take_profit_bp: default_take_profit_bp(),
            max_hold_secs: default_max_hold_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strategy: StrategyConfig::default(),
            flow: FlowConfig::default(),
            sizing: SizingConfig::default(),
            exits: ExitConfig::default(),
            position: PositionConfig::default(),
            feed: FeedConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix FADER_)
            .add_source(
                config::Environment::with_prefix("FADER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.strategy.min_impact_bp <= 0.0 {
            anyhow::bail!("min_impact_bp must be positive");
        }

        if self.strategy.min_impact_bp >= self.strategy.max_impact_bp {
            anyhow::bail!(
                "min_impact_bp ({}) must be below max_impact_bp ({})",
                self.strategy.min_impact_bp,
                self.strategy.max_impact_bp
            );
        }

        if self.strategy.wait_time_secs == 0 {
            anyhow::bail!("wait_time_secs must be positive");
        }

        if self.flow.horizon_secs == 0 {
            anyhow::bail!("horizon_secs must be positive");
        }

        if self.flow.trend_magnitude_ratio <= 0.0 {
            anyhow::bail!("trend_magnitude_ratio must be positive");
        }

        if self.sizing.max_position_ratio <= 0.0 || self.sizing.max_position_ratio > 1.0 {
            anyhow::bail!("max_position_ratio must be in (0, 1]");
        }

        if self.sizing.min_tradable_size < 0.0 {
            anyhow::bail!("min_tradable_size cannot be negative");
        }

        if self.exits.stop_loss_bp <= 0.0 {
            anyhow::bail!("stop_loss_bp must be positive");
        }

        if self.exits.take_profit_bp <= 0.0 {
            anyhow::bail!("take_profit_bp must be positive");
        }

        if self.exits.max_hold_secs == 0 {
            anyhow::bail!("max_hold_secs must be positive");
        }

        if self.feed.channel_capacity == 0 {
            anyhow::bail!("channel_capacity must be positive");
        }

        Ok(())
    }

    /// Get configuration summary for display
    pub fn summary(&self) -> String {
        format!(
            r#"Configuration:
  Strategy:
    impact band: [{}, {}] bps
    wait time: {}s
    expiry policy: {:?}
    fade on insufficient data: {}
  Flow:
    horizon: {}s
    trend count threshold: {}
    trend magnitude ratio: {}
    min observations: {}
  Sizing:
    max position ratio: {}
    min tradable size: {}
  Exits:
    stop loss: {} bps
    take profit: {} bps
    max hold: {}s
    poll interval: {}ms
  Position:
    persistence: {}
"#,
            self.strategy.min_impact_bp,
            self.strategy.max_impact_bp,
            self.strategy.wait_time_secs,
            self.strategy.expiry_policy,
            self.strategy.fade_on_insufficient_data,
            self.flow.horizon_secs,
            self.flow.trend_count_threshold,
            self.flow.trend_magnitude_ratio,
            self.flow.min_observations,
            self.sizing.max_position_ratio,
            self.sizing.min_tradable_size,
            self.exits.stop_loss_bp,
            self.exits.take_profit_bp,
            self.exits.max_hold_secs,
            self.exits.poll_interval_ms,
            self.position
                .persistence_path
                .as_deref()
                .unwrap_or("(in-memory)"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.strategy.min_impact_bp, 50.0);
        assert_eq!(config.strategy.max_impact_bp, 500.0);
        assert_eq!(config.exits.stop_loss_bp, 100.0);
        assert_eq!(config.exits.take_profit_bp, 50.0);
        assert_eq!(config.strategy.expiry_policy, ExpiryPolicy::RevertCheck);
        assert!(!config.strategy.fade_on_insufficient_data);
        config.validate().unwrap();
    }

    #[test]
    fn test_expiry_policy_deserialize() {
        let json = r#""revert_check""#;
        let policy: ExpiryPolicy = serde_json::from_str(json).unwrap();
        assert_eq!(policy, ExpiryPolicy::RevertCheck);

        let json = r#""always_enter""#;
        let policy: ExpiryPolicy = serde_json::from_str(json).unwrap();
        assert_eq!(policy, ExpiryPolicy::AlwaysEnter);
    }

    #[test]
    fn test_validate_rejects_inverted_band() {
        let mut config = Config::default();
        config.strategy.min_impact_bp = 600.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_ratio() {
        let mut config = Config::default();
        config.sizing.max_position_ratio = 1.5;
        assert!(config.validate().is_err());

        config.sizing.max_position_ratio = 0.0;
        assert!(config.validate().is_err());
    }
}
