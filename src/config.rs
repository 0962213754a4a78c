//! Engine configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::{EngineError, Result};

/// Top-level engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Symbol universe evaluated each cycle
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
    /// Seconds between evaluation passes
    #[serde(default = "default_cycle_interval_secs")]
    pub cycle_interval_secs: u64,
    /// Hours an unresolved signal suppresses new generation for its symbol
    #[serde(default = "default_cooldown_hours")]
    pub cooldown_hours: i64,
    /// Candle history depth requested per evaluation
    #[serde(default = "default_candle_limit")]
    pub candle_limit: usize,
    /// Manual closes within this percent of entry count as breakeven
    #[serde(default = "default_breakeven_tolerance_pct")]
    pub breakeven_tolerance_pct: f64,
    #[serde(default)]
    pub synth: SynthConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub feed: FeedConfig,
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("ENGINE_SYMBOLS") {
            config.symbols = raw
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(raw) = std::env::var("ENGINE_CYCLE_INTERVAL_SECS") {
            config.cycle_interval_secs = raw.parse().map_err(|_| {
                EngineError::InvalidConfig(format!("ENGINE_CYCLE_INTERVAL_SECS: {}", raw))
            })?;
        }

        if let Ok(raw) = std::env::var("ENGINE_COOLDOWN_HOURS") {
            config.cooldown_hours = raw.parse().map_err(|_| {
                EngineError::InvalidConfig(format!("ENGINE_COOLDOWN_HOURS: {}", raw))
            })?;
        }

        if let Ok(url) = std::env::var("PRICE_API_URL") {
            config.feed.base_url = url;
        }

        if let Ok(raw) = std::env::var("ENGINE_SWEEP_ENABLED") {
            config.sweep.enabled = matches!(raw.as_str(), "1" | "true" | "yes");
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.symbols.is_empty() {
            return Err(EngineError::InvalidConfig(
                "symbol universe is empty".to_string(),
            ));
        }
        if self.cycle_interval_secs == 0 {
            return Err(EngineError::InvalidConfig(
                "cycle interval must be positive".to_string(),
            ));
        }
        if self.cooldown_hours < 0 {
            return Err(EngineError::InvalidConfig(
                "cooldown hours must not be negative".to_string(),
            ));
        }
        self.synth.validate()?;
        self.sweep.validate()?;
        Ok(())
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }

    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::hours(self.cooldown_hours)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            cycle_interval_secs: default_cycle_interval_secs(),
            cooldown_hours: default_cooldown_hours(),
            candle_limit: default_candle_limit(),
            breakeven_tolerance_pct: default_breakeven_tolerance_pct(),
            synth: SynthConfig::default(),
            sweep: SweepConfig::default(),
            feed: FeedConfig::default(),
        }
    }
}

/// Stop loss / take profit distance ranges, in percent of entry price
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct SynthConfig {
    #[serde(default = "default_stop_loss_min_pct")]
    pub stop_loss_min_pct: f64,
    #[serde(default = "default_stop_loss_max_pct")]
    pub stop_loss_max_pct: f64,
    #[serde(default = "default_take_profit_min_pct")]
    pub take_profit_min_pct: f64,
    #[serde(default = "default_take_profit_max_pct")]
    pub take_profit_max_pct: f64,
}

impl SynthConfig {
    fn validate(&self) -> Result<()> {
        if self.stop_loss_min_pct <= 0.0 || self.take_profit_min_pct <= 0.0 {
            return Err(EngineError::InvalidConfig(
                "level distances must be positive".to_string(),
            ));
        }
        if self.stop_loss_min_pct > self.stop_loss_max_pct {
            return Err(EngineError::InvalidConfig(
                "stop loss range is inverted".to_string(),
            ));
        }
        if self.take_profit_min_pct > self.take_profit_max_pct {
            return Err(EngineError::InvalidConfig(
                "take profit range is inverted".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            stop_loss_min_pct: default_stop_loss_min_pct(),
            stop_loss_max_pct: default_stop_loss_max_pct(),
            take_profit_min_pct: default_take_profit_min_pct(),
            take_profit_max_pct: default_take_profit_max_pct(),
        }
    }
}

/// Alternate age/percentage resolution sweep. Disabled by default; when
/// enabled it replaces the level-based resolver for the cycle so the two
/// policies never both touch a signal.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct SweepConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Minimum signal age before the sweep will judge it
    #[serde(default = "default_sweep_min_age_hours")]
    pub min_age_hours: i64,
    /// Favorable move (percent of entry) that counts as a win
    #[serde(default = "default_sweep_win_pct")]
    pub win_threshold_pct: f64,
    /// Adverse move (percent of entry) that counts as a loss
    #[serde(default = "default_sweep_loss_pct")]
    pub loss_threshold_pct: f64,
}

impl SweepConfig {
    fn validate(&self) -> Result<()> {
        if self.win_threshold_pct <= 0.0 || self.loss_threshold_pct <= 0.0 {
            return Err(EngineError::InvalidConfig(
                "sweep thresholds must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn min_age(&self) -> chrono::Duration {
        chrono::Duration::hours(self.min_age_hours)
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_age_hours: default_sweep_min_age_hours(),
            win_threshold_pct: default_sweep_win_pct(),
            loss_threshold_pct: default_sweep_loss_pct(),
        }
    }
}

/// Price feed client settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedConfig {
    #[serde(default = "default_feed_base_url")]
    pub base_url: String,
    #[serde(default = "default_feed_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: default_feed_base_url(),
            timeout_secs: default_feed_timeout_secs(),
        }
    }
}

fn default_symbols() -> Vec<String> {
    [
        "BTC", "ETH", "BNB", "XRP", "SOL", "ADA", "DOGE", "DOT", "AVAX", "LINK", "MATIC", "LTC",
        "UNI", "ATOM", "NEAR",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_cycle_interval_secs() -> u64 { 3600 }
fn default_cooldown_hours() -> i64 { 4 }
fn default_candle_limit() -> usize { 200 }
fn default_breakeven_tolerance_pct() -> f64 { 0.1 }
fn default_stop_loss_min_pct() -> f64 { 1.5 }
fn default_stop_loss_max_pct() -> f64 { 2.5 }
fn default_take_profit_min_pct() -> f64 { 3.5 }
fn default_take_profit_max_pct() -> f64 { 5.5 }
fn default_sweep_min_age_hours() -> i64 { 1 }
fn default_sweep_win_pct() -> f64 { 5.0 }
fn default_sweep_loss_pct() -> f64 { 3.0 }
fn default_feed_base_url() -> String { "http://localhost:8080".to_string() }
fn default_feed_timeout_secs() -> u64 { 10 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.symbols.len(), 15);
        assert_eq!(config.cycle_interval_secs, 3600);
        assert_eq!(config.cooldown_hours, 4);
        assert!(!config.sweep.enabled);
    }

    #[test]
    fn empty_universe_is_rejected() {
        let mut config = EngineConfig::default();
        config.symbols.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_stop_range_is_rejected() {
        let mut config = EngineConfig::default();
        config.synth.stop_loss_min_pct = 3.0;
        config.synth.stop_loss_max_pct = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut config = EngineConfig::default();
        config.cycle_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn nested_defaults_fill_from_empty_json() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.synth.stop_loss_min_pct, 1.5);
        assert_eq!(config.synth.take_profit_max_pct, 5.5);
        assert_eq!(config.sweep.min_age_hours, 1);
        assert_eq!(config.feed.timeout_secs, 10);
    }
}
