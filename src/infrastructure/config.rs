//! Engine configuration
//!
//! Defaults match the reference deployment; every knob can be overridden via
//! environment variables or a JSON config file (`--config <path>`).

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {error}")]
    Io { path: String, error: String },
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Full configuration for the trading backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Server bind host.
    pub host: String,
    /// Server bind port (REST + WebSocket push).
    pub port: u16,
    /// Upstream feed base URL (combined trade streams are appended).
    pub feed_url: String,
    /// Instruments to subscribe to and evaluate.
    pub instruments: Vec<String>,
    /// Oscillator lookback in samples.
    pub oscillator_period: usize,
    /// Moving-average lookback in samples.
    pub moving_average_period: usize,
    /// Oscillator level below which entries go long.
    pub buy_threshold: f64,
    /// Oscillator level above which entries go short.
    pub sell_threshold: f64,
    /// Stop-loss distance from entry, as a fraction.
    pub stop_loss_pct: f64,
    /// Take-profit distance from entry, as a fraction.
    pub take_profit_pct: f64,
    /// Fixed size attached to every opened position.
    pub trade_size: f64,
    /// Evaluation scheduler interval in milliseconds.
    pub eval_interval_ms: u64,
    /// Minimum spacing between MARKET_UPDATE publishes, milliseconds.
    pub broadcast_throttle_ms: u64,
    /// Feed reconnect backoff in milliseconds.
    pub reconnect_delay_ms: u64,
    /// Price window capacity per instrument.
    pub window_size: usize,
    /// Closed-trade history cap (most-recent-first, oldest evicted).
    pub history_cap: usize,
    /// Broadcast channel capacity per subscriber.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            host: "0.0.0.0".to_string(),
            port: 3000,
            feed_url: "wss://stream.binance.com:9443/ws".to_string(),
            instruments: vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],
            oscillator_period: 14,
            moving_average_period: 20,
            buy_threshold: 30.0,
            sell_threshold: 70.0,
            stop_loss_pct: 0.02,
            take_profit_pct: 0.05,
            trade_size: 0.1,
            eval_interval_ms: 1000,
            broadcast_throttle_ms: 100,
            reconnect_delay_ms: 5000,
            window_size: 100,
            history_cap: 50,
            event_capacity: 1024,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_json(&content)
    }

    /// Parse configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment-variable overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = EngineConfig::default();

        env_override("HOST", &mut config.host)?;
        env_override("PORT", &mut config.port)?;
        env_override("FEED_URL", &mut config.feed_url)?;
        if let Ok(instruments) = std::env::var("INSTRUMENTS") {
            config.instruments = instruments
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
        }
        env_override("OSCILLATOR_PERIOD", &mut config.oscillator_period)?;
        env_override("MOVING_AVERAGE_PERIOD", &mut config.moving_average_period)?;
        env_override("BUY_THRESHOLD", &mut config.buy_threshold)?;
        env_override("SELL_THRESHOLD", &mut config.sell_threshold)?;
        env_override("STOP_LOSS_PCT", &mut config.stop_loss_pct)?;
        env_override("TAKE_PROFIT_PCT", &mut config.take_profit_pct)?;
        env_override("TRADE_SIZE", &mut config.trade_size)?;
        env_override("EVAL_INTERVAL_MS", &mut config.eval_interval_ms)?;
        env_override("BROADCAST_THROTTLE_MS", &mut config.broadcast_throttle_ms)?;
        env_override("RECONNECT_DELAY_MS", &mut config.reconnect_delay_ms)?;
        env_override("WINDOW_SIZE", &mut config.window_size)?;
        env_override("HISTORY_CAP", &mut config.history_cap)?;
        env_override("EVENT_CAPACITY", &mut config.event_capacity)?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.instruments.is_empty() {
            return Err(ConfigError::Invalid("no instruments configured".into()));
        }
        if self.window_size < self.oscillator_period + 1
            || self.window_size < self.moving_average_period
        {
            return Err(ConfigError::Invalid(format!(
                "window size {} is below the indicator lookbacks",
                self.window_size
            )));
        }
        if self.trade_size <= 0.0 {
            return Err(ConfigError::Invalid("trade size must be positive".into()));
        }
        Ok(())
    }
}

/// Overwrite `slot` with the parsed value of `key` when the variable is set.
fn env_override<T: std::str::FromStr>(key: &str, slot: &mut T) -> Result<(), ConfigError> {
    if let Ok(raw) = std::env::var(key) {
        *slot = raw
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("{key} is not a valid value: {raw}")))?;
    }
    Ok(())
}
