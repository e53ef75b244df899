//! Validated trading configuration.
//!
//! Loaded once at startup from YAML; invalid configuration is fatal and
//! surfaces before any market data is touched.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use pulsetick_core::{Interval, Symbol};
use pulsetick_signals::ScoringWeights;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Externally supplied configuration surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TradingConfig {
    /// Instruments polled every cycle.
    pub watchlist: Vec<Symbol>,
    pub interval: Interval,
    /// Candles requested per symbol per cycle.
    pub candle_lookback: usize,

    pub weights: ScoringWeights,

    /// Minimum overall score admitting a candidate into evaluation.
    pub entry_threshold: f64,
    /// Minimum aligned directional checks (of 7) for entry.
    pub min_aligned_signals: u8,
    /// Consecutive same-direction cycles required before committing capital.
    pub confirmation_cycles: u32,
    /// Evaluation cycles before an unconfirmed candidate reverts.
    pub max_evaluation_cycles: u32,

    /// Concurrent position slots.
    pub max_positions: usize,
    /// Hard cap on notional committed per position.
    pub max_notional: f64,
    /// Fraction of the account balance risked per position.
    pub risk_fraction: f64,
    /// Paper account balance used for sizing.
    pub account_balance: f64,

    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub max_hold_secs: u64,
    /// Cumulative session loss (positive number) that halts trading.
    pub session_loss_floor: f64,
    pub close_retry_limit: u32,

    pub poll_interval_secs: u64,
    /// Per-tick deadline for fetch work; must fit inside the poll interval.
    pub tick_budget_secs: u64,
    /// Bounded fan-out across the watch-list.
    pub fetch_concurrency: usize,

    pub quote_ttl_secs: u64,
    pub candle_ttl_secs: u64,

    /// Per-minute request quota overrides for the live sources; built-in
    /// provider policies apply when unset.
    pub schwab_quota_per_min: Option<u32>,
    pub alphavantage_quota_per_min: Option<u32>,

    /// Force deterministic offline sources regardless of credentials.
    pub mock_mode: bool,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            watchlist: default_watchlist(),
            interval: Interval::OneMinute,
            candle_lookback: 120,
            weights: ScoringWeights::default(),
            entry_threshold: 60.0,
            min_aligned_signals: 3,
            confirmation_cycles: 2,
            max_evaluation_cycles: 4,
            max_positions: 1,
            max_notional: 500.0,
            risk_fraction: 0.02,
            account_balance: 25_000.0,
            stop_loss_pct: 3.0,
            take_profit_pct: 5.0,
            max_hold_secs: 300,
            session_loss_floor: 500.0,
            close_retry_limit: 3,
            poll_interval_secs: 60,
            tick_budget_secs: 45,
            fetch_concurrency: 4,
            quote_ttl_secs: 10,
            candle_ttl_secs: 120,
            schwab_quota_per_min: None,
            alphavantage_quota_per_min: None,
            mock_mode: false,
        }
    }
}

fn default_watchlist() -> Vec<Symbol> {
    ["META", "AAPL", "TSLA", "NVDA", "SPY", "QQQ"]
        .into_iter()
        .map(|s| Symbol::parse(s).expect("default watchlist symbols are valid"))
        .collect()
}

impl TradingConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.watchlist.is_empty() {
            return Err(invalid("watchlist", "must contain at least one symbol"));
        }
        if self.candle_lookback < 60 {
            return Err(invalid(
                "candle_lookback",
                "must be at least 60 to warm the indicator battery",
            ));
        }

        let weight_sum = self.weights.sum();
        if (weight_sum - 1.0).abs() > 1e-6 {
            return Err(invalid(
                "weights",
                format!("factor weights must sum to 1.0, got {weight_sum}"),
            ));
        }

        if !(0.0..=100.0).contains(&self.entry_threshold) {
            return Err(invalid("entry_threshold", "must be within 0..=100"));
        }
        if self.min_aligned_signals > 7 {
            return Err(invalid("min_aligned_signals", "only 7 checks exist"));
        }
        if self.confirmation_cycles == 0 {
            return Err(invalid("confirmation_cycles", "must be at least 1"));
        }
        if self.max_evaluation_cycles < self.confirmation_cycles {
            return Err(invalid(
                "max_evaluation_cycles",
                "must be >= confirmation_cycles",
            ));
        }

        if self.max_positions == 0 {
            return Err(invalid("max_positions", "must be at least 1"));
        }
        if self.max_notional <= 0.0 {
            return Err(invalid("max_notional", "must be positive"));
        }
        if !(0.0..=1.0).contains(&self.risk_fraction) || self.risk_fraction == 0.0 {
            return Err(invalid("risk_fraction", "must be within (0, 1]"));
        }
        if self.account_balance <= 0.0 {
            return Err(invalid("account_balance", "must be positive"));
        }

        if self.stop_loss_pct <= 0.0 || self.stop_loss_pct >= 100.0 {
            return Err(invalid("stop_loss_pct", "must be within (0, 100)"));
        }
        if self.take_profit_pct <= 0.0 {
            return Err(invalid("take_profit_pct", "must be positive"));
        }
        if self.session_loss_floor <= 0.0 {
            return Err(invalid("session_loss_floor", "must be positive"));
        }

        if self.poll_interval_secs == 0 {
            return Err(invalid("poll_interval_secs", "must be positive"));
        }
        if self.tick_budget_secs == 0 || self.tick_budget_secs > self.poll_interval_secs {
            return Err(invalid(
                "tick_budget_secs",
                "must be positive and fit inside the poll interval",
            ));
        }
        if self.fetch_concurrency == 0 {
            return Err(invalid("fetch_concurrency", "must be at least 1"));
        }
        if self.quote_ttl_secs == 0 || self.candle_ttl_secs == 0 {
            return Err(invalid("quote_ttl_secs", "cache TTLs must be positive"));
        }
        if self.schwab_quota_per_min == Some(0) || self.alphavantage_quota_per_min == Some(0) {
            return Err(invalid(
                "schwab_quota_per_min",
                "quota overrides must be positive",
            ));
        }

        Ok(())
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub const fn tick_budget(&self) -> Duration {
        Duration::from_secs(self.tick_budget_secs)
    }

    pub const fn max_hold(&self) -> Duration {
        Duration::from_secs(self.max_hold_secs)
    }

    pub const fn quote_ttl(&self) -> Duration {
        Duration::from_secs(self.quote_ttl_secs)
    }

    pub const fn candle_ttl(&self) -> Duration {
        Duration::from_secs(self.candle_ttl_secs)
    }

    /// Worker pool size: bounded by the watch-list, never more than the
    /// configured fan-out.
    pub fn worker_count(&self) -> usize {
        self.fetch_concurrency.min(self.watchlist.len()).max(1)
    }
}
