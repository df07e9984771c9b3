//! Wallet connection configuration.
//!
//! Every timing constant of the detection and connection machinery lives
//! here as a default that callers may override.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use wallet_bridge::WalletConfig;
//!
//! let config = WalletConfig::new()
//!     .with_connect_timeout(Duration::from_secs(5))
//!     .with_detection_retries(3)
//!     .with_provider_keyword("backpack");
//!
//! assert!(config.validate().is_ok());
//! ```
//!
//! Configuration may also be loaded from JSON, durations in milliseconds:
//!
//! ```
//! use wallet_bridge::WalletConfig;
//!
//! let config = WalletConfig::from_json_str(r#"{ "connect_timeout_ms": 2500 }"#).unwrap();
//! assert_eq!(config.connect_timeout.as_millis(), 2500);
//! assert_eq!(config.detection_retries, 5);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Defaults
// ============================================================================

const DEFAULT_DETECTION_RETRIES: u32 = 5;
const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(800);
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 1.5;
const DEFAULT_READY_WAIT: Duration = Duration::from_millis(1000);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);
const DEFAULT_POLL_ATTEMPTS: u32 = 5;
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_WATCHDOG_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_SESSION_MAX_AGE: Duration = Duration::from_secs(60 * 60);
const DEFAULT_RESTORE_DELAY: Duration = Duration::from_secs(2);
const DEFAULT_NOTIFICATION_DURATION: Duration = Duration::from_millis(4000);
const DEFAULT_REPORT_DURATION: Duration = Duration::from_millis(12_000);
const DEFAULT_LATE_WATCH_ATTEMPTS: u32 = 10;
const DEFAULT_LATE_WATCH_BASE: Duration = Duration::from_millis(500);
const DEFAULT_LATE_WATCH_MULTIPLIER: f64 = 1.5;
const DEFAULT_LATE_WATCH_MAX_EXPONENT: u32 = 5;
const DEFAULT_LATE_WATCH_PERIOD: Duration = Duration::from_millis(2000);

fn default_provider_keywords() -> Vec<String> {
    vec!["phantom".to_string(), "solana".to_string()]
}

// ============================================================================
// WalletConfig
// ============================================================================

/// Timing and matching configuration for detection and connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Outer detection retries.
    pub detection_retries: u32,

    /// Delay before the second detection retry.
    #[serde(rename = "backoff_base_ms", with = "duration_ms")]
    pub backoff_base: Duration,

    /// Growth factor applied to the backoff per retry.
    pub backoff_multiplier: f64,

    /// Upper bound on the wait for the host ready signal.
    #[serde(rename = "ready_wait_ms", with = "duration_ms")]
    pub ready_wait: Duration,

    /// Interval between samples of the polling strategy.
    #[serde(rename = "poll_interval_ms", with = "duration_ms")]
    pub poll_interval: Duration,

    /// Samples taken by the polling strategy.
    pub poll_attempts: u32,

    /// Time allowed for the provider connect call.
    #[serde(rename = "connect_timeout_ms", with = "duration_ms")]
    pub connect_timeout: Duration,

    /// Period of the reconnection watchdog.
    #[serde(rename = "watchdog_interval_ms", with = "duration_ms")]
    pub watchdog_interval: Duration,

    /// Maximum age of a persisted session that may be restored.
    #[serde(rename = "session_max_age_ms", with = "duration_ms")]
    pub session_max_age: Duration,

    /// Delay between initialization and the session restore attempt.
    #[serde(rename = "restore_delay_ms", with = "duration_ms")]
    pub restore_delay: Duration,

    /// Substrings (case-insensitive) that mark a storage key as a provider trace.
    pub provider_keywords: Vec<String>,

    /// Display duration for ordinary notifications.
    #[serde(rename = "notification_duration_ms", with = "duration_ms")]
    pub notification_duration: Duration,

    /// Display duration for detection failure reports.
    #[serde(rename = "report_duration_ms", with = "duration_ms")]
    pub report_duration: Duration,

    /// Backoff attempts of the late provider watcher.
    pub late_watch_attempts: u32,

    /// Base delay of the late provider watcher.
    #[serde(rename = "late_watch_base_ms", with = "duration_ms")]
    pub late_watch_base: Duration,

    /// Growth factor of the late provider watcher backoff.
    pub late_watch_multiplier: f64,

    /// Exponent cap of the late provider watcher backoff.
    pub late_watch_max_exponent: u32,

    /// Period of the late provider watcher once backoff is exhausted.
    #[serde(rename = "late_watch_period_ms", with = "duration_ms")]
    pub late_watch_period: Duration,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl WalletConfig {
    /// Creates a configuration with the default constants.
    #[must_use]
    pub fn new() -> Self {
        Self {
            detection_retries: DEFAULT_DETECTION_RETRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            ready_wait: DEFAULT_READY_WAIT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_attempts: DEFAULT_POLL_ATTEMPTS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            watchdog_interval: DEFAULT_WATCHDOG_INTERVAL,
            session_max_age: DEFAULT_SESSION_MAX_AGE,
            restore_delay: DEFAULT_RESTORE_DELAY,
            provider_keywords: default_provider_keywords(),
            notification_duration: DEFAULT_NOTIFICATION_DURATION,
            report_duration: DEFAULT_REPORT_DURATION,
            late_watch_attempts: DEFAULT_LATE_WATCH_ATTEMPTS,
            late_watch_base: DEFAULT_LATE_WATCH_BASE,
            late_watch_multiplier: DEFAULT_LATE_WATCH_MULTIPLIER,
            late_watch_max_exponent: DEFAULT_LATE_WATCH_MAX_EXPONENT,
            late_watch_period: DEFAULT_LATE_WATCH_PERIOD,
        }
    }

    /// Parses a configuration from JSON, defaulting missing fields.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the document is malformed
    /// - [`Error::Config`] if the values fail [`validate`](Self::validate)
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl WalletConfig {
    /// Sets the number of outer detection retries.
    #[inline]
    #[must_use]
    pub fn with_detection_retries(mut self, retries: u32) -> Self {
        self.detection_retries = retries;
        self
    }

    /// Sets the detection backoff base delay and multiplier.
    #[inline]
    #[must_use]
    pub fn with_backoff(mut self, base: Duration, multiplier: f64) -> Self {
        self.backoff_base = base;
        self.backoff_multiplier = multiplier;
        self
    }

    /// Sets the bound on the host ready wait.
    #[inline]
    #[must_use]
    pub fn with_ready_wait(mut self, wait: Duration) -> Self {
        self.ready_wait = wait;
        self
    }

    /// Sets the polling strategy interval and sample count.
    #[inline]
    #[must_use]
    pub fn with_polling(mut self, interval: Duration, attempts: u32) -> Self {
        self.poll_interval = interval;
        self.poll_attempts = attempts;
        self
    }

    /// Sets the provider connect timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the watchdog period.
    #[inline]
    #[must_use]
    pub fn with_watchdog_interval(mut self, interval: Duration) -> Self {
        self.watchdog_interval = interval;
        self
    }

    /// Sets the persisted session freshness window.
    #[inline]
    #[must_use]
    pub fn with_session_max_age(mut self, max_age: Duration) -> Self {
        self.session_max_age = max_age;
        self
    }

    /// Sets the delay before session restore on initialization.
    #[inline]
    #[must_use]
    pub fn with_restore_delay(mut self, delay: Duration) -> Self {
        self.restore_delay = delay;
        self
    }

    /// Adds a storage keyword that marks a provider trace.
    #[inline]
    #[must_use]
    pub fn with_provider_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.provider_keywords.push(keyword.into());
        self
    }

    /// Replaces the storage keywords.
    #[inline]
    #[must_use]
    pub fn with_provider_keywords(
        mut self,
        keywords: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.provider_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }
}

// ============================================================================
// Derived Values
// ============================================================================

impl WalletConfig {
    /// Returns the wait before detection retry `retry + 1`.
    ///
    /// Equals `backoff_base * backoff_multiplier^retry`.
    #[must_use]
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        scaled_millis(self.backoff_base, self.backoff_multiplier, retry)
    }

    /// Returns the wait before late watcher attempt `attempt` (1-based).
    #[must_use]
    pub fn late_watch_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt
            .saturating_sub(1)
            .min(self.late_watch_max_exponent);
        scaled_millis(self.late_watch_base, self.late_watch_multiplier, exponent)
    }

    /// Returns `true` if `key` contains a provider keyword, ignoring case.
    #[must_use]
    pub fn matches_provider_key(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.provider_keywords
            .iter()
            .any(|keyword| key.contains(&keyword.to_lowercase()))
    }

    /// Checks the configuration for values the machinery cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.detection_retries == 0 {
            return Err(Error::config("detection_retries must be at least 1"));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(Error::config(format!(
                "backoff_multiplier must be a finite value >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        if !self.late_watch_multiplier.is_finite() || self.late_watch_multiplier < 1.0 {
            return Err(Error::config(format!(
                "late_watch_multiplier must be a finite value >= 1.0, got {}",
                self.late_watch_multiplier
            )));
        }
        if self.poll_attempts == 0 {
            return Err(Error::config("poll_attempts must be at least 1"));
        }
        if self.connect_timeout.is_zero() {
            return Err(Error::config("connect_timeout must be non-zero"));
        }
        if self.watchdog_interval.is_zero() {
            return Err(Error::config("watchdog_interval must be non-zero"));
        }
        if self.late_watch_period.is_zero() {
            return Err(Error::config("late_watch_period must be non-zero"));
        }
        Ok(())
    }
}

/// Returns `base * multiplier^exponent`, rounded to whole milliseconds.
fn scaled_millis(base: Duration, multiplier: f64, exponent: u32) -> Duration {
    let exponent = i32::try_from(exponent).unwrap_or(i32::MAX);
    let millis = (base.as_millis() as f64 * multiplier.powi(exponent)).round();
    Duration::from_millis(millis as u64)
}

// ============================================================================
// Serde Helpers
// ============================================================================

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

// ============================================================================
// Tests
// ============================================================================
