//! Builder pattern for manager configuration.
//!
//! Provides a fluent API for configuring and creating [`ConnectionManager`]
//! instances.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use wallet_bridge::{ConnectionManager, FileStore, InjectedHost, WalletConfig};
//!
//! # fn example() -> wallet_bridge::Result<()> {
//! let manager = ConnectionManager::builder()
//!     .host(Arc::new(InjectedHost::new()))
//!     .store(Arc::new(FileStore::open("wallet.json")?))
//!     .config(WalletConfig::new().with_detection_retries(3))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::WalletConfig;
use crate::detection::{DetectionOrchestrator, DetectionStrategy, ProbeContext, default_strategies};
use crate::error::{Error, Result};
use crate::host::Host;
use crate::notify::{NotificationSink, NullSink};
use crate::storage::{KeyValueStore, MemoryStore, SessionStore};

use super::core::ConnectionManager;

// ============================================================================
// ConnectionManagerBuilder
// ============================================================================

/// Builder for configuring a [`ConnectionManager`] instance.
///
/// Use [`ConnectionManager::builder()`] to create a new builder. Only the
/// host is required; everything else has a default.
#[derive(Default)]
pub struct ConnectionManagerBuilder {
    /// Provider environment.
    host: Option<Arc<dyn Host>>,
    /// Session persistence; defaults to an in-memory store.
    store: Option<Arc<dyn KeyValueStore>>,
    /// Notification sink; defaults to [`NullSink`].
    sink: Option<Arc<dyn NotificationSink>>,
    /// Wall clock; defaults to [`SystemClock`].
    clock: Option<Arc<dyn Clock>>,
    /// Detection strategies; defaults to the built-in five.
    strategies: Option<Vec<Arc<dyn DetectionStrategy>>>,
    /// Timing configuration.
    config: WalletConfig,
}

impl fmt::Debug for ConnectionManagerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManagerBuilder")
            .field("has_host", &self.host.is_some())
            .field("has_store", &self.store.is_some())
            .field("has_sink", &self.sink.is_some())
            .field("strategies", &self.strategies.as_ref().map(Vec::len))
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ConnectionManagerBuilder Implementation
// ============================================================================

impl ConnectionManagerBuilder {
    /// Creates a builder with default configuration and no host.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the environment the provider is injected into.
    #[inline]
    #[must_use]
    pub fn host(mut self, host: Arc<dyn Host>) -> Self {
        self.host = Some(host);
        self
    }

    /// Sets the key-value store used for the persisted session.
    #[inline]
    #[must_use]
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the notification sink.
    #[inline]
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Sets the wall clock used for session timestamps.
    #[inline]
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Replaces the detection strategies.
    #[inline]
    #[must_use]
    pub fn strategies(mut self, strategies: Vec<Arc<dyn DetectionStrategy>>) -> Self {
        self.strategies = Some(strategies);
        self
    }

    /// Sets the timing configuration.
    #[inline]
    #[must_use]
    pub fn config(mut self, config: WalletConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the manager with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no host was set
    /// - [`Error::Config`] if the configuration or strategy list is invalid
    pub fn build(self) -> Result<ConnectionManager> {
        let host = self.validate_host()?;
        self.config.validate()?;
        let strategies = self.validate_strategies()?;

        let config = Arc::new(self.config);
        let store = self.store.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let sessions = SessionStore::new(store);
        let ctx = ProbeContext::new(Arc::clone(&host), sessions.clone(), Arc::clone(&config));

        Ok(ConnectionManager::from_parts(
            config,
            host,
            sessions,
            self.sink.unwrap_or_else(|| Arc::new(NullSink)),
            self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            DetectionOrchestrator::with_strategies(ctx, strategies),
        ))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ConnectionManagerBuilder {
    /// Validates that a host was provided.
    fn validate_host(&self) -> Result<Arc<dyn Host>> {
        self.host.clone().ok_or_else(|| {
            Error::config(
                "Host is required. Use .host() to set it.\n\
                 Example: ConnectionManager::builder().host(Arc::new(InjectedHost::new()))",
            )
        })
    }

    /// Resolves the strategy list.
    fn validate_strategies(&self) -> Result<Vec<Arc<dyn DetectionStrategy>>> {
        match &self.strategies {
            None => Ok(default_strategies()),
            Some(list) if list.is_empty() => Err(Error::config(
                "At least one detection strategy is required",
            )),
            Some(list) => Ok(list.clone()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
