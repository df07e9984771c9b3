//! Host environment that owns the injected provider.
//!
//! In a browser this is the page: it owns `window.solana`, knows its user
//! agent and protocol, and fires a load signal once. [`InjectedHost`] is a
//! shareable in-process implementation that embedding code (or a driver
//! bridge) updates as the real environment changes.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::debug;

use crate::provider::Provider;

// ============================================================================
// Constants
// ============================================================================

const DEFAULT_PROTOCOL: &str = "https:";

// ============================================================================
// Host
// ============================================================================

/// Runtime environment the provider is injected into.
#[async_trait]
pub trait Host: Send + Sync {
    /// Returns the currently injected provider, if any.
    fn provider(&self) -> Option<Arc<dyn Provider>>;

    /// Resolves once the environment's ready (load) signal has fired.
    ///
    /// Callers bound this wait themselves.
    async fn ready(&self);

    /// User agent string, for diagnostics.
    fn user_agent(&self) -> String;

    /// Page protocol (e.g. `https:`), for diagnostics.
    fn protocol(&self) -> String;
}

// ============================================================================
// InjectedHost
// ============================================================================

/// In-process [`Host`] whose provider slot and ready flag are set externally.
///
/// # Example
///
/// ```ignore
/// let host = InjectedHost::new();
/// host.inject(Arc::new(my_provider));
/// host.mark_ready();
/// ```
pub struct InjectedHost {
    /// Injected provider slot.
    provider: RwLock<Option<Arc<dyn Provider>>>,
    /// Ready signal.
    ready: watch::Sender<bool>,
    /// Reported user agent.
    user_agent: String,
    /// Reported page protocol.
    protocol: String,
}

impl fmt::Debug for InjectedHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectedHost")
            .field("has_provider", &self.provider.read().is_some())
            .field("ready", &*self.ready.borrow())
            .field("user_agent", &self.user_agent)
            .field("protocol", &self.protocol)
            .finish()
    }
}

impl Default for InjectedHost {
    fn default() -> Self {
        Self::new()
    }
}

impl InjectedHost {
    /// Creates an empty, not-yet-ready host.
    #[must_use]
    pub fn new() -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            provider: RwLock::new(None),
            ready,
            user_agent: format!("wallet-bridge/{}", env!("CARGO_PKG_VERSION")),
            protocol: DEFAULT_PROTOCOL.to_string(),
        }
    }

    /// Sets the reported user agent.
    #[inline]
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the reported protocol.
    #[inline]
    #[must_use]
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    /// Injects (or replaces) the provider.
    pub fn inject(&self, provider: Arc<dyn Provider>) {
        debug!("Provider injected into host");
        *self.provider.write() = Some(provider);
    }

    /// Removes the provider, as when the extension is disabled.
    pub fn remove(&self) {
        debug!("Provider removed from host");
        *self.provider.write() = None;
    }

    /// Fires the ready signal. Idempotent.
    pub fn mark_ready(&self) {
        self.ready.send_replace(true);
    }

    /// Returns `true` once the ready signal has fired.
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }
}

#[async_trait]
impl Host for InjectedHost {
    fn provider(&self) -> Option<Arc<dyn Provider>> {
        self.provider.read().clone()
    }

    async fn ready(&self) {
        let mut rx = self.ready.subscribe();
        loop {
            let ready = *rx.borrow_and_update();
            if ready || rx.changed().await.is_err() {
                return;
            }
        }
    }

    fn user_agent(&self) -> String {
        self.user_agent.clone()
    }

    fn protocol(&self) -> String {
        self.protocol.clone()
    }
}

// ============================================================================
// Tests
// ============================================================================
