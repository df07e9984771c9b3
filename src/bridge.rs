//! Provider event subscriptions.
//!
//! [`EventBridge`] forwards the provider's `connect`, `disconnect` and
//! `accountChanged` signals to an [`EventTarget`] (the connection manager).
//! Listeners are attached at most once per provider object; attaching again
//! to the same provider is a no-op, and events from a provider the bridge
//! has since moved away from are reported as stale.
//!
//! [`watch_for_provider`] covers providers that are injected after startup.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, trace};

use crate::config::WalletConfig;
use crate::error::{Error, Result};
use crate::host::Host;
use crate::provider::{EventHandler, EventKind, Provider, ProviderEvent};

// ============================================================================
// EventTarget
// ============================================================================

/// Receiver of forwarded provider events.
pub trait EventTarget: Send + Sync {
    /// Handles one event emitted by `source`.
    fn handle_event(&self, event: ProviderEvent, source: &Weak<dyn Provider>);
}

// ============================================================================
// EventBridge
// ============================================================================

/// Attaches provider listeners, de-duplicated per provider object.
#[derive(Default)]
pub struct EventBridge {
    /// Provider whose listeners are attached.
    attached: Mutex<Option<Weak<dyn Provider>>>,
}

impl fmt::Debug for EventBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBridge")
            .field("attached", &self.has_live_provider())
            .finish()
    }
}

impl EventBridge {
    /// Creates a bridge with nothing attached.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `target` to the provider's lifecycle events.
    ///
    /// Returns `Ok(false)` if listeners are already attached to this
    /// provider or it has no subscription capability, `Ok(true)` once
    /// listeners were registered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SubscriptionFailure`] for the first event the
    /// provider refused. The remaining events are still subscribed and the
    /// provider still counts as attached.
    pub fn attach(&self, provider: &Arc<dyn Provider>, target: Weak<dyn EventTarget>) -> Result<bool> {
        let source = Arc::downgrade(provider);
        let mut attached = self.attached.lock();

        if attached.as_ref().is_some_and(|current| Weak::ptr_eq(current, &source)) {
            trace!("Listeners already attached to this provider");
            return Ok(false);
        }
        if !provider.supports_events() {
            debug!("Provider has no event subscription capability");
            return Ok(false);
        }

        let mut first_failure: Option<Error> = None;
        for kind in EventKind::ALL {
            let handler = forwarder(target.clone(), source.clone());
            if let Err(e) = provider.on(kind, handler) {
                debug!(event = %kind, error = %e, "Listener registration refused");
                first_failure.get_or_insert(e);
            }
        }

        *attached = Some(source);
        drop(attached);

        match first_failure {
            Some(e) => Err(e),
            None => {
                info!("Provider event listeners attached");
                Ok(true)
            }
        }
    }

    /// Returns `true` if `source` is the provider listeners are attached to.
    #[must_use]
    pub fn is_current(&self, source: &Weak<dyn Provider>) -> bool {
        self.attached
            .lock()
            .as_ref()
            .is_some_and(|current| Weak::ptr_eq(current, source))
    }

    /// Returns `true` if listeners are attached to a provider that still exists.
    #[must_use]
    pub fn has_live_provider(&self) -> bool {
        self.attached
            .lock()
            .as_ref()
            .is_some_and(|current| current.strong_count() > 0)
    }
}

/// Builds the closure registered with the provider for one event.
fn forwarder(target: Weak<dyn EventTarget>, source: Weak<dyn Provider>) -> EventHandler {
    Box::new(move |event| match target.upgrade() {
        Some(target) => target.handle_event(event, &source),
        None => trace!(event = %event.kind(), "Event target gone, dropping event"),
    })
}

// ============================================================================
// Late Provider Watcher
// ============================================================================

/// Waits in the background for a provider to be injected.
///
/// Checks with a capped exponential backoff for
/// `late_watch_attempts` attempts, then every `late_watch_period`, and
/// calls `on_found` once with the first provider seen.
pub fn watch_for_provider<F>(host: Arc<dyn Host>, config: Arc<WalletConfig>, on_found: F) -> JoinHandle<()>
where
    F: FnOnce(Arc<dyn Provider>) + Send + 'static,
{
    tokio::spawn(async move {
        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            let delay = if attempt <= config.late_watch_attempts {
                config.late_watch_delay(attempt)
            } else {
                config.late_watch_period
            };
            sleep(delay).await;

            if let Some(provider) = host.provider() {
                info!(attempt, "Late provider detected");
                on_found(provider);
                return;
            }
            trace!(attempt, "Provider still absent");
        }
    })
}

// ============================================================================
// Tests
// ============================================================================
