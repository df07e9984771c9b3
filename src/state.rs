//! Connection state and its transitions.
//!
//! [`WalletState`] is the single owner of the connection state, the
//! connected address, the (weak) provider reference and the attempt
//! generation. It is only changed through the transition methods below,
//! each of which keeps those four fields consistent.
//!
//! # Transitions
//!
//! ```text
//! Disconnected --begin_detection--> Detecting --begin_connecting--> Connecting
//! Connecting   --complete_connect--> Connected
//! Connecting   --fail_attempt-----> Disconnected
//! Connected    --begin_reconnect--> Reconnecting
//! Reconnecting --complete_connect--> Connected | --fail_attempt--> Disconnected
//! any          --apply_disconnected--> Disconnected
//! any          --apply_connected--> Connected          (provider events)
//! ```
//!
//! Attempt completions carry the [`Generation`] they started with; once a
//! newer attempt has begun or the attempt was abandoned, the completion is
//! refused.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use tokio::sync::watch;
use tracing::{debug, trace};

use crate::identifiers::{Address, Generation};
use crate::provider::Provider;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of the wallet connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No connection and no attempt in progress.
    #[default]
    Disconnected,
    /// Detection is running.
    Detecting,
    /// Provider connect call is outstanding.
    Connecting,
    /// Connected with a known address.
    Connected,
    /// Watchdog is re-establishing a dropped connection.
    Reconnecting,
}

impl ConnectionState {
    /// Returns `true` while an attempt is outstanding.
    #[inline]
    #[must_use]
    pub const fn is_busy(self) -> bool {
        matches!(self, Self::Detecting | Self::Connecting | Self::Reconnecting)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Detecting => "detecting",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        })
    }
}

// ============================================================================
// WalletState
// ============================================================================

/// Owner of the process-wide connection state.
pub struct WalletState {
    /// Current state.
    state: ConnectionState,
    /// Connected account; `Some` exactly when `state` is `Connected`.
    address: Option<Address>,
    /// Non-owning provider reference.
    provider: Option<Weak<dyn Provider>>,
    /// Tag of the newest attempt.
    generation: Generation,
    /// Number of applied transitions.
    transitions: u64,
    /// Publishes every state change.
    publisher: watch::Sender<ConnectionState>,
}

impl fmt::Debug for WalletState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletState")
            .field("state", &self.state)
            .field("address", &self.address)
            .field("generation", &self.generation)
            .field("transitions", &self.transitions)
            .finish_non_exhaustive()
    }
}

impl Default for WalletState {
    fn default() -> Self {
        Self::new()
    }
}

impl WalletState {
    /// Creates the initial `Disconnected` state.
    #[must_use]
    pub fn new() -> Self {
        let (publisher, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            state: ConnectionState::Disconnected,
            address: None,
            provider: None,
            generation: Generation::INITIAL,
            transitions: 0,
            publisher,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns the connected address.
    #[inline]
    #[must_use]
    pub fn address(&self) -> Option<&Address> {
        self.address.as_ref()
    }

    /// Returns the provider if it still exists.
    #[must_use]
    pub fn provider(&self) -> Option<Arc<dyn Provider>> {
        self.provider.as_ref().and_then(Weak::upgrade)
    }

    /// Returns the newest attempt generation.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Returns `true` if `generation` is still the newest attempt.
    #[inline]
    #[must_use]
    pub fn is_current(&self, generation: Generation) -> bool {
        self.generation == generation
    }

    /// Returns the number of transitions applied so far.
    #[inline]
    #[must_use]
    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.publisher.subscribe()
    }

    // ========================================================================
    // Attempt Transitions
    // ========================================================================

    /// Starts a new attempt, superseding any outstanding one.
    pub fn begin_detection(&mut self) -> Generation {
        self.generation = self.generation.next();
        self.set(ConnectionState::Detecting);
        self.generation
    }

    /// Moves a detected attempt to `Connecting` with `provider`.
    ///
    /// Returns `false` if the attempt is stale.
    pub fn begin_connecting(&mut self, generation: Generation, provider: &Arc<dyn Provider>) -> bool {
        if !self.accepts(generation, &[ConnectionState::Detecting]) {
            return false;
        }
        self.provider = Some(Arc::downgrade(provider));
        self.set(ConnectionState::Connecting);
        true
    }

    /// Starts a watchdog reconnect from `Connected`.
    ///
    /// Returns `None` if the state is not `Connected`.
    pub fn begin_reconnect(&mut self) -> Option<Generation> {
        if self.state != ConnectionState::Connected {
            return None;
        }
        self.generation = self.generation.next();
        self.provider = None;
        self.set(ConnectionState::Reconnecting);
        Some(self.generation)
    }

    /// Finishes an attempt successfully.
    ///
    /// Returns `false` if the attempt is stale; state is left untouched.
    pub fn complete_connect(
        &mut self,
        generation: Generation,
        provider: &Arc<dyn Provider>,
        address: Address,
    ) -> bool {
        let accepted = [
            ConnectionState::Connecting,
            ConnectionState::Reconnecting,
            ConnectionState::Connected,
        ];
        if !self.accepts(generation, &accepted) {
            return false;
        }
        self.provider = Some(Arc::downgrade(provider));
        self.address = Some(address);
        self.set(ConnectionState::Connected);
        true
    }

    /// Abandons an attempt (failure, rejection or timeout).
    ///
    /// Bumps the generation so the attempt's late completion is refused.
    /// Returns `false` if the attempt was already stale.
    pub fn fail_attempt(&mut self, generation: Generation) -> bool {
        if !self.is_current(generation) {
            trace!(%generation, current = %self.generation, "Ignoring failure of stale attempt");
            return false;
        }
        self.generation = self.generation.next();
        self.clear();
        true
    }

    // ========================================================================
    // Event Transitions
    // ========================================================================

    /// Applies a provider-reported connection with `address`.
    ///
    /// Does not bump the generation: providers commonly emit `connect`
    /// just before their connect call resolves. Returns `false` if already
    /// connected with the same address.
    pub fn apply_connected(&mut self, address: Address, provider: Option<&Arc<dyn Provider>>) -> bool {
        if self.state == ConnectionState::Connected && self.address.as_ref() == Some(&address) {
            return false;
        }
        if let Some(provider) = provider {
            self.provider = Some(Arc::downgrade(provider));
        }
        self.address = Some(address);
        self.set(ConnectionState::Connected);
        true
    }

    /// Applies a disconnect from any state.
    ///
    /// Invalidates any outstanding attempt. Returns `false` if already
    /// disconnected with nothing in flight.
    pub fn apply_disconnected(&mut self) -> bool {
        if self.state == ConnectionState::Disconnected {
            return false;
        }
        self.generation = self.generation.next();
        self.clear();
        true
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Checks generation and source state for an attempt transition.
    fn accepts(&self, generation: Generation, from: &[ConnectionState]) -> bool {
        if !self.is_current(generation) {
            debug!(%generation, current = %self.generation, "Discarding stale attempt");
            return false;
        }
        if !from.contains(&self.state) {
            debug!(%generation, state = %self.state, "Attempt transition from unexpected state");
            return false;
        }
        true
    }

    /// Resets to `Disconnected`, dropping address and provider.
    fn clear(&mut self) {
        self.address = None;
        self.provider = None;
        self.set(ConnectionState::Disconnected);
    }

    /// Records a state change.
    fn set(&mut self, next: ConnectionState) {
        let previous = self.state;
        self.state = next;
        self.transitions += 1;
        debug!(from = %previous, to = %next, generation = %self.generation, "State transition");
        self.publisher.send_replace(next);
    }
}

// ============================================================================
// Tests
// ============================================================================
