//! Injected wallet provider surface.
//!
//! The provider is an object injected into the host environment by a wallet
//! extension. This crate never owns it: the [`Host`](crate::Host) hands out
//! shared references, and the connection manager keeps only a weak one.
//!
//! Every capability access is fallible. Implementations backed by a real
//! page may fail on any property read, so even the identity flag returns a
//! [`Result`].
//!
//! # Events
//!
//! | Event | Payload | Meaning |
//! |-------|---------|---------|
//! | `connect` | account or null | Provider connected |
//! | `disconnect` | none | Provider dropped the connection |
//! | `accountChanged` | account or null | User switched account (null = locked) |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::Address;

// ============================================================================
// Types
// ============================================================================

/// Event handler callback type.
///
/// Called once per event emitted by the provider.
pub type EventHandler = Box<dyn Fn(ProviderEvent) + Send + Sync>;

// ============================================================================
// Provider
// ============================================================================

/// Capabilities of an injected wallet provider.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Reads the identity flag (e.g. `isPhantom`).
    fn is_flagged(&self) -> Result<bool>;

    /// Returns `true` if the provider exposes a callable `connect`.
    fn has_connect(&self) -> Result<bool>;

    /// Requests a connection, usually prompting the user.
    async fn connect(&self) -> Result<ConnectResponse>;

    /// Returns `true` if the provider exposes a generic `on(event, handler)`.
    fn supports_events(&self) -> bool {
        false
    }

    /// Registers `handler` for `event`.
    ///
    /// # Errors
    ///
    /// [`Error::SubscriptionFailure`] if the provider refuses the listener.
    fn on(&self, event: EventKind, handler: EventHandler) -> Result<()> {
        drop(handler);
        Err(Error::subscription_failure(
            event.as_str(),
            "provider does not support event subscription",
        ))
    }

    /// Returns `true` if the provider exposes a `disconnect` call.
    fn supports_disconnect(&self) -> bool {
        false
    }

    /// Asks the provider to drop the connection.
    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// ConnectResponse
// ============================================================================

/// Value resolved by a successful provider `connect` call.
///
/// Accepts both `{ "address": .. }` and `{ "publicKey": .. }` shapes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectResponse {
    /// Account identifier as reported by the provider.
    #[serde(alias = "publicKey")]
    pub address: String,
}

impl ConnectResponse {
    /// Creates a response for `address`.
    #[inline]
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    /// Parses the account from the response.
    ///
    /// # Errors
    ///
    /// [`Error::Provider`] if the provider resolved with a blank account.
    pub fn account(&self) -> Result<Address> {
        Address::new(self.address.as_str())
            .ok_or_else(|| Error::provider(None, "provider returned an empty account"))
    }
}

// ============================================================================
// EventKind
// ============================================================================

/// Names of the provider lifecycle events this crate listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `connect`
    Connect,
    /// `disconnect`
    Disconnect,
    /// `accountChanged`
    AccountChanged,
}

impl EventKind {
    /// All subscribed events, in subscription order.
    pub const ALL: [Self; 3] = [Self::AccountChanged, Self::Connect, Self::Disconnect];

    /// Returns the provider-side event name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::AccountChanged => "accountChanged",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "connect" => Ok(Self::Connect),
            "disconnect" => Ok(Self::Disconnect),
            "accountChanged" => Ok(Self::AccountChanged),
            other => Err(Error::subscription_failure(other, "unknown provider event")),
        }
    }
}

// ============================================================================
// ProviderEvent
// ============================================================================

/// A lifecycle event emitted by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// Provider connected, possibly reporting the account.
    Connect(Option<Address>),
    /// Provider disconnected.
    Disconnect,
    /// Active account changed; `None` means no account is available.
    AccountChanged(Option<Address>),
}

impl ProviderEvent {
    /// Returns the event kind.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connect(_) => EventKind::Connect,
            Self::Disconnect => EventKind::Disconnect,
            Self::AccountChanged(_) => EventKind::AccountChanged,
        }
    }

    /// Builds an event from a raw payload.
    ///
    /// The account may arrive as a bare string, as an object carrying
    /// `publicKey` or `address`, or as `null`.
    #[must_use]
    pub fn parse(kind: EventKind, payload: &Value) -> Self {
        match kind {
            EventKind::Connect => Self::Connect(account_from_payload(payload)),
            EventKind::Disconnect => Self::Disconnect,
            EventKind::AccountChanged => Self::AccountChanged(account_from_payload(payload)),
        }
    }
}

/// Extracts an account from an event payload.
fn account_from_payload(payload: &Value) -> Option<Address> {
    match payload {
        Value::String(s) => Address::new(s.as_str()),
        Value::Object(map) => map
            .get("publicKey")
            .or_else(|| map.get("address"))
            .and_then(Value::as_str)
            .and_then(Address::new),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================
