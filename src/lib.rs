//! Wallet Bridge - resilient browser wallet detection and connection.
//!
//! This library finds an injected wallet provider that may arrive late or
//! not at all, connects to it with a bounded timeout, keeps the connection
//! alive and restores it across restarts.
//!
//! # Architecture
//!
//! - **Detection**: five independent strategies run in priority order
//!   across bounded retries with exponential backoff
//! - **Connection**: a single state owner tags each attempt with a
//!   generation so late completions never overwrite newer state
//! - **Events**: provider `connect` / `disconnect` / `accountChanged`
//!   signals feed the same transitions, attached once per provider
//! - **Persistence**: the last connection is stored in a key-value store
//!   and silently restored while fresh
//!
//! Nothing here renders UI: every user-visible outcome is a
//! [`Notification`] delivered to a [`NotificationSink`].
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use wallet_bridge::{ChannelSink, ConnectionManager, InjectedHost, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let host = Arc::new(InjectedHost::new());
//!     let (sink, mut notifications) = ChannelSink::new();
//!
//!     let manager = ConnectionManager::builder()
//!         .host(host.clone())
//!         .sink(Arc::new(sink))
//!         .build()?;
//!
//!     // Attach listeners and restore the previous session, if any
//!     manager.initialize().await?;
//!
//!     let address = manager.connect().await?;
//!     println!("Connected: {}", address.short());
//!
//!     while let Some(n) = notifications.recv().await {
//!         println!("[{}] {}", n.severity, n.message);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bridge`] | Provider event subscriptions and late provider watcher |
//! | [`clock`] | Wall clock abstraction for timestamps |
//! | [`config`] | Timing and matching configuration |
//! | [`detection`] | Strategies, orchestrator and detection results |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`host`] | Environment the provider is injected into |
//! | [`identifiers`] | Address and attempt generation newtypes |
//! | [`manager`] | [`ConnectionManager`] and its builder |
//! | [`notify`] | Notification side-channel |
//! | [`provider`] | Injected provider surface and events |
//! | [`state`] | Connection state and transitions |
//! | [`storage`] | Key-value stores and the persisted session |

// ============================================================================
// Modules
// ============================================================================

/// Provider event subscriptions.
///
/// Listeners are attached once per provider object.
pub mod bridge;

/// Wall clock abstraction.
pub mod clock;

/// Timing and matching configuration.
pub mod config;

/// Provider detection strategies and orchestrator.
pub mod detection;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Provider environment.
pub mod host;

/// Type-safe identifiers.
pub mod identifiers;

/// Connection manager.
///
/// Use [`ConnectionManager::builder()`] to create a configured instance.
pub mod manager;

/// Notification side-channel to the UI layer.
pub mod notify;

/// Injected provider surface.
pub mod provider;

/// Connection state machine.
pub mod state;

/// Session persistence.
pub mod storage;

#[cfg(test)]
mod testing;

// ============================================================================
// Re-exports
// ============================================================================

// Bridge types
pub use bridge::{EventBridge, EventTarget, watch_for_provider};

// Clock types
pub use clock::{Clock, SystemClock};

// Configuration
pub use config::WalletConfig;

// Detection types
pub use detection::{
    DetectionOrchestrator, DetectionResult, DetectionStrategy, DiagnosticValue, Diagnostics,
    FailureReport, ProbeContext,
};

// Error types
pub use error::{Error, Result};

// Host types
pub use host::{Host, InjectedHost};

// Identifier types
pub use identifiers::{Address, Generation};

// Manager types
pub use manager::{
    ConnectFailure, ConnectionManager, ConnectionManagerBuilder, RestoreOutcome, TickOutcome,
};

// Notification types
pub use notify::{ChannelSink, Notification, NotificationSink, NullSink, Severity};

// Provider types
pub use provider::{ConnectResponse, EventHandler, EventKind, Provider, ProviderEvent};

// State types
pub use state::{ConnectionState, WalletState};

// Storage types
pub use storage::{FileStore, KeyValueStore, MemoryStore, PersistedSession, SessionLookup, SessionStore};
