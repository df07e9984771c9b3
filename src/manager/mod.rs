//! Wallet connection manager.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ConnectionManager`] | Connect, disconnect, watchdog, restore |
//! | [`ConnectionManagerBuilder`] | Fluent configuration builder |
//! | [`ConnectFailure`] | User-facing class of a failed connect |
//! | [`RestoreOutcome`] | Result of a session restore |
//! | [`TickOutcome`] | Result of a watchdog check |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for manager configuration.
pub mod builder;

/// Core manager implementation.
pub mod core;

/// Operation outcomes and notification messages.
pub mod outcome;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ConnectionManagerBuilder;
pub use core::ConnectionManager;
pub use outcome::{ConnectFailure, RestoreOutcome, TickOutcome, UNAVAILABLE_REASON, UNAVAILABLE_SUGGESTIONS};
