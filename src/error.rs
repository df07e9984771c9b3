//! Error types for wallet-bridge.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use wallet_bridge::{ConnectionManager, Result};
//!
//! async fn example(manager: &ConnectionManager) -> Result<()> {
//!     let address = manager.connect().await?;
//!     println!("connected as {address}");
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Detection | [`Error::DetectionFailure`] |
//! | Connection | [`Error::ConnectionTimeout`], [`Error::UserRejected`], [`Error::Provider`], [`Error::ProviderUnavailable`], [`Error::Superseded`] |
//! | Session | [`Error::StaleSession`] |
//! | Events | [`Error::SubscriptionFailure`] |
//! | Configuration | [`Error::Config`] |
//! | Storage | [`Error::Storage`], [`Error::Io`], [`Error::Json`] |
//!
//! None of these are fatal: every failure is local to the attempt that
//! produced it and the caller may simply try again.

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;

use crate::detection::DetectionResult;
use crate::identifiers::Generation;

// ============================================================================
// Constants
// ============================================================================

/// EIP-1193 style code providers use for "user rejected the request".
pub const USER_REJECTED_CODE: i64 = 4001;

/// Error name injected providers use for a declined connection.
pub const USER_REJECTED_NAME: &str = "UserRejectedRequestError";

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Detection Errors
    // ========================================================================
    /// No detection strategy found a provider after every retry.
    ///
    /// Carries the full not-found [`DetectionResult`] with remediation
    /// steps and the diagnostics bundle.
    #[error("Detection failed: {}", .result.reason.as_deref().unwrap_or("no provider found"))]
    DetectionFailure {
        /// The not-found detection result.
        result: Box<DetectionResult>,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Provider connect call exceeded the timeout.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// The user declined the connection request in the wallet.
    #[error("User rejected the request: {message}")]
    UserRejected {
        /// Message reported by the provider.
        message: String,
    },

    /// Provider rejected the connection for another reason.
    #[error("Provider error: {message}")]
    Provider {
        /// Numeric error code reported by the provider, if any.
        code: Option<i64>,
        /// Message reported by the provider.
        message: String,
    },

    /// Detection succeeded but no provider object was reachable.
    ///
    /// Happens when only indirect signals (storage traces) matched, or the
    /// provider vanished between detection and connect.
    #[error("Provider unavailable: {message}")]
    ProviderUnavailable {
        /// Description of what was missing.
        message: String,
    },

    /// A newer attempt or a disconnect overtook this attempt.
    #[error("Connection attempt {generation} was superseded")]
    Superseded {
        /// Generation of the overtaken attempt.
        generation: u64,
    },

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// Persisted session is too old or could not be restored.
    #[error("Stale session: {message}")]
    StaleSession {
        /// Why the session was discarded.
        message: String,
    },

    // ========================================================================
    // Event Errors
    // ========================================================================
    /// Setting up a provider event listener failed.
    #[error("Subscription to '{event}' failed: {message}")]
    SubscriptionFailure {
        /// Event name that could not be subscribed.
        event: String,
        /// Failure description.
        message: String,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Storage Errors
    // ========================================================================
    /// Key-value store failure.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a detection failure from a not-found result.
    #[inline]
    pub fn detection_failure(result: DetectionResult) -> Self {
        Self::DetectionFailure {
            result: Box::new(result),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a user rejected error.
    #[inline]
    pub fn user_rejected(message: impl Into<String>) -> Self {
        Self::UserRejected {
            message: message.into(),
        }
    }

    /// Creates a provider error, classifying user rejections by code.
    #[inline]
    pub fn provider(code: Option<i64>, message: impl Into<String>) -> Self {
        if code == Some(USER_REJECTED_CODE) {
            return Self::user_rejected(message);
        }
        Self::Provider {
            code,
            message: message.into(),
        }
    }

    /// Creates a provider error from a named JavaScript-style error.
    ///
    /// `UserRejectedRequestError` maps to [`Error::UserRejected`].
    pub fn from_named(name: &str, message: impl Into<String>) -> Self {
        if name == USER_REJECTED_NAME {
            Self::user_rejected(message)
        } else {
            Self::provider(None, message)
        }
    }

    /// Creates a provider unavailable error.
    #[inline]
    pub fn provider_unavailable(message: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            message: message.into(),
        }
    }

    /// Creates a superseded attempt error.
    #[inline]
    pub fn superseded(generation: Generation) -> Self {
        Self::Superseded {
            generation: generation.as_u64(),
        }
    }

    /// Creates a stale session error.
    #[inline]
    pub fn stale_session(message: impl Into<String>) -> Self {
        Self::StaleSession {
            message: message.into(),
        }
    }

    /// Creates a subscription failure.
    #[inline]
    pub fn subscription_failure(event: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SubscriptionFailure {
            event: event.into(),
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a storage error.
    #[inline]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ConnectionTimeout { .. })
    }

    /// Returns `true` if the user declined the request.
    #[inline]
    #[must_use]
    pub fn is_user_rejected(&self) -> bool {
        matches!(self, Self::UserRejected { .. })
    }

    /// Returns `true` if detection found no provider.
    #[inline]
    #[must_use]
    pub fn is_detection_failure(&self) -> bool {
        matches!(self, Self::DetectionFailure { .. })
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed when the user tries again.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DetectionFailure { .. }
                | Self::ConnectionTimeout { .. }
                | Self::UserRejected { .. }
                | Self::Provider { .. }
                | Self::ProviderUnavailable { .. }
                | Self::Superseded { .. }
                | Self::StaleSession { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::connection_timeout(10_000);
        assert_eq!(err.to_string(), "Connection timeout after 10000ms");
    }

    #[test]
    fn test_config_error() {
        let err = Error::config("retries must be non-zero");
        assert_eq!(
            err.to_string(),
            "Configuration error: retries must be non-zero"
        );
    }

    #[test]
    fn test_provider_code_4001_is_user_rejected() {
        let err = Error::provider(Some(USER_REJECTED_CODE), "User rejected the request.");
        assert!(err.is_user_rejected());

        let other = Error::provider(Some(-32603), "Internal error");
        assert!(!other.is_user_rejected());
    }

    #[test]
    fn test_named_rejection_is_user_rejected() {
        assert!(Error::from_named(USER_REJECTED_NAME, "declined").is_user_rejected());
        assert!(!Error::from_named("WalletNotReadyError", "not ready").is_user_rejected());
    }

    #[test]
    fn test_is_timeout() {
        assert!(Error::connection_timeout(5000).is_timeout());
        assert!(!Error::user_rejected("no").is_timeout());
    }

    #[test]
    fn test_detection_failure_display_uses_reason() {
        let err = Error::detection_failure(DetectionResult::not_found_for_test("nothing injected"));
        assert_eq!(err.to_string(), "Detection failed: nothing injected");
        assert!(err.is_detection_failure());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::connection_timeout(1000).is_recoverable());
        assert!(Error::stale_session("too old").is_recoverable());
        assert!(!Error::config("bad").is_recoverable());
        assert!(!Error::subscription_failure("connect", "boom").is_recoverable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = json_err.into();
        assert!(err.to_string().starts_with("JSON error"));
    }
}
