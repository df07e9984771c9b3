//! Outcomes of manager operations and their user-facing messages.

// ============================================================================
// Imports
// ============================================================================

use crate::detection::FailureReport;
use crate::error::Error;
use crate::identifiers::Address;
use crate::notify::Severity;

// ============================================================================
// Messages
// ============================================================================

pub(crate) const MSG_DISCONNECTED: &str = "Wallet disconnected";
pub(crate) const MSG_CONNECTED_VIA_EVENT: &str = "Wallet connected via event";
pub(crate) const MSG_ACCOUNT_CHANGED: &str = "Wallet account changed";
pub(crate) const MSG_RECONNECTED: &str = "Wallet reconnected";
pub(crate) const MSG_CONNECTION_LOST: &str = "Wallet connection lost. Please connect again.";
pub(crate) const MSG_WELCOME_BACK: &str = "Welcome back! Wallet reconnected";
pub(crate) const MSG_SESSION_EXPIRED: &str = "Previous wallet connection expired. Please connect again.";

/// Reason shown when the provider vanished between detection and connect.
pub const UNAVAILABLE_REASON: &str = "Extension not properly loaded during connection";

/// Remediation steps for [`UNAVAILABLE_REASON`].
pub const UNAVAILABLE_SUGGESTIONS: [&str; 3] = [
    "Refresh the page completely",
    "Check if the wallet extension is enabled",
    "Try manual connection via extension first",
];

pub(crate) fn connected_message(strategy: &str) -> String {
    format!("Wallet connected successfully using {strategy}!")
}

// ============================================================================
// ConnectFailure
// ============================================================================

/// User-facing class of a failed connect attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectFailure {
    /// The user declined in the wallet.
    Rejected,
    /// The provider did not answer in time.
    Timeout,
    /// Detection succeeded but the provider could not be reached.
    Unavailable,
    /// Any other provider failure, with its reason.
    Other(String),
}

impl ConnectFailure {
    /// Classifies a connect error.
    ///
    /// Returns `None` for errors that carry their own report
    /// (detection failures) or need no message (superseded attempts).
    #[must_use]
    pub fn classify(error: &Error) -> Option<Self> {
        match error {
            Error::DetectionFailure { .. } | Error::Superseded { .. } => None,
            Error::UserRejected { .. } => Some(Self::Rejected),
            Error::ConnectionTimeout { .. } => Some(Self::Timeout),
            Error::ProviderUnavailable { .. } => Some(Self::Unavailable),
            Error::Provider { message, .. }
                if message.contains("not found") || message.contains("undefined") =>
            {
                Some(Self::Unavailable)
            }
            Error::Provider { message, .. } => Some(Self::Other(message.clone())),
            other => Some(Self::Other(other.to_string())),
        }
    }

    /// Returns the notification severity.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::Rejected => Severity::Warning,
            Self::Timeout | Self::Unavailable | Self::Other(_) => Severity::Error,
        }
    }

    /// Returns `true` if the message is a troubleshooting report.
    #[inline]
    #[must_use]
    pub fn is_report(&self) -> bool {
        matches!(self, Self::Unavailable)
    }

    /// Returns the notification text.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Rejected => "Connection request rejected. Please approve the connection in your \
                               wallet extension and try again."
                .to_string(),
            Self::Timeout => {
                "Connection timeout. Please check your wallet extension and try again.".to_string()
            }
            Self::Unavailable => FailureReport::new(UNAVAILABLE_REASON, UNAVAILABLE_SUGGESTIONS).render(),
            Self::Other(reason) => format!("Connection failed: {reason}. Please try again."),
        }
    }
}

// ============================================================================
// RestoreOutcome
// ============================================================================

/// Result of [`ConnectionManager::restore_session`](super::ConnectionManager::restore_session).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Nothing was persisted.
    NoSession,
    /// The session was too old or unreadable and has been deleted.
    Expired,
    /// The wallet reconnected silently.
    Restored(Address),
    /// Silent reconnect failed; the session has been deleted.
    Failed,
    /// A connection was already established; nothing was touched.
    AlreadyActive,
}

// ============================================================================
// TickOutcome
// ============================================================================

/// Result of one watchdog check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not connected; nothing to watch.
    Idle,
    /// Connected and the provider is still there.
    Healthy,
    /// A previous reconnect is still in flight.
    Skipped,
    /// The provider was lost and the connection re-established.
    Reconnected(Address),
    /// The provider was lost and reconnecting failed; state was cleared.
    Failed,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::detection::DetectionResult;
    use crate::identifiers::Generation;

    #[test]
    fn test_classify_rejection() {
        let failure = ConnectFailure::classify(&Error::user_rejected("no")).unwrap();
        assert_eq!(failure, ConnectFailure::Rejected);
        assert_eq!(failure.severity(), Severity::Warning);
        assert!(failure.message().starts_with("Connection request rejected"));
    }

    #[test]
    fn test_classify_timeout() {
        let failure = ConnectFailure::classify(&Error::connection_timeout(10_000)).unwrap();
        assert_eq!(failure, ConnectFailure::Timeout);
        assert_eq!(failure.severity(), Severity::Error);
    }

    #[test]
    fn test_classify_missing_provider_renders_report() {
        let failure = ConnectFailure::classify(&Error::provider(None, "solana is undefined")).unwrap();
        assert!(failure.is_report());

        let text = failure.message();
        assert!(text.starts_with(UNAVAILABLE_REASON));
        assert!(text.contains("QUICK FIXES:\n- Refresh the page completely"));
        assert!(!text.contains("DETAILED DEBUG"));
    }

    #[test]
    fn test_classify_other() {
        let failure = ConnectFailure::classify(&Error::provider(Some(-32603), "Internal error")).unwrap();
        assert_eq!(
            failure.message(),
            "Connection failed: Internal error. Please try again."
        );
    }

    #[test]
    fn test_no_message_for_superseded_or_detection() {
        assert!(ConnectFailure::classify(&Error::superseded(Generation::INITIAL)).is_none());
        let detection = Error::detection_failure(DetectionResult::not_found_for_test("x"));
        assert!(ConnectFailure::classify(&detection).is_none());
    }

    #[test]
    fn test_connected_message() {
        assert_eq!(
            connected_message("Primary Check"),
            "Wallet connected successfully using Primary Check!"
        );
    }
}
