//! Notification side-channel to the UI layer.
//!
//! The core never renders anything. Every user-visible outcome is emitted
//! as a [`Notification`] into a [`NotificationSink`]; the embedding UI
//! decides how to display it.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::trace;

// ============================================================================
// Severity
// ============================================================================

/// Classified severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Neutral information.
    Info,
    /// Operation succeeded.
    Success,
    /// Recoverable problem the user should act on.
    Warning,
    /// Operation failed.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

// ============================================================================
// Notification
// ============================================================================

/// A message for the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Human-readable message.
    pub message: String,
    /// Severity class.
    pub severity: Severity,
    /// Suggested display duration.
    #[serde(rename = "durationMs", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl Notification {
    /// Creates a notification.
    #[inline]
    #[must_use]
    pub fn new(message: impl Into<String>, severity: Severity, duration: Duration) -> Self {
        Self {
            message: message.into(),
            severity,
            duration,
        }
    }

    /// Returns the display duration in milliseconds.
    #[inline]
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX)
    }
}

fn serialize_millis<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
}

// ============================================================================
// NotificationSink
// ============================================================================

/// Receiver of notifications.
pub trait NotificationSink: Send + Sync {
    /// Delivers one notification. Must not block.
    fn notify(&self, notification: Notification);
}

impl<F> NotificationSink for F
where
    F: Fn(Notification) + Send + Sync,
{
    fn notify(&self, notification: Notification) {
        self(notification);
    }
}

/// Sink that discards everything (still traced).
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&self, notification: Notification) {
        trace!(severity = %notification.severity, message = %notification.message, "Notification dropped");
    }
}

/// Sink that forwards notifications into an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    /// Creates a sink and the receiver the UI reads from.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            trace!("Notification receiver dropped");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use parking_lot::Mutex;

    #[test]
    fn test_channel_sink_delivers_in_order() {
        let (sink, mut rx) = ChannelSink::new();
        sink.notify(Notification::new("a", Severity::Info, Duration::from_secs(4)));
        sink.notify(Notification::new("b", Severity::Error, Duration::from_secs(12)));

        assert_eq!(rx.try_recv().unwrap().message, "a");
        let second = rx.try_recv().unwrap();
        assert_eq!(second.severity, Severity::Error);
        assert_eq!(second.duration_ms(), 12_000);
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.notify(Notification::new("ignored", Severity::Info, Duration::ZERO));
    }

    #[test]
    fn test_closure_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            move |n: Notification| seen.lock().push(n.severity)
        };
        sink.notify(Notification::new("x", Severity::Warning, Duration::ZERO));
        assert_eq!(*seen.lock(), vec![Severity::Warning]);
    }

    #[test]
    fn test_notification_serializes_for_ui() {
        let json = serde_json::to_value(Notification::new(
            "Wallet reconnected",
            Severity::Success,
            Duration::from_millis(4000),
        ))
        .unwrap();
        assert_eq!(json["severity"], "success");
        assert_eq!(json["durationMs"], 4000);
    }
}
