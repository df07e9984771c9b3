//! Test doubles shared by the unit tests.
//!
//! - [`MockProvider`]: scriptable provider with call counters and an event emitter
//! - [`CountingStrategy`], [`FixedStrategy`], [`PanickingStrategy`]: strategy spies
//! - [`ManualClock`]: pinned wall clock
//! - [`RecordingSink`]: notification recorder

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::clock::Clock;
use crate::detection::{DetectionStrategy, ProbeContext};
use crate::error::{Error, Result};
use crate::notify::{Notification, NotificationSink, Severity};
use crate::provider::{ConnectResponse, EventHandler, EventKind, Provider, ProviderEvent};

/// Installs a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// MockProvider
// ============================================================================

/// How [`MockProvider::connect`] behaves.
#[derive(Debug, Clone)]
pub enum ConnectBehavior {
    /// Resolve immediately with the configured address.
    Succeed,
    /// Reject as declined by the user.
    Reject,
    /// Reject with a provider error.
    Fail(String),
    /// Wait until [`MockProvider::release`] is called.
    Hang,
    /// Resolve after a delay.
    Delay(Duration),
}

/// Scriptable provider.
pub struct MockProvider {
    address: String,
    flagged: bool,
    has_connect: bool,
    faulty_flag: bool,
    events: bool,
    failing_subscription: bool,
    behavior: Mutex<ConnectBehavior>,
    gate: Notify,
    connect_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
    handlers: Mutex<Vec<(EventKind, EventHandler)>>,
}

impl MockProvider {
    fn build(address: &str, flagged: bool) -> Self {
        Self {
            address: address.to_string(),
            flagged,
            has_connect: true,
            faulty_flag: false,
            events: true,
            failing_subscription: false,
            behavior: Mutex::new(ConnectBehavior::Succeed),
            gate: Notify::new(),
            connect_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
            handlers: Mutex::new(Vec::new()),
        }
    }

    /// Flagged provider that connects as `address`.
    pub fn phantom(address: &str) -> Self {
        Self::build(address, true)
    }

    /// Provider without the identity flag.
    pub fn unflagged(address: &str) -> Self {
        Self::build(address, false)
    }

    /// Makes every flag read fail.
    pub fn with_faulty_flag(mut self) -> Self {
        self.faulty_flag = true;
        self
    }

    /// Removes the `on` capability.
    pub fn without_events(mut self) -> Self {
        self.events = false;
        self
    }

    /// Makes every `on` call fail.
    pub fn with_failing_subscription(mut self) -> Self {
        self.failing_subscription = true;
        self
    }

    /// Sets the connect behavior.
    pub fn with_behavior(self, behavior: ConnectBehavior) -> Self {
        *self.behavior.lock() = behavior;
        self
    }

    /// Lets one hanging connect call resolve.
    pub fn release(&self) {
        self.gate.notify_one();
    }

    /// Number of connect calls so far.
    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    /// Number of disconnect calls so far.
    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    /// Number of handlers registered for `kind`.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.lock().iter().filter(|(k, _)| *k == kind).count()
    }

    /// Fires `event` to every matching handler.
    pub fn emit(&self, event: ProviderEvent) {
        let handlers = self.handlers.lock();
        for (kind, handler) in handlers.iter() {
            if *kind == event.kind() {
                handler(event.clone());
            }
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn is_flagged(&self) -> Result<bool> {
        if self.faulty_flag {
            return Err(Error::provider(None, "flag read threw"));
        }
        Ok(self.flagged)
    }

    fn has_connect(&self) -> Result<bool> {
        Ok(self.has_connect)
    }

    async fn connect(&self) -> Result<ConnectResponse> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.behavior.lock().clone();
        match behavior {
            ConnectBehavior::Succeed => {}
            ConnectBehavior::Reject => {
                return Err(Error::from_named(
                    crate::error::USER_REJECTED_NAME,
                    "User rejected the request.",
                ));
            }
            ConnectBehavior::Fail(message) => return Err(Error::provider(None, message)),
            ConnectBehavior::Hang => self.gate.notified().await,
            ConnectBehavior::Delay(delay) => tokio::time::sleep(delay).await,
        }
        Ok(ConnectResponse::new(self.address.clone()))
    }

    fn supports_events(&self) -> bool {
        self.events
    }

    fn on(&self, event: EventKind, handler: EventHandler) -> Result<()> {
        if self.failing_subscription {
            return Err(Error::subscription_failure(event.as_str(), "listener rejected"));
        }
        self.handlers.lock().push((event, handler));
        Ok(())
    }

    fn supports_disconnect(&self) -> bool {
        true
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Strategy Spies
// ============================================================================

/// Wraps a strategy and counts invocations.
pub struct CountingStrategy {
    inner: Arc<dyn DetectionStrategy>,
    calls: AtomicUsize,
}

impl CountingStrategy {
    pub fn new(inner: Arc<dyn DetectionStrategy>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DetectionStrategy for CountingStrategy {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    async fn test(&self, ctx: &ProbeContext) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.test(ctx).await
    }
}

/// Always returns a fixed verdict and records when it ran.
pub struct FixedStrategy {
    verdict: bool,
    calls: Mutex<Vec<Instant>>,
}

impl FixedStrategy {
    pub fn new(verdict: bool) -> Self {
        Self {
            verdict,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl DetectionStrategy for FixedStrategy {
    fn name(&self) -> &str {
        "Fixed"
    }

    fn description(&self) -> &str {
        "Fixed verdict"
    }

    async fn test(&self, _ctx: &ProbeContext) -> Result<bool> {
        self.calls.lock().push(Instant::now());
        Ok(self.verdict)
    }
}

/// Panics when run.
pub struct PanickingStrategy;

#[async_trait]
impl DetectionStrategy for PanickingStrategy {
    fn name(&self) -> &str {
        "Panicking"
    }

    fn description(&self) -> &str {
        "Always panics"
    }

    async fn test(&self, _ctx: &ProbeContext) -> Result<bool> {
        panic!("strategy blew up");
    }
}

// ============================================================================
// ManualClock
// ============================================================================

/// Wall clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Starts at 2024-01-01T00:00:00Z.
    pub fn new() -> Self {
        Self::at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }

    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += chrono::Duration::from_std(by).unwrap();
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

// ============================================================================
// RecordingSink
// ============================================================================

/// Records every notification.
#[derive(Default)]
pub struct RecordingSink {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.seen.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn severities(&self) -> Vec<Severity> {
        self.seen.lock().iter().map(|n| n.severity).collect()
    }

    pub fn last(&self) -> Option<Notification> {
        self.seen.lock().last().cloned()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        self.seen.lock().push(notification);
    }
}
