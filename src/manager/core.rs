//! Connection manager: the only writer of the wallet connection state.
//!
//! The [`ConnectionManager`] drives user connects, the reconnection
//! watchdog, session restore at startup and provider events. Every state
//! change goes through [`WalletState`], and every user-visible outcome is
//! sent to the notification sink.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use wallet_bridge::{ConnectionManager, InjectedHost};
//!
//! # async fn example() -> wallet_bridge::Result<()> {
//! let host = Arc::new(InjectedHost::new());
//! let manager = ConnectionManager::builder().host(host).build()?;
//!
//! let address = manager.connect().await?;
//! println!("connected as {}", address.short());
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep, timeout};
use tracing::{debug, info, trace, warn};

use crate::bridge::{EventBridge, EventTarget, watch_for_provider};
use crate::clock::Clock;
use crate::config::WalletConfig;
use crate::detection::DetectionOrchestrator;
use crate::error::{Error, Result};
use crate::host::Host;
use crate::identifiers::{Address, Generation};
use crate::notify::{Notification, NotificationSink, Severity};
use crate::provider::{Provider, ProviderEvent};
use crate::state::{ConnectionState, WalletState};
use crate::storage::{PersistedSession, SessionLookup, SessionStore};

use super::builder::ConnectionManagerBuilder;
use super::outcome::{
    ConnectFailure, MSG_ACCOUNT_CHANGED, MSG_CONNECTED_VIA_EVENT, MSG_CONNECTION_LOST,
    MSG_DISCONNECTED, MSG_RECONNECTED, MSG_SESSION_EXPIRED, MSG_WELCOME_BACK, RestoreOutcome,
    TickOutcome, UNAVAILABLE_REASON, connected_message,
};

// ============================================================================
// Types
// ============================================================================

/// Background tasks owned by the manager.
#[derive(Default)]
struct Tasks {
    /// Reconnection watchdog.
    watchdog: Option<JoinHandle<()>>,
    /// Late provider watcher.
    late_watch: Option<JoinHandle<()>>,
}

impl Tasks {
    fn abort_all(&mut self) {
        for handle in [self.watchdog.take(), self.late_watch.take()].into_iter().flatten() {
            handle.abort();
        }
    }
}

/// Internal shared state for the manager.
pub(crate) struct ManagerInner {
    /// Timing and matching configuration.
    pub config: Arc<WalletConfig>,

    /// Environment the provider lives in.
    pub host: Arc<dyn Host>,

    /// Persisted session access.
    pub sessions: SessionStore,

    /// UI notification side-channel.
    pub sink: Arc<dyn NotificationSink>,

    /// Wall clock for session timestamps.
    pub clock: Arc<dyn Clock>,

    /// Provider detection.
    pub detector: DetectionOrchestrator,

    /// Connection state; never held across an await.
    pub state: Mutex<WalletState>,

    /// Provider event subscriptions.
    pub bridge: EventBridge,

    /// Set while a watchdog reconnect is outstanding.
    reconnect_in_flight: AtomicBool,

    /// Watchdog and late watcher handles.
    tasks: Mutex<Tasks>,
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        self.tasks.get_mut().abort_all();
    }
}

/// Clears the reconnect flag when the reconnect finishes or is cancelled.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ============================================================================
// ConnectionManager
// ============================================================================

/// Owner of the wallet connection.
///
/// Cheap to clone; clones share state. Background tasks stop when the last
/// clone is dropped.
#[derive(Clone)]
pub struct ConnectionManager {
    /// Shared inner state.
    pub(crate) inner: Arc<ManagerInner>,
}

// ============================================================================
// ConnectionManager - Display
// ============================================================================

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ConnectionManager")
            .field("state", &state.state())
            .field("address", &state.address())
            .field("generation", &state.generation())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ConnectionManager - Construction
// ============================================================================

impl ConnectionManager {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ConnectionManagerBuilder {
        ConnectionManagerBuilder::new()
    }

    /// Assembles a manager from validated parts.
    pub(crate) fn from_parts(
        config: Arc<WalletConfig>,
        host: Arc<dyn Host>,
        sessions: SessionStore,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        detector: DetectionOrchestrator,
    ) -> Self {
        let inner = Arc::new(ManagerInner {
            config,
            host,
            sessions,
            sink,
            clock,
            detector,
            state: Mutex::new(WalletState::new()),
            bridge: EventBridge::new(),
            reconnect_in_flight: AtomicBool::new(false),
            tasks: Mutex::new(Tasks::default()),
        });
        Self { inner }
    }
}

// ============================================================================
// ConnectionManager - Accessors
// ============================================================================

impl ConnectionManager {
    /// Returns the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.state.lock().state()
    }

    /// Returns the connected address.
    #[must_use]
    pub fn address(&self) -> Option<Address> {
        self.inner.state.lock().address().cloned()
    }

    /// Returns the connected address in `abcd...wxyz` form.
    #[must_use]
    pub fn short_address(&self) -> Option<String> {
        self.inner.state.lock().address().map(Address::short)
    }

    /// Returns `true` while connected.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Returns the number of state transitions so far.
    #[must_use]
    pub fn transitions(&self) -> u64 {
        self.inner.state.lock().transitions()
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.lock().subscribe()
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &WalletConfig {
        &self.inner.config
    }

    /// Returns `true` while the watchdog task is running.
    #[must_use]
    pub fn is_watchdog_running(&self) -> bool {
        self.inner
            .tasks
            .lock()
            .watchdog
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

// ============================================================================
// ConnectionManager - Connect / Disconnect
// ============================================================================

impl ConnectionManager {
    /// Detects the provider and connects to it.
    ///
    /// Returns the current address without prompting if already connected.
    /// A connect started while another attempt is outstanding supersedes it.
    ///
    /// # Errors
    ///
    /// - [`Error::DetectionFailure`] if no provider was found; the
    ///   provider is never asked to connect in that case
    /// - [`Error::ProviderUnavailable`] if detection matched but no
    ///   provider object is reachable
    /// - [`Error::ConnectionTimeout`] if the provider did not answer in time
    /// - [`Error::UserRejected`] if the user declined
    /// - [`Error::Superseded`] if a newer attempt or a disconnect overtook this one
    pub async fn connect(&self) -> Result<Address> {
        let inner = &self.inner;

        let generation = {
            let mut state = inner.state.lock();
            if state.state() == ConnectionState::Connected
                && let Some(address) = state.address()
            {
                debug!(address = %address.short(), "Already connected");
                return Ok(address.clone());
            }
            state.begin_detection()
        };
        info!(%generation, "Connecting wallet");

        let detection = inner.detector.detect().await;
        if !detection.found {
            if !inner.state.lock().fail_attempt(generation) {
                return Err(Error::superseded(generation));
            }
            inner.notify_for(detection.report().render(), Severity::Error, inner.config.report_duration);
            return Err(Error::detection_failure(detection));
        }
        let strategy = detection.strategy_name.unwrap_or_default();

        let Some(provider) = inner.host.provider() else {
            let err = inner.abandon(generation, Error::provider_unavailable(UNAVAILABLE_REASON));
            inner.report_connect_failure(&err);
            return Err(err);
        };

        if !inner.state.lock().begin_connecting(generation, &provider) {
            return Err(Error::superseded(generation));
        }

        match inner.establish(generation, &provider).await {
            Ok(address) => {
                inner.persist(&address);
                info!(address = %address.short(), strategy = %strategy, "Wallet connected");
                inner.notify(connected_message(&strategy), Severity::Success);
                self.start_watchdog();
                Ok(address)
            }
            Err(e) => {
                inner.report_connect_failure(&e);
                Err(e)
            }
        }
    }

    /// Disconnects the wallet on user request.
    ///
    /// Asks the provider to disconnect when it can (failures are logged),
    /// then clears state, the persisted session and the watchdog.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted session cannot be deleted.
    pub async fn disconnect(&self) -> Result<()> {
        let inner = &self.inner;
        let provider = inner.state.lock().provider().or_else(|| inner.host.provider());

        if let Some(provider) = provider
            && provider.supports_disconnect()
            && let Err(e) = provider.disconnect().await
        {
            warn!(error = %e, "Provider disconnect failed");
        }

        self.stop_watchdog();
        if inner.state.lock().apply_disconnected() {
            inner.notify(MSG_DISCONNECTED, Severity::Warning);
        }
        inner.sessions.clear()
    }

    /// Attaches event listeners to the current provider, if any.
    ///
    /// Returns `true` if listeners were newly attached.
    pub fn attach_listeners(&self) -> bool {
        match self.inner.host.provider() {
            Some(provider) => self.inner.attach_listeners(&provider),
            None => false,
        }
    }
}

// ============================================================================
// ConnectionManager - Watchdog
// ============================================================================

impl ConnectionManager {
    /// Starts the reconnection watchdog. Idempotent.
    ///
    /// Every `watchdog_interval` the manager runs [`check_connection`]
    /// in its own task, so a slow reconnect never delays the next tick.
    ///
    /// [`check_connection`]: Self::check_connection
    pub fn start_watchdog(&self) {
        let mut tasks = self.inner.tasks.lock();
        if tasks.watchdog.as_ref().is_some_and(|handle| !handle.is_finished()) {
            trace!("Watchdog already running");
            return;
        }

        let period = self.inner.config.watchdog_interval;
        let weak = Arc::downgrade(&self.inner);
        tasks.watchdog = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                tokio::spawn(async move {
                    let outcome = inner.check_connection().await;
                    trace!(?outcome, "Watchdog tick");
                });
            }
        }));
        debug!(period_ms = period.as_millis() as u64, "Watchdog started");
    }

    /// Stops the watchdog. Idempotent.
    pub fn stop_watchdog(&self) {
        if let Some(handle) = self.inner.tasks.lock().watchdog.take() {
            handle.abort();
            debug!("Watchdog stopped");
        }
    }

    /// Runs one watchdog check.
    ///
    /// If connected but the provider reference is gone, reconnects to the
    /// host's current provider without running detection. A check that
    /// starts while an earlier reconnect is outstanding does nothing.
    pub async fn check_connection(&self) -> TickOutcome {
        self.inner.check_connection().await
    }
}

// ============================================================================
// ConnectionManager - Startup
// ============================================================================

impl ConnectionManager {
    /// Silently restores the persisted session.
    ///
    /// Sessions older than `session_max_age` (or with an unreadable
    /// timestamp) are deleted without contacting the provider. Otherwise
    /// the provider is detected and asked to connect; any failure deletes
    /// the session and only non-rejection failures are reported.
    ///
    /// # Errors
    ///
    /// - [`Error::Storage`] if the session cannot be read
    /// - [`Error::Superseded`] if another attempt overtook the restore
    pub async fn restore_session(&self) -> Result<RestoreOutcome> {
        let inner = &self.inner;

        if self.is_connected() {
            return Ok(RestoreOutcome::AlreadyActive);
        }

        let session = match inner.sessions.load()? {
            SessionLookup::Absent => return Ok(RestoreOutcome::NoSession),
            SessionLookup::Invalid => {
                info!("Stored session is incomplete, removing");
                inner.forget_session();
                return Ok(RestoreOutcome::Expired);
            }
            SessionLookup::Present(session) => session,
        };

        let now = inner.clock.now();
        if !session.is_fresh(now, inner.config.session_max_age) {
            let stale = Error::stale_session(format!(
                "session is {}s old",
                session.age(now).as_secs()
            ));
            info!(error = %stale, "Stored wallet connection too old, removing");
            inner.forget_session();
            return Ok(RestoreOutcome::Expired);
        }

        let generation = inner.state.lock().begin_detection();
        info!(%generation, address = %session.address.short(), "Restoring wallet session");

        let detection = inner.detector.detect().await;
        let provider = inner
            .host
            .provider()
            .filter(|provider| provider.is_flagged().unwrap_or(false));

        let provider = match provider {
            Some(provider) if detection.found => provider,
            _ => {
                debug!(found = detection.found, "Cannot restore, wallet not available");
                if !inner.state.lock().fail_attempt(generation) {
                    return Err(Error::superseded(generation));
                }
                inner.forget_session();
                return Ok(RestoreOutcome::Failed);
            }
        };

        if !inner.state.lock().begin_connecting(generation, &provider) {
            return Err(Error::superseded(generation));
        }

        match inner.establish(generation, &provider).await {
            Ok(address) => {
                info!(address = %address.short(), "Wallet session restored");
                inner.notify(MSG_WELCOME_BACK, Severity::Success);
                self.start_watchdog();
                Ok(RestoreOutcome::Restored(address))
            }
            Err(e @ Error::Superseded { .. }) => Err(e),
            Err(e) => {
                debug!(error = %e, "Stored wallet reconnect failed");
                inner.forget_session();
                if !e.is_user_rejected() {
                    inner.notify(MSG_SESSION_EXPIRED, Severity::Info);
                }
                Ok(RestoreOutcome::Failed)
            }
        }
    }

    /// Startup sequence.
    ///
    /// Attaches listeners to an already injected provider, or starts the
    /// late provider watcher. Then waits `restore_delay` and restores the
    /// persisted session.
    ///
    /// # Errors
    ///
    /// Same as [`restore_session`](Self::restore_session).
    pub async fn initialize(&self) -> Result<RestoreOutcome> {
        if !self.attach_listeners() && self.inner.host.provider().is_none() {
            self.start_provider_watch();
        }

        sleep(self.inner.config.restore_delay).await;
        self.restore_session().await
    }

    /// Starts the late provider watcher. Idempotent.
    pub fn start_provider_watch(&self) {
        let mut tasks = self.inner.tasks.lock();
        if tasks.late_watch.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let weak = Arc::downgrade(&self.inner);
        tasks.late_watch = Some(watch_for_provider(
            Arc::clone(&self.inner.host),
            Arc::clone(&self.inner.config),
            move |provider| {
                if let Some(inner) = weak.upgrade() {
                    inner.attach_listeners(&provider);
                }
            },
        ));
        debug!("Waiting for a late provider");
    }

    /// Re-runs listener setup when the host becomes visible again.
    ///
    /// Does nothing while connected. Returns `true` if listeners were
    /// newly attached.
    pub fn on_visible(&self) -> bool {
        if self.is_connected() {
            return false;
        }
        trace!("Host visible, re-checking provider listeners");
        self.attach_listeners()
    }
}

// ============================================================================
// ManagerInner - Attempts
// ============================================================================

impl ManagerInner {
    /// Races the provider connect against the timeout and applies the result.
    ///
    /// On failure the attempt is abandoned. On success listeners are
    /// attached. The session is not written here.
    async fn establish(
        self: &Arc<Self>,
        generation: Generation,
        provider: &Arc<dyn Provider>,
    ) -> Result<Address> {
        let address = match self.race_connect(generation, provider).await {
            Ok(address) => address,
            Err(e) => return Err(self.abandon(generation, e)),
        };

        if !self
            .state
            .lock()
            .complete_connect(generation, provider, address.clone())
        {
            return Err(Error::superseded(generation));
        }

        self.attach_listeners(provider);
        Ok(address)
    }

    /// Runs the provider connect in its own task, bounded by `connect_timeout`.
    ///
    /// Losing the race does not cancel the call; its late result is dropped.
    async fn race_connect(&self, generation: Generation, provider: &Arc<dyn Provider>) -> Result<Address> {
        let (tx, rx) = oneshot::channel();
        let call = Arc::clone(provider);
        tokio::spawn(async move {
            let result = call.connect().await;
            if tx.send(result).is_err() {
                debug!(%generation, "Discarding late connect result");
            }
        });

        let limit = self.config.connect_timeout;
        match timeout(limit, rx).await {
            Ok(Ok(response)) => response?.account(),
            Ok(Err(_)) => Err(Error::provider(None, "connect call ended without a result")),
            Err(_) => {
                warn!(%generation, timeout_ms = limit.as_millis() as u64, "Connect timed out");
                Err(Error::connection_timeout(limit.as_millis() as u64))
            }
        }
    }

    /// Marks `generation` as failed and returns the error to surface.
    ///
    /// Becomes [`Error::Superseded`] if the attempt was already stale.
    fn abandon(&self, generation: Generation, error: Error) -> Error {
        if self.state.lock().fail_attempt(generation) {
            debug!(%generation, error = %error, "Connection attempt failed");
            error
        } else {
            Error::superseded(generation)
        }
    }

    /// Attaches listeners to `provider`, logging subscription failures.
    fn attach_listeners(self: &Arc<Self>, provider: &Arc<dyn Provider>) -> bool {
        let weak: Weak<Self> = Arc::downgrade(self);
        let target: Weak<dyn EventTarget> = weak;
        match self.bridge.attach(provider, target) {
            Ok(attached) => attached,
            Err(e) => {
                warn!(error = %e, "Event subscription failed, continuing without provider events");
                true
            }
        }
    }

    /// Watchdog check body.
    async fn check_connection(self: &Arc<Self>) -> TickOutcome {
        if self.reconnect_in_flight.swap(true, Ordering::AcqRel) {
            debug!("Reconnect already in flight, skipping tick");
            return TickOutcome::Skipped;
        }
        let _guard = InFlightGuard(&self.reconnect_in_flight);

        let generation = {
            let mut state = self.state.lock();
            if state.state() != ConnectionState::Connected {
                return TickOutcome::Idle;
            }
            if state.provider().is_some() {
                return TickOutcome::Healthy;
            }
            match state.begin_reconnect() {
                Some(generation) => generation,
                None => return TickOutcome::Idle,
            }
        };
        warn!(%generation, "Wallet connection lost, attempting reconnection");

        let result = match self.host.provider() {
            Some(provider) => self.establish(generation, &provider).await,
            None => Err(self.abandon(generation, Error::provider_unavailable("no provider injected"))),
        };

        match result {
            Ok(address) => {
                info!(address = %address.short(), "Wallet reconnected");
                self.notify(MSG_RECONNECTED, Severity::Info);
                TickOutcome::Reconnected(address)
            }
            Err(Error::Superseded { .. }) => TickOutcome::Skipped,
            Err(e) => {
                info!(error = %e, "Reconnection failed");
                self.forget_session();
                self.notify(MSG_CONNECTION_LOST, Severity::Warning);
                TickOutcome::Failed
            }
        }
    }
}

// ============================================================================
// ManagerInner - Events
// ============================================================================

impl EventTarget for ManagerInner {
    fn handle_event(&self, event: ProviderEvent, source: &Weak<dyn Provider>) {
        if !self.bridge.is_current(source) {
            debug!(event = %event.kind(), "Ignoring event from a detached provider");
            return;
        }
        debug!(event = %event.kind(), "Provider event");

        match event {
            ProviderEvent::Connect(Some(address)) => {
                if self.apply_connected(address, source) {
                    self.notify(MSG_CONNECTED_VIA_EVENT, Severity::Success);
                }
            }
            ProviderEvent::Connect(None) => {
                debug!("Connect event without account, ignoring");
            }
            ProviderEvent::AccountChanged(Some(address)) => {
                if self.apply_connected(address, source) {
                    self.notify(MSG_ACCOUNT_CHANGED, Severity::Info);
                }
            }
            ProviderEvent::AccountChanged(None) | ProviderEvent::Disconnect => {
                self.forget_session();
                if self.state.lock().apply_disconnected() {
                    self.notify(MSG_DISCONNECTED, Severity::Warning);
                }
            }
        }
    }
}

impl ManagerInner {
    /// Applies an event-reported account and persists it.
    fn apply_connected(&self, address: Address, source: &Weak<dyn Provider>) -> bool {
        let provider = source.upgrade();
        let changed = self
            .state
            .lock()
            .apply_connected(address.clone(), provider.as_ref());
        if changed {
            self.persist(&address);
        }
        changed
    }
}

// ============================================================================
// ManagerInner - Side Effects
// ============================================================================

impl ManagerInner {
    /// Writes the session for `address`, stamped now.
    fn persist(&self, address: &Address) {
        let session = PersistedSession::new(address.clone(), self.clock.now());
        if let Err(e) = self.sessions.save(&session) {
            warn!(error = %e, "Could not persist wallet session");
        }
    }

    /// Deletes the persisted session.
    fn forget_session(&self) {
        if let Err(e) = self.sessions.clear() {
            warn!(error = %e, "Could not delete wallet session");
        }
    }

    /// Sends a notification with the default duration.
    fn notify(&self, message: impl Into<String>, severity: Severity) {
        self.notify_for(message, severity, self.config.notification_duration);
    }

    /// Sends a notification.
    fn notify_for(&self, message: impl Into<String>, severity: Severity, duration: Duration) {
        let notification = Notification::new(message, severity, duration);
        trace!(severity = %notification.severity, message = %notification.message, "Notify");
        self.sink.notify(notification);
    }

    /// Reports a failed user connect.
    fn report_connect_failure(&self, error: &Error) {
        let Some(failure) = ConnectFailure::classify(error) else {
            return;
        };
        warn!(error = %error, ?failure, "Wallet connection failed");
        let duration = if failure.is_report() {
            self.config.report_duration
        } else {
            self.config.notification_duration
        };
        self.notify_for(failure.message(), failure.severity(), duration);
    }
}

// ============================================================================
// Tests
// ============================================================================
