//! Detection strategies.
//!
//! Each strategy is an independent predicate over the host environment.
//! A strategy may fail internally (a property read throws, storage is
//! disabled); the orchestrator turns any failure into `false`.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::{sleep, timeout};
use tracing::trace;

use crate::config::WalletConfig;
use crate::error::Result;
use crate::host::Host;
use crate::storage::SessionStore;

// ============================================================================
// ProbeContext
// ============================================================================

/// Everything a strategy may look at.
#[derive(Clone)]
pub struct ProbeContext {
    /// Host environment owning the provider.
    pub host: Arc<dyn Host>,
    /// Persistent store, for storage traces.
    pub sessions: SessionStore,
    /// Timing and keyword configuration.
    pub config: Arc<WalletConfig>,
}

impl fmt::Debug for ProbeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ProbeContext {
    /// Creates a probe context.
    #[must_use]
    pub fn new(host: Arc<dyn Host>, sessions: SessionStore, config: Arc<WalletConfig>) -> Self {
        Self {
            host,
            sessions,
            config,
        }
    }

    /// Reads the provider identity flag; `false` when no provider exists.
    pub fn provider_flagged(&self) -> Result<bool> {
        match self.host.provider() {
            Some(provider) => provider.is_flagged(),
            None => Ok(false),
        }
    }
}

// ============================================================================
// DetectionStrategy
// ============================================================================

/// One heuristic test for provider presence.
#[async_trait]
pub trait DetectionStrategy: Send + Sync {
    /// Short name reported in a found verdict.
    fn name(&self) -> &str;

    /// One-line description of the signal.
    fn description(&self) -> &str;

    /// Runs the probe.
    async fn test(&self, ctx: &ProbeContext) -> Result<bool>;
}

/// Returns the five built-in strategies in priority order.
#[must_use]
pub fn default_strategies() -> Vec<Arc<dyn DetectionStrategy>> {
    vec![
        Arc::new(PrimaryCheck),
        Arc::new(MethodCheck),
        Arc::new(StorageCheck),
        Arc::new(EventCheck),
        Arc::new(PollingCheck),
    ]
}

// ============================================================================
// Built-in Strategies
// ============================================================================

/// Identity flag check.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrimaryCheck;

#[async_trait]
impl DetectionStrategy for PrimaryCheck {
    fn name(&self) -> &str {
        "Primary Check"
    }

    fn description(&self) -> &str {
        "Standard provider detection"
    }

    async fn test(&self, ctx: &ProbeContext) -> Result<bool> {
        ctx.provider_flagged()
    }
}

/// Callable `connect` check.
#[derive(Debug, Clone, Copy, Default)]
pub struct MethodCheck;

#[async_trait]
impl DetectionStrategy for MethodCheck {
    fn name(&self) -> &str {
        "Method Check"
    }

    fn description(&self) -> &str {
        "Connect method availability"
    }

    async fn test(&self, ctx: &ProbeContext) -> Result<bool> {
        match ctx.host.provider() {
            Some(provider) => provider.has_connect(),
            None => Ok(false),
        }
    }
}

/// Storage trace check.
#[derive(Debug, Clone, Copy, Default)]
pub struct StorageCheck;

#[async_trait]
impl DetectionStrategy for StorageCheck {
    fn name(&self) -> &str {
        "Storage Check"
    }

    fn description(&self) -> &str {
        "Storage indicators"
    }

    async fn test(&self, ctx: &ProbeContext) -> Result<bool> {
        let keys = ctx
            .sessions
            .matching_keys(|key| ctx.config.matches_provider_key(key))?;
        trace!(matches = keys.len(), "Storage trace keys");
        Ok(!keys.is_empty())
    }
}

/// Identity flag check after the host ready signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventCheck;

#[async_trait]
impl DetectionStrategy for EventCheck {
    fn name(&self) -> &str {
        "Event Check"
    }

    fn description(&self) -> &str {
        "Post-load detection"
    }

    async fn test(&self, ctx: &ProbeContext) -> Result<bool> {
        if timeout(ctx.config.ready_wait, ctx.host.ready()).await.is_err() {
            trace!(wait_ms = ctx.config.ready_wait.as_millis() as u64, "Ready signal not seen");
            return Ok(false);
        }
        ctx.provider_flagged()
    }
}

/// Identity flag sampled on an interval.
#[derive(Debug, Clone, Copy, Default)]
pub struct PollingCheck;

#[async_trait]
impl DetectionStrategy for PollingCheck {
    fn name(&self) -> &str {
        "Polling Check"
    }

    fn description(&self) -> &str {
        "Polling detection method"
    }

    async fn test(&self, ctx: &ProbeContext) -> Result<bool> {
        for attempt in 1..=ctx.config.poll_attempts {
            sleep(ctx.config.poll_interval).await;
            if ctx.provider_flagged()? {
                trace!(attempt, "Polling found provider");
                return Ok(true);
            }
        }
        Ok(false)
    }
}

// ============================================================================
// Tests
// ============================================================================
