//! Detection retry loop.
//!
//! Runs the strategies in order, returning on the first success. Between
//! outer retries (never after the last) it waits `base * multiplier^retry`.
//! A strategy that errors or panics counts as `false`; `detect` itself
//! cannot fail.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::result::{DetectionResult, Diagnostics};
use super::strategy::{DetectionStrategy, ProbeContext, default_strategies};

// ============================================================================
// DetectionOrchestrator
// ============================================================================

/// Runs detection strategies across bounded retries.
///
/// Stateless between runs: `detect` may be called any number of times,
/// concurrently or not, and never touches connection state.
#[derive(Clone)]
pub struct DetectionOrchestrator {
    /// Probe inputs.
    ctx: ProbeContext,
    /// Strategies in priority order.
    strategies: Vec<Arc<dyn DetectionStrategy>>,
}

impl fmt::Debug for DetectionOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.strategies.iter().map(|s| s.name()).collect();
        f.debug_struct("DetectionOrchestrator")
            .field("strategies", &names)
            .finish_non_exhaustive()
    }
}

impl DetectionOrchestrator {
    /// Creates an orchestrator with the built-in strategies.
    #[must_use]
    pub fn new(ctx: ProbeContext) -> Self {
        Self::with_strategies(ctx, default_strategies())
    }

    /// Creates an orchestrator with a custom strategy list.
    #[must_use]
    pub fn with_strategies(ctx: ProbeContext, strategies: Vec<Arc<dyn DetectionStrategy>>) -> Self {
        Self { ctx, strategies }
    }

    /// Returns the probe context.
    #[inline]
    #[must_use]
    pub fn context(&self) -> &ProbeContext {
        &self.ctx
    }

    /// Runs detection to a verdict.
    pub async fn detect(&self) -> DetectionResult {
        let retries = self.ctx.config.detection_retries;

        for retry in 0..retries {
            for strategy in &self.strategies {
                if self.probe(strategy.as_ref(), retry).await {
                    info!(
                        strategy = strategy.name(),
                        attempt = retry + 1,
                        "Provider detected"
                    );
                    return DetectionResult::found(
                        strategy.name(),
                        strategy.description(),
                        retry + 1,
                        self.strategies.len(),
                    );
                }
            }

            if retry + 1 < retries {
                let delay = self.ctx.config.backoff_delay(retry);
                debug!(
                    attempt = retry + 1,
                    delay_ms = delay.as_millis() as u64,
                    "No provider yet, backing off"
                );
                sleep(delay).await;
            }
        }

        let diagnostics = self.diagnostics();
        warn!(attempts = retries, "Provider not detected");
        DetectionResult::not_found(retries, self.strategies.len(), diagnostics)
    }

    /// Runs one strategy, containing errors and panics.
    async fn probe(&self, strategy: &dyn DetectionStrategy, retry: u32) -> bool {
        match AssertUnwindSafe(strategy.test(&self.ctx)).catch_unwind().await {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                warn!(strategy = strategy.name(), attempt = retry + 1, error = %e, "Detection strategy failed");
                false
            }
            Err(_) => {
                warn!(strategy = strategy.name(), attempt = retry + 1, "Detection strategy panicked");
                false
            }
        }
    }

    /// Collects environment signals for a not-found verdict.
    pub fn diagnostics(&self) -> Diagnostics {
        let sessions = &self.ctx.sessions;
        let storage_keys = sessions
            .matching_keys(|key| self.ctx.config.matches_provider_key(key))
            .unwrap_or_else(|e| {
                warn!(error = %e, "Could not list storage keys for diagnostics");
                Vec::new()
            });

        let mut diagnostics = Diagnostics::new();
        diagnostics.insert("userAgent", self.ctx.host.user_agent());
        diagnostics.insert("protocol", self.ctx.host.protocol());
        diagnostics.insert("hasLocalStorage", sessions.is_available());
        diagnostics.insert("hasProvider", self.ctx.host.provider().is_some());
        diagnostics.insert("storageKeys", storage_keys);
        diagnostics
    }
}

// ============================================================================
// Tests
// ============================================================================
