//! Provider detection.
//!
//! Detection runs a fixed list of independent strategies, each probing for
//! the injected provider through a different signal, across bounded retries
//! with exponential backoff.
//!
//! # Strategies
//!
//! | Order | Name | Signal |
//! |-------|------|--------|
//! | 1 | `Primary Check` | Identity flag is `true` |
//! | 2 | `Method Check` | Callable `connect` member |
//! | 3 | `Storage Check` | Storage key containing a provider keyword |
//! | 4 | `Event Check` | Identity flag after the host ready signal (bounded) |
//! | 5 | `Polling Check` | Identity flag sampled on an interval |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `strategy` | Strategy trait and the built-in probes |
//! | `orchestrator` | Retry loop and verdict aggregation |
//! | `result` | [`DetectionResult`] and failure reports |

// ============================================================================
// Submodules
// ============================================================================

/// Retry loop and verdict aggregation.
pub mod orchestrator;

/// Detection verdicts and failure reports.
pub mod result;

/// Strategy trait and built-in probes.
pub mod strategy;

// ============================================================================
// Re-exports
// ============================================================================

pub use orchestrator::DetectionOrchestrator;
pub use result::{DetectionResult, DiagnosticValue, Diagnostics, FailureReport};
pub use strategy::{
    DetectionStrategy, EventCheck, MethodCheck, PollingCheck, PrimaryCheck, ProbeContext,
    StorageCheck, default_strategies,
};
