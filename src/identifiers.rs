//! Type-safe identifier wrappers.
//!
//! Newtype wrappers prevent mixing a wallet address with arbitrary strings
//! and connection attempt tags with plain counters.
//!
//! | Type | Wraps | Purpose |
//! |------|-------|---------|
//! | [`Address`] | `String` | Connected account identifier |
//! | [`Generation`] | `u64` | Tag of one connection attempt |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Address
// ============================================================================

/// Account identifier reported by the provider.
///
/// Opaque to this crate: it is whatever string the provider's public key
/// renders to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Creates an address, returning `None` for empty or blank input.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    /// Returns the address as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the shortened display form, e.g. `7xKX...gAsU`.
    ///
    /// Addresses of eight characters or fewer are returned unchanged.
    #[must_use]
    pub fn short(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 8 {
            return self.0.clone();
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    }

    /// Consumes the wrapper and returns the inner string.
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Generation
// ============================================================================

/// Monotonic tag for a connection attempt.
///
/// Every attempt (user connect, silent restore, watchdog reconnect) takes a
/// fresh generation. Completions carrying an older generation are stale and
/// must be discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    /// The generation before any attempt was made.
    pub const INITIAL: Self = Self(0);

    /// Returns the following generation.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Returns the raw counter value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
