//! Detection verdicts and failure reports.

// ============================================================================
// Imports
// ============================================================================

use std::fmt::Write as _;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

// ============================================================================
// Constants
// ============================================================================

/// Reason attached to a not-found verdict.
pub const NOT_FOUND_REASON: &str = "No wallet detected after comprehensive detection attempts";

/// Remediation steps for a not-found verdict, most useful first.
pub const NOT_FOUND_SUGGESTIONS: [&str; 8] = [
    "Open your browser's extensions page (e.g. chrome://extensions/)",
    "Find your wallet extension and ensure it is ENABLED",
    "Refresh this page completely (Ctrl+F5 or Cmd+Shift+R)",
    "Check the browser console for errors (F12 -> Console)",
    "Try closing and reopening the browser",
    "If using incognito mode, enable the extension for incognito",
    "Check if antivirus software is blocking the extension",
    "Try creating a new browser profile",
];

/// Suggestions shown in the quick-fix section of a report.
const QUICK_FIX_COUNT: usize = 3;

// ============================================================================
// Diagnostics
// ============================================================================

/// A single diagnostic value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DiagnosticValue {
    /// Scalar value.
    Text(String),
    /// Sequence value.
    List(Vec<String>),
}

impl DiagnosticValue {
    /// Renders the value for a report line; empty lists render as `None`.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::List(items) if items.is_empty() => "None".to_string(),
            Self::List(items) => items.join(", "),
        }
    }
}

impl From<String> for DiagnosticValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for DiagnosticValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<bool> for DiagnosticValue {
    fn from(value: bool) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<String>> for DiagnosticValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// Ordered diagnostic entries, serialized as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    entries: Vec<(String, DiagnosticValue)>,
}

impl Diagnostics {
    /// Creates an empty bundle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, replacing an existing entry in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<DiagnosticValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Looks up `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&DiagnosticValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DiagnosticValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Diagnostics {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

// ============================================================================
// DetectionResult
// ============================================================================

/// Outcome of one detection run. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    /// Whether a provider was found.
    pub found: bool,
    /// Name of the strategy that succeeded.
    pub strategy_name: Option<String>,
    /// Description of the strategy that succeeded.
    pub description: Option<String>,
    /// Outer retries consumed (1-based).
    pub attempt_count: u32,
    /// Number of strategies per retry.
    pub strategies: usize,
    /// Why nothing was found.
    pub reason: Option<String>,
    /// Ordered remediation steps.
    pub suggestions: Vec<String>,
    /// Environment signals for troubleshooting.
    pub diagnostics: Diagnostics,
}

impl DetectionResult {
    /// Creates a found verdict.
    #[must_use]
    pub fn found(
        strategy_name: impl Into<String>,
        description: impl Into<String>,
        attempt_count: u32,
        strategies: usize,
    ) -> Self {
        Self {
            found: true,
            strategy_name: Some(strategy_name.into()),
            description: Some(description.into()),
            attempt_count,
            strategies,
            reason: None,
            suggestions: Vec::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Creates a not-found verdict with the standard remediation steps.
    #[must_use]
    pub fn not_found(attempt_count: u32, strategies: usize, diagnostics: Diagnostics) -> Self {
        Self {
            found: false,
            strategy_name: None,
            description: None,
            attempt_count,
            strategies,
            reason: Some(NOT_FOUND_REASON.to_string()),
            suggestions: NOT_FOUND_SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
            diagnostics,
        }
    }

    /// Builds the user-facing failure report for a not-found verdict.
    #[must_use]
    pub fn report(&self) -> FailureReport {
        FailureReport {
            reason: self
                .reason
                .clone()
                .unwrap_or_else(|| NOT_FOUND_REASON.to_string()),
            suggestions: self.suggestions.clone(),
            diagnostics: self.diagnostics.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn not_found_for_test(reason: &str) -> Self {
        let mut result = Self::not_found(5, 5, Diagnostics::new());
        result.reason = Some(reason.to_string());
        result
    }
}

// ============================================================================
// FailureReport
// ============================================================================

/// Troubleshooting message for a failed detection or connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureReport {
    /// Human-readable reason.
    pub reason: String,
    /// Ordered remediation steps.
    pub suggestions: Vec<String>,
    /// Environment signals.
    pub diagnostics: Diagnostics,
}

impl FailureReport {
    /// Creates a report without diagnostics.
    #[must_use]
    pub fn new(
        reason: impl Into<String>,
        suggestions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            reason: reason.into(),
            suggestions: suggestions.into_iter().map(Into::into).collect(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Renders the report as notification text.
    ///
    /// Layout: reason, the first three suggestions as quick fixes, then one
    /// line per diagnostic when any exist.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = self.reason.clone();

        if !self.suggestions.is_empty() {
            out.push_str("\n\nQUICK FIXES:");
            for suggestion in self.suggestions.iter().take(QUICK_FIX_COUNT) {
                let _ = write!(out, "\n- {suggestion}");
            }
        }

        if !self.diagnostics.is_empty() {
            out.push_str("\n\nDETAILED DEBUG:");
            for (key, value) in self.diagnostics.iter() {
                let _ = write!(out, "\n- {key}: {}", value.render());
            }
        }

        out
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_diagnostics() -> Diagnostics {
        let mut diagnostics = Diagnostics::new();
        diagnostics.insert("userAgent", "TestAgent/1.0");
        diagnostics.insert("hasProvider", false);
        diagnostics.insert("storageKeys", Vec::<String>::new());
        diagnostics
    }

    #[test]
    fn test_found_result_shape() {
        let result = DetectionResult::found("Primary Check", "Standard provider detection", 1, 5);
        assert!(result.found);
        assert_eq!(result.strategy_name.as_deref(), Some("Primary Check"));
        assert_eq!(result.attempt_count, 1);
        assert!(result.reason.is_none());
    }

    #[test]
    fn test_not_found_carries_suggestions() {
        let result = DetectionResult::not_found(5, 5, sample_diagnostics());
        assert!(!result.found);
        assert_eq!(result.suggestions.len(), 8);
        assert_eq!(result.reason.as_deref(), Some(NOT_FOUND_REASON));
    }

    #[test]
    fn test_diagnostics_preserve_order_and_replace() {
        let mut diagnostics = sample_diagnostics();
        diagnostics.insert("userAgent", "Other/2.0");
        let keys: Vec<&str> = diagnostics.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["userAgent", "hasProvider", "storageKeys"]);
        assert_eq!(
            diagnostics.get("userAgent"),
            Some(&DiagnosticValue::Text("Other/2.0".into()))
        );
    }

    #[test]
    fn test_report_render() {
        let report = DetectionResult::not_found(5, 5, sample_diagnostics()).report();
        let text = report.render();

        assert!(text.starts_with(NOT_FOUND_REASON));
        assert!(text.contains("QUICK FIXES:"));
        assert!(text.contains(NOT_FOUND_SUGGESTIONS[2]));
        assert!(!text.contains(NOT_FOUND_SUGGESTIONS[3]));
        assert!(text.contains("- hasProvider: false"));
        assert!(text.contains("- storageKeys: None"));
    }

    #[test]
    fn test_report_without_diagnostics_omits_debug_section() {
        let text = FailureReport::new("Something broke", ["Refresh the page"]).render();
        assert_eq!(text, "Something broke\n\nQUICK FIXES:\n- Refresh the page");
    }

    #[test]
    fn test_serializes_diagnostics_as_object() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.insert("storageKeys", vec!["phantom.x".to_string()]);
        let json = serde_json::to_value(DetectionResult::not_found(5, 5, diagnostics)).unwrap();

        assert_eq!(json["found"], false);
        assert_eq!(json["attemptCount"], 5);
        assert_eq!(json["diagnostics"]["storageKeys"][0], "phantom.x");
    }
}
