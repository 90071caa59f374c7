//! Session options and configuration.

use crate::naming::NameAllocator;
use crate::status::DEFAULT_STOP_TIMEOUT;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Options for a pagination session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// How long shutdown waits for status workers to drain
    pub stop_timeout: Duration,

    /// Treat output names differing only in case as distinct
    pub case_sensitive_names: bool,

    /// First numeric suffix for colliding names ("doc (2).tif")
    pub suffix_start: u32,
}

impl SessionOptions {
    /// Create new session options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shutdown drain timeout.
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Enable or disable case-sensitive output names.
    pub fn with_case_sensitive_names(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive_names = case_sensitive;
        self
    }

    /// Set the first numeric suffix.
    pub fn with_suffix_start(mut self, start: u32) -> Self {
        self.suffix_start = start.max(1);
        self
    }

    /// Build a name allocator configured from these options.
    pub fn name_allocator(&self) -> NameAllocator {
        NameAllocator::new()
            .with_case_sensitive(self.case_sensitive_names)
            .with_suffix_start(self.suffix_start)
    }

    /// Apply overrides from a manifest.
    pub fn merge(mut self, overrides: &OptionOverrides) -> Self {
        if let Some(ms) = overrides.stop_timeout_ms {
            self.stop_timeout = Duration::from_millis(ms);
        }
        if let Some(case_sensitive) = overrides.case_sensitive_names {
            self.case_sensitive_names = case_sensitive;
        }
        if let Some(start) = overrides.suffix_start {
            self.suffix_start = start.max(1);
        }
        self
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            case_sensitive_names: false,
            suffix_start: 2,
        }
    }
}

/// Optional settings carried in a session manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionOverrides {
    /// Shutdown drain timeout in milliseconds
    pub stop_timeout_ms: Option<u64>,

    /// Case-sensitive output names
    pub case_sensitive_names: Option<bool>,

    /// First numeric suffix
    pub suffix_start: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = SessionOptions::default();
        assert_eq!(options.stop_timeout, Duration::from_secs(10));
        assert!(!options.case_sensitive_names);
        assert_eq!(options.suffix_start, 2);
    }

    #[test]
    fn test_builder() {
        let options = SessionOptions::new()
            .with_stop_timeout(Duration::from_millis(250))
            .with_case_sensitive_names(true)
            .with_suffix_start(0);
        assert_eq!(options.stop_timeout, Duration::from_millis(250));
        assert!(options.case_sensitive_names);
        assert_eq!(options.suffix_start, 1);
    }

    #[test]
    fn test_merge_overrides() {
        let overrides = OptionOverrides {
            stop_timeout_ms: Some(500),
            ..Default::default()
        };
        let options = SessionOptions::new().merge(&overrides);
        assert_eq!(options.stop_timeout, Duration::from_millis(500));
        assert_eq!(options.suffix_start, 2);
    }

    #[test]
    fn test_name_allocator_uses_options() {
        let mut names = SessionOptions::new().with_suffix_start(5).name_allocator();
        names.allocate("a.tif");
        assert_eq!(names.allocate("a.tif"), "a (5).tif");
    }
}
