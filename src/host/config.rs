//! Analysis configuration
//!
//! Keys follow the editor settings (`maxNestingDepth`, `debounceDelayMs`, ...);
//! every field has a default so partial settings objects are accepted.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::AnalysisError;
use crate::incremental::DEFAULT_LINE_THRESHOLD;
use crate::semantic::{DEFAULT_MAX_NESTING_DEPTH, ValidationOptions};

/// Kinds of editor request the debouncer distinguishes.
///
/// Ordered by priority: completion is served before hover, hover before
/// diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestClass {
    Completion,
    Hover,
    Diagnostics,
}

/// Quiet period per request class, in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DebounceConfig {
    pub diagnostics: u64,
    pub hover: u64,
    pub completion: u64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            diagnostics: 300,
            hover: 100,
            completion: 50,
        }
    }
}

impl DebounceConfig {
    pub fn delay(&self, class: RequestClass) -> Duration {
        let ms = match class {
            RequestClass::Diagnostics => self.diagnostics,
            RequestClass::Hover => self.hover,
            RequestClass::Completion => self.completion,
        };
        Duration::from_millis(ms)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisConfig {
    pub max_nesting_depth: usize,
    pub incremental_parsing_line_threshold: usize,
    pub max_cache_entries: usize,
    #[serde(rename = "maxCacheMemoryMB")]
    pub max_cache_memory_mb: usize,
    pub debounce_delay_ms: DebounceConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            incremental_parsing_line_threshold: DEFAULT_LINE_THRESHOLD,
            max_cache_entries: 50,
            max_cache_memory_mb: 64,
            debounce_delay_ms: DebounceConfig::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_str(json: &str) -> Result<Self, AnalysisError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_value(value: serde_json::Value) -> Result<Self, AnalysisError> {
        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.max_nesting_depth == 0 {
            return Err(AnalysisError::InvalidConfig(
                "maxNestingDepth must be at least 1".to_string(),
            ));
        }
        if self.max_cache_entries == 0 {
            return Err(AnalysisError::InvalidConfig(
                "maxCacheEntries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn max_cache_memory_bytes(&self) -> usize {
        self.max_cache_memory_mb.saturating_mul(1024 * 1024)
    }

    pub fn validation_options(&self) -> ValidationOptions {
        ValidationOptions {
            max_nesting_depth: self.max_nesting_depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.max_nesting_depth, 3);
        assert_eq!(config.incremental_parsing_line_threshold, 200);
        assert_eq!(config.debounce_delay_ms.delay(RequestClass::Hover), Duration::from_millis(100));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = AnalysisConfig::from_json_str(
            r#"{"maxNestingDepth": 5, "maxCacheMemoryMB": 8, "debounceDelayMs": {"completion": 10}}"#,
        )
        .expect("valid config");
        assert_eq!(config.max_nesting_depth, 5);
        assert_eq!(config.max_cache_memory_bytes(), 8 * 1024 * 1024);
        assert_eq!(config.debounce_delay_ms.completion, 10);
        assert_eq!(config.debounce_delay_ms.diagnostics, 300);
        assert_eq!(config.max_cache_entries, 50);
    }

    #[test]
    fn test_zero_limits_rejected() {
        let err = AnalysisConfig::from_json_str(r#"{"maxCacheEntries": 0}"#).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidConfig(_)));
        let err = AnalysisConfig::from_json_value(serde_json::json!({"maxNestingDepth": 0})).unwrap_err();
        assert!(err.to_string().contains("maxNestingDepth"));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            AnalysisConfig::from_json_str("{"),
            Err(AnalysisError::ConfigJson(_))
        ));
    }
}
