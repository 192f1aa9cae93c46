//! Engine settings.
//!
//! Settings are loaded once and handed to every condition, permission and
//! effect through the evaluation context. Predicates never read global state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Default bound on nested cascades within one unit of work.
pub const DEFAULT_MAX_CASCADE_DEPTH: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read settings from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings: {0}")]
    Invalid(#[from] serde_json::Error),

    #[error("max_cascade_depth must be at least 1")]
    ZeroCascadeDepth,
}

/// Engine settings.
///
/// # Example
///
/// ```rust
/// use lifecycle::Settings;
///
/// let settings = Settings::from_json_str(
///     r#"{ "max_cascade_depth": 8, "features": { "team_activities": true } }"#,
/// ).unwrap();
///
/// assert_eq!(settings.max_cascade_depth, 8);
/// assert!(settings.feature("team_activities"));
/// assert!(!settings.feature("unknown"));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// How deep transitions may cascade into related entities before the
    /// whole unit of work is aborted.
    pub max_cascade_depth: usize,

    /// Platform feature toggles consulted by predicates.
    pub features: BTreeMap<String, bool>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_cascade_depth: DEFAULT_MAX_CASCADE_DEPTH,
            features: BTreeMap::new(),
        }
    }
}

impl Settings {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_json::from_str(raw)?;
        settings.validate()
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Whether a feature toggle is on. Unknown toggles are off.
    pub fn feature(&self, name: &str) -> bool {
        self.features.get(name).copied().unwrap_or(false)
    }

    pub fn with_feature(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.features.insert(name.into(), enabled);
        self
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.max_cascade_depth == 0 {
            return Err(ConfigError::ZeroCascadeDepth);
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_uses_defaults() {
        let settings = Settings::from_json_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.max_cascade_depth, DEFAULT_MAX_CASCADE_DEPTH);
    }

    #[test]
    fn zero_depth_is_rejected() {
        let result = Settings::from_json_str(r#"{ "max_cascade_depth": 0 }"#);
        assert!(matches!(result, Err(ConfigError::ZeroCascadeDepth)));
    }

    #[test]
    fn malformed_json_is_rejected() {
        let result = Settings::from_json_str("{ not json");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_file_reports_path() {
        let result = Settings::from_path("/nonexistent/lifecycle.json");
        match result {
            Err(ConfigError::Io { path, .. }) => assert!(path.contains("lifecycle.json")),
            other => panic!("Expected Io error, got {other:?}"),
        }
    }

    #[test]
    fn feature_toggles() {
        let settings = Settings::default().with_feature("team_activities", true);
        assert!(settings.feature("team_activities"));
        assert!(!settings.feature("funding"));
    }
}
