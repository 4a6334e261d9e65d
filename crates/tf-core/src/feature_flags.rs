//! Feature flags gating the optional management and analytics surfaces.

use crate::{PersistenceError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Flag controlling the trade management stage.
pub const TRADE_MANAGEMENT: &str = "trade_management";
/// Flag controlling the analytics stage.
pub const ANALYTICS_DASHBOARD: &str = "analytics_dashboard";

/// A single feature flag entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlag {
    pub enabled: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub phase: u32,
    #[serde(default)]
    pub since_version: String,
}

/// The complete feature flags file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub flags: BTreeMap<String, FeatureFlag>,
}

impl FeatureFlags {
    /// Load flags from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| PersistenceError::io(path, e))?;
        let flags =
            serde_json::from_slice(&data).map_err(|e| PersistenceError::json(path, e))?;
        Ok(flags)
    }

    /// Unknown flags are off.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.flags.get(name).map(|f| f.enabled).unwrap_or(false)
    }

    pub fn get(&self, name: &str) -> Option<&FeatureFlag> {
        self.flags.get(name)
    }

    pub fn enabled_flags(&self) -> Vec<&str> {
        self.flags
            .iter()
            .filter(|(_, f)| f.enabled)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn flags_for_phase(&self, phase: u32) -> Vec<&str> {
        self.flags
            .iter()
            .filter(|(_, f)| f.phase == phase)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "version": "1.0.0",
        "flags": {
            "trade_management": {"enabled": true, "description": "Edit and delete trades", "phase": 2, "since_version": "2.0.0"},
            "analytics_dashboard": {"enabled": false, "description": "Stats", "phase": 2, "since_version": "2.0.0"},
            "vimium_mode": {"enabled": true, "phase": 3}
        }
    }"#;

    #[test]
    fn test_load_and_query() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feature.flags.json");
        std::fs::write(&path, SAMPLE).unwrap();

        let flags = FeatureFlags::load(&path).unwrap();
        assert_eq!(flags.version, "1.0.0");
        assert!(flags.is_enabled(TRADE_MANAGEMENT));
        assert!(!flags.is_enabled(ANALYTICS_DASHBOARD));
        assert!(!flags.is_enabled("does_not_exist"));
        assert_eq!(flags.enabled_flags(), vec!["trade_management", "vimium_mode"]);
        assert_eq!(
            flags.flags_for_phase(2),
            vec!["analytics_dashboard", "trade_management"]
        );
        assert_eq!(flags.get("vimium_mode").unwrap().description, "");
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FeatureFlags::load(dir.path().join("nope.json")).unwrap_err();
        assert!(err.is_persistence());
    }

    #[test]
    fn test_default_is_all_off() {
        let flags = FeatureFlags::default();
        assert!(!flags.is_enabled(TRADE_MANAGEMENT));
        assert!(flags.enabled_flags().is_empty());
    }
}
