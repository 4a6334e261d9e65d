//! Configuration management for the trade workflow engine.

use crate::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const TRADES_FILE: &str = "trades.json";
const IN_PROGRESS_FILE: &str = "trades_in_progress.json";
const BACKUP_DIR: &str = "backups";
const SETTINGS_FILE: &str = "ui/settings.json";

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Root directory for trade history, the in-progress record and settings.
    pub data_dir: PathBuf,
    /// Read-only policy file (sectors, strategies, checklist, caps).
    pub policy_path: PathBuf,
    /// Feature flags file.
    pub feature_flags_path: PathBuf,
    /// Optional tracing filter directive, overrides the binary's default.
    #[serde(default)]
    pub log_filter: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::with_data_dir("data")
    }
}

impl AppConfig {
    /// Load configuration from defaults, an optional `tf-engine` config file
    /// and `TF_`-prefixed environment variables, in that order.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let cfg = config::Config::builder()
            .set_default("data_dir", "data")?
            .set_default("policy_path", "data/policy.v1.json")?
            .set_default("feature_flags_path", "feature.flags.json")?
            .add_source(config::File::with_name("tf-engine").required(false))
            .add_source(config::Environment::with_prefix("TF"))
            .build()?;

        Ok(cfg.try_deserialize()?)
    }

    /// Configuration rooted at an explicit data directory (used by tests and tools).
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            policy_path: data_dir.join("policy.v1.json"),
            feature_flags_path: PathBuf::from("feature.flags.json"),
            data_dir,
            log_filter: None,
        }
    }

    pub fn trades_path(&self) -> PathBuf {
        self.data_dir.join(TRADES_FILE)
    }

    pub fn in_progress_path(&self) -> PathBuf {
        self.data_dir.join(IN_PROGRESS_FILE)
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.data_dir.join(BACKUP_DIR)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE)
    }

    /// Create the data, settings and backup directories.
    pub fn ensure_directories(&self) -> Result<()> {
        let settings_dir = self
            .settings_path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.data_dir.clone());

        for dir in [self.data_dir.clone(), settings_dir, self.backup_dir()] {
            std::fs::create_dir_all(&dir)
                .map_err(|e| crate::PersistenceError::io(&dir, e))?;
            tracing::debug!(dir = %dir.display(), "Ensured directory");
        }
        Ok(())
    }
}
