//! Load and save user settings as a JSON file.

use std::path::{Path, PathBuf};
use tf_core::{AppConfig, Result, Settings};
use tracing::{debug, info};

use crate::atomic;

/// JSON file holding user [`Settings`].
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.settings_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Defaults when the file is absent; an error when it is malformed.
    pub fn load(&self) -> Result<Settings> {
        match atomic::read_json(&self.path)? {
            Some(settings) => Ok(settings),
            None => {
                debug!(path = %self.path.display(), "No settings file, using defaults");
                Ok(Settings::default())
            }
        }
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        settings.validate()?;
        atomic::write_json(&self.path, settings)?;
        info!(
            path = %self.path.display(),
            account_equity = %settings.account_equity,
            risk_per_trade = %settings.risk_per_trade,
            "Settings saved"
        );
        Ok(())
    }
}
