//! Error types for the trade workflow engine.

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

/// Failure while reading or writing one of the persisted JSON files.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl PersistenceError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }

    /// Path of the file the failed operation touched.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Io { path, .. } | Self::Json { path, .. } => path,
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation failed on stage '{stage}'")]
    ValidationFailed { stage: String },

    #[error("Persistence failed: {0}")]
    PersistenceFailed(#[from] PersistenceError),

    #[error("Configuration degraded ({}): {reason}", path.display())]
    ConfigurationDegraded { path: PathBuf, reason: String },

    #[error("Configuration file error: {0}")]
    ConfigFile(#[from] config::ConfigError),

    #[error("No previous screen in navigation history")]
    NoHistory,

    #[error("No more screens in the workflow")]
    NoMoreScreens,

    #[error("Invalid screen index: {0}")]
    InvalidScreenIndex(i64),

    #[error("No trade in progress")]
    NoTradeInProgress,

    #[error("Sector '{sector}' is blocked for trading")]
    SectorBlocked { sector: String },

    #[error("Unknown sector: {sector}")]
    UnknownSector { sector: String },

    #[error("Trade not found: {0}")]
    TradeNotFound(Uuid),

    #[error("Invalid settings: {message}")]
    InvalidSettings { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

impl Error {
    pub fn validation(stage: impl Into<String>) -> Self {
        Self::ValidationFailed {
            stage: stage.into(),
        }
    }

    /// Navigation boundary conditions (history/sequence edges).
    pub fn is_navigation_boundary(&self) -> bool {
        matches!(
            self,
            Self::NoHistory | Self::NoMoreScreens | Self::InvalidScreenIndex(_)
        )
    }

    /// Whether the failure blocked a transition because of disk state.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::PersistenceFailed(_))
    }

    /// Every error in the core is recoverable by the caller; nothing here
    /// terminates the process.
    pub fn is_recoverable(&self) -> bool {
        true
    }
}

pub type Result<T> = std::result::Result<T, Error>;
