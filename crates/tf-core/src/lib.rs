//! TF Engine Core Library
//!
//! Shared types, error handling and configuration for the trade workflow engine.

pub mod config;
pub mod error;
pub mod feature_flags;
pub mod types;

pub use error::{Error, PersistenceError, Result};
pub use config::AppConfig;
pub use feature_flags::FeatureFlags;
pub use types::*;
