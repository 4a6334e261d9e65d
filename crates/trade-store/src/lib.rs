//! Trade Store
//!
//! Crash-safe JSON persistence for the in-progress trade, the completed trade
//! history and user settings.

mod atomic;
pub mod repository;
pub mod settings_store;
pub mod trades;

pub use repository::TradeRepository;
pub use settings_store::SettingsStore;
pub use trades::TradeStore;
