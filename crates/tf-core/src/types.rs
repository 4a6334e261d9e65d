//! Core domain types for the trade workflow engine.

pub mod policy;
pub mod settings;
pub mod trade;

pub use policy::*;
pub use settings::*;
pub use trade::*;
