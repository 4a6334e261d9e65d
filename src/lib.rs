//! TF-Engine: guardrailed options trade entry workflow
//!
//! Root crate re-exporting the workspace members for integration tests.
//! For actual functionality, use the individual crates directly:
//!
//! - `tf-core`: trade, policy and settings types, errors, configuration
//! - `guardrails`: cooldown timer, checklist, heat and sizing rules
//! - `trade-store`: atomic JSON persistence of trades and settings
//! - `workflow`: the stage sequence and its controller
//! - `analytics`: performance statistics over trade history

pub use analytics;
pub use guardrails;
pub use tf_core as core;
pub use trade_store as store;
pub use workflow;
