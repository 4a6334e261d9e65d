//! Guardrails
//!
//! Behavioral gates for trade entry: the restartable cooldown timer plus the
//! pure checklist, heat and sizing computations consulted by the workflow.

pub mod checklist;
pub mod cooldown;
pub mod heat;
pub mod sizing;

pub use checklist::{checklist_satisfied, cooldown_complete, missing_required_items};
pub use cooldown::{CooldownTimer, TimerPhase};
pub use heat::{check_heat, HeatCheck};
pub use sizing::{size_position, sizing_resolved, SizingResult};
