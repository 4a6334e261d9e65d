//! Workflow
//!
//! The trade entry state machine: an ordered sequence of gated stages,
//! out-of-band jump targets and auto-save on every transition.

pub mod controller;
pub mod stage;

pub use controller::{GuardrailSnapshot, JumpTarget, Location, WorkflowController};
pub use stage::{
    NavCallbacks, NavCommand, Stage, StageContext, StageKind, StageSnapshot, WorkflowStage,
};
