//! Workflow stages and their validation gates.

use chrono::{DateTime, Utc};
use guardrails::{check_heat, checklist_satisfied, sizing_resolved, CooldownTimer};
use serde::Serialize;
use tf_core::feature_flags::{ANALYTICS_DASHBOARD, TRADE_MANAGEMENT};
use tf_core::{FeatureFlags, Policy, Trade};
use tokio::sync::mpsc;
use tracing::debug;

/// Every stage the controller knows, in index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    SectorSelection,
    ScreenerLaunch,
    TickerEntry,
    Checklist,
    PositionSizing,
    HeatCheck,
    TradeEntry,
    Calendar,
    TradeManagement,
    Analytics,
}

impl StageKind {
    pub const ALL: [StageKind; 10] = [
        Self::SectorSelection,
        Self::ScreenerLaunch,
        Self::TickerEntry,
        Self::Checklist,
        Self::PositionSizing,
        Self::HeatCheck,
        Self::TradeEntry,
        Self::Calendar,
        Self::TradeManagement,
        Self::Analytics,
    ];

    /// Stages reachable with `next()`; Calendar closes the sequence.
    pub const MAIN_SEQUENCE_LEN: usize = 8;

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::SectorSelection => "sector_selection",
            Self::ScreenerLaunch => "screener_launch",
            Self::TickerEntry => "ticker_entry",
            Self::Checklist => "checklist",
            Self::PositionSizing => "position_sizing",
            Self::HeatCheck => "heat_check",
            Self::TradeEntry => "trade_entry",
            Self::Calendar => "calendar",
            Self::TradeManagement => "trade_management",
            Self::Analytics => "analytics",
        }
    }

    /// Feature flag that must be on for the stage to show its content.
    pub fn feature_flag(self) -> Option<&'static str> {
        match self {
            Self::TradeManagement => Some(TRADE_MANAGEMENT),
            Self::Analytics => Some(ANALYTICS_DASHBOARD),
            _ => None,
        }
    }
}

/// Navigation request raised by a stage's own continue/back/cancel affordance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavCommand {
    Next,
    Back,
    Cancel,
}

/// Sender half handed to stages; the controller drains the queue.
#[derive(Debug, Clone)]
pub struct NavCallbacks {
    tx: mpsc::UnboundedSender<NavCommand>,
}

impl NavCallbacks {
    pub(crate) fn new(tx: mpsc::UnboundedSender<NavCommand>) -> Self {
        Self { tx }
    }

    fn send(&self, command: NavCommand) {
        if self.tx.send(command).is_err() {
            debug!(?command, "Navigation receiver gone, command dropped");
        }
    }

    pub fn on_next(&self) {
        self.send(NavCommand::Next);
    }

    pub fn on_back(&self) {
        self.send(NavCommand::Back);
    }

    pub fn on_cancel(&self) {
        self.send(NavCommand::Cancel);
    }
}

/// Read-only view a stage validates against.
pub struct StageContext<'a> {
    pub trade: Option<&'a Trade>,
    pub policy: &'a Policy,
    /// Completed trades, for heat accounting.
    pub book: &'a [Trade],
    pub timer: Option<&'a CooldownTimer>,
    pub flags: &'a FeatureFlags,
    pub now: DateTime<Utc>,
}

/// Display-independent summary of a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageSnapshot {
    pub index: usize,
    pub name: &'static str,
    pub valid: bool,
    /// False when the stage's feature flag is off.
    pub available: bool,
}

/// Uniform stage contract.
pub trait Stage: Send {
    fn kind(&self) -> StageKind;

    fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Gate consulted by `next()`.
    fn validate(&self, ctx: &StageContext<'_>) -> bool;

    /// Stages with their own continue/back/cancel controls keep these.
    fn set_nav_callbacks(&mut self, _callbacks: NavCallbacks) {}

    fn snapshot(&self, ctx: &StageContext<'_>) -> StageSnapshot {
        let kind = self.kind();
        StageSnapshot {
            index: kind.index(),
            name: self.name(),
            valid: self.validate(ctx),
            available: kind
                .feature_flag()
                .map(|flag| ctx.flags.is_enabled(flag))
                .unwrap_or(true),
        }
    }
}

/// Built-in stage implementing the business gates for each [`StageKind`].
#[derive(Debug)]
pub struct WorkflowStage {
    kind: StageKind,
    nav: Option<NavCallbacks>,
}

impl WorkflowStage {
    pub fn new(kind: StageKind) -> Self {
        Self { kind, nav: None }
    }

    /// The full stage list in index order.
    pub fn all() -> Vec<Box<dyn Stage>> {
        StageKind::ALL
            .iter()
            .map(|kind| Box::new(Self::new(*kind)) as Box<dyn Stage>)
            .collect()
    }

    pub fn continue_pressed(&self) {
        if let Some(nav) = &self.nav {
            nav.on_next();
        }
    }

    pub fn back_pressed(&self) {
        if let Some(nav) = &self.nav {
            nav.on_back();
        }
    }

    pub fn cancel_pressed(&self) {
        if let Some(nav) = &self.nav {
            nav.on_cancel();
        }
    }
}

impl Stage for WorkflowStage {
    fn kind(&self) -> StageKind {
        self.kind
    }

    fn validate(&self, ctx: &StageContext<'_>) -> bool {
        let trade = ctx.trade;
        match self.kind {
            StageKind::SectorSelection => trade.map(|t| !t.sector.is_empty()).unwrap_or(false),
            StageKind::TickerEntry => trade
                .map(|t| !t.ticker.is_empty() && !t.strategy.is_empty())
                .unwrap_or(false),
            StageKind::Checklist => trade
                .map(|t| checklist_satisfied(t, ctx.policy, ctx.timer, ctx.now))
                .unwrap_or(false),
            StageKind::PositionSizing => trade.map(sizing_resolved).unwrap_or(false),
            StageKind::HeatCheck => trade
                .map(|t| check_heat(t, ctx.book, ctx.policy, ctx.now).passed())
                .unwrap_or(false),
            StageKind::TradeEntry => trade.map(Trade::is_ready_for_history).unwrap_or(false),
            StageKind::ScreenerLaunch
            | StageKind::Calendar
            | StageKind::TradeManagement
            | StageKind::Analytics => true,
        }
    }

    fn set_nav_callbacks(&mut self, callbacks: NavCallbacks) {
        self.nav = Some(callbacks);
    }
}
