//! Workflow controller: screen state machine with gated, auto-saving transitions.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use guardrails::{
    check_heat, cooldown_complete, missing_required_items, size_position, CooldownTimer,
    HeatCheck, SizingResult,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tf_core::{
    required_strikes, Direction, Error, FeatureFlags, Policy, Result, Settings,
    StrategySuitability, Trade, MAX_CONVICTION, MIN_CONVICTION,
};
use tokio::sync::mpsc;
use trade_store::TradeRepository;
use tracing::{debug, error, info, warn};

use crate::stage::{
    NavCallbacks, NavCommand, Stage, StageContext, StageKind, StageSnapshot, WorkflowStage,
};

/// Where the user currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    Dashboard,
    Settings,
    Stage(usize),
}

impl Location {
    /// Numeric form: -1 dashboard, -2 settings, otherwise the stage index.
    pub fn as_index(self) -> i64 {
        match self {
            Self::Dashboard => -1,
            Self::Settings => -2,
            Self::Stage(index) => index as i64,
        }
    }
}

/// Out-of-band destinations reachable from anywhere without a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpTarget {
    Calendar,
    TradeManagement,
    Analytics,
    Settings,
}

impl JumpTarget {
    fn location(self) -> Location {
        match self {
            Self::Calendar => Location::Stage(StageKind::Calendar.index()),
            Self::TradeManagement => Location::Stage(StageKind::TradeManagement.index()),
            Self::Analytics => Location::Stage(StageKind::Analytics.index()),
            Self::Settings => Location::Settings,
        }
    }
}

/// Read-only guardrail figures for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardrailSnapshot {
    /// `None` until a cooldown has been started.
    pub cooldown_remaining_secs: Option<i64>,
    pub cooldown_complete: bool,
    pub missing_checklist_items: Vec<String>,
    pub heat: Option<HeatCheck>,
    pub sizing_preview: Option<SizingResult>,
}

/// Drives one user through the trade entry sequence.
pub struct WorkflowController {
    repo: Arc<dyn TradeRepository>,
    policy: Arc<Policy>,
    settings: Settings,
    flags: FeatureFlags,
    stages: Vec<Box<dyn Stage>>,
    location: Location,
    history: Vec<Location>,
    trade: Option<Trade>,
    timer: Option<CooldownTimer>,
    /// Completed trades, kept for heat accounting.
    book: Vec<Trade>,
    nav_tx: mpsc::UnboundedSender<NavCommand>,
    nav_rx: mpsc::UnboundedReceiver<NavCommand>,
}

impl WorkflowController {
    /// Create a controller at the dashboard. Loads the trade history for
    /// heat accounting.
    pub fn new(
        repo: Arc<dyn TradeRepository>,
        policy: Arc<Policy>,
        settings: Settings,
        flags: FeatureFlags,
    ) -> Result<Self> {
        Self::with_stages(repo, policy, settings, flags, WorkflowStage::all())
    }

    /// Create a controller with a custom stage list. Indices follow [`StageKind`].
    pub fn with_stages(
        repo: Arc<dyn TradeRepository>,
        policy: Arc<Policy>,
        settings: Settings,
        flags: FeatureFlags,
        mut stages: Vec<Box<dyn Stage>>,
    ) -> Result<Self> {
        if stages.len() != StageKind::ALL.len() {
            return Err(Error::InvalidInput {
                message: format!(
                    "expected {} stages, got {}",
                    StageKind::ALL.len(),
                    stages.len()
                ),
            });
        }

        let book = repo.load_all_trades()?;
        let (nav_tx, nav_rx) = mpsc::unbounded_channel();
        for stage in stages.iter_mut() {
            stage.set_nav_callbacks(NavCallbacks::new(nav_tx.clone()));
        }

        info!(
            completed_trades = book.len(),
            sectors = policy.sectors.len(),
            "Workflow controller ready"
        );

        Ok(Self {
            repo,
            policy,
            settings,
            flags,
            stages,
            location: Location::Dashboard,
            history: Vec::new(),
            trade: None,
            timer: None,
            book,
            nav_tx,
            nav_rx,
        })
    }

    // ==================== Accessors ====================

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn current_index(&self) -> i64 {
        self.location.as_index()
    }

    pub fn current_screen_name(&self) -> &'static str {
        match self.location {
            Location::Dashboard => "dashboard",
            Location::Settings => "settings",
            Location::Stage(index) => self.stages[index].name(),
        }
    }

    pub fn history_depth(&self) -> usize {
        self.history.len()
    }

    pub fn can_go_back(&self) -> bool {
        !self.history.is_empty()
    }

    pub fn trade(&self) -> Option<&Trade> {
        self.trade.as_ref()
    }

    /// Direct access for input not covered by a dedicated operation.
    pub fn trade_mut(&mut self) -> Option<&mut Trade> {
        self.trade.as_mut()
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Settings apply to trades created afterwards.
    pub fn update_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    pub fn feature_flags(&self) -> &FeatureFlags {
        &self.flags
    }

    pub fn book(&self) -> &[Trade] {
        &self.book
    }

    /// Reload completed trades, e.g. after edits through the store.
    pub fn refresh_book(&mut self) -> Result<()> {
        self.book = self.repo.load_all_trades()?;
        Ok(())
    }

    pub fn cooldown_timer(&self) -> Option<&CooldownTimer> {
        self.timer.as_ref()
    }

    /// Callbacks that queue navigation for [`pending_navigation`](Self::pending_navigation).
    pub fn nav_callbacks(&self) -> NavCallbacks {
        NavCallbacks::new(self.nav_tx.clone())
    }

    fn context(&self, now: DateTime<Utc>) -> StageContext<'_> {
        StageContext {
            trade: self.trade.as_ref(),
            policy: &self.policy,
            book: &self.book,
            timer: self.timer.as_ref(),
            flags: &self.flags,
            now,
        }
    }

    pub fn validate_current_screen(&self) -> bool {
        match self.location {
            Location::Stage(index) => self.stages[index].validate(&self.context(Utc::now())),
            Location::Dashboard | Location::Settings => true,
        }
    }

    pub fn stage_snapshots(&self) -> Vec<StageSnapshot> {
        let ctx = self.context(Utc::now());
        self.stages.iter().map(|s| s.snapshot(&ctx)).collect()
    }

    // ==================== Navigation ====================

    fn autosave(&mut self) -> Result<()> {
        let Some(trade) = self.trade.as_mut() else {
            return Ok(());
        };
        let trade_id = trade.id;
        self.repo.save_in_progress(trade).map_err(|e| {
            error!(%trade_id, error = %e, "Auto-save failed, transition blocked");
            e
        })
    }

    fn enter(&mut self, destination: Location) {
        self.history.push(self.location);
        debug!(
            from = self.location.as_index(),
            to = destination.as_index(),
            history_depth = self.history.len(),
            "Navigated"
        );
        self.location = destination;
    }

    /// Record the outcome of a gate that just passed on the trade itself.
    fn record_gate(&mut self, kind: StageKind, now: DateTime<Utc>) {
        match kind {
            StageKind::Checklist => {
                if let Some(trade) = self.trade.as_mut() {
                    trade.checklist_passed = true;
                }
            }
            StageKind::HeatCheck => {
                if let Some(trade) = self.trade.as_mut() {
                    let check = check_heat(trade, &self.book, &self.policy, now);
                    trade.portfolio_heat = check.projected_portfolio_heat;
                    trade.bucket_heat = check.projected_sector_heat;
                    trade.heat_check_passed = true;
                }
            }
            _ => {}
        }
    }

    /// Advance one stage in the main sequence.
    ///
    /// The current stage's gate must pass and the in-progress trade must
    /// save; on any failure the location and history are unchanged.
    pub fn next(&mut self) -> Result<()> {
        let now = Utc::now();
        let target = match self.location {
            Location::Dashboard => 0,
            Location::Settings => return Err(Error::NoMoreScreens),
            Location::Stage(index) => {
                let stage = &self.stages[index];
                if !stage.validate(&self.context(now)) {
                    info!(stage = stage.name(), "Validation gate failed");
                    return Err(Error::validation(stage.name()));
                }
                index + 1
            }
        };
        if target >= StageKind::MAIN_SEQUENCE_LEN {
            return Err(Error::NoMoreScreens);
        }

        if let Location::Stage(index) = self.location {
            self.record_gate(self.stages[index].kind(), now);
        }
        self.autosave()?;
        self.enter(Location::Stage(target));
        Ok(())
    }

    /// Return to the previous location. Reaching the dashboard clears history.
    pub fn back(&mut self) -> Result<()> {
        let Some(&previous) = self.history.last() else {
            return Err(Error::NoHistory);
        };
        self.autosave()?;
        self.history.pop();
        debug!(
            from = self.location.as_index(),
            to = previous.as_index(),
            "Navigated back"
        );
        self.location = previous;
        if previous == Location::Dashboard {
            self.history.clear();
        }
        Ok(())
    }

    /// Jump straight to a stage, bypassing sequence order and gates.
    pub fn navigate_to_screen(&mut self, index: i64) -> Result<()> {
        let stage = usize::try_from(index)
            .ok()
            .filter(|i| *i < self.stages.len())
            .ok_or(Error::InvalidScreenIndex(index))?;
        self.autosave()?;
        self.enter(Location::Stage(stage));
        Ok(())
    }

    /// Out-of-band jump; the main sequence's history is kept for `back()`.
    pub fn jump_to(&mut self, target: JumpTarget) -> Result<()> {
        self.autosave()?;
        self.enter(target.location());
        Ok(())
    }

    pub fn navigate_to_dashboard(&mut self) {
        self.location = Location::Dashboard;
        self.history.clear();
        debug!("Returned to dashboard");
    }

    /// Leave the workflow for the dashboard once `confirm` agrees. Progress
    /// is saved first; returns whether the cancel happened.
    pub fn cancel<F>(&mut self, confirm: F) -> Result<bool>
    where
        F: FnOnce() -> bool,
    {
        if !confirm() {
            debug!("Cancel declined");
            return Ok(false);
        }
        self.autosave()?;
        self.navigate_to_dashboard();
        info!("Trade entry cancelled, progress kept");
        Ok(true)
    }

    /// Execute navigation queued by stage callbacks, in order. Stops at the
    /// first failure; later commands stay queued.
    pub fn pending_navigation<F>(&mut self, mut confirm: F) -> Result<usize>
    where
        F: FnMut() -> bool,
    {
        let mut processed = 0;
        while let Ok(command) = self.nav_rx.try_recv() {
            match command {
                NavCommand::Next => self.next()?,
                NavCommand::Back => self.back()?,
                NavCommand::Cancel => {
                    self.cancel(&mut confirm)?;
                }
            }
            processed += 1;
        }
        Ok(processed)
    }

    // ==================== Trade input ====================

    fn current_trade(&mut self) -> Result<&mut Trade> {
        self.trade.as_mut().ok_or(Error::NoTradeInProgress)
    }

    /// Choose the sector, creating the trade on first choice.
    pub fn select_sector(&mut self, name: &str) -> Result<()> {
        let sector = self.policy.sector(name).ok_or_else(|| Error::UnknownSector {
            sector: name.to_string(),
        })?;
        if sector.blocked {
            warn!(sector = name, "Blocked sector rejected");
            return Err(Error::SectorBlocked {
                sector: name.to_string(),
            });
        }
        if sector.warning {
            warn!(sector = name, notes = %sector.notes, "Sector carries a policy warning");
        }

        match self.trade.as_mut() {
            Some(trade) => {
                trade.sector = name.to_string();
                trade.touch();
            }
            None => {
                let mut trade = Trade::new(name);
                trade.account_equity = self.settings.account_equity;
                trade.risk_per_trade = self.settings.risk_per_trade;
                info!(trade_id = %trade.id, sector = name, "Trade started");
                self.trade = Some(trade);
            }
        }
        Ok(())
    }

    /// Record ticker and strategy, then (re)start the cooldown.
    ///
    /// Strategies whose suitability for the sector requires acknowledgement
    /// are rejected unless `acknowledge_warning` is set.
    pub fn select_strategy(
        &mut self,
        ticker: &str,
        strategy_id: &str,
        direction: Option<Direction>,
        acknowledge_warning: bool,
    ) -> Result<StrategySuitability> {
        let ticker = ticker.trim().to_ascii_uppercase();
        if ticker.is_empty() {
            return Err(Error::InvalidInput {
                message: "ticker is required".to_string(),
            });
        }
        if !self.policy.strategies.contains_key(strategy_id) {
            return Err(Error::InvalidInput {
                message: format!("unknown strategy: {strategy_id}"),
            });
        }

        let sector = self
            .trade
            .as_ref()
            .map(|t| t.sector.clone())
            .ok_or(Error::NoTradeInProgress)?;
        let suitability = self.policy.strategy_suitability(&sector, strategy_id);
        if suitability.require_acknowledgement && !acknowledge_warning {
            return Err(Error::InvalidInput {
                message: format!(
                    "{strategy_id} is rated {} for {sector}; acknowledgement required",
                    suitability.rating
                ),
            });
        }

        let trade = self.current_trade()?;
        trade.ticker = ticker;
        trade.strategy = strategy_id.to_string();
        trade.direction = direction;
        trade.strategy_warning_acknowledged = acknowledge_warning && !suitability.is_green();

        self.start_cooldown()?;
        Ok(suitability)
    }

    /// Stamp a fresh cooldown start on the trade and arm the timer.
    pub fn start_cooldown(&mut self) -> Result<DateTime<Utc>> {
        let duration = self.policy.cooldown();
        let trade = self.current_trade()?;
        let started = trade.restart_cooldown(Utc::now());
        let trade_id = trade.id;

        if let Some(previous) = self.timer.take() {
            previous.stop();
        }
        self.timer = Some(CooldownTimer::from_timestamp(duration, started));
        info!(%trade_id, cooldown_secs = duration.num_seconds(), "Cooldown started");

        self.autosave()?;
        Ok(started)
    }

    /// Load the saved in-progress trade and rebuild its cooldown timer.
    pub fn resume_in_progress(&mut self) -> Result<Option<&Trade>> {
        let Some(trade) = self.repo.load_in_progress()? else {
            return Ok(None);
        };

        if let Some(previous) = self.timer.take() {
            previous.stop();
        }
        self.timer = trade
            .cooldown_start_time
            .map(|started| CooldownTimer::from_timestamp(self.policy.cooldown(), started));

        info!(
            trade_id = %trade.id,
            sector = %trade.sector,
            ticker = %trade.ticker,
            "Resumed in-progress trade"
        );
        self.trade = Some(trade);
        Ok(self.trade.as_ref())
    }

    pub fn set_checklist_item(&mut self, id: &str, checked: bool) -> Result<()> {
        let trade = self.trade.as_mut().ok_or(Error::NoTradeInProgress)?;
        trade.set_checklist_item(&self.policy.checklist, id, checked)
    }

    /// Size the position for a conviction rating and record it on the trade.
    pub fn apply_sizing(&mut self, conviction: u8) -> Result<SizingResult> {
        if !(MIN_CONVICTION..=MAX_CONVICTION).contains(&conviction) {
            return Err(Error::InvalidInput {
                message: format!(
                    "conviction must be between {MIN_CONVICTION} and {MAX_CONVICTION}, got {conviction}"
                ),
            });
        }

        let trade = self.trade.as_mut().ok_or(Error::NoTradeInProgress)?;
        let equity = if trade.account_equity > Decimal::ZERO {
            trade.account_equity
        } else {
            self.settings.account_equity
        };
        let risk = if trade.risk_per_trade > Decimal::ZERO {
            trade.risk_per_trade
        } else {
            self.settings.risk_per_trade
        };
        if equity <= Decimal::ZERO || risk <= Decimal::ZERO {
            return Err(Error::InvalidInput {
                message: "account equity and risk per trade must be positive".to_string(),
            });
        }

        let sizing = size_position(equity, risk, conviction, &self.policy);
        sizing.apply_to(trade, equity, risk);
        debug!(
            conviction,
            multiplier = %sizing.multiplier,
            risk_amount = %sizing.risk_amount,
            "Position sized"
        );
        Ok(sizing)
    }

    /// Project the trade onto the book and store the figures on the trade.
    pub fn record_heat_check(&mut self) -> Result<HeatCheck> {
        let now = Utc::now();
        let trade = self.trade.as_mut().ok_or(Error::NoTradeInProgress)?;
        let check = check_heat(trade, &self.book, &self.policy, now);
        trade.portfolio_heat = check.projected_portfolio_heat;
        trade.bucket_heat = check.projected_sector_heat;
        trade.heat_check_passed = check.passed();
        Ok(check)
    }

    /// Record the options structure. The strike count must match the structure.
    pub fn set_trade_entry(
        &mut self,
        structure: &str,
        strikes: Vec<Decimal>,
        dte: u32,
        premium: Option<Decimal>,
    ) -> Result<NaiveDate> {
        let needed = required_strikes(structure);
        if strikes.len() != needed {
            return Err(Error::InvalidInput {
                message: format!("{structure} needs {needed} strikes, got {}", strikes.len()),
            });
        }

        let trade = self.current_trade()?;
        let expiration = trade.set_expiration_from_dte(dte, Utc::now().date_naive())?;
        trade.set_strikes(strikes)?;
        trade.options_strategy = structure.to_string();
        trade.premium = premium;
        Ok(expiration)
    }

    /// Move the trade into history and show the calendar.
    ///
    /// Every gate up to trade entry is checked again first, including those
    /// of stages that were jumped over.
    pub fn complete_trade(&mut self) -> Result<Trade> {
        let now = Utc::now();
        let trade_id = self.trade.as_ref().ok_or(Error::NoTradeInProgress)?.id;

        let ctx = self.context(now);
        if let Some(stage) = self.stages[..=StageKind::TradeEntry.index()]
            .iter()
            .find(|stage| !stage.validate(&ctx))
        {
            info!(%trade_id, stage = stage.name(), "Gate not satisfied, cannot finish");
            return Err(Error::validation(stage.name()));
        }
        self.record_gate(StageKind::Checklist, now);
        self.record_gate(StageKind::HeatCheck, now);

        let trade = self.trade.as_mut().ok_or(Error::NoTradeInProgress)?;
        self.repo.save_completed(trade).map_err(|e| {
            error!(%trade_id, error = %e, "Failed to record completed trade");
            e
        })?;

        let completed = trade.clone();
        self.trade = None;
        if let Some(timer) = self.timer.take() {
            timer.stop();
        }
        self.book.push(completed.clone());

        self.history.clear();
        self.history.push(Location::Dashboard);
        self.location = Location::Stage(StageKind::Calendar.index());
        Ok(completed)
    }

    /// Drop the in-progress trade entirely.
    pub fn discard_trade(&mut self) -> Result<()> {
        self.repo.delete_in_progress()?;
        if let Some(trade) = self.trade.take() {
            info!(trade_id = %trade.id, "In-progress trade discarded");
        }
        if let Some(timer) = self.timer.take() {
            timer.stop();
        }
        self.navigate_to_dashboard();
        Ok(())
    }

    // ==================== Display ====================

    pub fn guardrail_snapshot(&self) -> GuardrailSnapshot {
        let now = Utc::now();
        let Some(trade) = self.trade.as_ref() else {
            return GuardrailSnapshot {
                cooldown_remaining_secs: None,
                cooldown_complete: false,
                missing_checklist_items: Vec::new(),
                heat: None,
                sizing_preview: None,
            };
        };

        let cooldown_remaining_secs = match &self.timer {
            Some(timer) => Some(timer.remaining_secs()),
            None => trade.cooldown_elapsed(now).map(|elapsed| {
                (self.policy.cooldown() - elapsed)
                    .max(Duration::zero())
                    .num_seconds()
            }),
        };

        GuardrailSnapshot {
            cooldown_remaining_secs,
            cooldown_complete: cooldown_complete(trade, &self.policy, self.timer.as_ref(), now),
            missing_checklist_items: missing_required_items(trade, &self.policy)
                .into_iter()
                .map(str::to_string)
                .collect(),
            heat: Some(check_heat(trade, &self.book, &self.policy, now)),
            sizing_preview: trade.conviction.map(|conviction| {
                size_position(
                    trade.account_equity,
                    trade.risk_per_trade,
                    conviction,
                    &self.policy,
                )
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use tf_core::{AppConfig, PersistenceError};
    use trade_store::TradeStore;

    mock! {
        Repo {}
        impl TradeRepository for Repo {
            fn save_in_progress(&self, trade: &mut Trade) -> Result<()>;
            fn load_in_progress(&self) -> Result<Option<Trade>>;
            fn save_completed(&self, trade: &mut Trade) -> Result<()>;
            fn load_all_trades(&self) -> Result<Vec<Trade>>;
            fn save_all_trades(&self, trades: &[Trade]) -> Result<()>;
            fn delete_in_progress(&self) -> Result<()>;
        }
    }

    fn disk_full() -> Error {
        PersistenceError::io(
            "data/trades_in_progress.json",
            std::io::Error::new(std::io::ErrorKind::Other, "no space left on device"),
        )
        .into()
    }

    fn quick_policy() -> Policy {
        let mut policy = Policy::safe_mode();
        policy.defaults.cooldown_seconds = 0;
        policy
    }

    fn controller(dir: &std::path::Path, policy: Policy) -> (WorkflowController, Arc<TradeStore>) {
        let store = Arc::new(TradeStore::from_config(&AppConfig::with_data_dir(dir)));
        let controller = WorkflowController::new(
            store.clone(),
            Arc::new(policy),
            Settings::default(),
            FeatureFlags::default(),
        )
        .unwrap();
        (controller, store)
    }

    /// Walk a Healthcare trade up to the trade entry stage.
    fn walk_to_trade_entry(c: &mut WorkflowController) {
        c.next().unwrap();
        c.select_sector("Healthcare").unwrap();
        c.next().unwrap();
        c.next().unwrap();
        c.select_strategy("unh", "Alt10", Some(Direction::Bullish), true).unwrap();
        c.next().unwrap();
        for id in c.policy().checklist.required.clone() {
            c.set_checklist_item(&id, true).unwrap();
        }
        c.next().unwrap();
        c.apply_sizing(7).unwrap();
        c.next().unwrap();
        c.next().unwrap();
        assert_eq!(c.current_screen_name(), "trade_entry");
    }

    #[test]
    fn test_gate_failure_leaves_state_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let (mut c, _) = controller(dir.path(), quick_policy());

        c.next().unwrap();
        assert_eq!(c.current_screen_name(), "sector_selection");
        assert_eq!(c.history_depth(), 1);

        let err = c.next().unwrap_err();
        assert!(matches!(err, Error::ValidationFailed { ref stage } if stage == "sector_selection"));
        assert_eq!(c.current_index(), 0);
        assert_eq!(c.history_depth(), 1);
    }

    #[test]
    fn test_full_walk_and_completion() {
        let dir = tempfile::tempdir().unwrap();
        let (mut c, store) = controller(dir.path(), quick_policy());
        walk_to_trade_entry(&mut c);

        let trade = c.trade().unwrap();
        assert_eq!(trade.ticker, "UNH");
        assert!(trade.checklist_passed);
        assert!(trade.heat_check_passed);
        assert_eq!(trade.max_loss, Decimal::new(750, 0));

        assert!(matches!(c.next(), Err(Error::ValidationFailed { .. })));
        assert!(c.complete_trade().is_err());

        let expiration = c
            .set_trade_entry(
                "Bull call spread",
                vec![Decimal::new(480, 0), Decimal::new(500, 0)],
                45,
                Some(Decimal::new(350, 2)),
            )
            .unwrap();
        assert_eq!(expiration, Utc::now().date_naive() + Duration::days(45));
        assert!(store.load_in_progress().unwrap().is_some());

        let completed = c.complete_trade().unwrap();
        assert_eq!(c.current_screen_name(), "calendar");
        assert!(c.trade().is_none());
        assert_eq!(c.book().len(), 1);
        assert!(store.load_in_progress().unwrap().is_none());
        assert_eq!(store.load_all_trades().unwrap()[0].id, completed.id);

        assert!(matches!(c.next(), Err(Error::NoMoreScreens)));
        c.back().unwrap();
        assert_eq!(c.location(), Location::Dashboard);
        assert_eq!(c.history_depth(), 0);
    }

    #[test]
    fn test_cooldown_blocks_checklist() {
        let dir = tempfile::tempdir().unwrap();
        let (mut c, _) = controller(dir.path(), Policy::safe_mode());
        c.navigate_to_screen(0).unwrap();
        c.select_sector("Technology").unwrap();
        c.navigate_to_screen(2).unwrap();
        c.select_strategy("MSFT", "Alt26", None, true).unwrap();
        c.next().unwrap();
        for id in c.policy().checklist.required.clone() {
            c.set_checklist_item(&id, true).unwrap();
        }

        assert!(!c.validate_current_screen());
        let snapshot = c.guardrail_snapshot();
        assert!(!snapshot.cooldown_complete);
        assert!(snapshot.cooldown_remaining_secs.unwrap() > 100);
        assert!(snapshot.missing_checklist_items.is_empty());
        assert!(matches!(c.next(), Err(Error::ValidationFailed { .. })));
    }

    #[test]
    fn test_back_and_history() {
        let dir = tempfile::tempdir().unwrap();
        let (mut c, _) = controller(dir.path(), quick_policy());
        assert!(matches!(c.back(), Err(Error::NoHistory)));

        c.next().unwrap();
        c.select_sector("Healthcare").unwrap();
        c.next().unwrap();
        assert_eq!(c.history_depth(), 2);

        c.back().unwrap();
        assert_eq!(c.current_index(), 0);
        c.back().unwrap();
        assert_eq!(c.location(), Location::Dashboard);
        assert!(!c.can_go_back());
    }

    #[test]
    fn test_navigate_to_screen_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let (mut c, _) = controller(dir.path(), quick_policy());

        assert!(matches!(c.navigate_to_screen(10), Err(Error::InvalidScreenIndex(10))));
        assert!(matches!(c.navigate_to_screen(-1), Err(Error::InvalidScreenIndex(-1))));
        assert_eq!(c.history_depth(), 0);

        c.navigate_to_screen(9).unwrap();
        assert_eq!(c.current_screen_name(), "analytics");
        assert!(matches!(c.next(), Err(Error::NoMoreScreens)));
    }

    #[test]
    fn test_jumps_keep_history() {
        let dir = tempfile::tempdir().unwrap();
        let (mut c, _) = controller(dir.path(), quick_policy());
        c.next().unwrap();
        c.select_sector("Healthcare").unwrap();

        c.jump_to(JumpTarget::Settings).unwrap();
        assert_eq!(c.current_index(), -2);
        assert_eq!(c.current_screen_name(), "settings");
        assert!(matches!(c.next(), Err(Error::NoMoreScreens)));

        c.jump_to(JumpTarget::TradeManagement).unwrap();
        assert_eq!(c.current_index(), 8);
        c.back().unwrap();
        c.back().unwrap();
        assert_eq!(c.current_screen_name(), "sector_selection");
    }

    #[test]
    fn test_cancel_requires_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let (mut c, store) = controller(dir.path(), quick_policy());
        c.next().unwrap();
        c.select_sector("Healthcare").unwrap();

        assert!(!c.cancel(|| false).unwrap());
        assert_eq!(c.current_index(), 0);

        assert!(c.cancel(|| true).unwrap());
        assert_eq!(c.location(), Location::Dashboard);
        assert_eq!(c.history_depth(), 0);
        assert_eq!(store.load_in_progress().unwrap().unwrap().sector, "Healthcare");
    }

    #[test]
    fn test_sector_rules() {
        let dir = tempfile::tempdir().unwrap();
        let (mut c, _) = controller(dir.path(), quick_policy());

        assert!(matches!(c.select_sector("Utilities"), Err(Error::SectorBlocked { .. })));
        assert!(matches!(c.select_sector("Crypto"), Err(Error::UnknownSector { .. })));
        assert!(c.trade().is_none());

        c.select_sector("Healthcare").unwrap();
        let id = c.trade().unwrap().id;
        assert_eq!(c.trade().unwrap().account_equity, Settings::default().account_equity);
        c.select_sector("Technology").unwrap();
        assert_eq!(c.trade().unwrap().id, id);
        assert_eq!(c.trade().unwrap().sector, "Technology");
    }

    #[test]
    fn test_strategy_acknowledgement() {
        let dir = tempfile::tempdir().unwrap();
        let (mut c, _) = controller(dir.path(), quick_policy());
        assert!(matches!(
            c.select_strategy("UNH", "Alt10", None, true),
            Err(Error::NoTradeInProgress)
        ));

        c.select_sector("Healthcare").unwrap();
        assert!(c.select_strategy("UNH", "Alt10", None, false).is_err());
        assert!(c.select_strategy("UNH", "Nope", None, true).is_err());

        let suitability = c.select_strategy("UNH", "Alt10", None, true).unwrap();
        assert!(suitability.require_acknowledgement);
        let trade = c.trade().unwrap();
        assert!(trade.strategy_warning_acknowledged);
        assert!(trade.cooldown_start_time.is_some());
    }

    #[test]
    fn test_restart_cooldown_gets_new_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let (mut c, _) = controller(dir.path(), Policy::safe_mode());
        c.select_sector("Healthcare").unwrap();

        let first = c.start_cooldown().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = c.start_cooldown().unwrap();
        assert!(second > first);
        assert_eq!(c.trade().unwrap().cooldown_start_time, Some(second));
        assert_eq!(c.cooldown_timer().unwrap().started_at(), second);
    }

    #[test]
    fn test_resume_rebuilds_timer() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(TradeStore::from_config(&AppConfig::with_data_dir(dir.path())));
        let mut saved = Trade::new("Healthcare");
        saved.begin_cooldown(Utc::now() - Duration::seconds(300));
        store.save_in_progress(&mut saved).unwrap();

        let mut c = WorkflowController::new(
            store,
            Arc::new(Policy::safe_mode()),
            Settings::default(),
            FeatureFlags::default(),
        )
        .unwrap();
        let resumed = c.resume_in_progress().unwrap().unwrap();
        assert_eq!(resumed.id, saved.id);
        assert!(c.cooldown_timer().unwrap().is_complete());
        assert_eq!(c.guardrail_snapshot().cooldown_remaining_secs, Some(0));
    }

    #[test]
    fn test_sizing_rejects_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let (mut c, _) = controller(dir.path(), quick_policy());
        assert!(matches!(c.apply_sizing(7), Err(Error::NoTradeInProgress)));

        c.select_sector("Healthcare").unwrap();
        assert!(matches!(c.apply_sizing(9), Err(Error::InvalidInput { .. })));
        let sizing = c.apply_sizing(5).unwrap();
        assert_eq!(sizing.multiplier, Decimal::ONE);
        assert_eq!(c.guardrail_snapshot().sizing_preview, Some(sizing));
    }

    #[test]
    fn test_trade_entry_strike_count() {
        let dir = tempfile::tempdir().unwrap();
        let (mut c, _) = controller(dir.path(), quick_policy());
        c.select_sector("Healthcare").unwrap();

        let err = c
            .set_trade_entry("Iron condor", vec![Decimal::new(100, 0)], 30, None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
        assert!(c.trade().unwrap().options_strategy.is_empty());
    }

    #[test]
    fn test_discard_removes_in_progress() {
        let dir = tempfile::tempdir().unwrap();
        let (mut c, store) = controller(dir.path(), quick_policy());
        c.next().unwrap();
        c.select_sector("Healthcare").unwrap();
        c.next().unwrap();
        assert!(store.load_in_progress().unwrap().is_some());

        c.discard_trade().unwrap();
        assert!(c.trade().is_none());
        assert_eq!(c.location(), Location::Dashboard);
        assert!(store.load_in_progress().unwrap().is_none());
    }

    #[test]
    fn test_pending_navigation_runs_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let (mut c, _) = controller(dir.path(), quick_policy());
        c.select_sector("Healthcare").unwrap();

        let nav = c.nav_callbacks();
        nav.on_next();
        nav.on_next();
        nav.on_back();
        assert_eq!(c.pending_navigation(|| true).unwrap(), 3);
        assert_eq!(c.current_screen_name(), "sector_selection");

        nav.on_cancel();
        let mut asked = 0;
        assert_eq!(c.pending_navigation(|| { asked += 1; true }).unwrap(), 1);
        assert_eq!(asked, 1);
        assert_eq!(c.location(), Location::Dashboard);
    }

    #[test]
    fn test_pending_navigation_stops_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (mut c, _) = controller(dir.path(), quick_policy());

        let nav = c.nav_callbacks();
        nav.on_next();
        nav.on_next();
        nav.on_back();

        assert!(matches!(c.pending_navigation(|| true), Err(Error::ValidationFailed { .. })));
        assert_eq!(c.current_index(), 0);
        // The queued back still runs on the next drain
        assert_eq!(c.pending_navigation(|| true).unwrap(), 1);
        assert_eq!(c.location(), Location::Dashboard);
    }

    #[test]
    fn test_persistence_failure_blocks_transitions() {
        let mut repo = MockRepo::new();
        repo.expect_load_all_trades().returning(|| Ok(Vec::new()));
        repo.expect_save_in_progress().returning(|_| Err(disk_full()));

        let mut c = WorkflowController::new(
            Arc::new(repo),
            Arc::new(quick_policy()),
            Settings::default(),
            FeatureFlags::default(),
        )
        .unwrap();

        // No trade yet: nothing to save, navigation proceeds
        c.next().unwrap();
        c.select_sector("Healthcare").unwrap();

        let err = c.next().unwrap_err();
        assert!(err.is_persistence());
        assert_eq!(c.current_index(), 0);
        assert_eq!(c.history_depth(), 1);

        assert!(c.back().unwrap_err().is_persistence());
        assert!(c.cancel(|| true).unwrap_err().is_persistence());
        assert!(c.jump_to(JumpTarget::Calendar).is_err());
        assert_eq!(c.current_index(), 0);
    }

    #[test]
    fn test_trade_entry_rejects_out_of_range_dte() {
        let dir = tempfile::tempdir().unwrap();
        let (mut c, _) = controller(dir.path(), quick_policy());
        c.select_sector("Healthcare").unwrap();

        let strikes = vec![Decimal::new(1, 0), Decimal::new(2, 0)];
        let err = c
            .set_trade_entry("Bull call spread", strikes, u32::MAX, None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));

        let trade = c.trade().unwrap();
        assert!(trade.options_strategy.is_empty());
        assert!(trade.strikes.is_empty());
        assert!(trade.expiration_date.is_none());
    }

    /// Fill a trade's fields directly without passing through the stages.
    fn enter_without_stages(c: &mut WorkflowController) {
        c.select_sector("Healthcare").unwrap();
        c.select_strategy("unh", "Alt10", Some(Direction::Bullish), true).unwrap();
        c.apply_sizing(7).unwrap();
        c.set_trade_entry("Long call", vec![Decimal::new(500, 0)], 30, None)
            .unwrap();
    }

    #[test]
    fn test_completion_reruns_guardrails() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(TradeStore::from_config(&AppConfig::with_data_dir(dir.path())));

        // Healthcare already sits exactly at the sector cap
        let settings = Settings::default();
        let mut full = Trade::new("Healthcare");
        full.account_equity = settings.account_equity;
        full.max_loss = settings.account_equity * Policy::safe_mode().defaults.bucket_heat_cap;
        store.save_all_trades(&[full]).unwrap();

        let failed_stage = |err: Error| match err {
            Error::ValidationFailed { stage } => stage,
            other => panic!("unexpected error: {other}"),
        };

        // Cooldown still running even with every item ticked
        let (mut c, _) = controller(dir.path(), Policy::safe_mode());
        enter_without_stages(&mut c);
        for id in c.policy().checklist.required.clone() {
            c.set_checklist_item(&id, true).unwrap();
        }
        assert_eq!(failed_stage(c.complete_trade().unwrap_err()), "checklist");
        c.discard_trade().unwrap();

        // No cooldown: the checklist blocks first, then heat
        let (mut c, _) = controller(dir.path(), quick_policy());
        enter_without_stages(&mut c);
        assert_eq!(failed_stage(c.complete_trade().unwrap_err()), "checklist");
        for id in c.policy().checklist.required.clone() {
            c.set_checklist_item(&id, true).unwrap();
        }
        assert_eq!(failed_stage(c.complete_trade().unwrap_err()), "heat_check");

        let trade = c.trade().unwrap();
        assert!(!trade.checklist_passed);
        assert!(!trade.heat_check_passed);
        assert_eq!(c.book().len(), 1);
        assert_eq!(store.load_all_trades().unwrap().len(), 1);
    }

    #[test]
    fn test_completion_records_gate_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let (mut c, store) = controller(dir.path(), quick_policy());
        enter_without_stages(&mut c);
        for id in c.policy().checklist.required.clone() {
            c.set_checklist_item(&id, true).unwrap();
        }

        let completed = c.complete_trade().unwrap();
        assert!(completed.checklist_passed);
        assert!(completed.heat_check_passed);
        assert_eq!(completed.bucket_heat, Decimal::new(75, 4));
        assert_eq!(store.load_all_trades().unwrap()[0], completed);
    }

    #[test]
    fn test_completion_failure_keeps_trade() {
        let mut repo = MockRepo::new();
        repo.expect_load_all_trades().returning(|| Ok(Vec::new()));
        repo.expect_save_in_progress().returning(|_| Ok(()));
        repo.expect_save_completed().times(1).returning(|_| Err(disk_full()));

        let mut c = WorkflowController::new(
            Arc::new(repo),
            Arc::new(quick_policy()),
            Settings::default(),
            FeatureFlags::default(),
        )
        .unwrap();
        walk_to_trade_entry(&mut c);
        c.set_trade_entry("Long call", vec![Decimal::new(500, 0)], 30, None)
            .unwrap();

        assert!(c.complete_trade().unwrap_err().is_persistence());
        assert!(c.trade().is_some());
        assert_eq!(c.current_screen_name(), "trade_entry");
        assert!(c.book().is_empty());
    }

    #[test]
    fn test_history_load_failure_is_reported() {
        let mut repo = MockRepo::new();
        repo.expect_load_all_trades().returning(|| Err(disk_full()));

        let result = WorkflowController::new(
            Arc::new(repo),
            Arc::new(quick_policy()),
            Settings::default(),
            FeatureFlags::default(),
        );
        assert!(matches!(result, Err(Error::PersistenceFailed(_))));
    }

    #[test]
    fn test_stage_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let (c, _) = controller(dir.path(), quick_policy());
        let snapshots = c.stage_snapshots();
        assert_eq!(snapshots.len(), 10);
        assert!(!snapshots[0].valid);
        assert!(snapshots[7].available);
        assert!(!snapshots[8].available);
    }
}
