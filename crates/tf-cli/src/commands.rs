//! Boot sequence and subcommand handlers.

use anyhow::{Context, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tf_core::{AppConfig, FeatureFlags, Policy, PolicySource, Settings, Trade, TradeStatus};
use trade_store::{SettingsStore, TradeStore};
use tracing::{info, warn};
use uuid::Uuid;
use workflow::WorkflowController;

fn pct(ratio: Decimal) -> String {
    format!("{}%", (ratio * Decimal::ONE_HUNDRED).round_dp(2))
}

fn short_id(id: Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

pub struct App {
    store: Arc<TradeStore>,
    policy_source: PolicySource,
    controller: WorkflowController,
}

impl App {
    /// Directories, policy, flags, settings, history, then any in-progress trade.
    pub fn boot(config: AppConfig) -> Result<Self> {
        config
            .ensure_directories()
            .context("Failed to create data directories")?;

        let (policy, policy_source) = Policy::load_or_safe_mode(&config.policy_path);

        let flags = FeatureFlags::load(&config.feature_flags_path).unwrap_or_else(|e| {
            warn!(error = %e, "Feature flags unavailable, all features off");
            FeatureFlags::default()
        });

        let settings = SettingsStore::from_config(&config).load().unwrap_or_else(|e| {
            warn!(error = %e, "Settings unreadable, using defaults");
            Settings::default()
        });

        let store = Arc::new(TradeStore::from_config(&config));
        let mut controller =
            WorkflowController::new(store.clone(), Arc::new(policy), settings, flags)
                .context("Failed to load trade history")?;

        if let Err(e) = controller.resume_in_progress() {
            warn!(error = %e, "In-progress trade unreadable, ignoring it");
        }

        info!(
            data_dir = %config.data_dir.display(),
            safe_mode = policy_source.is_safe_mode(),
            trades = controller.book().len(),
            in_progress = controller.trade().is_some(),
            "TF-Engine ready"
        );

        Ok(Self {
            store,
            policy_source,
            controller,
        })
    }

    pub fn status(&self) -> Result<()> {
        match &self.policy_source {
            PolicySource::File(path) => {
                let policy = self.controller.policy();
                println!(
                    "Policy:        {} ({})",
                    policy.version.as_deref().unwrap_or("unversioned"),
                    path.display()
                );
            }
            PolicySource::SafeMode { reason } => {
                println!("Policy:        SAFE MODE ({reason})");
            }
        }

        let settings = self.controller.settings();
        println!("Equity:        ${}", settings.account_equity);
        println!(
            "Risk/trade:    {} (standard bet ${})",
            pct(settings.risk_per_trade),
            settings.standard_bet().round_dp(2)
        );
        println!(
            "Heat caps:     portfolio {}, sector {}",
            pct(self.controller.policy().defaults.portfolio_heat_cap),
            pct(self.controller.policy().defaults.bucket_heat_cap)
        );

        let now = Utc::now();
        let open_risk: Decimal = self
            .controller
            .book()
            .iter()
            .filter(|t| t.is_active_at(now))
            .map(|t| t.max_loss)
            .sum();
        if settings.account_equity > Decimal::ZERO {
            println!(
                "Open heat:     {} (${open_risk})",
                pct(open_risk / settings.account_equity)
            );
        }

        let flags = self.controller.feature_flags().enabled_flags();
        if !flags.is_empty() {
            println!("Features:      {}", flags.join(", "));
        }

        let Some(trade) = self.controller.trade() else {
            println!("In progress:   none");
            return Ok(());
        };

        println!(
            "In progress:   {} {} {} [{}]",
            trade.sector,
            if trade.ticker.is_empty() { "-" } else { trade.ticker.as_str() },
            if trade.strategy.is_empty() { "-" } else { trade.strategy.as_str() },
            short_id(trade.id)
        );

        let snapshot = self.controller.guardrail_snapshot();
        match snapshot.cooldown_remaining_secs {
            Some(0) => println!("  Cooldown:    complete"),
            Some(secs) => println!("  Cooldown:    {}:{:02} remaining", secs / 60, secs % 60),
            None => println!("  Cooldown:    not started"),
        }
        if !snapshot.missing_checklist_items.is_empty() {
            println!("  Checklist:   missing {}", snapshot.missing_checklist_items.join(", "));
        }
        if let Some(sizing) = snapshot.sizing_preview {
            println!(
                "  Sizing:      conviction {} x{} = ${}",
                sizing.conviction,
                sizing.multiplier,
                sizing.risk_amount.round_dp(2)
            );
        }
        if let Some(heat) = snapshot.heat {
            println!(
                "  Heat:        portfolio {} / {}, sector {} / {} ({})",
                pct(heat.projected_portfolio_heat),
                pct(heat.portfolio_cap),
                pct(heat.projected_sector_heat),
                pct(heat.sector_cap),
                if heat.passed() { "ok" } else { "OVER CAP" }
            );
        }
        Ok(())
    }

    pub fn trades(&self, status: Option<TradeStatus>) -> Result<()> {
        let now = Utc::now();
        let trades = self.store.trades_with_status(status, now)?;
        if trades.is_empty() {
            println!("No trades");
            return Ok(());
        }

        println!(
            "{:<8}  {:<10}  {:<14}  {:<6}  {:<8}  {:<8}  {:>10}  {:>10}",
            "ID", "CREATED", "SECTOR", "TICKER", "STRATEGY", "STATUS", "MAX LOSS", "P&L"
        );
        for trade in &trades {
            println!(
                "{:<8}  {:<10}  {:<14}  {:<6}  {:<8}  {:<8}  {:>10}  {:>10}",
                short_id(trade.id),
                trade.created_at.date_naive(),
                trade.sector,
                trade.ticker,
                trade.strategy,
                trade.status_at(now).as_str(),
                trade.max_loss.round_dp(2),
                trade
                    .profit_loss
                    .map(|p| p.round_dp(2).to_string())
                    .unwrap_or_else(|| "-".to_string()),
            );
        }
        Ok(())
    }

    pub fn stats(&self) -> Result<()> {
        let book = self.controller.book();
        let stats = analytics::trade_stats(book);
        if stats.total_trades == 0 {
            println!("No closed trades yet");
            return Ok(());
        }

        println!(
            "Trades:        {} ({} won, {} lost, win rate {}%)",
            stats.total_trades,
            stats.winning_trades,
            stats.losing_trades,
            stats.win_rate.round_dp(1)
        );
        println!(
            "P&L:           total ${}, average ${}",
            stats.total_pnl.round_dp(2),
            stats.average_pnl.round_dp(2)
        );
        println!(
            "Wins/losses:   avg ${} / ${}, largest ${} / ${}",
            stats.average_win.round_dp(2),
            stats.average_loss.round_dp(2),
            stats.largest_win.round_dp(2),
            stats.largest_loss.round_dp(2)
        );
        println!("Profit factor: {}", stats.profit_factor.round_dp(2));
        println!(
            "Drawdown:      ${} ({}%)",
            stats.max_drawdown.round_dp(2),
            stats.max_drawdown_pct.round_dp(1)
        );
        println!(
            "Streaks:       current {}, longest win {}, longest loss {}",
            stats.current_streak, stats.longest_win_streak, stats.longest_loss_streak
        );

        for (title, groups) in [
            ("By sector", analytics::sector_stats(book)),
            ("By strategy", analytics::strategy_stats(book)),
        ] {
            println!("\n{title}:");
            for group in groups {
                println!(
                    "  {:<16} {:>3} trades  {:>6}% win  total ${:>10}  avg ${:>9}",
                    group.key,
                    group.total_trades,
                    group.win_rate.round_dp(1),
                    group.total_pnl.round_dp(2),
                    group.average_pnl.round_dp(2)
                );
            }
        }
        Ok(())
    }

    pub fn strategies(&self, sector: &str, count: usize) -> Result<()> {
        let policy = self.controller.policy();
        let Some(found) = policy.sector(sector) else {
            anyhow::bail!("Unknown sector: {sector}");
        };
        if found.blocked {
            println!("{sector} is blocked by policy");
            return Ok(());
        }

        for option in policy.strategies_for_sector(sector, count) {
            println!(
                "{:<6} {:<32} {:<12} {}{}",
                option.id,
                option.strategy.label,
                option.suitability.rating,
                option.suitability.color,
                if option.suitability.require_acknowledgement {
                    " (acknowledge)"
                } else {
                    ""
                }
            );
        }
        Ok(())
    }

    fn find(&self, id: Uuid) -> Result<Trade> {
        self.controller
            .book()
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .with_context(|| format!("No trade with id {id}"))
    }

    pub fn close(&mut self, id: Uuid, exit_price: Decimal, pnl: Decimal) -> Result<()> {
        let mut trade = self.find(id)?;
        trade.close(Utc::now(), exit_price, pnl);
        self.store.update_trade(&trade)?;
        self.controller.refresh_book()?;
        println!("Closed {} {} with P&L ${}", trade.ticker, short_id(id), pnl);
        Ok(())
    }

    pub fn delete(&mut self, id: Uuid) -> Result<()> {
        let removed = self.store.delete_trade(id)?;
        self.controller.refresh_book()?;
        println!("Deleted {} {}", removed.ticker, short_id(id));
        Ok(())
    }

    pub fn discard(&mut self) -> Result<()> {
        if self.controller.trade().is_none() {
            println!("No trade in progress");
        }
        // Also clears a file that failed to load at boot
        self.controller.discard_trade()?;
        Ok(())
    }
}
