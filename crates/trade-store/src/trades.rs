//! File-backed trade repository.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tf_core::{AppConfig, Error, PersistenceError, Result, Trade, TradeStatus};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::atomic;
use crate::repository::TradeRepository;

/// JSON file store for the in-progress trade and trade history.
///
/// One reader/writer lock covers both files. Writers hold it for the whole
/// read-modify-write-rename cycle.
#[derive(Debug)]
pub struct TradeStore {
    trades_path: PathBuf,
    in_progress_path: PathBuf,
    backup_dir: PathBuf,
    lock: RwLock<()>,
}

impl TradeStore {
    pub fn new(
        trades_path: impl Into<PathBuf>,
        in_progress_path: impl Into<PathBuf>,
        backup_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            trades_path: trades_path.into(),
            in_progress_path: in_progress_path.into(),
            backup_dir: backup_dir.into(),
            lock: RwLock::new(()),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.trades_path(),
            config.in_progress_path(),
            config.backup_dir(),
        )
    }

    pub fn trades_path(&self) -> &Path {
        &self.trades_path
    }

    pub fn in_progress_path(&self) -> &Path {
        &self.in_progress_path
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    fn read(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ()> {
        self.lock.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn load_history_locked(&self) -> std::result::Result<Vec<Trade>, PersistenceError> {
        Ok(atomic::read_json(&self.trades_path)?.unwrap_or_default())
    }

    /// Back up the current history file (best effort), then replace it.
    fn write_history_locked(&self, trades: &[Trade], now: DateTime<Utc>) -> Result<()> {
        if self.trades_path.exists() {
            match atomic::backup(&self.trades_path, &self.backup_dir, now) {
                Ok(dest) => debug!(backup = %dest.display(), "Trade history backed up"),
                Err(e) => warn!(
                    backup_dir = %self.backup_dir.display(),
                    error = %e,
                    "Failed to back up trade history, continuing"
                ),
            }
        }

        atomic::write_json(&self.trades_path, trades).map_err(|e| {
            error!(path = %e.path().display(), error = %e, "Failed to write trade history");
            Error::from(e)
        })
    }

    /// Replace the history record with the same ID.
    pub fn update_trade(&self, trade: &Trade) -> Result<()> {
        let _guard = self.write();
        let mut trades = self.load_history_locked()?;

        let slot = trades
            .iter_mut()
            .find(|t| t.id == trade.id)
            .ok_or(Error::TradeNotFound(trade.id))?;
        *slot = trade.clone();

        self.write_history_locked(&trades, Utc::now())?;
        info!(trade_id = %trade.id, ticker = %trade.ticker, "Trade updated");
        Ok(())
    }

    /// Remove a trade from history, returning it.
    pub fn delete_trade(&self, id: Uuid) -> Result<Trade> {
        let _guard = self.write();
        let mut trades = self.load_history_locked()?;

        let index = trades
            .iter()
            .position(|t| t.id == id)
            .ok_or(Error::TradeNotFound(id))?;
        let removed = trades.remove(index);

        self.write_history_locked(&trades, Utc::now())?;
        info!(trade_id = %id, ticker = %removed.ticker, "Trade deleted");
        Ok(removed)
    }

    /// History filtered by derived status; `None` returns everything.
    pub fn trades_with_status(
        &self,
        status: Option<TradeStatus>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Trade>> {
        let trades = self.load_all_trades()?;
        Ok(match status {
            Some(status) => trades
                .into_iter()
                .filter(|t| t.status_at(now) == status)
                .collect(),
            None => trades,
        })
    }
}

impl TradeRepository for TradeStore {
    fn save_in_progress(&self, trade: &mut Trade) -> Result<()> {
        let _guard = self.write();
        trade.touch();

        atomic::write_json(&self.in_progress_path, &*trade).map_err(|e| {
            error!(trade_id = %trade.id, error = %e, "Failed to save in-progress trade");
            Error::from(e)
        })?;
        debug!(trade_id = %trade.id, "In-progress trade saved");
        Ok(())
    }

    fn load_in_progress(&self) -> Result<Option<Trade>> {
        let _guard = self.read();
        Ok(atomic::read_json(&self.in_progress_path)?)
    }

    fn save_completed(&self, trade: &mut Trade) -> Result<()> {
        let _guard = self.write();
        let now = Utc::now();
        trade.updated_at = now;

        let mut trades = self.load_history_locked().unwrap_or_else(|e| {
            warn!(error = %e, "Trade history unreadable, starting a new one");
            Vec::new()
        });
        trades.push(trade.clone());

        self.write_history_locked(&trades, now)?;

        if let Err(e) = atomic::remove_if_exists(&self.in_progress_path) {
            warn!(error = %e, "Failed to clear in-progress trade after completion");
        }

        info!(
            trade_id = %trade.id,
            ticker = %trade.ticker,
            sector = %trade.sector,
            history_len = trades.len(),
            "Trade completed"
        );
        Ok(())
    }

    fn load_all_trades(&self) -> Result<Vec<Trade>> {
        let _guard = self.read();
        Ok(self.load_history_locked()?)
    }

    fn save_all_trades(&self, trades: &[Trade]) -> Result<()> {
        let _guard = self.write();
        self.write_history_locked(trades, Utc::now())
    }

    fn delete_in_progress(&self) -> Result<()> {
        let _guard = self.write();
        if atomic::remove_if_exists(&self.in_progress_path)? {
            debug!("In-progress trade deleted");
        }
        Ok(())
    }
}
