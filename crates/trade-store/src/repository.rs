//! Persistence seam used by the workflow controller.

use tf_core::{Result, Trade};

/// Storage for the single in-progress trade and the completed-trade history.
///
/// Every failure is reported as `Error::PersistenceFailed`.
pub trait TradeRepository: Send + Sync {
    /// Stamp `updated_at` and atomically write the in-progress record.
    fn save_in_progress(&self, trade: &mut Trade) -> Result<()>;

    /// The in-progress trade, `None` when there is none.
    fn load_in_progress(&self) -> Result<Option<Trade>>;

    /// Append to history (backing up the previous file) and clear the in-progress record.
    fn save_completed(&self, trade: &mut Trade) -> Result<()>;

    /// Complete history; empty when no history file exists.
    fn load_all_trades(&self) -> Result<Vec<Trade>>;

    /// Replace the whole history. Leaves the in-progress record alone.
    fn save_all_trades(&self, trades: &[Trade]) -> Result<()>;

    /// Idempotent.
    fn delete_in_progress(&self) -> Result<()>;
}
