//! Analytics
//!
//! Performance statistics over the completed-trade history. Only trades
//! with a realized P&L take part.

pub mod stats;

pub use stats::{
    equity_curve, sector_stats, strategy_stats, trade_stats, EquityPoint, GroupStats, SectorStats,
    StrategyStats, TradeStats,
};
