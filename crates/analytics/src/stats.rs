//! Trade performance statistics.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use tf_core::Trade;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Overall performance of realized trades.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TradeStats {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Percentage, 0..=100.
    pub win_rate: Decimal,
    pub total_pnl: Decimal,
    pub average_pnl: Decimal,
    pub average_win: Decimal,
    /// Negative or zero.
    pub average_loss: Decimal,
    pub largest_win: Decimal,
    /// Negative or zero.
    pub largest_loss: Decimal,
    /// Gross wins over gross losses; zero when there are no losses.
    pub profit_factor: Decimal,
    /// Largest peak-to-trough drop of cumulative P&L.
    pub max_drawdown: Decimal,
    /// `max_drawdown` as a percentage of the highest peak.
    pub max_drawdown_pct: Decimal,
    /// Positive for a run of wins, negative for a run of losses.
    pub current_streak: i64,
    pub longest_win_streak: usize,
    pub longest_loss_streak: usize,
}

/// Performance of one sector or one strategy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStats {
    pub key: String,
    pub total_trades: usize,
    pub win_rate: Decimal,
    pub total_pnl: Decimal,
    pub average_pnl: Decimal,
}

pub type SectorStats = GroupStats;
pub type StrategyStats = GroupStats;

/// Cumulative realized P&L after a trade closed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub at: DateTime<Utc>,
    pub equity: Decimal,
}

fn realized(trades: &[Trade]) -> impl Iterator<Item = (&Trade, Decimal)> + '_ {
    trades
        .iter()
        .filter_map(|t| t.profit_loss.map(|pnl| (t, pnl)))
}

fn percent(part: usize, whole: usize) -> Decimal {
    if whole == 0 {
        return Decimal::ZERO;
    }
    Decimal::from(part) * HUNDRED / Decimal::from(whole)
}

/// Statistics in history order. Break-even trades count toward the total
/// but neither extend nor break a streak.
pub fn trade_stats(trades: &[Trade]) -> TradeStats {
    let mut stats = TradeStats::default();
    let mut gross_wins = Decimal::ZERO;
    let mut gross_losses = Decimal::ZERO;
    let mut equity = Decimal::ZERO;
    let mut peak = Decimal::ZERO;
    let mut win_run = 0usize;
    let mut loss_run = 0usize;

    for (_, pnl) in realized(trades) {
        stats.total_trades += 1;
        stats.total_pnl += pnl;

        if pnl > Decimal::ZERO {
            stats.winning_trades += 1;
            gross_wins += pnl;
            stats.largest_win = stats.largest_win.max(pnl);
            win_run += 1;
            loss_run = 0;
            stats.longest_win_streak = stats.longest_win_streak.max(win_run);
        } else if pnl < Decimal::ZERO {
            stats.losing_trades += 1;
            gross_losses += pnl;
            stats.largest_loss = stats.largest_loss.min(pnl);
            loss_run += 1;
            win_run = 0;
            stats.longest_loss_streak = stats.longest_loss_streak.max(loss_run);
        }

        equity += pnl;
        peak = peak.max(equity);
        stats.max_drawdown = stats.max_drawdown.max(peak - equity);
    }

    if stats.total_trades == 0 {
        return stats;
    }

    stats.win_rate = percent(stats.winning_trades, stats.total_trades);
    stats.average_pnl = stats.total_pnl / Decimal::from(stats.total_trades);
    if stats.winning_trades > 0 {
        stats.average_win = gross_wins / Decimal::from(stats.winning_trades);
    }
    if stats.losing_trades > 0 {
        stats.average_loss = gross_losses / Decimal::from(stats.losing_trades);
        stats.profit_factor = gross_wins / gross_losses.abs();
    }
    if peak > Decimal::ZERO {
        stats.max_drawdown_pct = stats.max_drawdown / peak * HUNDRED;
    }
    stats.current_streak = if win_run > 0 {
        win_run as i64
    } else {
        -(loss_run as i64)
    };

    stats
}

fn group_stats<F>(trades: &[Trade], key: F) -> Vec<GroupStats>
where
    F: Fn(&Trade) -> &str,
{
    // (count, wins, total)
    let mut groups: BTreeMap<&str, (usize, usize, Decimal)> = BTreeMap::new();
    for (trade, pnl) in realized(trades) {
        let entry = groups.entry(key(trade)).or_insert((0, 0, Decimal::ZERO));
        entry.0 += 1;
        if pnl > Decimal::ZERO {
            entry.1 += 1;
        }
        entry.2 += pnl;
    }

    let mut result: Vec<GroupStats> = groups
        .into_iter()
        .map(|(key, (count, wins, total))| GroupStats {
            key: key.to_string(),
            total_trades: count,
            win_rate: percent(wins, count),
            total_pnl: total,
            average_pnl: total / Decimal::from(count),
        })
        .collect();
    // Stable sort keeps ties in key order
    result.sort_by(|a, b| b.total_pnl.cmp(&a.total_pnl));
    result
}

/// Per-sector statistics, best total P&L first.
pub fn sector_stats(trades: &[Trade]) -> Vec<SectorStats> {
    group_stats(trades, |t| t.sector.as_str())
}

/// Per-strategy statistics, best total P&L first.
pub fn strategy_stats(trades: &[Trade]) -> Vec<StrategyStats> {
    group_stats(trades, |t| t.strategy.as_str())
}

/// Cumulative P&L over time, starting from zero at the first trade's
/// creation. Points are stamped with the exit date when known.
pub fn equity_curve(trades: &[Trade]) -> Vec<EquityPoint> {
    let mut ordered: Vec<&Trade> = trades.iter().collect();
    ordered.sort_by_key(|t| t.created_at);

    let Some(first) = ordered.first() else {
        return Vec::new();
    };
    let mut curve = vec![EquityPoint {
        at: first.created_at,
        equity: Decimal::ZERO,
    }];

    let mut equity = Decimal::ZERO;
    for trade in ordered {
        if let Some(pnl) = trade.profit_loss {
            equity += pnl;
            curve.push(EquityPoint {
                at: trade.exit_date.unwrap_or(trade.updated_at),
                equity,
            });
        }
    }
    curve
}
