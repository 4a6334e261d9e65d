//! Poker-bet position sizing.

use rust_decimal::Decimal;
use serde::Serialize;
use tf_core::{Policy, Trade, MAX_CONVICTION, MIN_CONVICTION};

/// Risk budget for one trade at a given conviction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SizingResult {
    pub conviction: u8,
    pub multiplier: Decimal,
    /// Equity x risk fraction, before the conviction multiplier.
    pub base_risk: Decimal,
    pub risk_amount: Decimal,
}

impl SizingResult {
    pub fn conviction_in_range(&self) -> bool {
        (MIN_CONVICTION..=MAX_CONVICTION).contains(&self.conviction)
    }

    /// Record the sizing on the trade; the risk amount becomes its max loss.
    pub fn apply_to(&self, trade: &mut Trade, account_equity: Decimal, risk_per_trade: Decimal) {
        trade.conviction = Some(self.conviction);
        trade.account_equity = account_equity;
        trade.risk_per_trade = risk_per_trade;
        trade.sizing_multiplier = self.multiplier;
        trade.max_loss = self.risk_amount;
    }
}

/// `equity x risk fraction x multiplier`, the multiplier looked up by
/// conviction in the policy's sizing table (1.0 when absent).
pub fn size_position(
    account_equity: Decimal,
    risk_per_trade: Decimal,
    conviction: u8,
    policy: &Policy,
) -> SizingResult {
    let multiplier = policy.poker_multiplier(conviction);
    let base_risk = account_equity * risk_per_trade;
    SizingResult {
        conviction,
        multiplier,
        base_risk,
        risk_amount: base_risk * multiplier,
    }
}

/// Sizing gate: conviction in 5..=8 and a positive multiplier resolved.
pub fn sizing_resolved(trade: &Trade) -> bool {
    trade
        .conviction
        .map(|c| (MIN_CONVICTION..=MAX_CONVICTION).contains(&c))
        .unwrap_or(false)
        && trade.sizing_multiplier > Decimal::ZERO
}
