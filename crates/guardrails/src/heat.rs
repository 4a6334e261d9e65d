//! Portfolio and sector heat accounting.
//!
//! Heat is open risk expressed as a fraction of account equity. Only trades
//! whose derived status is `active` contribute.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tf_core::{Policy, Trade};
use tracing::info;

/// Result of projecting a candidate trade onto the open book.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatCheck {
    /// Heat of active trades before the candidate.
    pub portfolio_heat: Decimal,
    /// Heat of active trades in the candidate's sector before the candidate.
    pub sector_heat: Decimal,
    /// The candidate's own max loss over equity.
    pub candidate_heat: Decimal,
    pub projected_portfolio_heat: Decimal,
    pub projected_sector_heat: Decimal,
    pub portfolio_cap: Decimal,
    pub sector_cap: Decimal,
}

impl HeatCheck {
    /// Inclusive: a projection exactly at the cap passes.
    pub fn portfolio_ok(&self) -> bool {
        self.projected_portfolio_heat <= self.portfolio_cap
    }

    pub fn sector_ok(&self) -> bool {
        self.projected_sector_heat <= self.sector_cap
    }

    pub fn passed(&self) -> bool {
        self.portfolio_ok() && self.sector_ok()
    }

    /// Room left under the tighter of the two caps after the candidate, never negative.
    pub fn headroom(&self) -> Decimal {
        let portfolio = self.portfolio_cap - self.projected_portfolio_heat;
        let sector = self.sector_cap - self.projected_sector_heat;
        portfolio.min(sector).max(Decimal::ZERO)
    }
}

/// Project `candidate` onto `existing` trades.
///
/// Existing trades are measured against the candidate's account equity. With
/// no equity recorded every heat figure is zero.
pub fn check_heat(
    candidate: &Trade,
    existing: &[Trade],
    policy: &Policy,
    now: DateTime<Utc>,
) -> HeatCheck {
    let equity = candidate.account_equity;
    let fraction = |max_loss: Decimal| {
        if equity > Decimal::ZERO {
            max_loss / equity
        } else {
            Decimal::ZERO
        }
    };

    let (portfolio_heat, sector_heat) = existing
        .iter()
        .filter(|t| t.id != candidate.id && t.is_active_at(now))
        .fold((Decimal::ZERO, Decimal::ZERO), |(portfolio, sector), t| {
            let heat = fraction(t.max_loss);
            let sector_share = if t.sector == candidate.sector {
                heat
            } else {
                Decimal::ZERO
            };
            (portfolio + heat, sector + sector_share)
        });

    let candidate_heat = fraction(candidate.max_loss);
    let check = HeatCheck {
        portfolio_heat,
        sector_heat,
        candidate_heat,
        projected_portfolio_heat: portfolio_heat + candidate_heat,
        projected_sector_heat: sector_heat + candidate_heat,
        portfolio_cap: policy.defaults.portfolio_heat_cap,
        sector_cap: policy.sector_heat_cap(&candidate.sector),
    };

    if !check.passed() {
        info!(
            sector = %candidate.sector,
            projected_portfolio = %check.projected_portfolio_heat,
            portfolio_cap = %check.portfolio_cap,
            projected_sector = %check.projected_sector_heat,
            sector_cap = %check.sector_cap,
            "Heat check exceeds cap"
        );
    }
    check
}

#[cfg(test)]
mod tests {
    use super::*;
    use tf_core::TradeStatus;

    fn trade(sector: &str, max_loss: i64) -> Trade {
        let mut t = Trade::new(sector);
        t.account_equity = Decimal::new(50_000, 0);
        t.max_loss = Decimal::new(max_loss, 0);
        t
    }

    #[test]
    fn test_inclusive_sector_boundary() {
        let policy = Policy::safe_mode();
        let now = Utc::now();

        // 200 + 250 + 250 = 700 = exactly 1.4%, under the 1.5% bucket cap
        let book = vec![trade("Healthcare", 200), trade("Healthcare", 250)];
        let check = check_heat(&trade("Healthcare", 250), &book, &policy, now);
        assert!(check.passed());

        // 750 / 50k is exactly 1.5%
        let book = vec![trade("Healthcare", 400), trade("Healthcare", 250)];
        let check = check_heat(&trade("Healthcare", 100), &book, &policy, now);
        assert_eq!(check.projected_sector_heat, Decimal::new(15, 3));
        assert!(check.sector_ok());
    }

    #[test]
    fn test_sector_cap_exceeded() {
        let policy = Policy::safe_mode();
        let book = vec![trade("Healthcare", 400), trade("Healthcare", 350)];
        let check = check_heat(&trade("Healthcare", 100), &book, &policy, Utc::now());

        assert_eq!(check.projected_sector_heat, Decimal::new(17, 3));
        assert!(!check.sector_ok());
        assert!(check.portfolio_ok());
        assert!(!check.passed());
        assert_eq!(check.headroom(), Decimal::ZERO);
    }

    #[test]
    fn test_other_sectors_count_toward_portfolio_only() {
        let policy = Policy::safe_mode();
        let book = vec![trade("Technology", 700), trade("Technology", 700)];
        let check = check_heat(&trade("Healthcare", 500), &book, &policy, Utc::now());

        assert_eq!(check.sector_heat, Decimal::ZERO);
        assert_eq!(check.portfolio_heat, Decimal::new(28, 3));
        assert_eq!(check.projected_portfolio_heat, Decimal::new(38, 3));
        assert!(check.passed());
    }

    #[test]
    fn test_inactive_trades_are_ignored() {
        let policy = Policy::safe_mode();
        let mut closed = trade("Healthcare", 700);
        closed.status = Some(TradeStatus::Closed);
        let mut expired = trade("Healthcare", 700);
        expired.expiration_date = Some(chrono::NaiveDate::from_ymd_opt(2020, 1, 17).unwrap());

        let check = check_heat(&trade("Healthcare", 100), &[closed, expired], &policy, Utc::now());
        assert_eq!(check.sector_heat, Decimal::ZERO);
        assert!(check.passed());
    }

    #[test]
    fn test_sector_override_cap() {
        let mut policy = Policy::safe_mode();
        policy.sectors[0].heat_cap_percent = Decimal::new(2, 2);
        let book = vec![trade("Healthcare", 400), trade("Healthcare", 350)];
        let check = check_heat(&trade("Healthcare", 100), &book, &policy, Utc::now());

        assert_eq!(check.sector_cap, Decimal::new(2, 2));
        assert!(check.passed());
    }

    #[test]
    fn test_zero_equity_yields_zero_heat() {
        let policy = Policy::safe_mode();
        let mut candidate = trade("Healthcare", 100);
        candidate.account_equity = Decimal::ZERO;
        let check = check_heat(&candidate, &[trade("Healthcare", 5_000)], &policy, Utc::now());
        assert_eq!(check.projected_portfolio_heat, Decimal::ZERO);
    }
}
