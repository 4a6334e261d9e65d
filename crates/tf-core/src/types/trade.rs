//! The trade record that moves through the entry workflow.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::{Error, Result};

use super::policy::Checklist;

/// Lowest and highest conviction accepted by position sizing.
pub const MIN_CONVICTION: u8 = 5;
pub const MAX_CONVICTION: u8 = 8;

/// Maximum number of option legs a structure can carry.
pub const MAX_STRIKES: usize = 4;

/// Longest days-to-expiration accepted at entry.
pub const MAX_DTE: u32 = 3650;

/// Directional bias of the underlying setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Bullish,
    Bearish,
}

/// Lifecycle status of a recorded trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Active,
    Closed,
    Expired,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Closed => "closed",
            Self::Expired => "expired",
        }
    }
}

impl std::str::FromStr for TradeStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "closed" => Ok(Self::Closed),
            "expired" => Ok(Self::Expired),
            other => Err(Error::InvalidInput {
                message: format!("unknown trade status: {other}"),
            }),
        }
    }
}

/// A single options trade, filled in stage by stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Trade {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    // Sector selection
    pub sector: String,

    // Ticker + strategy
    pub ticker: String,
    pub strategy: String,
    pub direction: Option<Direction>,
    /// Set when the user accepted a non-green suitability warning.
    pub strategy_warning_acknowledged: bool,
    pub cooldown_start_time: Option<DateTime<Utc>>,

    // Checklist
    pub checklist_required: BTreeMap<String, bool>,
    pub checklist_optional: BTreeMap<String, bool>,
    pub checklist_passed: bool,

    // Position sizing
    pub conviction: Option<u8>,
    pub account_equity: Decimal,
    pub risk_per_trade: Decimal,
    pub sizing_multiplier: Decimal,
    pub max_loss: Decimal,

    // Heat check
    pub portfolio_heat: Decimal,
    pub bucket_heat: Decimal,
    pub heat_check_passed: bool,

    // Trade entry
    pub options_strategy: String,
    pub strikes: Vec<Decimal>,
    pub expiration_date: Option<NaiveDate>,
    pub premium: Option<Decimal>,

    // Outcome (filled after entry)
    pub exit_date: Option<DateTime<Utc>>,
    pub exit_price: Option<Decimal>,
    pub profit_loss: Option<Decimal>,
    pub status: Option<TradeStatus>,
}

impl Trade {
    /// Start a new trade for the chosen sector.
    pub fn new(sector: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            sector: sector.into(),
            ..Default::default()
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Record the cooldown start once. Later calls keep the original timestamp.
    pub fn begin_cooldown(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        *self.cooldown_start_time.get_or_insert(now)
    }

    /// Replace the cooldown start with a fresh timestamp.
    pub fn restart_cooldown(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.cooldown_start_time = Some(now);
        now
    }

    /// Elapsed cooldown time, `None` if no cooldown was ever started.
    pub fn cooldown_elapsed(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.cooldown_start_time.map(|start| now - start)
    }

    /// Mark a checklist item. The policy decides whether the ID is required
    /// or optional; IDs it does not define are rejected.
    pub fn set_checklist_item(&mut self, checklist: &Checklist, id: &str, checked: bool) -> Result<()> {
        if checklist.required.iter().any(|r| r == id) {
            self.checklist_required.insert(id.to_string(), checked);
        } else if checklist.optional.iter().any(|o| o == id) {
            self.checklist_optional.insert(id.to_string(), checked);
        } else {
            return Err(Error::InvalidInput {
                message: format!("unknown checklist item: {id}"),
            });
        }
        Ok(())
    }

    /// Replace the strike list. At most four legs.
    pub fn set_strikes(&mut self, strikes: Vec<Decimal>) -> Result<()> {
        if strikes.len() > MAX_STRIKES {
            return Err(Error::InvalidInput {
                message: format!("{} strikes given, at most {MAX_STRIKES} allowed", strikes.len()),
            });
        }
        self.strikes = strikes;
        Ok(())
    }

    /// Derive the expiration date from days-to-expiration.
    pub fn set_expiration_from_dte(&mut self, dte: u32, today: NaiveDate) -> Result<NaiveDate> {
        let expiration = (dte <= MAX_DTE)
            .then(|| Duration::try_days(i64::from(dte)))
            .flatten()
            .and_then(|days| today.checked_add_signed(days))
            .ok_or_else(|| Error::InvalidInput {
                message: format!("{dte} days to expiration is out of range (0-{MAX_DTE})"),
            })?;
        self.expiration_date = Some(expiration);
        Ok(expiration)
    }

    /// Execution fields are complete; the trade may move into history.
    pub fn is_ready_for_history(&self) -> bool {
        !self.options_strategy.is_empty() && self.expiration_date.is_some()
    }

    /// Explicit status wins; otherwise derive it from exit and expiration.
    pub fn status_at(&self, now: DateTime<Utc>) -> TradeStatus {
        if let Some(status) = self.status {
            return status;
        }
        if self.exit_date.is_some() {
            return TradeStatus::Closed;
        }
        match self.expiration_date {
            Some(expiration) if now.date_naive() > expiration => TradeStatus::Expired,
            _ => TradeStatus::Active,
        }
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status_at(now) == TradeStatus::Active
    }

    /// Realized P&L, zero while the trade is open.
    pub fn pnl(&self) -> Decimal {
        self.profit_loss.unwrap_or(Decimal::ZERO)
    }

    /// Record the trade outcome.
    pub fn close(&mut self, exit_date: DateTime<Utc>, exit_price: Decimal, profit_loss: Decimal) {
        self.exit_date = Some(exit_date);
        self.exit_price = Some(exit_price);
        self.profit_loss = Some(profit_loss);
        self.status = Some(TradeStatus::Closed);
        self.updated_at = exit_date;
    }
}

/// Number of strikes an options structure needs.
pub fn required_strikes(structure: &str) -> usize {
    const SINGLE_LEG: &[&str] = &["Long call", "Long put", "Covered call", "Cash-secured put"];
    const THREE_LEG: &[&str] = &[
        "Long put butterfly",
        "Long call butterfly",
        "Short put butterfly",
        "Short call butterfly",
        "Call ratio backspread",
        "Put ratio backspread",
        "Call broken wing",
        "Put broken wing",
    ];
    const FOUR_LEG: &[&str] = &[
        "Iron butterfly",
        "Iron condor",
        "Inverse iron butterfly",
        "Inverse iron condor",
    ];

    if SINGLE_LEG.contains(&structure) {
        1
    } else if THREE_LEG.contains(&structure) {
        3
    } else if FOUR_LEG.contains(&structure) {
        4
    } else {
        // Verticals, calendars, diagonals, straddles, strangles and anything unrecognised
        2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn checklist() -> Checklist {
        Checklist {
            required: vec!["SIG_REQ".into(), "RISK_REQ".into()],
            optional: vec!["NO_CHASE".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_cooldown_start_is_kept_once_set() {
        let mut trade = Trade::new("Healthcare");
        let t0 = Utc.with_ymd_and_hms(2025, 3, 3, 14, 0, 0).unwrap();
        let t1 = t0 + Duration::seconds(30);

        assert_eq!(trade.begin_cooldown(t0), t0);
        assert_eq!(trade.begin_cooldown(t1), t0);
        assert_eq!(trade.cooldown_elapsed(t1), Some(Duration::seconds(30)));

        assert_eq!(trade.restart_cooldown(t1), t1);
        assert_eq!(trade.cooldown_start_time, Some(t1));
    }

    #[test]
    fn test_checklist_items_route_by_policy() {
        let mut trade = Trade::new("Technology");
        let checklist = checklist();

        trade.set_checklist_item(&checklist, "SIG_REQ", true).unwrap();
        trade.set_checklist_item(&checklist, "NO_CHASE", true).unwrap();

        assert_eq!(trade.checklist_required.get("SIG_REQ"), Some(&true));
        assert_eq!(trade.checklist_optional.get("NO_CHASE"), Some(&true));
        assert!(trade.set_checklist_item(&checklist, "BOGUS", true).is_err());
    }

    #[test]
    fn test_strike_limit() {
        let mut trade = Trade::new("Technology");
        let four = vec![Decimal::new(95, 0), Decimal::new(100, 0), Decimal::new(105, 0), Decimal::new(110, 0)];
        trade.set_strikes(four.clone()).unwrap();
        assert_eq!(trade.strikes, four);

        let mut five = four;
        five.push(Decimal::new(115, 0));
        assert!(trade.set_strikes(five).is_err());
        assert_eq!(trade.strikes.len(), 4);
    }

    #[test]
    fn test_status_derivation() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let mut trade = Trade::new("Healthcare");

        trade.expiration_date = Some(NaiveDate::from_ymd_opt(2025, 7, 18).unwrap());
        assert_eq!(trade.status_at(now), TradeStatus::Active);

        trade.expiration_date = Some(NaiveDate::from_ymd_opt(2025, 5, 16).unwrap());
        assert_eq!(trade.status_at(now), TradeStatus::Expired);

        trade.close(now, Decimal::new(250, 2), Decimal::new(-120, 0));
        assert_eq!(trade.status_at(now), TradeStatus::Closed);
        assert_eq!(trade.pnl(), Decimal::new(-120, 0));

        trade.status = Some(TradeStatus::Active);
        assert_eq!(trade.status_at(now), TradeStatus::Active);
    }

    #[test]
    fn test_expiration_from_dte() {
        let mut trade = Trade::new("Healthcare");
        let today = NaiveDate::from_ymd_opt(2025, 1, 30).unwrap();

        assert!(!trade.is_ready_for_history());
        let exp = trade.set_expiration_from_dte(45, today).unwrap();
        assert_eq!(exp, NaiveDate::from_ymd_opt(2025, 3, 16).unwrap());

        trade.options_strategy = "Bull call spread".into();
        assert!(trade.is_ready_for_history());
    }

    #[test]
    fn test_expiration_rejects_out_of_range_dte() {
        let mut trade = Trade::new("Healthcare");
        let today = NaiveDate::from_ymd_opt(2025, 1, 30).unwrap();

        assert!(trade.set_expiration_from_dte(MAX_DTE, today).is_ok());
        let kept = trade.expiration_date;

        for dte in [MAX_DTE + 1, u32::MAX] {
            assert!(matches!(
                trade.set_expiration_from_dte(dte, today),
                Err(Error::InvalidInput { .. })
            ));
        }
        assert_eq!(trade.expiration_date, kept);

        // Within range but past the calendar's last date
        assert!(trade.set_expiration_from_dte(10, NaiveDate::MAX).is_err());
    }

    #[test]
    fn test_required_strikes() {
        assert_eq!(required_strikes("Long call"), 1);
        assert_eq!(required_strikes("Bear put spread"), 2);
        assert_eq!(required_strikes("Call broken wing"), 3);
        assert_eq!(required_strikes("Iron condor"), 4);
        assert_eq!(required_strikes("Something exotic"), 2);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("Closed".parse::<TradeStatus>().unwrap(), TradeStatus::Closed);
        assert!("pending".parse::<TradeStatus>().is_err());
    }
}
