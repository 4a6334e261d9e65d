//! User-editable account settings and their validation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Display theme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThemeMode {
    #[default]
    Day,
    Night,
}

/// User-editable preferences and account parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub theme_mode: ThemeMode,
    pub account_equity: Decimal,
    pub risk_per_trade: Decimal,
    pub portfolio_heat_cap: Decimal,
    pub bucket_heat_cap: Decimal,
    pub vimium_enabled: bool,
    pub sample_data_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme_mode: ThemeMode::Day,
            account_equity: Decimal::new(100_000, 0),
            risk_per_trade: Decimal::new(75, 4),
            portfolio_heat_cap: Decimal::new(4, 2),
            bucket_heat_cap: Decimal::new(15, 3),
            vimium_enabled: false,
            sample_data_mode: false,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| {
            Err(Error::InvalidSettings {
                message: message.to_string(),
            })
        };

        if self.account_equity <= Decimal::ZERO {
            return invalid("account equity must be positive");
        }
        if self.risk_per_trade <= Decimal::ZERO || self.risk_per_trade >= Decimal::ONE {
            return invalid("risk per trade must be between 0 and 1");
        }
        if self.portfolio_heat_cap <= Decimal::ZERO || self.bucket_heat_cap <= Decimal::ZERO {
            return invalid("heat caps must be positive");
        }
        Ok(())
    }

    /// Standard bet at conviction 7: equity x risk per trade.
    pub fn standard_bet(&self) -> Decimal {
        self.account_equity * self.risk_per_trade
    }
}
