//! Read-only trading policy: sectors, strategies, checklist and risk caps.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::warn;

use crate::{Error, Result};

/// Required checklist item IDs of the standard policy.
pub const STANDARD_REQUIRED_ITEMS: [&str; 5] =
    ["SIG_REQ", "RISK_REQ", "OPT_REQ", "EXIT_REQ", "BEHAV_REQ"];
/// Optional checklist item IDs of the standard policy.
pub const STANDARD_OPTIONAL_ITEMS: [&str; 3] = ["REGIME_OK", "NO_CHASE", "JOURNAL_DONE"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    pub policy_id: Option<String>,
    pub version: Option<String>,
    pub generated_at: Option<DateTime<Utc>>,
    pub sectors: Vec<Sector>,
    pub strategies: BTreeMap<String, Strategy>,
    pub checklist: Checklist,
    pub defaults: PolicyDefaults,
    pub calendar: CalendarConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sector {
    pub name: String,
    pub priority: u32,
    pub blocked: bool,
    pub warning: bool,
    /// Sector-specific cap; zero means "use the bucket cap".
    pub heat_cap_percent: Decimal,
    pub notes: String,
    pub allowed_strategies: Vec<String>,
    pub strategy_suitability: BTreeMap<String, StrategySuitability>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Strategy {
    pub label: String,
    pub options_suitability: String,
    pub hold_weeks: String,
    pub best_examples: Vec<String>,
    pub notes: String,
}

/// How well a strategy fits a sector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategySuitability {
    /// excellent, good, marginal or incompatible
    pub rating: String,
    /// green, yellow or red
    pub color: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub require_acknowledgement: bool,
}

impl Default for StrategySuitability {
    fn default() -> Self {
        Self {
            rating: "marginal".to_string(),
            color: "yellow".to_string(),
            rationale: "Suitability data not available for this sector/strategy combination"
                .to_string(),
            require_acknowledgement: true,
        }
    }
}

impl StrategySuitability {
    fn color_rank(&self) -> u8 {
        match self.color.to_ascii_lowercase().as_str() {
            "green" => 0,
            "yellow" => 1,
            "red" => 2,
            _ => 3,
        }
    }

    fn rating_rank(&self) -> u8 {
        match self.rating.to_ascii_lowercase().as_str() {
            "excellent" => 0,
            "good" => 1,
            "marginal" => 2,
            "incompatible" => 3,
            _ => 4,
        }
    }

    pub fn is_green(&self) -> bool {
        self.color.eq_ignore_ascii_case("green")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Checklist {
    pub required: Vec<String>,
    pub optional: Vec<String>,
    /// Conviction rating (as a string key) to sizing multiplier.
    pub poker_sizing: BTreeMap<String, Decimal>,
    pub min_contracts: u32,
}

/// Longest cooldown a policy may configure (one day).
pub const MAX_COOLDOWN_SECONDS: i64 = 86_400;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyDefaults {
    pub portfolio_heat_cap: Decimal,
    pub bucket_heat_cap: Decimal,
    pub risk_per_trade: Decimal,
    pub cooldown_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub past_days: u32,
    pub future_days: u32,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            past_days: 14,
            future_days: 84,
        }
    }
}

/// Where the active policy came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicySource {
    File(std::path::PathBuf),
    SafeMode { reason: String },
}

impl PolicySource {
    pub fn is_safe_mode(&self) -> bool {
        matches!(self, Self::SafeMode { .. })
    }
}

/// A strategy as offered for a sector, with its suitability.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyOption<'a> {
    pub id: &'a str,
    pub strategy: &'a Strategy,
    pub suitability: StrategySuitability,
}

impl Policy {
    /// Read the policy file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let degraded = |reason: String| Error::ConfigurationDegraded {
            path: path.to_path_buf(),
            reason,
        };

        let data = std::fs::read(path).map_err(|e| degraded(e.to_string()))?;
        let policy: Self = serde_json::from_slice(&data).map_err(|e| degraded(e.to_string()))?;

        let cooldown = policy.defaults.cooldown_seconds;
        if !(0..=MAX_COOLDOWN_SECONDS).contains(&cooldown) {
            return Err(degraded(format!(
                "cooldown_seconds {cooldown} outside 0-{MAX_COOLDOWN_SECONDS}"
            )));
        }
        Ok(policy)
    }

    /// Read the policy file, falling back to the built-in safe-mode policy.
    pub fn load_or_safe_mode(path: impl AsRef<Path>) -> (Self, PolicySource) {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(policy) => (policy, PolicySource::File(path.to_path_buf())),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Policy unavailable, running in safe mode"
                );
                (
                    Self::safe_mode(),
                    PolicySource::SafeMode {
                        reason: e.to_string(),
                    },
                )
            }
        }
    }

    /// Minimal conservative policy used when the policy file cannot be read.
    pub fn safe_mode() -> Self {
        fn strings(ids: &[&str]) -> Vec<String> {
            ids.iter().map(|s| s.to_string()).collect()
        }
        let strategy = |label: &str| Strategy {
            label: label.to_string(),
            options_suitability: "excellent".to_string(),
            ..Default::default()
        };

        Self {
            policy_id: None,
            version: Some("safe-mode".to_string()),
            generated_at: Some(Utc::now()),
            sectors: vec![
                Sector {
                    name: "Healthcare".to_string(),
                    priority: 1,
                    allowed_strategies: strings(&["Alt10", "Alt43", "Alt46"]),
                    ..Default::default()
                },
                Sector {
                    name: "Technology".to_string(),
                    priority: 2,
                    allowed_strategies: strings(&["Alt26", "Alt22", "Alt10"]),
                    ..Default::default()
                },
                Sector {
                    name: "Utilities".to_string(),
                    blocked: true,
                    ..Default::default()
                },
            ],
            strategies: BTreeMap::from([
                ("Alt10".to_string(), strategy("Profit Targets (3N/6N/9N)")),
                ("Alt26".to_string(), strategy("Fractional Pyramid")),
                ("Alt43".to_string(), strategy("Volatility-Adaptive")),
            ]),
            checklist: Checklist {
                required: strings(&STANDARD_REQUIRED_ITEMS),
                optional: strings(&STANDARD_OPTIONAL_ITEMS),
                poker_sizing: BTreeMap::new(),
                min_contracts: 1,
            },
            defaults: PolicyDefaults {
                portfolio_heat_cap: Decimal::new(4, 2),
                bucket_heat_cap: Decimal::new(15, 3),
                risk_per_trade: Decimal::new(75, 4),
                cooldown_seconds: 120,
            },
            calendar: CalendarConfig::default(),
        }
    }

    pub fn sector(&self, name: &str) -> Option<&Sector> {
        self.sectors.iter().find(|s| s.name == name)
    }

    /// Sector override when positive, otherwise the global bucket cap.
    pub fn sector_heat_cap(&self, name: &str) -> Decimal {
        match self.sector(name) {
            Some(sector) if sector.heat_cap_percent > Decimal::ZERO => sector.heat_cap_percent,
            _ => self.defaults.bucket_heat_cap,
        }
    }

    pub fn strategy_suitability(&self, sector: &str, strategy_id: &str) -> StrategySuitability {
        self.sector(sector)
            .and_then(|s| s.strategy_suitability.get(strategy_id))
            .cloned()
            .unwrap_or_default()
    }

    /// Up to `count` strategies to offer for a sector.
    ///
    /// Allowed strategies come first in policy order, then the remaining
    /// strategies the sector rates (best color, then best rating, then ID),
    /// then any other strategy the policy defines. IDs with no strategy
    /// definition are skipped.
    pub fn strategies_for_sector(&self, sector_name: &str, count: usize) -> Vec<StrategyOption<'_>> {
        let Some(sector) = self.sector(sector_name) else {
            return Vec::new();
        };
        if count == 0 {
            return Vec::new();
        }

        let option = |id: &str| {
            self.strategies
                .get_key_value(id)
                .map(|(id, strategy)| StrategyOption {
                    id: id.as_str(),
                    strategy,
                    suitability: sector
                        .strategy_suitability
                        .get(id.as_str())
                        .cloned()
                        .unwrap_or_default(),
                })
        };

        let mut seen: HashSet<&str> = HashSet::new();
        let mut results = Vec::with_capacity(count);

        for option in sector.allowed_strategies.iter().filter_map(|id| option(id.as_str())) {
            if seen.insert(option.id) {
                results.push(option);
            }
        }

        let mut rated: Vec<_> = sector
            .strategy_suitability
            .keys()
            .filter(|id| !seen.contains(id.as_str()))
            .filter_map(|id| option(id.as_str()))
            .collect();
        rated.sort_by(|a, b| {
            a.suitability
                .color_rank()
                .cmp(&b.suitability.color_rank())
                .then(a.suitability.rating_rank().cmp(&b.suitability.rating_rank()))
                .then(a.id.cmp(b.id))
        });
        for option in rated {
            seen.insert(option.id);
            results.push(option);
        }

        for id in self.strategies.keys() {
            if !seen.contains(id.as_str()) {
                if let Some(option) = option(id.as_str()) {
                    seen.insert(option.id);
                    results.push(option);
                }
            }
        }

        results.truncate(count);
        results
    }

    /// Sizing multiplier for a conviction rating; 1.0 when the table has no entry.
    pub fn poker_multiplier(&self, conviction: u8) -> Decimal {
        self.checklist
            .poker_sizing
            .get(&conviction.to_string())
            .copied()
            .unwrap_or(Decimal::ONE)
    }

    /// Cooldown length, clamped to `0..=MAX_COOLDOWN_SECONDS`.
    pub fn cooldown(&self) -> Duration {
        let secs = self.defaults.cooldown_seconds.clamp(0, MAX_COOLDOWN_SECONDS);
        Duration::try_seconds(secs).unwrap_or_else(Duration::zero)
    }
}
