//! Checklist and cooldown gates.

use chrono::{DateTime, Duration, Utc};
use tf_core::{Policy, Trade};

use crate::CooldownTimer;

/// Required checklist IDs the trade has not marked true, in policy order.
pub fn missing_required_items<'p>(trade: &Trade, policy: &'p Policy) -> Vec<&'p str> {
    policy
        .checklist
        .required
        .iter()
        .filter(|id| !trade.checklist_required.get(id.as_str()).copied().unwrap_or(false))
        .map(String::as_str)
        .collect()
}

/// Whether the cooldown has elapsed.
///
/// A live timer is authoritative. Without one, the trade's persisted start
/// time is measured against the policy duration; a trade that never started
/// its cooldown is not complete unless the policy asks for no wait at all.
pub fn cooldown_complete(
    trade: &Trade,
    policy: &Policy,
    timer: Option<&CooldownTimer>,
    now: DateTime<Utc>,
) -> bool {
    if let Some(timer) = timer {
        return timer.is_complete();
    }

    let duration = policy.cooldown();
    if duration <= Duration::zero() {
        return true;
    }
    trade
        .cooldown_elapsed(now)
        .map(|elapsed| elapsed >= duration)
        .unwrap_or(false)
}

/// Every required item is checked and the cooldown is over. Optional items never gate.
pub fn checklist_satisfied(
    trade: &Trade,
    policy: &Policy,
    timer: Option<&CooldownTimer>,
    now: DateTime<Utc>,
) -> bool {
    missing_required_items(trade, policy).is_empty()
        && cooldown_complete(trade, policy, timer, now)
}
