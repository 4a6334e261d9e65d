//! Restartable countdown enforcing the mandatory wait before a checklist can pass.

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Interval of the background completion check.
const TICK: std::time::Duration = std::time::Duration::from_secs(1);

type CompletionCallback = Arc<dyn Fn() + Send + Sync + 'static>;

/// Observable state of a [`CooldownTimer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPhase {
    Running,
    /// Halted by `stop()`, remaining time frozen.
    Stopped,
    Complete,
}

struct TimerState {
    duration: Duration,
    started_at: DateTime<Utc>,
    phase: TimerPhase,
    frozen_remaining: Duration,
    on_complete: Option<CompletionCallback>,
    ticker: Option<JoinHandle<()>>,
}

impl TimerState {
    fn live_remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.duration - (now - self.started_at)).max(Duration::zero())
    }
}

/// Cooldown countdown with an optional completion callback.
///
/// Completion is detected either by a one-second background tick (when a
/// tokio runtime is available) or on demand by [`remaining`](Self::remaining),
/// [`is_complete`](Self::is_complete) and [`phase`](Self::phase). The
/// callback runs at most once per arming, outside the state lock.
pub struct CooldownTimer {
    state: Arc<Mutex<TimerState>>,
}

impl std::fmt::Debug for CooldownTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("CooldownTimer")
            .field("duration", &state.duration)
            .field("started_at", &state.started_at)
            .field("phase", &state.phase)
            .finish()
    }
}

impl CooldownTimer {
    /// Start a countdown from now.
    pub fn start(duration: Duration) -> Self {
        Self::arm(duration, Utc::now(), None)
    }

    /// Start a countdown from now, calling `on_complete` when it elapses.
    pub fn start_with_callback<F>(duration: Duration, on_complete: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::arm(duration, Utc::now(), Some(Arc::new(on_complete)))
    }

    /// Rebuild a timer from a persisted start time.
    pub fn from_timestamp(duration: Duration, started_at: DateTime<Utc>) -> Self {
        Self::arm(duration, started_at, None)
    }

    /// Rebuild a timer from a persisted start time. If the wait already
    /// elapsed, `on_complete` fires before this returns.
    pub fn from_timestamp_with_callback<F>(
        duration: Duration,
        started_at: DateTime<Utc>,
        on_complete: F,
    ) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::arm(duration, started_at, Some(Arc::new(on_complete)))
    }

    fn arm(
        duration: Duration,
        started_at: DateTime<Utc>,
        on_complete: Option<CompletionCallback>,
    ) -> Self {
        let timer = Self {
            state: Arc::new(Mutex::new(TimerState {
                duration,
                started_at,
                phase: TimerPhase::Running,
                frozen_remaining: Duration::zero(),
                on_complete,
                ticker: None,
            })),
        };

        debug!(
            duration_secs = duration.num_seconds(),
            started_at = %started_at,
            "Cooldown armed"
        );

        if Self::poll(&timer.state) == TimerPhase::Running {
            timer.spawn_ticker();
        }
        timer
    }

    fn lock(&self) -> MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check for completion; fires the callback on the Running -> Complete edge.
    fn poll(state: &Mutex<TimerState>) -> TimerPhase {
        let callback = {
            let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
            if guard.phase != TimerPhase::Running {
                return guard.phase;
            }
            if guard.live_remaining(Utc::now()) > Duration::zero() {
                return TimerPhase::Running;
            }

            guard.phase = TimerPhase::Complete;
            guard.frozen_remaining = Duration::zero();
            if let Some(ticker) = guard.ticker.take() {
                ticker.abort();
            }
            info!(
                duration_secs = guard.duration.num_seconds(),
                "Cooldown complete"
            );
            guard.on_complete.clone()
        };

        if let Some(callback) = callback {
            callback();
        }
        TimerPhase::Complete
    }

    fn spawn_ticker(&self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("No async runtime, cooldown completion checked on query only");
            return;
        };

        let weak: Weak<Mutex<TimerState>> = Arc::downgrade(&self.state);
        let task = handle.spawn(async move {
            let mut interval = tokio::time::interval(TICK);
            // First tick resolves immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(state) = weak.upgrade() else {
                    break;
                };
                if Self::poll(&state) != TimerPhase::Running {
                    break;
                }
            }
        });

        let mut guard = self.lock();
        if guard.phase == TimerPhase::Running {
            if let Some(previous) = guard.ticker.replace(task) {
                previous.abort();
            }
        } else {
            task.abort();
        }
    }

    /// Time left, never negative. Frozen after `stop()`.
    pub fn remaining(&self) -> Duration {
        match Self::poll(&self.state) {
            TimerPhase::Running => self.lock().live_remaining(Utc::now()),
            TimerPhase::Stopped => self.lock().frozen_remaining,
            TimerPhase::Complete => Duration::zero(),
        }
    }

    /// Remaining whole seconds, rounded up for display.
    pub fn remaining_secs(&self) -> i64 {
        let remaining = self.remaining();
        let secs = remaining.num_seconds();
        if remaining > Duration::seconds(secs) {
            secs + 1
        } else {
            secs
        }
    }

    pub fn is_complete(&self) -> bool {
        self.remaining() <= Duration::zero()
    }

    pub fn phase(&self) -> TimerPhase {
        Self::poll(&self.state)
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.lock().started_at
    }

    pub fn duration(&self) -> Duration {
        self.lock().duration
    }

    /// Freeze the remaining time and halt background updates. Idempotent.
    pub fn stop(&self) {
        let mut guard = self.lock();
        if guard.phase != TimerPhase::Running {
            return;
        }
        guard.frozen_remaining = guard.live_remaining(Utc::now());
        guard.phase = TimerPhase::Stopped;
        if let Some(ticker) = guard.ticker.take() {
            ticker.abort();
        }
        debug!(
            remaining_secs = guard.frozen_remaining.num_seconds(),
            "Cooldown stopped"
        );
    }

    /// Re-arm from now with the original duration, whatever the prior phase.
    pub fn reset(&self) {
        {
            let mut guard = self.lock();
            if let Some(ticker) = guard.ticker.take() {
                ticker.abort();
            }
            guard.started_at = Utc::now();
            guard.phase = TimerPhase::Running;
            guard.frozen_remaining = Duration::zero();
            debug!(duration_secs = guard.duration.num_seconds(), "Cooldown reset");
        }

        if Self::poll(&self.state) == TimerPhase::Running {
            self.spawn_ticker();
        }
    }
}

impl Drop for CooldownTimer {
    fn drop(&mut self) {
        if let Some(ticker) = self.lock().ticker.take() {
            ticker.abort();
        }
    }
}
