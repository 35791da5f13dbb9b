//! Throttle + trailing-debounce gate for fetch triggers.
//!
//! A trigger executes immediately when the throttle interval since the last
//! execution has elapsed; otherwise it (re)arms a trailing execution
//! `debounce` after the trigger (and, unless disabled, no earlier than the end
//! of the throttle interval). The gate carries no payload: whoever runs the
//! execution reads the latest state at that moment.

use crate::core::config::SchedulerConfig;
use instant::Instant;
use std::time::Duration;

/// Decision for a single trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Run now
    Execute,
    /// A trailing execution is pending until the given instant
    Deferred { until: Instant },
}

#[derive(Debug, Clone)]
pub struct RequestScheduler {
    throttle: Option<Duration>,
    debounce: Duration,
    max_wait: Option<Duration>,
    trailing_waits_for_throttle: bool,
    last_executed: Option<Instant>,
    pending: Option<Instant>,
    /// First trigger of the current deferred burst, for the `max_wait` cap
    burst_started: Option<Instant>,
}

impl RequestScheduler {
    /// Creates an idle gate; the first trigger always executes when a throttle is set
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            throttle: config.throttle(),
            debounce: config.debounce(),
            max_wait: config.max_wait(),
            trailing_waits_for_throttle: config.trailing_waits_for_throttle,
            last_executed: None,
            pending: None,
            burst_started: None,
        }
    }

    /// Signals that something changed at `now`.
    ///
    /// Replaces any pending trailing execution. Returns [`Gate::Execute`] when
    /// the caller should run immediately.
    pub fn trigger(&mut self, now: Instant) -> Gate {
        self.pending = None;

        if let Some(throttle) = self.throttle {
            let elapsed = match self.last_executed {
                Some(last) => now.duration_since(last) >= throttle,
                None => true,
            };
            if elapsed {
                self.mark_executed(now);
                return Gate::Execute;
            }
        }

        let burst_started = *self.burst_started.get_or_insert(now);
        let mut until = now + self.debounce;
        if let (true, Some(throttle), Some(last)) =
            (self.trailing_waits_for_throttle, self.throttle, self.last_executed)
        {
            until = until.max(last + throttle);
        }
        if let Some(max_wait) = self.max_wait {
            until = until.min(burst_started + max_wait);
        }
        self.pending = Some(until);
        Gate::Deferred { until }
    }

    /// Fires the trailing execution if it is due
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.pending {
            Some(until) if now >= until => {
                self.mark_executed(now);
                true
            }
            _ => false,
        }
    }

    /// Records an execution that bypassed the gate and drops any pending one
    pub fn mark_executed(&mut self, now: Instant) {
        self.last_executed = Some(now);
        self.pending = None;
        self.burst_started = None;
    }

    /// Drops the pending trailing execution without counting it as executed
    pub fn cancel(&mut self) {
        self.pending = None;
        self.burst_started = None;
    }

    /// When the pending trailing execution is due
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Start of the current throttle window
    pub fn last_executed(&self) -> Option<Instant> {
        self.last_executed
    }
}
