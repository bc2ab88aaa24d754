//! `registerTimer`: fires on multiples of an interval of the shared clock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tripwire_events::{DomainId, EventConfig, TriggerId};

use super::FireCallback;
use crate::coerce::as_number;
use crate::error::EngineError;
use crate::host::Subscription;
use crate::services::{TimerCallback, TimerService, TimerTick};

/// Timer parameters, evaluated once when the listener is built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSettings {
    /// Seconds between activations
    pub interval: i64,
    /// Keep firing instead of firing once
    pub continuous: bool,
    /// Continuous only: seconds before counting starts
    pub start_after: i64,
    /// Continuous only: seconds after which the timer is done
    pub duration: i64,
}

impl TimerSettings {
    pub fn from_event(event: &EventConfig) -> Self {
        Self {
            interval: as_number(event.value()),
            continuous: event.either_or,
            start_after: as_number(event.time_passed_start_after.as_deref()),
            duration: as_number(event.time_passed_duration.as_deref()),
        }
    }

    /// Evaluate one tick of the shared clock. Returns whether to fire and
    /// updates `done`; once `done` is set the timer never fires again.
    pub fn on_tick(&self, elapsed: u64, done: &mut bool) -> bool {
        let mut passed = i64::try_from(elapsed).unwrap_or(i64::MAX);

        if self.continuous && self.start_after > 0 {
            passed = passed.saturating_sub(self.start_after).max(0);
        }

        if self.continuous && self.duration > 0 && passed >= self.duration {
            *done = true;
        }

        if self.interval > 0 && passed > 0 && !*done && passed % self.interval == 0 {
            *done = !self.continuous;
            return true;
        }

        false
    }
}

pub struct TimerListener {
    settings: TimerSettings,
}

impl TimerListener {
    pub fn new(settings: TimerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> TimerSettings {
        self.settings
    }

    pub(crate) fn establish(
        &self,
        service: &Arc<TimerService>,
        domain: &DomainId,
        trigger: &TriggerId,
        fire: FireCallback,
    ) -> Result<Subscription, EngineError> {
        let settings = self.settings;
        let done = AtomicBool::new(false);
        let weak = Arc::downgrade(service);

        let callback: TimerCallback = Arc::new(move |tick: TimerTick| {
            let mut is_done = done.load(Ordering::Acquire);
            let fired = settings.on_tick(tick.elapsed, &mut is_done);
            done.store(is_done, Ordering::Release);

            if fired {
                fire();
            }
            if is_done {
                if let Some(service) = weak.upgrade() {
                    service.remove(&tick.key);
                }
            }
        });

        service.register(domain, trigger, callback)
    }
}
