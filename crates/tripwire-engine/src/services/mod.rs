//! Process-wide services shared by every domain.
//!
//! Both services own one upstream source (a clock, a theme subscription)
//! and fan it out to per-trigger callbacks keyed by domain.

mod theme;
mod timer;

use std::sync::Arc;

use tripwire_events::DomainId;

use crate::config::EngineConfig;
use crate::host::Host;

pub use theme::{ThemeCallback, ThemeService, THEME_SLOT};
pub use timer::{TickMode, TimerCallback, TimerKey, TimerService, TimerTick};

/// Handle to the shared services, cheap to clone
#[derive(Clone)]
pub struct SharedServices {
    pub timer: Arc<TimerService>,
    pub theme: Arc<ThemeService>,
}

impl SharedServices {
    /// Services ticking on the configured interval
    pub fn new(host: Arc<dyn Host>, config: &EngineConfig) -> Self {
        Self::with_tick_mode(host, TickMode::Interval(config.tick_interval()))
    }

    pub fn with_tick_mode(host: Arc<dyn Host>, mode: TickMode) -> Self {
        Self {
            timer: Arc::new(TimerService::new(mode)),
            theme: Arc::new(ThemeService::new(host)),
        }
    }

    /// Remove a domain from both services
    pub async fn detach(&self, domain: &DomainId) {
        self.timer.detach(domain);
        self.theme.detach(domain).await;
    }
}
