//! `changeTheme`: fires on theme changes seen by the shared theme service.

use std::sync::Arc;

use tripwire_events::{DomainId, TriggerId};

use super::FireCallback;
use crate::error::EngineError;
use crate::host::Subscription;
use crate::services::{ThemeCallback, ThemeService};

/// Transition predicate: the theme changed and, when a target is
/// configured, changed to it
pub fn theme_transition(target: Option<&str>, new: &str, previous: &str) -> bool {
    new != previous && target.map_or(true, |target| target == new)
}

pub struct ThemeListener {
    target: Option<String>,
}

impl ThemeListener {
    pub fn new(target: Option<String>) -> Self {
        Self { target }
    }

    pub(crate) async fn establish(
        &self,
        service: &Arc<ThemeService>,
        domain: &DomainId,
        trigger: &TriggerId,
        fire: FireCallback,
    ) -> Result<Subscription, EngineError> {
        let target = self.target.clone();
        let callback: ThemeCallback = Arc::new(move |new: &str, previous: &str| {
            if theme_transition(target.as_deref(), new, previous) {
                fire();
            }
        });

        service.register(domain, trigger, callback).await
    }
}
