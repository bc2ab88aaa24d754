//! `setVariable`: fires when a variable changes, optionally to a given value.

use std::sync::Arc;

use super::{Baseline, FireCallback};
use crate::error::EngineError;
use crate::host::{Host, Query, Snapshot, Subscription, SubscriptionDef, UpdateCallback};

/// Slot holding the variable's current value
pub const VARIABLE_SLOT: &str = "var";

/// Transition predicate: the value changed and, when a target value is
/// configured, now equals it
pub fn variable_transition(target: Option<&str>, previous: &str, current: &str) -> bool {
    previous != current && target.map_or(true, |target| target == current)
}

pub struct VariableListener {
    name: String,
    target: Option<String>,
}

impl VariableListener {
    pub fn new(name: impl Into<String>, target: Option<String>) -> Self {
        Self {
            name: name.into(),
            target,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subscription(&self) -> SubscriptionDef {
        SubscriptionDef::new().slot(
            VARIABLE_SLOT,
            Query::Variable {
                name: self.name.clone(),
            },
        )
    }

    pub(crate) async fn establish(
        &self,
        host: &dyn Host,
        fire: FireCallback,
    ) -> Result<Subscription, EngineError> {
        let target = self.target.clone();
        let baseline = Baseline::new(String::new());
        let on_update: UpdateCallback = Arc::new(move |snapshot: &Snapshot| {
            let current = snapshot.get(VARIABLE_SLOT).to_string();
            if baseline.observe(&current, |prev, cur| {
                variable_transition(target.as_deref(), prev, cur)
            }) {
                fire();
            }
        });

        Ok(host.subscribe(self.subscription(), on_update).await?)
    }
}
