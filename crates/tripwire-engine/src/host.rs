//! The boundary to the host application.
//!
//! The engine never computes selection or variable state itself. It asks the
//! host for live subscriptions to host-computed values and reacts to the
//! snapshots the host pushes back.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tripwire_events::TriggerId;

use crate::error::HostError;

/// A host-computed value a subscription slot is bound to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Query {
    /// Every selection in the state, `Field: a, b|Other: c`; empty when none
    CurrentSelections { state: String },
    /// Selected values of one field joined by `|`
    FieldSelections { field: String, state: String },
    /// Number of selected values of one field
    SelectedCount { field: String, state: String },
    /// Current value of a variable
    Variable { name: String },
    /// Id of the active theme
    Theme,
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::CurrentSelections { state } => write!(f, "current selections [{}]", state),
            Query::FieldSelections { field, state } => {
                write!(f, "selections of {} [{}]", field, state)
            }
            Query::SelectedCount { field, state } => {
                write!(f, "selected count of {} [{}]", field, state)
            }
            Query::Variable { name } => write!(f, "variable {}", name),
            Query::Theme => f.write_str("theme"),
        }
    }
}

/// What a subscription watches: named slots, each bound to a query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionDef {
    slots: Vec<(String, Query)>,
}

impl SubscriptionDef {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: bind a slot to a query
    pub fn slot(mut self, name: impl Into<String>, query: Query) -> Self {
        self.slots.push((name.into(), query));
        self
    }

    pub fn slots(&self) -> impl Iterator<Item = (&str, &Query)> {
        self.slots.iter().map(|(name, query)| (name.as_str(), query))
    }

    pub fn queries(&self) -> impl Iterator<Item = &Query> {
        self.slots.iter().map(|(_, query)| query)
    }
}

impl fmt::Display for SubscriptionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .slots
            .iter()
            .map(|(name, query)| format!("{}={}", name, query))
            .collect();
        f.write_str(&parts.join(", "))
    }
}

/// One delivery of a subscription: slot name to evaluated result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    values: BTreeMap<String, String>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set a slot value
    pub fn with(mut self, slot: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(slot.into(), value.into());
        self
    }

    pub fn insert(&mut self, slot: impl Into<String>, value: impl Into<String>) {
        self.values.insert(slot.into(), value.into());
    }

    /// Value of a slot; missing slots read as empty
    pub fn get(&self, slot: &str) -> &str {
        self.values.get(slot).map(String::as_str).unwrap_or("")
    }
}

/// Receives every snapshot of a subscription
pub type UpdateCallback = Arc<dyn Fn(&Snapshot) + Send + Sync>;

/// Receives every recomputation of a watched value
pub type ValueCallback = Arc<dyn Fn(Option<&str>) + Send + Sync>;

/// A live watch. Dropping it releases the watch.
pub struct Subscription {
    id: String,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(id: impl Into<String>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            id: id.into(),
            release: Some(Box::new(release)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Release the watch now
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("live", &self.release.is_some())
            .finish()
    }
}

/// Services the engine consumes from the host application
#[async_trait]
pub trait Host: Send + Sync {
    /// Establish a subscription to host-computed values.
    ///
    /// `on_update` receives the initial snapshot and then one snapshot per
    /// upstream recomputation, until the returned subscription is released.
    async fn subscribe(
        &self,
        def: SubscriptionDef,
        on_update: UpdateCallback,
    ) -> Result<Subscription, HostError>;

    /// Watch the live evaluation of a trigger's event value expression.
    ///
    /// `on_change` is called right away with the current value and then
    /// synchronously on every recomputation.
    fn watch_value(
        &self,
        trigger: &TriggerId,
        on_change: ValueCallback,
    ) -> Result<Subscription, HostError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_snapshot_missing_slot_reads_empty() {
        let snapshot = Snapshot::new().with("selected", "A|B");
        assert_eq!(snapshot.get("selected"), "A|B");
        assert_eq!(snapshot.get("other"), "");
    }

    #[test]
    fn test_subscription_releases_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let subscription = Subscription::new("s1", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(subscription.id(), "s1");

        subscription.unsubscribe();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_releases_on_drop() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        {
            let _subscription = Subscription::new("s2", move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_definition_display() {
        let def = SubscriptionDef::new()
            .slot("selected", Query::SelectedCount {
                field: "Region".into(),
                state: "$".into(),
            })
            .slot("var", Query::Variable { name: "vMode".into() });
        assert_eq!(
            def.to_string(),
            "selected=selected count of Region [$], var=variable vMode"
        );
    }
}
