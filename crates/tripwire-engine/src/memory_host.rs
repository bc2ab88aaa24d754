//! In-memory [`Host`] implementation.
//!
//! Keeps selections, variables, the theme and per-trigger expression values
//! in memory and pushes fresh snapshots to every live subscription whenever
//! any of them changes, the way a calculation engine invalidates all of its
//! session objects after each change.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::debug;

use tripwire_events::TriggerId;

use crate::error::HostError;
use crate::host::{
    Host, Query, Snapshot, Subscription, SubscriptionDef, UpdateCallback, ValueCallback,
};

/// State identifier of the default selection state
pub const DEFAULT_STATE: &str = "$";

#[derive(Default)]
struct MemoryState {
    /// state -> ordered (field, selected values)
    selections: BTreeMap<String, Vec<(String, Vec<String>)>>,
    variables: BTreeMap<String, String>,
    theme: String,
    expressions: HashMap<TriggerId, String>,
    subscriptions: BTreeMap<u64, (SubscriptionDef, UpdateCallback)>,
    watches: BTreeMap<u64, (TriggerId, ValueCallback)>,
    next_id: u64,
    /// Field or variable names whose subscriptions fail
    failing: Vec<String>,
}

impl MemoryState {
    fn field_values(&self, field: &str, state: &str) -> &[String] {
        self.selections
            .get(state)
            .and_then(|fields| fields.iter().find(|(name, _)| name == field))
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    fn evaluate(&self, query: &Query) -> String {
        match query {
            Query::CurrentSelections { state } => self
                .selections
                .get(state)
                .map(|fields| {
                    fields
                        .iter()
                        .filter(|(_, values)| !values.is_empty())
                        .map(|(field, values)| format!("{}: {}", field, values.join(", ")))
                        .collect::<Vec<_>>()
                        .join("|")
                })
                .unwrap_or_default(),
            Query::FieldSelections { field, state } => self.field_values(field, state).join("|"),
            Query::SelectedCount { field, state } => {
                self.field_values(field, state).len().to_string()
            }
            Query::Variable { name } => self.variables.get(name).cloned().unwrap_or_default(),
            Query::Theme => self.theme.clone(),
        }
    }

    fn snapshot(&self, def: &SubscriptionDef) -> Snapshot {
        let mut snapshot = Snapshot::new();
        for (slot, query) in def.slots() {
            snapshot.insert(slot, self.evaluate(query));
        }
        snapshot
    }

    fn fails<'a>(&self, def: &'a SubscriptionDef) -> Option<&'a Query> {
        def.queries().find(|query| {
            let name = match query {
                Query::FieldSelections { field, .. } | Query::SelectedCount { field, .. } => {
                    field.as_str()
                }
                Query::Variable { name } => name.as_str(),
                Query::CurrentSelections { .. } => "",
                Query::Theme => "theme",
            };
            self.failing.iter().any(|f| f == name)
        })
    }
}

/// Host that lives entirely in memory
#[derive(Default)]
pub struct MemoryHost {
    state: Arc<Mutex<MemoryState>>,
}

fn lock(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_theme(theme: impl Into<String>) -> Self {
        let host = Self::new();
        lock(&host.state).theme = theme.into();
        host
    }

    /// Replace the selection of a field in the default state
    pub fn select(&self, field: &str, values: &[&str]) {
        self.select_in(DEFAULT_STATE, field, values);
    }

    /// Replace the selection of a field in a state
    pub fn select_in(&self, state: &str, field: &str, values: &[&str]) {
        {
            let mut guard = lock(&self.state);
            let fields = guard.selections.entry(state.to_string()).or_default();
            let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
            match fields.iter_mut().find(|(name, _)| name == field) {
                Some((_, existing)) => *existing = values,
                None => fields.push((field.to_string(), values)),
            }
        }
        self.recompute();
    }

    /// Clear one field in the default state
    pub fn clear_field(&self, field: &str) {
        self.clear_field_in(DEFAULT_STATE, field);
    }

    pub fn clear_field_in(&self, state: &str, field: &str) {
        {
            let mut guard = lock(&self.state);
            if let Some(fields) = guard.selections.get_mut(state) {
                fields.retain(|(name, _)| name != field);
            }
        }
        self.recompute();
    }

    /// Clear every field in a state
    pub fn clear_all(&self, state: &str) {
        lock(&self.state).selections.remove(state);
        self.recompute();
    }

    pub fn set_variable(&self, name: &str, value: &str) {
        lock(&self.state)
            .variables
            .insert(name.to_string(), value.to_string());
        self.recompute();
    }

    pub fn set_theme(&self, theme: &str) {
        lock(&self.state).theme = theme.to_string();
        self.recompute();
    }

    /// Set the evaluated value of a trigger's event expression
    pub fn set_expression(&self, trigger: &TriggerId, value: &str) {
        let watchers: Vec<ValueCallback> = {
            let mut guard = lock(&self.state);
            guard.expressions.insert(trigger.clone(), value.to_string());
            guard
                .watches
                .values()
                .filter(|(watched, _)| watched == trigger)
                .map(|(_, callback)| callback.clone())
                .collect()
        };

        for callback in watchers {
            callback(Some(value));
        }
    }

    /// Make subscriptions that query this field or variable fail
    pub fn fail_subscriptions_for(&self, name: &str) {
        lock(&self.state).failing.push(name.to_string());
    }

    pub fn subscription_count(&self) -> usize {
        lock(&self.state).subscriptions.len()
    }

    pub fn watch_count(&self) -> usize {
        lock(&self.state).watches.len()
    }

    /// Push fresh snapshots to every subscription
    pub fn recompute(&self) {
        let deliveries: Vec<(Snapshot, UpdateCallback)> = {
            let guard = lock(&self.state);
            guard
                .subscriptions
                .values()
                .map(|(def, callback)| (guard.snapshot(def), callback.clone()))
                .collect()
        };

        for (snapshot, callback) in deliveries {
            callback(&snapshot);
        }
    }

    fn release_handle(
        state: Weak<Mutex<MemoryState>>,
        id: u64,
        watch: bool,
    ) -> impl FnOnce() + Send {
        move || {
            if let Some(state) = state.upgrade() {
                let mut guard = lock(&state);
                if watch {
                    guard.watches.remove(&id);
                } else {
                    guard.subscriptions.remove(&id);
                }
            }
        }
    }
}

#[async_trait]
impl Host for MemoryHost {
    async fn subscribe(
        &self,
        def: SubscriptionDef,
        on_update: UpdateCallback,
    ) -> Result<Subscription, HostError> {
        let (id, initial) = {
            let mut guard = lock(&self.state);
            if let Some(query) = guard.fails(&def) {
                return Err(HostError::SubscriptionFailed {
                    query: query.to_string(),
                    reason: "rejected by host".to_string(),
                });
            }

            guard.next_id += 1;
            let id = guard.next_id;
            let initial = guard.snapshot(&def);
            debug!(target: "host", "Subscription {} created for {}", id, def);
            guard.subscriptions.insert(id, (def, on_update.clone()));
            (id, initial)
        };

        on_update(&initial);

        Ok(Subscription::new(
            format!("memory-{}", id),
            Self::release_handle(Arc::downgrade(&self.state), id, false),
        ))
    }

    fn watch_value(
        &self,
        trigger: &TriggerId,
        on_change: ValueCallback,
    ) -> Result<Subscription, HostError> {
        let (id, current) = {
            let mut guard = lock(&self.state);
            if guard.failing.iter().any(|f| f == trigger.as_str()) {
                return Err(HostError::WatchFailed {
                    trigger: trigger.clone(),
                    reason: "rejected by host".to_string(),
                });
            }

            guard.next_id += 1;
            let id = guard.next_id;
            guard
                .watches
                .insert(id, (trigger.clone(), on_change.clone()));
            (id, guard.expressions.get(trigger).cloned())
        };

        on_change(current.as_deref());

        Ok(Subscription::new(
            format!("watch-{}", id),
            Self::release_handle(Arc::downgrade(&self.state), id, true),
        ))
    }
}
