use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use tripwire_events::{trigger_count_message, Activation, DomainId, Trigger, TriggerId};

use crate::coerce::as_boolean;
use crate::config::EngineConfig;
use crate::diff::{diff, TriggerDiff};
use crate::error::EngineError;
use crate::host::Host;
use crate::listeners::{FireCallback, ListenerContext, ListenerHandle};
use crate::registry::EventRegistry;
use crate::services::SharedServices;

/// State of the owning scope read by activation callbacks
struct ScopeState {
    domain: DomainId,
    triggers: RwLock<Vec<Trigger>>,
    active_state: RwLock<Option<String>>,
    editing: AtomicBool,
    suppress_while_editing: bool,
    activation_tx: UnboundedSender<Activation>,
}

impl ScopeState {
    fn triggers(&self) -> RwLockReadGuard<'_, Vec<Trigger>> {
        self.triggers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn triggers_mut(&self) -> RwLockWriteGuard<'_, Vec<Trigger>> {
        self.triggers.write().unwrap_or_else(|e| e.into_inner())
    }

    fn active_state(&self) -> Option<String> {
        self.active_state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Called when a listener fires. Checks the trigger's current
    /// configuration and hands it to the dispatcher.
    fn activate(&self, id: &TriggerId) {
        let trigger = self.triggers().iter().find(|t| &t.id == id).cloned();

        let Some(trigger) = trigger else {
            debug!(target: "triggers", "Trigger {} no longer exists, ignoring activation", id);
            return;
        };

        if !trigger.enabled {
            debug!(target: "triggers", "Trigger {} is disabled", id);
            return;
        }

        if !as_boolean(trigger.run_condition.as_deref()) {
            debug!(target: "triggers", "Run condition of trigger {} is not met", id);
            return;
        }

        if self.suppress_while_editing && self.editing.load(Ordering::Acquire) {
            debug!(target: "triggers", "Trigger {} fired while editing, dropped", id);
            return;
        }

        info!(
            target: "triggers",
            "Trigger {} ({}) activated by {}",
            trigger.id,
            trigger.label,
            trigger.event.kind
        );

        if self
            .activation_tx
            .send(Activation::new(self.domain.clone(), trigger))
            .is_err()
        {
            warn!(target: "triggers", "Activation receiver dropped, trigger {} not dispatched", id);
        }
    }
}

/// Mounts, tears down and remounts the listeners of one scope.
///
/// Listeners are mounted one at a time in list order; the live set stays
/// locked for the whole of every operation, so operations never interleave.
pub struct TriggerManager {
    host: Arc<dyn Host>,
    services: SharedServices,
    registry: EventRegistry,
    scope: Arc<ScopeState>,
    live: tokio::sync::Mutex<Vec<ListenerHandle>>,
}

impl TriggerManager {
    pub fn new(
        domain: DomainId,
        host: Arc<dyn Host>,
        services: SharedServices,
        config: &EngineConfig,
        triggers: Vec<Trigger>,
        activation_tx: UnboundedSender<Activation>,
    ) -> Self {
        Self {
            host,
            services,
            registry: EventRegistry::new(config),
            scope: Arc::new(ScopeState {
                domain,
                triggers: RwLock::new(triggers),
                active_state: RwLock::new(None),
                editing: AtomicBool::new(false),
                suppress_while_editing: config.suppress_while_editing,
                activation_tx,
            }),
            live: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn domain(&self) -> &DomainId {
        &self.scope.domain
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    /// Current trigger configuration
    pub fn triggers(&self) -> Vec<Trigger> {
        self.scope.triggers().clone()
    }

    pub fn trigger_count_message(&self) -> String {
        trigger_count_message(self.scope.triggers().len())
    }

    /// Ids of the mounted listeners, in mount order
    pub async fn live_ids(&self) -> Vec<TriggerId> {
        self.live
            .lock()
            .await
            .iter()
            .map(|handle| handle.trigger_id().clone())
            .collect()
    }

    pub fn active_state(&self) -> Option<String> {
        self.scope.active_state()
    }

    pub fn is_editing(&self) -> bool {
        self.scope.editing.load(Ordering::Acquire)
    }

    pub fn set_editing(&self, editing: bool) {
        self.scope.editing.store(editing, Ordering::Release);
        debug!(target: "triggers", "Scope {} editing: {}", self.scope.domain, editing);
    }

    /// Register the scope with the shared timer
    pub fn attach(&self) -> Result<(), EngineError> {
        self.services.timer.attach(&self.scope.domain)
    }

    /// Tear down every listener and leave the shared services
    pub async fn detach(&self) {
        self.teardown(None).await;
        self.services.detach(&self.scope.domain).await;
    }

    fn context(&self) -> ListenerContext {
        ListenerContext {
            domain: self.scope.domain.clone(),
            host: self.host.clone(),
            services: self.services.clone(),
            active_state: self.scope.active_state(),
        }
    }

    fn fire_callback(&self, id: TriggerId) -> FireCallback {
        let scope = Arc::downgrade(&self.scope);
        Arc::new(move || {
            if let Some(scope) = scope.upgrade() {
                scope.activate(&id);
            }
        })
    }

    /// Mount listeners for the given triggers, or for all configured
    /// triggers. Returns the number of listeners mounted.
    pub async fn setup(&self, ids: Option<&[TriggerId]>) -> usize {
        let mut live = self.live.lock().await;
        self.setup_locked(&mut live, ids).await
    }

    /// Destroy the listeners of the given triggers, or all of them. Returns
    /// the number of listeners destroyed.
    pub async fn teardown(&self, ids: Option<&[TriggerId]>) -> usize {
        let mut live = self.live.lock().await;
        Self::teardown_locked(&mut live, ids)
    }

    /// Destroy every listener and mount all triggers again with fresh
    /// baselines
    pub async fn reset(&self) -> usize {
        let mut live = self.live.lock().await;
        Self::teardown_locked(&mut live, None);
        self.setup_locked(&mut live, None).await
    }

    /// Replace the trigger configuration and remount what changed
    pub async fn update_triggers(&self, triggers: Vec<Trigger>) -> TriggerDiff {
        let mut live = self.live.lock().await;

        let changes = {
            let mut current = self.scope.triggers_mut();
            let changes = diff(&triggers, &current);
            *current = triggers;
            changes
        };

        if changes.is_empty() {
            return changes;
        }

        debug!(
            target: "triggers",
            "Trigger list changed: {} to remove, {} to add",
            changes.to_remove.len(),
            changes.to_add.len()
        );
        Self::teardown_locked(&mut live, Some(changes.to_remove.as_slice()));
        self.setup_locked(&mut live, Some(changes.to_add.as_slice())).await;
        changes
    }

    /// Change the scope's active selection state. All listeners are reset
    /// when it actually changes. Returns whether it changed.
    pub async fn set_active_state(&self, state: Option<String>) -> bool {
        {
            let mut current = self
                .scope
                .active_state
                .write()
                .unwrap_or_else(|e| e.into_inner());
            if *current == state {
                return false;
            }
            *current = state;
        }

        info!(
            target: "triggers",
            "Active state of {} changed, resetting listeners",
            self.scope.domain
        );
        self.reset().await;
        true
    }

    async fn setup_locked(
        &self,
        live: &mut Vec<ListenerHandle>,
        ids: Option<&[TriggerId]>,
    ) -> usize {
        let triggers: Vec<Trigger> = self
            .scope
            .triggers()
            .iter()
            .filter(|t| ids.map_or(true, |ids| ids.contains(&t.id)))
            .cloned()
            .collect();
        let ctx = self.context();
        let mut mounted = 0;

        for trigger in &triggers {
            if live.iter().any(|handle| handle.trigger_id() == &trigger.id) {
                warn!(target: "triggers", "Trigger {} is already mounted, skipping", trigger.id);
                continue;
            }

            let Some(handle) = self.registry.build(trigger, &ctx) else {
                debug!(target: "triggers", "Trigger {} has no listener", trigger.id);
                continue;
            };

            match handle.mount(self.fire_callback(trigger.id.clone())).await {
                Ok(()) => {
                    debug!(
                        target: "triggers",
                        "Mounted {} listener for trigger {}",
                        handle.kind(),
                        trigger.id
                    );
                    live.push(handle);
                    mounted += 1;
                }
                Err(e) => {
                    error!(target: "triggers", "Failed to mount trigger {}: {}", trigger.id, e);
                    handle.destroy();
                }
            }
        }

        mounted
    }

    fn teardown_locked(live: &mut Vec<ListenerHandle>, ids: Option<&[TriggerId]>) -> usize {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(live)
            .into_iter()
            .partition(|handle| ids.map_or(true, |ids| ids.contains(handle.trigger_id())));
        *live = kept;

        for handle in &removed {
            debug!(target: "triggers", "Destroying listener for trigger {}", handle.trigger_id());
            handle.destroy();
        }
        removed.len()
    }
}

impl Drop for TriggerManager {
    fn drop(&mut self) {
        for handle in self.live.get_mut().iter() {
            handle.destroy();
        }
        // Theme detach is async, only the timer is released here
        self.services.timer.detach(&self.scope.domain);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_host::MemoryHost;
    use crate::services::TickMode;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
    use tripwire_events::{EventConfig, EventKind};

    fn manager(
        host: Arc<MemoryHost>,
        triggers: Vec<Trigger>,
    ) -> (TriggerManager, UnboundedReceiver<Activation>) {
        let (tx, rx) = unbounded_channel();
        let services = SharedServices::with_tick_mode(host.clone(), TickMode::Manual);
        let manager = TriggerManager::new(
            DomainId::new("obj-1"),
            host,
            services,
            &EngineConfig::default(),
            triggers,
            tx,
        );
        (manager, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<Activation>) -> Vec<String> {
        let mut ids = Vec::new();
        while let Ok(activation) = rx.try_recv() {
            ids.push(activation.trigger_id().to_string());
        }
        ids
    }

    fn variable_trigger(id: &str, variable: &str) -> Trigger {
        Trigger::new(id, id).with_event(
            EventConfig::new(EventKind::SetVariable)
                .with_variable(variable)
                .with_value("on"),
        )
    }

    #[tokio::test]
    async fn test_setup_subset_and_teardown() {
        let host = Arc::new(MemoryHost::new());
        let (manager, _rx) = manager(
            host.clone(),
            vec![
                variable_trigger("t1", "vA"),
                variable_trigger("t2", "vB"),
                Trigger::new("t3", "empty"),
            ],
        );

        assert_eq!(manager.setup(Some(&[TriggerId::new("t2")])).await, 1);
        assert_eq!(manager.live_ids().await, vec![TriggerId::new("t2")]);

        // Already live ids are skipped, event-less triggers mount nothing
        assert_eq!(manager.setup(None).await, 1);
        assert_eq!(
            manager.live_ids().await,
            vec![TriggerId::new("t2"), TriggerId::new("t1")]
        );
        assert_eq!(host.subscription_count(), 2);

        assert_eq!(manager.teardown(Some(&[TriggerId::new("missing")])).await, 0);
        assert_eq!(manager.teardown(None).await, 2);
        assert_eq!(host.subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_subset_mounts_nothing() {
        let host = Arc::new(MemoryHost::new());
        let (manager, _rx) = manager(host, vec![variable_trigger("t1", "vA")]);
        assert_eq!(manager.setup(Some(&[])).await, 0);
        assert!(manager.live_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_activation_uses_current_configuration() {
        let host = Arc::new(MemoryHost::new());
        let (manager, mut rx) = manager(host.clone(), vec![variable_trigger("t1", "vA")]);
        manager.setup(None).await;

        host.set_variable("vA", "on");
        let activation = rx.try_recv().unwrap();
        assert_eq!(activation.trigger.label, "t1");
        assert_eq!(activation.event, EventKind::SetVariable);
        assert_eq!(activation.domain.as_str(), "obj-1");

        // A label edit does not remount but is visible on the next activation
        let mut edited = manager.triggers();
        edited[0].label = "Renamed".to_string();
        assert!(manager.update_triggers(edited).await.is_empty());

        host.set_variable("vA", "off");
        host.set_variable("vA", "on");
        assert_eq!(rx.try_recv().unwrap().trigger.label, "Renamed");
    }

    #[tokio::test]
    async fn test_trigger_count_message() {
        let host = Arc::new(MemoryHost::new());
        let (manager, _rx) = manager(host, tripwire_events::initial_triggers());
        assert_eq!(
            manager.trigger_count_message(),
            "There is 1 trigger registered."
        );
    }

    #[tokio::test]
    async fn test_activation_after_manager_dropped_is_ignored() {
        let host = Arc::new(MemoryHost::new());
        let (manager, mut rx) = manager(host.clone(), vec![variable_trigger("t1", "vA")]);
        manager.setup(None).await;
        drop(manager);

        host.set_variable("vA", "on");
        assert!(drain(&mut rx).is_empty());
        assert_eq!(host.subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_drop_releases_timer_domain() {
        let host = Arc::new(MemoryHost::new());
        let timer = Trigger::new("t1", "t1").with_event(
            EventConfig::new(EventKind::RegisterTimer)
                .with_value("2")
                .with_either_or(true),
        );
        let (manager, _rx) = manager(host, vec![timer]);
        let services = manager.services.clone();
        manager.attach().unwrap();
        manager.setup(None).await;
        assert_eq!(services.timer.domain_count(), 1);
        assert_eq!(services.timer.registered_count(), 1);

        drop(manager);
        assert_eq!(services.timer.domain_count(), 0);
        assert_eq!(services.timer.registered_count(), 0);
        assert!(!services.timer.is_running());
    }

    #[tokio::test]
    async fn test_activation_for_unknown_id_is_ignored() {
        let host = Arc::new(MemoryHost::new());
        let (manager, mut rx) = manager(host, vec![variable_trigger("t1", "vA")]);
        manager.scope.activate(&TriggerId::new("gone"));
        assert!(drain(&mut rx).is_empty());

        manager.scope.activate(&TriggerId::new("t1"));
        assert_eq!(drain(&mut rx), vec!["t1".to_string()]);
    }
}
