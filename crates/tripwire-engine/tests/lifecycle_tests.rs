//! Integration tests for the trigger lifecycle
//!
//! These drive a [`TriggerManager`] against the in-memory host and check:
//! - Sequential mounting in list order
//! - Failure isolation between triggers
//! - Activation checks (enabled, run condition, edit mode)
//! - Remounting after configuration and state changes

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::sync::Notify;

use tripwire_engine::host::{UpdateCallback, ValueCallback};
use tripwire_engine::{
    Activation, DomainId, EngineConfig, EventConfig, EventKind, EventRegistry, Host, HostError,
    ListenerContext, MemoryHost, SharedServices, Subscription, SubscriptionDef, TickMode,
    Trigger, TriggerId, TriggerManager,
};

fn new_manager(
    host: Arc<dyn Host>,
    triggers: Vec<Trigger>,
) -> (TriggerManager, UnboundedReceiver<Activation>) {
    let (tx, rx) = unbounded_channel();
    let services = SharedServices::with_tick_mode(host.clone(), TickMode::Manual);
    let manager = TriggerManager::new(
        DomainId::new("sheet-object-1"),
        host,
        services,
        &EngineConfig::default(),
        triggers,
        tx,
    );
    (manager, rx)
}

fn activated(rx: &mut UnboundedReceiver<Activation>) -> Vec<String> {
    let mut ids = Vec::new();
    while let Ok(activation) = rx.try_recv() {
        ids.push(activation.trigger_id().to_string());
    }
    ids
}

fn on_variable(id: &str, variable: &str) -> Trigger {
    Trigger::new(id, id).with_event(
        EventConfig::new(EventKind::SetVariable)
            .with_variable(variable)
            .with_value("on"),
    )
}

/// Host that records when each subscription starts and finishes
/// establishing, yielding in between
struct RecordingHost {
    inner: MemoryHost,
    log: Mutex<Vec<String>>,
}

#[async_trait]
impl Host for RecordingHost {
    async fn subscribe(
        &self,
        def: SubscriptionDef,
        on_update: UpdateCallback,
    ) -> Result<Subscription, HostError> {
        self.log.lock().unwrap().push(format!("start {}", def));
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        let result = self.inner.subscribe(def.clone(), on_update).await;
        self.log.lock().unwrap().push(format!("end {}", def));
        result
    }

    fn watch_value(
        &self,
        trigger: &TriggerId,
        on_change: ValueCallback,
    ) -> Result<Subscription, HostError> {
        self.inner.watch_value(trigger, on_change)
    }
}

/// Host whose subscriptions only complete once the gate is opened
struct GatedHost {
    inner: Arc<MemoryHost>,
    started: Notify,
    gate: Notify,
}

#[async_trait]
impl Host for GatedHost {
    async fn subscribe(
        &self,
        def: SubscriptionDef,
        on_update: UpdateCallback,
    ) -> Result<Subscription, HostError> {
        self.started.notify_one();
        self.gate.notified().await;
        self.inner.subscribe(def, on_update).await
    }

    fn watch_value(
        &self,
        trigger: &TriggerId,
        on_change: ValueCallback,
    ) -> Result<Subscription, HostError> {
        self.inner.watch_value(trigger, on_change)
    }
}

#[tokio::test]
async fn test_setup_mounts_sequentially_in_list_order() {
    let host = Arc::new(RecordingHost {
        inner: MemoryHost::new(),
        log: Mutex::new(Vec::new()),
    });
    let (manager, _rx) = new_manager(
        host.clone(),
        vec![
            on_variable("a", "vA"),
            on_variable("b", "vB"),
            on_variable("c", "vC"),
        ],
    );

    assert_eq!(manager.setup(None).await, 3);

    let log = host.log.lock().unwrap();
    assert_eq!(
        *log,
        vec![
            "start var=variable vA",
            "end var=variable vA",
            "start var=variable vB",
            "end var=variable vB",
            "start var=variable vC",
            "end var=variable vC",
        ]
    );
}

#[tokio::test]
async fn test_failed_mount_does_not_affect_siblings() {
    let host = Arc::new(MemoryHost::new());
    host.fail_subscriptions_for("vB");
    let (manager, mut rx) = new_manager(
        host.clone(),
        vec![
            on_variable("a", "vA"),
            on_variable("b", "vB"),
            on_variable("c", "vC"),
        ],
    );

    assert_eq!(manager.setup(None).await, 2);
    assert_eq!(
        manager.live_ids().await,
        vec![TriggerId::new("a"), TriggerId::new("c")]
    );

    host.set_variable("vA", "on");
    host.set_variable("vB", "on");
    host.set_variable("vC", "on");
    assert_eq!(activated(&mut rx), vec!["a", "c"]);
}

#[tokio::test]
async fn test_activation_checks() {
    let host = Arc::new(MemoryHost::new());
    let (manager, mut rx) = new_manager(
        host.clone(),
        vec![
            on_variable("plain", "vA"),
            on_variable("disabled", "vA").with_enabled(false),
            on_variable("blocked", "vA").with_run_condition("0"),
            on_variable("allowed", "vA").with_run_condition("1"),
            on_variable("blank", "vA").with_run_condition(""),
        ],
    );
    manager.setup(None).await;

    host.set_variable("vA", "on");
    assert_eq!(activated(&mut rx), vec!["plain", "allowed", "blank"]);

    manager.set_editing(true);
    host.set_variable("vA", "off");
    host.set_variable("vA", "on");
    assert!(activated(&mut rx).is_empty());

    manager.set_editing(false);
    host.set_variable("vA", "off");
    host.set_variable("vA", "on");
    assert_eq!(activated(&mut rx), vec!["plain", "allowed", "blank"]);
}

#[tokio::test]
async fn test_edit_mode_without_suppression() {
    let host = Arc::new(MemoryHost::new());
    let (tx, mut rx) = unbounded_channel();
    let config = EngineConfig {
        suppress_while_editing: false,
        ..EngineConfig::default()
    };
    let manager = TriggerManager::new(
        DomainId::new("obj"),
        host.clone(),
        SharedServices::with_tick_mode(host.clone(), TickMode::Manual),
        &config,
        vec![on_variable("t1", "vA")],
        tx,
    );
    manager.setup(None).await;
    manager.set_editing(true);

    host.set_variable("vA", "on");
    assert_eq!(activated(&mut rx), vec!["t1"]);
}

#[tokio::test]
async fn test_open_sheet_fires_on_mount() {
    let host = Arc::new(MemoryHost::new());
    let (manager, mut rx) = new_manager(
        host,
        vec![Trigger::new("welcome", "Welcome").with_event(EventConfig::new(EventKind::OpenSheet))],
    );

    manager.setup(None).await;
    assert_eq!(activated(&mut rx), vec!["welcome"]);

    manager.reset().await;
    assert_eq!(activated(&mut rx), vec!["welcome"]);
}

#[tokio::test]
async fn test_update_triggers_remounts_changed_ids() {
    let host = Arc::new(MemoryHost::new());
    let (manager, mut rx) = new_manager(
        host.clone(),
        vec![on_variable("t1", "vA"), on_variable("t2", "vB")],
    );
    manager.setup(None).await;

    let mut edited = manager.triggers();
    edited[0].event.value = Some("ready".to_string());
    edited.remove(1);
    edited.push(on_variable("t3", "vC"));

    let changes = manager.update_triggers(edited).await;
    assert_eq!(
        changes.to_remove,
        vec![TriggerId::new("t1"), TriggerId::new("t2")]
    );
    assert_eq!(
        changes.to_add,
        vec![TriggerId::new("t1"), TriggerId::new("t3")]
    );
    assert_eq!(
        manager.live_ids().await,
        vec![TriggerId::new("t1"), TriggerId::new("t3")]
    );
    assert_eq!(host.subscription_count(), 2);

    host.set_variable("vA", "on");
    host.set_variable("vB", "on");
    host.set_variable("vA", "ready");
    host.set_variable("vC", "on");
    assert_eq!(activated(&mut rx), vec!["t1", "t3"]);
}

#[tokio::test]
async fn test_state_change_resets_listeners() {
    let host = Arc::new(MemoryHost::new());
    let (manager, mut rx) = new_manager(
        host.clone(),
        vec![Trigger::new("t1", "Region").with_event(
            EventConfig::new(EventKind::SelectField).with_field("Region"),
        )],
    );
    manager.setup(None).await;

    assert!(manager.set_active_state(Some("Alt".to_string())).await);
    assert!(!manager.set_active_state(Some("Alt".to_string())).await);

    host.select("Region", &["North"]);
    assert!(activated(&mut rx).is_empty());

    host.select_in("Alt", "Region", &["South"]);
    assert_eq!(activated(&mut rx), vec!["t1"]);
}

#[tokio::test]
async fn test_destroy_while_mounting_never_fires() {
    let memory = Arc::new(MemoryHost::new());
    let host = Arc::new(GatedHost {
        inner: memory.clone(),
        started: Notify::new(),
        gate: Notify::new(),
    });
    let ctx = ListenerContext {
        domain: DomainId::new("obj"),
        host: host.clone(),
        services: SharedServices::with_tick_mode(host.clone(), TickMode::Manual),
        active_state: None,
    };
    let registry = EventRegistry::new(&EngineConfig::default());
    let handle = registry.build(&on_variable("t1", "vA"), &ctx).unwrap();

    let fired = Arc::new(Mutex::new(0));
    let counter = fired.clone();
    let mount = handle.mount(Arc::new(move || *counter.lock().unwrap() += 1));
    let control = async {
        host.started.notified().await;
        handle.destroy();
        host.gate.notify_one();
    };

    let (result, ()) = tokio::join!(mount, control);
    assert!(result.is_ok());
    assert!(!handle.is_live());
    assert_eq!(memory.subscription_count(), 0);

    memory.set_variable("vA", "on");
    assert_eq!(*fired.lock().unwrap(), 0);
}
