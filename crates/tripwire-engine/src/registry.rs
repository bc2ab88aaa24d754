use tracing::debug;

use tripwire_events::{EventKind, Trigger};

use crate::config::EngineConfig;
use crate::listeners::{
    ExpressionListener, Listener, ListenerContext, ListenerHandle, SelectionListener,
    SelectionRule, ThemeListener, TimerListener, TimerSettings, VariableListener,
};

/// Maps event kinds to listener factories
#[derive(Debug, Clone)]
pub struct EventRegistry {
    default_state: String,
    disabled: Vec<EventKind>,
}

impl EventRegistry {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            default_state: config.default_state.clone(),
            disabled: config.disabled_events.clone(),
        }
    }

    /// Event kinds a trigger can listen for in this environment
    pub fn available(&self) -> Vec<EventKind> {
        EventKind::LISTENABLE
            .into_iter()
            .filter(|kind| self.is_available(*kind))
            .collect()
    }

    pub fn is_available(&self, kind: EventKind) -> bool {
        kind.is_listenable() && !self.disabled.contains(&kind)
    }

    /// Build the listener for a trigger's event.
    ///
    /// Returns `None` when the trigger has no listenable event or misses a
    /// parameter its kind requires; such triggers are simply never mounted.
    pub fn build(&self, trigger: &Trigger, ctx: &ListenerContext) -> Option<ListenerHandle> {
        let event = &trigger.event;
        if !self.is_available(event.kind) {
            if event.kind.is_listenable() {
                debug!(
                    target: "triggers",
                    "Event {} is disabled, skipping trigger {}",
                    event.kind,
                    trigger.id
                );
            }
            return None;
        }

        let state = event
            .state()
            .or(ctx.active_state.as_deref())
            .unwrap_or(&self.default_state);

        let listener = match event.kind {
            EventKind::SelectField | EventKind::ClearField => {
                let rule = SelectionRule::for_event(event)?;
                let def = rule.subscription(event.field(), state);
                Listener::Selection(SelectionListener::new(rule, def))
            }
            EventKind::MatchExpression => Listener::Expression(ExpressionListener),
            EventKind::SetVariable => {
                let Some(name) = event.variable() else {
                    debug!(target: "triggers", "Trigger {} watches no variable", trigger.id);
                    return None;
                };
                Listener::Variable(VariableListener::new(
                    name,
                    event.value().map(str::to_string),
                ))
            }
            EventKind::ChangeTheme => {
                Listener::Theme(ThemeListener::new(event.theme().map(str::to_string)))
            }
            EventKind::OpenSheet => Listener::OpenSheet,
            EventKind::RegisterTimer => {
                Listener::Timer(TimerListener::new(TimerSettings::from_event(event)))
            }
            EventKind::None | EventKind::Unknown => return None,
        };

        Some(ListenerHandle::new(
            ctx,
            trigger.id.clone(),
            event.kind,
            listener,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_host::MemoryHost;
    use crate::services::{SharedServices, TickMode};
    use std::sync::Arc;
    use tripwire_events::{DomainId, EventConfig};

    fn context(active_state: Option<&str>) -> ListenerContext {
        let host = Arc::new(MemoryHost::new());
        ListenerContext {
            domain: DomainId::new("obj-1"),
            host: host.clone(),
            services: SharedServices::with_tick_mode(host, TickMode::Manual),
            active_state: active_state.map(str::to_string),
        }
    }

    fn trigger(event: EventConfig) -> Trigger {
        Trigger::new("t1", "Trigger 1").with_event(event)
    }

    #[test]
    fn test_available_respects_disabled_events() {
        let registry = EventRegistry::new(&EngineConfig::default());
        assert_eq!(registry.available(), EventKind::LISTENABLE.to_vec());

        let config = EngineConfig {
            disabled_events: vec![EventKind::ChangeTheme],
            ..EngineConfig::default()
        };
        let registry = EventRegistry::new(&config);
        assert!(!registry.available().contains(&EventKind::ChangeTheme));
        assert_eq!(registry.available().len(), EventKind::LISTENABLE.len() - 1);

        let handle = registry.build(
            &trigger(EventConfig::new(EventKind::ChangeTheme)),
            &context(None),
        );
        assert!(handle.is_none());
    }

    #[test]
    fn test_no_event_builds_nothing() {
        let registry = EventRegistry::new(&EngineConfig::default());
        let ctx = context(None);
        assert!(registry.build(&trigger(EventConfig::default()), &ctx).is_none());
        assert!(registry
            .build(&trigger(EventConfig::new(EventKind::Unknown)), &ctx)
            .is_none());
    }

    #[test]
    fn test_variable_name_is_required() {
        let registry = EventRegistry::new(&EngineConfig::default());
        let ctx = context(None);
        let event = EventConfig::new(EventKind::SetVariable).with_value("1");
        assert!(registry.build(&trigger(event.clone()), &ctx).is_none());

        let handle = registry
            .build(&trigger(event.with_variable("vMode")), &ctx)
            .unwrap();
        assert_eq!(handle.kind(), EventKind::SetVariable);
        assert_eq!(handle.trigger_id().as_str(), "t1");
        assert_eq!(handle.owner().as_str(), "obj-1");
    }

    #[test]
    fn test_every_listenable_kind_builds() {
        let registry = EventRegistry::new(&EngineConfig::default());
        let ctx = context(None);
        for kind in EventKind::LISTENABLE {
            let event = EventConfig::new(kind).with_variable("vMode");
            let handle = registry.build(&trigger(event), &ctx);
            assert_eq!(handle.map(|h| h.kind()), Some(kind));
        }
    }

    #[test]
    fn test_state_resolution_order() {
        let registry = EventRegistry::new(&EngineConfig::default());
        let selection_state = |handle: &ListenerHandle| match handle.listener() {
            Listener::Selection(listener) => listener.state().map(str::to_string),
            _ => None,
        };
        let event = EventConfig::new(EventKind::SelectField).with_field("Region");

        let handle = registry.build(&trigger(event.clone()), &context(None)).unwrap();
        assert_eq!(selection_state(&handle), Some("$".to_string()));

        let handle = registry
            .build(&trigger(event.clone()), &context(Some("Alt")))
            .unwrap();
        assert_eq!(selection_state(&handle), Some("Alt".to_string()));

        let handle = registry
            .build(&trigger(event.with_state("Own")), &context(Some("Alt")))
            .unwrap();
        assert_eq!(selection_state(&handle), Some("Own".to_string()));
    }
}
