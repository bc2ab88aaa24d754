//! Runtime listeners, one per mounted trigger.
//!
//! Every listener follows the same pattern: establish a watch on a
//! host-computed value, run a kind-specific transition predicate on every
//! update against the previously observed value, fire when it holds, and
//! always remember the new value afterwards.

mod expression;
mod selection;
mod sheet;
mod theme;
mod timer;
mod variable;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

use tripwire_events::{DomainId, EventKind, TriggerId};

use crate::error::EngineError;
use crate::host::{Host, Subscription};
use crate::services::SharedServices;

pub use expression::{expression_matches, ExpressionListener};
pub use selection::{
    other_fields_selected, selected_values, ClearRule, SelectRule, SelectionListener,
    SelectionRule, OTHER_SLOT, SELECTED_SLOT,
};
pub use theme::{theme_transition, ThemeListener};
pub use timer::{TimerListener, TimerSettings};
pub use variable::{variable_transition, VariableListener, VARIABLE_SLOT};

/// Called by a listener when its transition predicate holds
pub type FireCallback = Arc<dyn Fn() + Send + Sync>;

/// Last observed value of one listener.
///
/// Only the owning listener's update callback touches it.
pub(crate) struct Baseline<S> {
    previous: Mutex<S>,
}

impl<S: Clone> Baseline<S> {
    pub(crate) fn new(initial: S) -> Self {
        Self {
            previous: Mutex::new(initial),
        }
    }

    /// Evaluate `is_transition(previous, current)`, then store `current`
    /// whether or not the predicate held.
    pub(crate) fn observe(&self, current: &S, is_transition: impl FnOnce(&S, &S) -> bool) -> bool {
        let mut previous = self.previous.lock().unwrap_or_else(|e| e.into_inner());
        let fired = is_transition(&previous, current);
        *previous = current.clone();
        fired
    }
}

/// Scope information a listener is built for
#[derive(Clone)]
pub struct ListenerContext {
    pub domain: DomainId,
    pub host: Arc<dyn Host>,
    pub services: SharedServices,
    /// Active selection state of the owning scope, if it has one
    pub active_state: Option<String>,
}

/// The closed set of listener variants, one per event kind
pub(crate) enum Listener {
    Selection(SelectionListener),
    Expression(ExpressionListener),
    Variable(VariableListener),
    Theme(ThemeListener),
    OpenSheet,
    Timer(TimerListener),
}

/// The runtime watch established for one trigger.
///
/// Created by the [`EventRegistry`](crate::registry::EventRegistry), owned by
/// the lifecycle manager's live set. `destroy` may be called at any time,
/// including while `mount` is still pending; a destroyed handle never fires.
pub struct ListenerHandle {
    owner: DomainId,
    trigger_id: TriggerId,
    kind: EventKind,
    host: Arc<dyn Host>,
    services: SharedServices,
    listener: Listener,
    wanted: Arc<AtomicBool>,
    subscription: Mutex<Option<Subscription>>,
}

impl ListenerHandle {
    pub(crate) fn new(
        ctx: &ListenerContext,
        trigger_id: TriggerId,
        kind: EventKind,
        listener: Listener,
    ) -> Self {
        Self {
            owner: ctx.domain.clone(),
            trigger_id,
            kind,
            host: ctx.host.clone(),
            services: ctx.services.clone(),
            listener,
            wanted: Arc::new(AtomicBool::new(true)),
            subscription: Mutex::new(None),
        }
    }

    pub fn owner(&self) -> &DomainId {
        &self.owner
    }

    pub fn trigger_id(&self) -> &TriggerId {
        &self.trigger_id
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    #[cfg(test)]
    pub(crate) fn listener(&self) -> &Listener {
        &self.listener
    }

    /// Whether the handle holds an established watch
    pub fn is_live(&self) -> bool {
        self.wanted.load(Ordering::Acquire) && self.lock_subscription().is_some()
    }

    fn lock_subscription(&self) -> std::sync::MutexGuard<'_, Option<Subscription>> {
        self.subscription.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Establish the watch. Resolves once the underlying host subscription
    /// is live; rejects when the host cannot establish it.
    pub async fn mount(&self, fire: FireCallback) -> Result<(), EngineError> {
        let wanted = self.wanted.clone();
        let guarded: FireCallback = Arc::new(move || {
            if wanted.load(Ordering::Acquire) {
                fire();
            }
        });

        let subscription = match &self.listener {
            Listener::Selection(listener) => Some(listener.establish(&*self.host, guarded).await?),
            Listener::Expression(listener) => {
                Some(listener.establish(&*self.host, &self.trigger_id, guarded)?)
            }
            Listener::Variable(listener) => Some(listener.establish(&*self.host, guarded).await?),
            Listener::Theme(listener) => Some(
                listener
                    .establish(&self.services.theme, &self.owner, &self.trigger_id, guarded)
                    .await?,
            ),
            Listener::OpenSheet => {
                sheet::open(guarded);
                None
            }
            Listener::Timer(listener) => Some(listener.establish(
                &self.services.timer,
                &self.owner,
                &self.trigger_id,
                guarded,
            )?),
        };

        if let Some(subscription) = subscription {
            if self.wanted.load(Ordering::Acquire) {
                *self.lock_subscription() = Some(subscription);
            } else {
                debug!(
                    target: "listeners",
                    "Trigger {} destroyed while mounting, releasing {}",
                    self.trigger_id,
                    subscription.id()
                );
                subscription.unsubscribe();
            }
        }

        Ok(())
    }

    /// Release the watch. Safe to call more than once.
    pub fn destroy(&self) {
        self.wanted.store(false, Ordering::Release);
        let subscription = self.lock_subscription().take();
        if let Some(subscription) = subscription {
            debug!(
                target: "listeners",
                "Releasing {} for trigger {}",
                subscription.id(),
                self.trigger_id
            );
            subscription.unsubscribe();
        }
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("owner", &self.owner)
            .field("trigger_id", &self.trigger_id)
            .field("kind", &self.kind)
            .field("wanted", &self.wanted.load(Ordering::Acquire))
            .finish()
    }
}
