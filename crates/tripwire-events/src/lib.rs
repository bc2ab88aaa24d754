/// Core trigger types for tripwire
///
/// This crate holds the configuration model shared between the engine and
/// whatever owns the trigger list (a property panel, a scenario file, ...),
/// so that neither side depends on the other.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

mod kind;
mod trigger;

pub use kind::EventKind;
pub use trigger::{
    default_label, initial_triggers, trigger_count_message, EventConfig, Trigger,
};

// ============================================================================
// Identifiers
// ============================================================================

/// Stable identity of a trigger within its list.
///
/// Assigned when the trigger is created and never reused, so live listeners
/// are always correlated with their configuration by id, not by position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerId(String);

impl TriggerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TriggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TriggerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Opaque scope identifier, one per owning object instance.
///
/// Shared services key their per-trigger callback tables by domain so that
/// concurrently mounted objects never see each other's callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainId(String);

impl DomainId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DomainId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

// ============================================================================
// Activations
// ============================================================================

/// A trigger that passed all checks and should now run its actions.
///
/// Carries the trigger's configuration as it was when the event fired, not
/// as it was when the listener was mounted.
#[derive(Debug, Clone, PartialEq)]
pub struct Activation {
    /// Scope that owns the trigger
    pub domain: DomainId,
    /// Current configuration of the trigger
    pub trigger: Trigger,
    /// Kind of event that fired
    pub event: EventKind,
    /// When the listener fired
    pub fired_at: DateTime<Utc>,
}

impl Activation {
    pub fn new(domain: DomainId, trigger: Trigger) -> Self {
        let event = trigger.event.kind;
        Self {
            domain,
            trigger,
            event,
            fired_at: Utc::now(),
        }
    }

    pub fn trigger_id(&self) -> &TriggerId {
        &self.trigger.id
    }
}
