/// Event and trigger engine
///
/// Watches host-computed state through live subscriptions, detects the
/// transitions each event kind cares about, and hands activated triggers to
/// whoever runs their actions. One [`TriggerManager`] exists per owning
/// scope; the timer and theme services are shared by all of them.
pub mod coerce;
pub mod config;
pub mod diff;
pub mod error;
pub mod host;
pub mod listeners;
pub mod memory_host;
pub mod predicates;
pub mod registry;
pub mod services;

mod manager;

pub use config::{ConfigLoadError, EngineConfig};
pub use diff::{diff, TriggerDiff};
pub use error::{EngineError, HostError};
pub use host::{Host, Query, Snapshot, Subscription, SubscriptionDef};
pub use listeners::{FireCallback, ListenerContext, ListenerHandle};
pub use manager::TriggerManager;
pub use memory_host::{MemoryHost, DEFAULT_STATE};
pub use registry::EventRegistry;
pub use services::{SharedServices, ThemeService, TickMode, TimerService};

// Re-export the data model so callers need a single dependency
pub use tripwire_events::{
    trigger_count_message, Activation, DomainId, EventConfig, EventKind, Trigger, TriggerId,
};
