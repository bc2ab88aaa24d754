use tripwire_events::TriggerId;

use crate::config::ConfigLoadError;

/// Failures reported by the host when establishing a watch
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("Subscription for {query} could not be established: {reason}")]
    SubscriptionFailed { query: String, reason: String },

    #[error("Expression watch for trigger {trigger} could not be established: {reason}")]
    WatchFailed { trigger: TriggerId, reason: String },

    #[error("Host is no longer available")]
    Closed,
}

/// Errors surfaced by the engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Host(#[from] HostError),

    #[error("The shared timer needs a running tokio runtime")]
    NoRuntime,

    #[error(transparent)]
    Config(#[from] ConfigLoadError),
}
