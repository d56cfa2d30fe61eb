//! Event system error types

use thiserror::Error;

/// Errors raised while registering listeners or publishing events
#[derive(Debug, Error)]
pub enum EventError {
    /// A priority string did not name any [`super::EventPriority`]
    #[error("Unknown event priority \"{0}\"")]
    UnknownPriority(String),

    /// A handler declared an invalid priority tag
    #[error("Event handler {handler}() declares invalid/unknown priority \"{value}\"")]
    InvalidPriority { handler: String, value: String },

    /// A handler asked for cancelled events of a type that cannot be cancelled
    #[error("Event handler {handler}() declares @handleCancelled for non-cancellable {event}")]
    NotCancellable { handler: String, event: String },

    /// A handler declared an unparseable handleCancelled tag
    #[error("Event handler {handler}() declares invalid @handleCancelled value \"{value}\"")]
    InvalidHandleCancelled { handler: String, value: String },

    /// Listeners can only be registered on behalf of enabled plugins
    #[error("Plugin '{plugin}' attempted to register {handler} while not enabled")]
    OwnerNotEnabled { plugin: String, handler: String },

    /// The same registered listener was attached twice
    #[error("Listener {handler}() is already registered for {event}")]
    AlreadyRegistered { handler: String, event: String },

    /// A listener was handed to the handler list of a different event type
    #[error("Listener {handler}() handles {expected}, not {actual}")]
    WrongEventType {
        handler: String,
        expected: String,
        actual: String,
    },

    /// Events published from inside handlers nested too deep
    #[error("Recursive event call detected while calling {event} (max depth {depth})")]
    CallDepthExceeded { event: String, depth: usize },
}
