//! Event system for plugin communication
//!
//! Events are plain Rust types implementing [`Event`]. Plugins subscribe to them
//! through the [`EventBus`], either one handler at a time or by handing over a
//! [`Listener`] that declares its handlers in a [`HandlerTable`].

pub mod bus;
pub mod error;
pub mod handler_list;
pub mod listener;
pub mod priority;

pub use bus::{DispatchReport, EventBus, ListenerFailure, MAX_EVENT_CALL_DEPTH};
pub use error::EventError;
pub use handler_list::HandlerList;
pub use listener::{HandlerEntry, HandlerTable, Listener, ListenerTags, RegisteredListener};
pub use priority::EventPriority;

use std::any::{Any, TypeId};

/// Trait implemented by every type that can be published on the [`EventBus`]
pub trait Event: Any + Send + Sync {
    /// Whether events of this type can be cancelled
    fn is_cancellable() -> bool
    where
        Self: Sized,
    {
        false
    }

    /// Whether this event has been cancelled by a previous handler
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Events that a handler can cancel
pub trait Cancellable: Event {
    /// Set the cancelled state of this event
    fn set_cancelled(&mut self, cancelled: bool);

    /// Cancel this event
    fn cancel(&mut self) {
        self.set_cancelled(true);
    }

    /// Undo an earlier cancellation
    fn uncancel(&mut self) {
        self.set_cancelled(false);
    }
}

/// Runtime description of an event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventType {
    id: TypeId,
    name: &'static str,
    cancellable: bool,
}

impl EventType {
    /// Describe the event type `E`
    pub fn of<E: Event>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: short_type_name::<E>(),
            cancellable: E::is_cancellable(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_cancellable(&self) -> bool {
        self.cancellable
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// Last path segment of a type name, `mirai_core::plugin::PluginEnableEvent` -> `PluginEnableEvent`
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Implement [`Event`] for a type, optionally backed by a cancellation flag field
///
/// ```ignore
/// struct PlayerChatEvent { message: String, cancelled: bool }
/// mirai_core::impl_event!(PlayerChatEvent, cancellable(cancelled));
/// ```
#[macro_export]
macro_rules! impl_event {
    ($ty:ty) => {
        impl $crate::event::Event for $ty {}
    };
    ($ty:ty, cancellable($field:ident)) => {
        impl $crate::event::Event for $ty {
            fn is_cancellable() -> bool {
                true
            }

            fn is_cancelled(&self) -> bool {
                self.$field
            }
        }

        impl $crate::event::Cancellable for $ty {
            fn set_cancelled(&mut self, cancelled: bool) {
                self.$field = cancelled;
            }
        }
    };
}
