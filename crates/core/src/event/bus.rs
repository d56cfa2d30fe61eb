//! Event bus owning the handler lists of every event type

use super::listener::ErasedHandler;
use super::{
    short_type_name, Event, EventError, EventPriority, EventType, HandlerList, HandlerTable,
    Listener, ListenerTags, RegisteredListener,
};
use crate::plugin::PluginOwner;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::cell::Cell;
use std::collections::HashMap;
use std::sync::Arc;

/// Maximum nesting of events published from inside handlers
pub const MAX_EVENT_CALL_DEPTH: usize = 50;

thread_local! {
    static CALL_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Publish/subscribe hub for plugin events
///
/// Handler lists are created lazily the first time an event type is looked up
/// and live as long as the bus. Dispatch is synchronous: [`EventBus::publish`]
/// returns once every eligible listener has run.
pub struct EventBus {
    lists: RwLock<HashMap<TypeId, Arc<HandlerList>>>,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self {
            lists: RwLock::new(HashMap::new()),
        }
    }

    /// Handler list for the event type `E`, created on first use
    pub fn handler_list<E: Event>(&self) -> Arc<HandlerList> {
        self.list_for(EventType::of::<E>())
    }

    fn list_for(&self, event: EventType) -> Arc<HandlerList> {
        if let Some(list) = self.lists.read().get(&event.id()) {
            return Arc::clone(list);
        }

        let mut lists = self.lists.write();
        Arc::clone(
            lists
                .entry(event.id())
                .or_insert_with(|| Arc::new(HandlerList::new(event))),
        )
    }

    /// Every handler list created so far
    pub fn handler_lists(&self) -> Vec<Arc<HandlerList>> {
        self.lists.read().values().cloned().collect()
    }

    /// Register a single handler for events of type `E`
    pub fn register<E, F>(
        &self,
        handler: F,
        priority: EventPriority,
        owner: &Arc<PluginOwner>,
        handle_cancelled: bool,
    ) -> Result<Arc<RegisteredListener>, EventError>
    where
        E: Event,
        F: Fn(&mut E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let event = EventType::of::<E>();
        let list = self.list_for(event);
        // Closures have no usable type name
        let handler_name = match short_type_name::<F>() {
            name if name.contains("{{closure}}") => {
                format!("{}::{}#{}", owner.name(), event, list.len() + 1)
            }
            name => name.to_owned(),
        };

        if !owner.is_enabled() {
            return Err(EventError::OwnerNotEnabled {
                plugin: owner.full_name(),
                handler: format!("event handler {}() to event {}", handler_name, event),
            });
        }

        if handle_cancelled && !event.is_cancellable() {
            return Err(EventError::NotCancellable {
                handler: handler_name,
                event: event.name().to_owned(),
            });
        }

        let erased: ErasedHandler = Box::new(move |event: &mut dyn Any| {
            match event.downcast_mut::<E>() {
                Some(event) => handler(event),
                None => Ok(()),
            }
        });

        let listener = Arc::new(RegisteredListener::new(
            erased,
            handler_name,
            event,
            priority,
            Arc::clone(owner),
            handle_cancelled,
        ));

        list.register(Arc::clone(&listener))?;
        Ok(listener)
    }

    /// Register every handler declared by `listener`
    ///
    /// All declarations are validated first; if any of them is invalid nothing
    /// is attached.
    pub fn register_listener<L: Listener>(
        &self,
        listener: Arc<L>,
        owner: &Arc<PluginOwner>,
    ) -> Result<Vec<Arc<RegisteredListener>>, EventError> {
        if !owner.is_enabled() {
            return Err(EventError::OwnerNotEnabled {
                plugin: owner.full_name(),
                handler: short_type_name::<L>().to_owned(),
            });
        }

        let mut table = HandlerTable::new();
        L::handlers(&mut table);

        let mut prepared = Vec::with_capacity(table.len());
        for entry in table.into_entries() {
            if entry.get_tag(ListenerTags::NOT_HANDLER).is_some() {
                continue;
            }

            let handler_name = entry.qualified_name();
            let event = entry.event_type();

            let priority = match entry.get_tag(ListenerTags::PRIORITY) {
                Some(value) => value.parse::<EventPriority>().map_err(|_| {
                    EventError::InvalidPriority {
                        handler: handler_name.clone(),
                        value: value.to_owned(),
                    }
                })?,
                None => EventPriority::Normal,
            };

            let handle_cancelled = match entry.get_tag(ListenerTags::HANDLE_CANCELLED) {
                None => false,
                Some(value) => {
                    if !event.is_cancellable() {
                        return Err(EventError::NotCancellable {
                            handler: handler_name,
                            event: event.name().to_owned(),
                        });
                    }

                    match value.trim().to_ascii_lowercase().as_str() {
                        "" | "true" => true,
                        "false" => false,
                        _ => {
                            return Err(EventError::InvalidHandleCancelled {
                                handler: handler_name,
                                value: value.to_owned(),
                            })
                        }
                    }
                }
            };

            let handler = entry.bind(Arc::clone(&listener));
            prepared.push(Arc::new(RegisteredListener::new(
                handler,
                handler_name,
                event,
                priority,
                Arc::clone(owner),
                handle_cancelled,
            )));
        }

        for registered in &prepared {
            self.list_for(registered.event_type())
                .register(Arc::clone(registered))?;
        }

        tracing::debug!(
            "Registered {} handler(s) of {} for plugin {}",
            prepared.len(),
            short_type_name::<L>(),
            owner.name()
        );

        Ok(prepared)
    }

    /// Dispatch `event` to its listeners in priority order
    ///
    /// A listener that does not handle cancelled events is skipped while the
    /// event is cancelled. Handler failures are logged and collected in the
    /// returned report; they never stop the remaining listeners from running.
    pub fn publish<E: Event>(&self, event: &mut E) -> Result<DispatchReport, EventError> {
        let event_type = EventType::of::<E>();
        let _depth = CallDepthGuard::enter(event_type)?;

        let listeners = self.list_for(event_type).listeners();
        let mut report = DispatchReport::default();

        for listener in listeners.iter() {
            if event.is_cancelled() && !listener.handles_cancelled() {
                report.skipped += 1;
                continue;
            }

            report.invoked += 1;
            if let Err(error) = listener.call_event(&mut *event) {
                tracing::error!(
                    "Could not pass event {} to {}: {} threw {:#}",
                    event_type,
                    listener.owner().full_name(),
                    listener.handler_name(),
                    error
                );

                report.failures.push(ListenerFailure {
                    plugin: listener.owner().name().to_owned(),
                    handler: listener.handler_name().to_owned(),
                    error,
                });
            }
        }

        Ok(report)
    }

    /// Detach a single listener from its handler list
    pub fn unregister(&self, listener: &Arc<RegisteredListener>) -> bool {
        self.list_for(listener.event_type()).unregister(listener)
    }

    /// Detach every listener owned by `owner` from every handler list
    pub fn unregister_all(&self, owner: &Arc<PluginOwner>) -> usize {
        let removed = self
            .handler_lists()
            .iter()
            .map(|list| list.unregister_owner(owner))
            .sum();

        if removed > 0 {
            tracing::debug!("Unregistered {} listener(s) of plugin {}", removed, owner.name());
        }
        removed
    }

    /// Whether any listener is attached for `E`
    pub fn has_listeners<E: Event>(&self) -> bool {
        self.lists
            .read()
            .get(&TypeId::of::<E>())
            .map(|list| !list.is_empty())
            .unwrap_or(false)
    }

    /// Forget every handler list
    pub fn clear(&self) {
        let mut lists = self.lists.write();
        for list in lists.values() {
            list.clear();
        }
        lists.clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a single [`EventBus::publish`] call
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Listeners whose handler was called
    pub invoked: usize,
    /// Listeners skipped because the event was cancelled
    pub skipped: usize,
    /// Handlers that returned an error
    pub failures: Vec<ListenerFailure>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A handler error recorded during dispatch
#[derive(Debug)]
pub struct ListenerFailure {
    pub plugin: String,
    pub handler: String,
    pub error: anyhow::Error,
}

struct CallDepthGuard;

impl CallDepthGuard {
    fn enter(event: EventType) -> Result<Self, EventError> {
        CALL_DEPTH.with(|depth| {
            if depth.get() >= MAX_EVENT_CALL_DEPTH {
                return Err(EventError::CallDepthExceeded {
                    event: event.name().to_owned(),
                    depth: MAX_EVENT_CALL_DEPTH,
                });
            }

            depth.set(depth.get() + 1);
            Ok(Self)
        })
    }
}

impl Drop for CallDepthGuard {
    fn drop(&mut self) {
        CALL_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}
