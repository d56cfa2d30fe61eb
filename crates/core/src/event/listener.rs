//! Registered listeners and declarative handler tables

use super::{short_type_name, Event, EventPriority, EventType};
use crate::plugin::PluginOwner;
use crate::timings::TimingsHandler;
use indexmap::IndexMap;
use std::any::Any;
use std::sync::Arc;

pub(crate) type ErasedHandler = Box<dyn Fn(&mut dyn Any) -> anyhow::Result<()> + Send + Sync>;

type TableHandler<L> = Box<dyn Fn(&L, &mut dyn Any) -> anyhow::Result<()> + Send + Sync>;

/// Tag names understood in a [`HandlerTable`] entry
pub struct ListenerTags;

impl ListenerTags {
    /// Priority the handler runs at, parsed with [`EventPriority::from_str`](std::str::FromStr)
    pub const PRIORITY: &'static str = "priority";
    /// Whether the handler also receives cancelled events (`true`, `false` or empty)
    pub const HANDLE_CANCELLED: &'static str = "handleCancelled";
    /// Marks an entry that must be ignored during registration
    pub const NOT_HANDLER: &'static str = "notHandler";
}

/// Handler bound to one event type, one priority and one owning plugin
pub struct RegisteredListener {
    handler: ErasedHandler,
    handler_name: String,
    event: EventType,
    priority: EventPriority,
    owner: Arc<PluginOwner>,
    handle_cancelled: bool,
    timings: TimingsHandler,
}

impl RegisteredListener {
    pub(crate) fn new(
        handler: ErasedHandler,
        handler_name: String,
        event: EventType,
        priority: EventPriority,
        owner: Arc<PluginOwner>,
        handle_cancelled: bool,
    ) -> Self {
        let timings = TimingsHandler::new(format!(
            "Plugin: {} Event: {}({})",
            owner.full_name(),
            handler_name,
            event.name()
        ));

        Self {
            handler,
            handler_name,
            event,
            priority,
            owner,
            handle_cancelled,
            timings,
        }
    }

    pub fn handler_name(&self) -> &str {
        &self.handler_name
    }

    pub fn event_type(&self) -> EventType {
        self.event
    }

    pub fn priority(&self) -> EventPriority {
        self.priority
    }

    /// Plugin that registered this listener
    pub fn owner(&self) -> &Arc<PluginOwner> {
        &self.owner
    }

    /// Whether this listener still receives events after they were cancelled
    pub fn handles_cancelled(&self) -> bool {
        self.handle_cancelled
    }

    pub fn timings(&self) -> &TimingsHandler {
        &self.timings
    }

    /// Invoke the handler, timing the call
    pub(crate) fn call_event(&self, event: &mut dyn Any) -> anyhow::Result<()> {
        self.timings.time(|| (self.handler)(event))
    }
}

impl std::fmt::Debug for RegisteredListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredListener")
            .field("handler", &self.handler_name)
            .field("event", &self.event.name())
            .field("priority", &self.priority)
            .field("owner", &self.owner.name())
            .field("handle_cancelled", &self.handle_cancelled)
            .finish()
    }
}

/// Object that declares a set of event handlers
///
/// Instead of discovering handler methods at runtime, a listener lists them in
/// a [`HandlerTable`]:
///
/// ```ignore
/// impl Listener for ChatFilter {
///     fn handlers(table: &mut HandlerTable<Self>) {
///         table.handle("on_chat", Self::on_chat).priority("HIGH");
///         table.handle("on_chat_monitor", Self::on_chat_monitor)
///             .priority("MONITOR")
///             .handle_cancelled("true");
///     }
/// }
/// ```
pub trait Listener: Send + Sync + 'static {
    fn handlers(table: &mut HandlerTable<Self>)
    where
        Self: Sized;
}

/// Declarative list of handler methods of a [`Listener`]
pub struct HandlerTable<L> {
    entries: Vec<HandlerEntry<L>>,
}

impl<L: Send + Sync + 'static> HandlerTable<L> {
    pub(crate) fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Declare `handler` as the handler called `name` for events of type `E`
    pub fn handle<E: Event>(
        &mut self,
        name: &'static str,
        handler: fn(&L, &mut E) -> anyhow::Result<()>,
    ) -> &mut HandlerEntry<L> {
        let invoke: TableHandler<L> = Box::new(move |listener: &L, event: &mut dyn Any| {
            match event.downcast_mut::<E>() {
                Some(event) => handler(listener, event),
                None => Ok(()),
            }
        });

        self.entries.push(HandlerEntry {
            name,
            event: EventType::of::<E>(),
            tags: IndexMap::new(),
            invoke,
        });

        let last = self.entries.len() - 1;
        &mut self.entries[last]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<HandlerEntry<L>> {
        self.entries
    }
}

/// Single handler declaration inside a [`HandlerTable`]
pub struct HandlerEntry<L> {
    name: &'static str,
    event: EventType,
    tags: IndexMap<String, String>,
    invoke: TableHandler<L>,
}

impl<L: Send + Sync + 'static> HandlerEntry<L> {
    /// Attach a raw tag; tags are validated when the listener is registered
    pub fn tag(&mut self, key: &str, value: &str) -> &mut Self {
        self.tags.insert(key.to_owned(), value.to_owned());
        self
    }

    pub fn priority(&mut self, priority: &str) -> &mut Self {
        self.tag(ListenerTags::PRIORITY, priority)
    }

    pub fn handle_cancelled(&mut self, value: &str) -> &mut Self {
        self.tag(ListenerTags::HANDLE_CANCELLED, value)
    }

    pub fn not_handler(&mut self) -> &mut Self {
        self.tag(ListenerTags::NOT_HANDLER, "")
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn event_type(&self) -> EventType {
        self.event
    }

    pub(crate) fn get_tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub(crate) fn qualified_name(&self) -> String {
        format!("{}::{}", short_type_name::<L>(), self.name)
    }

    /// Bind this entry to a concrete listener instance
    pub(crate) fn bind(self, listener: Arc<L>) -> ErasedHandler {
        let invoke = self.invoke;
        Box::new(move |event: &mut dyn Any| invoke(&listener, event))
    }
}
