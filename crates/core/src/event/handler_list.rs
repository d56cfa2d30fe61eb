//! Per event type listener lists

use super::{EventError, EventPriority, EventType, RegisteredListener};
use crate::plugin::PluginOwner;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Ordered listeners of a single event type
///
/// Listeners are kept in one slot per priority, in registration order. The
/// flattened dispatch order is cached until the next mutation.
pub struct HandlerList {
    event: EventType,
    inner: RwLock<Slots>,
}

#[derive(Default)]
struct Slots {
    by_priority: BTreeMap<EventPriority, Vec<Arc<RegisteredListener>>>,
    baked: Option<Arc<[Arc<RegisteredListener>]>>,
}

impl HandlerList {
    pub(crate) fn new(event: EventType) -> Self {
        Self {
            event,
            inner: RwLock::new(Slots::default()),
        }
    }

    pub fn event_type(&self) -> EventType {
        self.event
    }

    /// Attach a listener to the end of its priority slot
    pub fn register(&self, listener: Arc<RegisteredListener>) -> Result<(), EventError> {
        if listener.event_type() != self.event {
            return Err(EventError::WrongEventType {
                handler: listener.handler_name().to_owned(),
                expected: listener.event_type().name().to_owned(),
                actual: self.event.name().to_owned(),
            });
        }

        let mut slots = self.inner.write();
        let already = slots
            .by_priority
            .values()
            .flatten()
            .any(|existing| Arc::ptr_eq(existing, &listener));

        if already {
            return Err(EventError::AlreadyRegistered {
                handler: listener.handler_name().to_owned(),
                event: self.event.name().to_owned(),
            });
        }

        slots.by_priority.entry(listener.priority()).or_default().push(listener);
        slots.baked = None;
        Ok(())
    }

    /// Detach a single listener, returns whether it was attached
    pub fn unregister(&self, listener: &Arc<RegisteredListener>) -> bool {
        let mut slots = self.inner.write();
        let removed = slots
            .by_priority
            .get_mut(&listener.priority())
            .map(|slot| {
                let before = slot.len();
                slot.retain(|existing| !Arc::ptr_eq(existing, listener));
                before != slot.len()
            })
            .unwrap_or(false);

        if removed {
            slots.baked = None;
        }
        removed
    }

    /// Detach every listener owned by `owner`, returns how many were removed
    pub fn unregister_owner(&self, owner: &Arc<PluginOwner>) -> usize {
        let mut slots = self.inner.write();
        let mut removed = 0;

        for slot in slots.by_priority.values_mut() {
            let before = slot.len();
            slot.retain(|existing| !Arc::ptr_eq(existing.owner(), owner));
            removed += before - slot.len();
        }

        if removed > 0 {
            slots.baked = None;
        }
        removed
    }

    pub fn clear(&self) {
        let mut slots = self.inner.write();
        slots.by_priority.clear();
        slots.baked = None;
    }

    /// Listeners registered at exactly `priority`, in registration order
    pub fn listeners_by_priority(&self, priority: EventPriority) -> Vec<Arc<RegisteredListener>> {
        self.inner
            .read()
            .by_priority
            .get(&priority)
            .cloned()
            .unwrap_or_default()
    }

    /// All listeners in dispatch order
    pub fn listeners(&self) -> Arc<[Arc<RegisteredListener>]> {
        if let Some(baked) = self.inner.read().baked.as_ref() {
            return Arc::clone(baked);
        }

        let mut slots = self.inner.write();
        if let Some(baked) = slots.baked.as_ref() {
            return Arc::clone(baked);
        }

        let baked: Arc<[Arc<RegisteredListener>]> =
            slots.by_priority.values().flatten().cloned().collect();
        slots.baked = Some(Arc::clone(&baked));
        baked
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_priority.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for HandlerList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerList")
            .field("event", &self.event.name())
            .field("listeners", &self.len())
            .finish()
    }
}
