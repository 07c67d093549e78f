use std::collections::BTreeMap;

use crate::events::{ListenerId, PropertyEvent, PropertyListener, StateEvent, StateListener};

/// Per-entity listener registries
///
/// Property listeners are keyed optionally by property name: global
/// listeners fire for every property, named listeners only for theirs.
/// Within a registry, invocation order is registration order (FIFO); global
/// property listeners fire before named ones.
///
/// Listener panics propagate. The mutation has already been applied by the
/// time listeners fire, so ordering is guaranteed but atomicity across a
/// failing listener is not.
#[derive(Default)]
pub struct NotificationBus {
    global: Vec<(ListenerId, PropertyListener)>,
    named: BTreeMap<String, Vec<(ListenerId, PropertyListener)>>,
    state: Vec<(ListenerId, StateListener)>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self {
            global: Vec::new(),
            named: BTreeMap::new(),
            state: Vec::new(),
        }
    }

    /// Register a listener fired for every property mutation
    pub fn add_property_listener(&mut self, listener: PropertyListener) -> ListenerId {
        let id = ListenerId::next();
        self.global.push((id, listener));
        id
    }

    /// Register a listener fired only for the named property
    pub fn add_named_property_listener(
        &mut self,
        property: impl Into<String>,
        listener: PropertyListener,
    ) -> ListenerId {
        let id = ListenerId::next();
        self.named
            .entry(property.into())
            .or_default()
            .push((id, listener));
        id
    }

    /// Register a listener fired once per mutation call that left the
    /// entity modified
    pub fn add_state_listener(&mut self, listener: StateListener) -> ListenerId {
        let id = ListenerId::next();
        self.state.push((id, listener));
        id
    }

    /// Remove a property listener (global or named) by its handle
    pub fn remove_property_listener(&mut self, id: ListenerId) -> bool {
        let before = self.global.len();
        self.global.retain(|(lid, _)| *lid != id);
        if self.global.len() != before {
            return true;
        }
        for listeners in self.named.values_mut() {
            let before = listeners.len();
            listeners.retain(|(lid, _)| *lid != id);
            if listeners.len() != before {
                return true;
            }
        }
        false
    }

    /// Remove a state listener by its handle
    pub fn remove_state_listener(&mut self, id: ListenerId) -> bool {
        let before = self.state.len();
        self.state.retain(|(lid, _)| *lid != id);
        self.state.len() != before
    }

    pub fn property_listener_count(&self) -> usize {
        self.global.len() + self.named.values().map(Vec::len).sum::<usize>()
    }

    pub fn state_listener_count(&self) -> usize {
        self.state.len()
    }

    /// Fire property listeners for the event's property: globals first,
    /// then listeners named for it, each in registration order
    pub fn fire_property(&mut self, event: &PropertyEvent) {
        for (_, listener) in &mut self.global {
            listener(event);
        }
        if let Some(listeners) = self.named.get_mut(&event.property) {
            for (_, listener) in listeners {
                listener(event);
            }
        }
    }

    /// Fire all state listeners in registration order
    pub fn fire_state(&mut self, event: &StateEvent) {
        for (_, listener) in &mut self.state {
            listener(event);
        }
    }
}

impl std::fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationBus")
            .field("global", &self.global.len())
            .field("named", &self.named.keys().collect::<Vec<_>>())
            .field("state", &self.state.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_global_and_named_dispatch() {
        let mut bus = NotificationBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let global_seen = seen.clone();
        bus.add_property_listener(Box::new(move |e| {
            global_seen.borrow_mut().push(format!("global:{}", e.property));
        }));

        let named_seen = seen.clone();
        bus.add_named_property_listener(
            "name",
            Box::new(move |e| {
                named_seen.borrow_mut().push(format!("named:{}", e.property));
            }),
        );

        bus.fire_property(&PropertyEvent::new("name", Value::Null, Value::from("A")));
        bus.fire_property(&PropertyEvent::new("code", Value::Null, Value::from("B")));

        assert_eq!(
            *seen.borrow(),
            vec!["global:name", "named:name", "global:code"]
        );
    }

    #[test]
    fn test_registration_order_is_fifo() {
        let mut bus = NotificationBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let seen = seen.clone();
            bus.add_property_listener(Box::new(move |_| {
                seen.borrow_mut().push(tag);
            }));
        }

        bus.fire_property(&PropertyEvent::new("p", Value::Null, Value::Null));
        assert_eq!(*seen.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_removal_by_id() {
        let mut bus = NotificationBus::new();
        let count = Rc::new(RefCell::new(0));

        let c = count.clone();
        let id = bus.add_property_listener(Box::new(move |_| {
            *c.borrow_mut() += 1;
        }));

        bus.fire_property(&PropertyEvent::new("p", Value::Null, Value::Null));
        assert!(bus.remove_property_listener(id));
        assert!(!bus.remove_property_listener(id));
        bus.fire_property(&PropertyEvent::new("p", Value::Null, Value::Null));

        assert_eq!(*count.borrow(), 1);
        assert_eq!(bus.property_listener_count(), 0);
    }

    #[test]
    fn test_state_listener_removal() {
        let mut bus = NotificationBus::new();
        let count = Rc::new(RefCell::new(0));

        let c = count.clone();
        let id = bus.add_state_listener(Box::new(move |_| {
            *c.borrow_mut() += 1;
        }));

        bus.fire_state(&StateEvent { modified_count: 1 });
        assert!(bus.remove_state_listener(id));
        bus.fire_state(&StateEvent { modified_count: 1 });
        assert_eq!(*count.borrow(), 1);
    }
}
