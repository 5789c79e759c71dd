//! Event dispatching.
//!
//! A small typed dispatcher: listeners are registered per event type and
//! called synchronously, in registration order. Once an event is cancelled
//! the remaining listeners are skipped.
//!
//! Physics handlers publish the contact events defined here.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
};

use crate::{object::ObjectId, world::InstanceId};

/// Anything that can be dispatched.
pub trait Event: 'static + Send {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// An event listeners may cancel.
pub trait CancellableEvent: Event {
    fn set_cancelled(&mut self, cancel: bool);
}

/// An event about a rigid body owned by a physics handler.
pub trait RigidBodyEvent: Event {
    /// Instance whose physics handler produced the event.
    fn instance(&self) -> InstanceId;

    /// The (first) physics object involved.
    fn physics_object(&self) -> ObjectId;
}

macro_rules! contact_event {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            instance: InstanceId,
            object_a: ObjectId,
            object_b: ObjectId,
            cancelled: bool,
        }

        impl $name {
            pub fn new(instance: InstanceId, object_a: ObjectId, object_b: ObjectId) -> Self {
                Self {
                    instance,
                    object_a,
                    object_b,
                    cancelled: false,
                }
            }

            pub fn second_physics_object(&self) -> ObjectId {
                self.object_b
            }

            /// Whether `object` is either side of the contact.
            pub fn involves(&self, object: ObjectId) -> bool {
                self.object_a == object || self.object_b == object
            }
        }

        impl Event for $name {
            fn is_cancelled(&self) -> bool {
                self.cancelled
            }
        }

        impl CancellableEvent for $name {
            fn set_cancelled(&mut self, cancel: bool) {
                self.cancelled = cancel;
            }
        }

        impl RigidBodyEvent for $name {
            fn instance(&self) -> InstanceId {
                self.instance
            }

            fn physics_object(&self) -> ObjectId {
                self.object_a
            }
        }
    };
}

contact_event! {
    /// Two mapped bodies touched for the first time.
    ContactStartedEvent
}

contact_event! {
    /// Two mapped bodies are still touching; fired every simulation step.
    ContactOngoingEvent
}

contact_event! {
    /// Two mapped bodies stopped touching.
    ContactEndedEvent
}

type Listeners<E> = Vec<Box<dyn FnMut(&mut E) + Send>>;

/// Typed synchronous event dispatcher.
#[derive(Default)]
pub struct EventDispatcher {
    listeners: HashMap<TypeId, Box<dyn Any + Send>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for events of type `E`.
    pub fn add_listener<E, F>(&mut self, listener: F)
    where
        E: Event,
        F: FnMut(&mut E) + Send + 'static,
    {
        let slot = self
            .listeners
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(Listeners::<E>::new()));
        if let Some(list) = slot.downcast_mut::<Listeners<E>>() {
            list.push(Box::new(listener));
        }
    }

    /// Calls every listener of `E` and hands the event back so the caller
    /// can inspect cancellation.
    pub fn call<E: Event>(&mut self, mut event: E) -> E {
        if let Some(list) = self
            .listeners
            .get_mut(&TypeId::of::<E>())
            .and_then(|slot| slot.downcast_mut::<Listeners<E>>())
        {
            for listener in list.iter_mut() {
                if event.is_cancelled() {
                    break;
                }
                listener(&mut event);
            }
        }
        event
    }

    pub fn listener_count<E: Event>(&self) -> usize {
        self.listeners
            .get(&TypeId::of::<E>())
            .and_then(|slot| slot.downcast_ref::<Listeners<E>>())
            .map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn ids() -> (InstanceId, ObjectId, ObjectId) {
        (InstanceId(7), ObjectId(1), ObjectId(2))
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let mut events = EventDispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let log = Arc::clone(&log);
            events.add_listener(move |_: &mut ContactStartedEvent| log.lock().unwrap().push(tag));
        }

        let (instance, a, b) = ids();
        let out = events.call(ContactStartedEvent::new(instance, a, b));
        assert!(!out.is_cancelled());
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(events.listener_count::<ContactStartedEvent>(), 2);
        assert_eq!(events.listener_count::<ContactEndedEvent>(), 0);
    }

    #[test]
    fn cancelling_skips_later_listeners() {
        let mut events = EventDispatcher::new();
        let reached = Arc::new(Mutex::new(false));

        events.add_listener(|e: &mut ContactEndedEvent| e.set_cancelled(true));
        {
            let reached = Arc::clone(&reached);
            events.add_listener(move |_: &mut ContactEndedEvent| *reached.lock().unwrap() = true);
        }

        let (instance, a, b) = ids();
        let out = events.call(ContactEndedEvent::new(instance, a, b));
        assert!(out.is_cancelled());
        assert!(!*reached.lock().unwrap());
    }

    #[test]
    fn event_exposes_both_objects() {
        let (instance, a, b) = ids();
        let e = ContactOngoingEvent::new(instance, a, b);
        assert_eq!(e.instance(), instance);
        assert_eq!(e.physics_object(), a);
        assert_eq!(e.second_physics_object(), b);
        assert!(e.involves(b));
        assert!(!e.involves(ObjectId(3)));
    }

    #[test]
    fn events_without_listeners_pass_through() {
        let mut events = EventDispatcher::new();
        let (instance, a, b) = ids();
        let e = events.call(ContactStartedEvent::new(instance, a, b));
        assert_eq!(e.physics_object(), a);
    }
}
