//! Listener registries.
//!
//! Two registries share one implementation: domain events keyed by
//! `(domain, event)`, and client-level notifications keyed by
//! [`NotificationKind`]. Listeners are identified by the `Arc` they were
//! registered with; registering the same `Arc` twice under one key is a
//! no-op. Publishing snapshots the listener list and invokes it with no
//! lock held, so a listener may register or remove listeners.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::ClientError;

/// Handler for a domain event's parameters.
pub type EventListener = Arc<dyn Fn(&Value) + Send + Sync>;

/// Handler for client-level notifications.
pub type NotificationListener = Arc<dyn Fn(&Notification) + Send + Sync>;

/// Wrap a closure as an [`EventListener`].
pub fn event_listener(f: impl Fn(&Value) + Send + Sync + 'static) -> EventListener {
    Arc::new(f)
}

/// Wrap a closure as a [`NotificationListener`].
pub fn notification_listener(
    f: impl Fn(&Notification) + Send + Sync + 'static,
) -> NotificationListener {
    Arc::new(f)
}

/// Client-level notification kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Connect,
    Disconnect,
    Error,
    Message,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Error => "error",
            Self::Message => "message",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A client-level notification.
#[derive(Debug, Clone)]
pub enum Notification {
    /// A channel was established.
    Connect,
    /// The channel closed, locally or remotely.
    Disconnect,
    /// Protocol error, transport failure, undecodable message, or failed connect.
    Error(ClientError),
    /// Every decoded inbound message, before it is routed.
    Message(Value),
}

impl Notification {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::Connect => NotificationKind::Connect,
            Self::Disconnect => NotificationKind::Disconnect,
            Self::Error(_) => NotificationKind::Error,
            Self::Message(_) => NotificationKind::Message,
        }
    }
}

/// Registry key for domain events.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventKey {
    pub domain: String,
    pub event: String,
}

impl EventKey {
    pub fn new(domain: impl Into<String>, event: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            event: event.into(),
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.event)
    }
}

/// Listener lists keyed by `K`.
pub(crate) struct Subscribers<K, L: ?Sized> {
    listeners: Mutex<HashMap<K, Vec<Arc<L>>>>,
}

impl<K, L: ?Sized> Default for Subscribers<K, L> {
    fn default() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
        }
    }
}

// Compare data pointers only; vtable pointers for the same closure may differ
// across codegen units.
fn same_listener<L: ?Sized>(a: &Arc<L>, b: &Arc<L>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl<K: Eq + Hash, L: ?Sized> Subscribers<K, L> {
    /// Returns false if this listener was already registered under `key`.
    pub(crate) fn add(&self, key: K, listener: Arc<L>) -> bool {
        let mut listeners = self.listeners.lock();
        let entry = listeners.entry(key).or_default();
        if entry.iter().any(|existing| same_listener(existing, &listener)) {
            return false;
        }
        entry.push(listener);
        true
    }

    /// Returns false if the listener was not registered under `key`.
    pub(crate) fn remove(&self, key: &K, listener: &Arc<L>) -> bool {
        let mut listeners = self.listeners.lock();
        let Some(entry) = listeners.get_mut(key) else {
            return false;
        };
        let before = entry.len();
        entry.retain(|existing| !same_listener(existing, listener));
        let removed = entry.len() != before;
        if entry.is_empty() {
            listeners.remove(key);
        }
        removed
    }

    pub(crate) fn snapshot(&self, key: &K) -> Vec<Arc<L>> {
        self.listeners
            .lock()
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn count(&self, key: &K) -> usize {
        self.listeners.lock().get(key).map_or(0, Vec::len)
    }
}

impl Subscribers<EventKey, dyn Fn(&Value) + Send + Sync> {
    pub(crate) fn publish(&self, key: &EventKey, params: &Value) -> usize {
        let listeners = self.snapshot(key);
        for listener in &listeners {
            listener(params);
        }
        listeners.len()
    }
}

impl Subscribers<NotificationKind, dyn Fn(&Notification) + Send + Sync> {
    pub(crate) fn publish(&self, notification: &Notification) -> usize {
        let listeners = self.snapshot(&notification.kind());
        for listener in &listeners {
            listener(notification);
        }
        listeners.len()
    }
}

pub(crate) type EventSubscribers = Subscribers<EventKey, dyn Fn(&Value) + Send + Sync>;
pub(crate) type NotificationSubscribers =
    Subscribers<NotificationKind, dyn Fn(&Notification) + Send + Sync>;

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    fn counter() -> (EventListener, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let listener = event_listener(move |_params| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (listener, count)
    }

    #[test]
    fn duplicate_registration_is_ignored() {
        let bus = EventSubscribers::default();
        let key = EventKey::new("Page", "loadEventFired");
        let (listener, count) = counter();

        assert!(bus.add(key.clone(), listener.clone()));
        assert!(!bus.add(key.clone(), listener.clone()));
        assert_eq!(bus.count(&key), 1);

        bus.publish(&key, &json!({}));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn removal_is_by_identity() {
        let bus = EventSubscribers::default();
        let key = EventKey::new("Page", "loadEventFired");
        let (first, first_count) = counter();
        let (second, second_count) = counter();

        bus.add(key.clone(), first.clone());
        bus.add(key.clone(), second.clone());
        assert!(bus.remove(&key, &first));
        assert!(!bus.remove(&key, &first));

        bus.publish(&key, &json!({}));
        assert_eq!(first_count.load(Ordering::SeqCst), 0);
        assert_eq!(second_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn keys_are_independent() {
        let bus = EventSubscribers::default();
        let (listener, count) = counter();
        bus.add(EventKey::new("Page", "loadEventFired"), listener);

        assert_eq!(
            bus.publish(&EventKey::new("Page", "frameNavigated"), &json!({})),
            0
        );
        assert_eq!(
            bus.publish(&EventKey::new("Network", "loadEventFired"), &json!({})),
            0
        );
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn listener_may_reenter_the_registry() {
        let bus = Arc::new(NotificationSubscribers::default());
        let added = Arc::new(AtomicUsize::new(0));

        let registry = bus.clone();
        let tally = added.clone();
        let listener = notification_listener(move |_notification| {
            let extra = notification_listener(|_| {});
            if registry.add(NotificationKind::Connect, extra) {
                tally.fetch_add(1, Ordering::SeqCst);
            }
        });
        bus.add(NotificationKind::Connect, listener);

        assert_eq!(bus.publish(&Notification::Connect), 1);
        assert_eq!(added.load(Ordering::SeqCst), 1);
        assert_eq!(bus.count(&NotificationKind::Connect), 2);
    }

    #[test]
    fn notification_kinds_route_separately() {
        let bus = NotificationSubscribers::default();
        let errors = Arc::new(AtomicUsize::new(0));
        let seen = errors.clone();
        bus.add(
            NotificationKind::Error,
            notification_listener(move |notification| {
                assert!(matches!(notification, Notification::Error(_)));
                seen.fetch_add(1, Ordering::SeqCst);
            }),
        );

        bus.publish(&Notification::Message(json!({"id": 1})));
        bus.publish(&Notification::Error(ClientError::NotConnected));
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert_eq!(NotificationKind::Disconnect.to_string(), "disconnect");
    }
}
