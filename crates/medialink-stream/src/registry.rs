//! Listener registry keyed by message kind.
//!
//! # Design
//! - Handlers have set semantics per kind; identity is the shared allocation.
//! - Delivery snapshots the handler sets so callbacks run without the lock held.
//! - A panicking handler is logged and skipped; the rest still receive the message.

use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use medialink_events::{InboundMessage, WILDCARD};
use serde_json::Value;
use tracing::warn;

type HandlerFn = dyn Fn(&Value) + Send + Sync;

/// Shareable message callback.
///
/// Cloning a `Handler` keeps its identity, so registering clones of the same
/// handler under one kind stores it once.
#[derive(Clone)]
pub struct Handler(Arc<HandlerFn>);

impl Handler {
    /// Wrap a callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        Self(Arc::new(callback))
    }

    /// `true` when both values wrap the same callback allocation.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn call(&self, payload: &Value) {
        (self.0)(payload);
    }
}

impl Debug for Handler {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter
            .debug_tuple("Handler")
            .field(&Arc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
pub(crate) struct ListenerRegistry {
    listeners: HashMap<String, Vec<Handler>>,
}

impl ListenerRegistry {
    /// Returns `false` when the handler was already registered under `kind`.
    pub(crate) fn insert(&mut self, kind: &str, handler: Handler) -> bool {
        let handlers = self.listeners.entry(kind.to_string()).or_default();
        if handlers.iter().any(|existing| existing.same(&handler)) {
            return false;
        }
        handlers.push(handler);
        true
    }

    /// Returns `false` when the handler was not registered under `kind`.
    pub(crate) fn remove(&mut self, kind: &str, handler: &Handler) -> bool {
        let Some(handlers) = self.listeners.get_mut(kind) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|existing| !existing.same(handler));
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            self.listeners.remove(kind);
        }
        removed
    }

    pub(crate) fn count(&self, kind: &str) -> usize {
        self.listeners.get(kind).map_or(0, Vec::len)
    }

    pub(crate) fn delivery_for(&self, kind: &str) -> Delivery {
        let typed = if kind == WILDCARD {
            Vec::new()
        } else {
            self.listeners.get(kind).cloned().unwrap_or_default()
        };
        let wildcard = self.listeners.get(WILDCARD).cloned().unwrap_or_default();
        Delivery { typed, wildcard }
    }
}

/// Handlers captured for one message.
pub(crate) struct Delivery {
    typed: Vec<Handler>,
    wildcard: Vec<Handler>,
}

impl Delivery {
    /// Type-specific handlers get `data`; wildcard handlers get the full envelope.
    pub(crate) fn deliver(&self, message: &InboundMessage) {
        let data = message.data_or_null();
        for handler in &self.typed {
            invoke(handler, &message.kind, data);
        }
        if self.wildcard.is_empty() {
            return;
        }
        let envelope = message.to_envelope_value();
        for handler in &self.wildcard {
            invoke(handler, &message.kind, &envelope);
        }
    }
}

fn invoke(handler: &Handler, kind: &str, payload: &Value) {
    if panic::catch_unwind(AssertUnwindSafe(|| handler.call(payload))).is_err() {
        warn!(kind, "event handler panicked; continuing delivery");
    }
}

/// Registration returned by [`crate::EventStreamClient::subscribe`].
///
/// Dropping it leaves the handler registered; call [`Subscription::unsubscribe`]
/// to remove it.
#[must_use = "the handler stays registered until `unsubscribe` is called"]
pub struct Subscription {
    registry: Weak<Mutex<ListenerRegistry>>,
    kind: String,
    handler: Handler,
    active: AtomicBool,
}

impl Subscription {
    pub(crate) const fn new(
        registry: Weak<Mutex<ListenerRegistry>>,
        kind: String,
        handler: Handler,
    ) -> Self {
        Self {
            registry,
            kind,
            handler,
            active: AtomicBool::new(true),
        }
    }

    /// Kind this subscription was registered under.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Handler this subscription registered.
    #[must_use]
    pub const fn handler(&self) -> &Handler {
        &self.handler
    }

    /// `false` once [`Subscription::unsubscribe`] has run.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Remove exactly this handler from exactly this kind. Later calls are no-ops.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).remove(&self.kind, &self.handler);
        }
    }
}

impl Debug for Subscription {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn counting() -> (Handler, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let handler = Handler::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (handler, hits)
    }

    #[test]
    fn duplicate_registration_is_stored_once() {
        let mut registry = ListenerRegistry::default();
        let (handler, hits) = counting();
        assert!(registry.insert("progress", handler.clone()));
        assert!(!registry.insert("progress", handler));
        assert_eq!(registry.count("progress"), 1);

        registry
            .delivery_for("progress")
            .deliver(&InboundMessage::new("progress", None));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn removal_leaves_siblings_in_place() {
        let mut registry = ListenerRegistry::default();
        let (first, _) = counting();
        let (second, second_hits) = counting();
        registry.insert("progress", first.clone());
        registry.insert("progress", second);

        assert!(registry.remove("progress", &first));
        assert!(!registry.remove("progress", &first));
        assert_eq!(registry.count("progress"), 1);

        registry
            .delivery_for("progress")
            .deliver(&InboundMessage::new("progress", Some(json!(1))));
        assert_eq!(second_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_kinds_are_pruned() {
        let mut registry = ListenerRegistry::default();
        let (handler, _) = counting();
        registry.insert("rss_match", handler.clone());
        registry.remove("rss_match", &handler);
        assert!(registry.listeners.is_empty());
    }

    #[test]
    fn wildcard_receives_envelope_and_typed_receives_data() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let typed_seen = Arc::clone(&seen);
        let wildcard_seen = Arc::clone(&seen);
        let mut registry = ListenerRegistry::default();
        registry.insert(
            "progress",
            Handler::new(move |value| lock(&typed_seen).push(("typed", value.clone()))),
        );
        registry.insert(
            WILDCARD,
            Handler::new(move |value| lock(&wildcard_seen).push(("wildcard", value.clone()))),
        );

        let message = InboundMessage::new("progress", Some(json!({"pct": 50})));
        registry.delivery_for("progress").deliver(&message);

        let seen = lock(&seen);
        assert_eq!(
            *seen,
            vec![
                ("typed", json!({"pct": 50})),
                ("wildcard", json!({"type": "progress", "data": {"pct": 50}})),
            ]
        );
    }

    #[test]
    fn wildcard_kind_messages_are_delivered_once() {
        let mut registry = ListenerRegistry::default();
        let (handler, hits) = counting();
        registry.insert(WILDCARD, handler);
        registry
            .delivery_for(WILDCARD)
            .deliver(&InboundMessage::new(WILDCARD, None));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_handler_does_not_block_others() {
        let mut registry = ListenerRegistry::default();
        registry.insert("progress", Handler::new(|_| panic!("handler failure")));
        let (handler, hits) = counting();
        registry.insert("progress", handler);

        registry
            .delivery_for("progress")
            .deliver(&InboundMessage::new("progress", None));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let registry = Arc::new(Mutex::new(ListenerRegistry::default()));
        let (handler, _) = counting();
        lock(&registry).insert("progress", handler.clone());
        let subscription =
            Subscription::new(Arc::downgrade(&registry), "progress".into(), handler);

        subscription.unsubscribe();
        subscription.unsubscribe();
        assert!(!subscription.is_active());
        assert_eq!(lock(&registry).count("progress"), 0);
    }

    #[test]
    fn unsubscribe_after_registry_drop_is_a_no_op() {
        let registry = Arc::new(Mutex::new(ListenerRegistry::default()));
        let (handler, _) = counting();
        let subscription = Subscription::new(Arc::downgrade(&registry), "x".into(), handler);
        drop(registry);
        subscription.unsubscribe();
        assert!(!subscription.is_active());
    }
}
