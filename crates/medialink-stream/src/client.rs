//! Event stream client: connection lifecycle, reconnects, and fan-out.
//!
//! # Design
//! - One session task per connection attempt; it reads frames in order and
//!   finishes delivering a frame before reading the next one.
//! - The lifecycle is an explicit state machine: a published `ConnectionState`,
//!   one optional session slot, and one optional reconnect timer slot.
//! - Every session and timer carries a generation; work from a stale
//!   generation (after `disconnect` or a newer attempt) is discarded.
//! - Background tasks hold weak references, so dropping the last client handle
//!   closes the transport and stops reconnecting.

use std::fmt::{self, Debug, Formatter};
use std::mem;
use std::sync::{Arc, Mutex, Weak};

use medialink_events::InboundMessage;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::config::StreamConfig;
use crate::registry::{Handler, ListenerRegistry, Subscription, lock};
use crate::state::ConnectionState;
use crate::transport::{Connector, Frame, WebSocketConnector};

/// Client for the backend event stream.
///
/// Cloning the client yields another handle to the same connection and
/// listener registry.
#[derive(Clone)]
pub struct EventStreamClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: StreamConfig,
    connector: Arc<dyn Connector>,
    runtime: Handle,
    registry: Arc<Mutex<ListenerRegistry>>,
    lifecycle: Mutex<Lifecycle>,
    state: watch::Sender<ConnectionState>,
    last_message: watch::Sender<Option<InboundMessage>>,
}

#[derive(Default)]
struct Lifecycle {
    generation: u64,
    session: Option<Session>,
    retiring: Vec<JoinHandle<()>>,
    reconnect: Option<ReconnectTimer>,
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        if let Some(timer) = self.reconnect.take() {
            timer.cancel();
        }
    }
}

struct Session {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

struct ReconnectTimer {
    generation: u64,
    task: JoinHandle<()>,
}

impl ReconnectTimer {
    fn cancel(self) {
        self.task.abort();
    }
}

impl EventStreamClient {
    /// Client using the WebSocket transport.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    #[must_use]
    pub fn new(config: StreamConfig) -> Self {
        Self::with_connector(config, WebSocketConnector::default())
    }

    /// Client using a custom connector.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    #[must_use]
    pub fn with_connector<C>(config: StreamConfig, connector: C) -> Self
    where
        C: Connector + 'static,
    {
        Self::with_shared_connector(config, Arc::new(connector))
    }

    /// Client using a shared connector.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    #[must_use]
    pub fn with_shared_connector(config: StreamConfig, connector: Arc<dyn Connector>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (last_message, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                config,
                connector,
                runtime: Handle::current(),
                registry: Arc::new(Mutex::new(ListenerRegistry::default())),
                lifecycle: Mutex::new(Lifecycle::default()),
                state,
                last_message,
            }),
        }
    }

    /// Start connecting. No-op while `Connecting` or `Connected`.
    ///
    /// Returns immediately; progress is observable through
    /// [`EventStreamClient::watch_connection_state`].
    pub fn connect(&self) {
        let mut lifecycle = lock(&self.inner.lifecycle);
        let state = self.connection_state();
        if state.is_active() {
            trace!(%state, "connect ignored; stream already active");
            return;
        }
        self.inner.start_session(&mut lifecycle);
    }

    /// Cancel any pending reconnect, close the transport, and stay
    /// `Disconnected` until [`EventStreamClient::connect`] is called again.
    pub fn disconnect(&self) {
        let mut lifecycle = lock(&self.inner.lifecycle);
        lifecycle.generation = lifecycle.generation.wrapping_add(1);
        if let Some(timer) = lifecycle.reconnect.take() {
            timer.cancel();
        }
        if let Some(session) = lifecycle.session.take() {
            // The session may already have finished; a closed receiver is fine.
            let _ = session.shutdown.send(());
            lifecycle.retiring.retain(|task| !task.is_finished());
            lifecycle.retiring.push(session.task);
        }
        if self.inner.set_state(ConnectionState::Disconnected) {
            debug!("event stream disconnected by caller");
        }
    }

    /// Register `handler` for messages of `kind` ([`medialink_events::WILDCARD`]
    /// for every message).
    ///
    /// Typed handlers receive `data` (`null` when absent); wildcard handlers
    /// receive the full `{"type", "data"}` envelope.
    pub fn subscribe<F>(&self, kind: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.subscribe_handler(kind, Handler::new(handler))
    }

    /// Register an existing handler. Registering the same handler twice under
    /// one kind stores it once.
    pub fn subscribe_handler(&self, kind: impl Into<String>, handler: Handler) -> Subscription {
        let kind = kind.into();
        if !lock(&self.inner.registry).insert(&kind, handler.clone()) {
            trace!(kind = %kind, "handler already registered");
        }
        Subscription::new(Arc::downgrade(&self.inner.registry), kind, handler)
    }

    /// Register a handler that receives `data` decoded as `T`. Payloads that do
    /// not decode are skipped for this handler only.
    pub fn subscribe_typed<T, F>(&self, kind: impl Into<String>, handler: F) -> Subscription
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let kind = kind.into();
        let label = kind.clone();
        self.subscribe(kind, move |payload: &Value| match T::deserialize(payload) {
            Ok(value) => handler(value),
            Err(err) => debug!(kind = %label, error = %err, "payload does not match handler type"),
        })
    }

    /// Number of handlers registered under `kind`.
    #[must_use]
    pub fn listener_count(&self, kind: &str) -> usize {
        lock(&self.inner.registry).count(kind)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Receiver notified on every lifecycle transition.
    #[must_use]
    pub fn watch_connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Most recently decoded message.
    #[must_use]
    pub fn last_message(&self) -> Option<InboundMessage> {
        self.inner.last_message.borrow().clone()
    }

    /// Receiver holding the latest decoded message (last write wins).
    #[must_use]
    pub fn watch_last_message(&self) -> watch::Receiver<Option<InboundMessage>> {
        self.inner.last_message.subscribe()
    }

    /// Stream endpoint this client dials.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        self.inner.config.endpoint()
    }

    /// Configuration the client was built with.
    #[must_use]
    pub fn config(&self) -> &StreamConfig {
        &self.inner.config
    }
}

impl Debug for EventStreamClient {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("EventStreamClient")
            .field("endpoint", &self.endpoint().as_str())
            .field("state", &self.connection_state())
            .finish_non_exhaustive()
    }
}

impl Inner {
    /// Returns `true` when the published state changed.
    fn set_state(&self, next: ConnectionState) -> bool {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            debug!(from = %current, to = %next, "event stream state changed");
            *current = next;
            true
        })
    }

    fn start_session(self: &Arc<Self>, lifecycle: &mut Lifecycle) {
        if let Some(timer) = lifecycle.reconnect.take() {
            timer.cancel();
        }
        lifecycle.generation = lifecycle.generation.wrapping_add(1);
        let generation = lifecycle.generation;

        let mut previous = mem::take(&mut lifecycle.retiring);
        if let Some(session) = lifecycle.session.take() {
            previous.push(session.task);
        }

        self.set_state(ConnectionState::Connecting);
        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = self.runtime.spawn(run_session(
            Arc::downgrade(self),
            Arc::clone(&self.connector),
            self.config.endpoint().clone(),
            generation,
            previous,
            shutdown_rx,
        ));
        lifecycle.session = Some(Session { shutdown, task });
    }

    fn handle_opened(&self, generation: u64) -> bool {
        let mut lifecycle = lock(&self.lifecycle);
        if lifecycle.generation != generation {
            return false;
        }
        if let Some(timer) = lifecycle.reconnect.take() {
            timer.cancel();
        }
        self.set_state(ConnectionState::Connected);
        info!(endpoint = %self.config.endpoint(), "event stream connected");
        true
    }

    fn handle_closed(self: &Arc<Self>, generation: u64) {
        let mut lifecycle = lock(&self.lifecycle);
        if lifecycle.generation != generation {
            return;
        }
        self.set_state(ConnectionState::Disconnected);
        self.schedule_reconnect(&mut lifecycle);
    }

    fn schedule_reconnect(self: &Arc<Self>, lifecycle: &mut Lifecycle) {
        if let Some(stale) = lifecycle.reconnect.take() {
            stale.cancel();
        }
        let generation = lifecycle.generation;
        let delay = self.config.reconnect_delay();
        let client = Arc::downgrade(self);
        debug!(delay_ms = delay.as_millis(), "event stream reconnect scheduled");
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = client.upgrade() {
                inner.fire_reconnect(generation);
            }
        });
        lifecycle.reconnect = Some(ReconnectTimer { generation, task });
    }

    fn fire_reconnect(self: &Arc<Self>, generation: u64) {
        let mut lifecycle = lock(&self.lifecycle);
        let armed = lifecycle
            .reconnect
            .as_ref()
            .is_some_and(|timer| timer.generation == generation);
        if !armed {
            return;
        }
        // Consumed: this task is the timer, so it must not abort itself.
        lifecycle.reconnect = None;
        if self.state.borrow().is_active() {
            return;
        }
        debug!("event stream reconnecting");
        self.start_session(&mut lifecycle);
    }

    fn dispatch(&self, generation: u64, frame: &str) {
        if lock(&self.lifecycle).generation != generation {
            return;
        }
        let message = match InboundMessage::decode(frame) {
            Ok(message) => message,
            Err(err) => {
                debug!(error = %err, "discarding undecodable frame");
                return;
            }
        };
        self.last_message.send_replace(Some(message.clone()));
        let delivery = lock(&self.registry).delivery_for(&message.kind);
        delivery.deliver(&message);
    }
}

async fn run_session(
    client: Weak<Inner>,
    connector: Arc<dyn Connector>,
    endpoint: Url,
    generation: u64,
    previous: Vec<JoinHandle<()>>,
    mut shutdown: oneshot::Receiver<()>,
) {
    // A replaced session finishes closing its transport before this one dials.
    for task in previous {
        let _ = task.await;
    }

    let opened = tokio::select! {
        biased;
        _ = &mut shutdown => return,
        opened = connector.open(&endpoint) => opened,
    };
    let mut transport = match opened {
        Ok(transport) => transport,
        Err(err) => {
            warn!(endpoint = %endpoint, error = %err, "event stream connection failed");
            if let Some(inner) = client.upgrade() {
                inner.handle_closed(generation);
            }
            return;
        }
    };

    let current = client
        .upgrade()
        .is_some_and(|inner| inner.handle_opened(generation));
    if !current {
        transport.close().await;
        return;
    }

    loop {
        let frame = tokio::select! {
            biased;
            _ = &mut shutdown => {
                transport.close().await;
                return;
            }
            frame = transport.next_frame() => frame,
        };
        match frame {
            Some(Ok(Frame::Text(text))) => {
                let Some(inner) = client.upgrade() else {
                    transport.close().await;
                    return;
                };
                inner.dispatch(generation, &text);
            }
            Some(Ok(Frame::Binary(bytes))) => {
                trace!(len = bytes.len(), "ignoring binary frame");
            }
            Some(Err(err)) => {
                warn!(endpoint = %endpoint, error = %err, "event stream transport failed");
                transport.close().await;
                break;
            }
            None => {
                debug!(endpoint = %endpoint, "event stream closed by server");
                transport.close().await;
                break;
            }
        }
    }

    if let Some(inner) = client.upgrade() {
        inner.handle_closed(generation);
    }
}
