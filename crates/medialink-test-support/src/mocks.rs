//! Scripted connector standing in for the backend stream.
//!
//! Each `open` consumes the next scripted outcome. When the script is empty the
//! attempt stays pending until an outcome is queued, which keeps the client in
//! `Connecting` for as long as a test needs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use medialink_stream::{Connector, Frame, Transport, TransportError, TransportResult};
use tokio::sync::{Notify, mpsc, watch};
use url::Url;

enum Outcome {
    Refuse(String),
    Accept(mpsc::UnboundedReceiver<ServerEvent>, Arc<AtomicBool>),
}

enum ServerEvent {
    Frame(Frame),
    Fail(String),
    Close,
}

#[derive(Default)]
struct Script {
    outcomes: VecDeque<Outcome>,
    endpoints: Vec<Url>,
    open_now: usize,
    max_open: usize,
    closes: usize,
}

struct Shared {
    script: Mutex<Script>,
    queued: Notify,
    attempts: watch::Sender<usize>,
}

fn lock(shared: &Shared) -> MutexGuard<'_, Script> {
    shared.script.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Connector whose connection attempts follow a script.
#[derive(Clone)]
pub struct ScriptedConnector {
    shared: Arc<Shared>,
}

impl Default for ScriptedConnector {
    fn default() -> Self {
        let (attempts, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                script: Mutex::new(Script::default()),
                queued: Notify::new(),
                attempts,
            }),
        }
    }
}

impl ScriptedConnector {
    /// Empty script; attempts pend until an outcome is queued.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next attempt.
    pub fn refuse_next(&self, reason: impl Into<String>) {
        self.push(Outcome::Refuse(reason.into()));
    }

    /// Accept the next attempt and return the server side of that connection.
    #[must_use]
    pub fn accept_next(&self) -> ServerHandle {
        let (sender, receiver) = mpsc::unbounded_channel();
        let closed_by_client = Arc::new(AtomicBool::new(false));
        self.push(Outcome::Accept(receiver, Arc::clone(&closed_by_client)));
        ServerHandle {
            sender,
            closed_by_client,
        }
    }

    fn push(&self, outcome: Outcome) {
        lock(&self.shared).outcomes.push_back(outcome);
        self.shared.queued.notify_waiters();
    }

    /// Connection attempts started so far.
    #[must_use]
    pub fn attempts(&self) -> usize {
        *self.shared.attempts.borrow()
    }

    /// Wait until at least `count` attempts have started.
    pub async fn wait_for_attempts(&self, count: usize) {
        let mut attempts = self.shared.attempts.subscribe();
        let _ = attempts.wait_for(|seen| *seen >= count).await;
    }

    /// Endpoints dialled, in order.
    #[must_use]
    pub fn endpoints(&self) -> Vec<Url> {
        lock(&self.shared).endpoints.clone()
    }

    /// Transports currently open.
    #[must_use]
    pub fn open_now(&self) -> usize {
        lock(&self.shared).open_now
    }

    /// Highest number of simultaneously open transports observed.
    #[must_use]
    pub fn max_open(&self) -> usize {
        lock(&self.shared).max_open
    }

    /// Transports closed so far (by the client or by being dropped).
    #[must_use]
    pub fn closes(&self) -> usize {
        lock(&self.shared).closes
    }

    async fn next_outcome(&self) -> Outcome {
        loop {
            let queued = self.shared.queued.notified();
            if let Some(outcome) = lock(&self.shared).outcomes.pop_front() {
                return outcome;
            }
            queued.await;
        }
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn open(&self, endpoint: &Url) -> TransportResult<Box<dyn Transport>> {
        lock(&self.shared).endpoints.push(endpoint.clone());
        self.shared.attempts.send_modify(|count| *count += 1);
        match self.next_outcome().await {
            Outcome::Refuse(reason) => Err(TransportError::connect(endpoint, reason)),
            Outcome::Accept(events, closed_by_client) => {
                {
                    let mut script = lock(&self.shared);
                    script.open_now += 1;
                    script.max_open = script.max_open.max(script.open_now);
                }
                Ok(Box::new(ScriptedTransport {
                    shared: Arc::clone(&self.shared),
                    events,
                    closed_by_client,
                    open: true,
                }))
            }
        }
    }
}

struct ScriptedTransport {
    shared: Arc<Shared>,
    events: mpsc::UnboundedReceiver<ServerEvent>,
    closed_by_client: Arc<AtomicBool>,
    open: bool,
}

impl ScriptedTransport {
    fn release(&mut self) {
        if self.open {
            self.open = false;
            let mut script = lock(&self.shared);
            script.open_now -= 1;
            script.closes += 1;
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn next_frame(&mut self) -> Option<TransportResult<Frame>> {
        if !self.open {
            return None;
        }
        match self.events.recv().await? {
            ServerEvent::Frame(frame) => Some(Ok(frame)),
            ServerEvent::Fail(reason) => Some(Err(TransportError::read(reason))),
            ServerEvent::Close => None,
        }
    }

    async fn close(&mut self) {
        self.closed_by_client.store(true, Ordering::SeqCst);
        self.release();
    }
}

impl Drop for ScriptedTransport {
    fn drop(&mut self) {
        self.release();
    }
}

/// Server side of one scripted connection.
///
/// Dropping the handle closes the connection from the server side.
pub struct ServerHandle {
    sender: mpsc::UnboundedSender<ServerEvent>,
    closed_by_client: Arc<AtomicBool>,
}

impl ServerHandle {
    /// Push a text frame.
    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.sender.send(ServerEvent::Frame(Frame::Text(text.into())));
    }

    /// Push a JSON value as a text frame.
    pub fn send_json(&self, value: &serde_json::Value) {
        self.send_text(value.to_string());
    }

    /// Push a binary frame.
    pub fn send_binary(&self, bytes: impl Into<Vec<u8>>) {
        let _ = self
            .sender
            .send(ServerEvent::Frame(Frame::Binary(bytes.into())));
    }

    /// Fail the connection with a read error.
    pub fn fail(&self, reason: impl Into<String>) {
        let _ = self.sender.send(ServerEvent::Fail(reason.into()));
    }

    /// Close the connection cleanly from the server side.
    pub fn close(&self) {
        let _ = self.sender.send(ServerEvent::Close);
    }

    /// `true` once the client called `close` on this connection.
    #[must_use]
    pub fn closed_by_client(&self) -> bool {
        self.closed_by_client.load(Ordering::SeqCst)
    }
}
