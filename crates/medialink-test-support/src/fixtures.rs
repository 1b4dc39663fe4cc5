//! Payload recorders and scheduling helpers.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;

/// Collects every payload a handler receives.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    seen: Arc<Mutex<Vec<Value>>>,
}

impl Recorder {
    /// Empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Closure that records into this recorder, suitable for `subscribe`.
    #[must_use]
    pub fn handler(&self) -> impl Fn(&Value) + Send + Sync + 'static {
        let seen = Arc::clone(&self.seen);
        move |payload: &Value| {
            seen.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(payload.clone());
        }
    }

    /// Payloads recorded so far, in delivery order.
    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of payloads recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// `true` when nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Let spawned tasks run until they are all idle.
///
/// Under a paused clock this only advances time by one millisecond, so pending
/// reconnect timers do not fire.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
