//! Event-capturing sink for tests.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::port::event::{Event, EventSink};

/// Records every event it sees.
///
/// Clones share the same buffer, so one handle can be registered on the
/// bus while the test keeps another for assertions.
#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl RecordingSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// True when nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Recorded events matching a predicate.
    #[must_use]
    pub fn matching(&self, predicate: impl Fn(&Event) -> bool) -> Vec<Event> {
        self.events
            .lock()
            .iter()
            .filter(|e| predicate(e))
            .cloned()
            .collect()
    }

    /// Polls until at least one recorded event matches, or the timeout
    /// elapses. Returns whether a match appeared.
    pub async fn wait_for(
        &self,
        predicate: impl Fn(&Event) -> bool,
        timeout: Duration,
    ) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.events.lock().iter().any(&predicate) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

impl EventSink for RecordingSink {
    fn handle(&self, event: Event) {
        self.events.lock().push(event);
    }
}
