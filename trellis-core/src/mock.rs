//! Recording stand-ins for not-yet-constructed dependencies.
//!
//! During `preInit` an application's declared dependencies resolve to
//! [`MockDependency`] instances rather than real applications, so listeners
//! can be registered before the dependency exists. Once every app has
//! inited, each mock is reconciled exactly once onto the real application,
//! replaying every recording verbatim (duplicates included).

use crate::App;
use crate::events::{EventListener, ListenerId};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

struct Recording {
    id: ListenerId,
    event: String,
    listener: EventListener,
}

pub struct MockDependency {
    name: String,
    next_id: AtomicU64,
    recordings: Mutex<Vec<Recording>>,
}

impl MockDependency {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            next_id: AtomicU64::new(0),
            recordings: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record a subscription to be replayed at reconcile time.
    pub fn on(&self, event: &str, listener: EventListener) -> ListenerId {
        let id = ListenerId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.recordings.lock().push(Recording {
            id,
            event: event.to_string(),
            listener,
        });
        id
    }

    /// Drop a recording made through [`MockDependency::on`].
    pub fn off(&self, id: ListenerId) -> bool {
        let mut recordings = self.recordings.lock();
        let before = recordings.len();
        recordings.retain(|r| r.id != id);
        before != recordings.len()
    }

    pub fn recorded(&self) -> usize {
        self.recordings.lock().len()
    }

    /// Replay every recording onto the real application. Recordings are
    /// drained, so a second call replays nothing.
    pub fn reconcile(&self, app: &App) {
        let recordings = std::mem::take(&mut *self.recordings.lock());
        debug!(
            mock = %self.name,
            app = %app.name(),
            listeners = recordings.len(),
            "Reconciling mock dependency"
        );
        for recording in recordings {
            app.on(&recording.event, recording.listener);
        }
    }
}
