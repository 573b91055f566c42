//! Application event plumbing.
//!
//! Lifecycle signaling is explicit rather than emitter-string based: each
//! application exposes typed hooks (`on_mount`, `on_init`, `on_load`) plus a
//! generic string-named subscription channel. The "must be loaded to emit"
//! gate lives in [`crate::Application::emit`]; this module only stores and
//! fires listeners.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Listener for generic, string-named events.
pub type EventListener = Arc<dyn Fn(&Value) + Send + Sync>;

/// Listener for the typed lifecycle hooks. The mount hook receives the
/// parent application; init/load hooks receive the application itself.
pub type HookFn = Arc<dyn Fn(&crate::Application) + Send + Sync>;

/// Handle returned by a subscription, usable to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        ListenerId(raw)
    }
}

#[derive(Default)]
pub(crate) struct Emitter {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<String, Vec<(ListenerId, EventListener)>>>,
    mount_hooks: Mutex<Vec<HookFn>>,
    init_hooks: Mutex<Vec<HookFn>>,
    load_hooks: Mutex<Vec<HookFn>>,
}

impl Emitter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn on(&self, event: &str, listener: EventListener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .entry(event.to_string())
            .or_default()
            .push((id, listener));
        id
    }

    pub(crate) fn off(&self, event: &str, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        match listeners.get_mut(event) {
            Some(entries) => {
                let before = entries.len();
                entries.retain(|(lid, _)| *lid != id);
                before != entries.len()
            }
            None => false,
        }
    }

    /// Fire generic listeners for `event`, in subscription order.
    pub(crate) fn emit_raw(&self, event: &str, payload: &Value) {
        let snapshot: Vec<EventListener> = self
            .listeners
            .lock()
            .get(event)
            .map(|entries| entries.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default();

        for listener in snapshot {
            listener(payload);
        }
    }

    pub(crate) fn on_mount(&self, hook: HookFn) {
        self.mount_hooks.lock().push(hook);
    }

    pub(crate) fn on_init(&self, hook: HookFn) {
        self.init_hooks.lock().push(hook);
    }

    pub(crate) fn on_load(&self, hook: HookFn) {
        self.load_hooks.lock().push(hook);
    }

    pub(crate) fn fire_mount(&self, parent: &crate::Application) {
        for hook in self.mount_hooks.lock().clone() {
            hook(parent);
        }
        self.emit_raw("mount", &Value::String(parent.name().to_string()));
    }

    pub(crate) fn fire_init(&self, app: &crate::Application) {
        for hook in self.init_hooks.lock().clone() {
            hook(app);
        }
        self.emit_raw("init", &Value::Null);
    }

    pub(crate) fn fire_load(&self, app: &crate::Application) {
        for hook in self.load_hooks.lock().clone() {
            hook(app);
        }
        self.emit_raw("load", &Value::Null);
    }
}
