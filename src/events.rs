//! Extension-point / event bus seam.
//!
//! The host platform notifies interested parties when registry entries are
//! created; this framework subscribes handlers against that bus. Handlers
//! run synchronously and best-effort: a handler failure never propagates to
//! the emitter, so the triggering operation is never rolled back by a
//! listener.

use crate::value::Value;
use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

/// Payload delivered to event handlers.
#[derive(Debug, Clone, Default)]
pub struct EventPayload {
    /// Id of the entity the event concerns.
    pub id: i64,
    /// Event-specific fields keyed by the emitter's field names.
    pub fields: BTreeMap<String, Value>,
}

impl EventPayload {
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self {
            id,
            fields: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Read a field as text, empty when absent.
    #[must_use]
    pub fn field_str(&self, key: &str) -> &str {
        self.fields.get(key).and_then(Value::as_str).unwrap_or("")
    }
}

/// A registered event callback.
pub type EventHandler = Arc<dyn Fn(&EventPayload) + Send + Sync>;

/// Named-event subscription bus.
pub trait EventBus: Send + Sync {
    /// Register a callback for a named event.
    fn subscribe(&self, event: &str, handler: EventHandler);

    /// Deliver a payload to every handler registered for the event,
    /// synchronously, swallowing handler failures.
    fn emit(&self, event: &str, payload: &EventPayload);
}

/// In-process synchronous [`EventBus`].
#[derive(Default)]
pub struct SyncEventBus {
    handlers: Mutex<HashMap<String, Vec<EventHandler>>>,
}

impl SyncEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience over [`EventBus::subscribe`] for closures.
    pub fn on(&self, event: &str, handler: impl Fn(&EventPayload) + Send + Sync + 'static) {
        self.subscribe(event, Arc::new(handler));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<EventHandler>>> {
        match self.handlers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl EventBus for SyncEventBus {
    fn subscribe(&self, event: &str, handler: EventHandler) {
        self.lock().entry(event.to_owned()).or_default().push(handler);
    }

    fn emit(&self, event: &str, payload: &EventPayload) {
        // Snapshot the handler list so a handler may subscribe re-entrantly.
        let handlers: Vec<EventHandler> = self
            .lock()
            .get(event)
            .map(|list| list.to_vec())
            .unwrap_or_default();

        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(payload))).is_err() {
                log::warn!("event handler for {event} panicked; continuing");
            }
        }
    }
}
