//! Object cache seam and the factory's per-id instance memo.

use crate::entity::Entity;
use std::collections::HashMap;
use std::sync::Mutex;

/// Invalidation contract the data store calls into after every
/// create/update/delete. No read-through behavior is required of the core.
pub trait EntityCache: Send + Sync {
    fn invalidate(&self, id: i64);
}

/// Cache that drops invalidations on the floor.
#[derive(Debug, Default)]
pub struct NoopCache;

impl EntityCache for NoopCache {
    fn invalidate(&self, _id: i64) {}
}

/// Request-scoped memo of hydrated entities, shared between the factory
/// (which reads through it) and the data store (which invalidates it).
#[derive(Debug, Default)]
pub struct InstanceCache {
    entries: Mutex<HashMap<i64, Entity>>,
}

impl InstanceCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, id: i64) -> Option<Entity> {
        self.lock().get(&id).cloned()
    }

    pub fn put(&self, entity: &Entity) {
        if entity.id() > 0 {
            self.lock().insert(entity.id(), entity.clone());
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<i64, Entity>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl EntityCache for InstanceCache {
    fn invalidate(&self, id: i64) {
        self.lock().remove(&id);
    }
}
