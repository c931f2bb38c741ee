//! Session store — one in-memory dialogue session per identity.
//!
//! Each identity owns a slot guarded by its own async mutex, so events for
//! one user run one at a time while other users proceed in parallel. The
//! slot map itself is only locked long enough to find or create a slot.
//! Sessions never expire; they live until cancelled, confirmed, restarted,
//! or the process exits.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::students::UserId;

use super::state::DialogueState;

type Slot = Arc<Mutex<Option<DialogueState>>>;

/// Exclusive access to one identity's session for the duration of an event.
///
/// Holding a guard and then calling `get`/`set`/`clear` on the store for
/// the same identity deadlocks; use the guard's own accessors instead.
pub struct SessionGuard {
    user_id: UserId,
    session: OwnedMutexGuard<Option<DialogueState>>,
}

impl SessionGuard {
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn get(&self) -> Option<&DialogueState> {
        self.session.as_ref()
    }

    /// Replace the session, or remove it with `None`.
    pub fn replace(&mut self, state: Option<DialogueState>) {
        *self.session = state;
    }

    pub fn set(&mut self, state: DialogueState) {
        self.replace(Some(state));
    }

    pub fn clear(&mut self) {
        self.replace(None);
    }
}

/// In-memory map from identity to dialogue session.
#[derive(Default)]
pub struct SessionStore {
    slots: RwLock<HashMap<UserId, Slot>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find or create the slot for `user_id`.
    async fn slot(&self, user_id: UserId) -> Slot {
        if let Some(slot) = self.slots.read().await.get(&user_id) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write().await;
        Arc::clone(slots.entry(user_id).or_default())
    }

    /// Enter `user_id`'s critical section, waiting for any event already
    /// in progress for the same identity.
    pub async fn lock(&self, user_id: UserId) -> SessionGuard {
        let slot = self.slot(user_id).await;
        SessionGuard {
            user_id,
            session: slot.lock_owned().await,
        }
    }

    /// Leave the critical section and forget the slot if the session ended.
    pub async fn release(&self, guard: SessionGuard) {
        let user_id = guard.user_id;
        drop(guard);
        self.prune(user_id).await;
    }

    /// Current session for `user_id`, if any.
    pub async fn get(&self, user_id: UserId) -> Option<DialogueState> {
        let slot = self.slots.read().await.get(&user_id).cloned()?;
        let session = slot.lock().await;
        session.clone()
    }

    /// Replace any existing session for `user_id`.
    pub async fn set(&self, user_id: UserId, state: DialogueState) {
        let mut guard = self.lock(user_id).await;
        guard.set(state);
    }

    /// Remove the session for `user_id`; no-op if absent.
    pub async fn clear(&self, user_id: UserId) {
        let Some(slot) = self.slots.read().await.get(&user_id).cloned() else {
            return;
        };
        *slot.lock().await = None;
        drop(slot);
        self.prune(user_id).await;
    }

    /// Number of identities currently holding a slot.
    pub async fn tracked(&self) -> usize {
        self.slots.read().await.len()
    }

    /// Drop an empty slot nobody else is holding.
    ///
    /// Anyone who wants a slot must go through the map, so under the write
    /// lock a strong count of one means no task can be waiting on it.
    async fn prune(&self, user_id: UserId) {
        let mut slots = self.slots.write().await;
        let removable = match slots.get(&user_id) {
            Some(slot) => {
                Arc::strong_count(slot) == 1
                    && slot.try_lock().map(|s| s.is_none()).unwrap_or(false)
            }
            None => false,
        };
        if removable {
            slots.remove(&user_id);
        }
    }
}
