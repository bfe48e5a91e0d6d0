//! Register storage.
//!
//! # Overview
//!
//! The derivation keeps one [`RoomRegister`] per room. How that register is
//! persisted belongs to the host, behind the [`RegisterStore`] trait.
//!
//! # The Contract
//!
//! 1. **Load before reduce.** Every publish loads the room's current register
//!    and revision. A room never written reads as `None` (an empty register).
//!
//! 2. **Save with the loaded revision.** The reduced register is saved with
//!    the revision it was loaded at. A stale revision fails with
//!    [`StoreError::Conflict`].
//!
//! 3. **Compute after save.** Unread deltas are computed from the
//!    `(previous, next)` pair only once `next` is committed, so each
//!    committed register is the `previous` of the following publish.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::core::RoomId;
use crate::error::StoreError;
use crate::register::RoomRegister;

// =============================================================================
// Revision
// =============================================================================

/// Revision for optimistic concurrency control.
///
/// - [`Revision::NONE`] means the room has never been saved.
/// - Each successful save advances the revision by one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Revision(pub u64);

impl Revision {
    /// Sentinel for a room whose register has never been saved.
    pub const NONE: Revision = Revision(0);

    pub fn new(value: u64) -> Self {
        Revision(value)
    }

    /// The revision a successful save will produce.
    pub fn next(self) -> Self {
        Revision(self.0.saturating_add(1))
    }

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_none() {
            write!(f, "NONE")
        } else {
            write!(f, "r{}", self.0)
        }
    }
}

// =============================================================================
// Register Store
// =============================================================================

/// Persists room registers.
///
/// Implementations must provide atomic load/save with revision checking.
/// If two writers save the same room from the same revision, one succeeds
/// and the other gets [`StoreError::Conflict`].
#[async_trait]
pub trait RegisterStore: Send + Sync + 'static {
    /// Load the register of `room_id`.
    ///
    /// Returns `None` for a room that has never been saved.
    async fn load(&self, room_id: &RoomId) -> Result<Option<(RoomRegister, Revision)>, StoreError>;

    /// Save `register` if the stored revision still equals `expected`.
    ///
    /// Returns the new revision on success. For a new room, pass
    /// [`Revision::NONE`].
    async fn save(
        &self,
        room_id: &RoomId,
        register: &RoomRegister,
        expected: Revision,
    ) -> Result<Revision, StoreError>;
}

// =============================================================================
// In-Memory Store
// =============================================================================

/// Register store backed by a `HashMap`.
///
/// Used by the replay binary and by tests.
#[derive(Default)]
pub struct InMemoryStore {
    data: Mutex<HashMap<RoomId, (RoomRegister, Revision)>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rooms with a saved register.
    ///
    /// Still counts after a writer panicked; `load`/`save` report that case.
    pub fn len(&self) -> usize {
        self.data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RegisterStore for InMemoryStore {
    async fn load(&self, room_id: &RoomId) -> Result<Option<(RoomRegister, Revision)>, StoreError> {
        let data = self
            .data
            .lock()
            .map_err(|e| StoreError::Backend(anyhow::anyhow!("mutex poisoned: {}", e)))?;
        Ok(data.get(room_id).cloned())
    }

    async fn save(
        &self,
        room_id: &RoomId,
        register: &RoomRegister,
        expected: Revision,
    ) -> Result<Revision, StoreError> {
        let mut data = self
            .data
            .lock()
            .map_err(|e| StoreError::Backend(anyhow::anyhow!("mutex poisoned: {}", e)))?;

        let current = data.get(room_id).map(|(_, r)| *r).unwrap_or(Revision::NONE);
        if current != expected {
            return Err(StoreError::Conflict);
        }

        let revision = expected.next();
        data.insert(room_id.clone(), (register.clone(), revision));
        Ok(revision)
    }
}
