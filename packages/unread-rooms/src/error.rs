//! Structured errors for the reference derivation host.
//!
//! The derivation core (producers, reductions, unread toggles) is total and
//! has no error type. Everything here comes from the host around it: the
//! register store and the output collection.
//!
//! # Example
//!
//! ```ignore
//! use unread_rooms::{DerivationError, StoreError};
//!
//! match derivation.publish(event).await {
//!     Ok(outcome) => tracing::debug!(deltas = outcome.deltas.len(), "published"),
//!     Err(DerivationError::ConflictRetriesExhausted { room_id, attempts }) => {
//!         // Another writer kept winning the race for this room.
//!     }
//!     Err(e) => return Err(e.into()),
//! }
//! ```

use thiserror::Error;

use crate::core::RoomId;

/// Errors from register storage.
///
/// The distinction matters:
/// - [`StoreError::Conflict`] means another writer committed first. Reload
///   and recompute.
/// - [`StoreError::Backend`] means storage itself failed. Retrying the same
///   publish will not help.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The stored revision moved since the register was loaded.
    #[error("revision conflict: register was modified concurrently")]
    Conflict,

    /// Storage backend failed (timeout, connection, serialization).
    #[error("storage backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Errors from publishing a source event through a [`crate::Derivation`].
#[derive(Debug, Error)]
pub enum DerivationError {
    /// The register store failed for a reason other than a revision conflict.
    #[error("register store failed for room {room_id}: {source}")]
    Store {
        room_id: RoomId,
        #[source]
        source: StoreError,
    },

    /// Every attempt to commit the reduced register lost a revision race.
    #[error("gave up on room {room_id} after {attempts} conflicting attempts")]
    ConflictRetriesExhausted { room_id: RoomId, attempts: u32 },

    /// The output collection rejected the deltas.
    ///
    /// The register was already committed; the rejected deltas stay in the
    /// sink's outbox.
    #[error("output collection rejected deltas for room {room_id}: {source}")]
    Sink {
        room_id: RoomId,
        #[source]
        source: anyhow::Error,
    },
}

impl DerivationError {
    /// The room whose publish failed.
    pub fn room_id(&self) -> &RoomId {
        match self {
            DerivationError::Store { room_id, .. }
            | DerivationError::ConflictRetriesExhausted { room_id, .. }
            | DerivationError::Sink { room_id, .. } => room_id,
        }
    }
}
