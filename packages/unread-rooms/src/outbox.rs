//! Undelivered deltas, held per sink until the sink accepts them.
//!
//! A register is committed before its deltas reach the sinks. Once committed,
//! a replay of the same event reduces to an unchanged register and computes
//! nothing, so deltas a sink rejected would be lost for good. Instead they
//! are written here and delivered ahead of the room's next batch:
//!
//! 1. Claim the room's undelivered deltas
//! 2. Append the newly computed deltas and publish the batch to the sink
//! 3. On rejection, restore the whole batch; on success, it is gone
//!
//! Each sink has its own outbox, so a batch rejected by one sink is not
//! delivered twice to the sinks that accepted it.
//!
//! # Guarantees
//!
//! - **At-least-once per sink**: a batch stays claimed until its sink accepts it
//! - **Per-room order**: undelivered deltas always precede newer ones
//!
//! Callers serialize claim/restore for a room (the engine holds the room lock).

use dashmap::DashMap;

use crate::core::{RoomId, UnreadDelta};

/// Deltas a single sink has not yet accepted, keyed by room.
#[derive(Debug, Default)]
pub struct Outbox {
    pending: DashMap<RoomId, Vec<UnreadDelta>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every undelivered delta for `room_id`, oldest first.
    pub fn claim(&self, room_id: &RoomId) -> Vec<UnreadDelta> {
        self.pending
            .remove(room_id)
            .map(|(_, deltas)| deltas)
            .unwrap_or_default()
    }

    /// Put a rejected batch back, ahead of anything written since it was claimed.
    pub fn restore(&self, room_id: &RoomId, mut batch: Vec<UnreadDelta>) {
        if batch.is_empty() {
            return;
        }
        let mut entry = self.pending.entry(room_id.clone()).or_default();
        batch.append(entry.value_mut());
        *entry.value_mut() = batch;
    }

    /// Number of undelivered deltas for `room_id`.
    pub fn pending(&self, room_id: &RoomId) -> usize {
        self.pending.get(room_id).map_or(0, |entry| entry.len())
    }

    /// Rooms with at least one undelivered delta.
    pub fn rooms(&self) -> Vec<RoomId> {
        self.pending.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
