//! Per-room register and its reduction rules.
//!
//! A [`RoomRegister`] is the derived state kept for each room. Producers emit
//! partial registers (fragments); the host folds each fragment into the
//! room's current register with [`RoomRegister::reduce`].
//!
//! # Reduction Rules
//!
//! | Field         | Rule                                                         |
//! |---------------|--------------------------------------------------------------|
//! | `messages`    | per key, larger raw value wins                               |
//! | `subscribers` | sorted union by user id, fragment wins, `deleted` is dropped |
//!
//! The `messages` rule compares tombstones like any other value, so a
//! tombstone loses to any real timestamp regardless of arrival order.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Message timestamp marking a retracted message.
///
/// The key is kept so that a later retraction of the same message is a no-op.
pub const TOMBSTONE: i64 = -1;

/// Seen timestamp written for a departing subscriber.
///
/// Any reader of a not-yet-reduced fragment treats the user as having seen
/// everything, so leaving a room can never make it unread.
pub const SEEN_EVERYTHING: i64 = i64::MAX;

/// A user's subscription to a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSubscriber {
    pub user_id: String,
    pub seen_timestamp: i64,
    #[serde(rename = "delete", default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
}

impl RoomSubscriber {
    pub fn new(user_id: impl Into<String>, seen_timestamp: i64) -> Self {
        Self {
            user_id: user_id.into(),
            seen_timestamp,
            deleted: false,
        }
    }

    /// Removal marker for `user_id`.
    pub fn removed(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            seen_timestamp: SEEN_EVERYTHING,
            deleted: true,
        }
    }
}

/// Derived state of a single room.
///
/// # Invariants
///
/// - `subscribers` is strictly ascending by `user_id` (no duplicates).
/// - `messages` values are non-negative timestamps or [`TOMBSTONE`].
///
/// Both are upheld by [`RoomRegister::reduce`] as long as its inputs uphold
/// them. Nothing here re-checks them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomRegister {
    pub messages: BTreeMap<String, i64>,
    pub subscribers: Vec<RoomSubscriber>,
}

impl RoomRegister {
    /// An empty register (what a room looks like before any event).
    pub fn new() -> Self {
        Self::default()
    }

    /// Fragment carrying a single message entry.
    pub fn with_message(id: impl Into<String>, timestamp: i64) -> Self {
        Self {
            messages: BTreeMap::from([(id.into(), timestamp)]),
            subscribers: Vec::new(),
        }
    }

    /// Fragment carrying a single subscriber entry.
    pub fn with_subscriber(subscriber: RoomSubscriber) -> Self {
        Self {
            messages: BTreeMap::new(),
            subscribers: vec![subscriber],
        }
    }

    /// Reference time for unread classification.
    ///
    /// The largest value in `messages`, or `0` for a room with no messages.
    /// Tombstones take part in the max, so a room whose only messages were
    /// retracted reports [`TOMBSTONE`] rather than `0`. Both read as "nothing
    /// to be unread" because no subscriber can hold a seen timestamp below
    /// either sentinel.
    pub fn latest_message_time(&self) -> i64 {
        self.messages.values().copied().max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.subscribers.is_empty()
    }

    /// Fold `fragment` into this register, returning the reduced value.
    ///
    /// `self` plays the role of the earlier value; `fragment` is the
    /// later-emitted one and wins subscriber ties.
    pub fn reduce(&self, fragment: &RoomRegister) -> RoomRegister {
        RoomRegister {
            messages: reduce_messages(&self.messages, &fragment.messages),
            subscribers: reduce_subscribers(&self.subscribers, &fragment.subscribers),
        }
    }
}

/// Merge two `messages` maps: per key, the larger raw value wins.
pub fn reduce_messages(
    existing: &BTreeMap<String, i64>,
    fragment: &BTreeMap<String, i64>,
) -> BTreeMap<String, i64> {
    let mut merged = existing.clone();
    for (id, &timestamp) in fragment {
        merged
            .entry(id.clone())
            .and_modify(|current| *current = (*current).max(timestamp))
            .or_insert(timestamp);
    }
    merged
}

/// Merge two sorted subscriber sequences.
///
/// The result is the sorted union keyed by `user_id`. When both sides hold
/// the same user, the `fragment` entry wins. Entries flagged `deleted` are
/// dropped from the result, whichever side they came from.
///
/// Both inputs must be strictly ascending by `user_id`.
pub fn reduce_subscribers(
    existing: &[RoomSubscriber],
    fragment: &[RoomSubscriber],
) -> Vec<RoomSubscriber> {
    let mut merged = Vec::with_capacity(existing.len() + fragment.len());
    let (mut l, mut r) = (0, 0);

    while l < existing.len() || r < fragment.len() {
        let winner = match (existing.get(l), fragment.get(r)) {
            (Some(left), Some(right)) => match left.user_id.cmp(&right.user_id) {
                Ordering::Less => {
                    l += 1;
                    left
                }
                Ordering::Greater => {
                    r += 1;
                    right
                }
                Ordering::Equal => {
                    l += 1;
                    r += 1;
                    right
                }
            },
            (Some(left), None) => {
                l += 1;
                left
            }
            (None, Some(right)) => {
                r += 1;
                right
            }
            (None, None) => break,
        };

        if !winner.deleted {
            merged.push(winner.clone());
        }
    }

    merged
}
