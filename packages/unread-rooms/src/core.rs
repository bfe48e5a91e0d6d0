//! Core wire types for the unread-rooms derivation.
//!
//! # Overview
//!
//! Two source collections feed the derivation:
//! - [`MessageEvent`] = a message posted to (or retracted from) a room
//! - [`RoomSubscriptionEvent`] = a user joining, reading, or leaving a room
//!
//! Both are partitioned by [`RoomId`]. The derivation emits [`UnreadDelta`]
//! records, which the output collection sums per user.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a room, and the partition key of both source collections.
///
/// # Example
///
/// ```ignore
/// use unread_rooms::RoomId;
///
/// let room = RoomId::from("general");
/// assert_eq!(room.as_str(), "general");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Create a room id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Unwrap into the raw id.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RoomId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message posted or retracted in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    pub id: String,
    pub room_id: RoomId,
    pub timestamp: i64,
    /// Retraction of a previously posted message.
    #[serde(default)]
    pub delete: bool,
}

impl MessageEvent {
    /// A newly posted message.
    pub fn posted(room_id: impl Into<RoomId>, id: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id: id.into(),
            room_id: room_id.into(),
            timestamp,
            delete: false,
        }
    }

    /// A retraction of message `id`.
    pub fn retracted(room_id: impl Into<RoomId>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            room_id: room_id.into(),
            timestamp: 0,
            delete: true,
        }
    }
}

/// A user subscribing to a room, updating their last-seen time, or leaving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSubscriptionEvent {
    pub user_id: String,
    pub room_id: RoomId,
    /// Timestamp of the newest message this user has seen in the room.
    #[serde(default)]
    pub seen_timestamp: i64,
    /// The user left the room.
    #[serde(default)]
    pub delete: bool,
}

impl RoomSubscriptionEvent {
    /// A subscription (or last-seen update) for `user_id`.
    pub fn seen(room_id: impl Into<RoomId>, user_id: impl Into<String>, seen_timestamp: i64) -> Self {
        Self {
            user_id: user_id.into(),
            room_id: room_id.into(),
            seen_timestamp,
            delete: false,
        }
    }

    /// `user_id` leaving the room.
    pub fn unsubscribed(room_id: impl Into<RoomId>, user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            room_id: room_id.into(),
            seen_timestamp: 0,
            delete: true,
        }
    }
}

/// One document from either source collection.
///
/// On the wire this is tagged by the collection it was read from:
///
/// ```text
/// {"collection":"messages","id":"m1","roomId":"r1","timestamp":100}
/// {"collection":"roomUsers","userId":"u1","roomId":"r1","seenTimestamp":50}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "collection", rename_all = "camelCase")]
pub enum SourceEvent {
    Messages(MessageEvent),
    RoomUsers(RoomSubscriptionEvent),
}

impl SourceEvent {
    /// The partition key: which room register this event updates.
    pub fn room_id(&self) -> &RoomId {
        match self {
            SourceEvent::Messages(event) => &event.room_id,
            SourceEvent::RoomUsers(event) => &event.room_id,
        }
    }

    /// Name of the source collection, for logging.
    pub fn collection(&self) -> &'static str {
        match self {
            SourceEvent::Messages(_) => "messages",
            SourceEvent::RoomUsers(_) => "roomUsers",
        }
    }
}

impl From<MessageEvent> for SourceEvent {
    fn from(event: MessageEvent) -> Self {
        SourceEvent::Messages(event)
    }
}

impl From<RoomSubscriptionEvent> for SourceEvent {
    fn from(event: RoomSubscriptionEvent) -> Self {
        SourceEvent::RoomUsers(event)
    }
}

/// Signed change to one user's unread-room count.
///
/// `num_unread_rooms_delta` is always `-1`, `0`, or `+1`. A zero delta still
/// carries meaning: it makes the output collection materialize a row for a
/// user seen for the first time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadDelta {
    pub user_id: String,
    pub num_unread_rooms_delta: i64,
}

impl UnreadDelta {
    pub fn new(user_id: impl Into<String>, num_unread_rooms_delta: i64) -> Self {
        Self {
            user_id: user_id.into(),
            num_unread_rooms_delta,
        }
    }

    /// The room became unread for this user.
    pub fn became_unread(user_id: impl Into<String>) -> Self {
        Self::new(user_id, 1)
    }

    /// The room became read for this user.
    pub fn became_read(user_id: impl Into<String>) -> Self {
        Self::new(user_id, -1)
    }

    /// First sighting of this user, no change in unread status.
    pub fn unchanged(user_id: impl Into<String>) -> Self {
        Self::new(user_id, 0)
    }
}
