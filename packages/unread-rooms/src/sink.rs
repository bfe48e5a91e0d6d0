//! Output collection for unread deltas.
//!
//! Every committed register update produces zero or more [`UnreadDelta`]s.
//! Sinks receive them in publish order for each room.
//!
//! # Execution Order
//!
//! ```text
//! SourceEvent
//!  → producer (fragment)
//!  → store (reduce + save)
//!  → unread toggles (previous, next)
//!  → Sinks   ← here (observe committed deltas)
//! ```
//!
//! [`UnreadCounts`] is the canonical sink: it sums deltas per user, so its
//! value for a user is the number of rooms that user has unread.

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;

use crate::core::{RoomId, UnreadDelta};

/// Receives the deltas of each committed register update.
///
/// # Example
///
/// ```ignore
/// use unread_rooms::{DeltaSink, RoomId, UnreadDelta};
///
/// pub struct NatsPublishSink {
///     client: async_nats::Client,
/// }
///
/// #[async_trait]
/// impl DeltaSink for NatsPublishSink {
///     async fn publish(&self, room_id: &RoomId, deltas: &[UnreadDelta]) -> Result<()> {
///         let payload = serde_json::to_vec(deltas)?;
///         self.client.publish(format!("unread.{room_id}"), payload.into()).await?;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait DeltaSink: Send + Sync + 'static {
    /// Called with each non-empty batch for a room, in commit order.
    ///
    /// A batch that returns `Err` is offered again, ahead of newer deltas,
    /// so a sink sees every delta at least once.
    async fn publish(&self, room_id: &RoomId, deltas: &[UnreadDelta]) -> Result<()>;
}

/// Sum-reduction of deltas keyed by user id.
///
/// A user appears here as soon as any delta names them, including a zero
/// delta, so a subscriber with nothing unread still reads as `Some(0)`.
#[derive(Debug, Default)]
pub struct UnreadCounts {
    counts: DashMap<String, i64>,
}

impl UnreadCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one delta into the running count.
    pub fn apply(&self, delta: &UnreadDelta) {
        *self.counts.entry(delta.user_id.clone()).or_insert(0) += delta.num_unread_rooms_delta;
    }

    /// Number of unread rooms for `user_id`, or `None` if never materialized.
    pub fn count(&self, user_id: &str) -> Option<i64> {
        self.counts.get(user_id).map(|entry| *entry.value())
    }

    /// All materialized counts, ordered by user id.
    pub fn snapshot(&self) -> BTreeMap<String, i64> {
        self.counts
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

#[async_trait]
impl DeltaSink for UnreadCounts {
    async fn publish(&self, _room_id: &RoomId, deltas: &[UnreadDelta]) -> Result<()> {
        for delta in deltas {
            self.apply(delta);
        }
        Ok(())
    }
}

#[async_trait]
impl<S: DeltaSink + ?Sized> DeltaSink for std::sync::Arc<S> {
    async fn publish(&self, room_id: &RoomId, deltas: &[UnreadDelta]) -> Result<()> {
        (**self).publish(room_id, deltas).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counts_sum_per_user() {
        let counts = UnreadCounts::new();
        let room = RoomId::from("r1");

        counts
            .publish(
                &room,
                &[UnreadDelta::became_unread("a"), UnreadDelta::became_unread("b")],
            )
            .await
            .unwrap();
        counts
            .publish(&room, &[UnreadDelta::became_unread("a")])
            .await
            .unwrap();
        counts
            .publish(&room, &[UnreadDelta::became_read("b")])
            .await
            .unwrap();

        assert_eq!(counts.count("a"), Some(2));
        assert_eq!(counts.count("b"), Some(0));
        assert_eq!(counts.count("c"), None);
    }

    #[tokio::test]
    async fn test_zero_delta_materializes_user() {
        let counts = UnreadCounts::new();

        counts
            .publish(&RoomId::from("r1"), &[UnreadDelta::unchanged("newcomer")])
            .await
            .unwrap();

        assert_eq!(counts.count("newcomer"), Some(0));
        assert_eq!(counts.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_publish_is_noop() {
        let counts = UnreadCounts::new();
        counts.publish(&RoomId::from("r1"), &[]).await.unwrap();
        assert!(counts.is_empty());
    }

    #[test]
    fn test_snapshot_sorted_by_user() {
        let counts = UnreadCounts::new();
        for user in ["c", "a", "b"] {
            counts.apply(&UnreadDelta::became_unread(user));
        }

        let users: Vec<_> = counts.snapshot().into_keys().collect();
        assert_eq!(users, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_arc_sink_forwards() {
        let counts = std::sync::Arc::new(UnreadCounts::new());
        let sink: std::sync::Arc<UnreadCounts> = counts.clone();

        sink.publish(&RoomId::from("r1"), &[UnreadDelta::became_unread("a")])
            .await
            .unwrap();

        assert_eq!(counts.count("a"), Some(1));
    }
}
