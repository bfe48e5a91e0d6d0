//! Derivation engine - publish dispatcher for the unread-rooms transform.
//!
//! The engine wires the pure derivation core to a register store and a set
//! of output sinks:
//!
//! ```text
//! SourceEvent → producer → fragment ─┐
//!                                    ▼
//!                 store.load ──► previous.reduce(fragment) ──► store.save
//!                                                                 │
//!                          compute_unread_toggles(previous, next) ◄┘
//!                                    │
//!                                    ▼
//!                      outbox (per sink) ──► sinks
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use unread_rooms::{DerivationBuilder, InMemoryStore, MessageEvent, UnreadCounts};
//!
//! let counts = Arc::new(UnreadCounts::new());
//! let derivation = DerivationBuilder::new(InMemoryStore::new())
//!     .with_sink(counts.clone())
//!     .build();
//!
//! derivation.publish(&MessageEvent::posted("r1", "m1", 100).into()).await?;
//! ```
//!
//! # Ordering
//!
//! Publishes for the same room are serialized by a per-room async mutex, and
//! a commit is only accepted if the register's revision did not move since
//! it was loaded. A lost race reloads the register and recomputes, so the
//! deltas of every accepted publish are derived from the register it
//! actually replaced.
//!
//! # Delivery
//!
//! Deltas are computed from a committed register, so a sink that rejects
//! them cannot get them back by replaying the event. Each sink has an
//! [`Outbox`] that keeps rejected batches; they are delivered ahead of the
//! room's next batch, or by [`Derivation::redeliver_pending`].

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::config::{DerivationConfig, DEFAULT_MAX_CONFLICT_RETRIES};
use crate::core::{RoomId, SourceEvent, UnreadDelta};
use crate::error::{DerivationError, StoreError};
use crate::outbox::Outbox;
use crate::persistence::{RegisterStore, Revision};
use crate::producer;
use crate::register::RoomRegister;
use crate::sink::DeltaSink;
use crate::toggle::compute_unread_toggles;

/// What a single publish did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub room_id: RoomId,
    /// Revision of the room register after this publish.
    pub revision: Revision,
    /// Whether the register changed (and was saved).
    pub changed: bool,
    /// Load/reduce/save attempts it took to commit.
    pub attempts: u32,
    /// Deltas computed by this publish, in user id order.
    pub deltas: Vec<UnreadDelta>,
}

/// A committed `(previous, next)` pair.
struct Committed {
    previous: RoomRegister,
    next: RoomRegister,
    revision: Revision,
    changed: bool,
    attempts: u32,
}

/// A sink and the deltas it has not accepted yet.
struct Route {
    sink: Arc<dyn DeltaSink>,
    outbox: Outbox,
}

/// Builder for [`Derivation`].
pub struct DerivationBuilder<S> {
    store: S,
    sinks: Vec<Arc<dyn DeltaSink>>,
    max_conflict_retries: u32,
}

impl<S: RegisterStore> DerivationBuilder<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            sinks: Vec::new(),
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }

    /// Forward every publish's deltas to `sink`.
    pub fn with_sink(mut self, sink: impl DeltaSink) -> Self {
        self.sinks.push(Arc::new(sink));
        self
    }

    /// Apply settings from a loaded [`DerivationConfig`].
    pub fn with_config(self, config: &DerivationConfig) -> Self {
        self.max_conflict_retries(config.max_conflict_retries)
    }

    /// Attempts to commit a reduced register before giving up. Clamped to 1.
    pub fn max_conflict_retries(mut self, attempts: u32) -> Self {
        self.max_conflict_retries = attempts.max(1);
        self
    }

    pub fn build(self) -> Derivation<S> {
        Derivation {
            store: self.store,
            routes: self
                .sinks
                .into_iter()
                .map(|sink| Route {
                    sink,
                    outbox: Outbox::new(),
                })
                .collect(),
            max_conflict_retries: self.max_conflict_retries,
            room_locks: DashMap::new(),
        }
    }
}

/// Publish dispatcher: routes source events through the derivation core.
pub struct Derivation<S> {
    store: S,
    routes: Vec<Route>,
    max_conflict_retries: u32,
    /// One entry per room with a publish in flight.
    room_locks: DashMap<RoomId, Arc<Mutex<()>>>,
}

impl<S: RegisterStore> Derivation<S> {
    /// The underlying register store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Publish one source event.
    ///
    /// Reduces the event's fragment into its room register, then forwards
    /// the resulting unread deltas to every sink, preceded by any deltas
    /// the sink rejected earlier for this room. Returns once the register
    /// is committed and all sinks accepted their batch.
    ///
    /// On [`DerivationError::Sink`] the register is committed and the
    /// rejected deltas wait in that sink's outbox.
    pub async fn publish(&self, event: &SourceEvent) -> Result<PublishOutcome, DerivationError> {
        let room_id = event.room_id().clone();
        let fragment = producer::produce(event);

        let lock = self.room_lock(&room_id);
        let result = {
            let _guard = lock.lock().await;
            self.publish_locked(&room_id, event, &fragment).await
        };
        drop(lock);
        self.release_room_lock(&room_id);

        result
    }

    /// Deliver every outstanding outbox batch without publishing new events.
    ///
    /// Returns the number of rooms whose batches were attempted. Stops at
    /// the first room a sink still rejects.
    pub async fn redeliver_pending(&self) -> Result<usize, DerivationError> {
        let mut rooms: Vec<RoomId> = self
            .routes
            .iter()
            .flat_map(|route| route.outbox.rooms())
            .collect();
        rooms.sort();
        rooms.dedup();

        for room_id in &rooms {
            let lock = self.room_lock(room_id);
            let result = {
                let _guard = lock.lock().await;
                self.forward(room_id, &[]).await
            };
            drop(lock);
            self.release_room_lock(room_id);
            result?;
        }

        Ok(rooms.len())
    }

    /// Undelivered deltas for `room_id`, summed over all sinks.
    pub fn pending_deltas(&self, room_id: &RoomId) -> usize {
        self.routes
            .iter()
            .map(|route| route.outbox.pending(room_id))
            .sum()
    }

    /// Publish events one after another, stopping at the first error.
    pub async fn publish_all<I>(&self, events: I) -> Result<Vec<PublishOutcome>, DerivationError>
    where
        I: IntoIterator<Item = SourceEvent>,
    {
        let mut outcomes = Vec::new();
        for event in events {
            outcomes.push(self.publish(&event).await?);
        }
        Ok(outcomes)
    }

    async fn publish_locked(
        &self,
        room_id: &RoomId,
        event: &SourceEvent,
        fragment: &RoomRegister,
    ) -> Result<PublishOutcome, DerivationError> {
        let room_id = room_id.clone();
        let committed = self.commit(&room_id, fragment).await?;
        let deltas = compute_unread_toggles(&committed.previous, &committed.next);

        debug!(
            room_id = %room_id,
            collection = event.collection(),
            revision = %committed.revision,
            changed = committed.changed,
            deltas = deltas.len(),
            "published source event"
        );

        self.forward(&room_id, &deltas).await?;

        Ok(PublishOutcome {
            room_id,
            revision: committed.revision,
            changed: committed.changed,
            attempts: committed.attempts,
            deltas,
        })
    }

    fn room_lock(&self, room_id: &RoomId) -> Arc<Mutex<()>> {
        self.room_locks
            .entry(room_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the room's lock once no other publish holds or awaits it.
    fn release_room_lock(&self, room_id: &RoomId) {
        self.room_locks
            .remove_if(room_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    async fn commit(
        &self,
        room_id: &RoomId,
        fragment: &RoomRegister,
    ) -> Result<Committed, DerivationError> {
        for attempt in 1..=self.max_conflict_retries {
            let (previous, expected) = self
                .store
                .load(room_id)
                .await
                .map_err(|source| DerivationError::Store {
                    room_id: room_id.clone(),
                    source,
                })?
                .unwrap_or_default();

            let next = previous.reduce(fragment);

            // Unchanged registers are not saved; the revision does not advance.
            if next == previous {
                return Ok(Committed {
                    previous,
                    next,
                    revision: expected,
                    changed: false,
                    attempts: attempt,
                });
            }

            match self.store.save(room_id, &next, expected).await {
                Ok(revision) => {
                    return Ok(Committed {
                        previous,
                        next,
                        revision,
                        changed: true,
                        attempts: attempt,
                    })
                }
                Err(StoreError::Conflict) => {
                    warn!(
                        room_id = %room_id,
                        attempt,
                        expected = %expected,
                        "register revision conflict, reloading"
                    );
                }
                Err(source) => {
                    return Err(DerivationError::Store {
                        room_id: room_id.clone(),
                        source,
                    })
                }
            }
        }

        error!(
            room_id = %room_id,
            attempts = self.max_conflict_retries,
            "giving up on register commit"
        );
        Err(DerivationError::ConflictRetriesExhausted {
            room_id: room_id.clone(),
            attempts: self.max_conflict_retries,
        })
    }

    /// Deliver each sink's outbox for the room followed by `deltas`.
    ///
    /// Every sink is attempted. A rejected batch goes back to that sink's
    /// outbox and the first rejection is returned.
    async fn forward(&self, room_id: &RoomId, deltas: &[UnreadDelta]) -> Result<(), DerivationError> {
        let deliveries = self.routes.iter().map(|route| async move {
            let mut batch = route.outbox.claim(room_id);
            let redelivered = batch.len();
            batch.extend_from_slice(deltas);
            if batch.is_empty() {
                return Ok(());
            }

            match route.sink.publish(room_id, &batch).await {
                Ok(()) => {
                    if redelivered > 0 {
                        debug!(room_id = %room_id, redelivered, "delivered pending unread deltas");
                    }
                    Ok(())
                }
                Err(source) => {
                    warn!(
                        room_id = %room_id,
                        pending = batch.len(),
                        error = %source,
                        "sink rejected unread deltas, keeping them in outbox"
                    );
                    route.outbox.restore(room_id, batch);
                    Err(source)
                }
            }
        });

        match join_all(deliveries).await.into_iter().find_map(Result::err) {
            Some(source) => Err(DerivationError::Sink {
                room_id: room_id.clone(),
                source,
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{MessageEvent, RoomSubscriptionEvent};
    use crate::persistence::InMemoryStore;
    use crate::register::RoomSubscriber;
    use crate::sink::UnreadCounts;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // =========================================================================
    // Test Stores & Sinks
    // =========================================================================

    /// Store whose first save is preceded by another writer's commit.
    struct RacingStore {
        inner: InMemoryStore,
        interloper: std::sync::Mutex<Option<RoomRegister>>,
    }

    impl RacingStore {
        fn new(interloper: RoomRegister) -> Self {
            Self {
                inner: InMemoryStore::new(),
                interloper: std::sync::Mutex::new(Some(interloper)),
            }
        }
    }

    #[async_trait]
    impl RegisterStore for RacingStore {
        async fn load(
            &self,
            room_id: &RoomId,
        ) -> Result<Option<(RoomRegister, Revision)>, StoreError> {
            self.inner.load(room_id).await
        }

        async fn save(
            &self,
            room_id: &RoomId,
            register: &RoomRegister,
            expected: Revision,
        ) -> Result<Revision, StoreError> {
            let interloper = self.interloper.lock().unwrap().take();
            if let Some(fragment) = interloper {
                let (current, rev) = self.inner.load(room_id).await?.unwrap_or_default();
                self.inner.save(room_id, &current.reduce(&fragment), rev).await?;
            }
            self.inner.save(room_id, register, expected).await
        }
    }

    /// Store that always loses the race.
    #[derive(Default)]
    struct AlwaysConflicting {
        saves: AtomicUsize,
    }

    #[async_trait]
    impl RegisterStore for AlwaysConflicting {
        async fn load(&self, _: &RoomId) -> Result<Option<(RoomRegister, Revision)>, StoreError> {
            Ok(None)
        }

        async fn save(&self, _: &RoomId, _: &RoomRegister, _: Revision) -> Result<Revision, StoreError> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Conflict)
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl RegisterStore for BrokenStore {
        async fn load(&self, _: &RoomId) -> Result<Option<(RoomRegister, Revision)>, StoreError> {
            Err(StoreError::Backend(anyhow::anyhow!("connection refused")))
        }

        async fn save(&self, _: &RoomId, _: &RoomRegister, _: Revision) -> Result<Revision, StoreError> {
            unreachable!("load always fails")
        }
    }

    struct RejectingSink;

    #[async_trait]
    impl DeltaSink for RejectingSink {
        async fn publish(&self, _: &RoomId, _: &[UnreadDelta]) -> anyhow::Result<()> {
            anyhow::bail!("output collection unavailable")
        }
    }

    /// Counts deltas, but rejects the first `failures` batches it is offered.
    struct FlakySink {
        counts: UnreadCounts,
        failures: AtomicUsize,
    }

    impl FlakySink {
        fn failing(failures: usize) -> Self {
            Self {
                counts: UnreadCounts::new(),
                failures: AtomicUsize::new(failures),
            }
        }
    }

    #[async_trait]
    impl DeltaSink for FlakySink {
        async fn publish(&self, room_id: &RoomId, deltas: &[UnreadDelta]) -> anyhow::Result<()> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                anyhow::bail!("transient outage");
            }
            self.counts.publish(room_id, deltas).await
        }
    }

    fn message(room: &str, id: &str, ts: i64) -> SourceEvent {
        MessageEvent::posted(room, id, ts).into()
    }

    fn seen(room: &str, user: &str, ts: i64) -> SourceEvent {
        RoomSubscriptionEvent::seen(room, user, ts).into()
    }

    // =========================================================================
    // Publish Tests
    // =========================================================================

    #[tokio::test]
    async fn test_publish_commits_register_and_forwards_deltas() {
        let counts = Arc::new(UnreadCounts::new());
        let derivation = DerivationBuilder::new(InMemoryStore::new())
            .with_sink(counts.clone())
            .build();

        let first = derivation.publish(&seen("r1", "u1", 50)).await.unwrap();
        assert_eq!(first.revision, Revision::new(1));
        assert!(first.changed);
        assert_eq!(first.deltas, vec![UnreadDelta::unchanged("u1")]);

        let second = derivation.publish(&message("r1", "m1", 100)).await.unwrap();
        assert_eq!(second.revision, Revision::new(2));
        assert_eq!(second.deltas, vec![UnreadDelta::became_unread("u1")]);

        assert_eq!(counts.count("u1"), Some(1));

        let (register, _) = derivation
            .store()
            .load(&RoomId::from("r1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(register.messages.get("m1"), Some(&100));
        assert_eq!(register.subscribers, vec![RoomSubscriber::new("u1", 50)]);
    }

    #[tokio::test]
    async fn test_unchanged_register_is_not_saved() {
        let derivation = DerivationBuilder::new(InMemoryStore::new()).build();

        derivation.publish(&message("r1", "m1", 100)).await.unwrap();
        let duplicate = derivation.publish(&message("r1", "m1", 100)).await.unwrap();

        assert!(!duplicate.changed);
        assert_eq!(duplicate.revision, Revision::new(1));
        assert!(duplicate.deltas.is_empty());
    }

    #[tokio::test]
    async fn test_unsubscribe_of_unknown_user_leaves_room_unsaved() {
        let derivation = DerivationBuilder::new(InMemoryStore::new()).build();

        let outcome = derivation
            .publish(&RoomSubscriptionEvent::unsubscribed("r1", "ghost").into())
            .await
            .unwrap();

        assert!(!outcome.changed);
        assert_eq!(outcome.revision, Revision::NONE);
        assert!(derivation.store().is_empty());
    }

    #[tokio::test]
    async fn test_conflict_reloads_and_recomputes() {
        // Another writer posts m1 between our load and our save.
        let store = RacingStore::new(RoomRegister::with_message("m1", 100));
        let derivation = DerivationBuilder::new(store).build();

        let outcome = derivation.publish(&seen("r1", "u1", 50)).await.unwrap();

        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.revision, Revision::new(2));
        // Computed against the interloper's register: u1 joins already behind.
        assert_eq!(outcome.deltas, vec![UnreadDelta::became_unread("u1")]);
    }

    #[tokio::test]
    async fn test_conflict_retries_exhausted() {
        let derivation = DerivationBuilder::new(AlwaysConflicting::default())
            .max_conflict_retries(4)
            .build();

        let err = derivation.publish(&seen("r1", "u1", 0)).await.unwrap_err();

        assert!(matches!(
            err,
            DerivationError::ConflictRetriesExhausted { attempts: 4, .. }
        ));
        assert_eq!(derivation.store().saves.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_config_sets_retry_budget() {
        let config = DerivationConfig {
            max_conflict_retries: 2,
            ..DerivationConfig::default()
        };
        let derivation = DerivationBuilder::new(AlwaysConflicting::default())
            .with_config(&config)
            .build();

        let _ = derivation.publish(&seen("r1", "u1", 0)).await;
        assert_eq!(derivation.store().saves.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_retries_clamped_to_one_attempt() {
        let derivation = DerivationBuilder::new(AlwaysConflicting::default())
            .max_conflict_retries(0)
            .build();

        let _ = derivation.publish(&seen("r1", "u1", 0)).await;
        assert_eq!(derivation.store().saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_backend_error_is_not_retried() {
        let derivation = DerivationBuilder::new(BrokenStore).build();

        let err = derivation.publish(&seen("r1", "u1", 0)).await.unwrap_err();

        assert!(matches!(
            err,
            DerivationError::Store {
                source: StoreError::Backend(_),
                ..
            }
        ));
        assert_eq!(err.room_id().as_str(), "r1");
    }

    #[tokio::test]
    async fn test_sink_failure_surfaces_after_commit() {
        let derivation = DerivationBuilder::new(InMemoryStore::new())
            .with_sink(RejectingSink)
            .build();

        let err = derivation.publish(&seen("r1", "u1", 0)).await.unwrap_err();
        assert!(matches!(err, DerivationError::Sink { .. }));

        // The register was committed regardless, and the delta is kept.
        assert_eq!(derivation.store().len(), 1);
        assert_eq!(derivation.pending_deltas(&RoomId::from("r1")), 1);
    }

    #[tokio::test]
    async fn test_rejected_deltas_delivered_on_replay() {
        let sink = Arc::new(FlakySink::failing(1));
        let derivation = DerivationBuilder::new(InMemoryStore::new())
            .with_sink(sink.clone())
            .build();

        let err = derivation.publish(&seen("r1", "u1", 0)).await.unwrap_err();
        assert!(matches!(err, DerivationError::Sink { .. }));
        assert_eq!(sink.counts.count("u1"), None);

        // Same event again: the register is unchanged, but the kept delta goes out.
        let replay = derivation.publish(&seen("r1", "u1", 0)).await.unwrap();
        assert!(!replay.changed);
        assert!(replay.deltas.is_empty());
        assert_eq!(sink.counts.count("u1"), Some(0));
        assert_eq!(derivation.pending_deltas(&RoomId::from("r1")), 0);
    }

    #[tokio::test]
    async fn test_rejected_deltas_precede_later_deltas() {
        let sink = Arc::new(FlakySink::failing(2));
        let derivation = DerivationBuilder::new(InMemoryStore::new())
            .with_sink(sink.clone())
            .build();

        // Lost +1 followed by a -1 must not leave u1 at -1.
        assert!(derivation.publish(&seen("r1", "u1", 0)).await.is_err());
        assert!(derivation.publish(&message("r1", "m1", 100)).await.is_err());
        assert_eq!(derivation.pending_deltas(&RoomId::from("r1")), 2);

        derivation.publish(&seen("r1", "u1", 100)).await.unwrap();

        assert_eq!(sink.counts.count("u1"), Some(0));
        assert_eq!(derivation.pending_deltas(&RoomId::from("r1")), 0);
    }

    #[tokio::test]
    async fn test_only_rejecting_sink_gets_redelivery() {
        let steady = Arc::new(UnreadCounts::new());
        let flaky = Arc::new(FlakySink::failing(1));
        let derivation = DerivationBuilder::new(InMemoryStore::new())
            .with_sink(steady.clone())
            .with_sink(flaky.clone())
            .build();

        derivation.publish(&message("r1", "m1", 10)).await.unwrap();
        assert!(derivation.publish(&seen("r1", "u1", 0)).await.is_err());
        assert_eq!(steady.count("u1"), Some(1));
        assert_eq!(flaky.counts.count("u1"), None);

        assert_eq!(derivation.redeliver_pending().await.unwrap(), 1);

        assert_eq!(steady.count("u1"), Some(1));
        assert_eq!(flaky.counts.count("u1"), Some(1));
        assert_eq!(derivation.redeliver_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_redelivery_keeps_batch_while_sink_rejects() {
        let derivation = DerivationBuilder::new(InMemoryStore::new())
            .with_sink(RejectingSink)
            .build();

        let _ = derivation.publish(&seen("r1", "u1", 0)).await;
        let err = derivation.redeliver_pending().await.unwrap_err();

        assert_eq!(err.room_id().as_str(), "r1");
        assert_eq!(derivation.pending_deltas(&RoomId::from("r1")), 1);
    }

    #[tokio::test]
    async fn test_every_sink_receives_deltas() {
        let a = Arc::new(UnreadCounts::new());
        let b = Arc::new(UnreadCounts::new());
        let derivation = DerivationBuilder::new(InMemoryStore::new())
            .with_sink(a.clone())
            .with_sink(b.clone())
            .build();

        derivation
            .publish_all([message("r1", "m1", 10), seen("r1", "u1", 0)])
            .await
            .unwrap();

        assert_eq!(a.count("u1"), Some(1));
        assert_eq!(a.snapshot(), b.snapshot());
    }

    #[tokio::test]
    async fn test_concurrent_publishes_to_one_room_serialize() {
        let counts = Arc::new(UnreadCounts::new());
        let derivation = Arc::new(
            DerivationBuilder::new(InMemoryStore::new())
                .with_sink(counts.clone())
                .build(),
        );

        derivation.publish(&message("r1", "m1", 1_000)).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..32 {
            let derivation = derivation.clone();
            handles.push(tokio::spawn(async move {
                derivation.publish(&seen("r1", &format!("u{i:02}"), 0)).await
            }));
        }
        for handle in handles {
            let outcome = handle.await.unwrap().unwrap();
            assert_eq!(outcome.attempts, 1);
        }

        let snapshot = counts.snapshot();
        assert_eq!(snapshot.len(), 32);
        assert!(snapshot.values().all(|&n| n == 1));
        assert!(derivation.room_locks.is_empty());
    }

    // =========================================================================
    // Room Lock Tests
    // =========================================================================

    #[tokio::test]
    async fn test_room_locks_released_after_publish() {
        let derivation = DerivationBuilder::new(InMemoryStore::new()).build();

        for i in 0..1_000 {
            derivation
                .publish(&RoomSubscriptionEvent::unsubscribed(format!("r{i}"), "u1").into())
                .await
                .unwrap();
        }

        assert!(derivation.store().is_empty());
        assert!(derivation.room_locks.is_empty());
    }

    #[tokio::test]
    async fn test_room_lock_released_after_failed_publish() {
        let derivation = DerivationBuilder::new(BrokenStore).build();

        let _ = derivation.publish(&seen("r1", "u1", 0)).await;

        assert!(derivation.room_locks.is_empty());
    }

    #[tokio::test]
    async fn test_held_room_lock_is_not_evicted() {
        let derivation = DerivationBuilder::new(InMemoryStore::new()).build();
        let room = RoomId::from("r1");

        let held = derivation.room_lock(&room);
        derivation.publish(&seen("r1", "u1", 0)).await.unwrap();
        assert_eq!(derivation.room_locks.len(), 1);

        drop(held);
        derivation.release_room_lock(&room);
        assert!(derivation.room_locks.is_empty());
    }
}
