//! # Unread Rooms
//!
//! The reactive core of an incremental view: given a stream of room messages
//! and a stream of room subscriptions, keep a small register per room and
//! emit per-user deltas that a sum-reduction turns into "number of rooms
//! this user has unread".
//!
//! ## Core Concepts
//!
//! - [`RoomRegister`] = derived per-room state (message timestamps, sorted
//!   subscribers)
//! - [`RegisterProducer`] = pure translation of one source event into a
//!   register fragment
//! - [`compute_unread_toggles`] = sorted merge-join of the register before
//!   and after an update, yielding [`UnreadDelta`]s
//!
//! ## Architecture
//!
//! ```text
//! MessageEvent ──────────► MessageProducer ──────┐
//!                                                ▼ fragment
//! RoomSubscriptionEvent ─► SubscriptionProducer ─┤
//!                                                ▼
//!                               RoomRegister::reduce (per room)
//!                                                │
//!                                  (previous, next)
//!                                                ▼
//!                                 compute_unread_toggles
//!                                                │
//!                                                ▼ UnreadDelta
//!                                   Outbox (per sink, until accepted)
//!                                                │
//!                                                ▼
//!                                   UnreadCounts (sum by user)
//! ```
//!
//! ## Key Invariants
//!
//! 1. **Subscribers are sorted** - strictly ascending by user id, no duplicates
//! 2. **Producers and toggles are pure** - no IO, no failure modes
//! 3. **Absent means seen** - a non-member never has a room unread
//! 4. **Per-room causal order** - each committed `next` is the `previous` of
//!    the room's following update
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use unread_rooms::{
//!     DerivationBuilder, InMemoryStore, MessageEvent, RoomSubscriptionEvent, UnreadCounts,
//! };
//!
//! let counts = Arc::new(UnreadCounts::new());
//! let derivation = DerivationBuilder::new(InMemoryStore::new())
//!     .with_sink(counts.clone())
//!     .build();
//!
//! derivation.publish(&RoomSubscriptionEvent::seen("r1", "u1", 50).into()).await?;
//! derivation.publish(&MessageEvent::posted("r1", "m1", 100).into()).await?;
//!
//! assert_eq!(counts.count("u1"), Some(1));
//! ```

// Derivation core
mod core;
mod producer;
mod register;
mod toggle;

// Reference host
mod config;
mod engine;
mod error;
mod outbox;
mod persistence;
mod sink;


pub use crate::core::{MessageEvent, RoomId, RoomSubscriptionEvent, SourceEvent, UnreadDelta};

pub use producer::{produce, MessageProducer, RegisterProducer, SubscriptionProducer};

pub use register::{
    reduce_messages, reduce_subscribers, RoomRegister, RoomSubscriber, SEEN_EVERYTHING, TOMBSTONE,
};

pub use toggle::compute_unread_toggles;

pub use config::{DerivationConfig, DEFAULT_LOG_FILTER, DEFAULT_MAX_CONFLICT_RETRIES};

pub use engine::{Derivation, DerivationBuilder, PublishOutcome};

pub use error::{DerivationError, StoreError};

pub use persistence::{InMemoryStore, RegisterStore, Revision};

pub use sink::{DeltaSink, UnreadCounts};

// Re-export commonly used external types
pub use async_trait::async_trait;
