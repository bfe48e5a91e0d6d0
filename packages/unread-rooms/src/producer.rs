//! Register update producers.
//!
//! Producers are pure translators: one source document in, one register
//! fragment out. They never read the current register and never fail.
//!
//! # Key Properties
//!
//! - **Stateless**: `produce(&self, ..)` has nothing to mutate
//! - **Total**: every well-typed event maps to a fragment
//! - **One event → one fragment**: the host reduces it into the room register

use crate::core::{MessageEvent, RoomSubscriptionEvent, SourceEvent};
use crate::register::{RoomRegister, RoomSubscriber, TOMBSTONE};

/// Translates events of one source collection into register fragments.
///
/// # Example
///
/// ```ignore
/// use unread_rooms::{MessageEvent, MessageProducer, RegisterProducer};
///
/// let fragment = MessageProducer.produce(&MessageEvent::posted("r1", "m1", 100));
/// assert_eq!(fragment.messages.get("m1"), Some(&100));
/// ```
pub trait RegisterProducer: Send + Sync + 'static {
    /// The source document type this producer handles.
    type Event;

    /// Map one event to the fragment to be reduced into its room's register.
    fn produce(&self, event: &Self::Event) -> RoomRegister;
}

/// Producer for the messages collection.
///
/// Adds or updates `{message id: timestamp}`. A retraction writes
/// [`TOMBSTONE`] under the same key.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageProducer;

impl RegisterProducer for MessageProducer {
    type Event = MessageEvent;

    fn produce(&self, event: &MessageEvent) -> RoomRegister {
        let timestamp = if event.delete { TOMBSTONE } else { event.timestamp };
        RoomRegister::with_message(event.id.clone(), timestamp)
    }
}

/// Producer for the room-users collection.
///
/// Adds or updates the user's subscription. An unsubscribe emits a removal
/// marker whose seen timestamp is [`crate::SEEN_EVERYTHING`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SubscriptionProducer;

impl RegisterProducer for SubscriptionProducer {
    type Event = RoomSubscriptionEvent;

    fn produce(&self, event: &RoomSubscriptionEvent) -> RoomRegister {
        let subscriber = if event.delete {
            RoomSubscriber::removed(event.user_id.clone())
        } else {
            RoomSubscriber::new(event.user_id.clone(), event.seen_timestamp)
        };
        RoomRegister::with_subscriber(subscriber)
    }
}

/// Route a source event to the producer for its collection.
pub fn produce(event: &SourceEvent) -> RoomRegister {
    match event {
        SourceEvent::Messages(event) => MessageProducer.produce(event),
        SourceEvent::RoomUsers(event) => SubscriptionProducer.produce(event),
    }
}
