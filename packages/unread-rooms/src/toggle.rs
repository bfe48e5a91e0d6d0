//! Unread-toggle computation.
//!
//! Given a room register immediately before and after an update, find every
//! user whose "room is unread" status changed.
//!
//! A user has the room unread when their seen timestamp is below the room's
//! latest message time. A user without a subscription never has it unread.
//!
//! # Algorithm
//!
//! Both subscriber sequences are sorted by user id, so a single two-pointer
//! full outer join visits every user exactly once:
//!
//! ```text
//! previous:  a     c
//! next:         b  c
//!            │  │  │
//!            ▼  ▼  ▼
//!     (a, -)  (-, b)  (c, c)
//! ```
//!
//! Each pair is classified against the previous and next reference times and
//! produces at most one [`UnreadDelta`].

use std::cmp::Ordering;

use crate::core::UnreadDelta;
use crate::register::{RoomRegister, RoomSubscriber};

/// Compute the per-user unread deltas caused by `previous` → `next`.
///
/// Output is ordered by user id. Runs in
/// `O(previous.subscribers.len() + next.subscribers.len())` and never
/// allocates beyond the returned vector.
pub fn compute_unread_toggles(previous: &RoomRegister, next: &RoomRegister) -> Vec<UnreadDelta> {
    let prev_time = previous.latest_message_time();
    let next_time = next.latest_message_time();

    let (before, after) = (&previous.subscribers, &next.subscribers);
    let mut out = Vec::new();
    let (mut l, mut r) = (0, 0);

    loop {
        let pair = match (before.get(l), after.get(r)) {
            (Some(left), Some(right)) => match left.user_id.cmp(&right.user_id) {
                Ordering::Less => {
                    l += 1;
                    (Some(left), None)
                }
                Ordering::Greater => {
                    r += 1;
                    (None, Some(right))
                }
                Ordering::Equal => {
                    l += 1;
                    r += 1;
                    (Some(left), Some(right))
                }
            },
            (Some(left), None) => {
                l += 1;
                (Some(left), None)
            }
            (None, Some(right)) => {
                r += 1;
                (None, Some(right))
            }
            (None, None) => break,
        };

        if let Some(delta) = toggle(pair.0, pair.1, prev_time, next_time) {
            out.push(delta);
        }
    }

    out
}

/// Whether `subscriber` has seen everything up to `reference_time`.
///
/// An absent subscription always counts as seen.
fn is_seen(subscriber: Option<&RoomSubscriber>, reference_time: i64) -> bool {
    subscriber.map_or(true, |s| s.seen_timestamp >= reference_time)
}

fn toggle(
    before: Option<&RoomSubscriber>,
    after: Option<&RoomSubscriber>,
    prev_time: i64,
    next_time: i64,
) -> Option<UnreadDelta> {
    let user_id = match (before, after) {
        (Some(s), _) | (None, Some(s)) => s.user_id.as_str(),
        (None, None) => return None,
    };

    let was_seen = is_seen(before, prev_time);
    let is_seen_now = is_seen(after, next_time);

    match (was_seen, is_seen_now) {
        (true, false) => Some(UnreadDelta::became_unread(user_id)),
        (false, true) => Some(UnreadDelta::became_read(user_id)),
        // New to this room: emit a zero so the user materializes downstream.
        _ if before.is_none() => Some(UnreadDelta::unchanged(user_id)),
        _ => None,
    }
}
