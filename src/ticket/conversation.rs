//! # Ticket Conversations
//!
//! Threaded replies between the customer and staff, attached to a ticket.
//! Replies are append-only: no edits, no deletes. The per-ticket sequence
//! number is the ordering authority — wall clocks are recorded for display
//! but never trusted for order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single reply in a ticket's conversation thread.
///
/// Persisted in the `conversations` tree keyed by
/// `ticket_id BE || seq BE`, so a prefix scan over the ticket id yields
/// the thread in order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Reply {
    /// The ticket this reply belongs to.
    pub ticket_id: u64,

    /// Position within the ticket's thread, starting at 0.
    pub seq: u64,

    /// User id of the author (customer or staff member).
    pub author: u64,

    /// The message body.
    pub body: String,

    /// `true` when the reply was written by staff. Stored on the reply
    /// rather than derived, so the thread renders correctly even if the
    /// author's role changes later.
    pub from_staff: bool,

    /// When the reply was posted.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_serde_roundtrip() {
        let reply = Reply {
            ticket_id: 3,
            seq: 1,
            author: 42,
            body: "Still broken after the update.".to_string(),
            from_staff: false,
            created_at: Utc::now(),
        };

        let bytes = bincode::serialize(&reply).expect("serialize");
        let back: Reply = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(back.ticket_id, 3);
        assert_eq!(back.seq, 1);
        assert_eq!(back.body, reply.body);
        assert!(!back.from_staff);
    }
}
