//! # Ticket Module — Tickets, Statuses, and the Type Catalog
//!
//! A [`Ticket`] is the customer-facing unit of work: a title, a description,
//! an owner, a ticket type (which determines its credit cost), and a status
//! that staff move through the lifecycle:
//!
//! ```text
//!    Open ──► InProgress ──► Resolved ──► Closed
//! ```
//!
//! Transitions are not enforced as a strict state machine — a staff member
//! can reopen a closed ticket or close an open one directly. The helpdesk
//! trusts its staff; it just refuses to let customers change status at all
//! (see [`crate::desk`]).
//!
//! The [`TicketType`] catalog maps a type id to a human label and a credit
//! cost. It lives in the settings store as JSON so an admin screen can edit
//! it without a schema change; [`default_ticket_types`] seeds a fresh
//! install.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod conversation;

pub use conversation::Reply;

// ---------------------------------------------------------------------------
// TicketStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a support ticket.
///
/// Every ticket starts as `Open`. Status changes are staff actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TicketStatus {
    /// Newly submitted, waiting for staff to pick it up.
    Open,

    /// Staff is actively working on it.
    InProgress,

    /// Staff believes the issue is fixed; waiting on customer confirmation.
    Resolved,

    /// Done. Stays readable, stays replyable, but it's off the queue.
    Closed,
}

impl TicketStatus {
    /// All statuses, in lifecycle order. Used for listings and filters.
    pub fn all() -> [TicketStatus; 4] {
        [
            TicketStatus::Open,
            TicketStatus::InProgress,
            TicketStatus::Resolved,
            TicketStatus::Closed,
        ]
    }

    /// Human-readable label, as shown in dashboards.
    pub fn label(&self) -> &'static str {
        match self {
            TicketStatus::Open => "Open",
            TicketStatus::InProgress => "In Progress",
            TicketStatus::Resolved => "Resolved",
            TicketStatus::Closed => "Closed",
        }
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Ticket
// ---------------------------------------------------------------------------

/// A support ticket document.
///
/// Persisted in the `tickets` tree keyed by `id` (big-endian u64), with a
/// secondary `owner`-keyed index for per-user listings. The credit cost is
/// not stored on the ticket — it's a property of the [`TicketType`] at
/// creation time, and the ledger deduction is the durable record of what
/// was paid.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ticket {
    /// Unique ticket id, allocated by the storage layer.
    pub id: u64,

    /// User id of the customer who opened the ticket.
    pub owner: u64,

    /// One-line summary entered by the customer.
    pub title: String,

    /// Full problem description.
    pub description: String,

    /// Id of the [`TicketType`] this ticket was created as (e.g.
    /// `"small_fix"`). Kept as the id, not the label, so catalog edits
    /// don't rewrite history.
    pub ticket_type: String,

    /// Current lifecycle status.
    pub status: TicketStatus,

    /// When the ticket was submitted.
    pub created_at: DateTime<Utc>,

    /// Timestamp of the most recent status change.
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// Returns `true` if the given user owns this ticket.
    pub fn is_owned_by(&self, user: u64) -> bool {
        self.owner == user
    }
}

// ---------------------------------------------------------------------------
// TicketType
// ---------------------------------------------------------------------------

/// One entry in the ticket-type catalog: a category of work and its price
/// in credits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketType {
    /// Stable machine id (e.g. `"small_fix"`). Referenced by tickets.
    pub id: String,

    /// Human-readable label shown in the submission form.
    pub label: String,

    /// Credit cost deducted when a ticket of this type is created.
    pub credits: u64,
}

/// The catalog seeded into a fresh installation.
///
/// Admins can replace these through the settings store; existing tickets
/// keep referencing whatever type id they were created with.
pub fn default_ticket_types() -> Vec<TicketType> {
    vec![
        TicketType {
            id: "small_fix".to_string(),
            label: "Small Fix - 1 Credit".to_string(),
            credits: 1,
        },
        TicketType {
            id: "theme_setup".to_string(),
            label: "Theme Setup - 3 Credits".to_string(),
            credits: 3,
        },
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
