// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # CreditDesk — Helpdesk Core Library
//!
//! The core of a credit-based support-ticket helpdesk: customers spend
//! credits to open tickets, optionally attach website credentials (encrypted
//! at rest, always), exchange threaded replies with staff, and staff move
//! tickets through their lifecycle.
//!
//! Two subsystems carry all the weight:
//!
//! - **ledger** — one non-negative credit balance per user, with an atomic
//!   conditional-deduct. Two racing requests never both spend the same
//!   credit. This is the part that touches money, so it gets the most tests.
//! - **vault** — AES-256-GCM encryption of per-ticket credential fields
//!   under a single install-wide key, generated exactly once and persisted.
//!   Plaintext passwords never hit disk. Not once, not "temporarily".
//!
//! ## Architecture
//!
//! - **config** — Every constant in one place. Cipher parameters, settings
//!   keys, the default ticket-type catalog.
//! - **crypto** — Low-level sealing primitives. Don't roll your own.
//! - **storage** — Persistent document and settings stores over sled.
//! - **ledger** — Credit balances: read, set, atomic spend, admin grants.
//! - **vault** — The encryption key and the credential vault built on it.
//! - **ticket** — Tickets, statuses, ticket types, reply threads.
//! - **desk** — The flows that tie it together: create, reply, status,
//!   credentials. This is what the (out-of-scope) web layer calls.
//! - **logging** — tracing-subscriber setup for the embedding application.
//!
//! ## Design Philosophy
//!
//! 1. Correctness over cleverness. A helpdesk that loses a credit or leaks
//!    a password has failed at its only two jobs.
//! 2. The storage layer decides atomicity; the flows decide compensation.
//! 3. Every public API is documented. Internal shame is documented too.
//! 4. If it touches credits or credentials, it has tests. Plural.

pub mod config;
pub mod crypto;
pub mod desk;
pub mod ledger;
pub mod logging;
pub mod storage;
pub mod ticket;
pub mod vault;
