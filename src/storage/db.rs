//! # DeskDb — Persistent Storage Engine
//!
//! The persistence layer for the helpdesk, built on sled's embedded
//! key-value store. All on-disk data flows through this module.
//!
//! ## Tree Layout
//!
//! sled organizes data into named "trees" (analogous to column families in
//! RocksDB or tables in SQL). Each tree is an independent B+ tree with its
//! own keyspace:
//!
//! | Tree               | Key                        | Value                      |
//! |--------------------|----------------------------|----------------------------|
//! | `settings`         | name (UTF-8)               | value (UTF-8)              |
//! | `credits`          | `user_id` (8B BE)          | balance (8B BE)            |
//! | `tickets`          | `ticket_id` (8B BE)        | `bincode(Ticket)`          |
//! | `tickets_by_owner` | `owner` BE ++ `ticket` BE  | `ticket_id` (8B BE)        |
//! | `credentials`      | `ticket_id` (8B BE)        | `bincode(CredentialRecord)`|
//! | `conversations`    | `ticket_id` BE ++ `seq` BE | `bincode(Reply)`           |
//!
//! Ids are stored as big-endian u64 so that sled's lexicographic ordering
//! matches numeric ordering — this makes prefix scans over a user's tickets
//! and a ticket's conversation thread come back in the right order for free.
//!
//! ## Atomicity
//!
//! Single-key writes are atomic. The one multi-writer hotspot — the credits
//! tree — is only ever mutated through compare-and-swap by
//! [`crate::ledger::CreditLedger`]; this module just hands the tree out.

use sled::{Db, Tree};
use std::path::Path;

use crate::ticket::{Reply, Ticket};
use crate::vault::CredentialRecord;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type DbResult<T> = Result<T, DbError>;

// ---------------------------------------------------------------------------
// Key encoding
// ---------------------------------------------------------------------------

/// Big-endian key for a single u64 id.
fn id_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

/// Composite key: `first BE || second BE`.
fn pair_key(first: u64, second: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&first.to_be_bytes());
    key[8..].copy_from_slice(&second.to_be_bytes());
    key
}

// ---------------------------------------------------------------------------
// DeskDb
// ---------------------------------------------------------------------------

/// Persistent storage engine for the helpdesk core.
///
/// Wraps a sled `Db` instance and exposes typed accessors for settings,
/// tickets, credential records, and conversation threads. Document values
/// use bincode; settings values are plain UTF-8 strings so an operator can
/// inspect them with standard tooling.
///
/// # Thread Safety
///
/// sled is inherently thread-safe — all trees support lock-free concurrent
/// reads and serialized writes. `DeskDb` can be cloned cheaply and shared
/// across threads without external synchronization.
#[derive(Debug, Clone)]
pub struct DeskDb {
    /// The underlying sled database handle.
    db: Db,
    /// Install-wide settings: encryption key, ticket-type catalog.
    settings: Tree,
    /// Per-user credit balances. Mutated only via CAS by the ledger.
    credits: Tree,
    /// Ticket documents indexed by ticket id.
    tickets: Tree,
    /// Secondary index: (owner, ticket id) -> ticket id.
    tickets_by_owner: Tree,
    /// Encrypted credential records, at most one per ticket.
    credentials: Tree,
    /// Reply threads keyed by (ticket id, sequence number).
    conversations: Tree,
}

impl DeskDb {
    /// Open or create a database at the given filesystem path.
    ///
    /// If the directory doesn't exist, sled creates it. If the database
    /// already exists, it's opened and all existing data is available
    /// immediately.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary database that lives in memory and is cleaned up
    /// automatically when the `DeskDb` is dropped.
    ///
    /// Ideal for unit tests — no filesystem side effects, no cleanup needed.
    pub fn open_temporary() -> DbResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    /// Internal constructor: opens named trees from an existing sled `Db`.
    fn from_db(db: Db) -> DbResult<Self> {
        let settings = db.open_tree("settings")?;
        let credits = db.open_tree("credits")?;
        let tickets = db.open_tree("tickets")?;
        let tickets_by_owner = db.open_tree("tickets_by_owner")?;
        let credentials = db.open_tree("credentials")?;
        let conversations = db.open_tree("conversations")?;

        Ok(Self {
            db,
            settings,
            credits,
            tickets,
            tickets_by_owner,
            credentials,
            conversations,
        })
    }

    /// Hands the credits tree to the ledger, which owns all mutation of it.
    pub fn credits_tree(&self) -> Tree {
        self.credits.clone()
    }

    /// Allocate a fresh ticket id.
    ///
    /// Monotonic within a process lifetime, unique across the lifetime of
    /// the database.
    pub fn allocate_ticket_id(&self) -> DbResult<u64> {
        Ok(self.db.generate_id()?)
    }

    // -- Settings operations ------------------------------------------------

    /// Read a settings value. Returns `None` if the key has never been set.
    pub fn get_setting(&self, name: &str) -> DbResult<Option<String>> {
        match self.settings.get(name.as_bytes())? {
            Some(bytes) => Ok(Some(decode_utf8(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Write a settings value, overwriting any previous one.
    pub fn put_setting(&self, name: &str, value: &str) -> DbResult<()> {
        self.settings.insert(name.as_bytes(), value.as_bytes())?;
        Ok(())
    }

    /// Insert a settings value only if the key is absent, atomically.
    ///
    /// Returns the value that ended up stored: the caller's `value` if the
    /// insert won, or the pre-existing value if another writer (or an
    /// earlier run) got there first. This is the primitive the vault uses
    /// to guarantee the encryption key is generated at most once even
    /// under concurrent first calls.
    pub fn setting_insert_if_absent(&self, name: &str, value: &str) -> DbResult<String> {
        loop {
            if let Some(existing) = self.settings.get(name.as_bytes())? {
                return decode_utf8(&existing);
            }

            match self.settings.compare_and_swap(
                name.as_bytes(),
                None::<&[u8]>,
                Some(value.as_bytes()),
            )? {
                Ok(()) => return Ok(value.to_string()),
                // Lost the race; loop around and read the winner.
                Err(_) => continue,
            }
        }
    }

    // -- Ticket operations --------------------------------------------------

    /// Persist a ticket document and its owner-index entry.
    ///
    /// Overwrites any existing ticket with the same id (used for status
    /// updates as well as creation).
    pub fn put_ticket(&self, ticket: &Ticket) -> DbResult<()> {
        let key = id_key(ticket.id);
        let bytes =
            bincode::serialize(ticket).map_err(|e| DbError::Serialization(e.to_string()))?;

        self.tickets.insert(&key, bytes)?;
        self.tickets_by_owner
            .insert(pair_key(ticket.owner, ticket.id).to_vec(), key.to_vec())?;
        Ok(())
    }

    /// Retrieve a ticket by id. Returns `None` if it doesn't exist.
    pub fn get_ticket(&self, ticket_id: u64) -> DbResult<Option<Ticket>> {
        match self.tickets.get(id_key(ticket_id))? {
            Some(bytes) => {
                let ticket: Ticket = bincode::deserialize(&bytes)
                    .map_err(|e| DbError::Serialization(e.to_string()))?;
                Ok(Some(ticket))
            }
            None => Ok(None),
        }
    }

    /// Remove a ticket and its index entry.
    ///
    /// Used by the creation flow to compensate when a later step fails.
    /// Returns the removed ticket, or `None` if it didn't exist.
    pub fn remove_ticket(&self, ticket_id: u64) -> DbResult<Option<Ticket>> {
        match self.tickets.remove(id_key(ticket_id))? {
            Some(bytes) => {
                let ticket: Ticket = bincode::deserialize(&bytes)
                    .map_err(|e| DbError::Serialization(e.to_string()))?;
                self.tickets_by_owner
                    .remove(pair_key(ticket.owner, ticket.id).to_vec())?;
                Ok(Some(ticket))
            }
            None => Ok(None),
        }
    }

    /// All tickets owned by a user, newest first.
    pub fn tickets_for_owner(&self, owner: u64) -> DbResult<Vec<Ticket>> {
        let mut tickets = Vec::new();
        for entry in self.tickets_by_owner.scan_prefix(owner.to_be_bytes()) {
            let (_key, ticket_key) = entry?;
            if let Some(bytes) = self.tickets.get(&ticket_key)? {
                let ticket: Ticket = bincode::deserialize(&bytes)
                    .map_err(|e| DbError::Serialization(e.to_string()))?;
                tickets.push(ticket);
            }
        }
        tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tickets)
    }

    /// All tickets in the system, newest first.
    pub fn all_tickets(&self) -> DbResult<Vec<Ticket>> {
        let mut tickets = Vec::new();
        for entry in self.tickets.iter() {
            let (_key, bytes) = entry?;
            let ticket: Ticket = bincode::deserialize(&bytes)
                .map_err(|e| DbError::Serialization(e.to_string()))?;
            tickets.push(ticket);
        }
        tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tickets)
    }

    /// Number of tickets stored.
    pub fn ticket_count(&self) -> usize {
        self.tickets.len()
    }

    // -- Credential operations ----------------------------------------------

    /// Persist a credential record, keyed by its ticket id.
    ///
    /// At most one record exists per ticket; writing again overwrites
    /// (upsert semantics — the caller preserves `created_at` when updating).
    pub fn put_credentials(&self, record: &CredentialRecord) -> DbResult<()> {
        let bytes =
            bincode::serialize(record).map_err(|e| DbError::Serialization(e.to_string()))?;
        self.credentials.insert(id_key(record.ticket_id), bytes)?;
        Ok(())
    }

    /// Retrieve the credential record for a ticket, if one was ever saved.
    pub fn get_credentials(&self, ticket_id: u64) -> DbResult<Option<CredentialRecord>> {
        match self.credentials.get(id_key(ticket_id))? {
            Some(bytes) => {
                let record: CredentialRecord = bincode::deserialize(&bytes)
                    .map_err(|e| DbError::Serialization(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Remove the credential record for a ticket, if present.
    pub fn remove_credentials(&self, ticket_id: u64) -> DbResult<()> {
        self.credentials.remove(id_key(ticket_id))?;
        Ok(())
    }

    /// Number of credential records stored.
    pub fn credential_count(&self) -> usize {
        self.credentials.len()
    }

    // -- Conversation operations --------------------------------------------

    /// Append a reply to a ticket's conversation thread.
    ///
    /// Allocates the next sequence number and timestamps the reply.
    /// Returns the stored reply.
    pub fn append_reply(
        &self,
        ticket_id: u64,
        author: u64,
        body: String,
        from_staff: bool,
    ) -> DbResult<Reply> {
        let seq = self.next_reply_seq(ticket_id)?;
        let reply = Reply {
            ticket_id,
            seq,
            author,
            body,
            from_staff,
            created_at: chrono::Utc::now(),
        };

        let bytes =
            bincode::serialize(&reply).map_err(|e| DbError::Serialization(e.to_string()))?;
        self.conversations
            .insert(pair_key(ticket_id, seq).to_vec(), bytes)?;
        Ok(reply)
    }

    /// The full conversation thread for a ticket, in posting order.
    pub fn replies_for_ticket(&self, ticket_id: u64) -> DbResult<Vec<Reply>> {
        let mut replies = Vec::new();
        for entry in self.conversations.scan_prefix(ticket_id.to_be_bytes()) {
            let (_key, bytes) = entry?;
            let reply: Reply = bincode::deserialize(&bytes)
                .map_err(|e| DbError::Serialization(e.to_string()))?;
            replies.push(reply);
        }
        Ok(replies)
    }

    /// Number of replies on a ticket's thread.
    pub fn reply_count(&self, ticket_id: u64) -> usize {
        self.conversations
            .scan_prefix(ticket_id.to_be_bytes())
            .count()
    }

    /// Next free sequence number in a ticket's thread.
    ///
    /// The prefix scan comes back in ascending key order, so the last key's
    /// low 8 bytes are the highest sequence so far.
    fn next_reply_seq(&self, ticket_id: u64) -> DbResult<u64> {
        match self
            .conversations
            .scan_prefix(ticket_id.to_be_bytes())
            .keys()
            .next_back()
        {
            Some(key) => {
                let key = key?;
                let mut seq_bytes = [0u8; 8];
                seq_bytes.copy_from_slice(&key[8..16]);
                Ok(u64::from_be_bytes(seq_bytes) + 1)
            }
            None => Ok(0),
        }
    }

    // -- Utility operations -------------------------------------------------

    /// Force a flush of all pending writes to disk.
    ///
    /// sled buffers writes in memory for performance. This call blocks
    /// until all data is durable on the underlying storage device.
    pub fn flush(&self) -> DbResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

/// Decode a settings value as UTF-8.
fn decode_utf8(bytes: &[u8]) -> DbResult<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| DbError::Serialization("setting is not valid UTF-8".to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
