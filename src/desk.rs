//! # TicketDesk — The Helpdesk Flows
//!
//! This is the surface the (out-of-scope) web layer calls: ticket creation,
//! replies, status changes, credential save/view, and the admin credit
//! actions. Everything below it — ledger, vault, storage — is policy-free;
//! the desk is where ownership checks, role checks, and the
//! credits-for-tickets exchange live.
//!
//! ## The creation exchange
//!
//! Creating a ticket spends credits, and the two must never come apart.
//! The order of operations is **deduct, then create**:
//!
//! 1. Encrypt any supplied credentials first — it's pure computation, so
//!    a bad key fails the request before anything has changed.
//! 2. Atomically deduct the ticket type's cost. Insufficient credits is a
//!    typed refusal, not an error, and nothing has been written.
//! 3. Write the ticket, then the credential record.
//!
//! If a write after the deduction fails, the desk compensates: the partial
//! ticket is removed and the credits are granted back. The failure is still
//! reported — compensation restores the books, it doesn't invent success.
//! The one unrecoverable corner (the refund itself failing on a dying
//! store) is logged at ERROR with everything an operator needs to fix the
//! balance by hand.
//!
//! Deduct-first means no ticket ever exists that wasn't paid for, which is
//! the failure mode that actually costs money. The alternative — a paid
//! ticket briefly missing — can't happen either, because the ticket write
//! is compensated.

use thiserror::Error;

use crate::config::TICKET_TYPES_SETTING;
use crate::ledger::{CreditLedger, LedgerError, SpendOutcome};
use crate::storage::{DbError, DeskDb};
use crate::ticket::{default_ticket_types, Reply, Ticket, TicketStatus, TicketType};
use crate::vault::{
    CredentialFields, CredentialRecord, CredentialVault, EncryptionKey, KeyError, VaultError,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by desk flows.
#[derive(Debug, Error)]
pub enum DeskError {
    /// The document/settings store failed.
    #[error("storage error: {0}")]
    Db(#[from] DbError),

    /// The credit ledger failed (store error or corrupt balance — not
    /// insufficient credits, which is a normal outcome).
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Credential encryption or decryption failed.
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),

    /// The encryption key couldn't be loaded or created.
    #[error(transparent)]
    Key(#[from] KeyError),

    /// The requested ticket type isn't in the catalog.
    #[error("unknown ticket type: {0}")]
    UnknownTicketType(String),

    /// No ticket with this id.
    #[error("ticket {0} not found")]
    TicketNotFound(u64),

    /// The acting user is neither the ticket's owner nor staff.
    #[error("user {user} is not allowed to act on ticket {ticket}")]
    PermissionDenied {
        /// The acting user.
        user: u64,
        /// The ticket they tried to touch.
        ticket: u64,
    },

    /// A required field was empty.
    #[error("required field is empty: {0}")]
    EmptyField(&'static str),
}

// ---------------------------------------------------------------------------
// Actors & requests
// ---------------------------------------------------------------------------

/// Who is acting. Supplied by the surrounding application's user
/// directory, which this core consults but does not implement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// A customer: may act on tickets they own.
    Customer,
    /// Staff: may act on any ticket and change statuses.
    Staff,
}

impl Role {
    /// Returns `true` for staff.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Staff)
    }
}

/// Credentials attached to a ticket at creation or saved later.
#[derive(Clone, Debug, Default)]
pub struct NewCredentials {
    /// The website the ticket is about (stored cleartext).
    pub site_url: String,
    /// The admin login URL (stored cleartext).
    pub admin_url: String,
    /// The sensitive fields, encrypted before storage.
    pub fields: CredentialFields,
}

/// Everything needed to open a ticket.
#[derive(Clone, Debug)]
pub struct NewTicketRequest {
    /// The customer opening the ticket.
    pub user: u64,
    /// One-line summary. Required.
    pub title: String,
    /// Full description. Required.
    pub description: String,
    /// Catalog id of the ticket type (determines the credit cost).
    pub ticket_type: String,
    /// Optional site credentials to store alongside the ticket.
    pub credentials: Option<NewCredentials>,
}

/// The result of a creation attempt that didn't error.
#[derive(Clone, Debug)]
pub enum CreateOutcome {
    /// The ticket was created and the cost deducted.
    Created(Ticket),

    /// The customer couldn't afford the ticket type. Nothing was changed.
    InsufficientCredits {
        /// Their balance at the time.
        available: u64,
        /// What the ticket type costs.
        required: u64,
    },
}

impl CreateOutcome {
    /// The created ticket, if creation went through.
    pub fn ticket(&self) -> Option<&Ticket> {
        match self {
            CreateOutcome::Created(ticket) => Some(ticket),
            CreateOutcome::InsufficientCredits { .. } => None,
        }
    }
}

/// A credential record with its sensitive fields decrypted, as returned
/// to an authorized viewer.
#[derive(Clone, Debug)]
pub struct DecryptedCredentials {
    pub site_url: String,
    pub admin_url: String,
    pub fields: CredentialFields,
}

// ---------------------------------------------------------------------------
// TicketDesk
// ---------------------------------------------------------------------------

/// The helpdesk core: storage, ledger, vault, and the ticket-type catalog,
/// glued together by the flows below.
#[derive(Debug, Clone)]
pub struct TicketDesk {
    db: DeskDb,
    ledger: CreditLedger,
    vault: CredentialVault,
    types: Vec<TicketType>,
}

impl TicketDesk {
    /// Assemble a desk from an opened database and a vault.
    ///
    /// Loads the ticket-type catalog from settings, seeding the defaults
    /// on a fresh install (the activation-time behavior).
    pub fn new(db: DeskDb, vault: CredentialVault) -> Result<Self, DeskError> {
        let types = match db.get_setting(TICKET_TYPES_SETTING)? {
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| DbError::Serialization(e.to_string()))?,
            None => {
                let defaults = default_ticket_types();
                let json = serde_json::to_string(&defaults)
                    .map_err(|e| DbError::Serialization(e.to_string()))?;
                db.put_setting(TICKET_TYPES_SETTING, &json)?;
                tracing::info!("seeded default ticket-type catalog");
                defaults
            }
        };

        let ledger = CreditLedger::new(db.credits_tree());
        Ok(Self {
            db,
            ledger,
            vault,
            types,
        })
    }

    /// Open (or create) an installation at `path`: database, encryption
    /// key, vault, catalog — the whole stack.
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self, DeskError> {
        let db = DeskDb::open(path)?;
        let key = EncryptionKey::load_or_generate(&db)?;
        Self::new(db, CredentialVault::new(key))
    }

    /// A fully in-memory desk for tests.
    pub fn open_temporary() -> Result<Self, DeskError> {
        let db = DeskDb::open_temporary()?;
        let key = EncryptionKey::load_or_generate(&db)?;
        Self::new(db, CredentialVault::new(key))
    }

    /// The credit ledger, for admin actions and balance displays.
    pub fn ledger(&self) -> &CreditLedger {
        &self.ledger
    }

    /// The underlying store, for listings the web layer renders directly.
    pub fn db(&self) -> &DeskDb {
        &self.db
    }

    /// The ticket-type catalog.
    pub fn ticket_types(&self) -> &[TicketType] {
        &self.types
    }

    /// Replace the ticket-type catalog (admin settings screen).
    pub fn set_ticket_types(&mut self, types: Vec<TicketType>) -> Result<(), DeskError> {
        let json = serde_json::to_string(&types)
            .map_err(|e| DbError::Serialization(e.to_string()))?;
        self.db.put_setting(TICKET_TYPES_SETTING, &json)?;
        self.types = types;
        Ok(())
    }

    /// Look up a catalog entry by id.
    fn ticket_type(&self, id: &str) -> Result<&TicketType, DeskError> {
        self.types
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| DeskError::UnknownTicketType(id.to_string()))
    }

    // -- Ticket creation ------------------------------------------------------

    /// Open a ticket, spending the customer's credits.
    ///
    /// See the module docs for the ordering and compensation rules.
    /// Insufficient credits comes back as
    /// [`CreateOutcome::InsufficientCredits`], not as an error.
    pub fn create_ticket(&self, request: NewTicketRequest) -> Result<CreateOutcome, DeskError> {
        if request.title.trim().is_empty() {
            return Err(DeskError::EmptyField("title"));
        }
        if request.description.trim().is_empty() {
            return Err(DeskError::EmptyField("description"));
        }
        let cost = self.ticket_type(&request.ticket_type)?.credits;

        // Encrypt up front: pure computation, fails before any state change.
        let encrypted = match &request.credentials {
            Some(creds) if !creds.fields.is_empty() || !creds.site_url.is_empty() => {
                Some(self.vault.encrypt_fields(&creds.fields)?)
            }
            _ => None,
        };

        match self.ledger.try_spend(request.user, cost)? {
            SpendOutcome::InsufficientCredits {
                available,
                requested,
            } => {
                tracing::debug!(
                    user = request.user,
                    available,
                    requested,
                    "ticket refused: insufficient credits"
                );
                return Ok(CreateOutcome::InsufficientCredits {
                    available,
                    required: requested,
                });
            }
            SpendOutcome::Spent { .. } => {}
        }

        // Credits are spent; from here on every failure must refund.
        let ticket = match self.write_ticket(&request) {
            Ok(ticket) => ticket,
            Err(err) => {
                self.refund(request.user, cost, "ticket write failed");
                return Err(err);
            }
        };

        if let (Some(encrypted), Some(creds)) = (encrypted, &request.credentials) {
            let now = chrono::Utc::now();
            let record = CredentialRecord {
                ticket_id: ticket.id,
                owner: request.user,
                site_url: creds.site_url.clone(),
                admin_url: creds.admin_url.clone(),
                username_ciphertext: encrypted.username_ciphertext,
                password_ciphertext: encrypted.password_ciphertext,
                notes_ciphertext: encrypted.notes_ciphertext,
                created_at: now,
                updated_at: now,
            };
            if let Err(err) = self.db.put_credentials(&record) {
                if let Err(cleanup) = self.db.remove_ticket(ticket.id) {
                    tracing::error!(
                        ticket = ticket.id,
                        error = %cleanup,
                        "failed to remove ticket while compensating credential write"
                    );
                }
                self.refund(request.user, cost, "credential write failed");
                return Err(err.into());
            }
        }

        tracing::info!(
            ticket = ticket.id,
            user = request.user,
            ticket_type = %ticket.ticket_type,
            cost,
            "ticket created"
        );
        Ok(CreateOutcome::Created(ticket))
    }

    fn write_ticket(&self, request: &NewTicketRequest) -> Result<Ticket, DeskError> {
        let now = chrono::Utc::now();
        let ticket = Ticket {
            id: self.db.allocate_ticket_id()?,
            owner: request.user,
            title: request.title.clone(),
            description: request.description.clone(),
            ticket_type: request.ticket_type.clone(),
            status: TicketStatus::Open,
            created_at: now,
            updated_at: now,
        };
        self.db.put_ticket(&ticket)?;
        Ok(ticket)
    }

    /// Grant back credits after a post-deduction failure. A refund that
    /// itself fails leaves the books wrong, so it gets the loudest log
    /// level we have and enough context for a manual fix.
    fn refund(&self, user: u64, cost: u64, reason: &str) {
        match self.ledger.grant(user, cost) {
            Ok(balance) => {
                tracing::warn!(user, cost, balance, reason, "refunded credits");
            }
            Err(err) => {
                tracing::error!(
                    user,
                    cost,
                    reason,
                    error = %err,
                    "REFUND FAILED -- user is under-credited and needs a manual grant"
                );
            }
        }
    }

    // -- Conversations --------------------------------------------------------

    /// Post a reply on a ticket's thread.
    ///
    /// Customers may reply only to their own tickets; staff may reply
    /// anywhere. Replies stay allowed on closed tickets — customers
    /// saying "thanks" after closure is half the thread traffic.
    pub fn add_reply(
        &self,
        user: u64,
        role: Role,
        ticket_id: u64,
        body: &str,
    ) -> Result<Reply, DeskError> {
        if body.trim().is_empty() {
            return Err(DeskError::EmptyField("message"));
        }

        let ticket = self.authorize(user, role, ticket_id)?;
        let reply = self
            .db
            .append_reply(ticket.id, user, body.to_string(), role.is_staff())?;

        tracing::debug!(ticket = ticket.id, user, seq = reply.seq, "reply added");
        Ok(reply)
    }

    /// The conversation thread for a ticket, oldest first.
    pub fn replies(&self, user: u64, role: Role, ticket_id: u64) -> Result<Vec<Reply>, DeskError> {
        self.authorize(user, role, ticket_id)?;
        Ok(self.db.replies_for_ticket(ticket_id)?)
    }

    // -- Status ---------------------------------------------------------------

    /// Move a ticket to a new status. Staff only.
    pub fn set_status(
        &self,
        user: u64,
        role: Role,
        ticket_id: u64,
        status: TicketStatus,
    ) -> Result<Ticket, DeskError> {
        if !role.is_staff() {
            return Err(DeskError::PermissionDenied {
                user,
                ticket: ticket_id,
            });
        }

        let mut ticket = self
            .db
            .get_ticket(ticket_id)?
            .ok_or(DeskError::TicketNotFound(ticket_id))?;

        ticket.status = status;
        ticket.updated_at = chrono::Utc::now();
        self.db.put_ticket(&ticket)?;

        tracing::info!(ticket = ticket.id, status = %status, "status changed");
        Ok(ticket)
    }

    // -- Credentials ------------------------------------------------------------

    /// Save (or overwrite) the credential record for a ticket.
    ///
    /// Upsert semantics: a second save replaces the first, keeping the
    /// original `created_at`.
    pub fn save_credentials(
        &self,
        user: u64,
        role: Role,
        ticket_id: u64,
        creds: NewCredentials,
    ) -> Result<(), DeskError> {
        let ticket = self.authorize(user, role, ticket_id)?;
        let encrypted = self.vault.encrypt_fields(&creds.fields)?;

        let now = chrono::Utc::now();
        let created_at = self
            .db
            .get_credentials(ticket.id)?
            .map(|existing| existing.created_at)
            .unwrap_or(now);

        let record = CredentialRecord {
            ticket_id: ticket.id,
            owner: ticket.owner,
            site_url: creds.site_url,
            admin_url: creds.admin_url,
            username_ciphertext: encrypted.username_ciphertext,
            password_ciphertext: encrypted.password_ciphertext,
            notes_ciphertext: encrypted.notes_ciphertext,
            created_at,
            updated_at: now,
        };
        self.db.put_credentials(&record)?;

        tracing::debug!(ticket = ticket.id, "credentials saved");
        Ok(())
    }

    /// Fetch and decrypt a ticket's credentials for an authorized viewer.
    ///
    /// Returns `None` when no credentials were ever saved. A decryption
    /// failure is an error, never a silently blank record.
    pub fn credentials(
        &self,
        user: u64,
        role: Role,
        ticket_id: u64,
    ) -> Result<Option<DecryptedCredentials>, DeskError> {
        self.authorize(user, role, ticket_id)?;

        let Some(record) = self.db.get_credentials(ticket_id)? else {
            return Ok(None);
        };

        let fields = self.vault.decrypt_fields(&record)?;
        Ok(Some(DecryptedCredentials {
            site_url: record.site_url,
            admin_url: record.admin_url,
            fields,
        }))
    }

    // -- Listings ---------------------------------------------------------------

    /// A customer's own tickets, newest first.
    pub fn tickets_for(&self, user: u64) -> Result<Vec<Ticket>, DeskError> {
        Ok(self.db.tickets_for_owner(user)?)
    }

    /// Every ticket in the system, optionally filtered by status. Staff
    /// dashboards use this; the per-customer view goes through
    /// [`tickets_for`](Self::tickets_for).
    pub fn all_tickets(&self, status: Option<TicketStatus>) -> Result<Vec<Ticket>, DeskError> {
        let mut tickets = self.db.all_tickets()?;
        if let Some(status) = status {
            tickets.retain(|t| t.status == status);
        }
        Ok(tickets)
    }

    /// Load a single ticket, enforcing the owner-or-staff rule.
    pub fn ticket(&self, user: u64, role: Role, ticket_id: u64) -> Result<Ticket, DeskError> {
        self.authorize(user, role, ticket_id)
    }

    /// The owner-or-staff gate used by every per-ticket flow.
    fn authorize(&self, user: u64, role: Role, ticket_id: u64) -> Result<Ticket, DeskError> {
        let ticket = self
            .db
            .get_ticket(ticket_id)?
            .ok_or(DeskError::TicketNotFound(ticket_id))?;

        if !role.is_staff() && !ticket.is_owned_by(user) {
            return Err(DeskError::PermissionDenied {
                user,
                ticket: ticket_id,
            });
        }
        Ok(ticket)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const CUSTOMER: u64 = 42;
    const OTHER_CUSTOMER: u64 = 43;
    const STAFF: u64 = 7;

    fn request(ticket_type: &str) -> NewTicketRequest {
        NewTicketRequest {
            user: CUSTOMER,
            title: "Contact form broken".to_string(),
            description: "Submissions go nowhere since Tuesday.".to_string(),
            ticket_type: ticket_type.to_string(),
            credentials: None,
        }
    }

    fn request_with_credentials() -> NewTicketRequest {
        NewTicketRequest {
            credentials: Some(NewCredentials {
                site_url: "https://example.com".to_string(),
                admin_url: "https://example.com/wp-admin".to_string(),
                fields: CredentialFields {
                    username: Some("admin".to_string()),
                    password: Some("hunter2".to_string()),
                    notes: None,
                },
            }),
            ..request("small_fix")
        }
    }

    fn desk_with_credits(credits: u64) -> TicketDesk {
        let desk = TicketDesk::open_temporary().expect("temp desk");
        desk.ledger().set_balance(CUSTOMER, credits).unwrap();
        desk
    }

    #[test]
    fn fresh_install_seeds_default_catalog() {
        let desk = TicketDesk::open_temporary().unwrap();
        let ids: Vec<&str> = desk.ticket_types().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["small_fix", "theme_setup"]);
    }

    #[test]
    fn create_deducts_cost() {
        let desk = desk_with_credits(5);

        let outcome = desk.create_ticket(request("theme_setup")).unwrap();
        let ticket = outcome.ticket().expect("created");

        assert_eq!(ticket.owner, CUSTOMER);
        assert_eq!(ticket.status, TicketStatus::Open);
        assert_eq!(desk.ledger().get_balance(CUSTOMER).unwrap(), 2);
    }

    #[test]
    fn create_refused_without_credits() {
        let desk = desk_with_credits(2);

        let outcome = desk.create_ticket(request("theme_setup")).unwrap();
        assert!(matches!(
            outcome,
            CreateOutcome::InsufficientCredits {
                available: 2,
                required: 3
            }
        ));

        // Nothing was written, nothing was charged.
        assert_eq!(desk.ledger().get_balance(CUSTOMER).unwrap(), 2);
        assert_eq!(desk.db().ticket_count(), 0);
    }

    #[test]
    fn create_exact_balance_then_refusal() {
        let desk = desk_with_credits(3);

        let outcome = desk.create_ticket(request("theme_setup")).unwrap();
        assert!(outcome.ticket().is_some());
        assert_eq!(desk.ledger().get_balance(CUSTOMER).unwrap(), 0);

        let outcome = desk.create_ticket(request("small_fix")).unwrap();
        assert!(outcome.ticket().is_none());
        assert_eq!(desk.ledger().get_balance(CUSTOMER).unwrap(), 0);
    }

    #[test]
    fn create_with_credentials_stores_ciphertext_only() {
        let desk = desk_with_credits(1);

        let outcome = desk.create_ticket(request_with_credentials()).unwrap();
        let ticket = outcome.ticket().expect("created");

        let record = desk.db().get_credentials(ticket.id).unwrap().unwrap();
        assert_eq!(record.site_url, "https://example.com");
        let password_ct = record.password_ciphertext.as_deref().unwrap();
        assert_ne!(password_ct, "hunter2");
        assert!(!password_ct.contains("hunter2"));
        assert!(record.notes_ciphertext.is_none());

        let decrypted = desk
            .credentials(CUSTOMER, Role::Customer, ticket.id)
            .unwrap()
            .unwrap();
        assert_eq!(decrypted.fields.username.as_deref(), Some("admin"));
        assert_eq!(decrypted.fields.password.as_deref(), Some("hunter2"));
        assert!(decrypted.fields.notes.is_none());
    }

    #[test]
    fn create_rejects_blank_title_before_charging() {
        let desk = desk_with_credits(5);
        let result = desk.create_ticket(NewTicketRequest {
            title: "   ".to_string(),
            ..request("small_fix")
        });

        assert!(matches!(result, Err(DeskError::EmptyField("title"))));
        assert_eq!(desk.ledger().get_balance(CUSTOMER).unwrap(), 5);
    }

    #[test]
    fn create_rejects_unknown_type_before_charging() {
        let desk = desk_with_credits(5);
        let result = desk.create_ticket(request("yacht_maintenance"));

        assert!(matches!(result, Err(DeskError::UnknownTicketType(_))));
        assert_eq!(desk.ledger().get_balance(CUSTOMER).unwrap(), 5);
    }

    #[test]
    fn replies_enforce_ownership() {
        let desk = desk_with_credits(1);
        let ticket_id = desk
            .create_ticket(request("small_fix"))
            .unwrap()
            .ticket()
            .unwrap()
            .id;

        desk.add_reply(CUSTOMER, Role::Customer, ticket_id, "any update?")
            .unwrap();
        desk.add_reply(STAFF, Role::Staff, ticket_id, "on it")
            .unwrap();

        let denied = desk.add_reply(OTHER_CUSTOMER, Role::Customer, ticket_id, "me too");
        assert!(matches!(denied, Err(DeskError::PermissionDenied { .. })));

        let thread = desk.replies(CUSTOMER, Role::Customer, ticket_id).unwrap();
        assert_eq!(thread.len(), 2);
        assert!(!thread[0].from_staff);
        assert!(thread[1].from_staff);
    }

    #[test]
    fn empty_reply_rejected() {
        let desk = desk_with_credits(1);
        let ticket_id = desk
            .create_ticket(request("small_fix"))
            .unwrap()
            .ticket()
            .unwrap()
            .id;

        let result = desk.add_reply(CUSTOMER, Role::Customer, ticket_id, "  \n ");
        assert!(matches!(result, Err(DeskError::EmptyField("message"))));
    }

    #[test]
    fn status_changes_are_staff_only() {
        let desk = desk_with_credits(1);
        let ticket_id = desk
            .create_ticket(request("small_fix"))
            .unwrap()
            .ticket()
            .unwrap()
            .id;

        let denied = desk.set_status(CUSTOMER, Role::Customer, ticket_id, TicketStatus::Closed);
        assert!(matches!(denied, Err(DeskError::PermissionDenied { .. })));

        let updated = desk
            .set_status(STAFF, Role::Staff, ticket_id, TicketStatus::InProgress)
            .unwrap();
        assert_eq!(updated.status, TicketStatus::InProgress);

        let reloaded = desk.ticket(STAFF, Role::Staff, ticket_id).unwrap();
        assert_eq!(reloaded.status, TicketStatus::InProgress);
    }

    #[test]
    fn save_credentials_upserts_and_keeps_created_at() {
        let desk = desk_with_credits(1);
        let ticket_id = desk
            .create_ticket(request("small_fix"))
            .unwrap()
            .ticket()
            .unwrap()
            .id;

        desk.save_credentials(
            CUSTOMER,
            Role::Customer,
            ticket_id,
            NewCredentials {
                site_url: "https://example.com".to_string(),
                admin_url: String::new(),
                fields: CredentialFields {
                    password: Some("first".to_string()),
                    ..Default::default()
                },
            },
        )
        .unwrap();
        let first = desk.db().get_credentials(ticket_id).unwrap().unwrap();

        desk.save_credentials(
            CUSTOMER,
            Role::Customer,
            ticket_id,
            NewCredentials {
                site_url: "https://example.com".to_string(),
                admin_url: String::new(),
                fields: CredentialFields {
                    password: Some("second".to_string()),
                    ..Default::default()
                },
            },
        )
        .unwrap();
        let second = desk.db().get_credentials(ticket_id).unwrap().unwrap();

        assert_eq!(second.created_at, first.created_at);
        assert_eq!(desk.db().credential_count(), 1);

        let decrypted = desk
            .credentials(CUSTOMER, Role::Customer, ticket_id)
            .unwrap()
            .unwrap();
        assert_eq!(decrypted.fields.password.as_deref(), Some("second"));
    }

    #[test]
    fn credentials_hidden_from_other_customers() {
        let desk = desk_with_credits(1);
        let ticket_id = desk
            .create_ticket(request_with_credentials())
            .unwrap()
            .ticket()
            .unwrap()
            .id;

        let denied = desk.credentials(OTHER_CUSTOMER, Role::Customer, ticket_id);
        assert!(matches!(denied, Err(DeskError::PermissionDenied { .. })));

        // Staff can view.
        assert!(desk
            .credentials(STAFF, Role::Staff, ticket_id)
            .unwrap()
            .is_some());
    }

    #[test]
    fn credentials_none_when_never_saved() {
        let desk = desk_with_credits(1);
        let ticket_id = desk
            .create_ticket(request("small_fix"))
            .unwrap()
            .ticket()
            .unwrap()
            .id;

        assert!(desk
            .credentials(CUSTOMER, Role::Customer, ticket_id)
            .unwrap()
            .is_none());
    }

    #[test]
    fn listings_split_by_owner_and_status() {
        let desk = desk_with_credits(3);
        desk.ledger().set_balance(OTHER_CUSTOMER, 1).unwrap();

        let mine = desk
            .create_ticket(request("small_fix"))
            .unwrap()
            .ticket()
            .unwrap()
            .id;
        desk.create_ticket(request("small_fix")).unwrap();
        desk.create_ticket(NewTicketRequest {
            user: OTHER_CUSTOMER,
            ..request("small_fix")
        })
        .unwrap();

        assert_eq!(desk.tickets_for(CUSTOMER).unwrap().len(), 2);
        assert_eq!(desk.tickets_for(OTHER_CUSTOMER).unwrap().len(), 1);
        assert_eq!(desk.all_tickets(None).unwrap().len(), 3);

        desk.set_status(STAFF, Role::Staff, mine, TicketStatus::Resolved)
            .unwrap();
        let resolved = desk.all_tickets(Some(TicketStatus::Resolved)).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].id, mine);
    }

    #[test]
    fn unknown_ticket_is_not_found() {
        let desk = desk_with_credits(1);
        let result = desk.ticket(CUSTOMER, Role::Customer, 999);
        assert!(matches!(result, Err(DeskError::TicketNotFound(999))));
    }

    #[test]
    fn catalog_can_be_replaced() {
        let mut desk = desk_with_credits(10);
        desk.set_ticket_types(vec![TicketType {
            id: "emergency".to_string(),
            label: "Emergency - 5 Credits".to_string(),
            credits: 5,
        }])
        .unwrap();

        // Old types are gone, new type works.
        assert!(matches!(
            desk.create_ticket(request("small_fix")),
            Err(DeskError::UnknownTicketType(_))
        ));
        let outcome = desk.create_ticket(request("emergency")).unwrap();
        assert!(outcome.ticket().is_some());
        assert_eq!(desk.ledger().get_balance(CUSTOMER).unwrap(), 5);
    }
}
