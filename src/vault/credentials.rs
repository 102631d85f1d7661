//! # Credential Vault
//!
//! Encrypts and decrypts the sensitive fields of a ticket's credential
//! record: username, password, and access notes. The site and admin URLs
//! are deliberately stored in the clear — they're addresses, not secrets,
//! and staff need to eyeball them in listings without a decrypt round-trip.
//!
//! Each field is encrypted independently with a fresh random nonce, so two
//! tickets sharing the same admin password (it happens more than anyone
//! would like) produce unrelated ciphertexts. The on-disk form of a field
//! is `base64(nonce || ciphertext || tag)`.
//!
//! ## Empty vs. absent
//!
//! A field the customer never supplied is `None` and stays `None`; an
//! empty string supplied by a form is normalized to `None` before
//! encryption. [`CredentialVault::encrypt`] itself maps the empty string
//! to an empty string without touching the cipher, so the two layers agree:
//! no ciphertext is ever manufactured for content that doesn't exist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::crypto::{self, CipherError};
use crate::vault::key::EncryptionKey;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur inside the credential vault.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Encryption itself failed. With a well-formed key this should never
    /// happen; treated as fatal for the request.
    #[error("credential encryption failed")]
    Encryption,

    /// The ciphertext didn't decrypt: wrong key, corruption, or
    /// truncation. Deliberately indistinguishable from one another, but
    /// always distinguishable from "field absent".
    #[error("credential decryption failed -- wrong key or corrupted data")]
    Decryption,

    /// The stored value wasn't valid base64.
    #[error("stored ciphertext is not valid base64")]
    Encoding,

    /// The decrypted bytes weren't valid UTF-8. The vault only ever
    /// encrypts strings, so this means the record was tampered with.
    #[error("decrypted credential is not valid UTF-8")]
    NotUtf8,
}

impl From<CipherError> for VaultError {
    fn from(err: CipherError) -> Self {
        match err {
            CipherError::SealFailed => VaultError::Encryption,
            CipherError::OpenFailed | CipherError::CiphertextTooShort => VaultError::Decryption,
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Plaintext credential fields, as supplied by the customer or returned
/// to an authorized viewer. Each field is independently optional.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CredentialFields {
    /// Site admin username.
    pub username: Option<String>,
    /// Site admin password.
    pub password: Option<String>,
    /// Free-form access notes (2FA hints, staging URLs, and so on).
    pub notes: Option<String>,
}

impl CredentialFields {
    /// Returns `true` when no field carries content.
    pub fn is_empty(&self) -> bool {
        non_empty(&self.username).is_none()
            && non_empty(&self.password).is_none()
            && non_empty(&self.notes).is_none()
    }
}

/// The encrypted counterparts of [`CredentialFields`]. A field absent on
/// input is absent here too.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncryptedFields {
    pub username_ciphertext: Option<String>,
    pub password_ciphertext: Option<String>,
    pub notes_ciphertext: Option<String>,
}

/// The per-ticket credential record as persisted.
///
/// At most one exists per ticket; saving again overwrites it (the flow
/// layer preserves `created_at` across overwrites). The URLs are
/// cleartext by design; everything sensitive is ciphertext.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// The ticket this record is attached to.
    pub ticket_id: u64,

    /// The customer who supplied the credentials.
    pub owner: u64,

    /// The website the ticket is about.
    pub site_url: String,

    /// The site's admin login URL.
    pub admin_url: String,

    /// Encrypted username, if one was supplied.
    pub username_ciphertext: Option<String>,

    /// Encrypted password, if one was supplied.
    pub password_ciphertext: Option<String>,

    /// Encrypted notes, if any were supplied.
    pub notes_ciphertext: Option<String>,

    /// When credentials were first saved for this ticket.
    pub created_at: DateTime<Utc>,

    /// When they were last overwritten.
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// CredentialVault
// ---------------------------------------------------------------------------

/// Field-level encryption for credential records.
///
/// Holds the install-wide [`EncryptionKey`] by value — the key is injected
/// at construction, loaded once by the embedding application. Encryption
/// and decryption are pure, synchronous computations; the vault has no
/// connection to storage and no mutable state.
#[derive(Debug, Clone)]
pub struct CredentialVault {
    key: EncryptionKey,
}

impl CredentialVault {
    /// Creates a vault around an already-loaded key
    /// (see [`EncryptionKey::load_or_generate`]).
    pub fn new(key: EncryptionKey) -> Self {
        Self { key }
    }

    /// Encrypt one string field.
    ///
    /// The empty string maps to the empty string — no nonce is drawn, no
    /// cipher work is done. Everything else becomes
    /// `base64(nonce || ciphertext || tag)` under a nonce that is fresh
    /// for this call; encrypting the same input twice yields different
    /// outputs.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, VaultError> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let sealed = crypto::seal(self.key.as_bytes(), plaintext.as_bytes())?;
        Ok(BASE64.encode(sealed))
    }

    /// Decrypt one string field produced by [`encrypt`](Self::encrypt).
    ///
    /// The empty string maps to the empty string. Anything else must
    /// decode and decrypt cleanly or the call fails — a garbled value is
    /// never returned as if it were the stored plaintext.
    pub fn decrypt(&self, ciphertext: &str) -> Result<String, VaultError> {
        if ciphertext.is_empty() {
            return Ok(String::new());
        }

        let sealed = BASE64
            .decode(ciphertext)
            .map_err(|_| VaultError::Encoding)?;
        let plaintext = crypto::open(self.key.as_bytes(), &sealed)?;
        String::from_utf8(plaintext).map_err(|_| VaultError::NotUtf8)
    }

    /// Encrypt each present field independently.
    ///
    /// Absent fields stay absent; fields holding an empty string are
    /// treated as absent rather than encrypted.
    pub fn encrypt_fields(&self, fields: &CredentialFields) -> Result<EncryptedFields, VaultError> {
        Ok(EncryptedFields {
            username_ciphertext: self.encrypt_opt(non_empty(&fields.username))?,
            password_ciphertext: self.encrypt_opt(non_empty(&fields.password))?,
            notes_ciphertext: self.encrypt_opt(non_empty(&fields.notes))?,
        })
    }

    /// Decrypt each present ciphertext field of a stored record.
    ///
    /// Absent fields stay absent. Any present field that fails to decrypt
    /// fails the whole call — partial credentials would be worse than an
    /// honest error.
    pub fn decrypt_fields(&self, record: &CredentialRecord) -> Result<CredentialFields, VaultError> {
        Ok(CredentialFields {
            username: self.decrypt_opt(record.username_ciphertext.as_deref())?,
            password: self.decrypt_opt(record.password_ciphertext.as_deref())?,
            notes: self.decrypt_opt(record.notes_ciphertext.as_deref())?,
        })
    }

    fn encrypt_opt(&self, field: Option<&str>) -> Result<Option<String>, VaultError> {
        field.map(|value| self.encrypt(value)).transpose()
    }

    fn decrypt_opt(&self, field: Option<&str>) -> Result<Option<String>, VaultError> {
        field.map(|value| self.decrypt(value)).transpose()
    }
}

/// Treats `None` and `Some("")` identically: no content.
fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|value| !value.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
