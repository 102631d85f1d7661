//! # Vault Module — Credential Encryption at Rest
//!
//! Customers hand the helpdesk the keys to their websites: admin usernames,
//! passwords, access notes. This module is why none of that ever reaches
//! disk in plaintext.
//!
//! ```text
//! key.rs         — the install-wide EncryptionKey: generated once,
//!                  persisted base64-encoded, never rotated, never
//!                  overwritten
//! credentials.rs — CredentialVault + the per-ticket credential record,
//!                  field-wise encrypt/decrypt
//! ```
//!
//! ## Design Principles
//!
//! 1. **The key is a value, not a global.** The embedding application loads
//!    it once at startup and injects it into [`CredentialVault::new`].
//!    Nothing in this crate reaches for hidden static state.
//!
//! 2. **Absent is not empty.** A credential field the customer never filled
//!    in stays `None` through encryption and back. An encrypted empty
//!    string would claim the customer supplied something; that's a lie we
//!    don't store.
//!
//! 3. **Decryption failures are loud.** A wrong key or corrupted record is
//!    a reported error, never an empty string a dashboard could mistake
//!    for "field intentionally blank".

pub mod credentials;
pub mod key;

pub use credentials::{
    CredentialFields, CredentialRecord, CredentialVault, EncryptedFields, VaultError,
};
pub use key::{EncryptionKey, KeyError};
