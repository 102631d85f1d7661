//! # Encryption Key Management
//!
//! One 256-bit key per installation, generated from the OS CSPRNG the
//! first time anything needs it, persisted base64-encoded in the settings
//! store, and reused for every encrypt/decrypt for the lifetime of the
//! install. No rotation, no versioning — an accepted scope limitation,
//! traded for the operational simplicity of never having to answer
//! "which key was this row written under?"
//!
//! ## The first-call race
//!
//! Two requests can both find no key persisted and both generate one. The
//! settings store's insert-if-absent CAS picks exactly one winner; the
//! loser discards its candidate and adopts the winner's key. An existing
//! key is never overwritten — overwriting would orphan every ciphertext
//! already at rest.
//!
//! ## Security considerations
//!
//! - Key bytes are never logged. `Debug` prints a blake3 fingerprint. If
//!   you add key-material logging to this module, you will be asked to
//!   leave.
//! - Equality comparison exists for tests and idempotence checks, not for
//!   authentication decisions, so constant-time comparison is not needed.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use std::fmt;
use thiserror::Error;

use crate::config::{ENCRYPTION_KEY_SETTING, KEY_LENGTH};
use crate::storage::{DbError, DeskDb};

/// Errors that can occur while loading or creating the encryption key.
#[derive(Debug, Error)]
pub enum KeyError {
    /// The settings store couldn't be read or written. Fatal for any
    /// encrypt/decrypt in the current request.
    #[error("encryption key unavailable: {0}")]
    Unavailable(#[from] DbError),

    /// The persisted key didn't decode to exactly 32 bytes. Somebody
    /// edited the settings store by hand.
    #[error("persisted encryption key is malformed")]
    Malformed,
}

/// The install-wide AES-256 key.
///
/// Construct with [`EncryptionKey::load_or_generate`] in production code;
/// [`EncryptionKey::generate`] exists for tests and for bootstrapping a
/// fresh store explicitly.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey([u8; KEY_LENGTH]);

impl EncryptionKey {
    /// Generate a fresh random key from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LENGTH];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Decode a key from its persisted base64 form.
    pub fn from_base64(encoded: &str) -> Result<Self, KeyError> {
        let bytes = BASE64.decode(encoded).map_err(|_| KeyError::Malformed)?;
        let bytes: [u8; KEY_LENGTH] = bytes.try_into().map_err(|_| KeyError::Malformed)?;
        Ok(Self(bytes))
    }

    /// Encode the key for persistence.
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    /// Raw key bytes, for the cipher layer only.
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }

    /// A short, log-safe identifier for this key: the first 8 bytes of its
    /// blake3 hash, hex-encoded. Enough to tell two keys apart in logs,
    /// useless for recovering the key.
    pub fn fingerprint(&self) -> String {
        hex::encode(&blake3::hash(&self.0).as_bytes()[..8])
    }

    /// Load the installation's key, generating and persisting it if this
    /// is the first call ever.
    ///
    /// Idempotent and race-safe: concurrent first calls all return the
    /// same key, and a previously persisted key is never replaced.
    pub fn load_or_generate(db: &DeskDb) -> Result<Self, KeyError> {
        if let Some(encoded) = db.get_setting(ENCRYPTION_KEY_SETTING)? {
            let key = Self::from_base64(&encoded)?;
            tracing::debug!(fingerprint = %key.fingerprint(), "loaded encryption key");
            return Ok(key);
        }

        let candidate = Self::generate();
        let stored = db.setting_insert_if_absent(ENCRYPTION_KEY_SETTING, &candidate.to_base64())?;
        let key = Self::from_base64(&stored)?;

        if key == candidate {
            tracing::info!(fingerprint = %key.fingerprint(), "generated new encryption key");
        } else {
            // Lost the first-call race; the winner's key is the key.
            tracing::debug!(fingerprint = %key.fingerprint(), "adopted concurrently generated key");
        }
        Ok(key)
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EncryptionKey")
            .field(&self.fingerprint())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_produces_distinct_keys() {
        let a = EncryptionKey::generate();
        let b = EncryptionKey::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn base64_roundtrip() {
        let key = EncryptionKey::generate();
        let encoded = key.to_base64();
        let decoded = EncryptionKey::from_base64(&encoded).unwrap();
        assert_eq!(decoded, key);
    }

    #[test]
    fn from_base64_rejects_garbage() {
        assert!(matches!(
            EncryptionKey::from_base64("not base64!!!"),
            Err(KeyError::Malformed)
        ));
    }

    #[test]
    fn from_base64_rejects_wrong_length() {
        // Valid base64, wrong number of bytes.
        let short = BASE64.encode([0u8; 16]);
        assert!(matches!(
            EncryptionKey::from_base64(&short),
            Err(KeyError::Malformed)
        ));
    }

    #[test]
    fn load_or_generate_is_idempotent() {
        let db = DeskDb::open_temporary().unwrap();

        let first = EncryptionKey::load_or_generate(&db).unwrap();
        let second = EncryptionKey::load_or_generate(&db).unwrap();
        assert_eq!(first, second);

        // The persisted value is exactly the first key's encoding.
        let stored = db.get_setting(ENCRYPTION_KEY_SETTING).unwrap().unwrap();
        assert_eq!(stored, first.to_base64());
    }

    #[test]
    fn load_never_overwrites_existing_key() {
        let db = DeskDb::open_temporary().unwrap();

        let original = EncryptionKey::generate();
        db.put_setting(ENCRYPTION_KEY_SETTING, &original.to_base64())
            .unwrap();

        let loaded = EncryptionKey::load_or_generate(&db).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn concurrent_first_calls_agree_on_one_key() {
        use std::sync::Arc;
        use std::thread;

        let db = Arc::new(DeskDb::open_temporary().unwrap());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let db = Arc::clone(&db);
                thread::spawn(move || EncryptionKey::load_or_generate(&db).unwrap().to_base64())
            })
            .collect();

        let keys: Vec<String> = handles
            .into_iter()
            .map(|h| h.join().expect("key thread should not panic"))
            .collect();

        // Every caller got the same key, and it's the one persisted.
        let stored = db.get_setting(ENCRYPTION_KEY_SETTING).unwrap().unwrap();
        assert!(keys.iter().all(|k| *k == stored));
    }

    #[test]
    fn malformed_persisted_key_is_an_error() {
        let db = DeskDb::open_temporary().unwrap();
        db.put_setting(ENCRYPTION_KEY_SETTING, "dGhpcyBpcyBub3QgYSBrZXk=")
            .unwrap();

        assert!(matches!(
            EncryptionKey::load_or_generate(&db),
            Err(KeyError::Malformed)
        ));
    }

    #[test]
    fn debug_does_not_leak_key_material() {
        let key = EncryptionKey::generate();
        let debug = format!("{key:?}");
        assert!(!debug.contains(&key.to_base64()));
        assert!(debug.contains(&key.fingerprint()));
    }
}
