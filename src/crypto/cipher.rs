//! # AES-256-GCM Sealing
//!
//! Authenticated encryption for credential fields at rest. We use
//! AES-256-GCM because:
//!
//! - It's an AEAD cipher — authentication and encryption in one operation.
//!   A wrong key, a truncated record, or a flipped bit fails loudly at
//!   decrypt time instead of handing the caller plausible-looking garbage.
//! - AES-NI hardware acceleration is available on every modern x86 CPU and
//!   most ARM chips. Performance is essentially free.
//! - 256-bit keys provide a comfortable security margin for data that may
//!   sit on disk for years.
//!
//! ## Nonce management
//!
//! GCM is notoriously unforgiving about nonce reuse. Encrypt two messages
//! with the same key and nonce and an attacker can recover the XOR of the
//! plaintexts AND forge authentication tags. So: a fresh random 96-bit
//! nonce from the OS CSPRNG on every single call. Many tickets reuse the
//! same admin password; random nonces are what keep those ciphertexts from
//! advertising the fact.
//!
//! ## Wire format
//!
//! [`seal`] returns `nonce || ciphertext` as a single `Vec<u8>`. The first
//! 12 bytes are the nonce, the rest is the ciphertext plus the 16-byte auth
//! tag. [`open`] expects this same format.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use thiserror::Error;

use crate::config::{KEY_LENGTH, NONCE_LENGTH};

/// Errors that can occur while sealing or opening a buffer.
///
/// We intentionally keep these vague. Detailed error messages about
/// cryptographic failures are a gift to attackers. The difference between
/// "wrong key" and "corrupted ciphertext" is none of their business.
#[derive(Debug, Error)]
pub enum CipherError {
    #[error("encryption failed")]
    SealFailed,

    #[error("decryption failed -- wrong key or corrupted ciphertext")]
    OpenFailed,

    #[error("ciphertext too short: must be at least {NONCE_LENGTH} bytes")]
    CiphertextTooShort,
}

/// Encrypt a buffer with AES-256-GCM under a fresh random nonce.
///
/// Returns `nonce || ciphertext` as a single `Vec<u8>`. The ciphertext
/// includes the 16-byte GCM authentication tag appended by the cipher.
///
/// # Arguments
///
/// * `key` — 32-byte AES-256 key. Must be cryptographically random.
/// * `plaintext` — The data to encrypt. Can be any length, including zero
///   (the vault layer short-circuits empty inputs before reaching here,
///   but sealing an empty buffer is still well-defined).
pub fn seal(key: &[u8; KEY_LENGTH], plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CipherError::SealFailed)?;

    let mut nonce_bytes = [0u8; NONCE_LENGTH];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CipherError::SealFailed)?;

    // Pack nonce || ciphertext into a single buffer so the caller never
    // has to manage the nonce separately.
    let mut out = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a buffer previously produced by [`seal`].
///
/// Expects `nonce || ciphertext` format (12-byte nonce prefix followed by
/// ciphertext + auth tag).
///
/// # Errors
///
/// Returns [`CipherError::OpenFailed`] if the key is wrong or the
/// ciphertext has been modified (bit flip, truncation past the nonce,
/// etc.). We don't distinguish between these cases on purpose.
pub fn open(key: &[u8; KEY_LENGTH], data: &[u8]) -> Result<Vec<u8>, CipherError> {
    if data.len() < NONCE_LENGTH {
        return Err(CipherError::CiphertextTooShort);
    }

    let (nonce_bytes, ciphertext) = data.split_at(NONCE_LENGTH);
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CipherError::OpenFailed)?;
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CipherError::OpenFailed)
}
