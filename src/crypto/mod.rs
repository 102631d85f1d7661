//! # Crypto Module — Sealing Primitives
//!
//! Low-level symmetric encryption used by the credential vault. One cipher,
//! one wire format, no options to get wrong:
//!
//! ```text
//! cipher.rs — AES-256-GCM seal/open over nonce || ciphertext buffers
//! ```
//!
//! Everything here works on raw bytes. Text encoding (base64) and the
//! string-level empty-input rules live one layer up in [`crate::vault`],
//! which is the only intended caller.

pub mod cipher;

pub use cipher::{open, seal, CipherError};
