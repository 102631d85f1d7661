//! # Configuration & Constants
//!
//! Every magic number in CreditDesk lives here. If you're hardcoding a
//! constant somewhere else, you're doing it wrong and you owe the team
//! coffee.
//!
//! The cipher parameters in particular are load-bearing: ciphertexts
//! already at rest were produced with these lengths, so changing them is
//! a data-migration project, not an edit.

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// AES-256-GCM for symmetric encryption of credential fields. 256-bit keys,
/// 96-bit nonces, 128-bit authentication tags. Authenticated encryption
/// means a wrong key or a flipped bit is a detected failure, never silently
/// returned garbage.
pub const SYMMETRIC_ALGORITHM: &str = "AES-256-GCM";

/// AES-256-GCM key length in bytes.
pub const KEY_LENGTH: usize = 32;

/// AES-256-GCM nonce length in bytes. 96 bits is the standard and the only
/// length you should use. 12 bytes. Not 16. Not 8. Twelve.
pub const NONCE_LENGTH: usize = 12;

/// AES-256-GCM authentication tag length in bytes.
pub const TAG_LENGTH: usize = 16;

// ---------------------------------------------------------------------------
// Settings Keys
// ---------------------------------------------------------------------------

/// Settings-store key holding the base64-encoded install-wide encryption
/// key. Written exactly once per installation and never overwritten.
pub const ENCRYPTION_KEY_SETTING: &str = "encryption_key";

/// Settings-store key holding the ticket-type catalog as a JSON array.
pub const TICKET_TYPES_SETTING: &str = "ticket_types";
