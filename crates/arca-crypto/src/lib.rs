//! arca-crypto: key handling for Arca backup archives
//!
//! Everything here is derived from one 32-byte root secret:
//!
//! ```text
//! Secret (256-bit, random)
//!   ├── Mnemonic: 24 words, 8 × (32 data bits + 1 check bit)
//!   ├── Stretched key: SHA-256^33(secret)
//!   │   └── Envelope: AES-256-CBC(SHA-256(prefix‖key‖suffix‖salt)), raw deflate, hash trailer
//!   └── key ‖ extra
//!       ├── Password: SHA-256^55555("password:" ‖ ·), class-balanced characters
//!       └── Port: 10000 + next(10000)
//! ```

pub mod codec;
pub mod dictionary;
pub mod digest;
pub mod envelope;
pub mod error;
pub mod mnemonic;
pub mod password;
pub mod secret;

pub use dictionary::Dictionary;
pub use envelope::{open_file, open_payload, seal_payload, FileOutcome, DECRYPTED_MARKER};
pub use error::{CryptoError, CryptoResult};
pub use mnemonic::{v2_checksum, validation_hash, Decoded, Mnemonic, MNEMONIC_WORDS};
pub use password::{encode_password, encode_port, DEFAULT_PASSWORD_LEN};
pub use secret::{KeyMaterial, Secret};

/// Size of the root secret in bytes (256-bit)
pub const SECRET_SIZE: usize = 32;
