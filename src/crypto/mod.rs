//! Cryptographic functions for billpay
//!
//! AES-256-GCM for the credential store (random key in the key file) and for
//! passphrase-sealed exports (Argon2id-derived key), plus zeroizing strings
//! for secrets held in memory.

pub mod encryption;
pub mod key_derivation;
pub mod secure_memory;

pub use encryption::{decrypt, encrypt, open_json, seal_json, EncryptedData};
pub use key_derivation::{derive_key, EncryptionKey, KeyDerivationParams};
pub use secure_memory::{mask, SecureString};
