//! Encryption keys
//!
//! Two sources: a random 256-bit key kept in the local key file (protects the
//! credential store), or a key derived from a passphrase with Argon2id (seals
//! exported configuration so it can move between machines).

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::OsRng as AeadRng;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2, Params,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{BillPayError, BillPayResult};

/// Key length for AES-256
pub const KEY_LEN: usize = 32;

/// Parameters for passphrase key derivation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDerivationParams {
    /// Salt (PHC base64)
    pub salt: String,
    /// Memory cost in KiB
    pub memory_cost: u32,
    /// Iterations
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for KeyDerivationParams {
    fn default() -> Self {
        Self {
            salt: String::new(),
            memory_cost: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

impl KeyDerivationParams {
    /// Default costs with a fresh random salt
    pub fn new() -> Self {
        Self {
            salt: SaltString::generate(&mut OsRng).to_string(),
            ..Default::default()
        }
    }

    /// Create params with specific values
    pub fn with_values(salt: String, memory_cost: u32, time_cost: u32, parallelism: u32) -> Self {
        Self {
            salt,
            memory_cost,
            time_cost,
            parallelism,
        }
    }
}

/// A 256-bit AES key, wiped on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    key: [u8; KEY_LEN],
}

impl EncryptionKey {
    /// Fresh random key from the OS generator
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        AeadRng.fill_bytes(&mut key);
        Self { key }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    /// Encode for the key file
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.key)
    }

    /// Decode a key file's contents
    pub fn from_base64(encoded: &str) -> BillPayResult<Self> {
        let mut bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| BillPayError::Encryption(format!("Invalid key encoding: {}", e)))?;
        if bytes.len() != KEY_LEN {
            let len = bytes.len();
            bytes.zeroize();
            return Err(BillPayError::Encryption(format!(
                "Invalid key length: expected {}, got {}",
                KEY_LEN, len
            )));
        }
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&bytes);
        bytes.zeroize();
        Ok(Self { key })
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey([REDACTED])")
    }
}

/// Derive a key from a passphrase with Argon2id
pub fn derive_key(passphrase: &str, params: &KeyDerivationParams) -> BillPayResult<EncryptionKey> {
    if passphrase.is_empty() {
        return Err(BillPayError::Validation("Passphrase must not be empty".into()));
    }
    let salt = SaltString::from_b64(&params.salt)
        .map_err(|e| BillPayError::Encryption(format!("Invalid salt: {}", e)))?;

    let argon2_params = Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| BillPayError::Encryption(format!("Invalid Argon2 parameters: {}", e)))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, argon2_params);

    let hash = argon2
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| BillPayError::Encryption(format!("Key derivation failed: {}", e)))?;
    let output = hash
        .hash
        .ok_or_else(|| BillPayError::Encryption("No hash output generated".to_string()))?;

    let bytes = output.as_bytes();
    if bytes.len() < KEY_LEN {
        return Err(BillPayError::Encryption(
            "Hash output too short for AES-256 key".to_string(),
        ));
    }
    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&bytes[..KEY_LEN]);
    Ok(EncryptionKey { key })
}

#[cfg(test)]
pub(crate) fn fast_params() -> KeyDerivationParams {
    KeyDerivationParams::with_values(SaltString::generate(&mut OsRng).to_string(), 1024, 1, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_keys_differ() {
        let a = EncryptionKey::generate();
        let b = EncryptionKey::generate();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_base64_round_trip_and_bad_length() {
        let key = EncryptionKey::generate();
        let decoded = EncryptionKey::from_base64(&key.to_base64()).unwrap();
        assert_eq!(key.as_bytes(), decoded.as_bytes());

        assert!(EncryptionKey::from_base64(&STANDARD.encode([0u8; 16])).is_err());
        assert!(EncryptionKey::from_base64("%%%").is_err());
    }

    #[test]
    fn test_same_passphrase_same_key() {
        let params = fast_params();
        let k1 = derive_key("mat khau", &params).unwrap();
        let k2 = derive_key("mat khau", &params).unwrap();
        let k3 = derive_key("mat khau!", &params).unwrap();
        assert_eq!(k1.as_bytes(), k2.as_bytes());
        assert_ne!(k1.as_bytes(), k3.as_bytes());
    }

    #[test]
    fn test_different_salt_different_key() {
        let k1 = derive_key("same", &fast_params()).unwrap();
        let k2 = derive_key("same", &fast_params()).unwrap();
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_empty_passphrase_rejected() {
        assert!(derive_key("", &fast_params()).unwrap_err().is_validation());
    }

    #[test]
    fn test_debug_is_redacted() {
        assert_eq!(format!("{:?}", EncryptionKey::generate()), "EncryptionKey([REDACTED])");
    }
}
