//! AES-256-GCM encryption/decryption
//!
//! Provides authenticated encryption for credentials at rest and for sealed
//! configuration exports. Each encryption generates a unique nonce.

use aes_gcm::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use zeroize::Zeroize;

use super::key_derivation::{EncryptionKey, KeyDerivationParams};
use crate::error::{BillPayError, BillPayResult};

/// Size of the AES-GCM nonce in bytes (96 bits)
const NONCE_SIZE: usize = 12;

/// Encrypted data with associated metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedData {
    /// Nonce (base64)
    pub nonce: String,
    /// Ciphertext with authentication tag (base64)
    pub ciphertext: String,
    #[serde(default = "default_version")]
    pub version: u8,
    /// Present when the key came from a passphrase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kdf: Option<KeyDerivationParams>,
}

fn default_version() -> u8 {
    1
}

impl EncryptedData {
    fn decode(&self, field: &str, value: &str) -> BillPayResult<Vec<u8>> {
        STANDARD
            .decode(value)
            .map_err(|e| BillPayError::Encryption(format!("Invalid {} encoding: {}", field, e)))
    }
}

fn cipher(key: &EncryptionKey) -> BillPayResult<Aes256Gcm> {
    Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| BillPayError::Encryption(format!("Failed to create cipher: {}", e)))
}

/// Encrypt bytes with a fresh random nonce
pub fn encrypt(plaintext: &[u8], key: &EncryptionKey) -> BillPayResult<EncryptedData> {
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = cipher(key)?
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| BillPayError::Encryption(format!("Encryption failed: {}", e)))?;

    Ok(EncryptedData {
        nonce: STANDARD.encode(nonce_bytes),
        ciphertext: STANDARD.encode(ciphertext),
        version: 1,
        kdf: None,
    })
}

/// Decrypt and authenticate
pub fn decrypt(encrypted: &EncryptedData, key: &EncryptionKey) -> BillPayResult<Vec<u8>> {
    if encrypted.version != 1 {
        return Err(BillPayError::Encryption(format!(
            "Unsupported encryption version: {}",
            encrypted.version
        )));
    }

    let nonce_bytes = encrypted.decode("nonce", &encrypted.nonce)?;
    if nonce_bytes.len() != NONCE_SIZE {
        return Err(BillPayError::Encryption(format!(
            "Invalid nonce size: expected {}, got {}",
            NONCE_SIZE,
            nonce_bytes.len()
        )));
    }
    let ciphertext = encrypted.decode("ciphertext", &encrypted.ciphertext)?;

    cipher(key)?
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
        .map_err(|_| {
            BillPayError::Encryption("Decryption failed: invalid key or corrupted data".to_string())
        })
}

/// Serialize a value to JSON and encrypt it
pub fn seal_json<T: Serialize>(value: &T, key: &EncryptionKey) -> BillPayResult<EncryptedData> {
    let mut plaintext = serde_json::to_vec(value)?;
    let sealed = encrypt(&plaintext, key);
    plaintext.zeroize();
    sealed
}

/// Decrypt and deserialize a JSON value
pub fn open_json<T: DeserializeOwned>(sealed: &EncryptedData, key: &EncryptionKey) -> BillPayResult<T> {
    let mut plaintext = decrypt(sealed, key)?;
    let value = serde_json::from_slice(&plaintext)
        .map_err(|e| BillPayError::Encryption(format!("Decrypted data is not valid JSON: {}", e)));
    plaintext.zeroize();
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encrypt_decrypt() {
        let key = EncryptionKey::generate();
        let encrypted = encrypt(b"partner_code=MOMOBKUN20180529", &key).unwrap();
        assert_eq!(decrypt(&encrypted, &key).unwrap(), b"partner_code=MOMOBKUN20180529");
    }

    #[test]
    fn test_nonces_are_fresh() {
        let key = EncryptionKey::generate();
        let a = encrypt(b"same", &key).unwrap();
        let b = encrypt(b"same", &key).unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_wrong_key_fails() {
        let encrypted = encrypt(b"secret", &EncryptionKey::generate()).unwrap();
        let err = decrypt(&encrypted, &EncryptionKey::generate()).unwrap_err();
        assert!(matches!(err, BillPayError::Encryption(_)));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = EncryptionKey::generate();
        let mut encrypted = encrypt(b"secret", &key).unwrap();
        let mut bytes = STANDARD.decode(&encrypted.ciphertext).unwrap();
        bytes[0] ^= 0xFF;
        encrypted.ciphertext = STANDARD.encode(&bytes);
        assert!(decrypt(&encrypted, &key).is_err());
    }

    #[test]
    fn test_unknown_version_rejected() {
        let key = EncryptionKey::generate();
        let mut encrypted = encrypt(b"x", &key).unwrap();
        encrypted.version = 2;
        assert!(decrypt(&encrypted, &key).is_err());
    }

    #[test]
    fn test_seal_and_open_json() {
        let key = EncryptionKey::generate();
        let value = json!({"momo_api": {"secret_key": "at67qH6mk8w5Y1nAyMoYKMWACiEi2bsa"}});
        let sealed = seal_json(&value, &key).unwrap();
        assert!(!sealed.ciphertext.contains("at67qH6"));
        let opened: serde_json::Value = open_json(&sealed, &key).unwrap();
        assert_eq!(opened, value);
    }
}
