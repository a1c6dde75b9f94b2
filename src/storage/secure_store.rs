//! Encrypted credential store
//!
//! Provider credentials live in `secure_config.dat` as AES-256-GCM sealed
//! JSON, keyed by a random 256-bit key in `key.key`. Both files are written
//! owner-only. The plaintext layout is one `<provider>_api` section per
//! configured provider.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::paths::BillPayPaths;
use crate::crypto::{open_json, seal_json, EncryptedData, EncryptionKey};
use crate::error::{BillPayError, BillPayResult};
use crate::models::{Credential, Environment, ProviderId};

use super::file_io::{read_json_required, remove_if_exists, write_bytes_atomic, FileMode};

/// Credentials for every configured provider, decrypted in memory
pub struct SecureStore {
    data_path: PathBuf,
    key_path: PathBuf,
    credentials: BTreeMap<ProviderId, Credential>,
}

impl SecureStore {
    /// Open the store under the billpay base directory and load it
    pub fn open(paths: &BillPayPaths) -> BillPayResult<Self> {
        let mut store = Self {
            data_path: paths.secure_config_file(),
            key_path: paths.key_file(),
            credentials: BTreeMap::new(),
        };
        store.load()?;
        Ok(store)
    }

    /// Re-read credentials from disk; a missing file means none are configured
    pub fn load(&mut self) -> BillPayResult<()> {
        self.credentials.clear();
        if !self.data_path.exists() {
            return Ok(());
        }
        if !self.key_path.exists() {
            return Err(BillPayError::Storage(format!(
                "Key file {} is missing; stored credentials cannot be decrypted",
                self.key_path.display()
            )));
        }

        let key = self.read_key()?;
        let sealed: EncryptedData = read_json_required(&self.data_path)?;
        let sections: BTreeMap<String, Credential> = open_json(&sealed, &key)?;

        for (section, credential) in sections {
            if section != credential.provider.config_key() {
                tracing::warn!(section = %section, "ignoring mislabelled credential section");
                continue;
            }
            self.credentials.insert(credential.provider, credential);
        }
        tracing::debug!(count = self.credentials.len(), "credentials loaded");
        Ok(())
    }

    /// Encrypt and write all credentials, creating the key on first use
    pub fn save(&self) -> BillPayResult<()> {
        let key = self.load_or_create_key()?;
        let sealed = seal_json(&self.sections(), &key)?;
        let bytes = serde_json::to_vec_pretty(&sealed)?;
        write_bytes_atomic(&self.data_path, &bytes, FileMode::OwnerOnly)?;
        tracing::info!(count = self.credentials.len(), "credentials saved");
        Ok(())
    }

    fn sections(&self) -> BTreeMap<String, &Credential> {
        self.credentials
            .values()
            .map(|c| (c.provider.config_key(), c))
            .collect()
    }

    fn read_key(&self) -> BillPayResult<EncryptionKey> {
        let encoded = std::fs::read_to_string(&self.key_path)
            .map_err(|e| BillPayError::Storage(format!("Failed to read key file: {}", e)))?;
        EncryptionKey::from_base64(&encoded)
    }

    fn load_or_create_key(&self) -> BillPayResult<EncryptionKey> {
        if self.key_path.exists() {
            return self.read_key();
        }
        let key = EncryptionKey::generate();
        write_bytes_atomic(&self.key_path, key.to_base64().as_bytes(), FileMode::OwnerOnly)?;
        tracing::info!(path = %self.key_path.display(), "created credential key");
        Ok(key)
    }

    /// Stored credential for a provider
    pub fn get_credential(&self, provider: ProviderId) -> Option<&Credential> {
        self.credentials.get(&provider)
    }

    /// Stored credential, or an empty one in the given environment
    pub fn credential_or_empty(&self, provider: ProviderId, environment: Environment) -> Credential {
        self.get_credential(provider)
            .cloned()
            .unwrap_or_else(|| Credential::new(provider, environment))
    }

    /// Store (replace) a provider's credential and persist
    pub fn set_credential(&mut self, credential: Credential) -> BillPayResult<()> {
        for name in credential.field_names() {
            credential.validate_field_name(name)?;
        }
        self.credentials.insert(credential.provider, credential);
        self.save()
    }

    /// Remove a provider's credential; returns whether one was stored
    pub fn clear_credential(&mut self, provider: ProviderId) -> BillPayResult<bool> {
        if self.credentials.remove(&provider).is_none() {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// Replace every stored credential at once (used by config import)
    pub fn replace_all(&mut self, credentials: Vec<Credential>) -> BillPayResult<()> {
        self.credentials = credentials.into_iter().map(|c| (c.provider, c)).collect();
        self.save()
    }

    /// Providers with a stored credential, in display order
    pub fn configured_providers(&self) -> Vec<ProviderId> {
        self.credentials.keys().copied().collect()
    }

    pub fn credentials(&self) -> impl Iterator<Item = &Credential> {
        self.credentials.values()
    }

    /// Delete the credential file and its key
    pub fn reset(&mut self) -> BillPayResult<()> {
        self.credentials.clear();
        remove_if_exists(&self.data_path)?;
        remove_if_exists(&self.key_path)?;
        tracing::info!("credential store reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn momo() -> Credential {
        Credential::new(ProviderId::Momo, Environment::Sandbox)
            .with("partner_code", "MOMOBKUN20180529")
            .with("access_key", "klm05TvNBzhg7h7j")
            .with("secret_key", "at67qH6mk8w5Y1nAyMoYKMWACiEi2bsa")
    }

    fn setup() -> (TempDir, BillPayPaths) {
        let temp_dir = TempDir::new().unwrap();
        let paths = BillPayPaths::with_base_dir(temp_dir.path().to_path_buf());
        (temp_dir, paths)
    }

    #[test]
    fn test_empty_store() {
        let (_temp_dir, paths) = setup();
        let store = SecureStore::open(&paths).unwrap();
        assert!(store.configured_providers().is_empty());
        assert!(!paths.secure_config_file().exists());
    }

    #[test]
    fn test_set_and_reload() {
        let (_temp_dir, paths) = setup();
        let mut store = SecureStore::open(&paths).unwrap();
        store.set_credential(momo()).unwrap();

        let reopened = SecureStore::open(&paths).unwrap();
        assert_eq!(reopened.configured_providers(), vec![ProviderId::Momo]);
        assert_eq!(reopened.get_credential(ProviderId::Momo), Some(&momo()));
    }

    #[test]
    fn test_secrets_never_on_disk_in_plaintext() {
        let (_temp_dir, paths) = setup();
        let mut store = SecureStore::open(&paths).unwrap();
        store.set_credential(momo()).unwrap();

        let raw = std::fs::read_to_string(paths.secure_config_file()).unwrap();
        assert!(!raw.contains("at67qH6mk8w5Y1nAyMoYKMWACiEi2bsa"));
        assert!(!raw.contains("MOMOBKUN20180529"));
    }

    #[cfg(unix)]
    #[test]
    fn test_files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let (_temp_dir, paths) = setup();
        let mut store = SecureStore::open(&paths).unwrap();
        store.set_credential(momo()).unwrap();

        for path in [paths.secure_config_file(), paths.key_file()] {
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600, "{}", path.display());
        }
    }

    #[test]
    fn test_unknown_field_rejected() {
        let (_temp_dir, paths) = setup();
        let mut store = SecureStore::open(&paths).unwrap();
        let bad = Credential::new(ProviderId::Bidv, Environment::Sandbox).with("key1", "x");
        assert!(store.set_credential(bad).unwrap_err().is_validation());
    }

    #[test]
    fn test_clear_and_reset() {
        let (_temp_dir, paths) = setup();
        let mut store = SecureStore::open(&paths).unwrap();
        store.set_credential(momo()).unwrap();

        assert!(store.clear_credential(ProviderId::Momo).unwrap());
        assert!(!store.clear_credential(ProviderId::Momo).unwrap());
        assert!(SecureStore::open(&paths).unwrap().configured_providers().is_empty());

        store.set_credential(momo()).unwrap();
        store.reset().unwrap();
        assert!(!paths.secure_config_file().exists());
        assert!(!paths.key_file().exists());
    }

    #[test]
    fn test_missing_key_is_an_error() {
        let (_temp_dir, paths) = setup();
        let mut store = SecureStore::open(&paths).unwrap();
        store.set_credential(momo()).unwrap();
        std::fs::remove_file(paths.key_file()).unwrap();

        assert!(matches!(
            SecureStore::open(&paths),
            Err(BillPayError::Storage(_))
        ));
    }
}
