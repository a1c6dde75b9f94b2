//! Configuration export, import and backup
//!
//! An export is the settings file with the export metadata alongside. Provider
//! credentials are added under `secure_config` only when the caller asks for
//! them; with a passphrase they are sealed with an Argon2id-derived key,
//! otherwise they are written as-is to an owner-only file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{BillPayPaths, Settings};
use crate::crypto::{derive_key, open_json, seal_json, EncryptedData, KeyDerivationParams};
use crate::error::{BillPayError, BillPayResult};
use crate::models::Credential;
use crate::storage::file_io::{read_json_required, write_bytes_atomic, FileMode};
use crate::storage::SecureStore;

/// Current export schema version
pub const EXPORT_SCHEMA_VERSION: &str = "1.0.0";

/// Credentials inside an export
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SecureSection {
    /// Encrypted with a passphrase-derived key
    Sealed { sealed: EncryptedData },
    /// `<provider>_api` sections in the clear
    Plain(BTreeMap<String, Credential>),
}

/// On-disk export layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigExport {
    #[serde(default = "default_schema")]
    pub export_version: String,

    #[serde(default = "Utc::now")]
    pub exported_at: DateTime<Utc>,

    #[serde(default)]
    pub app_version: String,

    #[serde(flatten)]
    pub settings: Settings,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure_config: Option<SecureSection>,
}

fn default_schema() -> String {
    EXPORT_SCHEMA_VERSION.to_string()
}

/// What an export wrote
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub credentials: usize,
    pub sealed: bool,
}

/// What an import restored
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportSummary {
    pub settings: Settings,
    pub credentials: usize,
}

/// Write settings, and credentials when `include_secure` is set
pub fn export_config(
    path: &Path,
    settings: &Settings,
    store: &SecureStore,
    include_secure: bool,
    passphrase: Option<&str>,
) -> BillPayResult<ExportSummary> {
    if passphrase.is_some() && !include_secure {
        return Err(BillPayError::Validation(
            "A passphrase only applies when secure data is included".into(),
        ));
    }

    let (secure_config, credentials) = if include_secure {
        let sections: BTreeMap<String, Credential> = store
            .credentials()
            .map(|c| (c.provider.config_key(), c.clone()))
            .collect();
        let count = sections.len();
        let section = match passphrase {
            Some(passphrase) => {
                let params = KeyDerivationParams::new();
                let key = derive_key(passphrase, &params)?;
                let mut sealed = seal_json(&sections, &key)?;
                sealed.kdf = Some(params);
                SecureSection::Sealed { sealed }
            }
            None => SecureSection::Plain(sections),
        };
        (Some(section), count)
    } else {
        (None, 0)
    };

    let sealed = matches!(secure_config, Some(SecureSection::Sealed { .. }));
    let plain_secrets = matches!(secure_config, Some(SecureSection::Plain(_)));
    let export = ConfigExport {
        export_version: default_schema(),
        exported_at: Utc::now(),
        app_version: env!("CARGO_PKG_VERSION").to_string(),
        settings: settings.clone(),
        secure_config,
    };

    let bytes = serde_json::to_vec_pretty(&export)
        .map_err(|e| BillPayError::Export(format!("Failed to serialize export: {}", e)))?;
    let mode = if plain_secrets {
        FileMode::OwnerOnly
    } else {
        FileMode::Shared
    };
    write_bytes_atomic(path, &bytes, mode)?;

    tracing::info!(path = %path.display(), credentials, sealed, "configuration exported");
    Ok(ExportSummary {
        path: path.to_path_buf(),
        credentials,
        sealed,
    })
}

/// Read an export; sealed credentials need the passphrase they were sealed with
pub fn read_export(path: &Path, passphrase: Option<&str>) -> BillPayResult<(Settings, Option<Vec<Credential>>)> {
    let export: ConfigExport = read_json_required(path)
        .map_err(|e| BillPayError::Import(format!("Cannot read {}: {}", path.display(), e)))?;

    let credentials = match export.secure_config {
        None => None,
        Some(SecureSection::Plain(sections)) => Some(checked_sections(sections)?),
        Some(SecureSection::Sealed { sealed }) => {
            let passphrase = passphrase.ok_or_else(|| {
                BillPayError::Validation("This export is sealed; a passphrase is required".into())
            })?;
            let params = sealed.kdf.clone().ok_or_else(|| {
                BillPayError::Encryption("Sealed export has no key derivation parameters".into())
            })?;
            let key = derive_key(passphrase, &params)?;
            let sections: BTreeMap<String, Credential> = open_json(&sealed, &key)?;
            Some(checked_sections(sections)?)
        }
    };
    Ok((export.settings, credentials))
}

fn checked_sections(sections: BTreeMap<String, Credential>) -> BillPayResult<Vec<Credential>> {
    sections
        .into_iter()
        .map(|(section, credential)| {
            if section != credential.provider.config_key() {
                return Err(BillPayError::Import(format!(
                    "Section '{}' holds a {} credential",
                    section, credential.provider
                )));
            }
            for name in credential.field_names() {
                credential.validate_field_name(name)?;
            }
            Ok(credential)
        })
        .collect()
}

/// Restore settings and, if the export carries them, credentials
pub fn import_config(
    path: &Path,
    paths: &BillPayPaths,
    store: &mut SecureStore,
    passphrase: Option<&str>,
) -> BillPayResult<ImportSummary> {
    let (settings, credentials) = read_export(path, passphrase)?;

    settings.save(paths)?;
    let count = match credentials {
        Some(credentials) => {
            let count = credentials.len();
            store.replace_all(credentials)?;
            count
        }
        None => 0,
    };

    tracing::info!(path = %path.display(), credentials = count, "configuration imported");
    Ok(ImportSummary {
        settings,
        credentials: count,
    })
}

/// Write a timestamped export including credentials into `backup_dir`
pub fn backup_config(
    backup_dir: &Path,
    settings: &Settings,
    store: &SecureStore,
    passphrase: Option<&str>,
) -> BillPayResult<ExportSummary> {
    let name = format!(
        "billpay_config_backup_{}.json",
        Local::now().format("%Y%m%d_%H%M%S")
    );
    export_config(&backup_dir.join(name), settings, store, true, passphrase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Environment, ProviderId};
    use tempfile::TempDir;

    const SECRET: &str = "at67qH6mk8w5Y1nAyMoYKMWACiEi2bsa";

    fn setup() -> (TempDir, BillPayPaths, SecureStore) {
        let temp_dir = TempDir::new().unwrap();
        let paths = BillPayPaths::with_base_dir(temp_dir.path().join("home"));
        let mut store = SecureStore::open(&paths).unwrap();
        store
            .set_credential(
                Credential::new(ProviderId::Momo, Environment::Sandbox)
                    .with("partner_code", "MOMOBKUN20180529")
                    .with("access_key", "klm05TvNBzhg7h7j")
                    .with("secret_key", SECRET),
            )
            .unwrap();
        (temp_dir, paths, store)
    }

    fn fresh_target(temp_dir: &TempDir) -> (BillPayPaths, SecureStore) {
        let paths = BillPayPaths::with_base_dir(temp_dir.path().join("other"));
        let store = SecureStore::open(&paths).unwrap();
        (paths, store)
    }

    #[test]
    fn test_export_without_secure_has_no_secrets() {
        let (temp_dir, _paths, store) = setup();
        let path = temp_dir.path().join("export.json");
        let summary = export_config(&path, &Settings::default(), &store, false, None).unwrap();
        assert_eq!(summary.credentials, 0);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"api_settings\""));
        assert!(!raw.contains("secure_config"));
        assert!(!raw.contains(SECRET));
        assert!(!raw.contains("MOMOBKUN20180529"));
    }

    #[test]
    fn test_plain_round_trip() {
        let (temp_dir, _paths, store) = setup();
        let path = temp_dir.path().join("export.json");
        let mut settings = Settings::default();
        settings.api.timeout_secs = 12;
        export_config(&path, &settings, &store, true, None).unwrap();

        let (paths, mut target) = fresh_target(&temp_dir);
        let summary = import_config(&path, &paths, &mut target, None).unwrap();
        assert_eq!(summary.credentials, 1);
        assert_eq!(summary.settings.api.timeout_secs, 12);
        assert_eq!(
            target.get_credential(ProviderId::Momo).unwrap().get("secret_key"),
            Some(SECRET)
        );
        assert_eq!(Settings::load_or_create(&paths).unwrap().api.timeout_secs, 12);
    }

    #[test]
    fn test_sealed_round_trip_needs_passphrase() {
        let (temp_dir, _paths, store) = setup();
        let path = temp_dir.path().join("sealed.json");
        let summary = export_config(&path, &Settings::default(), &store, true, Some("mat khau")).unwrap();
        assert!(summary.sealed);
        assert!(!std::fs::read_to_string(&path).unwrap().contains(SECRET));

        let (paths, mut target) = fresh_target(&temp_dir);
        assert!(import_config(&path, &paths, &mut target, None).unwrap_err().is_validation());
        assert!(import_config(&path, &paths, &mut target, Some("wrong")).is_err());
        assert!(target.configured_providers().is_empty());

        import_config(&path, &paths, &mut target, Some("mat khau")).unwrap();
        assert_eq!(target.configured_providers(), vec![ProviderId::Momo]);
    }

    #[test]
    fn test_passphrase_without_secure_rejected() {
        let (temp_dir, _paths, store) = setup();
        let path = temp_dir.path().join("export.json");
        assert!(export_config(&path, &Settings::default(), &store, false, Some("x")).is_err());
    }

    #[test]
    fn test_imports_legacy_layout() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("legacy.json");
        std::fs::write(
            &path,
            r#"{
                "app_settings": {"language": "vi", "theme": "light"},
                "api_settings": {"timeout": 30, "sandbox_mode": false},
                "secure_config": {
                    "zalopay_api": {"provider": "zalopay", "fields": {"app_id": "2553", "key1": "k1", "key2": "k2"}}
                }
            }"#,
        )
        .unwrap();

        let (paths, mut target) = fresh_target(&temp_dir);
        let summary = import_config(&path, &paths, &mut target, None).unwrap();
        assert!(!summary.settings.api.sandbox_mode);
        assert_eq!(summary.credentials, 1);
        assert!(target.get_credential(ProviderId::ZaloPay).unwrap().missing_fields().is_empty());
    }

    #[test]
    fn test_mislabelled_section_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.json");
        std::fs::write(
            &path,
            r#"{"secure_config": {"momo_api": {"provider": "visa", "fields": {}}}}"#,
        )
        .unwrap();
        let (paths, mut target) = fresh_target(&temp_dir);
        assert!(import_config(&path, &paths, &mut target, None).is_err());
    }

    #[test]
    fn test_backup_file_name() {
        let (temp_dir, _paths, store) = setup();
        let summary = backup_config(temp_dir.path(), &Settings::default(), &store, None).unwrap();
        let name = summary.path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("billpay_config_backup_"));
        assert!(name.ends_with(".json"));
        assert_eq!(summary.credentials, 1);
    }
}
