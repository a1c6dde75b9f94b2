//! Provider credentials
//!
//! A credential is a provider, an environment and a set of named fields.
//! Every field value is held in a [`SecureString`]; which ones count as secret
//! is decided by [`ProviderId::is_secret_field`] and only affects display.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::provider::{Environment, ProviderId};
use crate::crypto::secure_memory::{mask, SecureString};
use crate::error::{BillPayError, BillPayResult};

/// Credentials for a single provider
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub provider: ProviderId,

    #[serde(default)]
    pub environment: Environment,

    #[serde(default)]
    fields: BTreeMap<String, SecureString>,
}

impl Credential {
    /// Create an empty credential for a provider
    pub fn new(provider: ProviderId, environment: Environment) -> Self {
        Self {
            provider,
            environment,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Set a field; empty values remove it
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if value.trim().is_empty() {
            self.fields.remove(name);
        } else {
            self.fields.insert(name.to_string(), SecureString::new(value));
        }
    }

    /// Get a field value
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|v| v.expose())
    }

    /// Get a required field, failing with a configuration error
    pub fn require(&self, name: &'static str) -> BillPayResult<&str> {
        self.get(name).ok_or(BillPayError::MissingCredential {
            provider: self.provider,
            field: name,
        })
    }

    /// Field names that are set
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }

    /// Required fields that are not set
    pub fn missing_fields(&self) -> Vec<&'static str> {
        self.provider
            .required_fields()
            .iter()
            .copied()
            .filter(|f| self.get(f).is_none())
            .collect()
    }

    /// Check that a field name belongs to this provider
    pub fn validate_field_name(&self, name: &str) -> BillPayResult<()> {
        let known = self
            .provider
            .required_fields()
            .iter()
            .chain(self.provider.optional_fields())
            .any(|f| *f == name);
        if known {
            Ok(())
        } else {
            Err(BillPayError::Validation(format!(
                "Unknown field '{}' for {}. Expected one of: {}",
                name,
                self.provider,
                self.provider
                    .required_fields()
                    .iter()
                    .chain(self.provider.optional_fields())
                    .copied()
                    .collect::<Vec<_>>()
                    .join(", ")
            )))
        }
    }

    /// Field values for display, with secret fields masked
    pub fn redacted_fields(&self) -> Vec<(String, String)> {
        self.fields
            .iter()
            .map(|(name, value)| {
                let shown = if self.provider.is_secret_field(name) {
                    mask(value.expose())
                } else {
                    value.expose().to_string()
                };
                (name.clone(), shown)
            })
            .collect()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("provider", &self.provider)
            .field("environment", &self.environment)
            .field("fields", &self.redacted_fields())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn momo() -> Credential {
        Credential::new(ProviderId::Momo, Environment::Sandbox)
            .with("partner_code", "MOMOBKUN20180529")
            .with("access_key", "klm05TvNBzhg7h7j")
            .with("secret_key", "at67qH6mk8w5Y1nAyMoYKMWACiEi2bsa")
    }

    #[test]
    fn test_require_present_and_missing() {
        let cred = momo();
        assert_eq!(cred.require("partner_code").unwrap(), "MOMOBKUN20180529");

        let cred = Credential::new(ProviderId::ZaloPay, Environment::Sandbox);
        let err = cred.require("key1").unwrap_err();
        assert!(matches!(
            err,
            BillPayError::MissingCredential {
                provider: ProviderId::ZaloPay,
                field: "key1"
            }
        ));
    }

    #[test]
    fn test_missing_fields() {
        let cred = Credential::new(ProviderId::Visa, Environment::Sandbox).with("user_id", "u");
        assert_eq!(cred.missing_fields(), vec!["password"]);
        assert!(momo().missing_fields().is_empty());
    }

    #[test]
    fn test_empty_value_removes_field() {
        let mut cred = momo();
        cred.set("partner_code", "  ");
        assert!(cred.get("partner_code").is_none());
    }

    #[test]
    fn test_debug_never_shows_secrets() {
        let debug = format!("{:?}", momo());
        assert!(!debug.contains("at67qH6mk8w5Y1nAyMoYKMWACiEi2bsa"));
        assert!(!debug.contains("klm05TvNBzhg7h7j"));
        assert!(debug.contains("MOMOBKUN20180529"));
    }

    #[test]
    fn test_validate_field_name() {
        let cred = momo();
        assert!(cred.validate_field_name("ipn_url").is_ok());
        assert!(cred.validate_field_name("key1").is_err());
    }

    #[test]
    fn test_serde_round_trip() {
        let cred = momo();
        let json = serde_json::to_string(&cred).unwrap();
        let back: Credential = serde_json::from_str(&json).unwrap();
        assert_eq!(cred, back);
    }
}
