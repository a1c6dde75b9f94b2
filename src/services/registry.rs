//! One live client per provider
//!
//! Clients are immutable, so reconfiguring a provider builds a new client and
//! swaps it in. Callers hold an `Arc` snapshot for the length of a call, which
//! means an in-flight request keeps the configuration it started with.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::config::Settings;
use crate::models::{Credential, Environment, ProviderId};
use crate::providers::{build_client, ProviderClient, TransportOptions, UnconfiguredClient};
use crate::storage::SecureStore;

pub struct ProviderRegistry {
    clients: BTreeMap<ProviderId, RwLock<Arc<dyn ProviderClient>>>,
    options: TransportOptions,
}

impl ProviderRegistry {
    /// Build clients for every provider from stored credentials
    pub fn from_store(store: &SecureStore, settings: &Settings) -> Self {
        let options = TransportOptions {
            timeout: Duration::from_secs(settings.api.timeout_secs.max(1)),
            ..TransportOptions::default()
        };
        let environment = if settings.api.sandbox_mode {
            Environment::Sandbox
        } else {
            Environment::Production
        };

        let clients = ProviderId::ALL
            .iter()
            .map(|&provider| {
                let credential = store.credential_or_empty(provider, environment);
                (provider, RwLock::new(build_client(&credential, &options)))
            })
            .collect();

        Self { clients, options }
    }

    /// Registry over ready-made clients; providers not given are unconfigured
    pub fn with_clients(given: Vec<Arc<dyn ProviderClient>>) -> Self {
        let mut clients: BTreeMap<ProviderId, RwLock<Arc<dyn ProviderClient>>> = ProviderId::ALL
            .iter()
            .map(|&p| {
                let client: Arc<dyn ProviderClient> = Arc::new(UnconfiguredClient::new(p));
                (p, RwLock::new(client))
            })
            .collect();
        for client in given {
            clients.insert(client.provider(), RwLock::new(client));
        }
        Self {
            clients,
            options: TransportOptions::default(),
        }
    }

    /// Current client for a provider
    pub fn client(&self, provider: ProviderId) -> Arc<dyn ProviderClient> {
        match self.clients.get(&provider) {
            Some(slot) => Arc::clone(&slot.read().unwrap_or_else(|e| e.into_inner())),
            None => Arc::new(UnconfiguredClient::new(provider)),
        }
    }

    /// Swap in a client built from a new credential
    pub fn reconfigure(&self, credential: &Credential) {
        self.replace(build_client(credential, &self.options));
        tracing::info!(provider = %credential.provider, env = %credential.environment, "provider reconfigured");
    }

    /// Transport settings new clients are built with
    pub fn options(&self) -> &TransportOptions {
        &self.options
    }

    /// Swap in a ready-made client
    pub fn replace(&self, client: Arc<dyn ProviderClient>) {
        if let Some(slot) = self.clients.get(&client.provider()) {
            *slot.write().unwrap_or_else(|e| e.into_inner()) = client;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BillPayError;
    use crate::models::PaymentStatus;
    use crate::error::BillPayResult;
    use tempfile::TempDir;

    struct Fixed(&'static str);

    impl ProviderClient for Fixed {
        fn provider(&self) -> ProviderId {
            ProviderId::Momo
        }

        fn query_payment(&self, _order_id: &str) -> BillPayResult<PaymentStatus> {
            Err(BillPayError::rejected(ProviderId::Momo, 0, self.0))
        }
    }

    #[test]
    fn test_unconfigured_by_default() {
        let temp_dir = TempDir::new().unwrap();
        let paths = crate::config::BillPayPaths::with_base_dir(temp_dir.path().to_path_buf());
        let store = SecureStore::open(&paths).unwrap();
        let registry = ProviderRegistry::from_store(&store, &Settings::default());

        for provider in ProviderId::ALL {
            let status = registry.client(provider).test_connection();
            assert!(!status.reachable);
            assert!(status.message.contains("not configured"), "{}", status.message);
        }
    }

    #[test]
    fn test_snapshot_survives_replace() {
        let registry = ProviderRegistry::with_clients(vec![Arc::new(Fixed("first"))]);
        let snapshot = registry.client(ProviderId::Momo);
        registry.replace(Arc::new(Fixed("second")));

        let old = snapshot.query_payment("x").unwrap_err().to_string();
        let new = registry.client(ProviderId::Momo).query_payment("x").unwrap_err().to_string();
        assert!(old.ends_with("first"));
        assert!(new.ends_with("second"));
    }

    #[test]
    fn test_reconfigure_with_complete_credential() {
        let registry = ProviderRegistry::with_clients(Vec::new());
        let credential = Credential::new(ProviderId::ZaloPay, Environment::Sandbox)
            .with("app_id", "2553")
            .with("key1", "PcY4iZIKFCIdgZvA6ueMcMHHUbRLYjPL")
            .with("key2", "kLtgPl8HHhfvMuDHPwKfgfsY4Ydm9eIz");
        registry.reconfigure(&credential);

        // a configured client validates locally before touching the network
        let err = registry.client(ProviderId::ZaloPay).query_payment("  ").unwrap_err();
        assert!(err.is_validation());
    }
}
