//! Payment provider clients
//!
//! Each provider is a [`ProviderClient`]: an immutable value built from a
//! [`Credential`] that signs requests, sends them through a [`Transport`] and
//! maps every failure onto [`BillPayError`]. Operations a provider does not
//! offer return [`BillPayError::Unsupported`].

pub mod bidv;
pub mod momo;
pub mod signing;
pub mod transport;
pub mod visa;
pub mod wire;
pub mod zalopay;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::error::{BillPayError, BillPayResult};
use crate::models::{
    BillLookup, ConnectionStatus, Credential, PaymentRequest, PaymentResult, PaymentStatus,
    ProviderId, RefundRequest, RefundResult, Vnd,
};

pub use bidv::{BidvClient, BidvConfig};
pub use momo::{MomoClient, MomoConfig};
pub use transport::{ClientIdentity, ReqwestTransport, Transport, TransportOptions};
pub use visa::{VisaClient, VisaConfig};
pub use zalopay::{ZaloPayBank, ZaloPayClient, ZaloPayConfig};

/// Identifier used by `test_connection`; no real bill or order carries it
pub const CONNECTION_TEST_ID: &str = "TEST123456";

/// Common surface of every payment backend
pub trait ProviderClient: Send + Sync {
    fn provider(&self) -> ProviderId;

    /// Look up a bill and its customer
    fn lookup_bill(&self, _bill_number: &str) -> BillPayResult<BillLookup> {
        Err(BillPayError::unsupported(self.provider(), "bill lookup"))
    }

    /// Create a payment order
    fn create_payment(&self, _request: &PaymentRequest) -> BillPayResult<PaymentResult> {
        Err(BillPayError::unsupported(self.provider(), "payments"))
    }

    /// Query the status of an earlier payment
    fn query_payment(&self, _order_id: &str) -> BillPayResult<PaymentStatus> {
        Err(BillPayError::unsupported(self.provider(), "payment queries"))
    }

    /// Refund an earlier payment
    fn refund_payment(&self, _request: &RefundRequest) -> BillPayResult<RefundResult> {
        Err(BillPayError::unsupported(self.provider(), "refunds"))
    }

    /// Charge a payment code shown in the payer's wallet app
    fn quick_pay(&self, _amount: Vnd, _payment_code: &str) -> BillPayResult<PaymentStatus> {
        Err(BillPayError::unsupported(self.provider(), "quick pay"))
    }

    /// Debit the payer's card
    fn pull_funds(
        &self,
        _amount: Vnd,
        _card_number: &str,
        _currency: &str,
    ) -> BillPayResult<PaymentResult> {
        Err(BillPayError::unsupported(self.provider(), "pull funds"))
    }

    /// Check a signed provider notification
    fn verify_callback(&self, _payload: &serde_json::Value) -> BillPayResult<bool> {
        Err(BillPayError::unsupported(self.provider(), "callback verification"))
    }

    /// Check the provider with a harmless call
    ///
    /// Reachable means the provider answered at all, even with a rejection of
    /// the sentinel id.
    fn test_connection(&self) -> ConnectionStatus {
        let started = Instant::now();
        let outcome = match self.provider() {
            ProviderId::Bidv => self.lookup_bill(CONNECTION_TEST_ID).map(|_| ()),
            _ => self.query_payment(CONNECTION_TEST_ID).map(|_| ()),
        };
        connection_status(self.provider(), outcome, started.elapsed())
    }
}

/// Funding sources a provider's gateway offers: (code, name, description)
pub fn payment_methods(provider: ProviderId) -> &'static [(&'static str, &'static str, &'static str)] {
    match provider {
        ProviderId::Momo => momo::PAYMENT_METHODS,
        ProviderId::ZaloPay => zalopay::PAYMENT_METHODS,
        ProviderId::Bidv | ProviderId::Visa => &[],
    }
}

/// Turn a connection test outcome into a [`ConnectionStatus`]
pub fn connection_status(
    provider: ProviderId,
    outcome: BillPayResult<()>,
    latency: Duration,
) -> ConnectionStatus {
    let (reachable, message) = match outcome {
        Ok(()) => (true, "Connected".to_string()),
        Err(e) if e.provider_answered() => (true, format!("Reachable ({})", e)),
        Err(e) => (false, e.to_string()),
    };
    ConnectionStatus {
        provider,
        reachable,
        message,
        latency,
    }
}

/// Stand-in for a provider without usable credentials
///
/// Every operation fails with the first missing credential field.
pub struct UnconfiguredClient {
    provider: ProviderId,
    missing: &'static str,
}

impl UnconfiguredClient {
    pub fn new(provider: ProviderId) -> Self {
        Self {
            provider,
            missing: provider.required_fields().first().copied().unwrap_or("credential"),
        }
    }

    /// Stand-in reporting the first field this credential lacks
    pub fn for_credential(credential: &Credential) -> Self {
        let mut client = Self::new(credential.provider);
        if let Some(field) = credential.missing_fields().first().copied() {
            client.missing = field;
        }
        client
    }

    fn error(&self) -> BillPayError {
        BillPayError::MissingCredential {
            provider: self.provider,
            field: self.missing,
        }
    }
}

impl ProviderClient for UnconfiguredClient {
    fn provider(&self) -> ProviderId {
        self.provider
    }

    fn lookup_bill(&self, _bill_number: &str) -> BillPayResult<BillLookup> {
        Err(self.error())
    }

    fn create_payment(&self, _request: &PaymentRequest) -> BillPayResult<PaymentResult> {
        Err(self.error())
    }

    fn query_payment(&self, _order_id: &str) -> BillPayResult<PaymentStatus> {
        Err(self.error())
    }

    fn refund_payment(&self, _request: &RefundRequest) -> BillPayResult<RefundResult> {
        Err(self.error())
    }

    fn quick_pay(&self, _amount: Vnd, _payment_code: &str) -> BillPayResult<PaymentStatus> {
        match self.provider {
            ProviderId::ZaloPay => Err(self.error()),
            provider => Err(BillPayError::unsupported(provider, "quick pay")),
        }
    }

    fn pull_funds(
        &self,
        _amount: Vnd,
        _card_number: &str,
        _currency: &str,
    ) -> BillPayResult<PaymentResult> {
        match self.provider {
            ProviderId::Visa => Err(self.error()),
            provider => Err(BillPayError::unsupported(provider, "pull funds")),
        }
    }

    fn verify_callback(&self, _payload: &serde_json::Value) -> BillPayResult<bool> {
        Err(self.error())
    }

    fn test_connection(&self) -> ConnectionStatus {
        connection_status(self.provider, Err(self.error()), Duration::ZERO)
    }
}

/// Build a client for a credential, or a stand-in if it is incomplete
pub fn build_client(
    credential: &Credential,
    options: &TransportOptions,
) -> Arc<dyn ProviderClient> {
    let built: BillPayResult<Arc<dyn ProviderClient>> = match credential.provider {
        ProviderId::Bidv => BidvConfig::from_credential(credential).map(|config| {
            Arc::new(BidvClient::new(
                config,
                Arc::new(ReqwestTransport::new(options.clone())),
            )) as Arc<dyn ProviderClient>
        }),
        ProviderId::Momo => MomoConfig::from_credential(credential).map(|config| {
            Arc::new(MomoClient::new(
                config,
                Arc::new(ReqwestTransport::new(options.clone())),
            )) as Arc<dyn ProviderClient>
        }),
        ProviderId::ZaloPay => ZaloPayConfig::from_credential(credential).map(|config| {
            Arc::new(ZaloPayClient::new(
                config,
                Arc::new(ReqwestTransport::new(options.clone())),
            )) as Arc<dyn ProviderClient>
        }),
        ProviderId::Visa => VisaConfig::from_credential(credential).map(|config| {
            let mut options = options.clone();
            options.identity = config.identity.clone();
            Arc::new(VisaClient::new(
                config,
                Arc::new(ReqwestTransport::new(options)),
            )) as Arc<dyn ProviderClient>
        }),
    };

    match built {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(provider = %credential.provider, error = %e, "credential incomplete");
            Arc::new(UnconfiguredClient::for_credential(credential))
        }
    }
}

/// Milliseconds since the Unix epoch, used in generated ids
pub(crate) fn unix_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Reject an empty identifier before any network call
pub(crate) fn require_id<'a>(value: &'a str, what: &str) -> BillPayResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(BillPayError::Validation(format!("{} is required", what)))
    } else {
        Ok(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Environment, Vnd};

    #[test]
    fn test_unconfigured_client_reports_missing_field() {
        let credential = Credential::new(ProviderId::Momo, Environment::Sandbox)
            .with("partner_code", "MOMOBKUN20180529");
        let client = UnconfiguredClient::for_credential(&credential);

        let err = client
            .create_payment(&PaymentRequest::new(Vnd::new(1000), "Test"))
            .unwrap_err();
        assert!(matches!(
            err,
            BillPayError::MissingCredential {
                provider: ProviderId::Momo,
                field: "access_key"
            }
        ));
    }

    #[test]
    fn test_extra_operations_only_where_offered() {
        let zalopay = UnconfiguredClient::new(ProviderId::ZaloPay);
        assert!(matches!(
            zalopay.quick_pay(Vnd::new(50_000), "CODE"),
            Err(BillPayError::MissingCredential { .. })
        ));
        assert!(matches!(
            zalopay.pull_funds(Vnd::new(50_000), "4532015112830366", "VND"),
            Err(BillPayError::Unsupported { .. })
        ));

        let visa = UnconfiguredClient::new(ProviderId::Visa);
        assert!(matches!(
            visa.pull_funds(Vnd::new(50_000), "4532015112830366", "VND"),
            Err(BillPayError::MissingCredential { .. })
        ));
        assert!(matches!(
            visa.quick_pay(Vnd::new(50_000), "CODE"),
            Err(BillPayError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_payment_methods_per_provider() {
        assert_eq!(payment_methods(ProviderId::Momo)[0].0, "momo_wallet");
        assert_eq!(payment_methods(ProviderId::ZaloPay)[0].0, "zalopay");
        assert!(payment_methods(ProviderId::Bidv).is_empty());
    }

    #[test]
    fn test_unconfigured_connection_test_is_unreachable() {
        let status = UnconfiguredClient::new(ProviderId::Visa).test_connection();
        assert!(!status.reachable);
        assert!(status.message.contains("user_id"));
    }

    #[test]
    fn test_connection_status_counts_answers_as_reachable() {
        let rejected = connection_status(
            ProviderId::Momo,
            Err(BillPayError::rejected(ProviderId::Momo, 42, "Order not found")),
            Duration::from_millis(120),
        );
        assert!(rejected.reachable);

        let refused = connection_status(
            ProviderId::Momo,
            Err(BillPayError::transport(ProviderId::Momo, "refused")),
            Duration::from_millis(5),
        );
        assert!(!refused.reachable);
    }

    #[test]
    fn test_build_client_falls_back_when_incomplete() {
        let credential = Credential::new(ProviderId::ZaloPay, Environment::Sandbox);
        let client = build_client(&credential, &TransportOptions::default());
        assert_eq!(client.provider(), ProviderId::ZaloPay);
        let err = client.query_payment("x").unwrap_err();
        assert!(matches!(err, BillPayError::MissingCredential { field: "app_id", .. }));
    }

    #[test]
    fn test_require_id() {
        assert_eq!(require_id(" PD1 ", "Bill number").unwrap(), "PD1");
        assert!(require_id("   ", "Bill number").unwrap_err().is_validation());
    }
}
