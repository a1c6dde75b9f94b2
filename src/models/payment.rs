//! Payment requests and results

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::money::Vnd;
use super::provider::ProviderId;
use crate::error::{BillPayError, BillPayResult};

/// Provider-specific extras attached to a payment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentExtras {
    /// Opaque merchant data echoed back by wallets
    #[serde(default)]
    pub extra_data: String,
    /// Payer display name (ZaloPay `app_user`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer_name: Option<String>,
    /// Recipient card for card-network transfers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_address: Option<String>,
    /// Overrides the provider's configured redirect URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    /// Overrides the provider's configured callback/IPN URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

/// A request to move money, consumed by exactly one provider call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub amount: Vnd,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub description: String,
    #[serde(default)]
    pub extra: PaymentExtras,
}

fn default_currency() -> String {
    "VND".to_string()
}

impl PaymentRequest {
    pub fn new(amount: Vnd, description: impl Into<String>) -> Self {
        Self {
            amount,
            currency: default_currency(),
            description: description.into(),
            extra: PaymentExtras::default(),
        }
    }

    pub fn with_extra(mut self, extra: PaymentExtras) -> Self {
        self.extra = extra;
        self
    }

    /// Local checks performed before any network call
    pub fn validate(&self) -> BillPayResult<()> {
        if !self.amount.is_positive() {
            return Err(BillPayError::Validation(format!(
                "Amount must be greater than 0, got {}",
                self.amount
            )));
        }
        if self.description.trim().is_empty() {
            return Err(BillPayError::Validation(
                "Payment description is required".to_string(),
            ));
        }
        if self.currency.trim().is_empty() {
            return Err(BillPayError::Validation("Currency is required".to_string()));
        }
        Ok(())
    }
}

/// A created payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResult {
    pub provider: ProviderId,
    pub order_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    /// Web page the payer is sent to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pay_url: Option<String>,
    /// Wallet app deep link
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deep_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
    pub message: String,
}

/// Where a payment currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentState {
    Succeeded,
    Pending,
    Failed,
}

impl fmt::Display for PaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Pending => write!(f, "pending"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Result of a payment status query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatus {
    pub provider: ProviderId,
    pub order_id: String,
    pub state: PaymentState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Vnd>,
    /// Provider's raw result code
    pub result_code: String,
    pub message: String,
}

/// A refund request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRequest {
    pub order_id: String,
    pub amount: Vnd,
    /// Provider transaction id of the original payment, looked up when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RefundRequest {
    pub fn new(order_id: impl Into<String>, amount: Vnd) -> Self {
        Self {
            order_id: order_id.into(),
            amount,
            transaction_id: None,
            description: None,
        }
    }

    pub fn validate(&self) -> BillPayResult<()> {
        if self.order_id.trim().is_empty() {
            return Err(BillPayError::Validation("Order id is required".to_string()));
        }
        if !self.amount.is_positive() {
            return Err(BillPayError::Validation(format!(
                "Refund amount must be greater than 0, got {}",
                self.amount
            )));
        }
        Ok(())
    }

    /// Refund description, defaulting to one naming the order
    pub fn description_or_default(&self) -> String {
        self.description
            .clone()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| format!("Hoàn tiền đơn hàng {}", self.order_id))
    }
}

/// Result of an accepted refund
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundResult {
    pub provider: ProviderId,
    pub order_id: String,
    /// Merchant-side id of this refund request
    pub refund_request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_id: Option<String>,
    pub result_code: String,
    pub message: String,
}

/// Reachability check result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub provider: ProviderId,
    pub reachable: bool,
    pub message: String,
    #[serde(with = "duration_millis")]
    pub latency: Duration,
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
