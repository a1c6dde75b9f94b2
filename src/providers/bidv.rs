//! BIDV open-banking bill inquiry
//!
//! Lookup only. Each request is signed with
//! `HMAC-SHA256(api_secret, body ‖ timestamp_ms ‖ api_key)` where `body` is
//! the exact JSON text sent on the wire.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::signing::{Canonical, CanonicalStyle};
use super::transport::{HttpRequest, Transport};
use super::wire::{de_amount, de_opt_amount, de_opt_i64, de_opt_string};
use super::{require_id, unix_millis, ProviderClient};
use crate::crypto::SecureString;
use crate::error::{BillPayError, BillPayResult};
use crate::models::{Bill, BillLookup, BillNumber, BillType, Credential, Customer, ProviderId};

pub const SANDBOX_URL: &str =
    "https://openapi.bidv.com.vn/bidv/sandbox/open-banking/ibank/billPayment/inquiryBills/v1";
pub const PRODUCTION_URL: &str =
    "https://openapi.bidv.com.vn/bidv/open-banking/ibank/billPayment/inquiryBills/v1";

/// Tag stored on lookups answered by this client
pub const SOURCE: &str = "bidv_api";

const SIGNATURE_ORDER: &[&str] = &["body", "timestamp", "api_key"];

/// Immutable BIDV settings
#[derive(Debug, Clone)]
pub struct BidvConfig {
    pub api_key: String,
    pub api_secret: SecureString,
    pub base_url: String,
}

impl BidvConfig {
    pub fn from_credential(credential: &Credential) -> BillPayResult<Self> {
        let base_url = match credential.get("api_url") {
            Some(url) => url.trim_end_matches('/').to_string(),
            None if credential.environment.is_sandbox() => SANDBOX_URL.to_string(),
            None => PRODUCTION_URL.to_string(),
        };
        Ok(Self {
            api_key: credential.require("api_key")?.to_string(),
            api_secret: SecureString::new(credential.require("api_secret")?),
            base_url,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupBody<'a> {
    bill_number: &'a str,
    bill_type: &'a str,
    provider: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireBill {
    #[serde(default, deserialize_with = "de_opt_string")]
    bill_number: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    customer_id: Option<String>,
    #[serde(default)]
    customer_name: Option<String>,
    #[serde(default, alias = "customerAddress")]
    address: Option<String>,
    #[serde(default, alias = "customerPhone", deserialize_with = "de_opt_string")]
    phone: Option<String>,
    #[serde(default, alias = "customerEmail")]
    email: Option<String>,
    #[serde(default)]
    bill_type: Option<String>,
    #[serde(default)]
    provider: Option<String>,
    #[serde(deserialize_with = "de_amount")]
    amount: crate::models::Vnd,
    #[serde(default)]
    due_date: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    period: Option<String>,
    #[serde(default, deserialize_with = "de_opt_i64")]
    old_index: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_i64")]
    new_index: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_i64")]
    consumption: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_amount")]
    taxes: Option<crate::models::Vnd>,
    #[serde(default, deserialize_with = "de_opt_amount")]
    fees: Option<crate::models::Vnd>,
    #[serde(default)]
    description: Option<String>,
}

fn parse_due_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .ok()
}

/// BIDV client
pub struct BidvClient {
    config: BidvConfig,
    transport: Arc<dyn Transport>,
}

impl BidvClient {
    pub fn new(config: BidvConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    /// Build the signed lookup request for a given timestamp
    pub fn build_lookup_request(&self, bill_number: &str, timestamp: &str) -> BillPayResult<HttpRequest> {
        let bill_type = BillNumber::infer_bill_type(bill_number).unwrap_or(BillType::Electric);
        let biller = match bill_type {
            BillType::Electric => BillNumber::infer_biller(bill_number).unwrap_or("EVN"),
            _ => BillNumber::infer_biller(bill_number).unwrap_or(""),
        };
        let body = serde_json::to_string(&LookupBody {
            bill_number,
            bill_type: bill_type.as_str(),
            provider: biller,
        })?;

        let signature = Canonical::new(SIGNATURE_ORDER, CanonicalStyle::ValuesOnly(""))
            .field("body", &body)
            .field("timestamp", timestamp)
            .field("api_key", &self.config.api_key)
            .sign(self.config.api_secret.expose())?;

        Ok(HttpRequest::post_json(
            ProviderId::Bidv,
            format!("{}/bills/lookup", self.config.base_url),
            body,
        )
        .header("Authorization", format!("Bearer {}", self.config.api_key))
        .header("X-Signature", signature)
        .header("X-Timestamp", timestamp))
    }

    fn parse_lookup(bill_number: &str, body: &str) -> BillPayResult<BillLookup> {
        let provider = ProviderId::Bidv;
        let value: Value =
            serde_json::from_str(body).map_err(|e| BillPayError::malformed(provider, e.to_string()))?;

        if value.get("success") == Some(&Value::Bool(false)) {
            let code = value
                .get("code")
                .or_else(|| value.get("errorCode"))
                .map(super::wire::canonical_value)
                .unwrap_or_else(|| "failed".to_string());
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Bill lookup failed")
                .to_string();
            return Err(BillPayError::rejected(provider, code, message));
        }

        let payload = ["data", "bill"]
            .iter()
            .find_map(|key| value.get(*key).filter(|v| v.is_object()))
            .cloned()
            .unwrap_or(value);
        let wire: WireBill = serde_json::from_value(payload)
            .map_err(|e| BillPayError::malformed(provider, format!("bill: {}", e)))?;

        let number = wire.bill_number.unwrap_or_else(|| bill_number.to_string());
        let bill_type = match wire.bill_type.as_deref().map(str::parse::<BillType>) {
            Some(Ok(t)) => t,
            _ => BillNumber::infer_bill_type(&number).unwrap_or(BillType::Electric),
        };
        let due_date = wire.due_date.as_deref().and_then(|raw| {
            let parsed = parse_due_date(raw);
            if parsed.is_none() {
                debug!(raw, "ignoring unparseable due date");
            }
            parsed
        });

        let customer = Customer {
            id: wire.customer_id.unwrap_or_else(|| number.clone()),
            name: wire.customer_name.unwrap_or_default(),
            address: wire.address.unwrap_or_default(),
            phone: wire.phone,
            email: wire.email,
        };
        let bill = Bill {
            provider: wire
                .provider
                .or_else(|| BillNumber::infer_biller(&number).map(str::to_string))
                .unwrap_or_default(),
            bill_number: number,
            bill_type,
            amount: wire.amount,
            due_date,
            period: wire.period,
            status: wire.status,
            old_index: wire.old_index,
            new_index: wire.new_index,
            consumption: wire.consumption,
            taxes: wire.taxes,
            fees: wire.fees,
            description: wire.description.unwrap_or_default(),
        };

        Ok(BillLookup {
            bill,
            customer,
            source: SOURCE.to_string(),
        })
    }
}

/// Replace raw status bodies with the messages BIDV documents per status
fn explain_status(err: BillPayError) -> BillPayError {
    match err {
        BillPayError::HttpStatus {
            provider,
            status,
            message,
        } => {
            let message = match status {
                400 => format!("Invalid bill number ({})", message),
                401 | 403 => "Authentication failed; check api_key and api_secret".to_string(),
                404 => "No bill found for this number".to_string(),
                _ => message,
            };
            BillPayError::HttpStatus {
                provider,
                status,
                message,
            }
        }
        other => other,
    }
}

impl ProviderClient for BidvClient {
    fn provider(&self) -> ProviderId {
        ProviderId::Bidv
    }

    fn lookup_bill(&self, bill_number: &str) -> BillPayResult<BillLookup> {
        let bill_number = require_id(bill_number, "Bill number")?;
        let request = self.build_lookup_request(bill_number, &unix_millis().to_string())?;
        let response = self.transport.execute(&request)?;
        let body = response.expect_ok(ProviderId::Bidv).map_err(explain_status)?;
        let lookup = Self::parse_lookup(bill_number, body)?;
        info!(bill = %lookup.bill.bill_number, amount = %lookup.bill.amount, "bill found");
        Ok(lookup)
    }
}
