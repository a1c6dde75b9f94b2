//! Visa Direct funds transfer
//!
//! HTTP Basic auth over `user_id:password`, optionally over mutual TLS with a
//! client certificate. Push funds is the payment operation; refunds are not
//! offered by Visa Direct.

use std::path::PathBuf;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::transport::{ClientIdentity, HttpRequest, Transport};
use super::wire::{de_opt_amount, de_opt_string};
use super::{require_id, unix_millis, ProviderClient};
use crate::crypto::SecureString;
use crate::error::{BillPayError, BillPayResult};
use crate::models::card::mask_card_number;
use crate::models::{
    validate_card_number, Credential, PaymentRequest, PaymentResult, PaymentState, PaymentStatus,
    ProviderId, Vnd,
};

pub const SANDBOX_URL: &str = "https://sandbox.api.visa.com";
pub const PRODUCTION_URL: &str = "https://api.visa.com";

const PUSH_PATH: &str = "/visadirect/fundstransfer/v1/pushfundstransactions";
const PULL_PATH: &str = "/visadirect/fundstransfer/v1/pullfundstransactions";
const QUERY_PATH: &str = "/visadirect/reports/v1/transactionquery";

const ACQUIRER_COUNTRY: &str = "704";
const ACQUIRING_BIN: &str = "408999";
const BUSINESS_APPLICATION_ID: &str = "AA";
const MERCHANT_CATEGORY_CODE: &str = "6012";
const SENDER_ACCOUNT: &str = "4957030420210454";
const SENDER_NAME: &str = "Payoo System";
const SENDER_CITY: &str = "Ho Chi Minh City";
const SENDER_STATE: &str = "HCM";
const SOURCE_OF_FUNDS: &str = "05";
const APPROVED: &str = "00";

/// Countries Visa Direct is used with: (ISO alpha-2, name, currency, numeric code)
pub const SUPPORTED_COUNTRIES: &[(&str, &str, &str, &str)] = &[
    ("VN", "Vietnam", "VND", "704"),
    ("US", "United States", "USD", "840"),
    ("SG", "Singapore", "SGD", "702"),
];

/// ISO 4217 numeric code for a currency
///
/// Accepts an alphabetic code from [`SUPPORTED_COUNTRIES`] or a three-digit
/// numeric code.
pub fn currency_code(currency: &str) -> BillPayResult<&'static str> {
    let currency = currency.trim();
    SUPPORTED_COUNTRIES
        .iter()
        .find(|(_, _, alpha, numeric)| alpha.eq_ignore_ascii_case(currency) || *numeric == currency)
        .map(|(_, _, _, numeric)| *numeric)
        .ok_or_else(|| {
            BillPayError::Validation(format!(
                "Unsupported currency '{}'. Expected one of: VND, USD, SGD",
                currency
            ))
        })
}

/// Immutable Visa Direct settings
#[derive(Debug, Clone)]
pub struct VisaConfig {
    pub user_id: String,
    pub password: SecureString,
    pub base_url: String,
    pub identity: Option<ClientIdentity>,
}

impl VisaConfig {
    pub fn from_credential(credential: &Credential) -> BillPayResult<Self> {
        let identity = match (credential.get("cert_path"), credential.get("key_path")) {
            (Some(cert), Some(key)) => Some(ClientIdentity {
                cert_path: PathBuf::from(cert),
                key_path: PathBuf::from(key),
            }),
            (None, None) => None,
            _ => {
                return Err(BillPayError::Config(
                    "Visa cert_path and key_path must be set together".to_string(),
                ))
            }
        };
        let base_url = if credential.environment.is_sandbox() {
            SANDBOX_URL
        } else {
            PRODUCTION_URL
        };
        Ok(Self {
            user_id: credential.require("user_id")?.to_string(),
            password: SecureString::new(credential.require("password")?),
            base_url: base_url.to_string(),
            identity,
        })
    }

    fn authorization(&self) -> String {
        let raw = format!("{}:{}", self.user_id, self.password.expose());
        format!("Basic {}", STANDARD.encode(raw))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CardAcceptorAddress {
    country: &'static str,
    county: &'static str,
    state: &'static str,
    zip_code: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CardAcceptor {
    address: CardAcceptorAddress,
    id_code: &'static str,
    name: &'static str,
    terminal_id: &'static str,
}

const CARD_ACCEPTOR: CardAcceptor = CardAcceptor {
    address: CardAcceptorAddress {
        country: "VN",
        county: "San Mateo",
        state: "CA",
        zip_code: "94404",
    },
    id_code: "ABCD1234ABCD123",
    name: "Payoo Vietnam",
    terminal_id: "ABCD1234",
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PointOfServiceData {
    #[serde(rename = "motoECIIndicator")]
    moto_eci_indicator: &'static str,
    pan_entry_mode: &'static str,
    pos_condition_code: &'static str,
}

const POS_DATA: PointOfServiceData = PointOfServiceData {
    moto_eci_indicator: "0",
    pan_entry_mode: "90",
    pos_condition_code: "00",
};

/// Fields shared by push and pull requests
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TransferCommon<'a> {
    acquirer_country_code: &'static str,
    acquiring_bin: &'static str,
    amount: String,
    business_application_id: &'static str,
    card_acceptor: &'static CardAcceptor,
    local_transaction_date_time: &'a str,
    merchant_category_code: &'static str,
    point_of_service_data: &'static PointOfServiceData,
    retrieval_reference_number: &'a str,
    systems_trace_audit_number: &'a str,
    transaction_currency_code: &'static str,
    transaction_identifier: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PushBody<'a> {
    #[serde(flatten)]
    common: TransferCommon<'a>,
    recipient_name: &'a str,
    recipient_primary_account_number: &'a str,
    sender_account_number: &'static str,
    sender_address: &'a str,
    sender_city: &'static str,
    sender_country_code: &'static str,
    sender_name: &'static str,
    sender_reference: &'static str,
    sender_state_code: &'static str,
    source_of_funds_code: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PullBody<'a> {
    #[serde(flatten)]
    common: TransferCommon<'a>,
    sender_account_number: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryBody<'a> {
    acquirer_country_code: &'static str,
    acquiring_bin: &'static str,
    transaction_identifier: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferReply {
    #[serde(default, deserialize_with = "de_opt_string")]
    transaction_identifier: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    action_code: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    approval_code: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    response_code: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryReply {
    #[serde(default)]
    transaction_status: Option<String>,
    #[serde(default, deserialize_with = "de_opt_amount")]
    amount: Option<Vnd>,
    #[serde(default, deserialize_with = "de_opt_string")]
    approval_code: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    action_code: Option<String>,
}

fn transfer_state(status: &str) -> PaymentState {
    match status.trim().to_ascii_uppercase().as_str() {
        "APPROVED" | "SUCCESS" | "SUCCESSFUL" | "COMPLETED" => PaymentState::Succeeded,
        "PENDING" | "PROCESSING" | "IN_PROGRESS" => PaymentState::Pending,
        _ => PaymentState::Failed,
    }
}

/// A transaction id with the references Visa derives from it
struct TransferIds {
    transaction_id: String,
    retrieval_reference: String,
    trace_number: String,
}

impl TransferIds {
    /// Numeric id from the clock; references are its trailing 12 and 6 digits
    fn from_millis(millis: i64) -> Self {
        let transaction_id = millis.to_string();
        let tail = |n: usize| {
            let start = transaction_id.len().saturating_sub(n);
            transaction_id[start..].to_string()
        };
        Self {
            retrieval_reference: tail(12),
            trace_number: tail(6),
            transaction_id,
        }
    }
}

/// Visa Direct client
pub struct VisaClient {
    config: VisaConfig,
    transport: Arc<dyn Transport>,
}

impl VisaClient {
    pub fn new(config: VisaConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    fn post(&self, path: &str, body: String) -> HttpRequest {
        HttpRequest::post_json(
            ProviderId::Visa,
            format!("{}{}", self.config.base_url, path),
            body,
        )
        .header("Authorization", self.config.authorization())
    }

    fn common<'a>(
        ids: &'a TransferIds,
        amount: Vnd,
        currency: &'static str,
        local_time: &'a str,
    ) -> TransferCommon<'a> {
        TransferCommon {
            acquirer_country_code: ACQUIRER_COUNTRY,
            acquiring_bin: ACQUIRING_BIN,
            amount: amount.dong().to_string(),
            business_application_id: BUSINESS_APPLICATION_ID,
            card_acceptor: &CARD_ACCEPTOR,
            local_transaction_date_time: local_time,
            merchant_category_code: MERCHANT_CATEGORY_CODE,
            point_of_service_data: &POS_DATA,
            retrieval_reference_number: &ids.retrieval_reference,
            systems_trace_audit_number: &ids.trace_number,
            transaction_currency_code: currency,
            transaction_identifier: &ids.transaction_id,
        }
    }

    /// Validate and build a push-funds request for a fixed id and clock
    pub fn build_push_request(
        &self,
        request: &PaymentRequest,
        millis: i64,
        local_time: &str,
    ) -> BillPayResult<HttpRequest> {
        request.validate()?;
        let card = request.extra.card_number.as_deref().ok_or_else(|| {
            BillPayError::Validation("A recipient card number is required".to_string())
        })?;
        let check = validate_card_number(card);
        if !check.valid {
            return Err(BillPayError::Validation(format!(
                "Invalid card number: {}",
                check.message
            )));
        }
        let recipient_name = request
            .extra
            .recipient_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| BillPayError::Validation("Recipient name is required".to_string()))?;
        let currency = currency_code(&request.currency)?;

        let ids = TransferIds::from_millis(millis);
        let body = serde_json::to_string(&PushBody {
            common: Self::common(&ids, request.amount, currency, local_time),
            recipient_name,
            recipient_primary_account_number: &check.digits,
            sender_account_number: SENDER_ACCOUNT,
            sender_address: request.extra.recipient_address.as_deref().unwrap_or(""),
            sender_city: SENDER_CITY,
            sender_country_code: ACQUIRER_COUNTRY,
            sender_name: SENDER_NAME,
            sender_reference: "",
            sender_state_code: SENDER_STATE,
            source_of_funds_code: SOURCE_OF_FUNDS,
        })?;
        Ok(self.post(PUSH_PATH, body))
    }

    fn transfer(&self, http: HttpRequest, ids_millis: i64, card: &str, amount: Vnd) -> BillPayResult<PaymentResult> {
        let reply: TransferReply = self.transport.execute(&http)?.json(ProviderId::Visa)?;
        if let Some(code) = reply.action_code.as_deref().filter(|c| *c != APPROVED) {
            return Err(BillPayError::rejected(
                ProviderId::Visa,
                code,
                format!(
                    "Transfer declined (response code {})",
                    reply.response_code.as_deref().unwrap_or("-")
                ),
            ));
        }

        let order_id = ids_millis.to_string();
        info!(
            transaction = %order_id,
            card = %mask_card_number(card),
            amount = %amount,
            "Visa transfer approved"
        );
        Ok(PaymentResult {
            provider: ProviderId::Visa,
            order_id,
            transaction_id: reply.transaction_identifier,
            pay_url: None,
            deep_link: None,
            qr_code: None,
            message: match reply.approval_code {
                Some(code) => format!("Approved (approval code {})", code),
                None => "Approved".to_string(),
            },
        })
    }

}

impl ProviderClient for VisaClient {
    fn provider(&self) -> ProviderId {
        ProviderId::Visa
    }

    fn create_payment(&self, request: &PaymentRequest) -> BillPayResult<PaymentResult> {
        let millis = unix_millis();
        let local_time = Local::now().format("%Y-%m-%dT%H:%M:%S").to_string();
        let http = self.build_push_request(request, millis, &local_time)?;
        let card = request.extra.card_number.as_deref().unwrap_or_default();
        self.transfer(http, millis, card, request.amount)
    }

    /// Debit a card (pull funds)
    fn pull_funds(&self, amount: Vnd, card_number: &str, currency: &str) -> BillPayResult<PaymentResult> {
        if !amount.is_positive() {
            return Err(BillPayError::Validation(format!(
                "Amount must be greater than 0, got {}",
                amount
            )));
        }
        let check = validate_card_number(card_number);
        if !check.valid {
            return Err(BillPayError::Validation(format!(
                "Invalid card number: {}",
                check.message
            )));
        }
        let currency = currency_code(currency)?;

        let millis = unix_millis();
        let ids = TransferIds::from_millis(millis);
        let local_time = Local::now().format("%Y-%m-%dT%H:%M:%S").to_string();
        let body = serde_json::to_string(&PullBody {
            common: Self::common(&ids, amount, currency, &local_time),
            sender_account_number: &check.digits,
        })?;
        self.transfer(self.post(PULL_PATH, body), millis, &check.digits, amount)
    }

    fn query_payment(&self, order_id: &str) -> BillPayResult<PaymentStatus> {
        let transaction_id = require_id(order_id, "Transaction id")?;
        let body = serde_json::to_string(&QueryBody {
            acquirer_country_code: ACQUIRER_COUNTRY,
            acquiring_bin: ACQUIRING_BIN,
            transaction_identifier: transaction_id,
        })?;
        let value: Value = self
            .transport
            .execute(&self.post(QUERY_PATH, body))?
            .json(ProviderId::Visa)?;

        // The report endpoint may answer with a list of matching records
        let record = match value {
            Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
            Value::Array(_) => {
                return Err(BillPayError::rejected(
                    ProviderId::Visa,
                    "not_found",
                    format!("No transaction {}", transaction_id),
                ))
            }
            other => other,
        };
        let reply: QueryReply = serde_json::from_value(record)
            .map_err(|e| BillPayError::malformed(ProviderId::Visa, e.to_string()))?;

        let status = reply.transaction_status.unwrap_or_default();
        let state = match reply.action_code.as_deref() {
            Some(APPROVED) if status.is_empty() => PaymentState::Succeeded,
            _ => transfer_state(&status),
        };
        Ok(PaymentStatus {
            provider: ProviderId::Visa,
            order_id: transaction_id.to_string(),
            state,
            transaction_id: Some(transaction_id.to_string()),
            amount: reply.amount,
            result_code: reply.action_code.unwrap_or_else(|| status.clone()),
            message: match reply.approval_code {
                Some(code) => format!("{} (approval code {})", status, code),
                None => status,
            },
        })
    }
}
