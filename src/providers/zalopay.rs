//! ZaloPay business wallet (API v2)
//!
//! Requests are form-encoded and carry a `mac` field: HMAC-SHA256 under
//! `key1` over `|`-joined values in the order ZaloPay documents for each
//! endpoint. Callbacks from ZaloPay are signed with `key2`.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::signing::{hmac_sha256_hex, verify_hmac_sha256_hex, Canonical, CanonicalStyle};
use super::transport::{HttpRequest, Transport};
use super::wire::{canonical_value, de_code, de_opt_amount, de_opt_i64, de_opt_string};
use super::{require_id, unix_millis, ProviderClient};
use crate::crypto::SecureString;
use crate::error::{BillPayError, BillPayResult};
use crate::models::{
    Credential, PaymentRequest, PaymentResult, PaymentState, PaymentStatus, ProviderId,
    RefundRequest, RefundResult, Vnd,
};

pub const SANDBOX_URL: &str = "https://sb-openapi.zalopay.vn/v2";
pub const PRODUCTION_URL: &str = "https://openapi.zalopay.vn/v2";
pub const DEFAULT_CALLBACK_URL: &str = "https://payoo.vn/api/zalopay/callback";
pub const DEFAULT_REDIRECT_URL: &str = "https://payoo.vn/payment/success";

const DEFAULT_APP_USER: &str = "Customer";
const PREFERRED_METHODS: &[&str] = &["zalopayapp", "cc", "atm"];

const CREATE_ORDER: &[&str] = &[
    "app_id",
    "app_trans_id",
    "app_user",
    "amount",
    "app_time",
    "embed_data",
    "item",
];
const QUERY_ORDER: &[&str] = &["app_id", "app_trans_id", "key1"];
const REFUND_ORDER: &[&str] = &["app_id", "zp_trans_id", "amount", "description", "timestamp"];
const QUICK_PAY_ORDER: &[&str] = &["app_id", "app_trans_id", "amount", "payment_code"];
const CALLBACK_ORDER: &[&str] = &[
    "app_trans_id",
    "amount",
    "app_time",
    "app_user",
    "embed_data",
    "item",
];

/// Funding sources offered on the ZaloPay gateway: (code, name, description)
pub const PAYMENT_METHODS: &[(&str, &str, &str)] = &[
    ("zalopayapp", "Ví ZaloPay", "Thanh toán qua ví điện tử ZaloPay"),
    ("cc", "Thẻ tín dụng", "Thanh toán qua thẻ tín dụng Visa/Mastercard"),
    ("atm", "Thẻ ATM", "Thanh toán qua thẻ ATM nội địa"),
];

/// Immutable ZaloPay settings
#[derive(Debug, Clone)]
pub struct ZaloPayConfig {
    pub app_id: String,
    pub key1: SecureString,
    pub key2: SecureString,
    pub endpoint: String,
    pub callback_url: String,
    pub redirect_url: String,
}

impl ZaloPayConfig {
    pub fn from_credential(credential: &Credential) -> BillPayResult<Self> {
        let endpoint = if credential.environment.is_sandbox() {
            SANDBOX_URL
        } else {
            PRODUCTION_URL
        };
        Ok(Self {
            app_id: credential.require("app_id")?.to_string(),
            key1: SecureString::new(credential.require("key1")?),
            key2: SecureString::new(credential.require("key2")?),
            endpoint: endpoint.to_string(),
            callback_url: credential
                .get("callback_url")
                .unwrap_or(DEFAULT_CALLBACK_URL)
                .to_string(),
            redirect_url: credential
                .get("redirect_url")
                .unwrap_or(DEFAULT_REDIRECT_URL)
                .to_string(),
        })
    }
}

/// A bank available through the ZaloPay gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZaloPayBank {
    pub bank_code: String,
    pub name: String,
    pub pmc_id: Option<String>,
}

#[derive(Serialize)]
struct EmbedData<'a> {
    redirecturl: &'a str,
    preferred_payment_method: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    userinfo: Option<UserInfo<'a>>,
}

#[derive(Serialize)]
struct UserInfo<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct Item<'a> {
    itemid: &'a str,
    itemname: &'a str,
    itemprice: i64,
    itemquantity: u32,
}

#[derive(Deserialize)]
struct Reply {
    #[serde(deserialize_with = "de_code")]
    return_code: i64,
    #[serde(default)]
    return_message: String,
    #[serde(default, deserialize_with = "de_opt_i64")]
    sub_return_code: Option<i64>,
    #[serde(default)]
    sub_return_message: Option<String>,
    #[serde(default)]
    order_url: Option<String>,
    #[serde(default)]
    zp_trans_token: Option<String>,
    #[serde(default)]
    order_token: Option<String>,
    #[serde(default)]
    qr_code: Option<String>,
    #[serde(default)]
    is_processing: Option<bool>,
    #[serde(default, deserialize_with = "de_opt_amount")]
    amount: Option<Vnd>,
    #[serde(default, deserialize_with = "de_opt_string")]
    zp_trans_id: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    refund_id: Option<String>,
}

impl Reply {
    fn message(&self) -> String {
        match self.sub_return_message.as_deref().filter(|s| !s.is_empty()) {
            Some(sub) if sub != self.return_message => format!("{} ({})", self.return_message, sub),
            _ => self.return_message.clone(),
        }
    }

    fn rejection(&self) -> BillPayError {
        let code = self.sub_return_code.unwrap_or(self.return_code);
        BillPayError::rejected(ProviderId::ZaloPay, code, self.message())
    }

    /// Payment state for query and quick-pay replies
    fn state(&self) -> Option<PaymentState> {
        match self.return_code {
            1 => Some(PaymentState::Succeeded),
            3 => Some(PaymentState::Pending),
            2 if self.is_processing == Some(true) => Some(PaymentState::Pending),
            2 => Some(PaymentState::Failed),
            _ => None,
        }
    }
}

/// Today's date in Vietnam (UTC+7) as `yymmdd`, the prefix ZaloPay requires
fn vn_date_prefix() -> String {
    (Utc::now() + ChronoDuration::hours(7))
        .format("%y%m%d")
        .to_string()
}

fn pairs(fields: &[(&str, String)]) -> Vec<(String, String)> {
    fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// ZaloPay client
pub struct ZaloPayClient {
    config: ZaloPayConfig,
    transport: Arc<dyn Transport>,
}

impl ZaloPayClient {
    pub fn new(config: ZaloPayConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.endpoint, path)
    }

    fn new_app_trans_id() -> String {
        format!("{}_{}", vn_date_prefix(), unix_millis())
    }

    /// Build the signed create-order request for fixed ids
    pub fn build_create_request(
        &self,
        request: &PaymentRequest,
        app_trans_id: &str,
        app_time: i64,
    ) -> BillPayResult<HttpRequest> {
        let amount = request.amount.dong();
        let app_user = request
            .extra
            .payer_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(DEFAULT_APP_USER);
        let embed_data = serde_json::to_string(&EmbedData {
            redirecturl: request
                .extra
                .redirect_url
                .as_deref()
                .unwrap_or(&self.config.redirect_url),
            preferred_payment_method: PREFERRED_METHODS,
            userinfo: request
                .extra
                .payer_name
                .as_deref()
                .map(|name| UserInfo { name }),
        })?;
        let item = serde_json::to_string(&[Item {
            itemid: "payoo_bill",
            itemname: "Thanh toán hóa đơn",
            itemprice: amount,
            itemquantity: 1,
        }])?;

        let mac = Canonical::new(CREATE_ORDER, CanonicalStyle::ValuesOnly("|"))
            .field("app_id", &self.config.app_id)
            .field("app_trans_id", app_trans_id)
            .field("app_user", app_user)
            .field("amount", amount)
            .field("app_time", app_time)
            .field("embed_data", &embed_data)
            .field("item", &item)
            .sign(self.config.key1.expose())?;

        let callback_url = request
            .extra
            .callback_url
            .as_deref()
            .unwrap_or(&self.config.callback_url);
        let form = pairs(&[
            ("app_id", self.config.app_id.clone()),
            ("app_trans_id", app_trans_id.to_string()),
            ("app_user", app_user.to_string()),
            ("app_time", app_time.to_string()),
            ("item", item),
            ("embed_data", embed_data),
            ("amount", amount.to_string()),
            ("description", request.description.clone()),
            ("bank_code", String::new()),
            ("callback_url", callback_url.to_string()),
            ("mac", mac),
        ]);
        Ok(HttpRequest::post_form(ProviderId::ZaloPay, self.url("create"), form))
    }

    pub fn build_query_request(&self, app_trans_id: &str) -> BillPayResult<HttpRequest> {
        let key1 = self.config.key1.expose();
        let mac = Canonical::new(QUERY_ORDER, CanonicalStyle::ValuesOnly("|"))
            .field("app_id", &self.config.app_id)
            .field("app_trans_id", app_trans_id)
            .field("key1", key1)
            .sign(key1)?;
        let form = pairs(&[
            ("app_id", self.config.app_id.clone()),
            ("app_trans_id", app_trans_id.to_string()),
            ("mac", mac),
        ]);
        Ok(HttpRequest::post_form(ProviderId::ZaloPay, self.url("query"), form))
    }

    /// Build the signed refund request; the description sent is the one signed
    pub fn build_refund_request(
        &self,
        m_refund_id: &str,
        zp_trans_id: &str,
        amount: Vnd,
        description: &str,
        timestamp: i64,
    ) -> BillPayResult<HttpRequest> {
        let mac = Canonical::new(REFUND_ORDER, CanonicalStyle::ValuesOnly("|"))
            .field("app_id", &self.config.app_id)
            .field("zp_trans_id", zp_trans_id)
            .field("amount", amount.dong())
            .field("description", description)
            .field("timestamp", timestamp)
            .sign(self.config.key1.expose())?;
        let form = pairs(&[
            ("app_id", self.config.app_id.clone()),
            ("zp_trans_id", zp_trans_id.to_string()),
            ("amount", amount.dong().to_string()),
            ("description", description.to_string()),
            ("timestamp", timestamp.to_string()),
            ("m_refund_id", m_refund_id.to_string()),
            ("mac", mac),
        ]);
        Ok(HttpRequest::post_form(ProviderId::ZaloPay, self.url("refund"), form))
    }

    pub fn build_quick_pay_request(
        &self,
        app_trans_id: &str,
        amount: Vnd,
        payment_code: &str,
    ) -> BillPayResult<HttpRequest> {
        let mac = Canonical::new(QUICK_PAY_ORDER, CanonicalStyle::ValuesOnly("|"))
            .field("app_id", &self.config.app_id)
            .field("app_trans_id", app_trans_id)
            .field("amount", amount.dong())
            .field("payment_code", payment_code)
            .sign(self.config.key1.expose())?;
        let form = pairs(&[
            ("app_id", self.config.app_id.clone()),
            ("app_trans_id", app_trans_id.to_string()),
            ("amount", amount.dong().to_string()),
            ("payment_code", payment_code.to_string()),
            ("mac", mac),
        ]);
        Ok(HttpRequest::post_form(ProviderId::ZaloPay, self.url("quickpay"), form))
    }

    fn send(&self, request: &HttpRequest) -> BillPayResult<Reply> {
        self.transport.execute(request)?.json(ProviderId::ZaloPay)
    }

    /// Banks the gateway can route ATM and card payments to
    pub fn bank_list(&self) -> BillPayResult<Vec<ZaloPayBank>> {
        let request = HttpRequest::get(ProviderId::ZaloPay, self.url("getbanklist"));
        let value: Value = self.transport.execute(&request)?.json(ProviderId::ZaloPay)?;
        let banks = value.get("banks").cloned().unwrap_or(Value::Null);

        let entries: Vec<(Option<String>, Value)> = match banks {
            Value::Object(groups) => groups
                .into_iter()
                .flat_map(|(pmc, list)| match list {
                    Value::Array(items) => items
                        .into_iter()
                        .map(|item| (Some(pmc.clone()), item))
                        .collect::<Vec<_>>(),
                    _ => Vec::new(),
                })
                .collect(),
            Value::Array(items) => items.into_iter().map(|item| (None, item)).collect(),
            Value::Null => Vec::new(),
            other => {
                return Err(BillPayError::malformed(
                    ProviderId::ZaloPay,
                    format!("unexpected banks value: {}", other),
                ))
            }
        };

        Ok(entries
            .into_iter()
            .filter_map(|(pmc, item)| {
                let field = |names: &[&str]| {
                    names
                        .iter()
                        .find_map(|n| item.get(*n))
                        .map(canonical_value)
                        .filter(|s| !s.is_empty())
                };
                Some(ZaloPayBank {
                    bank_code: field(&["bankcode", "bank_code"])?,
                    name: field(&["name", "bankname", "bank_name"]).unwrap_or_default(),
                    pmc_id: field(&["pmcid"]).or(pmc),
                })
            })
            .collect())
    }
}

impl ProviderClient for ZaloPayClient {
    fn provider(&self) -> ProviderId {
        ProviderId::ZaloPay
    }

    fn create_payment(&self, request: &PaymentRequest) -> BillPayResult<PaymentResult> {
        request.validate()?;
        let app_trans_id = Self::new_app_trans_id();
        let reply = self.send(&self.build_create_request(request, &app_trans_id, unix_millis())?)?;
        if reply.return_code != 1 {
            return Err(reply.rejection());
        }

        info!(app_trans_id = %app_trans_id, amount = %request.amount, "ZaloPay order created");
        let message = reply.message();
        Ok(PaymentResult {
            provider: ProviderId::ZaloPay,
            order_id: app_trans_id,
            transaction_id: reply.zp_trans_token,
            pay_url: reply.order_url,
            deep_link: reply.order_token,
            qr_code: reply.qr_code,
            message,
        })
    }

    fn query_payment(&self, order_id: &str) -> BillPayResult<PaymentStatus> {
        let app_trans_id = require_id(order_id, "Order id")?;
        let reply = self.send(&self.build_query_request(app_trans_id)?)?;
        let state = reply.state().ok_or_else(|| reply.rejection())?;
        Ok(PaymentStatus {
            provider: ProviderId::ZaloPay,
            order_id: app_trans_id.to_string(),
            state,
            transaction_id: reply.zp_trans_id.clone(),
            amount: reply.amount,
            result_code: reply.return_code.to_string(),
            message: reply.message(),
        })
    }

    /// Charge a payment code scanned from the payer's ZaloPay app
    fn quick_pay(&self, amount: Vnd, payment_code: &str) -> BillPayResult<PaymentStatus> {
        if !amount.is_positive() {
            return Err(BillPayError::Validation(format!(
                "Amount must be greater than 0, got {}",
                amount
            )));
        }
        let payment_code = require_id(payment_code, "Payment code")?;
        let app_trans_id = Self::new_app_trans_id();

        let reply = self.send(&self.build_quick_pay_request(&app_trans_id, amount, payment_code)?)?;
        let state = reply.state().ok_or_else(|| reply.rejection())?;
        if state == PaymentState::Failed {
            return Err(reply.rejection());
        }
        Ok(PaymentStatus {
            provider: ProviderId::ZaloPay,
            order_id: app_trans_id,
            state,
            transaction_id: reply.zp_trans_id.clone(),
            amount: Some(amount),
            result_code: reply.return_code.to_string(),
            message: reply.message(),
        })
    }

    fn refund_payment(&self, request: &RefundRequest) -> BillPayResult<RefundResult> {
        request.validate()?;
        let zp_trans_id = match &request.transaction_id {
            Some(id) => id.clone(),
            None => self.query_payment(&request.order_id)?.transaction_id.ok_or_else(|| {
                BillPayError::Validation(format!(
                    "ZaloPay has no transaction id for order {}",
                    request.order_id
                ))
            })?,
        };
        let timestamp = unix_millis();
        let m_refund_id = format!("{}_{}_{}", vn_date_prefix(), self.config.app_id, timestamp);
        let description = request.description_or_default();

        let reply = self.send(&self.build_refund_request(
            &m_refund_id,
            &zp_trans_id,
            request.amount,
            &description,
            timestamp,
        )?)?;
        // 1 = refunded, 3 = refund in progress
        if !matches!(reply.return_code, 1 | 3) {
            return Err(reply.rejection());
        }

        info!(order_id = %request.order_id, amount = %request.amount, "ZaloPay refund accepted");
        Ok(RefundResult {
            provider: ProviderId::ZaloPay,
            order_id: request.order_id.clone(),
            refund_request_id: m_refund_id,
            refund_id: reply.refund_id.clone(),
            result_code: reply.return_code.to_string(),
            message: reply.message(),
        })
    }

    /// Verify a ZaloPay callback with `key2`
    ///
    /// Accepts the gateway's `{data, mac}` envelope, where the MAC covers the
    /// raw `data` string, and the flat form whose MAC covers
    /// `app_trans_id|amount|app_time|app_user|embed_data|item`. A payload
    /// lacking the mac or a signed field is reported as not verified.
    fn verify_callback(&self, payload: &Value) -> BillPayResult<bool> {
        let object = payload.as_object().ok_or_else(|| {
            BillPayError::Validation("Callback payload must be a JSON object".to_string())
        })?;
        let Some(mac) = object.get("mac").and_then(Value::as_str) else {
            warn!("ZaloPay callback has no mac");
            return Ok(false);
        };
        let key2 = self.config.key2.expose();

        let message = match object.get("data") {
            Some(Value::String(data)) => data.clone(),
            _ => {
                let mut canonical = Canonical::new(CALLBACK_ORDER, CanonicalStyle::ValuesOnly("|"));
                for name in CALLBACK_ORDER {
                    let Some(value) = object.get(*name) else {
                        warn!(field = %name, "ZaloPay callback is missing a signed field");
                        return Ok(false);
                    };
                    canonical = canonical.field(*name, canonical_value(value));
                }
                canonical.render()?
            }
        };

        let valid = verify_hmac_sha256_hex(key2, &message, mac);
        if !valid {
            warn!("ZaloPay callback failed MAC verification");
        }
        Ok(valid)
    }
}

/// Sign a callback payload the way ZaloPay does; used to test receivers
pub fn sign_callback(key2: &str, payload: &serde_json::Map<String, Value>) -> BillPayResult<String> {
    let mut canonical = Canonical::new(CALLBACK_ORDER, CanonicalStyle::ValuesOnly("|"));
    for name in CALLBACK_ORDER {
        let value = payload
            .get(*name)
            .ok_or_else(|| BillPayError::Validation(format!("Callback is missing '{}'", name)))?;
        canonical = canonical.field(*name, canonical_value(value));
    }
    Ok(hmac_sha256_hex(key2, &canonical.render()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Environment;
    use crate::providers::transport::mock::MockTransport;
    use serde_json::json;

    const APP_ID: &str = "2553";
    const KEY1: &str = "PcY4iZIKFCIdgZvA6ueMcMHHUbRLYjPL";
    const KEY2: &str = "kLtgPl8HHhfvMuDHPwKfgfsY4Ydm9eIz";

    fn credential() -> Credential {
        Credential::new(ProviderId::ZaloPay, Environment::Sandbox)
            .with("app_id", APP_ID)
            .with("key1", KEY1)
            .with("key2", KEY2)
    }

    fn client_with(mock: MockTransport) -> (ZaloPayClient, Arc<MockTransport>) {
        let mock = Arc::new(mock);
        let config = ZaloPayConfig::from_credential(&credential()).unwrap();
        (ZaloPayClient::new(config, mock.clone()), mock)
    }

    #[test]
    fn test_create_mac_covers_documented_fields() {
        let (client, _) = client_with(MockTransport::new());
        let request = PaymentRequest::new(Vnd::new(50_000), "Thanh toán hóa đơn điện");
        let http = client
            .build_create_request(&request, "240801_1722500000000", 1722500000000)
            .unwrap();

        let embed = http.form_value("embed_data").unwrap();
        let item = http.form_value("item").unwrap();
        assert_eq!(
            embed,
            r#"{"redirecturl":"https://payoo.vn/payment/success","preferred_payment_method":["zalopayapp","cc","atm"]}"#
        );
        assert!(item.contains(r#""itemprice":50000"#));

        let raw = format!(
            "{}|240801_1722500000000|Customer|50000|1722500000000|{}|{}",
            APP_ID, embed, item
        );
        assert_eq!(http.form_value("mac"), Some(hmac_sha256_hex(KEY1, &raw).as_str()));
        assert_eq!(http.form_value("callback_url"), Some(DEFAULT_CALLBACK_URL));
        assert_eq!(http.form_value("amount"), Some("50000"));
        assert_eq!(http.url, format!("{}/create", SANDBOX_URL));
    }

    #[test]
    fn test_create_success_and_rejection() {
        let (client, _) = client_with(
            MockTransport::new()
                .reply(
                    200,
                    json!({
                        "return_code": 1,
                        "return_message": "Giao dịch thành công",
                        "order_url": "https://qcgateway.zalopay.vn/openinapp?order=abc",
                        "zp_trans_token": "ACsJ1Xk",
                        "order_token": "ACsJ1Xk",
                        "qr_code": "00020101021226520010vn.zalopay"
                    }),
                )
                .reply(
                    200,
                    json!({
                        "return_code": 2,
                        "return_message": "Giao dịch thất bại",
                        "sub_return_code": -401,
                        "sub_return_message": "Dữ liệu yêu cầu không hợp lệ"
                    }),
                ),
        );
        let request = PaymentRequest::new(Vnd::new(50_000), "Test");
        let created = client.create_payment(&request).unwrap();
        assert!(created.order_id.contains('_'));
        assert_eq!(
            created.pay_url.as_deref(),
            Some("https://qcgateway.zalopay.vn/openinapp?order=abc")
        );

        let err = client.create_payment(&request).unwrap_err();
        match err {
            BillPayError::Rejected { code, message, .. } => {
                assert_eq!(code, "-401");
                assert!(message.contains("không hợp lệ"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_query_mac_and_states() {
        let (client, mock) = client_with(
            MockTransport::new()
                .reply(200, json!({"return_code": 1, "return_message": "", "amount": 50000, "zp_trans_id": 240801000000123_i64}))
                .reply(200, json!({"return_code": 3, "return_message": "processing", "is_processing": true}))
                .reply(200, json!({"return_code": 2, "return_message": "failed", "is_processing": false})),
        );
        let paid = client.query_payment("240801_1").unwrap();
        assert_eq!(paid.state, PaymentState::Succeeded);
        assert_eq!(paid.transaction_id.as_deref(), Some("240801000000123"));

        let raw = format!("{}|240801_1|{}", APP_ID, KEY1);
        assert_eq!(
            mock.last_request().form_value("mac"),
            Some(hmac_sha256_hex(KEY1, &raw).as_str())
        );

        assert_eq!(client.query_payment("240801_1").unwrap().state, PaymentState::Pending);
        assert_eq!(client.query_payment("240801_1").unwrap().state, PaymentState::Failed);
    }

    #[test]
    fn test_refund_signs_the_description_it_sends() {
        let (client, mock) = client_with(
            MockTransport::new()
                .reply(200, json!({"return_code": 1, "zp_trans_id": "240801000000123"}))
                .reply(200, json!({"return_code": 3, "return_message": "refund processing", "refund_id": 1234567})),
        );
        let result = client
            .refund_payment(&RefundRequest::new("240801_1", Vnd::new(20_000)))
            .unwrap();
        assert_eq!(result.refund_id.as_deref(), Some("1234567"));
        assert!(result.refund_request_id.contains(&format!("_{}_", APP_ID)));

        let refund = mock.last_request();
        let description = refund.form_value("description").unwrap();
        assert_eq!(description, "Hoàn tiền đơn hàng 240801_1");
        let raw = format!(
            "{}|240801000000123|20000|{}|{}",
            APP_ID,
            description,
            refund.form_value("timestamp").unwrap()
        );
        assert_eq!(refund.form_value("mac"), Some(hmac_sha256_hex(KEY1, &raw).as_str()));
    }

    #[test]
    fn test_quick_pay() {
        let (client, mock) = client_with(
            MockTransport::new().reply(200, json!({"return_code": 1, "return_message": "ok"})),
        );
        let status = client.quick_pay(Vnd::new(10_000), "123456789012").unwrap();
        assert_eq!(status.state, PaymentState::Succeeded);

        let sent = mock.last_request();
        let raw = format!(
            "{}|{}|10000|123456789012",
            APP_ID,
            sent.form_value("app_trans_id").unwrap()
        );
        assert_eq!(sent.form_value("mac"), Some(hmac_sha256_hex(KEY1, &raw).as_str()));
        assert!(sent.url.ends_with("/quickpay"));

        assert!(client.quick_pay(Vnd::zero(), "1").unwrap_err().is_validation());
    }

    #[test]
    fn test_bank_list() {
        let (client, mock) = client_with(MockTransport::new().reply(
            200,
            json!({
                "returncode": 1,
                "banks": {
                    "38": [{"bankcode": "VCB", "name": "Vietcombank"}],
                    "36": [{"bankcode": "", "name": "broken"}, {"bankcode": "VISA", "name": "Visa"}]
                }
            }),
        ));
        let banks = client.bank_list().unwrap();
        assert_eq!(banks.len(), 2);
        assert!(banks
            .iter()
            .any(|b| b.bank_code == "VCB" && b.pmc_id.as_deref() == Some("38")));
        assert_eq!(mock.last_request().method, crate::providers::transport::Method::Get);
    }

    fn callback_payload() -> serde_json::Map<String, Value> {
        let payload = json!({
            "app_trans_id": "240801_1722500000000",
            "amount": 50000,
            "app_time": 1722500000000_i64,
            "app_user": "Customer",
            "embed_data": "{}",
            "item": "[]"
        });
        payload.as_object().unwrap().clone()
    }

    #[test]
    fn test_verify_flat_callback() {
        let (client, _) = client_with(MockTransport::new());
        let mut payload = callback_payload();
        let mac = sign_callback(KEY2, &payload).unwrap();
        payload.insert("mac".into(), Value::String(mac));

        assert!(client.verify_callback(&Value::Object(payload.clone())).unwrap());

        payload.insert("amount".into(), json!(50001));
        assert!(!client.verify_callback(&Value::Object(payload)).unwrap());
    }

    #[test]
    fn test_callback_signed_with_key1_is_rejected() {
        let (client, _) = client_with(MockTransport::new());
        let mut payload = callback_payload();
        let mac = sign_callback(KEY1, &payload).unwrap();
        payload.insert("mac".into(), Value::String(mac));
        assert!(!client.verify_callback(&Value::Object(payload)).unwrap());
    }

    #[test]
    fn test_verify_enveloped_callback() {
        let (client, _) = client_with(MockTransport::new());
        let data = r#"{"app_id":2553,"app_trans_id":"240801_1","amount":50000}"#;
        let good = json!({"data": data, "mac": hmac_sha256_hex(KEY2, data), "type": 1});
        assert!(client.verify_callback(&good).unwrap());

        let tampered = json!({"data": data.replace("50000", "5000"), "mac": hmac_sha256_hex(KEY2, data)});
        assert!(!client.verify_callback(&tampered).unwrap());
    }

    #[test]
    fn test_incomplete_callback_is_not_verified() {
        let (client, _) = client_with(MockTransport::new());
        assert!(client.verify_callback(&json!([1, 2])).unwrap_err().is_validation());
        assert!(!client
            .verify_callback(&json!({"app_trans_id": "x"}))
            .unwrap());
        assert!(!client
            .verify_callback(&json!({"app_trans_id": "x", "mac": "00"}))
            .unwrap());
    }
}
