//! MoMo business wallet (API v2)
//!
//! Every request carries a signature over `key=value` pairs joined with `&`
//! in the fixed order MoMo documents for that endpoint.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::signing::{Canonical, CanonicalStyle};
use super::transport::{HttpRequest, Transport};
use super::wire::{de_code, de_opt_amount, de_opt_string};
use super::{require_id, unix_millis, ProviderClient};
use crate::crypto::SecureString;
use crate::error::{BillPayError, BillPayResult};
use crate::models::{
    Credential, PaymentRequest, PaymentResult, PaymentState, PaymentStatus, ProviderId,
    RefundRequest, RefundResult, Vnd,
};

pub const SANDBOX_URL: &str = "https://test-payment.momo.vn/v2/gateway/api";
pub const PRODUCTION_URL: &str = "https://payment.momo.vn/v2/gateway/api";
pub const DEFAULT_REDIRECT_URL: &str = "https://payoo.vn/payment/success";
pub const DEFAULT_IPN_URL: &str = "https://payoo.vn/api/momo/ipn";

const REQUEST_TYPE: &str = "captureWallet";

const CREATE_ORDER: &[&str] = &[
    "accessKey",
    "amount",
    "extraData",
    "ipnUrl",
    "orderId",
    "orderInfo",
    "partnerCode",
    "redirectUrl",
    "requestId",
    "requestType",
];
const QUERY_ORDER: &[&str] = &["accessKey", "orderId", "partnerCode", "requestId"];
const REFUND_ORDER: &[&str] = &[
    "accessKey",
    "amount",
    "description",
    "orderId",
    "partnerCode",
    "requestId",
    "transId",
];

/// Ways a payer can fund a MoMo payment: (key, name, description)
pub const PAYMENT_METHODS: &[(&str, &str, &str)] = &[
    ("momo_wallet", "Ví MoMo", "Thanh toán qua ví điện tử MoMo"),
    ("momo_credit", "Thẻ tín dụng", "Thanh toán qua thẻ tín dụng liên kết MoMo"),
    ("momo_bank", "Tài khoản ngân hàng", "Thanh toán qua tài khoản ngân hàng liên kết"),
];

/// Immutable MoMo settings
#[derive(Debug, Clone)]
pub struct MomoConfig {
    pub partner_code: String,
    pub access_key: SecureString,
    pub secret_key: SecureString,
    pub endpoint: String,
    pub redirect_url: String,
    pub ipn_url: String,
}

impl MomoConfig {
    pub fn from_credential(credential: &Credential) -> BillPayResult<Self> {
        let endpoint = if credential.environment.is_sandbox() {
            SANDBOX_URL
        } else {
            PRODUCTION_URL
        };
        Ok(Self {
            partner_code: credential.require("partner_code")?.to_string(),
            access_key: SecureString::new(credential.require("access_key")?),
            secret_key: SecureString::new(credential.require("secret_key")?),
            endpoint: endpoint.to_string(),
            redirect_url: credential
                .get("redirect_url")
                .unwrap_or(DEFAULT_REDIRECT_URL)
                .to_string(),
            ipn_url: credential.get("ipn_url").unwrap_or(DEFAULT_IPN_URL).to_string(),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateBody<'a> {
    partner_code: &'a str,
    request_id: &'a str,
    amount: i64,
    order_id: &'a str,
    order_info: &'a str,
    redirect_url: &'a str,
    ipn_url: &'a str,
    request_type: &'a str,
    extra_data: &'a str,
    lang: &'a str,
    signature: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryBody<'a> {
    partner_code: &'a str,
    request_id: &'a str,
    order_id: &'a str,
    lang: &'a str,
    signature: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefundBody<'a> {
    partner_code: &'a str,
    request_id: &'a str,
    order_id: &'a str,
    amount: i64,
    trans_id: &'a str,
    description: &'a str,
    lang: &'a str,
    signature: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateReply {
    #[serde(deserialize_with = "de_code")]
    result_code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    pay_url: Option<String>,
    #[serde(default)]
    deeplink: Option<String>,
    #[serde(default)]
    qr_code_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryReply {
    #[serde(deserialize_with = "de_code")]
    result_code: i64,
    #[serde(default)]
    message: String,
    #[serde(default, deserialize_with = "de_opt_string")]
    trans_id: Option<String>,
    #[serde(default, deserialize_with = "de_opt_amount")]
    amount: Option<Vnd>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefundReply {
    #[serde(deserialize_with = "de_code")]
    result_code: i64,
    #[serde(default)]
    message: String,
    #[serde(default, deserialize_with = "de_opt_string")]
    trans_id: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    refund_id: Option<String>,
}

/// Map a query result code onto a payment state
///
/// Codes 10-99 describe a bad request rather than a payment and are
/// returned as `None`.
fn query_state(code: i64) -> Option<PaymentState> {
    match code {
        0 => Some(PaymentState::Succeeded),
        1000 | 7000 | 7002 | 9000 => Some(PaymentState::Pending),
        10..=99 => None,
        _ => Some(PaymentState::Failed),
    }
}

/// MoMo client
pub struct MomoClient {
    config: MomoConfig,
    transport: Arc<dyn Transport>,
}

impl MomoClient {
    pub fn new(config: MomoConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.endpoint, path)
    }

    /// Build the signed create request for fixed ids
    pub fn build_create_request(
        &self,
        request: &PaymentRequest,
        order_id: &str,
        request_id: &str,
    ) -> BillPayResult<HttpRequest> {
        let redirect_url = request
            .extra
            .redirect_url
            .as_deref()
            .unwrap_or(&self.config.redirect_url);
        let ipn_url = request
            .extra
            .callback_url
            .as_deref()
            .unwrap_or(&self.config.ipn_url);
        let amount = request.amount.dong();
        let extra_data = request.extra.extra_data.as_str();

        let signature = Canonical::new(CREATE_ORDER, CanonicalStyle::KeyValue("&"))
            .field("accessKey", self.config.access_key.expose())
            .field("amount", amount)
            .field("extraData", extra_data)
            .field("ipnUrl", ipn_url)
            .field("orderId", order_id)
            .field("orderInfo", &request.description)
            .field("partnerCode", &self.config.partner_code)
            .field("redirectUrl", redirect_url)
            .field("requestId", request_id)
            .field("requestType", REQUEST_TYPE)
            .sign(self.config.secret_key.expose())?;

        let body = serde_json::to_string(&CreateBody {
            partner_code: &self.config.partner_code,
            request_id,
            amount,
            order_id,
            order_info: &request.description,
            redirect_url,
            ipn_url,
            request_type: REQUEST_TYPE,
            extra_data,
            lang: "vi",
            signature,
        })?;
        Ok(HttpRequest::post_json(ProviderId::Momo, self.url("create"), body))
    }

    /// Build the signed query request for a fixed request id
    pub fn build_query_request(&self, order_id: &str, request_id: &str) -> BillPayResult<HttpRequest> {
        let signature = Canonical::new(QUERY_ORDER, CanonicalStyle::KeyValue("&"))
            .field("accessKey", self.config.access_key.expose())
            .field("orderId", order_id)
            .field("partnerCode", &self.config.partner_code)
            .field("requestId", request_id)
            .sign(self.config.secret_key.expose())?;

        let body = serde_json::to_string(&QueryBody {
            partner_code: &self.config.partner_code,
            request_id,
            order_id,
            lang: "vi",
            signature,
        })?;
        Ok(HttpRequest::post_json(ProviderId::Momo, self.url("query"), body))
    }

    /// Build the signed refund request
    ///
    /// `refund_order_id` is the new order MoMo records for the refund itself.
    pub fn build_refund_request(
        &self,
        refund_order_id: &str,
        request_id: &str,
        amount: Vnd,
        trans_id: &str,
        description: &str,
    ) -> BillPayResult<HttpRequest> {
        let signature = Canonical::new(REFUND_ORDER, CanonicalStyle::KeyValue("&"))
            .field("accessKey", self.config.access_key.expose())
            .field("amount", amount.dong())
            .field("description", description)
            .field("orderId", refund_order_id)
            .field("partnerCode", &self.config.partner_code)
            .field("requestId", request_id)
            .field("transId", trans_id)
            .sign(self.config.secret_key.expose())?;

        let body = serde_json::to_string(&RefundBody {
            partner_code: &self.config.partner_code,
            request_id,
            order_id: refund_order_id,
            amount: amount.dong(),
            trans_id,
            description,
            lang: "vi",
            signature,
        })?;
        Ok(HttpRequest::post_json(ProviderId::Momo, self.url("refund"), body))
    }
}

impl ProviderClient for MomoClient {
    fn provider(&self) -> ProviderId {
        ProviderId::Momo
    }

    fn create_payment(&self, request: &PaymentRequest) -> BillPayResult<PaymentResult> {
        request.validate()?;
        let order_id = format!("PAYOO_{}", unix_millis());
        let request_id = Uuid::new_v4().to_string();

        let http = self.build_create_request(request, &order_id, &request_id)?;
        let reply: CreateReply = self.transport.execute(&http)?.json(ProviderId::Momo)?;
        if reply.result_code != 0 {
            return Err(BillPayError::rejected(
                ProviderId::Momo,
                reply.result_code,
                reply.message,
            ));
        }

        info!(order_id = %order_id, amount = %request.amount, "MoMo payment created");
        Ok(PaymentResult {
            provider: ProviderId::Momo,
            order_id,
            transaction_id: None,
            pay_url: reply.pay_url,
            deep_link: reply.deeplink,
            qr_code: reply.qr_code_url,
            message: reply.message,
        })
    }

    fn query_payment(&self, order_id: &str) -> BillPayResult<PaymentStatus> {
        let order_id = require_id(order_id, "Order id")?;
        let request_id = Uuid::new_v4().to_string();

        let http = self.build_query_request(order_id, &request_id)?;
        let reply: QueryReply = self.transport.execute(&http)?.json(ProviderId::Momo)?;
        let state = query_state(reply.result_code).ok_or_else(|| {
            BillPayError::rejected(ProviderId::Momo, reply.result_code, reply.message.clone())
        })?;

        Ok(PaymentStatus {
            provider: ProviderId::Momo,
            order_id: order_id.to_string(),
            state,
            transaction_id: reply.trans_id,
            amount: reply.amount,
            result_code: reply.result_code.to_string(),
            message: reply.message,
        })
    }

    fn refund_payment(&self, request: &RefundRequest) -> BillPayResult<RefundResult> {
        request.validate()?;
        let trans_id = match &request.transaction_id {
            Some(id) => id.clone(),
            None => self.query_payment(&request.order_id)?.transaction_id.ok_or_else(|| {
                BillPayError::Validation(format!(
                    "MoMo has no transaction id for order {}",
                    request.order_id
                ))
            })?,
        };
        let refund_order_id = format!("REFUND_{}", unix_millis());
        let request_id = Uuid::new_v4().to_string();
        let description = request.description_or_default();

        let http = self.build_refund_request(
            &refund_order_id,
            &request_id,
            request.amount,
            &trans_id,
            &description,
        )?;
        let reply: RefundReply = self.transport.execute(&http)?.json(ProviderId::Momo)?;
        if reply.result_code != 0 {
            return Err(BillPayError::rejected(
                ProviderId::Momo,
                reply.result_code,
                reply.message,
            ));
        }

        info!(order_id = %request.order_id, amount = %request.amount, "MoMo refund accepted");
        Ok(RefundResult {
            provider: ProviderId::Momo,
            order_id: request.order_id.clone(),
            refund_request_id: refund_order_id,
            refund_id: reply.refund_id.or(reply.trans_id),
            result_code: reply.result_code.to_string(),
            message: reply.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Environment;
    use crate::providers::signing::hmac_sha256_hex;
    use crate::providers::transport::mock::MockTransport;
    use serde_json::json;

    const PARTNER: &str = "MOMOBKUN20180529";
    const ACCESS: &str = "klm05TvNBzhg7h7j";
    const SECRET: &str = "at67qH6mk8w5Y1nAyMoYKMWACiEi2bsa";

    fn credential() -> Credential {
        Credential::new(ProviderId::Momo, Environment::Sandbox)
            .with("partner_code", PARTNER)
            .with("access_key", ACCESS)
            .with("secret_key", SECRET)
    }

    fn client_with(mock: MockTransport) -> (MomoClient, Arc<MockTransport>) {
        let mock = Arc::new(mock);
        let config = MomoConfig::from_credential(&credential()).unwrap();
        (MomoClient::new(config, mock.clone()), mock)
    }

    #[test]
    fn test_config_defaults() {
        let config = MomoConfig::from_credential(&credential()).unwrap();
        assert_eq!(config.endpoint, SANDBOX_URL);
        assert_eq!(config.redirect_url, DEFAULT_REDIRECT_URL);
        assert_eq!(config.ipn_url, DEFAULT_IPN_URL);

        let mut prod = credential().with("ipn_url", "https://shop.example/ipn");
        prod.environment = Environment::Production;
        let config = MomoConfig::from_credential(&prod).unwrap();
        assert_eq!(config.endpoint, PRODUCTION_URL);
        assert_eq!(config.ipn_url, "https://shop.example/ipn");
    }

    #[test]
    fn test_create_signature_matches_documented_string() {
        let (client, _) = client_with(MockTransport::new());
        let request = PaymentRequest::new(Vnd::new(500_000), "Test");
        let http = client
            .build_create_request(&request, "PAYOO_1722500000000", "req-1")
            .unwrap();

        let raw = format!(
            "accessKey={}&amount=500000&extraData=&ipnUrl={}&orderId=PAYOO_1722500000000\
             &orderInfo=Test&partnerCode={}&redirectUrl={}&requestId=req-1&requestType=captureWallet",
            ACCESS, DEFAULT_IPN_URL, PARTNER, DEFAULT_REDIRECT_URL
        );
        let body = http.json_body().unwrap();
        assert_eq!(body["signature"], hmac_sha256_hex(SECRET, &raw));
        assert_eq!(body["amount"], 500_000);
        assert_eq!(body["partnerCode"], PARTNER);
        assert_eq!(body["requestType"], "captureWallet");
        assert!(body.get("accessKey").is_none());
        assert_eq!(http.url, format!("{}/create", SANDBOX_URL));
    }

    #[test]
    fn test_query_signature() {
        let (client, _) = client_with(MockTransport::new());
        let http = client.build_query_request("PAYOO_1", "req-2").unwrap();
        let raw = format!(
            "accessKey={}&orderId=PAYOO_1&partnerCode={}&requestId=req-2",
            ACCESS, PARTNER
        );
        assert_eq!(http.json_body().unwrap()["signature"], hmac_sha256_hex(SECRET, &raw));
    }

    #[test]
    fn test_create_payment_success() {
        let (client, mock) = client_with(MockTransport::new().reply(
            200,
            json!({
                "partnerCode": PARTNER,
                "resultCode": 0,
                "message": "Thành công.",
                "payUrl": "https://test-payment.momo.vn/pay/abc",
                "deeplink": "momo://app?abc",
                "qrCodeUrl": "00020101..."
            }),
        ));
        let result = client
            .create_payment(&PaymentRequest::new(Vnd::new(500_000), "Thanh toán hóa đơn"))
            .unwrap();
        assert!(result.order_id.starts_with("PAYOO_"));
        assert_eq!(result.pay_url.as_deref(), Some("https://test-payment.momo.vn/pay/abc"));
        assert_eq!(result.deep_link.as_deref(), Some("momo://app?abc"));

        let sent = mock.last_request().json_body().unwrap();
        assert_eq!(sent["orderId"], result.order_id.as_str());
    }

    #[test]
    fn test_create_payment_rejected() {
        let (client, _) = client_with(
            MockTransport::new().reply(200, json!({"resultCode": 1001, "message": "Insufficient balance"})),
        );
        let err = client
            .create_payment(&PaymentRequest::new(Vnd::new(500_000), "Test"))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "MoMo rejected the request (1001): Insufficient balance"
        );
    }

    #[test]
    fn test_invalid_amount_never_reaches_network() {
        let (client, mock) = client_with(MockTransport::new());
        let err = client
            .create_payment(&PaymentRequest::new(Vnd::zero(), "Test"))
            .unwrap_err();
        assert!(err.is_validation());
        assert!(mock.requests().is_empty());
    }

    #[test]
    fn test_http_error_and_malformed_body() {
        let (client, _) = client_with(MockTransport::new().reply_raw(500, "oops"));
        let err = client.query_payment("PAYOO_1").unwrap_err();
        assert!(matches!(err, BillPayError::HttpStatus { status: 500, .. }));

        let (client, _) = client_with(MockTransport::new().reply_raw(200, "not json"));
        let err = client.query_payment("PAYOO_1").unwrap_err();
        assert!(matches!(err, BillPayError::MalformedResponse { .. }));
    }

    #[test]
    fn test_query_states() {
        let (client, _) = client_with(
            MockTransport::new()
                .reply(200, json!({"resultCode": 0, "message": "ok", "transId": 2547837452_i64, "amount": 500000}))
                .reply(200, json!({"resultCode": 1000, "message": "waiting"}))
                .reply(200, json!({"resultCode": 1006, "message": "user declined"}))
                .reply(200, json!({"resultCode": 42, "message": "order not found"})),
        );
        let paid = client.query_payment("PAYOO_1").unwrap();
        assert_eq!(paid.state, PaymentState::Succeeded);
        assert_eq!(paid.transaction_id.as_deref(), Some("2547837452"));
        assert_eq!(paid.amount, Some(Vnd::new(500_000)));

        assert_eq!(client.query_payment("PAYOO_1").unwrap().state, PaymentState::Pending);
        assert_eq!(client.query_payment("PAYOO_1").unwrap().state, PaymentState::Failed);
        assert!(matches!(
            client.query_payment("PAYOO_1").unwrap_err(),
            BillPayError::Rejected { .. }
        ));
    }

    #[test]
    fn test_refund_looks_up_transaction_id() {
        let (client, mock) = client_with(
            MockTransport::new()
                .reply(200, json!({"resultCode": 0, "message": "ok", "transId": 2547837452_i64}))
                .reply(200, json!({"resultCode": 0, "message": "Thành công.", "transId": 2547900000_i64})),
        );
        let result = client
            .refund_payment(&RefundRequest::new("PAYOO_1", Vnd::new(100_000)))
            .unwrap();
        assert_eq!(result.order_id, "PAYOO_1");
        assert_eq!(result.refund_id.as_deref(), Some("2547900000"));
        assert!(result.refund_request_id.starts_with("REFUND_"));

        let requests = mock.requests();
        assert_eq!(requests.len(), 2);
        let refund = requests[1].json_body().unwrap();
        assert_eq!(refund["transId"], "2547837452");
        assert_eq!(refund["description"], "Hoàn tiền đơn hàng PAYOO_1");

        let raw = format!(
            "accessKey={}&amount=100000&description=Hoàn tiền đơn hàng PAYOO_1&orderId={}\
             &partnerCode={}&requestId={}&transId=2547837452",
            ACCESS,
            refund["orderId"].as_str().unwrap(),
            PARTNER,
            refund["requestId"].as_str().unwrap()
        );
        assert_eq!(refund["signature"], hmac_sha256_hex(SECRET, &raw));
    }

    #[test]
    fn test_refund_with_known_transaction_id_skips_query() {
        let (client, mock) = client_with(
            MockTransport::new().reply(200, json!({"resultCode": 0, "message": "ok"})),
        );
        let mut request = RefundRequest::new("PAYOO_1", Vnd::new(100_000));
        request.transaction_id = Some("999".into());
        client.refund_payment(&request).unwrap();
        assert_eq!(mock.requests().len(), 1);
    }

    #[test]
    fn test_connection_test_reachable_on_rejection() {
        let (client, _) = client_with(
            MockTransport::new().reply(200, json!({"resultCode": 42, "message": "not found"})),
        );
        assert!(client.test_connection().reachable);

        let (client, _) = client_with(
            MockTransport::new().fail(BillPayError::transport(ProviderId::Momo, "timed out")),
        );
        assert!(!client.test_connection().reachable);
    }

    #[test]
    fn test_lookup_unsupported() {
        let (client, _) = client_with(MockTransport::new());
        assert!(matches!(
            client.lookup_bill("PD1").unwrap_err(),
            BillPayError::Unsupported { .. }
        ));
    }
}
