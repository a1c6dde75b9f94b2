//! HTTP transport seam
//!
//! Clients build an [`HttpRequest`] value and hand it to a [`Transport`].
//! The production transport is a blocking reqwest client with a bounded
//! timeout; tests substitute a recording fake.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::debug;

use crate::error::{BillPayError, BillPayResult};
use crate::models::ProviderId;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Request body; JSON is held as the exact bytes that were signed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    Empty,
    Json(String),
    Form(Vec<(String, String)>),
}

/// A fully built, signed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub provider: ProviderId,
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl HttpRequest {
    pub fn get(provider: ProviderId, url: impl Into<String>) -> Self {
        Self {
            provider,
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn post_json(provider: ProviderId, url: impl Into<String>, body: String) -> Self {
        Self {
            provider,
            method: Method::Post,
            url: url.into(),
            headers: Vec::new(),
            body: RequestBody::Json(body),
        }
    }

    pub fn post_form(provider: ProviderId, url: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Self {
            provider,
            method: Method::Post,
            url: url.into(),
            headers: Vec::new(),
            body: RequestBody::Form(form),
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    /// Look up a header value
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Look up a form field
    pub fn form_value(&self, name: &str) -> Option<&str> {
        match &self.body {
            RequestBody::Form(pairs) => pairs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    /// Parse a JSON body
    pub fn json_body(&self) -> Option<serde_json::Value> {
        match &self.body {
            RequestBody::Json(s) => serde_json::from_str(s).ok(),
            _ => None,
        }
    }
}

/// A raw provider reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Require HTTP 200 and return the body
    pub fn expect_ok(&self, provider: ProviderId) -> BillPayResult<&str> {
        if self.status == 200 {
            Ok(&self.body)
        } else {
            Err(BillPayError::HttpStatus {
                provider,
                status: self.status,
                message: snippet(&self.body),
            })
        }
    }

    /// Require HTTP 200 and decode the JSON body
    pub fn json<T: serde::de::DeserializeOwned>(&self, provider: ProviderId) -> BillPayResult<T> {
        let body = self.expect_ok(provider)?;
        serde_json::from_str(body).map_err(|e| BillPayError::malformed(provider, e.to_string()))
    }
}

/// First 200 characters of a body, for error messages
fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty body".to_string();
    }
    trimmed.chars().take(200).collect()
}

/// Sends one request and returns the reply
pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> BillPayResult<HttpResponse>;
}

/// Client certificate for mutual TLS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Settings for [`ReqwestTransport`]
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub timeout: Duration,
    pub identity: Option<ClientIdentity>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            identity: None,
        }
    }
}

/// Blocking reqwest transport
pub struct ReqwestTransport {
    /// Build errors (bad client certificate) surface on the first call
    client: Result<Client, String>,
}

impl ReqwestTransport {
    pub fn new(options: TransportOptions) -> Self {
        Self {
            client: build_client(&options),
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new(TransportOptions::default())
    }
}

fn build_client(options: &TransportOptions) -> Result<Client, String> {
    let mut builder = Client::builder()
        .timeout(options.timeout)
        .user_agent(concat!("billpay/", env!("CARGO_PKG_VERSION")));

    if let Some(identity) = &options.identity {
        let mut pem = std::fs::read(&identity.key_path).map_err(|e| {
            format!(
                "cannot read client key {}: {}",
                identity.key_path.display(),
                e
            )
        })?;
        pem.push(b'\n');
        pem.extend(std::fs::read(&identity.cert_path).map_err(|e| {
            format!(
                "cannot read client certificate {}: {}",
                identity.cert_path.display(),
                e
            )
        })?);
        let identity = reqwest::Identity::from_pem(&pem)
            .map_err(|e| format!("invalid client certificate: {}", e))?;
        builder = builder.identity(identity);
    }

    builder.build().map_err(|e| e.to_string())
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: &HttpRequest) -> BillPayResult<HttpResponse> {
        let provider = request.provider;
        let client = self
            .client
            .as_ref()
            .map_err(|e| BillPayError::Config(format!("{}: {}", provider, e)))?;

        let mut builder = match request.method {
            Method::Get => client.get(&request.url),
            Method::Post => client.post(&request.url),
        };
        builder = builder.header(ACCEPT, "application/json");
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(body.clone()),
            RequestBody::Form(pairs) => builder.form(pairs),
        };

        debug!(provider = %provider, url = %request.url, "sending request");

        let response = builder.send().map_err(|e| {
            let message = if e.is_timeout() {
                format!("request timed out: {}", e)
            } else {
                e.to_string()
            };
            BillPayError::transport(provider, message)
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| BillPayError::transport(provider, format!("failed to read body: {}", e)))?;

        debug!(provider = %provider, status, "received response");
        Ok(HttpResponse { status, body })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expect_ok() {
        let ok = HttpResponse::new(200, "{}");
        assert_eq!(ok.expect_ok(ProviderId::Momo).unwrap(), "{}");

        let err = HttpResponse::new(503, "").expect_ok(ProviderId::Momo).unwrap_err();
        assert!(matches!(err, BillPayError::HttpStatus { status: 503, .. }));
        assert!(err.to_string().contains("empty body"));
    }

    #[test]
    fn test_json_malformed() {
        let err = HttpResponse::new(200, "<html>")
            .json::<serde_json::Value>(ProviderId::Visa)
            .unwrap_err();
        assert!(matches!(err, BillPayError::MalformedResponse { .. }));
    }

    #[test]
    fn test_request_accessors() {
        let req = HttpRequest::post_form(
            ProviderId::ZaloPay,
            "https://example.test/create",
            vec![("app_id".into(), "2553".into())],
        )
        .header("X-Trace", "1");
        assert_eq!(req.form_value("app_id"), Some("2553"));
        assert_eq!(req.header_value("x-trace"), Some("1"));
        assert!(req.json_body().is_none());
    }

    #[test]
    fn test_connection_refused_is_transport_error() {
        let transport = ReqwestTransport::new(TransportOptions {
            timeout: Duration::from_secs(2),
            identity: None,
        });
        let req = HttpRequest::post_json(ProviderId::Bidv, "http://127.0.0.1:9/bills", "{}".into());
        let err = transport.execute(&req).unwrap_err();
        assert!(matches!(err, BillPayError::Transport { .. }));
    }

    #[test]
    fn test_missing_client_certificate_is_config_error() {
        let transport = ReqwestTransport::new(TransportOptions {
            timeout: DEFAULT_TIMEOUT,
            identity: Some(ClientIdentity {
                cert_path: PathBuf::from("/nonexistent/cert.pem"),
                key_path: PathBuf::from("/nonexistent/key.pem"),
            }),
        });
        let req = HttpRequest::post_json(ProviderId::Visa, "http://127.0.0.1:9/", "{}".into());
        let err = transport.execute(&req).unwrap_err();
        assert!(matches!(err, BillPayError::Config(_)));
    }
}
