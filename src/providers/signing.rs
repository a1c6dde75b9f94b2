//! Request signing
//!
//! Three of the four providers sign a canonical string with HMAC-SHA256 and
//! send the lowercase hex digest. The canonical string is built from an
//! explicit, provider-defined field order; it is never sorted and never
//! inferred from a map's iteration order.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;

use crate::error::{BillPayError, BillPayResult};

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 of `message` under `secret`, hex-encoded
pub fn hmac_sha256_hex(secret: &str, message: &str) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC-SHA256 accepts any key length"),
    };
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Check a hex MAC against `message` in constant time
///
/// Returns false for anything that is not valid hex.
pub fn verify_hmac_sha256_hex(secret: &str, message: &str, provided_hex: &str) -> bool {
    let provided = match hex::decode(provided_hex.trim()) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(message.as_bytes());
    mac.verify_slice(&provided).is_ok()
}

/// How fields are rendered into the canonical string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalStyle {
    /// `name=value` pairs joined by the delimiter (MoMo)
    KeyValue(&'static str),
    /// Bare values joined by the delimiter (ZaloPay, BIDV)
    ValuesOnly(&'static str),
}

/// Builds the exact string a provider expects to be signed
#[derive(Debug, Clone)]
pub struct Canonical {
    order: &'static [&'static str],
    style: CanonicalStyle,
    values: HashMap<&'static str, String>,
}

impl Canonical {
    /// Start a canonical string with a fixed field order
    pub fn new(order: &'static [&'static str], style: CanonicalStyle) -> Self {
        Self {
            order,
            style,
            values: HashMap::with_capacity(order.len()),
        }
    }

    /// Set a field's value; the field must appear in the order
    pub fn field(mut self, name: &'static str, value: impl ToString) -> Self {
        self.values.insert(name, value.to_string());
        self
    }

    /// Render the string, failing if any ordered field was never set
    pub fn render(&self) -> BillPayResult<String> {
        let mut parts = Vec::with_capacity(self.order.len());
        for name in self.order {
            let value = self.values.get(name).ok_or_else(|| {
                BillPayError::Config(format!("canonical string is missing field '{}'", name))
            })?;
            parts.push(match self.style {
                CanonicalStyle::KeyValue(_) => format!("{}={}", name, value),
                CanonicalStyle::ValuesOnly(_) => value.clone(),
            });
        }
        if let Some(extra) = self.values.keys().find(|k| !self.order.contains(k)) {
            return Err(BillPayError::Config(format!(
                "field '{}' is not part of the canonical order",
                extra
            )));
        }
        let delimiter = match self.style {
            CanonicalStyle::KeyValue(d) | CanonicalStyle::ValuesOnly(d) => d,
        };
        Ok(parts.join(delimiter))
    }

    /// Render and sign in one step
    pub fn sign(&self, secret: &str) -> BillPayResult<String> {
        Ok(hmac_sha256_hex(secret, &self.render()?))
    }
}
