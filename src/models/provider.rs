//! Provider identifiers and environments

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The four payment backends billpay talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// BIDV open-banking bill inquiry
    Bidv,
    /// MoMo business wallet
    Momo,
    /// ZaloPay business wallet
    #[serde(rename = "zalopay")]
    ZaloPay,
    /// Visa Direct funds transfer
    Visa,
}

impl ProviderId {
    pub const ALL: [ProviderId; 4] = [
        ProviderId::Bidv,
        ProviderId::Momo,
        ProviderId::ZaloPay,
        ProviderId::Visa,
    ];

    /// Lowercase key used in config files and on the command line
    pub fn key(&self) -> &'static str {
        match self {
            Self::Bidv => "bidv",
            Self::Momo => "momo",
            Self::ZaloPay => "zalopay",
            Self::Visa => "visa",
        }
    }

    /// Key of this provider's section in the secure store
    pub fn config_key(&self) -> String {
        format!("{}_api", self.key())
    }

    /// Credential fields that must be present before any call
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Bidv => &["api_key", "api_secret"],
            Self::Momo => &["partner_code", "access_key", "secret_key"],
            Self::ZaloPay => &["app_id", "key1", "key2"],
            Self::Visa => &["user_id", "password"],
        }
    }

    /// Credential fields that may be supplied
    pub fn optional_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Bidv => &["api_url"],
            Self::Momo => &["redirect_url", "ipn_url"],
            Self::ZaloPay => &["callback_url", "redirect_url"],
            Self::Visa => &["cert_path", "key_path"],
        }
    }

    /// Whether a named field holds secret material
    pub fn is_secret_field(&self, field: &str) -> bool {
        matches!(
            field,
            "api_secret" | "secret_key" | "access_key" | "key1" | "key2" | "password"
        )
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bidv => "BIDV",
            Self::Momo => "MoMo",
            Self::ZaloPay => "ZaloPay",
            Self::Visa => "Visa Direct",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "bidv" => Ok(Self::Bidv),
            "momo" => Ok(Self::Momo),
            "zalopay" | "zalo" => Ok(Self::ZaloPay),
            "visa" | "visadirect" => Ok(Self::Visa),
            other => Err(format!(
                "Unknown provider '{}'. Expected one of: bidv, momo, zalopay, visa",
                other
            )),
        }
    }
}

/// Which provider base URL to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Sandbox,
    Production,
}

impl Environment {
    pub fn is_sandbox(&self) -> bool {
        matches!(self, Self::Sandbox)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sandbox => write!(f, "sandbox"),
            Self::Production => write!(f, "production"),
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sandbox" | "test" => Ok(Self::Sandbox),
            "production" | "prod" | "live" => Ok(Self::Production),
            other => Err(format!("Unknown environment '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider() {
        assert_eq!("MoMo".parse::<ProviderId>().unwrap(), ProviderId::Momo);
        assert_eq!("zalo-pay".parse::<ProviderId>().unwrap(), ProviderId::ZaloPay);
        assert_eq!("Visa Direct".parse::<ProviderId>().unwrap(), ProviderId::Visa);
        assert!("paypal".parse::<ProviderId>().is_err());
    }

    #[test]
    fn test_serde_keys() {
        let json = serde_json::to_string(&ProviderId::ZaloPay).unwrap();
        assert_eq!(json, "\"zalopay\"");
        assert_eq!(ProviderId::ZaloPay.config_key(), "zalopay_api");
    }

    #[test]
    fn test_secret_fields() {
        assert!(ProviderId::Momo.is_secret_field("secret_key"));
        assert!(!ProviderId::Momo.is_secret_field("partner_code"));
    }

    #[test]
    fn test_environment_default() {
        assert_eq!(Environment::default(), Environment::Sandbox);
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
    }
}
