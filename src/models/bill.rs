//! Bill lookup value objects

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::money::Vnd;

/// Kind of utility bill
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillType {
    Electric,
    Water,
    Internet,
    Tv,
    #[serde(untagged)]
    Other(String),
}

impl BillType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Electric => "electric",
            Self::Water => "water",
            Self::Internet => "internet",
            Self::Tv => "tv",
            Self::Other(s) => s,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl fmt::Display for BillType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BillType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("Bill type is empty".to_string());
        }
        Ok(match s.to_lowercase().as_str() {
            "electric" | "electricity" | "dien" | "điện" => Self::Electric,
            "water" | "nuoc" | "nước" => Self::Water,
            "internet" => Self::Internet,
            "tv" | "television" | "cable" => Self::Tv,
            other => Self::Other(other.to_string()),
        })
    }
}

/// Bill number helpers for the `AA00000000000` format used by billers
pub struct BillNumber;

impl BillNumber {
    /// Two uppercase letters followed by eleven digits, e.g. `PD29007350490`
    pub fn is_well_formed(number: &str) -> bool {
        let bytes = number.as_bytes();
        bytes.len() == 13
            && bytes[..2].iter().all(|b| b.is_ascii_uppercase())
            && bytes[2..].iter().all(|b| b.is_ascii_digit())
    }

    /// Bill type from the two-letter prefix
    pub fn infer_bill_type(number: &str) -> Option<BillType> {
        match number.get(..2)? {
            "PD" => Some(BillType::Electric),
            "WB" => Some(BillType::Water),
            "IT" => Some(BillType::Internet),
            "TV" => Some(BillType::Tv),
            _ => None,
        }
    }

    /// Biller id from prefix and region code (`29` is Ho Chi Minh City)
    pub fn infer_biller(number: &str) -> Option<&'static str> {
        let prefix = number.get(..2)?;
        let hcm = number.get(2..4) == Some("29");
        match prefix {
            "PD" if hcm => Some("EVN_HCMC"),
            "PD" => Some("EVN_HANOI"),
            "WB" if hcm => Some("SAWACO"),
            "WB" => Some("HAWACO"),
            "IT" => Some("FPT"),
            "TV" => Some("VTVCab"),
            _ => None,
        }
    }
}

/// Bill attributes as reported by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub bill_number: String,
    pub bill_type: BillType,
    pub provider: String,
    pub amount: Vnd,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_index: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_index: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumption: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taxes: Option<Vnd>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fees: Option<Vnd>,
    #[serde(default)]
    pub description: String,
}

/// Customer attributes attached to a bill
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Customer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A successful bill lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillLookup {
    pub bill: Bill,
    pub customer: Customer,
    /// Which backend answered, e.g. `bidv_api`
    pub source: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bill_type_parse() {
        assert_eq!("Electricity".parse::<BillType>().unwrap(), BillType::Electric);
        assert_eq!("television".parse::<BillType>().unwrap(), BillType::Tv);
        assert_eq!(
            "gas".parse::<BillType>().unwrap(),
            BillType::Other("gas".to_string())
        );
        assert!("  ".parse::<BillType>().is_err());
    }

    #[test]
    fn test_bill_type_serde() {
        assert_eq!(serde_json::to_string(&BillType::Water).unwrap(), "\"water\"");
        let other: BillType = serde_json::from_str("\"gas\"").unwrap();
        assert_eq!(other, BillType::Other("gas".to_string()));
    }

    #[test]
    fn test_bill_number_format() {
        assert!(BillNumber::is_well_formed("PD29007350490"));
        assert!(!BillNumber::is_well_formed("pd29007350490"));
        assert!(!BillNumber::is_well_formed("PD2900735049"));
        assert!(!BillNumber::is_well_formed("TEST123456"));
    }

    #[test]
    fn test_bill_number_inference() {
        assert_eq!(
            BillNumber::infer_bill_type("PD29007350490"),
            Some(BillType::Electric)
        );
        assert_eq!(BillNumber::infer_biller("PD29007350490"), Some("EVN_HCMC"));
        assert_eq!(BillNumber::infer_biller("PD01007350490"), Some("EVN_HANOI"));
        assert_eq!(BillNumber::infer_biller("WB29000000001"), Some("SAWACO"));
        assert_eq!(BillNumber::infer_bill_type("XX1"), None);
        assert_eq!(BillNumber::infer_bill_type("P"), None);
    }
}
