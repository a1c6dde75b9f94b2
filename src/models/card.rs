//! Card number checks
//!
//! A local syntactic check only: a card that passes Luhn may still be
//! unknown to the network or unfunded.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Card network, used for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardNetwork {
    Visa,
    Mastercard,
    #[serde(rename = "American Express")]
    Amex,
    Unknown,
}

impl CardNetwork {
    fn from_leading_digit(digits: &str) -> Self {
        match digits.as_bytes().first() {
            Some(b'4') => Self::Visa,
            Some(b'5') => Self::Mastercard,
            Some(b'3') => Self::Amex,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for CardNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Visa => write!(f, "Visa"),
            Self::Mastercard => write!(f, "Mastercard"),
            Self::Amex => write!(f, "American Express"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Outcome of [`validate_card_number`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardCheck {
    pub valid: bool,
    pub network: CardNetwork,
    /// The number with everything but digits removed
    pub digits: String,
    pub message: String,
}

pub const MIN_CARD_DIGITS: usize = 13;
pub const MAX_CARD_DIGITS: usize = 19;

/// Validate a card number with the Luhn checksum
pub fn validate_card_number(input: &str) -> CardCheck {
    let digits: String = input.chars().filter(|c| c.is_ascii_digit()).collect();
    let network = CardNetwork::from_leading_digit(&digits);

    if digits.len() < MIN_CARD_DIGITS || digits.len() > MAX_CARD_DIGITS {
        return CardCheck {
            valid: false,
            network,
            message: format!(
                "Card number must have {}-{} digits, got {}",
                MIN_CARD_DIGITS,
                MAX_CARD_DIGITS,
                digits.len()
            ),
            digits,
        };
    }

    let valid = luhn_checksum(&digits) == 0;
    CardCheck {
        valid,
        network,
        message: if valid {
            "Card number is valid".to_string()
        } else {
            "Card number failed the checksum".to_string()
        },
        digits,
    }
}

/// Luhn checksum of an all-digit string (0 means valid)
fn luhn_checksum(digits: &str) -> u32 {
    digits
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let d = u32::from(b - b'0');
            if i % 2 == 1 {
                let doubled = d * 2;
                doubled / 10 + doubled % 10
            } else {
                d
            }
        })
        .sum::<u32>()
        % 10
}

/// Mask all but the last four digits
pub fn mask_card_number(digits: &str) -> String {
    crate::crypto::secure_memory::mask(digits)
}
