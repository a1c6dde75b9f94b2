//! Vietnamese đồng amounts
//!
//! VND has no minor unit in practice, so amounts are whole đồng stored as i64.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::ops::{Add, AddAssign};

/// A whole-đồng amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Vnd(i64);

impl Vnd {
    /// Create an amount from whole đồng
    ///
    /// # Examples
    /// ```
    /// use billpay::models::Vnd;
    /// let amount = Vnd::new(500_000);
    /// assert_eq!(amount.to_string(), "500,000 VND");
    /// ```
    pub const fn new(dong: i64) -> Self {
        Self(dong)
    }

    pub const fn zero() -> Self {
        Self(0)
    }

    pub const fn dong(&self) -> i64 {
        self.0
    }

    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Parse an amount as typed by a user or found in a spreadsheet cell
    ///
    /// Accepts "500000", "500,000", "500 000", "500000 VND", "500000đ" and
    /// spreadsheet floats with an all-zero fraction such as "500000.0".
    pub fn parse(s: &str) -> Result<Self, MoneyParseError> {
        let original = s;
        let s = s.trim();
        let s = s
            .strip_suffix("VND")
            .or_else(|| s.strip_suffix("VNĐ"))
            .or_else(|| s.strip_suffix("đ"))
            .unwrap_or(s)
            .trim();

        let (negative, s) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let (whole, fraction) = match s.split_once('.') {
            Some((w, f)) => (w, Some(f)),
            None => (s, None),
        };

        if let Some(fraction) = fraction {
            if fraction.is_empty() || !fraction.chars().all(|c| c == '0') {
                return Err(MoneyParseError::InvalidFormat(original.to_string()));
            }
        }

        let digits: String = whole
            .chars()
            .filter(|c| !matches!(c, ',' | '_' | ' '))
            .collect();

        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(MoneyParseError::InvalidFormat(original.to_string()));
        }

        let value: i64 = digits
            .parse()
            .map_err(|_| MoneyParseError::InvalidFormat(original.to_string()))?;

        Ok(Self(if negative { -value } else { value }))
    }

    /// Group digits with commas, without the currency suffix
    pub fn grouped(&self) -> String {
        let digits = self.0.unsigned_abs().to_string();
        let mut out = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                out.push(',');
            }
            out.push(ch);
        }
        if self.0 < 0 {
            format!("-{}", out)
        } else {
            out
        }
    }
}

impl FromStr for Vnd {
    type Err = MoneyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Vnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} VND", self.grouped())
    }
}

impl Add for Vnd {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self(self.0 + other.0)
    }
}

impl AddAssign for Vnd {
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl std::iter::Sum for Vnd {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Vnd::zero(), |acc, m| acc + m)
    }
}

/// Error type for money parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoneyParseError {
    InvalidFormat(String),
}

impl fmt::Display for MoneyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoneyParseError::InvalidFormat(s) => write!(f, "Invalid amount: '{}'", s),
        }
    }
}

impl std::error::Error for MoneyParseError {}
