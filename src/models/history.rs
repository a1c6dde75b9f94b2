//! Payment history records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::bill::BillType;
use super::money::Vnd;
use super::payment::{PaymentResult, PaymentState, PaymentStatus};

/// Status of a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStatus {
    Success,
    Failed,
    Processing,
}

impl From<PaymentState> for HistoryStatus {
    fn from(state: PaymentState) -> Self {
        match state {
            PaymentState::Succeeded => Self::Success,
            PaymentState::Pending => Self::Processing,
            PaymentState::Failed => Self::Failed,
        }
    }
}

impl fmt::Display for HistoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
            Self::Processing => write!(f, "processing"),
        }
    }
}

impl FromStr for HistoryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "success" | "succeeded" => Ok(Self::Success),
            "failed" | "failure" => Ok(Self::Failed),
            "processing" | "pending" => Ok(Self::Processing),
            other => Err(format!("Unknown status '{}'", other)),
        }
    }
}

/// One paid (or attempted) bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub transaction_id: String,
    #[serde(default)]
    pub customer_id: String,
    #[serde(default)]
    pub customer_name: String,
    pub bill_type: BillType,
    /// Biller id, e.g. EVN_HCMC
    #[serde(default)]
    pub provider: String,
    pub amount: Vnd,
    /// Payment provider key, e.g. momo
    pub payment_method: String,
    pub status: HistoryStatus,
    pub payment_date: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
}

impl HistoryRecord {
    /// Record a freshly created payment; it stays processing until queried
    pub fn from_payment(
        result: &PaymentResult,
        amount: Vnd,
        bill_type: BillType,
        description: &str,
    ) -> Self {
        Self {
            transaction_id: result.order_id.clone(),
            customer_id: String::new(),
            customer_name: String::new(),
            bill_type,
            provider: String::new(),
            amount,
            payment_method: result.provider.key().to_string(),
            status: HistoryStatus::Processing,
            payment_date: Utc::now(),
            description: description.to_string(),
        }
    }

    /// Record a payment that already has a known state, e.g. a quick pay
    pub fn from_status(
        status: &PaymentStatus,
        amount: Vnd,
        bill_type: BillType,
        description: &str,
    ) -> Self {
        Self {
            transaction_id: status.order_id.clone(),
            customer_id: String::new(),
            customer_name: String::new(),
            bill_type,
            provider: String::new(),
            amount: status.amount.unwrap_or(amount),
            payment_method: status.provider.key().to_string(),
            status: status.state.into(),
            payment_date: Utc::now(),
            description: description.to_string(),
        }
    }
}
