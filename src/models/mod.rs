//! Core data models for billpay
//!
//! Value objects passed between the provider clients, the services and the
//! command-line shell.

pub mod bill;
pub mod card;
pub mod catalog;
pub mod credential;
pub mod history;
pub mod money;
pub mod payment;
pub mod provider;

pub use bill::{Bill, BillLookup, BillNumber, BillType, Customer};
pub use card::{validate_card_number, CardCheck, CardNetwork};
pub use catalog::{all_billers, billers_for, find_biller, Biller};
pub use credential::Credential;
pub use history::{HistoryRecord, HistoryStatus};
pub use money::{MoneyParseError, Vnd};
pub use payment::{
    ConnectionStatus, PaymentExtras, PaymentRequest, PaymentResult, PaymentState, PaymentStatus,
    RefundRequest, RefundResult,
};
pub use provider::{Environment, ProviderId};
