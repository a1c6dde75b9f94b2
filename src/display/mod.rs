//! Display formatting for terminal output
//!
//! Turns results from the provider clients and services into tables and
//! detail views. Secret credential fields are always masked here.

pub mod config;
pub mod format;
pub mod history;
pub mod payment;
pub mod status;

pub use config::{format_billers, format_credentials, format_validation_report};
pub use history::{format_bulk_import, format_history_list, format_statistics};
pub use payment::{
    format_banks, format_bill_lookup, format_card_check, format_payment_methods,
    format_payment_result, format_payment_status, format_refund_result, payment_method_rows,
    PaymentMethodRow,
};
pub use status::{format_connection_statuses, format_status_board};
