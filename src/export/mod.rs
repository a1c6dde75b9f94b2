//! Export module for billpay
//!
//! - Configuration: JSON settings export with opt-in (optionally sealed)
//!   credentials, import and timestamped backups
//! - CSV: payment history and multi-sheet payment reports

pub mod config;
pub mod csv;

pub use self::config::{backup_config, export_config, import_config, ConfigExport, ExportSummary, ImportSummary};
pub use self::csv::{create_payment_report, export_payment_history};
