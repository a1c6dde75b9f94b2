//! Activity logging for billpay
//!
//! Records every provider call and configuration change in an append-only
//! log of line-delimited JSON (`activity.log`).
//!
//! # Example
//!
//! ```rust,ignore
//! use billpay::audit::{Action, ActivityEntry, ActivityLogger};
//!
//! let logger = ActivityLogger::new(paths.activity_log());
//! let result = client.query_payment("PAYOO_1700000000000");
//! logger.record(&ActivityEntry::from_result(
//!     Action::Query,
//!     Some(ProviderId::Momo),
//!     "PAYOO_1700000000000",
//!     &result,
//!     "Queried",
//! ));
//! ```

mod entry;
mod logger;

pub use entry::{Action, ActivityEntry};
pub use logger::ActivityLogger;
