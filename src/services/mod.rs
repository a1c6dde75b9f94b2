//! Service layer for billpay
//!
//! Sits between the provider clients and the shell: keeps one client per
//! provider, runs calls on a bounded worker pool, polls provider status, and
//! handles bulk files and payment history.

pub mod bulk;
pub mod dispatcher;
pub mod history;
pub mod monitor;
pub mod registry;

pub use bulk::{BulkBill, BulkImport, RowError};
pub use dispatcher::{Dispatcher, Event, Task, TaskOutput, WorkerPool};
pub use history::{HistoryFilter, HistoryStatistics, PaymentHistory};
pub use monitor::{RefreshInterval, StatusBoard, StatusMonitor};
pub use registry::ProviderRegistry;
