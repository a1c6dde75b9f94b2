//! CLI command handlers
//!
//! This module contains the implementation of CLI commands, bridging the clap
//! argument parsing with the provider clients and the service layer.

pub mod bulk;
pub mod config;
pub mod credentials;
pub mod history;
pub mod payment;
pub mod status;

use std::sync::Arc;

use serde::Serialize;

use crate::audit::{ActivityEntry, ActivityLogger};
use crate::config::{BillPayPaths, Settings};
use crate::error::{BillPayError, BillPayResult, CallOutcome};
use crate::services::{Dispatcher, PaymentHistory, ProviderRegistry, Task, TaskOutput, WorkerPool};
use crate::storage::SecureStore;

pub use bulk::{handle_bulk_command, BulkCommands};
pub use config::{handle_config_command, handle_init, ConfigCommands};
pub use credentials::{handle_credentials_command, CredentialCommands};
pub use history::{handle_history_command, HistoryCommands};
pub use payment::{
    handle_banks, handle_callback_command, handle_card, handle_lookup, handle_methods, handle_pay,
    handle_pull, handle_query, handle_refund, CallbackCommands, PayArgs, PullArgs, RefundArgs,
};
pub use status::{handle_status, StatusArgs};

/// Environment variable read before prompting for a passphrase
pub const PASSPHRASE_ENV: &str = "BILLPAY_PASSPHRASE";

/// Everything a command needs, loaded once per invocation
pub struct AppContext {
    pub paths: BillPayPaths,
    pub settings: Settings,
    pub store: SecureStore,
    pub activity: Arc<ActivityLogger>,
    /// Print results as JSON instead of tables
    pub json: bool,
}

impl AppContext {
    pub fn load(json: bool) -> BillPayResult<Self> {
        let paths = BillPayPaths::new()?;
        paths.ensure_directories()?;
        let settings = Settings::load_or_create(&paths)?;
        let store = SecureStore::open(&paths)?;
        let activity = Arc::new(ActivityLogger::new(paths.activity_log()));
        Ok(Self {
            paths,
            settings,
            store,
            activity,
            json,
        })
    }

    pub fn registry(&self) -> Arc<ProviderRegistry> {
        Arc::new(ProviderRegistry::from_store(&self.store, &self.settings))
    }

    /// Dispatcher over a fresh registry and a pool sized from the settings
    pub fn dispatcher(&self) -> BillPayResult<Dispatcher> {
        let pool = WorkerPool::new(
            self.settings.monitor.worker_threads,
            self.settings.monitor.queue_capacity,
        )?;
        Ok(Dispatcher::new(
            self.registry(),
            pool,
            Some(Arc::clone(&self.activity)),
        ))
    }

    /// Run one provider task on the worker pool
    pub fn run_task(&self, task: Task) -> BillPayResult<TaskOutput> {
        let dispatcher = self.dispatcher()?;
        let result = dispatcher.run(task);
        dispatcher.shutdown();
        result
    }

    pub fn history(&self) -> BillPayResult<PaymentHistory> {
        PaymentHistory::load(self.paths.history_file(), &self.settings.history)
    }

    pub fn record(&self, entry: ActivityEntry) {
        self.activity.record(&entry);
    }
}

#[derive(Serialize)]
struct JsonReport<'a, T: Serialize> {
    #[serde(flatten)]
    outcome: CallOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a T>,
}

/// Print a result the way the invocation asked for
///
/// With `--json` the uniform outcome is printed for failures too; the error
/// is still returned so the process exits non-zero.
pub fn emit<T: Serialize>(
    ctx: &AppContext,
    result: BillPayResult<T>,
    success_message: &str,
    render: impl FnOnce(&T) -> String,
) -> BillPayResult<()> {
    if ctx.json {
        let report = JsonReport {
            outcome: CallOutcome::from_result(&result, success_message),
            data: result.as_ref().ok(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if let Ok(value) = &result {
        print!("{}", render(value));
    }
    result.map(|_| ())
}

/// Print a plain success message (or its JSON outcome)
pub fn emit_message(ctx: &AppContext, message: &str) -> BillPayResult<()> {
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&CallOutcome::ok(message))?);
    } else {
        println!("{}", message);
    }
    Ok(())
}

/// Passphrase from `BILLPAY_PASSPHRASE`, else a hidden prompt
pub fn read_passphrase(prompt: &str) -> BillPayResult<String> {
    if let Ok(value) = std::env::var(PASSPHRASE_ENV) {
        if !value.is_empty() {
            return Ok(value);
        }
    }
    let value = rpassword::prompt_password(prompt)
        .map_err(|e| BillPayError::Encryption(format!("Failed to read passphrase: {}", e)))?;
    if value.is_empty() {
        return Err(BillPayError::Validation("Passphrase cannot be empty".into()));
    }
    Ok(value)
}

/// Ask for confirmation on stdin; anything but y/yes declines
pub fn confirm(question: &str) -> BillPayResult<bool> {
    use std::io::Write;

    print!("{} [y/N] ", question);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
