//! User settings for billpay
//!
//! Plaintext preferences stored in `config.json`. Nothing in here is secret;
//! provider credentials live in the encrypted store.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::paths::BillPayPaths;
use crate::error::{BillPayError, BillPayResult};
use crate::models::ProviderId;
use crate::services::monitor::RefreshInterval;
use crate::storage::file_io::write_json_atomic;

/// General application preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub language: String,
    pub auto_save: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            language: "vi".to_string(),
            auto_save: true,
        }
    }
}

/// Provider call behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Kept for compatibility with older config files; calls are never retried
    pub retry_count: u32,
    /// Use sandbox endpoints unless a credential says otherwise
    pub sandbox_mode: bool,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            retry_count: 3,
            sandbox_mode: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentSettings {
    pub default_payment_method: ProviderId,
    pub auto_fill_customer_info: bool,
    /// Ask before sending a payment
    pub confirmation_required: bool,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            default_payment_method: ProviderId::Momo,
            auto_fill_customer_info: true,
            confirmation_required: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    pub max_records: usize,
    /// Drop the oldest records beyond `max_records` on save
    pub auto_cleanup: bool,
    pub export_format: String,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            max_records: 1000,
            auto_cleanup: true,
            export_format: "csv".to_string(),
        }
    }
}

/// Background status monitor and worker pool sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub refresh_interval: RefreshInterval,
    pub worker_threads: usize,
    pub queue_capacity: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            refresh_interval: RefreshInterval::default(),
            worker_threads: 4,
            queue_capacity: 32,
        }
    }
}

/// User settings for billpay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    #[serde(default, rename = "app_settings")]
    pub app: AppSettings,

    #[serde(default, rename = "api_settings")]
    pub api: ApiSettings,

    #[serde(default, rename = "payment_settings")]
    pub payment: PaymentSettings,

    #[serde(default, rename = "history_settings")]
    pub history: HistorySettings,

    #[serde(default, rename = "monitor_settings")]
    pub monitor: MonitorSettings,
}

fn default_schema_version() -> u32 {
    1
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            app: AppSettings::default(),
            api: ApiSettings::default(),
            payment: PaymentSettings::default(),
            history: HistorySettings::default(),
            monitor: MonitorSettings::default(),
        }
    }
}

/// Result of [`Settings::validate`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl Settings {
    /// Load settings from disk, or defaults if the file doesn't exist
    pub fn load_or_create(paths: &BillPayPaths) -> BillPayResult<Self> {
        let settings_path = paths.settings_file();
        if !settings_path.exists() {
            return Ok(Settings::default());
        }

        let contents = std::fs::read_to_string(&settings_path)
            .map_err(|e| BillPayError::Io(format!("Failed to read settings file: {}", e)))?;
        serde_json::from_str(&contents)
            .map_err(|e| BillPayError::Config(format!("Failed to parse settings file: {}", e)))
    }

    /// Save settings to disk
    pub fn save(&self, paths: &BillPayPaths) -> BillPayResult<()> {
        paths.ensure_directories()?;
        write_json_atomic(paths.settings_file(), self)?;
        tracing::debug!(path = %paths.settings_file().display(), "settings saved");
        Ok(())
    }

    fn to_value(&self) -> BillPayResult<Value> {
        serde_json::to_value(self)
            .map_err(|e| BillPayError::Config(format!("Failed to serialize settings: {}", e)))
    }

    /// Look up a value by dotted key, e.g. `api_settings.timeout_secs`
    pub fn get_setting(&self, key: &str) -> BillPayResult<Option<Value>> {
        let root = self.to_value()?;
        let mut current = &root;
        for part in key.split('.') {
            match current.get(part) {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current.clone()))
    }

    /// Set a value by dotted key
    ///
    /// `raw` is parsed as JSON when it can be (`30`, `true`, `"5m"`), and taken
    /// as a plain string otherwise. Unknown keys and values of the wrong type
    /// are rejected without changing `self`.
    pub fn set_setting(&mut self, key: &str, raw: &str) -> BillPayResult<()> {
        let parts: Vec<&str> = key.split('.').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(BillPayError::Validation(format!("Invalid setting key '{}'", key)));
        }

        let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));

        let mut root = self.to_value()?;
        let mut current = &mut root;
        for part in &parts {
            current = current
                .get_mut(*part)
                .ok_or_else(|| BillPayError::Validation(format!("Unknown setting '{}'", key)))?;
        }
        if current.is_object() {
            return Err(BillPayError::Validation(format!(
                "'{}' is a section; set one of its keys instead",
                key
            )));
        }
        *current = value;

        let updated: Settings = serde_json::from_value(root).map_err(|e| {
            BillPayError::Validation(format!("Invalid value '{}' for {}: {}", raw, key, e))
        })?;
        *self = updated;
        Ok(())
    }

    /// Check the settings for values that would break calls or look wrong
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        if self.api.timeout_secs == 0 {
            report.errors.push("api_settings.timeout_secs must be greater than 0".into());
        } else if self.api.timeout_secs > 120 {
            report.warnings.push(format!(
                "api_settings.timeout_secs is {}s; provider calls may hang for a long time",
                self.api.timeout_secs
            ));
        }

        if self.monitor.worker_threads == 0 {
            report.errors.push("monitor_settings.worker_threads must be at least 1".into());
        }
        if self.monitor.queue_capacity == 0 {
            report.errors.push("monitor_settings.queue_capacity must be at least 1".into());
        }

        if self.history.max_records == 0 {
            report.errors.push("history_settings.max_records must be at least 1".into());
        }
        if self.history.export_format != "csv" {
            report.warnings.push(format!(
                "history_settings.export_format '{}' is not supported; csv will be used",
                self.history.export_format
            ));
        }

        if !matches!(self.app.language.as_str(), "vi" | "en") {
            report.warnings.push(format!("Unknown language '{}'", self.app.language));
        }

        if !self.api.sandbox_mode {
            report.warnings.push("Sandbox mode is off: payments use production endpoints".into());
        }

        report
    }
}
