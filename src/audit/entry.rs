//! Activity entry data structures
//!
//! One entry per user-visible action: what was done, against which provider,
//! and how it ended. Entries carry identifiers and outcomes only, never
//! credential values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BillPayError, ErrorKind};
use crate::models::ProviderId;

/// Kinds of actions that are recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Lookup,
    Payment,
    Query,
    Refund,
    ConnectionTest,
    CallbackVerify,
    CredentialChange,
    SettingsChange,
    BulkImport,
    Export,
    Import,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Action::Lookup => "LOOKUP",
            Action::Payment => "PAYMENT",
            Action::Query => "QUERY",
            Action::Refund => "REFUND",
            Action::ConnectionTest => "TEST",
            Action::CallbackVerify => "CALLBACK",
            Action::CredentialChange => "CREDENTIALS",
            Action::SettingsChange => "SETTINGS",
            Action::BulkImport => "BULK_IMPORT",
            Action::Export => "EXPORT",
            Action::Import => "IMPORT",
        };
        f.write_str(label)
    }
}

/// A single activity log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// When the action finished (UTC)
    pub timestamp: DateTime<Utc>,

    pub action: Action,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderId>,

    /// Bill number, order id, file name or setting key
    #[serde(default)]
    pub subject: String,

    pub success: bool,

    /// Failure class when `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,

    pub message: String,
}

impl ActivityEntry {
    /// Entry for an action that succeeded
    pub fn success(
        action: Action,
        provider: Option<ProviderId>,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            provider,
            subject: subject.into(),
            success: true,
            kind: None,
            message: message.into(),
        }
    }

    /// Entry for an action that failed
    pub fn failure(
        action: Action,
        provider: Option<ProviderId>,
        subject: impl Into<String>,
        error: &BillPayError,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            provider,
            subject: subject.into(),
            success: false,
            kind: Some(error.kind()),
            message: error.to_string(),
        }
    }

    /// Entry from any result
    pub fn from_result<T>(
        action: Action,
        provider: Option<ProviderId>,
        subject: impl Into<String>,
        result: &Result<T, BillPayError>,
        success_message: &str,
    ) -> Self {
        match result {
            Ok(_) => Self::success(action, provider, subject, success_message),
            Err(e) => Self::failure(action, provider, subject, e),
        }
    }

    /// Format the entry for human-readable output
    pub fn format_human_readable(&self) -> String {
        let mut output = format!(
            "[{}] {} {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            if self.success { "OK  " } else { "FAIL" },
            self.action
        );
        if let Some(provider) = self.provider {
            output.push_str(&format!(" {}", provider));
        }
        if !self.subject.is_empty() {
            output.push_str(&format!(" {}", self.subject));
        }
        output.push_str(&format!(": {}", self.message));
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_entry_keeps_kind() {
        let err = BillPayError::transport(ProviderId::Bidv, "connection refused");
        let entry = ActivityEntry::failure(Action::Lookup, Some(ProviderId::Bidv), "PE01234567", &err);

        assert!(!entry.success);
        assert_eq!(entry.kind, Some(ErrorKind::Transport));
        assert_eq!(entry.message, "BIDV connection failed: connection refused");
    }

    #[test]
    fn test_serialization() {
        let entry = ActivityEntry::success(Action::Payment, Some(ProviderId::Momo), "PAYOO_1", "created");
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"action\":\"payment\""));
        assert!(json.contains("\"provider\":\"momo\""));
        assert!(!json.contains("\"kind\""));

        let back: ActivityEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_human_readable_format() {
        let entry = ActivityEntry::success(
            Action::ConnectionTest,
            Some(ProviderId::ZaloPay),
            "",
            "Connected",
        );
        let formatted = entry.format_human_readable();
        assert!(formatted.contains("OK"));
        assert!(formatted.contains("TEST ZaloPay: Connected"));
    }
}
