//! Custom error types for billpay
//!
//! This module defines the error hierarchy for the application using thiserror
//! for ergonomic error definitions. Provider calls never panic or escape as
//! faults: every failure is one of these variants, and `kind()` maps it onto
//! the transport / status / body / validation / configuration taxonomy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::ProviderId;

/// The main error type for billpay operations
#[derive(Error, Debug, Clone)]
pub enum BillPayError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A provider credential is missing a required field
    #[error("{provider} is not configured: missing '{field}'")]
    MissingCredential {
        provider: ProviderId,
        field: &'static str,
    },

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Local validation errors, raised before any network call
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// Could not reach the provider (DNS, connect, TLS, timeout)
    #[error("{provider} connection failed: {message}")]
    Transport { provider: ProviderId, message: String },

    /// Provider answered with a non-success HTTP status
    #[error("{provider} returned HTTP {status}: {message}")]
    HttpStatus {
        provider: ProviderId,
        status: u16,
        message: String,
    },

    /// Provider body was not the JSON we expected
    #[error("{provider} sent an unexpected response: {message}")]
    MalformedResponse { provider: ProviderId, message: String },

    /// Provider answered 200 but its result code reports a failure
    #[error("{provider} rejected the request ({code}): {message}")]
    Rejected {
        provider: ProviderId,
        code: String,
        message: String,
    },

    /// The provider does not offer this operation
    #[error("{provider} does not support {operation}")]
    Unsupported {
        provider: ProviderId,
        operation: &'static str,
    },

    /// Bulk import errors
    #[error("Import error: {0}")]
    Import(String),

    /// Export errors
    #[error("Export error: {0}")]
    Export(String),

    /// Encryption errors
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Worker pool errors
    #[error("Dispatch error: {0}")]
    Dispatch(String),
}

/// Failure taxonomy shared by every provider client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transport,
    HttpStatus,
    MalformedResponse,
    Rejected,
    Validation,
    Configuration,
    Unsupported,
    Local,
}

impl BillPayError {
    /// Create a "not found" error for credentials
    pub fn credential_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Credential",
            identifier: identifier.into(),
        }
    }

    /// Create a transport error for a provider
    pub fn transport(provider: ProviderId, message: impl Into<String>) -> Self {
        Self::Transport {
            provider,
            message: message.into(),
        }
    }

    /// Create a malformed-response error for a provider
    pub fn malformed(provider: ProviderId, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            provider,
            message: message.into(),
        }
    }

    /// Create a rejection error from a provider result code
    pub fn rejected(provider: ProviderId, code: impl ToString, message: impl Into<String>) -> Self {
        Self::Rejected {
            provider,
            code: code.to_string(),
            message: message.into(),
        }
    }

    /// Create an unsupported-operation error
    pub fn unsupported(provider: ProviderId, operation: &'static str) -> Self {
        Self::Unsupported {
            provider,
            operation,
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport { .. } => ErrorKind::Transport,
            Self::HttpStatus { .. } => ErrorKind::HttpStatus,
            Self::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            Self::Rejected { .. } => ErrorKind::Rejected,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Config(_) | Self::MissingCredential { .. } => ErrorKind::Configuration,
            Self::Unsupported { .. } => ErrorKind::Unsupported,
            Self::Io(_)
            | Self::Json(_)
            | Self::NotFound { .. }
            | Self::Import(_)
            | Self::Export(_)
            | Self::Encryption(_)
            | Self::Storage(_)
            | Self::Dispatch(_) => ErrorKind::Local,
        }
    }

    /// True when the provider itself produced an answer (any HTTP reply)
    pub fn provider_answered(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::HttpStatus | ErrorKind::MalformedResponse | ErrorKind::Rejected
        )
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

// Implement From traits for common error types

impl From<std::io::Error> for BillPayError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BillPayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<csv::Error> for BillPayError {
    fn from(err: csv::Error) -> Self {
        Self::Import(err.to_string())
    }
}

/// Result type alias for billpay operations
pub type BillPayResult<T> = Result<T, BillPayError>;

/// Uniform `{success, kind, message}` shape handed to the shell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    pub message: String,
}

impl CallOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            kind: None,
            message: message.into(),
        }
    }

    pub fn from_result<T>(result: &BillPayResult<T>, success_message: &str) -> Self {
        match result {
            Ok(_) => Self::ok(success_message),
            Err(e) => e.into(),
        }
    }
}

impl From<&BillPayError> for CallOutcome {
    fn from(err: &BillPayError) -> Self {
        Self {
            success: false,
            kind: Some(err.kind()),
            message: err.to_string(),
        }
    }
}
