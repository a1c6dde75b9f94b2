//! Configuration module for billpay
//!
//! This module provides configuration management including:
//! - XDG-compliant path resolution
//! - User settings persistence with dotted-key access

pub mod paths;
pub mod settings;

pub use paths::BillPayPaths;
pub use settings::{Settings, ValidationReport};
