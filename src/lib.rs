//! billpay - Vietnamese utility bill lookup and payment
//!
//! This library provides the core functionality for the `billpay` command:
//! signed clients for BIDV bill inquiry and for MoMo, ZaloPay and Visa Direct
//! payments, an encrypted credential store, bulk CSV import, payment history
//! and a background status monitor.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Paths and user settings
//! - `error`: Error type and the uniform call outcome
//! - `models`: Value objects (bills, payments, credentials, money)
//! - `providers`: One client per payment provider behind a common trait
//! - `services`: Provider registry, worker pool, monitor, bulk and history
//! - `storage`: Atomic JSON files and the encrypted credential store
//! - `crypto`: AES-256-GCM encryption and Argon2id key derivation
//! - `audit`: Append-only activity log
//! - `export`: Configuration export/import and CSV reports
//! - `display`: Terminal tables and detail views
//! - `cli`: Command handlers for the binary
//!
//! # Example
//!
//! ```rust,ignore
//! use billpay::config::{BillPayPaths, Settings};
//! use billpay::services::ProviderRegistry;
//! use billpay::storage::SecureStore;
//!
//! let paths = BillPayPaths::new()?;
//! let settings = Settings::load_or_create(&paths)?;
//! let store = SecureStore::open(&paths)?;
//! let registry = ProviderRegistry::from_store(&store, &settings);
//! let lookup = registry.client(ProviderId::Bidv).lookup_bill("PD29007350490")?;
//! ```

pub mod audit;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod display;
pub mod error;
pub mod export;
pub mod models;
pub mod providers;
pub mod services;
pub mod storage;

pub use error::{BillPayError, BillPayResult, CallOutcome};
