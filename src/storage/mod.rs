//! Storage layer for billpay
//!
//! JSON files with atomic writes, and the encrypted credential store.

pub mod file_io;
pub mod secure_store;

pub use file_io::{read_json, read_json_required, write_json_atomic};
pub use secure_store::SecureStore;
