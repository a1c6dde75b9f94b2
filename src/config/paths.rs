//! Path management for billpay
//!
//! Provides XDG-compliant path resolution for configuration, data, and backups.
//!
//! ## Path Resolution Order
//!
//! 1. `BILLPAY_DATA_DIR` environment variable (if set)
//! 2. Unix (Linux/macOS): `$XDG_CONFIG_HOME/billpay` or `~/.config/billpay`
//! 3. Windows: `%APPDATA%\billpay`

use std::path::PathBuf;

use directories::BaseDirs;

use crate::error::BillPayError;

/// Environment variable that overrides the base directory
pub const DATA_DIR_ENV: &str = "BILLPAY_DATA_DIR";

/// Manages all paths used by billpay
#[derive(Debug, Clone)]
pub struct BillPayPaths {
    /// Base directory for all billpay data
    base_dir: PathBuf,
}

impl BillPayPaths {
    /// Create a new BillPayPaths instance
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self, BillPayError> {
        let base_dir = match std::env::var_os(DATA_DIR_ENV) {
            Some(custom) if !custom.is_empty() => PathBuf::from(custom),
            _ => resolve_default_path()?,
        };

        Ok(Self { base_dir })
    }

    /// Create BillPayPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.config/billpay/ or equivalent)
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the data directory (~/.config/billpay/data/)
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    /// Get the backup directory (~/.config/billpay/backups/)
    pub fn backup_dir(&self) -> PathBuf {
        self.base_dir.join("backups")
    }

    /// Get the path to the settings file
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Encrypted provider credentials
    pub fn secure_config_file(&self) -> PathBuf {
        self.base_dir.join("secure_config.dat")
    }

    /// Key that encrypts the credential file
    pub fn key_file(&self) -> PathBuf {
        self.base_dir.join("key.key")
    }

    /// Get the path to the activity log
    pub fn activity_log(&self) -> PathBuf {
        self.base_dir.join("activity.log")
    }

    /// Get the path to history.json
    pub fn history_file(&self) -> PathBuf {
        self.data_dir().join("history.json")
    }

    /// Ensure all required directories exist
    pub fn ensure_directories(&self) -> Result<(), BillPayError> {
        for (dir, what) in [
            (self.base_dir.clone(), "base"),
            (self.data_dir(), "data"),
            (self.backup_dir(), "backup"),
        ] {
            std::fs::create_dir_all(&dir).map_err(|e| {
                BillPayError::Io(format!("Failed to create {} directory: {}", what, e))
            })?;
        }
        Ok(())
    }

    /// Check if billpay has been initialized (config file exists)
    pub fn is_initialized(&self) -> bool {
        self.settings_file().exists()
    }
}

/// Resolve the default data directory path based on platform
#[cfg(not(windows))]
fn resolve_default_path() -> Result<PathBuf, BillPayError> {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(xdg).join("billpay"));
    }
    let base = BaseDirs::new()
        .ok_or_else(|| BillPayError::Config("Could not determine home directory".into()))?;
    Ok(base.home_dir().join(".config").join("billpay"))
}

/// Resolve the default data directory path based on platform
#[cfg(windows)]
fn resolve_default_path() -> Result<PathBuf, BillPayError> {
    let base = BaseDirs::new()
        .ok_or_else(|| BillPayError::Config("Could not determine APPDATA directory".into()))?;
    Ok(base.config_dir().join("billpay"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_custom_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let paths = BillPayPaths::with_base_dir(temp_dir.path().to_path_buf());

        assert_eq!(paths.base_dir(), temp_dir.path());
        assert_eq!(paths.data_dir(), temp_dir.path().join("data"));
        assert_eq!(paths.backup_dir(), temp_dir.path().join("backups"));
    }

    #[test]
    fn test_ensure_directories() {
        let temp_dir = TempDir::new().unwrap();
        let paths = BillPayPaths::with_base_dir(temp_dir.path().join("nested"));

        assert!(!paths.is_initialized());
        paths.ensure_directories().unwrap();

        assert!(paths.data_dir().exists());
        assert!(paths.backup_dir().exists());
    }

    #[test]
    fn test_file_paths() {
        let temp_dir = TempDir::new().unwrap();
        let paths = BillPayPaths::with_base_dir(temp_dir.path().to_path_buf());

        assert_eq!(paths.settings_file(), temp_dir.path().join("config.json"));
        assert_eq!(paths.secure_config_file(), temp_dir.path().join("secure_config.dat"));
        assert_eq!(paths.key_file(), temp_dir.path().join("key.key"));
        assert_eq!(
            paths.history_file(),
            temp_dir.path().join("data").join("history.json")
        );
    }
}
