//! File I/O utilities with atomic writes
//!
//! Every file billpay owns is replaced by writing a sibling temp file,
//! syncing it and renaming it over the target, so a crash leaves either the
//! old or the new contents. Secret material is written owner-only on Unix.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::BillPayError;

/// Who may read a written file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    /// Default permissions
    Shared,
    /// 0600 on Unix
    OwnerOnly,
}

/// Read JSON from a file, returning a default value if file doesn't exist
pub fn read_json<T, P>(path: P) -> Result<T, BillPayError>
where
    T: DeserializeOwned + Default,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if !path.exists() {
        return Ok(T::default());
    }
    read_json_required(path)
}

/// Read JSON from a file, returning an error if file doesn't exist
pub fn read_json_required<T, P>(path: P) -> Result<T, BillPayError>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if !path.exists() {
        return Err(BillPayError::Storage(format!(
            "File not found: {}",
            path.display()
        )));
    }

    let file = File::open(path)
        .map_err(|e| BillPayError::Storage(format!("Failed to open {}: {}", path.display(), e)))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| BillPayError::Storage(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Write JSON to a file atomically
pub fn write_json_atomic<T, P>(path: P, data: &T) -> Result<(), BillPayError>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let bytes = serde_json::to_vec_pretty(data)
        .map_err(|e| BillPayError::Storage(format!("Failed to serialize data: {}", e)))?;
    write_bytes_atomic(path, &bytes, FileMode::Shared)
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write raw bytes to a file atomically (write to temp, sync, rename)
pub fn write_bytes_atomic<P: AsRef<Path>>(
    path: P,
    bytes: &[u8],
    mode: FileMode,
) -> Result<(), BillPayError> {
    let path = path.as_ref();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            BillPayError::Storage(format!(
                "Failed to create directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    let temp_path = temp_path_for(path);
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    if mode == FileMode::OwnerOnly {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    #[cfg(not(unix))]
    let _ = mode;

    let mut file = options
        .open(&temp_path)
        .map_err(|e| BillPayError::Storage(format!("Failed to create temp file: {}", e)))?;
    file.write_all(bytes)
        .map_err(|e| BillPayError::Storage(format!("Failed to write data: {}", e)))?;
    file.sync_all()
        .map_err(|e| BillPayError::Storage(format!("Failed to sync data: {}", e)))?;
    drop(file);

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        BillPayError::Storage(format!("Failed to rename temp file: {}", e))
    })
}

/// `dir/name.csv` -> `dir/name_<suffix>.csv`
pub fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "billpay".to_string());
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "csv".to_string());
    path.with_file_name(format!("{}_{}.{}", stem, suffix, extension))
}

/// Remove a file if it exists
pub fn remove_if_exists<P: AsRef<Path>>(path: P) -> Result<bool, BillPayError> {
    let path = path.as_ref();
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(BillPayError::Storage(format!(
            "Failed to remove {}: {}",
            path.display(),
            e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
    struct Ledger {
        provider: String,
        payments: Vec<i64>,
    }

    fn sample() -> Ledger {
        Ledger {
            provider: "momo".to_string(),
            payments: vec![500_000, 250_000],
        }
    }

    #[test]
    fn test_read_missing_returns_default() {
        let temp_dir = TempDir::new().unwrap();
        let data: Ledger = read_json(temp_dir.path().join("missing.json")).unwrap();
        assert_eq!(data, Ledger::default());
    }

    #[test]
    fn test_write_then_read_in_nested_dir() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data").join("ledger.json");

        write_json_atomic(&path, &sample()).unwrap();
        let loaded: Ledger = read_json_required(&path).unwrap();
        assert_eq!(loaded, sample());
        assert!(!temp_dir.path().join("data").join("ledger.json.tmp").exists());
    }

    #[test]
    fn test_required_read_fails_when_missing_or_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ledger.json");
        assert!(read_json_required::<Ledger, _>(&path).is_err());

        fs::write(&path, "not json").unwrap();
        let err = read_json::<Ledger, _>(&path).unwrap_err();
        assert!(matches!(err, BillPayError::Storage(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_owner_only_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("key.key");
        write_bytes_atomic(&path, b"secret", FileMode::OwnerOnly).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(fs::read(&path).unwrap(), b"secret");
    }

    #[test]
    fn test_sibling_path() {
        let path = Path::new("/tmp/out/report.csv");
        assert_eq!(sibling_path(path, "overview"), Path::new("/tmp/out/report_overview.csv"));
        assert_eq!(sibling_path(Path::new("report"), "details"), Path::new("report_details.csv"));
    }

    #[test]
    fn test_remove_if_exists() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("x.json");
        assert!(!remove_if_exists(&path).unwrap());
        fs::write(&path, "{}").unwrap();
        assert!(remove_if_exists(&path).unwrap());
        assert!(!path.exists());
    }
}
