//! Local JSON state files
//!
//! Small per-user state (activity log, remembered session) is kept as pretty
//! JSON under the configured data directory. A missing file loads as `None`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid state file: {0}")]
    Json(#[from] serde_json::Error),
}

pub type PersistResult<T> = Result<T, PersistError>;

/// Load a JSON file, `None` if it does not exist
pub fn load_json<T: DeserializeOwned>(path: &Path) -> PersistResult<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&content)?))
}

/// Write a JSON file, creating parent directories
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> PersistResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Remove a state file; missing files are fine
pub fn remove(path: &Path) -> PersistResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let loaded: Option<BTreeMap<String, u32>> =
            load_json(&dir.path().join("nope.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_save_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let mut value = BTreeMap::new();
        value.insert("visits".to_string(), 3u32);
        save_json(&path, &value).unwrap();

        let loaded: BTreeMap<String, u32> = load_json(&path).unwrap().unwrap();
        assert_eq!(loaded, value);

        remove(&path).unwrap();
        remove(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();

        let result: PersistResult<Option<BTreeMap<String, u32>>> = load_json(&path);
        assert!(matches!(result, Err(PersistError::Json(_))));
    }
}
