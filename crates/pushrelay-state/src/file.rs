//! JSON file helpers shared by both stores.

use std::io::ErrorKind;
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, StateError};

/// Read `path` as JSON, falling back to `T::default()`.
///
/// A missing file is the normal first-run case. An unreadable or corrupt
/// file is logged and also yields the default: re-processing some already
/// seen data is preferred over refusing to start.
pub fn load_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "state file not found, starting empty");
            return T::default();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "state file unreadable, starting empty");
            return T::default();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "state file corrupt, starting empty");
            T::default()
        }
    }
}

/// Serialize `value` as pretty JSON and atomically replace `path`.
///
/// Writes a sibling temp file first and renames it over the target, so a
/// crash mid-write leaves either the old or the new file, never a torn one.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let io_err = |source: std::io::Error| StateError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut payload = serde_json::to_string_pretty(value)?;
    payload.push('\n');

    let parent = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(io_err)?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("state.json");
    let temp_path = parent.join(format!(".{}.tmp-{}", file_name, std::process::id()));
    std::fs::write(&temp_path, payload).map_err(io_err)?;
    std::fs::rename(&temp_path, path).map_err(io_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let value: BTreeMap<String, u32> = load_json_or_default(&dir.path().join("nope.json"));
        assert!(value.is_empty());
    }

    #[test]
    fn corrupt_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ this is not json").unwrap();
        let value: BTreeMap<String, u32> = load_json_or_default(&path);
        assert!(value.is_empty());
    }

    #[test]
    fn atomic_write_creates_parents_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let mut value = BTreeMap::new();
        value.insert("a".to_string(), 1u32);
        write_json_atomic(&path, &value).unwrap();

        let back: BTreeMap<String, u32> = load_json_or_default(&path);
        assert_eq!(back, value);
        let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);
    }
}
