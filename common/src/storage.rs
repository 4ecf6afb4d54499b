//! JSON file persistence helpers.
//!
//! All hub state lives in small JSON documents. Reads treat a missing or
//! empty file as the type's default, and writes go through a temp file
//! followed by a rename so a crash never leaves a half-written document.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{HubError, Result};

fn io_error(path: &Path, err: &std::io::Error) -> HubError {
    HubError::StorageIo {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = OsString::from(path.as_os_str());
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Read and parse a JSON document, falling back to `T::default()` when the
/// file is missing or empty.
///
/// A file that exists but fails to parse is a [`HubError::StorageCorrupt`];
/// callers are expected to surface that rather than silently reset state.
pub fn read_json_or_default<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(err) => return Err(io_error(path, &err)),
    };

    if raw.trim().is_empty() {
        return Ok(T::default());
    }

    serde_json::from_str(&raw).map_err(|err| HubError::StorageCorrupt {
        path: path.display().to_string(),
        reason: err.to_string(),
    })
}

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
///
/// Parent directories are created as needed. The document is written to
/// `<path>.tmp` first and renamed over the target, so readers only ever see
/// the previous or the new complete document.
pub fn write_json_atomic<T>(path: &Path, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| io_error(parent, &err))?;
        }
    }

    let mut payload =
        serde_json::to_string_pretty(value).map_err(|err| HubError::StorageIo {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
    payload.push('\n');

    let tmp = tmp_path_for(path);
    fs::write(&tmp, payload).map_err(|err| io_error(&tmp, &err))?;
    fs::rename(&tmp, path).map_err(|err| io_error(path, &err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Doc {
        values: BTreeMap<String, f64>,
    }

    #[test]
    fn test_missing_file_reads_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let doc: Doc = read_json_or_default(&path).unwrap();
        assert_eq!(doc, Doc::default());
    }

    #[test]
    fn test_empty_file_reads_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        fs::write(&path, "  \n").unwrap();
        let doc: Doc = read_json_or_default(&path).unwrap();
        assert_eq!(doc, Doc::default());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{not json").unwrap();
        let err = read_json_or_default::<Doc>(&path).unwrap_err();
        assert!(matches!(err, HubError::StorageCorrupt { .. }));
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("doc.json");

        let mut doc = Doc::default();
        doc.values.insert("BTC_USD".to_string(), 59337.21);
        write_json_atomic(&path, &doc).unwrap();

        let read: Doc = read_json_or_default(&path).unwrap();
        assert_eq!(read, doc);

        // No temp file lingers after a successful write.
        assert!(!tmp_path_for(&path).exists());

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.ends_with('\n'));
    }

    #[test]
    fn test_write_replaces_previous_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");

        let mut doc = Doc::default();
        doc.values.insert("ETH_USD".to_string(), 3720.0);
        write_json_atomic(&path, &doc).unwrap();

        doc.values.insert("SOL_USD".to_string(), 172.44);
        write_json_atomic(&path, &doc).unwrap();

        let read: Doc = read_json_or_default(&path).unwrap();
        assert_eq!(read.values.len(), 2);
    }
}
