// src/utils/serialization.rs
//! JSON helpers shared by the file-backed record and artifact stores.

use serde::{de::DeserializeOwned, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static SIBLING_SEQ: AtomicU64 = AtomicU64::new(0);

/// A sibling of `path` no other writer in any process will pick,
/// e.g. `cert.json.4711-3.tmp`.
pub fn unique_sibling(path: &Path, suffix: &str) -> PathBuf {
    let seq = SIBLING_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{}-{}.{}", std::process::id(), seq, suffix));
    PathBuf::from(name)
}

/// Serializes a value to a pretty-printed JSON string.
///
/// # Arguments
/// * `data` - The value to serialize (must implement `Serialize`)
pub fn serialize<T: Serialize>(data: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(data)
}

/// Deserializes a value from a JSON string.
pub fn deserialize<T: DeserializeOwned>(data: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(data)
}

/// Writes `value` as JSON to `path` by writing a sibling temp file and
/// renaming it over the target, so readers never see a half-written file.
pub async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let json = serialize(value).map_err(io::Error::other)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let tmp = unique_sibling(path, "tmp");
    if let Err(e) = tokio::fs::write(&tmp, json.as_bytes()).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    tokio::fs::rename(&tmp, path).await
}

/// Reads JSON from `path`, returning `None` when the file does not exist.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> io::Result<Option<T>> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => deserialize(&contents).map(Some).map_err(io::Error::other),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
