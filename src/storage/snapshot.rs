//! JSON snapshot files, one per collection, under the store root.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::StoreError;

pub fn collection_path(root: &Path, name: &str) -> PathBuf { root.join(format!("{}.json", name)) }

/// Read a collection snapshot; a missing file is an empty collection.
pub fn read_collection<T: DeserializeOwned>(root: &Path, name: &str) -> Result<BTreeMap<String, T>, StoreError> {
    let p = collection_path(root, name);
    if !p.exists() { return Ok(BTreeMap::new()); }
    let text = fs::read_to_string(&p)
        .map_err(|e| StoreError::Unavailable(format!("read {}: {}", p.display(), e)))?;
    if text.trim().is_empty() { return Ok(BTreeMap::new()); }
    serde_json::from_str(&text)
        .map_err(|e| StoreError::Unavailable(format!("decode {}: {}", p.display(), e)))
}

/// Write a collection snapshot via a temp file and rename, so readers never
/// observe a half-written file.
pub fn write_collection<T: Serialize>(root: &Path, name: &str, docs: &BTreeMap<String, T>) -> Result<(), StoreError> {
    let p = collection_path(root, name);
    let tmp = root.join(format!(".{}.json.tmp", name));
    let text = serde_json::to_string_pretty(docs)
        .map_err(|e| StoreError::Unavailable(format!("encode {}: {}", name, e)))?;
    fs::write(&tmp, text).map_err(|e| StoreError::Unavailable(format!("write {}: {}", tmp.display(), e)))?;
    fs::rename(&tmp, &p).map_err(|e| StoreError::Unavailable(format!("rename {}: {}", p.display(), e)))?;
    Ok(())
}
