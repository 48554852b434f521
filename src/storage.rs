//! Input discovery and result persistence.

use crate::error::{BatchError, Result};
use crate::record::Record;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// Extension of input collections.
pub const COLLECTION_EXTENSION: &str = "json";

/// List the `*.json` files directly inside `dir`, sorted by file name.
pub async fn list_collections(dir: &Path) -> Result<Vec<PathBuf>> {
    let read_err = |e: std::io::Error| BatchError::InputRead {
        path: dir.to_path_buf(),
        source: e,
    };

    let mut entries = fs::read_dir(dir).await.map_err(read_err)?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
        let path = entry.path();
        let is_collection = path
            .extension()
            .is_some_and(|ext| ext == COLLECTION_EXTENSION);
        if is_collection && entry.file_type().await.map_err(read_err)?.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Read one collection: a JSON array of objects.
pub async fn load_collection(path: &Path) -> Result<Vec<Record>> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| BatchError::InputRead {
            path: path.to_path_buf(),
            source: e,
        })?;

    let value: Value =
        serde_json::from_str(&content).map_err(|e| BatchError::CollectionParse {
            path: path.to_path_buf(),
            source: e,
        })?;

    let Value::Array(items) = value else {
        return Err(BatchError::MalformedCollection {
            path: path.to_path_buf(),
            message: "expected a JSON array".to_string(),
        });
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(record) => Ok(record),
            _ => Err(BatchError::MalformedCollection {
                path: path.to_path_buf(),
                message: format!("element {i} is not an object"),
            }),
        })
        .collect()
}

/// Write `value` as pretty JSON to `dir/file_name`, creating `dir` if needed.
pub async fn save_json<T: Serialize + ?Sized>(
    value: &T,
    dir: &Path,
    file_name: &str,
) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .await
        .map_err(|e| BatchError::OutputWrite {
            path: dir.to_path_buf(),
            source: e,
        })?;

    let path = dir.join(file_name);
    let body = serde_json::to_string_pretty(value)?;
    fs::write(&path, body)
        .await
        .map_err(|e| BatchError::OutputWrite {
            path: path.clone(),
            source: e,
        })?;

    info!(path = %path.display(), "Saved results");
    Ok(path)
}

/// Name of the per-file result artifact: `<stem>_processed.json`.
pub fn processed_file_name(source: &Path) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "results".to_string());
    format!("{stem}_processed.json")
}

/// Name of the run summary artifact for a mode label.
pub fn summary_file_name(mode: &str) -> String {
    format!("all_results_{mode}.json")
}

/// Name of the run statistics artifact for a mode label.
pub fn stats_file_name(mode: &str) -> String {
    format!("stats_{mode}.json")
}
