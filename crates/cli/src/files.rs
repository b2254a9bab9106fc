//! Snapshot file loading and writing.
//!
//! The core crate performs no I/O; everything path-shaped lives here.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::Value;

/// Read and parse a snapshot document.
pub fn load_document(path: &Path) -> anyhow::Result<Value> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {}", path.display()))
}

/// Write a document as pretty-printed JSON, creating the parent directory
/// when missing. Callers invoke this only after a transformation has fully
/// completed; no partially transformed file ever reaches disk.
pub fn write_document(path: &Path, doc: &Value) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let pretty = serde_json::to_string_pretty(doc).context("failed to serialize document")?;
    fs::write(path, pretty).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Default output path for a reframed snapshot: `<stem>.frames{N}.<ext>`
/// next to the input, `.json` when the input has no extension.
pub fn reframe_output_path(input: &Path, frames: i64) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("queue");
    let ext = input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("json");
    input.with_file_name(format!("{stem}.frames{frames}.{ext}"))
}
