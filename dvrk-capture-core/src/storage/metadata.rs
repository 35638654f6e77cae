use std::fs;
use std::path::{Path, PathBuf};

use crate::models::capture_result::CaptureRecord;
use crate::models::error::CaptureError;

/// Sidecar path for a capture file: `capture_X.csv` → `capture_X.metadata.json`.
pub fn sidecar_path(capture_path: &Path) -> PathBuf {
    capture_path.with_extension("metadata.json")
}

/// Write a capture record as a JSON sidecar file.
pub fn write_record(record: &CaptureRecord, capture_path: &Path) -> Result<PathBuf, CaptureError> {
    let path = sidecar_path(capture_path);
    let json = serde_json::to_string_pretty(record)
        .map_err(|e| CaptureError::StorageError(format!("failed to serialize record: {}", e)))?;
    fs::write(&path, json)
        .map_err(|e| CaptureError::StorageError(format!("failed to write record: {}", e)))?;
    Ok(path)
}

/// Read a capture record from a JSON sidecar file.
pub fn read_record(capture_path: &Path) -> Result<CaptureRecord, CaptureError> {
    let json = fs::read_to_string(sidecar_path(capture_path))
        .map_err(|e| CaptureError::StorageError(format!("failed to read record: {}", e)))?;
    serde_json::from_str(&json)
        .map_err(|e| CaptureError::StorageError(format!("failed to parse record: {}", e)))
}
