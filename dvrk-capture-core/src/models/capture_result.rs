use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::config::SessionOptions;
use super::metadata::MetadataContract;

/// Why a capture worker left its receive loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureExit {
    /// The controller asked the worker to stop.
    StopRequested,
    /// Data had been flowing and then the stall threshold was reached.
    Stalled,
    /// The transport reported a hard receive fault.
    TransportFault,
    /// Writing a decoded sample to the output file failed.
    StorageFault,
}

impl fmt::Display for CaptureExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::StopRequested => "stop requested",
            Self::Stalled => "stalled",
            Self::TransportFault => "transport fault",
            Self::StorageFault => "storage fault",
        };
        f.write_str(s)
    }
}

/// Per-capture counters collected by the worker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureDiagnostics {
    pub packets_received: u64,
    pub samples_written: u64,
    /// Samples skipped because they would read past the received packet.
    pub overrun_skips: u64,
    pub timeout_polls: u64,
    pub non_protocol_polls: u64,
    pub longest_timeout_streak: u64,
}

/// Serializable description of a finished capture, written as a sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureRecord {
    pub id: String,
    pub capture_index: u32,
    pub file_path: String,
    pub created_at: String,
    pub duration_secs: f64,
    pub checksum: String,
    pub exit: CaptureExit,
    pub metadata: MetadataContract,
    pub options: SessionOptions,
    pub diagnostics: CaptureDiagnostics,
}

impl CaptureRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        capture_index: u32,
        file_path: &str,
        duration_secs: f64,
        checksum: &str,
        exit: CaptureExit,
        metadata: MetadataContract,
        options: SessionOptions,
        diagnostics: CaptureDiagnostics,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            capture_index,
            file_path: file_path.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            duration_secs,
            checksum: checksum.to_string(),
            exit,
            metadata,
            options,
            diagnostics,
        }
    }
}

/// Result returned by `SessionController::stop`.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureResult {
    pub file_path: PathBuf,
    pub capture_index: u32,
    pub duration_secs: f64,
    pub checksum: String,
    pub exit: CaptureExit,
    pub diagnostics: CaptureDiagnostics,
    pub record: CaptureRecord,
}
