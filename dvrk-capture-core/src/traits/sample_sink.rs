use std::path::PathBuf;

use crate::models::error::CaptureError;
use crate::models::sample::DecodedSample;

/// A sink that has been finalized and closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedSink {
    pub path: PathBuf,
    pub rows_written: u64,
    pub checksum: String,
}

/// Destination for decoded samples, owned by the capture worker.
///
/// The header is written when the sink is created; `finish` is called exactly
/// once when the capture loop exits, whatever the exit cause.
pub trait SampleSink: Send {
    fn write_sample(&mut self, sample: &DecodedSample) -> Result<(), CaptureError>;

    fn finish(self: Box<Self>) -> Result<FinishedSink, CaptureError>;
}
