use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Consecutive empty polls, after data has flowed, that end a capture.
pub const DEFAULT_STALL_THRESHOLD: u64 = 100_000;

/// Bound on how long negotiation and terminate wait for the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakePolicy {
    /// Give up after this long without progress. `None` waits forever.
    pub deadline: Option<Duration>,
}

impl HandshakePolicy {
    pub fn unbounded() -> Self {
        Self { deadline: None }
    }

    pub fn with_deadline(deadline: Duration) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }
}

impl Default for HandshakePolicy {
    fn default() -> Self {
        Self::with_deadline(Duration::from_secs(30))
    }
}

/// Ready command variant sent at the start of negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadyVariant {
    Plain,
    WithPsIo,
    WithSampleRate(u32),
}

/// Configuration for a capture session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOptions {
    /// Ask the board to append digital IO and MIO pin words to each sample.
    pub use_ps_io: bool,

    /// Requested board sample rate in Hz, or None for the board default.
    pub sample_rate: Option<u32>,

    /// Directory where capture CSV files are written.
    pub output_directory: PathBuf,

    /// Retry bound for negotiation and terminate.
    pub handshake: HandshakePolicy,

    /// Consecutive empty polls treated as a stall once data has arrived.
    pub stall_threshold: u64,

    /// Pause between sending the stop command and signalling the worker,
    /// letting in-flight packets land.
    pub stop_drain_grace: Duration,

    /// Write a JSON sidecar next to each capture file.
    pub write_sidecar: bool,
}

impl SessionOptions {
    pub fn validate(&self) -> Result<(), String> {
        if self.use_ps_io && self.sample_rate.is_some() {
            return Err("PS IO and sample rate options are mutually exclusive".into());
        }
        if self.sample_rate == Some(0) {
            return Err("sample rate must be positive".into());
        }
        if self.stall_threshold == 0 {
            return Err("stall threshold must be positive".into());
        }
        Ok(())
    }

    pub fn ready_variant(&self) -> ReadyVariant {
        match (self.use_ps_io, self.sample_rate) {
            (_, Some(rate)) => ReadyVariant::WithSampleRate(rate),
            (true, None) => ReadyVariant::WithPsIo,
            (false, None) => ReadyVariant::Plain,
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            use_ps_io: false,
            sample_rate: None,
            output_directory: PathBuf::from("."),
            handshake: HandshakePolicy::default(),
            stall_threshold: DEFAULT_STALL_THRESHOLD,
            stop_drain_grace: Duration::from_millis(1),
            write_sidecar: true,
        }
    }
}
