use std::time::Duration;

use thiserror::Error;

/// Hard receive faults reported by a transport poll.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TransportFault {
    #[error("readiness wait failed")]
    Select,

    #[error("socket error")]
    Socket,

    #[error("connection closed")]
    ConnectionClosed,
}

/// Errors that can occur while negotiating with or capturing from a board.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("protocol desync: {0}")]
    ProtocolDesync(String),

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    #[error("capture stalled after {0} consecutive empty polls")]
    CaptureStall(u64),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl From<TransportFault> for CaptureError {
    fn from(fault: TransportFault) -> Self {
        CaptureError::TransportFailure(fault.to_string())
    }
}
