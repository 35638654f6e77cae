//! # dvrk-capture-core
//!
//! Transport-agnostic core of the board telemetry capture client.
//!
//! Provides the handshake state machine, the capture worker, sample
//! decoding, CSV storage, and session orchestration. Concrete transports
//! (UDP in `dvrk-capture-udp`, scripted ones in tests) implement the
//! `Transport` trait and plug into the generic `SessionController`.
//!
//! ## Architecture
//!
//! ```text
//! dvrk-capture-core (this crate)
//! ├── traits/       ← Transport, SampleSink, SessionDelegate
//! ├── models/       ← CaptureError, SessionState, MetadataContract, SessionOptions, etc.
//! ├── processing/   ← wire constants, SampleDecoder
//! ├── session/      ← Handshake, CaptureWorker, SessionController
//! └── storage/      ← CsvSampleWriter, file naming, JSON sidecar
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::capture_result::{CaptureDiagnostics, CaptureExit, CaptureRecord, CaptureResult};
pub use models::config::{HandshakePolicy, ReadyVariant, SessionOptions, DEFAULT_STALL_THRESHOLD};
pub use models::error::{CaptureError, TransportFault};
pub use models::metadata::{HardwareVariant, MetadataContract};
pub use models::sample::DecodedSample;
pub use models::state::SessionState;
pub use processing::sample_decoder::SampleDecoder;
pub use session::controller::SessionController;
pub use session::handshake::Handshake;
pub use storage::csv_writer::CsvSampleWriter;
pub use traits::sample_sink::{FinishedSink, SampleSink};
pub use traits::session_delegate::SessionDelegate;
pub use traits::transport::{PollOutcome, Transport};
