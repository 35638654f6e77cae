use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use parking_lot::Mutex;

use crate::models::capture_result::{CaptureExit, CaptureRecord, CaptureResult};
use crate::models::config::SessionOptions;
use crate::models::error::CaptureError;
use crate::models::metadata::MetadataContract;
use crate::models::state::SessionState;
use crate::processing::sample_decoder::SampleDecoder;
use crate::processing::wire;
use crate::session::capture_loop::{CaptureReport, CaptureWorker};
use crate::session::handshake::{Handshake, RetryBudget};
use crate::storage::csv_writer::CsvSampleWriter;
use crate::storage::{file_naming, metadata as sidecar};
use crate::traits::sample_sink::SampleSink;
use crate::traits::session_delegate::SessionDelegate;
use crate::traits::transport::{PollOutcome, Transport};

/// A running capture, owned by the controller between `start` and `stop`.
struct ActiveCapture {
    capture_index: u32,
    file_path: PathBuf,
    started_at: Instant,
    stop_requested: Arc<AtomicBool>,
    handle: thread::JoinHandle<CaptureReport>,
}

/// Drives one board session: negotiate once, then any number of
/// start/stop capture pairs, then terminate.
///
/// ```text
/// init → start → stop → start → stop → ... → terminate
/// ```
///
/// Calls out of order fail with `CaptureError::InvalidState`.
pub struct SessionController<T: Transport> {
    transport: Arc<Mutex<T>>,
    options: SessionOptions,
    state: SessionState,
    metadata: Option<MetadataContract>,
    delegate: Option<Arc<dyn SessionDelegate>>,
    active: Option<ActiveCapture>,
    next_capture_index: u32,
}

impl<T: Transport> SessionController<T> {
    pub fn new(transport: T, options: SessionOptions) -> Self {
        Self {
            transport: Arc::new(Mutex::new(transport)),
            options,
            state: SessionState::Idle,
            metadata: None,
            delegate: None,
            active: None,
            next_capture_index: 1,
        }
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn SessionDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn state(&self) -> SessionState {
        self.state.clone()
    }

    pub fn metadata(&self) -> Option<&MetadataContract> {
        self.metadata.as_ref()
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Index the next capture will get. Starts at 1.
    pub fn next_capture_index(&self) -> u32 {
        self.next_capture_index
    }

    pub fn is_transport_open(&self) -> bool {
        self.transport.lock().is_open()
    }

    /// Negotiate packet geometry with the board. Transitions: idle → negotiating → ready.
    ///
    /// On failure the transport is closed and the session is failed.
    pub fn init(&mut self) -> Result<MetadataContract, CaptureError> {
        if !self.state.is_idle() {
            return Err(self.invalid_state("init"));
        }
        if let Err(msg) = self.options.validate() {
            return Err(self.fail(CaptureError::ConfigurationFailed(msg)));
        }

        self.set_state(SessionState::Negotiating);

        let negotiated = {
            let mut transport = self.transport.lock();
            Handshake::new(&mut *transport, &self.options).run()
        };

        match negotiated {
            Ok(metadata) => {
                self.metadata = Some(metadata);
                if let Some(ref delegate) = self.delegate {
                    delegate.on_metadata_received(&metadata);
                }
                self.set_state(SessionState::Ready { metadata });
                Ok(metadata)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Start a capture. Transitions: ready → capturing.
    ///
    /// Discards anything already queued on the transport, creates the CSV
    /// file, tells the board to start streaming, and spawns the worker.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        let metadata = match &self.state {
            SessionState::Ready { metadata } => *metadata,
            _ => return Err(self.invalid_state("start")),
        };

        let drained = self.drain_stale_packets(&metadata);
        if drained > 0 {
            log::debug!("Discarded {} stale packets before capture", drained);
        }

        let capture_index = self.next_capture_index;
        let file_path = file_naming::unique_capture_path(&self.options.output_directory, &chrono::Local::now());
        let writer = match CsvSampleWriter::create(file_path.clone(), metadata) {
            Ok(w) => w,
            Err(e) => {
                self.notify_error(&e);
                return Err(e);
            }
        };

        let sent = self.transport.lock().transmit(wire::HOST_START_DATA_COLLECTION);
        if let Err(e) = sent {
            if let Err(finish_err) = Box::new(writer).finish() {
                log::warn!("Failed to close unused capture file: {}", finish_err);
            }
            discard_capture_file(&file_path);
            return Err(self.fail(e));
        }

        let stop_requested = Arc::new(AtomicBool::new(false));
        let worker = CaptureWorker::new(
            Arc::clone(&self.transport),
            Arc::clone(&stop_requested),
            SampleDecoder::new(metadata),
            Box::new(writer),
            self.options.stall_threshold,
        );
        let handle = match worker.spawn() {
            Ok(h) => h,
            Err(e) => {
                let sent = self.transport.lock().transmit(wire::HOST_STOP_DATA_COLLECTION);
                if let Err(stop_err) = sent {
                    log::error!("Failed to send stop command, check the board connection: {}", stop_err);
                }
                // The writer went down with the worker closure.
                discard_capture_file(&file_path);
                self.notify_error(&e);
                return Err(e);
            }
        };

        log::info!("Capture [{}] in progress -> {}", capture_index, file_path.display());
        self.active = Some(ActiveCapture {
            capture_index,
            file_path,
            started_at: Instant::now(),
            stop_requested,
            handle,
        });
        self.set_state(SessionState::Capturing { capture_index });
        Ok(())
    }

    /// Stop the running capture and finalize its file.
    /// Transitions: capturing → stopping → ready (or failed on a transport fault).
    ///
    /// The worker is always joined and the file always closed before this
    /// returns, whether the loop ended by request, stall, or fault.
    pub fn stop(&mut self) -> Result<CaptureResult, CaptureError> {
        if !self.state.is_capturing() {
            return Err(self.invalid_state("stop"));
        }
        let Some(active) = self.active.take() else {
            return Err(self.invalid_state("stop"));
        };
        let metadata = self
            .metadata
            .ok_or_else(|| CaptureError::InvalidState("no negotiated metadata".into()))?;

        self.set_state(SessionState::Stopping);

        let sent = self.transport.lock().transmit(wire::HOST_STOP_DATA_COLLECTION);
        if let Err(e) = sent {
            log::error!("Failed to send stop command, check the board connection: {}", e);
            self.notify_error(&e);
        }

        thread::sleep(self.options.stop_drain_grace);
        active.stop_requested.store(true, Ordering::SeqCst);

        let report = match active.handle.join() {
            Ok(report) => report,
            Err(_) => {
                let err = CaptureError::Unknown("capture worker panicked".into());
                return Err(self.fail(err));
            }
        };
        let duration_secs = active.started_at.elapsed().as_secs_f64();
        self.next_capture_index += 1;

        if let Some(ref err) = report.error {
            self.notify_error(err);
        }

        let finished = match report.sink {
            Ok(finished) => finished,
            Err(e) => {
                self.after_capture(report.exit, &e);
                return Err(e);
            }
        };

        let record = CaptureRecord::new(
            active.capture_index,
            &finished.path.to_string_lossy(),
            duration_secs,
            &finished.checksum,
            report.exit,
            metadata,
            self.options.clone(),
            report.diagnostics.clone(),
        );
        if self.options.write_sidecar {
            if let Err(e) = sidecar::write_record(&record, &finished.path) {
                log::warn!("Failed to write capture sidecar: {}", e);
            }
        }

        log::info!(
            "Stopped capture [{}] after {:.3}s ({}): {} packets, {} samples, {} overrun skips. Data stored to {}",
            active.capture_index,
            duration_secs,
            report.exit,
            report.diagnostics.packets_received,
            report.diagnostics.samples_written,
            report.diagnostics.overrun_skips,
            active.file_path.display()
        );

        let result = CaptureResult {
            file_path: finished.path,
            capture_index: active.capture_index,
            duration_secs,
            checksum: finished.checksum,
            exit: report.exit,
            diagnostics: report.diagnostics,
            record,
        };

        if let Some(ref delegate) = self.delegate {
            delegate.on_capture_finished(&result);
        }

        match report.error {
            Some(err) if report.exit == CaptureExit::TransportFault => {
                self.fail_silently(err);
            }
            _ => self.set_state(SessionState::Ready { metadata }),
        }

        Ok(result)
    }

    /// Ask the board to shut down and wait for its acknowledgement.
    /// Transitions: ready → terminated.
    ///
    /// The transport is released whether or not the board answers.
    pub fn terminate(&mut self) -> Result<(), CaptureError> {
        if !self.state.is_ready() {
            return Err(self.invalid_state("terminate"));
        }

        let outcome = self.await_termination();
        self.transport.lock().close();

        match outcome {
            Ok(()) => {
                log::info!("Received message: {}", wire::PEER_TERMINATION_SUCCESSFUL);
                self.set_state(SessionState::Terminated);
                Ok(())
            }
            Err(e) => {
                log::error!("Termination failed: {}", e);
                Err(self.fail(e))
            }
        }
    }

    // --- Internal helpers ---

    fn await_termination(&self) -> Result<(), CaptureError> {
        let packet_size = self.metadata.map(|m| m.packet_size_bytes as usize);
        let mut transport = self.transport.lock();
        transport.transmit(wire::HOST_TERMINATE_SERVER)?;

        let mut budget = RetryBudget::new(self.options.handshake);
        let mut buf = vec![0u8; wire::MAX_PACKET_BYTES];
        loop {
            match transport.poll_receive(&mut buf) {
                PollOutcome::Data(n) if Some(n) == packet_size => {
                    // Telemetry still in flight from the last capture.
                    log::debug!("Ignoring late data packet while terminating");
                }
                PollOutcome::Data(n) => {
                    return if wire::response_matches(&buf[..n], wire::PEER_TERMINATION_SUCCESSFUL) {
                        Ok(())
                    } else {
                        Err(CaptureError::ProtocolDesync(format!(
                            "expected {:?}, got {:?}",
                            wire::PEER_TERMINATION_SUCCESSFUL,
                            String::from_utf8_lossy(wire::response_text(&buf[..n]))
                        )))
                    };
                }
                PollOutcome::TimeoutNoData | PollOutcome::NonProtocolData => {
                    if let Some(deadline) = budget.idle_poll() {
                        return Err(CaptureError::HandshakeTimeout(deadline));
                    }
                }
                PollOutcome::Fault(fault) => return Err(fault.into()),
            }
        }
    }

    /// Discard packets queued before this capture. Stops at the first empty poll.
    fn drain_stale_packets(&self, metadata: &MetadataContract) -> u64 {
        let mut transport = self.transport.lock();
        let mut buf = vec![0u8; (metadata.packet_size_bytes as usize).max(wire::MAX_PACKET_BYTES)];
        let mut drained = 0;
        while let PollOutcome::Data(_) = transport.poll_receive(&mut buf) {
            drained += 1;
        }
        drained
    }

    fn after_capture(&mut self, exit: CaptureExit, err: &CaptureError) {
        if exit == CaptureExit::TransportFault {
            self.fail_silently(err.clone());
        } else if let Some(metadata) = self.metadata {
            self.set_state(SessionState::Ready { metadata });
        }
    }

    fn set_state(&mut self, new_state: SessionState) {
        log::debug!("Session state: {} -> {}", self.state.name(), new_state.name());
        self.state = new_state;
        if let Some(ref delegate) = self.delegate {
            delegate.on_state_changed(&self.state);
        }
    }

    fn notify_error(&self, err: &CaptureError) {
        if let Some(ref delegate) = self.delegate {
            delegate.on_error(err);
        }
    }

    /// Release the transport and mark the session failed.
    fn fail(&mut self, err: CaptureError) -> CaptureError {
        self.notify_error(&err);
        self.fail_silently(err.clone());
        err
    }

    fn fail_silently(&mut self, err: CaptureError) {
        self.transport.lock().close();
        self.set_state(SessionState::Failed(err));
    }

    fn invalid_state(&self, operation: &str) -> CaptureError {
        CaptureError::InvalidState(format!(
            "cannot {} while {}",
            operation,
            self.state.name()
        ))
    }
}

/// Remove the file of a capture that never started.
fn discard_capture_file(path: &std::path::Path) {
    if let Err(e) = std::fs::remove_file(path) {
        log::warn!("Failed to remove unused capture file {}: {}", path.display(), e);
    }
}

impl<T: Transport> Drop for SessionController<T> {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.stop_requested.store(true, Ordering::SeqCst);
            let _ = active.handle.join();
        }
    }
}
