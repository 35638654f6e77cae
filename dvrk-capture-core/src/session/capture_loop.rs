use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use crate::models::capture_result::{CaptureDiagnostics, CaptureExit};
use crate::models::error::CaptureError;
use crate::models::sample::DecodedSample;
use crate::processing::sample_decoder::SampleDecoder;
use crate::processing::wire;
use crate::traits::sample_sink::{FinishedSink, SampleSink};
use crate::traits::transport::{PollOutcome, Transport};

/// What the worker hands back when it is joined.
pub struct CaptureReport {
    pub exit: CaptureExit,
    /// The abnormal condition that ended the loop, if any.
    pub error: Option<CaptureError>,
    pub diagnostics: CaptureDiagnostics,
    /// Outcome of finalizing the sink. The sink is finalized on every exit path.
    pub sink: Result<FinishedSink, CaptureError>,
}

/// Receive → decode → write loop for one capture.
///
/// Owns the sink and decode scratch for its whole run. The transport is
/// shared with the controller, which only transmits while the worker runs.
pub struct CaptureWorker<T: Transport> {
    transport: Arc<Mutex<T>>,
    stop_requested: Arc<AtomicBool>,
    decoder: SampleDecoder,
    sink: Box<dyn SampleSink>,
    stall_threshold: u64,
}

impl<T: Transport> CaptureWorker<T> {
    pub fn new(
        transport: Arc<Mutex<T>>,
        stop_requested: Arc<AtomicBool>,
        decoder: SampleDecoder,
        sink: Box<dyn SampleSink>,
        stall_threshold: u64,
    ) -> Self {
        Self {
            transport,
            stop_requested,
            decoder,
            sink,
            stall_threshold,
        }
    }

    /// Run the loop on a dedicated thread.
    pub fn spawn(self) -> Result<thread::JoinHandle<CaptureReport>, CaptureError> {
        thread::Builder::new()
            .name("capture-worker".into())
            .spawn(move || self.run())
            .map_err(|e| CaptureError::Unknown(format!("failed to spawn capture worker: {}", e)))
    }

    /// Poll until stopped, stalled, or faulted, then finalize the sink.
    ///
    /// The stop flag is checked once per poll, so stop latency is bounded by
    /// the transport's poll timeout.
    pub fn run(mut self) -> CaptureReport {
        let geometry = *self.decoder.geometry();
        let mut buf = vec![0u8; (geometry.packet_size_bytes as usize).max(wire::MAX_PACKET_BYTES)];
        let mut words = Vec::with_capacity(geometry.packet_words());
        let mut scratch = DecodedSample::new();
        let mut diagnostics = CaptureDiagnostics::default();
        let mut consecutive_timeouts: u64 = 0;
        let mut error = None;

        let exit = loop {
            if self.stop_requested.load(Ordering::SeqCst) {
                break CaptureExit::StopRequested;
            }

            let outcome = self.transport.lock().poll_receive(&mut buf);
            match outcome {
                PollOutcome::Data(n) => {
                    consecutive_timeouts = 0;
                    diagnostics.packets_received += 1;

                    wire::bytes_to_quadlets(&buf[..n], &mut words);
                    let sink = &mut self.sink;
                    match self
                        .decoder
                        .decode_packet(&words, &mut scratch, |sample| sink.write_sample(sample))
                    {
                        Ok(stats) => {
                            diagnostics.samples_written += stats.decoded;
                            diagnostics.overrun_skips += stats.skipped;
                        }
                        Err(e) => {
                            log::error!("Failed to write capture data: {}", e);
                            error = Some(e);
                            break CaptureExit::StorageFault;
                        }
                    }
                }
                PollOutcome::TimeoutNoData | PollOutcome::NonProtocolData => {
                    if outcome == PollOutcome::TimeoutNoData {
                        diagnostics.timeout_polls += 1;
                    } else {
                        diagnostics.non_protocol_polls += 1;
                    }
                    consecutive_timeouts += 1;
                    diagnostics.longest_timeout_streak =
                        diagnostics.longest_timeout_streak.max(consecutive_timeouts);

                    // Silence before the first packet is not a stall.
                    if consecutive_timeouts >= self.stall_threshold && diagnostics.packets_received > 0 {
                        log::error!(
                            "Capture timeout: {} consecutive packet misses. Restart the board and host programs",
                            consecutive_timeouts
                        );
                        self.stop_requested.store(true, Ordering::SeqCst);
                        error = Some(CaptureError::CaptureStall(consecutive_timeouts));
                        break CaptureExit::Stalled;
                    }
                }
                PollOutcome::Fault(fault) => {
                    log::error!("Transport error during capture ({}). Check the board connection", fault);
                    error = Some(fault.into());
                    break CaptureExit::TransportFault;
                }
            }
        };

        if diagnostics.overrun_skips > 0 {
            log::warn!(
                "{} samples skipped: they would have read past the end of their packet",
                diagnostics.overrun_skips
            );
        }

        let sink = self.sink.finish();
        if let Err(ref e) = sink {
            log::error!("Failed to finalize capture file: {}", e);
        }

        CaptureReport {
            exit,
            error,
            diagnostics,
            sink,
        }
    }
}
