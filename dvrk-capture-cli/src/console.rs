//! Terminal reporting for a running session.

use dvrk_capture_core::{CaptureError, CaptureResult, MetadataContract, SessionDelegate, SessionState};

/// Prints negotiated geometry and capture summaries for the operator.
pub struct ConsoleDelegate;

impl SessionDelegate for ConsoleDelegate {
    fn on_state_changed(&self, state: &SessionState) {
        log::debug!("Session is now {}", state.name());
    }

    fn on_metadata_received(&self, metadata: &MetadataContract) {
        println!();
        println!("{}", metadata);
        println!();
    }

    fn on_error(&self, error: &CaptureError) {
        log::error!("{}", error);
    }

    fn on_capture_finished(&self, result: &CaptureResult) {
        let d = &result.diagnostics;
        println!();
        println!("Capture [{}] finished: {}", result.capture_index, result.exit);
        println!("  Duration:        {:.3} s", result.duration_secs);
        println!("  Packets:         {}", d.packets_received);
        println!("  Samples written: {}", d.samples_written);
        if d.overrun_skips > 0 {
            println!("  Overrun skips:   {}", d.overrun_skips);
        }
        println!("  File:            {}", result.file_path.display());
        println!("  SHA-256:         {}", result.checksum);
        println!();
    }
}
