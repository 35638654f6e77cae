use crate::models::capture_result::CaptureResult;
use crate::models::error::CaptureError;
use crate::models::metadata::MetadataContract;
use crate::models::state::SessionState;

/// Event delegate for session notifications.
///
/// All methods are called from the controller thread.
pub trait SessionDelegate: Send + Sync {
    /// Called when the session state changes.
    fn on_state_changed(&self, state: &SessionState);

    /// Called once negotiation has accepted the board's metadata.
    fn on_metadata_received(&self, metadata: &MetadataContract);

    /// Called when an operation fails or a capture ends abnormally.
    fn on_error(&self, error: &CaptureError);

    /// Called when a capture is stopped and its file finalized.
    fn on_capture_finished(&self, result: &CaptureResult);
}
