use super::error::CaptureError;
use super::metadata::MetadataContract;

/// Session lifecycle state machine.
///
/// State transitions:
/// ```text
/// idle → negotiating → ready ⇄ capturing
///                        ↑         ↓
///                        └─ stopping
///                  ready → terminated
/// any failure → failed
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Negotiating,
    Ready { metadata: MetadataContract },
    Capturing { capture_index: u32 },
    Stopping,
    Terminated,
    Failed(CaptureError),
}

impl SessionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self, Self::Capturing { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated | Self::Failed(_))
    }

    /// Short lowercase name, used in log lines and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Negotiating => "negotiating",
            Self::Ready { .. } => "ready",
            Self::Capturing { .. } => "capturing",
            Self::Stopping => "stopping",
            Self::Terminated => "terminated",
            Self::Failed(_) => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(SessionState::Terminated.is_terminal());
        assert!(SessionState::Failed(CaptureError::Unknown("x".into())).is_terminal());
        assert!(!SessionState::Idle.is_terminal());
        assert!(!SessionState::Capturing { capture_index: 1 }.is_terminal());
    }

    #[test]
    fn names_are_stable() {
        assert_eq!(SessionState::Idle.name(), "idle");
        assert_eq!(SessionState::Stopping.name(), "stopping");
        assert_eq!(SessionState::Capturing { capture_index: 3 }.name(), "capturing");
    }
}
