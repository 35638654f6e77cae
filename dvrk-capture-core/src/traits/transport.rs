use crate::models::error::{CaptureError, TransportFault};

/// Result of one bounded-wait receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A datagram of this many bytes was copied into the buffer.
    Data(usize),
    /// Nothing arrived within the transport's poll timeout.
    TimeoutNoData,
    /// Something arrived that did not come from the board.
    NonProtocolData,
    /// The transport cannot continue.
    Fault(TransportFault),
}

/// Datagram link to one controller board.
///
/// Implemented by:
/// - `UdpTransport` (dvrk-capture-udp)
/// - scripted in-memory transports in tests
///
/// The poll timeout is a property of the transport, fixed at construction.
/// It also bounds how quickly a capture worker notices a stop request.
pub trait Transport: Send + 'static {
    /// Send one datagram to the board.
    fn transmit(&mut self, bytes: &[u8]) -> Result<(), CaptureError>;

    /// Wait up to the poll timeout for one datagram.
    fn poll_receive(&mut self, buf: &mut [u8]) -> PollOutcome;

    /// Release the underlying handle. Further calls fail.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}
