//! Session negotiation with the board.
//!
//! ```text
//! SendReady → RecvMetadata → SendMetadataAck → WaitPeerReady → negotiated
//!                  ↓                                ↓
//!                Close  ←───────────────────────────┘
//! ```
//!
//! Receive states retry on timeouts and stray datagrams until the
//! `HandshakePolicy` deadline runs out.

use std::time::{Duration, Instant};

use crate::models::config::{HandshakePolicy, ReadyVariant, SessionOptions};
use crate::models::error::CaptureError;
use crate::models::metadata::MetadataContract;
use crate::processing::wire;
use crate::traits::transport::{PollOutcome, Transport};

#[derive(Debug, Clone, PartialEq)]
pub enum HandshakeState {
    SendReady,
    RecvMetadata,
    SendMetadataAck(MetadataContract),
    WaitPeerReady(MetadataContract),
    Close(CaptureError),
}

/// Result of one transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Next(HandshakeState),
    Negotiated(MetadataContract),
    Failed(CaptureError),
}

/// Tracks how long a receive state has gone without progress.
#[derive(Debug, Clone)]
pub(crate) struct RetryBudget {
    deadline: Option<Duration>,
    waiting_since: Option<Instant>,
}

impl RetryBudget {
    pub(crate) fn new(policy: HandshakePolicy) -> Self {
        Self {
            deadline: policy.deadline,
            waiting_since: None,
        }
    }

    /// Record an empty poll. Returns the deadline once it has been exceeded.
    pub(crate) fn idle_poll(&mut self) -> Option<Duration> {
        let deadline = self.deadline?;
        let since = *self.waiting_since.get_or_insert_with(Instant::now);
        (since.elapsed() >= deadline).then_some(deadline)
    }

    pub(crate) fn reset(&mut self) {
        self.waiting_since = None;
    }
}

/// Drives the negotiation state machine over a borrowed transport.
pub struct Handshake<'a, T: Transport> {
    transport: &'a mut T,
    options: &'a SessionOptions,
    budget: RetryBudget,
    buf: [u8; wire::RESPONSE_BUFFER_SIZE],
}

impl<'a, T: Transport> Handshake<'a, T> {
    pub fn new(transport: &'a mut T, options: &'a SessionOptions) -> Self {
        Self {
            transport,
            options,
            budget: RetryBudget::new(options.handshake),
            buf: [0u8; wire::RESPONSE_BUFFER_SIZE],
        }
    }

    /// Run from `SendReady` to a terminal outcome.
    ///
    /// On failure the transport has already been closed.
    pub fn run(mut self) -> Result<MetadataContract, CaptureError> {
        let mut state = HandshakeState::SendReady;
        loop {
            match self.step(state) {
                Step::Next(next) => state = next,
                Step::Negotiated(metadata) => return Ok(metadata),
                Step::Failed(err) => return Err(err),
            }
        }
    }

    /// Perform one transition.
    pub fn step(&mut self, state: HandshakeState) -> Step {
        match state {
            HandshakeState::SendReady => Step::Next(self.send_ready()),
            HandshakeState::RecvMetadata => Step::Next(self.recv_metadata()),
            HandshakeState::SendMetadataAck(metadata) => {
                match self.transport.transmit(wire::HOST_RECEIVED_METADATA) {
                    Ok(()) => Step::Next(HandshakeState::WaitPeerReady(metadata)),
                    Err(e) => Step::Next(HandshakeState::Close(e)),
                }
            }
            HandshakeState::WaitPeerReady(metadata) => self.wait_peer_ready(metadata),
            HandshakeState::Close(err) => {
                self.transport.close();
                Step::Failed(err)
            }
        }
    }

    fn send_ready(&mut self) -> HandshakeState {
        let sent = match self.options.ready_variant() {
            ReadyVariant::Plain => self.transport.transmit(wire::HOST_READY),
            ReadyVariant::WithPsIo => self.transport.transmit(wire::HOST_READY_WITH_PS_IO),
            ReadyVariant::WithSampleRate(rate) => self
                .transport
                .transmit(wire::HOST_READY_WITH_SAMPLE_RATE)
                .and_then(|_| self.transport.transmit(&wire::sample_rate_payload(rate))),
        };
        match sent {
            Ok(()) => {
                self.budget.reset();
                HandshakeState::RecvMetadata
            }
            Err(e) => {
                log::error!("Failed to send ready command: {}", e);
                HandshakeState::Close(e)
            }
        }
    }

    fn recv_metadata(&mut self) -> HandshakeState {
        match self.transport.poll_receive(&mut self.buf) {
            PollOutcome::Data(n) => {
                match MetadataContract::from_wire(&self.buf[..n], self.options.use_ps_io) {
                    Ok(metadata) => {
                        log::info!("Received metadata from board\n{}", metadata);
                        if !metadata.is_whole_samples() {
                            log::warn!(
                                "Packet of {} bytes is not a whole number of {}-quadlet samples",
                                metadata.packet_size_bytes,
                                metadata.sample_size_quadlets
                            );
                        }
                        self.budget.reset();
                        HandshakeState::SendMetadataAck(metadata)
                    }
                    Err(e) => {
                        log::error!("Host is out of sync with the board state machine: {}", e);
                        HandshakeState::Close(e)
                    }
                }
            }
            PollOutcome::TimeoutNoData | PollOutcome::NonProtocolData => {
                self.retry_or_close(HandshakeState::RecvMetadata)
            }
            PollOutcome::Fault(fault) => {
                log::error!("Transport failed while waiting for metadata: {}", fault);
                HandshakeState::Close(fault.into())
            }
        }
    }

    fn wait_peer_ready(&mut self, metadata: MetadataContract) -> Step {
        match self.transport.poll_receive(&mut self.buf) {
            PollOutcome::Data(n) => {
                if wire::response_matches(&self.buf[..n], wire::PEER_READY) {
                    log::info!("Received message: {}", wire::PEER_READY);
                    Step::Negotiated(metadata)
                } else {
                    let got = String::from_utf8_lossy(wire::response_text(&self.buf[..n])).into_owned();
                    log::error!("Host is out of sync with the board state machine, got {:?}", got);
                    Step::Next(HandshakeState::Close(CaptureError::ProtocolDesync(format!(
                        "expected {:?}, got {:?}",
                        wire::PEER_READY,
                        got
                    ))))
                }
            }
            PollOutcome::TimeoutNoData | PollOutcome::NonProtocolData => {
                Step::Next(self.retry_or_close(HandshakeState::WaitPeerReady(metadata)))
            }
            PollOutcome::Fault(fault) => {
                log::error!("Transport failed while waiting for board ready: {}", fault);
                Step::Next(HandshakeState::Close(fault.into()))
            }
        }
    }

    fn retry_or_close(&mut self, same: HandshakeState) -> HandshakeState {
        match self.budget.idle_poll() {
            Some(deadline) => {
                log::error!("Board did not respond within {:?}", deadline);
                HandshakeState::Close(CaptureError::HandshakeTimeout(deadline))
            }
            None => same,
        }
    }
}
