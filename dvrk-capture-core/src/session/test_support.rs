//! In-memory transport that replays scripted poll outcomes.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::error::{CaptureError, TransportFault};
use crate::models::metadata::{HardwareVariant, MetadataContract};
use crate::processing::wire;
use crate::traits::transport::{PollOutcome, Transport};

#[derive(Debug, Clone, PartialEq)]
pub enum Scripted {
    Data(Vec<u8>),
    Timeout,
    NonProtocol,
    Fault(TransportFault),
    /// Repeat a plain timeout this many times.
    Timeouts(u64),
}

#[derive(Debug, Default)]
pub struct ScriptState {
    pub queue: VecDeque<Scripted>,
    /// Outcomes appended whenever the matching datagram is transmitted.
    pub replies: Vec<(Vec<u8>, Vec<Scripted>)>,
    pub sent: Vec<Vec<u8>>,
    pub polls: u64,
    pub closed: bool,
    pub fail_transmit: bool,
}

/// Shared view of a `ScriptedTransport`, kept by the test after the
/// transport itself has been moved into a controller.
#[derive(Clone, Default)]
pub struct ScriptHandle(pub Arc<Mutex<ScriptState>>);

impl ScriptHandle {
    pub fn push(&self, outcome: Scripted) {
        self.0.lock().queue.push_back(outcome);
    }

    pub fn reply_to(&self, command: &[u8], outcomes: Vec<Scripted>) {
        self.0.lock().replies.push((command.to_vec(), outcomes));
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.0.lock().sent.clone()
    }

    pub fn sent_count(&self, command: &[u8]) -> usize {
        self.0.lock().sent.iter().filter(|s| s.as_slice() == command).count()
    }

    pub fn is_closed(&self) -> bool {
        self.0.lock().closed
    }

    /// Outcomes not yet consumed.
    pub fn pending(&self) -> usize {
        self.0.lock().queue.len()
    }

    pub fn polls(&self) -> u64 {
        self.0.lock().polls
    }

    pub fn set_fail_transmit(&self, fail: bool) {
        self.0.lock().fail_transmit = fail;
    }
}

/// Replays the queue; an empty queue behaves as an endless timeout.
pub struct ScriptedTransport {
    state: ScriptHandle,
}

impl ScriptedTransport {
    pub fn new() -> (Self, ScriptHandle) {
        let handle = ScriptHandle::default();
        (
            Self {
                state: handle.clone(),
            },
            handle,
        )
    }
}

impl Transport for ScriptedTransport {
    fn transmit(&mut self, bytes: &[u8]) -> Result<(), CaptureError> {
        let mut s = self.state.0.lock();
        if s.closed || s.fail_transmit {
            return Err(CaptureError::TransportFailure("transmit failed".into()));
        }
        s.sent.push(bytes.to_vec());
        let replies: Vec<Scripted> = s
            .replies
            .iter()
            .filter(|(cmd, _)| cmd.as_slice() == bytes)
            .flat_map(|(_, outcomes)| outcomes.iter().cloned())
            .collect();
        s.queue.extend(replies);
        Ok(())
    }

    fn poll_receive(&mut self, buf: &mut [u8]) -> PollOutcome {
        let mut s = self.state.0.lock();
        s.polls += 1;
        if s.closed {
            return PollOutcome::Fault(TransportFault::Socket);
        }
        match s.queue.pop_front() {
            None | Some(Scripted::Timeout) => PollOutcome::TimeoutNoData,
            Some(Scripted::Timeouts(n)) => {
                if n > 1 {
                    s.queue.push_front(Scripted::Timeouts(n - 1));
                }
                PollOutcome::TimeoutNoData
            }
            Some(Scripted::NonProtocol) => PollOutcome::NonProtocolData,
            Some(Scripted::Fault(fault)) => PollOutcome::Fault(fault),
            Some(Scripted::Data(bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                PollOutcome::Data(n)
            }
        }
    }

    fn close(&mut self) {
        self.state.0.lock().closed = true;
    }

    fn is_open(&self) -> bool {
        !self.state.0.lock().closed
    }
}

/// One encoder, one motor, no IO: five words per sample.
pub fn small_geometry(samples_per_packet: u32) -> MetadataContract {
    MetadataContract {
        hardware_variant: HardwareVariant::Qla1,
        num_encoders: 1,
        num_motors: 1,
        packet_size_bytes: 5 * 4 * samples_per_packet,
        samples_per_packet,
        sample_size_quadlets: 5,
        ps_io: false,
    }
}

pub fn nul_terminated(text: &str) -> Vec<u8> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.push(0);
    bytes
}

/// A packet whose samples carry timestamps `first_ts, first_ts + 1, ...`.
pub fn packet(geometry: &MetadataContract, first_ts: f64) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(geometry.packet_size_bytes as usize);
    for i in 0..geometry.samples_per_packet {
        let ts = (first_ts + i as f64).to_bits();
        let mut words = vec![(ts >> 32) as u32, ts as u32];
        words.resize(geometry.sample_size_quadlets as usize, i);
        for w in words {
            bytes.extend_from_slice(&w.to_le_bytes());
        }
    }
    bytes
}

/// Script a successful negotiation for `geometry`.
pub fn script_handshake(handle: &ScriptHandle, geometry: &MetadataContract) {
    handle.push(Scripted::Data(geometry.to_wire().to_vec()));
    handle.push(Scripted::Data(nul_terminated(wire::PEER_READY)));
}
