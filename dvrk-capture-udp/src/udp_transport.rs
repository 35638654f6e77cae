//! `Transport` over a connectionless UDP socket.
//!
//! Receives block for at most the configured poll timeout, so the capture
//! worker can check its stop flag between polls.

use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};

use dvrk_capture_core::models::error::{CaptureError, TransportFault};
use dvrk_capture_core::traits::transport::{PollOutcome, Transport};

use crate::config::UdpTransportConfig;

/// UDP link to one board.
///
/// Only datagrams whose source matches the configured peer are reported as
/// data; anything else counts as non-protocol traffic.
pub struct UdpTransport {
    socket: Option<UdpSocket>,
    peer: SocketAddr,
}

impl UdpTransport {
    /// Bind a socket and configure its receive timeout.
    pub fn open(config: &UdpTransportConfig) -> Result<Self, CaptureError> {
        config.validate()?;

        let socket = UdpSocket::bind(config.bind_addr).map_err(|e| {
            CaptureError::TransportFailure(format!("failed to bind {}: {}", config.bind_addr, e))
        })?;
        socket.set_read_timeout(Some(config.poll_timeout)).map_err(|e| {
            CaptureError::TransportFailure(format!("failed to set read timeout: {}", e))
        })?;

        match socket.local_addr() {
            Ok(local) => log::info!("UDP transport bound to {} (board at {})", local, config.peer_addr),
            Err(_) => log::info!("UDP transport bound (board at {})", config.peer_addr),
        }

        Ok(Self {
            socket: Some(socket),
            peer: config.peer_addr,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Local address of the bound socket, or `None` once closed.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }
}

impl Transport for UdpTransport {
    fn transmit(&mut self, bytes: &[u8]) -> Result<(), CaptureError> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| CaptureError::TransportFailure("transport is closed".into()))?;

        let sent = socket.send_to(bytes, self.peer).map_err(|e| {
            CaptureError::TransportFailure(format!("failed to send to {}: {}", self.peer, e))
        })?;
        if sent != bytes.len() {
            return Err(CaptureError::TransportFailure(format!(
                "short send to {}: {} of {} bytes",
                self.peer,
                sent,
                bytes.len()
            )));
        }
        Ok(())
    }

    fn poll_receive(&mut self, buf: &mut [u8]) -> PollOutcome {
        let Some(socket) = self.socket.as_ref() else {
            return PollOutcome::Fault(TransportFault::Socket);
        };

        match socket.recv_from(buf) {
            Ok((0, _)) => PollOutcome::NonProtocolData,
            Ok((n, src)) if src == self.peer => PollOutcome::Data(n),
            Ok((_, src)) => {
                log::trace!("Ignoring datagram from {}", src);
                PollOutcome::NonProtocolData
            }
            Err(e) => match e.kind() {
                ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted => {
                    PollOutcome::TimeoutNoData
                }
                ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset => {
                    log::error!("UDP peer {} unreachable: {}", self.peer, e);
                    PollOutcome::Fault(TransportFault::ConnectionClosed)
                }
                _ => {
                    log::error!("UDP recv error: {}", e);
                    PollOutcome::Fault(TransportFault::Socket)
                }
            },
        }
    }

    fn close(&mut self) {
        if self.socket.take().is_some() {
            log::debug!("UDP transport to {} closed", self.peer);
        }
    }

    fn is_open(&self) -> bool {
        self.socket.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn loopback_pair() -> (UdpTransport, UdpSocket) {
        let board = UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut config = UdpTransportConfig::with_peer(board.local_addr().unwrap());
        config.bind_addr = "127.0.0.1:0".parse().unwrap();
        config.poll_timeout = Duration::from_millis(5);
        (UdpTransport::open(&config).unwrap(), board)
    }

    fn poll_until_not_timeout(transport: &mut UdpTransport, buf: &mut [u8]) -> PollOutcome {
        let start = Instant::now();
        loop {
            let outcome = transport.poll_receive(buf);
            if outcome != PollOutcome::TimeoutNoData || start.elapsed() > Duration::from_secs(2) {
                return outcome;
            }
        }
    }

    #[test]
    fn exchanges_datagrams_with_peer() {
        let (mut transport, board) = loopback_pair();
        transport.transmit(b"HELLO\0").unwrap();

        let mut buf = [0u8; 16];
        let (n, client) = board.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"HELLO\0");
        assert_eq!(Some(client), transport.local_addr());

        board.send_to(b"WORLD", client).unwrap();
        let outcome = poll_until_not_timeout(&mut transport, &mut buf);
        assert_eq!(outcome, PollOutcome::Data(5));
        assert_eq!(&buf[..5], b"WORLD");
    }

    #[test]
    fn idle_socket_times_out() {
        let (mut transport, _board) = loopback_pair();
        let mut buf = [0u8; 16];
        assert_eq!(transport.poll_receive(&mut buf), PollOutcome::TimeoutNoData);
    }

    #[test]
    fn foreign_sender_is_non_protocol() {
        let (mut transport, _board) = loopback_pair();
        let stranger = UdpSocket::bind("127.0.0.1:0").unwrap();
        stranger
            .send_to(b"noise", transport.local_addr().unwrap())
            .unwrap();

        let mut buf = [0u8; 16];
        let outcome = poll_until_not_timeout(&mut transport, &mut buf);
        assert_eq!(outcome, PollOutcome::NonProtocolData);
    }

    #[test]
    fn closed_transport_faults() {
        let (mut transport, _board) = loopback_pair();
        transport.close();

        assert!(!transport.is_open());
        assert_eq!(transport.local_addr(), None);
        assert_eq!(
            transport.poll_receive(&mut [0u8; 4]),
            PollOutcome::Fault(TransportFault::Socket)
        );
        assert!(matches!(
            transport.transmit(b"x"),
            Err(CaptureError::TransportFailure(_))
        ));
    }
}
