//! Addressing and timing for the UDP link to a board.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use dvrk_capture_core::models::error::CaptureError;

/// Port the board's data collection server listens on.
pub const BOARD_PORT: u16 = 12345;

/// Boards sit on the link-local subnet `169.254.10.0/24`, addressed by board id.
pub const BOARD_SUBNET: [u8; 3] = [169, 254, 10];

/// How long a single receive poll blocks before reporting "no data".
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpTransportConfig {
    /// Where commands are sent and the only source accepted as protocol traffic.
    pub peer_addr: SocketAddr,
    /// Local address to bind. Port 0 lets the OS choose.
    pub bind_addr: SocketAddr,
    pub poll_timeout: Duration,
}

impl UdpTransportConfig {
    /// Config for the board with the given id at its default address.
    pub fn for_board(board_id: u8) -> Self {
        let [a, b, c] = BOARD_SUBNET;
        Self::with_peer(SocketAddr::V4(SocketAddrV4::new(
            Ipv4Addr::new(a, b, c, board_id),
            BOARD_PORT,
        )))
    }

    /// Config for an explicit peer address, bound to any local port.
    pub fn with_peer(peer_addr: SocketAddr) -> Self {
        let bind_addr = match peer_addr {
            SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            SocketAddr::V6(_) => SocketAddr::from((std::net::Ipv6Addr::UNSPECIFIED, 0)),
        };
        Self {
            peer_addr,
            bind_addr,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    pub fn validate(&self) -> Result<(), CaptureError> {
        // A zero read timeout is rejected by the socket layer.
        if self.poll_timeout.is_zero() {
            return Err(CaptureError::ConfigurationFailed(
                "poll timeout must be positive".into(),
            ));
        }
        if self.peer_addr.is_ipv4() != self.bind_addr.is_ipv4() {
            return Err(CaptureError::ConfigurationFailed(format!(
                "bind address {} and peer address {} use different IP versions",
                self.bind_addr, self.peer_addr
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_address_follows_id() {
        let config = UdpTransportConfig::for_board(3);
        assert_eq!(config.peer_addr, "169.254.10.3:12345".parse().unwrap());
        assert_eq!(config.bind_addr, "0.0.0.0:0".parse().unwrap());
        assert_eq!(config.poll_timeout, Duration::from_millis(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_timeout_and_mixed_families() {
        let mut config = UdpTransportConfig::for_board(0);
        config.poll_timeout = Duration::ZERO;
        assert!(matches!(config.validate(), Err(CaptureError::ConfigurationFailed(_))));

        let mut config = UdpTransportConfig::with_peer("[::1]:12345".parse().unwrap());
        assert_eq!(config.bind_addr, "[::]:0".parse().unwrap());
        config.bind_addr = "0.0.0.0:0".parse().unwrap();
        assert!(config.validate().is_err());
    }
}
