//! # dvrk-capture-udp
//!
//! UDP backend for dvrk-capture.
//!
//! Provides:
//! - `UdpTransport`: `Transport` over a UDP socket with a short read timeout
//! - `UdpTransportConfig`: board addressing and poll timing
//! - `connect_board`: open a transport and wrap it in a `SessionController`
//!
//! ## Usage
//! ```ignore
//! use dvrk_capture_core::SessionOptions;
//! use dvrk_capture_udp::{connect_board, UdpTransportConfig};
//!
//! let mut session = connect_board(&UdpTransportConfig::for_board(0), SessionOptions::default())?;
//! session.init()?;
//! session.start()?;
//! let result = session.stop()?;
//! session.terminate()?;
//! ```

pub mod config;
pub mod udp_transport;

pub use config::{UdpTransportConfig, BOARD_PORT, DEFAULT_POLL_TIMEOUT};
pub use udp_transport::UdpTransport;

use dvrk_capture_core::models::config::SessionOptions;
use dvrk_capture_core::models::error::CaptureError;
use dvrk_capture_core::session::controller::SessionController;

/// Open a UDP transport to a board and hand it to a fresh session.
pub fn connect_board(
    config: &UdpTransportConfig,
    options: SessionOptions,
) -> Result<SessionController<UdpTransport>, CaptureError> {
    let transport = UdpTransport::open(config)?;
    Ok(SessionController::new(transport, options))
}
