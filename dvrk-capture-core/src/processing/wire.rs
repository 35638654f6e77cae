//! Wire-level constants and helpers for the board protocol.
//!
//! Commands are ASCII strings sent with a trailing NUL. Responses are
//! NUL-terminated strings compared up to the first NUL. Data packets are a
//! sequence of little-endian 32-bit words ("quadlets").
//!
//! Metadata record layout (20 bytes, little-endian):
//! ```text
//! [0-3]    hardware variant magic
//! [4]      encoder count
//! [5]      motor count
//! [6-7]    reserved
//! [8-11]   packet size in bytes
//! [12-15]  samples per packet
//! [16-19]  sample size in quadlets
//! ```

pub const HOST_READY: &[u8] = b"HOST: READY FOR DATA COLLECTION\0";
pub const HOST_READY_WITH_PS_IO: &[u8] = b"HOST: READY FOR DATA COLLECTION W PS IO\0";
pub const HOST_READY_WITH_SAMPLE_RATE: &[u8] = b"HOST: READY FOR DATA COLLECTION W SAMPLE RATE\0";
pub const HOST_START_DATA_COLLECTION: &[u8] = b"HOST: START DATA COLLECTION\0";
pub const HOST_STOP_DATA_COLLECTION: &[u8] = b"HOST: STOP DATA COLLECTION\0";
pub const HOST_RECEIVED_METADATA: &[u8] = b"HOST: RECEIVED METADATA\0";
pub const HOST_TERMINATE_SERVER: &[u8] = b"CLIENT: Terminate Server\0";

pub const PEER_READY: &str = "ZYNQ: READY FOR DATA COLLECTION";
pub const PEER_TERMINATION_SUCCESSFUL: &str = "ZYNQ: TERMINATION SUCCESSFUL";

pub const METADATA_WIRE_SIZE: usize = 20;

pub const MAX_NUM_ENCODERS: usize = 10;
pub const MAX_NUM_MOTORS: usize = 10;

/// Largest data packet the board sends (one unfragmented Ethernet datagram).
pub const MAX_PACKET_BYTES: usize = 1472;
pub const MAX_PACKET_QUADLETS: usize = MAX_PACKET_BYTES / 4;

/// Receive buffer for handshake strings.
pub const RESPONSE_BUFFER_SIZE: usize = 100;

/// Read a little-endian u32 at `offset`. The caller guarantees four bytes.
pub fn read_u32_le(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// Convert received packet bytes into quadlets, dropping a trailing partial word.
pub fn bytes_to_quadlets(bytes: &[u8], out: &mut Vec<u32>) {
    out.clear();
    out.extend(
        bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]])),
    );
}

/// Text of a NUL-terminated response, up to the first NUL.
pub fn response_text(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    &bytes[..end]
}

/// Exact string match with C `strcmp` semantics on a received buffer.
pub fn response_matches(bytes: &[u8], expected: &str) -> bool {
    response_text(bytes) == expected.as_bytes()
}

/// Encode the 4-byte sample-rate payload that follows the sample-rate ready command.
pub fn sample_rate_payload(rate: u32) -> [u8; 4] {
    rate.to_le_bytes()
}
