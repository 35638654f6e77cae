pub mod sample_sink;
pub mod session_delegate;
pub mod transport;
