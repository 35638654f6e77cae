pub mod sample_decoder;
pub mod wire;
