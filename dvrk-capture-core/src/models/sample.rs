use crate::processing::wire::{MAX_NUM_ENCODERS, MAX_NUM_MOTORS};

/// Scratch record for one decoded sample.
///
/// Sized for the maximum geometry so the capture worker can reuse a single
/// instance for every sample; only the first `num_encoders` / `num_motors`
/// entries of each array are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DecodedSample {
    pub timestamp: f64,
    pub encoder_position: [i32; MAX_NUM_ENCODERS],
    pub encoder_velocity: [f32; MAX_NUM_ENCODERS],
    pub motor_current: [u16; MAX_NUM_MOTORS],
    pub motor_status: [u16; MAX_NUM_MOTORS],
    pub digital_io: u32,
    pub mio_pins: u32,
}

impl DecodedSample {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero every field.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_zeroed(&self) -> bool {
        *self == Self::default()
    }
}
