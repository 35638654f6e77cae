use crate::models::metadata::MetadataContract;
use crate::models::sample::DecodedSample;
use crate::processing::wire::{MAX_NUM_ENCODERS, MAX_NUM_MOTORS};

/// Reassemble the timestamp from its two wire words.
///
/// The board splits an IEEE-754 double's bit pattern across two quadlets,
/// high word first. This is a bit reinterpretation, not a numeric conversion.
pub fn timestamp_from_words(high: u32, low: u32) -> f64 {
    f64::from_bits(((high as u64) << 32) | low as u64)
}

/// Reinterpret a wire word as an IEEE-754 single.
pub fn velocity_from_word(word: u32) -> f32 {
    f32::from_bits(word)
}

/// Split a motor word into `(status, current)`: status in the upper 16 bits.
pub fn split_motor_word(word: u32) -> (u16, u16) {
    ((word >> 16) as u16, (word & 0xFFFF) as u16)
}

/// Outcome of decoding one sample slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOutcome {
    Decoded,
    /// The slot would read past the end of the packet; nothing was touched.
    OverrunSkipped,
}

/// Per-packet decode counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketStats {
    pub decoded: u64,
    pub skipped: u64,
}

/// Stateless decoder for one negotiated geometry.
#[derive(Debug, Clone)]
pub struct SampleDecoder {
    geometry: MetadataContract,
    span: usize,
    fits_record: bool,
}

impl SampleDecoder {
    pub fn new(geometry: MetadataContract) -> Self {
        // Guard on whichever is larger so unvalidated geometry can never
        // index outside the slice.
        let span = (geometry.sample_size_quadlets as usize).max(geometry.sample_words_required());
        // Counts beyond the fixed sample arrays cannot be decoded at all.
        let fits_record = geometry.num_encoders as usize <= MAX_NUM_ENCODERS
            && geometry.num_motors as usize <= MAX_NUM_MOTORS;
        Self {
            geometry,
            span,
            fits_record,
        }
    }

    pub fn geometry(&self) -> &MetadataContract {
        &self.geometry
    }

    /// Decode the sample starting at word `start` into `out`.
    ///
    /// Words are read in order: timestamp high/low, encoder positions,
    /// encoder velocities, motor words, then digital IO and MIO pins when
    /// the IO option was negotiated.
    ///
    /// Geometry with more encoders or motors than a `DecodedSample` holds
    /// skips every slot.
    pub fn decode(&self, words: &[u32], start: usize, out: &mut DecodedSample) -> DecodeOutcome {
        if !self.fits_record || start.checked_add(self.span).map_or(true, |end| end > words.len()) {
            return DecodeOutcome::OverrunSkipped;
        }

        let num_encoders = self.geometry.num_encoders as usize;
        let num_motors = self.geometry.num_motors as usize;
        let mut idx = start;

        out.timestamp = timestamp_from_words(words[idx], words[idx + 1]);
        idx += 2;

        for position in out.encoder_position.iter_mut().take(num_encoders) {
            *position = words[idx] as i32;
            idx += 1;
        }
        for velocity in out.encoder_velocity.iter_mut().take(num_encoders) {
            *velocity = velocity_from_word(words[idx]);
            idx += 1;
        }
        for motor in 0..num_motors {
            let (status, current) = split_motor_word(words[idx]);
            out.motor_status[motor] = status;
            out.motor_current[motor] = current;
            idx += 1;
        }

        if self.geometry.ps_io {
            out.digital_io = words[idx];
            out.mio_pins = words[idx + 1];
        }

        DecodeOutcome::Decoded
    }

    /// Decode every sample slot of a received packet, handing each decoded
    /// sample to `emit` and zeroing the scratch record afterwards.
    ///
    /// Slots are laid out every `sample_size_quadlets` words across the
    /// negotiated packet length; slots that do not fit in `words` are
    /// counted as skipped.
    pub fn decode_packet<E, F>(
        &self,
        words: &[u32],
        scratch: &mut DecodedSample,
        mut emit: F,
    ) -> Result<PacketStats, E>
    where
        F: FnMut(&DecodedSample) -> Result<(), E>,
    {
        let mut stats = PacketStats::default();
        let step = self.geometry.sample_size_quadlets.max(1) as usize;

        for start in (0..self.geometry.packet_words()).step_by(step) {
            match self.decode(words, start, scratch) {
                DecodeOutcome::Decoded => {
                    emit(scratch)?;
                    scratch.clear();
                    stats.decoded += 1;
                }
                DecodeOutcome::OverrunSkipped => stats.skipped += 1,
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::metadata::HardwareVariant;
    use approx::assert_relative_eq;
    use std::convert::Infallible;

    fn geometry(num_encoders: u8, num_motors: u8, ps_io: bool, samples: u32) -> MetadataContract {
        let io = if ps_io { 2 } else { 0 };
        let sample = 2 + 2 * num_encoders as u32 + num_motors as u32 + io;
        MetadataContract {
            hardware_variant: HardwareVariant::Dqla,
            num_encoders,
            num_motors,
            packet_size_bytes: sample * samples * 4,
            samples_per_packet: samples,
            sample_size_quadlets: sample,
            ps_io,
        }
    }

    #[test]
    fn decodes_reference_words() {
        let decoder = SampleDecoder::new(geometry(1, 1, false, 1));
        let words = [0x3FF0_0000, 0x0000_0000, 5, 0x3F80_0000, 0x0001_0002];
        let mut sample = DecodedSample::new();

        assert_eq!(decoder.decode(&words, 0, &mut sample), DecodeOutcome::Decoded);
        assert_relative_eq!(sample.timestamp, 1.0);
        assert_eq!(sample.encoder_position[0], 5);
        assert_relative_eq!(sample.encoder_velocity[0], 1.0);
        assert_eq!(sample.motor_status[0], 1);
        assert_eq!(sample.motor_current[0], 2);
    }

    #[test]
    fn negative_positions_keep_sign() {
        let decoder = SampleDecoder::new(geometry(2, 0, false, 1));
        let words = [0, 0, (-7i32) as u32, 42, (-1.5f32).to_bits(), 0.25f32.to_bits()];
        let mut sample = DecodedSample::new();

        decoder.decode(&words, 0, &mut sample);
        assert_eq!(sample.encoder_position[..2], [-7, 42]);
        assert_relative_eq!(sample.encoder_velocity[0], -1.5);
        assert_relative_eq!(sample.encoder_velocity[1], 0.25);
    }

    #[test]
    fn timestamp_is_bit_reinterpretation() {
        let value = 1234.5678_f64;
        let bits = value.to_bits();
        let ts = timestamp_from_words((bits >> 32) as u32, bits as u32);
        assert_eq!(ts.to_bits(), bits);
    }

    #[test]
    fn io_words_follow_motors() {
        let decoder = SampleDecoder::new(geometry(1, 1, true, 1));
        let words = [0, 0, 1, 0, 0xFFFF_0000, 0xDEAD_BEEF, 0x0000_00F0];
        let mut sample = DecodedSample::new();

        decoder.decode(&words, 0, &mut sample);
        assert_eq!(sample.motor_status[0], 0xFFFF);
        assert_eq!(sample.motor_current[0], 0);
        assert_eq!(sample.digital_io, 0xDEAD_BEEF);
        assert_eq!(sample.mio_pins, 0xF0);
    }

    #[test]
    fn overrun_leaves_scratch_untouched() {
        let decoder = SampleDecoder::new(geometry(1, 1, false, 1));
        let words = [0x3FF0_0000, 0, 5, 0x3F80_0000];
        let mut sample = DecodedSample::new();

        assert_eq!(decoder.decode(&words, 0, &mut sample), DecodeOutcome::OverrunSkipped);
        assert!(sample.is_zeroed());
        assert_eq!(decoder.decode(&words, usize::MAX, &mut sample), DecodeOutcome::OverrunSkipped);
    }

    #[test]
    fn oversized_counts_are_skipped_not_decoded() {
        let mut sample = DecodedSample::new();

        let too_many_motors = geometry(0, 11, false, 1);
        let words = vec![0u32; too_many_motors.sample_size_quadlets as usize];
        let decoder = SampleDecoder::new(too_many_motors);
        assert_eq!(decoder.decode(&words, 0, &mut sample), DecodeOutcome::OverrunSkipped);

        let too_many_encoders = geometry(11, 0, false, 1);
        let words = vec![0u32; too_many_encoders.sample_size_quadlets as usize];
        let decoder = SampleDecoder::new(too_many_encoders);
        let stats = decoder
            .decode_packet::<Infallible, _>(&words, &mut sample, |_| Ok(()))
            .unwrap();
        assert_eq!(stats, PacketStats { decoded: 0, skipped: 1 });
        assert!(sample.is_zeroed());
    }

    #[test]
    fn decode_packet_emits_every_slot_and_zeroes_scratch() {
        let decoder = SampleDecoder::new(geometry(1, 1, false, 3));
        let mut words = Vec::new();
        for i in 0..3u32 {
            let ts = (i as f64).to_bits();
            words.extend_from_slice(&[(ts >> 32) as u32, ts as u32, i, 0, i << 16]);
        }
        let mut sample = DecodedSample::new();
        let mut seen = Vec::new();

        let stats = decoder
            .decode_packet::<Infallible, _>(&words, &mut sample, |s| {
                seen.push((s.timestamp, s.encoder_position[0], s.motor_status[0]));
                Ok(())
            })
            .unwrap();

        assert_eq!(stats, PacketStats { decoded: 3, skipped: 0 });
        assert_eq!(seen, vec![(0.0, 0, 0), (1.0, 1, 1), (2.0, 2, 2)]);
        assert!(sample.is_zeroed());
    }

    #[test]
    fn short_packet_counts_skips() {
        let decoder = SampleDecoder::new(geometry(1, 1, false, 3));
        let words = vec![0u32; 5 * 2 + 3];
        let mut sample = DecodedSample::new();
        let mut emitted = 0;

        let stats = decoder
            .decode_packet::<Infallible, _>(&words, &mut sample, |_| {
                emitted += 1;
                Ok(())
            })
            .unwrap();

        assert_eq!(emitted, 2);
        assert_eq!(stats, PacketStats { decoded: 2, skipped: 1 });
    }

    #[test]
    fn ragged_geometry_skips_trailing_slot() {
        let mut g = geometry(1, 1, false, 2);
        g.packet_size_bytes += 8; // two spare words, not a whole sample
        let decoder = SampleDecoder::new(g);
        let words = vec![0u32; g.packet_words()];
        let mut sample = DecodedSample::new();

        let stats = decoder
            .decode_packet::<Infallible, _>(&words, &mut sample, |_| Ok(()))
            .unwrap();
        assert_eq!(stats, PacketStats { decoded: 2, skipped: 1 });
    }

    #[test]
    fn emit_error_stops_decoding() {
        let decoder = SampleDecoder::new(geometry(1, 1, false, 3));
        let words = vec![0u32; 15];
        let mut sample = DecodedSample::new();

        let result = decoder.decode_packet(&words, &mut sample, |_| Err("disk full"));
        assert_eq!(result, Err("disk full"));
    }
}
