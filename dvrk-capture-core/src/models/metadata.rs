use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::CaptureError;
use crate::processing::wire::{self, MAX_NUM_ENCODERS, MAX_NUM_MOTORS, MAX_PACKET_BYTES, METADATA_WIRE_SIZE};

/// Controller board family announced in the metadata record.
///
/// The wire carries a 4-byte magic whose big-endian bytes spell the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HardwareVariant {
    #[serde(rename = "QLA1")]
    Qla1,
    #[serde(rename = "dRA1")]
    Dra1,
    #[serde(rename = "DQLA")]
    Dqla,
}

impl HardwareVariant {
    pub const QLA1_MAGIC: u32 = 0x514C_4131;
    pub const DRA1_MAGIC: u32 = 0x6452_4131;
    pub const DQLA_MAGIC: u32 = 0x4451_4C41;

    pub fn from_magic(magic: u32) -> Option<Self> {
        match magic {
            Self::QLA1_MAGIC => Some(Self::Qla1),
            Self::DRA1_MAGIC => Some(Self::Dra1),
            Self::DQLA_MAGIC => Some(Self::Dqla),
            _ => None,
        }
    }

    pub fn magic(self) -> u32 {
        match self {
            Self::Qla1 => Self::QLA1_MAGIC,
            Self::Dra1 => Self::DRA1_MAGIC,
            Self::Dqla => Self::DQLA_MAGIC,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Qla1 => "QLA1",
            Self::Dra1 => "dRA1",
            Self::Dqla => "DQLA",
        }
    }
}

impl fmt::Display for HardwareVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Render an arbitrary magic as printable text for diagnostics.
pub fn magic_to_string(magic: u32) -> String {
    magic
        .to_be_bytes()
        .iter()
        .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
        .collect()
}

/// Packet geometry negotiated once per session.
///
/// Immutable after negotiation; the decoder and CSV sink only read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataContract {
    pub hardware_variant: HardwareVariant,
    pub num_encoders: u8,
    pub num_motors: u8,
    pub packet_size_bytes: u32,
    pub samples_per_packet: u32,
    pub sample_size_quadlets: u32,
    /// Whether samples carry the trailing digital IO and MIO words.
    pub ps_io: bool,
}

impl MetadataContract {
    /// Parse and validate the fixed-layout metadata record.
    ///
    /// An unknown variant magic or a truncated record is a protocol desync;
    /// a known magic with impossible geometry is invalid metadata.
    pub fn from_wire(bytes: &[u8], ps_io: bool) -> Result<Self, CaptureError> {
        if bytes.len() < METADATA_WIRE_SIZE {
            return Err(CaptureError::ProtocolDesync(format!(
                "metadata record too short: {} of {} bytes",
                bytes.len(),
                METADATA_WIRE_SIZE
            )));
        }

        let magic = wire::read_u32_le(bytes, 0);
        let hardware_variant = HardwareVariant::from_magic(magic).ok_or_else(|| {
            CaptureError::ProtocolDesync(format!(
                "unrecognized hardware variant 0x{:08X} ({})",
                magic,
                magic_to_string(magic)
            ))
        })?;

        let contract = Self {
            hardware_variant,
            num_encoders: bytes[4],
            num_motors: bytes[5],
            packet_size_bytes: wire::read_u32_le(bytes, 8),
            samples_per_packet: wire::read_u32_le(bytes, 12),
            sample_size_quadlets: wire::read_u32_le(bytes, 16),
            ps_io,
        };
        contract.validate()?;
        Ok(contract)
    }

    /// Serialize to the wire layout. Used by simulated peers and tests.
    pub fn to_wire(&self) -> [u8; METADATA_WIRE_SIZE] {
        let mut record = [0u8; METADATA_WIRE_SIZE];
        record[0..4].copy_from_slice(&self.hardware_variant.magic().to_le_bytes());
        record[4] = self.num_encoders;
        record[5] = self.num_motors;
        record[8..12].copy_from_slice(&self.packet_size_bytes.to_le_bytes());
        record[12..16].copy_from_slice(&self.samples_per_packet.to_le_bytes());
        record[16..20].copy_from_slice(&self.sample_size_quadlets.to_le_bytes());
        record
    }

    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.num_encoders as usize > MAX_NUM_ENCODERS {
            return Err(CaptureError::InvalidMetadata(format!(
                "{} encoders exceeds maximum of {}",
                self.num_encoders, MAX_NUM_ENCODERS
            )));
        }
        if self.num_motors as usize > MAX_NUM_MOTORS {
            return Err(CaptureError::InvalidMetadata(format!(
                "{} motors exceeds maximum of {}",
                self.num_motors, MAX_NUM_MOTORS
            )));
        }
        if self.packet_size_bytes == 0 || self.packet_size_bytes as usize > MAX_PACKET_BYTES {
            return Err(CaptureError::InvalidMetadata(format!(
                "packet size {} outside 1..={} bytes",
                self.packet_size_bytes, MAX_PACKET_BYTES
            )));
        }
        if (self.sample_size_quadlets as usize) < self.sample_words_required() {
            return Err(CaptureError::InvalidMetadata(format!(
                "sample size {} quadlets cannot hold {} fields",
                self.sample_size_quadlets,
                self.sample_words_required()
            )));
        }
        Ok(())
    }

    /// Words one sample's fields occupy: timestamp, positions, velocities,
    /// motor words, and the optional IO pair.
    pub fn sample_words_required(&self) -> usize {
        let io_words = if self.ps_io { 2 } else { 0 };
        2 + 2 * self.num_encoders as usize + self.num_motors as usize + io_words
    }

    /// Whole 32-bit words in one wire packet.
    pub fn packet_words(&self) -> usize {
        self.packet_size_bytes as usize / 4
    }

    /// True when the packet divides evenly into samples.
    pub fn is_whole_samples(&self) -> bool {
        self.sample_size_quadlets != 0
            && self.packet_size_bytes % 4 == 0
            && self.packet_words() % self.sample_size_quadlets as usize == 0
    }

    /// Number of CSV columns a capture with this geometry produces.
    pub fn csv_column_count(&self) -> usize {
        let io_columns = if self.ps_io { 2 } else { 0 };
        1 + 2 * self.num_encoders as usize + 2 * self.num_motors as usize + io_columns
    }
}

impl fmt::Display for MetadataContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "---- DATA COLLECTION METADATA ----")?;
        writeln!(f, "Hardware Version: {}", self.hardware_variant)?;
        writeln!(f, "Num of Encoders: {}", self.num_encoders)?;
        writeln!(f, "Num of Motors: {}", self.num_motors)?;
        writeln!(f, "Packet Size (in bytes): {}", self.packet_size_bytes)?;
        writeln!(f, "Samples per Packet: {}", self.samples_per_packet)?;
        writeln!(f, "Sample Size (in quadlets): {}", self.sample_size_quadlets)?;
        write!(f, "----------------------------------")
    }
}
