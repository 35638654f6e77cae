use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::error::CaptureError;
use crate::models::metadata::MetadataContract;
use crate::models::sample::DecodedSample;
use crate::traits::sample_sink::{FinishedSink, SampleSink};

/// Significant digits used for the timestamp column.
pub const TIMESTAMP_SIGNIFICANT_DIGITS: usize = 12;

/// Streaming CSV writer for decoded samples.
///
/// ## File Format
///
/// ```text
/// TIMESTAMP,ENCODER_POS_1..N,ENCODER_VEL_1..N,MOTOR_CURRENT_1..M,MOTOR_STATUS_1..M[,DIGITAL_IO,MIO_PINS]
/// <one row per decoded sample>
/// ```
pub struct CsvSampleWriter {
    file_path: PathBuf,
    geometry: MetadataContract,
    file: Option<BufWriter<File>>,
    rows_written: u64,
    line: String,
}

impl CsvSampleWriter {
    /// Create the file (and its directory) and write the header row.
    pub fn create(file_path: PathBuf, geometry: MetadataContract) -> Result<Self, CaptureError> {
        if let Some(parent) = file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    CaptureError::StorageError(format!("failed to create directory: {}", e))
                })?;
            }
        }

        let file = File::create(&file_path)
            .map_err(|e| CaptureError::StorageError(format!("failed to create file: {}", e)))?;

        let mut writer = Self {
            file_path,
            geometry,
            file: Some(BufWriter::new(file)),
            rows_written: 0,
            line: String::with_capacity(256),
        };

        let header = header_columns(&geometry).join(",");
        writer.write_line(&header)?;
        Ok(writer)
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn write_line(&mut self, line: &str) -> Result<(), CaptureError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| CaptureError::StorageError("file is not open".into()))?;
        file.write_all(line.as_bytes())
            .and_then(|_| file.write_all(b"\n"))
            .map_err(|e| CaptureError::StorageError(format!("write failed: {}", e)))
    }
}

impl SampleSink for CsvSampleWriter {
    fn write_sample(&mut self, sample: &DecodedSample) -> Result<(), CaptureError> {
        let mut line = std::mem::take(&mut self.line);
        format_row(&self.geometry, sample, &mut line);
        let result = self.write_line(&line);
        self.line = line;
        result?;
        self.rows_written += 1;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<FinishedSink, CaptureError> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| CaptureError::StorageError("file is not open".into()))?;
        file.flush()
            .map_err(|e| CaptureError::StorageError(format!("flush failed: {}", e)))?;
        drop(file);

        let checksum = sha256_file(&self.file_path)?;
        Ok(FinishedSink {
            path: self.file_path.clone(),
            rows_written: self.rows_written,
            checksum,
        })
    }
}

/// Header columns in their fixed order.
pub fn header_columns(geometry: &MetadataContract) -> Vec<String> {
    let mut columns = Vec::with_capacity(geometry.csv_column_count());
    columns.push("TIMESTAMP".to_string());
    for i in 1..=geometry.num_encoders {
        columns.push(format!("ENCODER_POS_{}", i));
    }
    for i in 1..=geometry.num_encoders {
        columns.push(format!("ENCODER_VEL_{}", i));
    }
    for i in 1..=geometry.num_motors {
        columns.push(format!("MOTOR_CURRENT_{}", i));
    }
    for i in 1..=geometry.num_motors {
        columns.push(format!("MOTOR_STATUS_{}", i));
    }
    if geometry.ps_io {
        columns.push("DIGITAL_IO".to_string());
        columns.push("MIO_PINS".to_string());
    }
    columns
}

/// Format one sample as a CSV row (without line terminator) into `out`.
pub fn format_row(geometry: &MetadataContract, sample: &DecodedSample, out: &mut String) {
    let num_encoders = geometry.num_encoders as usize;
    let num_motors = geometry.num_motors as usize;

    out.clear();
    out.push_str(&format_significant(sample.timestamp, TIMESTAMP_SIGNIFICANT_DIGITS));

    // Writing into a String cannot fail.
    for position in &sample.encoder_position[..num_encoders] {
        let _ = write!(out, ",{}", position);
    }
    for velocity in &sample.encoder_velocity[..num_encoders] {
        let _ = write!(out, ",{}", velocity);
    }
    for current in &sample.motor_current[..num_motors] {
        let _ = write!(out, ",{}", current);
    }
    for status in &sample.motor_status[..num_motors] {
        let _ = write!(out, ",{}", status);
    }
    if geometry.ps_io {
        let _ = write!(out, ",{},{}", sample.digital_io, sample.mio_pins);
    }
}

/// Format with `digits` significant digits, `%g` style: trailing zeros
/// removed, scientific notation when the exponent is below -4 or at least
/// `digits`.
pub fn format_significant(value: f64, digits: usize) -> String {
    let digits = digits.max(1);
    if value.is_nan() {
        return "nan".into();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf".into() } else { "-inf".into() };
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0".into() } else { "0".into() };
    }

    let scientific = format!("{:.*e}", digits - 1, value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if exponent < -4 || exponent >= digits as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exponent.abs())
    } else {
        let decimals = (digits as i32 - 1 - exponent) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Compute SHA-256 hex digest of a file.
fn sha256_file(path: &Path) -> Result<String, CaptureError> {
    let data = fs::read(path)
        .map_err(|e| CaptureError::StorageError(format!("failed to read file for checksum: {}", e)))?;
    let digest = Sha256::digest(&data);
    Ok(hex_encode(&digest))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
