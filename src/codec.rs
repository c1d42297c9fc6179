//! Binary wire codec for the sensor peripheral
//!
//! The peripheral speaks two fixed-layout little-endian records:
//!
//! - [`SamplePoint`] - one telemetry sample, pushed as a characteristic
//!   notification (22 bytes on the wire)
//! - [`ConfigRegister`] - the device configuration register, read and written
//!   through the settings characteristic (18 bytes on the wire)
//!
//! Decoding works on immutable byte slices with explicit per-field offsets, so
//! it is safe to call from any thread and never consumes more input than the
//! fixed layout. A buffer shorter than the layout fails with
//! [`DecodeError::Truncated`]; fields are never zero-filled.

use thiserror::Error;

/// Wire size of a [`SamplePoint`] record in bytes.
pub const SAMPLE_WIRE_LEN: usize = 22;

/// Wire size of a [`ConfigRegister`] record in bytes.
pub const CONFIG_WIRE_LEN: usize = 18;

/// Errors produced while decoding a wire record
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer is shorter than the fixed layout requires
    #[error("truncated record: need {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
}

/// One telemetry sample as notified by the peripheral
///
/// GPS fields and the device timestamp use device-defined encodings; they are
/// carried through untouched. `system_stable` and `fault` are opaque status
/// bytes whose bit semantics the peripheral does not document.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SamplePoint {
    /// Primary telemetry value
    pub gas_concentration: f32,
    /// Device clock, units defined by the peripheral
    pub timestamp: u32,
    pub gps_latitude: u32,
    pub gps_longitude: u32,
    pub gps_altitude: u32,
    /// Boolean-like stability flag, opaque encoding
    pub system_stable: u8,
    /// Fault code, opaque encoding
    pub fault: u8,
}

/// The device configuration register
///
/// Round-trips byte-exactly through [`encode_config`] and [`decode_config`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ConfigRegister {
    pub wavelength: f32,
    pub modulation_frequency: f32,
    pub demodulation_frequency: f32,
    pub sampling_interval: u32,
    pub demodulation_mode: u8,
    pub self_calibration: u8,
}

impl ConfigRegister {
    /// Build a register that only sets the sampling interval, all other fields
    /// zeroed. This is the shape the settings screen writes.
    pub fn with_sampling_interval(interval: u32) -> Self {
        Self {
            sampling_interval: interval,
            ..Default::default()
        }
    }
}

fn read_f32(bytes: &[u8], offset: usize) -> Result<f32, DecodeError> {
    let b = field(bytes, offset, 4)?;
    Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32, DecodeError> {
    let b = field(bytes, offset, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn read_u8(bytes: &[u8], offset: usize) -> Result<u8, DecodeError> {
    Ok(field(bytes, offset, 1)?[0])
}

fn field(bytes: &[u8], offset: usize, len: usize) -> Result<&[u8], DecodeError> {
    bytes.get(offset..offset + len).ok_or(DecodeError::Truncated {
        expected: offset + len,
        actual: bytes.len(),
    })
}

/// Decode a [`SamplePoint`] from a notification payload
///
/// Requires at least [`SAMPLE_WIRE_LEN`] bytes; trailing bytes are ignored.
pub fn decode_sample(bytes: &[u8]) -> Result<SamplePoint, DecodeError> {
    Ok(SamplePoint {
        gas_concentration: read_f32(bytes, 0)?,
        timestamp: read_u32(bytes, 4)?,
        gps_latitude: read_u32(bytes, 8)?,
        gps_longitude: read_u32(bytes, 12)?,
        gps_altitude: read_u32(bytes, 16)?,
        system_stable: read_u8(bytes, 20)?,
        fault: read_u8(bytes, 21)?,
    })
}

/// Decode a [`ConfigRegister`] from a read payload
///
/// Requires at least [`CONFIG_WIRE_LEN`] bytes; trailing bytes are ignored.
pub fn decode_config(bytes: &[u8]) -> Result<ConfigRegister, DecodeError> {
    Ok(ConfigRegister {
        wavelength: read_f32(bytes, 0)?,
        modulation_frequency: read_f32(bytes, 4)?,
        demodulation_frequency: read_f32(bytes, 8)?,
        sampling_interval: read_u32(bytes, 12)?,
        demodulation_mode: read_u8(bytes, 16)?,
        self_calibration: read_u8(bytes, 17)?,
    })
}

/// Encode a [`SamplePoint`] into its 22-byte wire image
///
/// Real peripherals only emit this record; the encoder exists for the mock
/// transport and for building test payloads.
pub fn encode_sample(sample: &SamplePoint) -> [u8; SAMPLE_WIRE_LEN] {
    let mut out = [0u8; SAMPLE_WIRE_LEN];
    out[0..4].copy_from_slice(&sample.gas_concentration.to_le_bytes());
    out[4..8].copy_from_slice(&sample.timestamp.to_le_bytes());
    out[8..12].copy_from_slice(&sample.gps_latitude.to_le_bytes());
    out[12..16].copy_from_slice(&sample.gps_longitude.to_le_bytes());
    out[16..20].copy_from_slice(&sample.gps_altitude.to_le_bytes());
    out[20] = sample.system_stable;
    out[21] = sample.fault;
    out
}

/// Encode a [`ConfigRegister`] into its 18-byte wire image
pub fn encode_config(config: &ConfigRegister) -> [u8; CONFIG_WIRE_LEN] {
    let mut out = [0u8; CONFIG_WIRE_LEN];
    out[0..4].copy_from_slice(&config.wavelength.to_le_bytes());
    out[4..8].copy_from_slice(&config.modulation_frequency.to_le_bytes());
    out[8..12].copy_from_slice(&config.demodulation_frequency.to_le_bytes());
    out[12..16].copy_from_slice(&config.sampling_interval.to_le_bytes());
    out[16] = config.demodulation_mode;
    out[17] = config.self_calibration;
    out
}

/// Render a payload as space-separated hex bytes for log output
pub fn hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
