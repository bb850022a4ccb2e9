// Handset control frame: fixed 20-byte, big-endian, CRC-32 protected
//
// Layout: [ctrl, model, reserved, reserved, x:f32, y:f32, z:f32, crc32:u32]
// ctrl == 0xFF means drive, anything else means stop.

use crc_any::CRCu32;

use crate::config::FRAME_LEN;

/// Control byte value that enables driving
pub const DRIVE_SENTINEL: u8 = 0xFF;

const OFFSET_CTRL: usize = 0;
const OFFSET_MODEL: usize = 1;
const OFFSET_X: usize = 4;
const OFFSET_Y: usize = 8;
const OFFSET_Z: usize = 12;
const OFFSET_CRC: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("Checksum mismatch: frame carries 0x{expected:08X}, computed 0x{actual:08X}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("Invalid frame length: expected 20 bytes, got {0}")]
    Length(usize),
}

/// Decoded control frame; raw accelerometer axes, not normalized
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlSample {
    pub drive: bool,
    pub model_code: u8,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// CRC-32 (IEEE) over the payload part of a frame
fn checksum(payload: &[u8]) -> u32 {
    let mut crc = CRCu32::crc32();
    crc.digest(payload);
    crc.get_crc()
}

fn read_u32(buffer: &[u8; FRAME_LEN], offset: usize) -> u32 {
    u32::from_be_bytes([
        buffer[offset],
        buffer[offset + 1],
        buffer[offset + 2],
        buffer[offset + 3],
    ])
}

fn read_f32(buffer: &[u8; FRAME_LEN], offset: usize) -> f32 {
    f32::from_bits(read_u32(buffer, offset))
}

/// Validate and parse one frame. The model byte is passed through unchecked.
pub fn decode(buffer: &[u8; FRAME_LEN]) -> Result<ControlSample, FrameError> {
    let expected = read_u32(buffer, OFFSET_CRC);
    let actual = checksum(&buffer[..OFFSET_CRC]);
    if expected != actual {
        return Err(FrameError::ChecksumMismatch { expected, actual });
    }

    Ok(ControlSample {
        drive: buffer[OFFSET_CTRL] == DRIVE_SENTINEL,
        model_code: buffer[OFFSET_MODEL],
        x: read_f32(buffer, OFFSET_X),
        y: read_f32(buffer, OFFSET_Y),
        z: read_f32(buffer, OFFSET_Z),
    })
}

/// Build a wire frame the way the handset does (stop is sent as 0x00)
pub fn encode(sample: &ControlSample) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    frame[OFFSET_CTRL] = if sample.drive { DRIVE_SENTINEL } else { 0x00 };
    frame[OFFSET_MODEL] = sample.model_code;
    frame[OFFSET_X..OFFSET_Y].copy_from_slice(&sample.x.to_be_bytes());
    frame[OFFSET_Y..OFFSET_Z].copy_from_slice(&sample.y.to_be_bytes());
    frame[OFFSET_Z..OFFSET_CRC].copy_from_slice(&sample.z.to_be_bytes());

    let crc = checksum(&frame[..OFFSET_CRC]);
    frame[OFFSET_CRC..].copy_from_slice(&crc.to_be_bytes());
    frame
}

impl TryFrom<&[u8]> for ControlSample {
    type Error = FrameError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let buffer: &[u8; FRAME_LEN] = bytes
            .try_into()
            .map_err(|_| FrameError::Length(bytes.len()))?;
        decode(buffer)
    }
}
