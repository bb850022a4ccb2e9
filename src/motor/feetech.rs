// Feetech STS serial bus, the subset needed to run wheels in velocity mode
//
// Packet: [0xFF, 0xFF, id, len, instruction, params..., checksum]
// with len = params + 2 and checksum = !(id + len + instruction + params).

use serialport::SerialPort;
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;
use tracing::{debug, trace};

pub const DEFAULT_BAUDRATE: u32 = 1_000_000;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

const HEADER: [u8; 2] = [0xFF, 0xFF];
const BROADCAST_ID: u8 = 0xFE;

#[repr(u8)]
#[derive(Debug, Clone, Copy)]
enum Instruction {
    Ping = 0x01,
    Write = 0x03,
    SyncWrite = 0x83,
}

/// RAM registers used for wheel control
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Register {
    OperatingMode = 33, // 0=position, 1=velocity
    TorqueEnable = 40,
    GoalVelocity = 46, // sign-magnitude i16
    Lock = 55,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperatingMode {
    Position = 0,
    Velocity = 1,
}

#[derive(Debug, thiserror::Error)]
pub enum FeetechError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid response from motor {id}: {reason}")]
    InvalidResponse { id: u8, reason: String },

    #[error("Checksum mismatch for motor {id}")]
    ChecksumMismatch { id: u8 },

    #[error("Motor {id} returned error status: 0x{status:02X}")]
    MotorError { id: u8, status: u8 },

    #[error("Timeout waiting for response from motor {id}")]
    Timeout { id: u8 },
}

pub type Result<T> = std::result::Result<T, FeetechError>;

pub struct FeetechBus {
    port: Box<dyn SerialPort>,
}

impl FeetechBus {
    pub fn open(port_name: &str) -> Result<Self> {
        let port = serialport::new(port_name, DEFAULT_BAUDRATE)
            .timeout(DEFAULT_TIMEOUT)
            .open()?;
        Ok(Self { port })
    }

    fn checksum(data: &[u8]) -> u8 {
        !data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
    }

    fn packet(id: u8, instruction: Instruction, params: &[u8]) -> Vec<u8> {
        let mut packet = Vec::with_capacity(6 + params.len());
        packet.extend_from_slice(&HEADER);
        packet.push(id);
        packet.push((params.len() + 2) as u8);
        packet.push(instruction as u8);
        packet.extend_from_slice(params);
        packet.push(Self::checksum(&packet[HEADER.len()..]));
        packet
    }

    fn send(&mut self, packet: &[u8]) -> Result<()> {
        trace!("tx {:02X?}", packet);
        self.port.write_all(packet)?;
        self.port.flush()?;
        Ok(())
    }

    /// Read one status packet and return its parameters
    fn status(&mut self, id: u8) -> Result<Vec<u8>> {
        let mut head = [0u8; 4];
        self.port.read_exact(&mut head).map_err(|e| match e.kind() {
            ErrorKind::TimedOut => FeetechError::Timeout { id },
            _ => FeetechError::Io(e),
        })?;

        if head[..2] != HEADER {
            return Err(FeetechError::InvalidResponse {
                id,
                reason: format!("Invalid header: {:02X?}", &head[..2]),
            });
        }
        if head[2] != id {
            return Err(FeetechError::InvalidResponse {
                id,
                reason: format!("ID mismatch: got {}", head[2]),
            });
        }

        let len = head[3] as usize;
        if len < 2 {
            return Err(FeetechError::InvalidResponse {
                id,
                reason: format!("Length {} too short", len),
            });
        }
        // error byte + params + checksum
        let mut body = vec![0u8; len];
        self.port.read_exact(&mut body)?;

        let (payload, received) = body.split_at(len - 1);
        let mut summed = vec![head[2], head[3]];
        summed.extend_from_slice(payload);
        if Self::checksum(&summed) != received[0] {
            return Err(FeetechError::ChecksumMismatch { id });
        }
        if payload[0] != 0 {
            return Err(FeetechError::MotorError {
                id,
                status: payload[0],
            });
        }
        Ok(payload[1..].to_vec())
    }

    pub fn ping(&mut self, id: u8) -> Result<bool> {
        self.send(&Self::packet(id, Instruction::Ping, &[]))?;
        match self.status(id) {
            Ok(_) => Ok(true),
            Err(FeetechError::Timeout { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn write_u8(&mut self, id: u8, register: Register, value: u8) -> Result<()> {
        debug!("motor {}: {:?} <- {}", id, register, value);
        self.send(&Self::packet(id, Instruction::Write, &[register as u8, value]))?;
        self.status(id).map(|_| ())
    }

    /// Write signed 16-bit values to the same register of several motors;
    /// broadcast, so there is no status reply
    pub fn sync_write_i16(&mut self, register: Register, data: &[(u8, i16)]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let mut params = Vec::with_capacity(2 + 3 * data.len());
        params.push(register as u8);
        params.push(2);
        for &(id, value) in data {
            params.push(id);
            params.extend_from_slice(&encode_sign_magnitude(value).to_le_bytes());
        }
        self.send(&Self::packet(BROADCAST_ID, Instruction::SyncWrite, &params))
    }

    pub fn set_torque(&mut self, id: u8, enabled: bool) -> Result<()> {
        self.write_u8(id, Register::TorqueEnable, enabled as u8)?;
        self.write_u8(id, Register::Lock, enabled as u8)
    }

    /// Torque must be off while switching modes
    pub fn set_operating_mode(&mut self, id: u8, mode: OperatingMode) -> Result<()> {
        self.write_u8(id, Register::OperatingMode, mode as u8)
    }
}

/// Bit 15 = direction (1 = negative), bits 0-14 = magnitude
fn encode_sign_magnitude(value: i16) -> u16 {
    let magnitude = value.unsigned_abs().min(0x7FFF);
    if value < 0 { 0x8000 | magnitude } else { magnitude }
}
