//! Wire format of the Ubetter BMS UART protocol.
//!
//! ```text
//! Request  [0xDD][0xA5 read | 0x5A write][command][0x00][checksum hi][checksum lo][0x77]
//! Response [0xDD][command][0x00 ok | 0x80 error][length][payload * length][checksum hi][checksum lo][0x77]
//! ```
//!
//! The checksum is the 16 bit sum of the byte at offset 2, the length byte and the
//! payload, negated in two's complement and sent high byte first.

use crate::Error;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub const START_BYTE: u8 = 0xdd;
pub const STOP_BYTE: u8 = 0x77;

pub const STATUS_OK: u8 = 0x00;
pub const STATUS_ERROR: u8 = 0x80;

/// Largest payload a response frame may carry.
pub const MAX_PAYLOAD_LENGTH: usize = 120;

pub const REQUEST_LENGTH: usize = 7;
/// Start, command, status, length, two checksum bytes and stop.
pub const RESPONSE_OVERHEAD: usize = 7;

/// Second byte of a request frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum Direction {
    Read = 0xa5,
    Write = 0x5a,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum Command {
    /// Pack status: voltage, current, capacities, protection and temperatures.
    Info = 0x03,
    /// Individual cell voltages.
    Cell = 0x04,
    /// Firmware version string.
    Version = 0x05,
}

impl Command {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Command {
    type Error = Error;

    fn try_from(code: u8) -> std::result::Result<Self, Error> {
        match code {
            0x03 => Ok(Command::Info),
            0x04 => Ok(Command::Cell),
            0x05 => Ok(Command::Version),
            _ => Err(Error::UnknownCommand(code)),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Command::Info => write!(f, "info"),
            Command::Cell => write!(f, "cell voltages"),
            Command::Version => write!(f, "version"),
        }
    }
}

/// Computes the frame checksum over `status_or_command`, `length` and `payload`.
///
/// Requests feed their command byte, responses their status byte.
pub fn checksum(status_or_command: u8, length: u8, payload: &[u8]) -> u16 {
    let sum = payload
        .iter()
        .fold(u16::from(status_or_command).wrapping_add(u16::from(length)), |acc, b| {
            acc.wrapping_add(u16::from(*b))
        });
    (!sum).wrapping_add(1)
}

/// Compares the checksum received on the wire against the one computed locally.
pub fn verify_checksum(
    status_or_command: u8,
    length: u8,
    payload: &[u8],
    received: u16,
) -> std::result::Result<(), Error> {
    let calculated = checksum(status_or_command, length, payload);
    if calculated != received {
        return Err(Error::Checksum {
            calculated,
            received,
        });
    }
    Ok(())
}

/// A request frame. Requests never carry a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestFrame {
    pub direction: Direction,
    pub command: Command,
}

impl RequestFrame {
    pub fn new(direction: Direction, command: Command) -> Self {
        Self { direction, command }
    }

    pub fn read(command: Command) -> Self {
        Self::new(Direction::Read, command)
    }

    pub fn checksum(&self) -> u16 {
        checksum(self.command.code(), 0, &[])
    }

    pub fn to_bytes(&self) -> [u8; REQUEST_LENGTH] {
        let mut tx_buffer = [0; REQUEST_LENGTH];
        tx_buffer[0] = START_BYTE;
        tx_buffer[1] = self.direction as u8;
        tx_buffer[2] = self.command.code();
        tx_buffer[3] = 0x00;
        calc_crc_and_set(&mut tx_buffer);
        tx_buffer[6] = STOP_BYTE;
        tx_buffer
    }
}

fn calc_crc_and_set(buffer: &mut [u8; REQUEST_LENGTH]) {
    let [hi, lo] = checksum(buffer[2], buffer[3], &[]).to_be_bytes();
    buffer[4] = hi;
    buffer[5] = lo;
}

/// A validated response frame.
///
/// The payload is only set through [`ResponseFrame::new`], [`ResponseFrame::from_bytes`]
/// and the stream parser, which all bound it to [`MAX_PAYLOAD_LENGTH`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ResponseFrame {
    pub command: u8,
    pub status: u8,
    pub(crate) payload: Vec<u8>,
    pub checksum: u16,
}

impl ResponseFrame {
    /// Builds an `ok` response carrying `payload`, with a matching checksum.
    pub fn new(command: u8, payload: &[u8]) -> std::result::Result<Self, Error> {
        let length = validate_payload_len(payload.len())?;
        Ok(Self {
            command,
            status: STATUS_OK,
            payload: payload.to_vec(),
            checksum: checksum(STATUS_OK, length, payload),
        })
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn length(&self) -> u8 {
        // payload is bounded by MAX_PAYLOAD_LENGTH
        self.payload.len() as u8
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(self.payload.len() + RESPONSE_OVERHEAD);
        buffer.extend_from_slice(&[START_BYTE, self.command, self.status, self.length()]);
        buffer.extend_from_slice(&self.payload);
        buffer.extend_from_slice(&self.checksum.to_be_bytes());
        buffer.push(STOP_BYTE);
        buffer
    }

    /// Validates one complete response frame held in `rx_buffer`.
    ///
    /// Unlike [`crate::parser::FrameParser`] this does not scan for a start byte;
    /// the frame must begin at offset 0. Trailing bytes after the stop byte are ignored.
    pub fn from_bytes(rx_buffer: &[u8]) -> std::result::Result<Self, Error> {
        validate_len(rx_buffer, RESPONSE_OVERHEAD)?;
        if rx_buffer[0] != START_BYTE {
            return Err(Error::StartByte(rx_buffer[0]));
        }
        let command = rx_buffer[1];
        let status = rx_buffer[2];
        if status != STATUS_OK {
            return Err(Error::Status(status));
        }
        let length = rx_buffer[3];
        let payload_len = usize::from(length);
        validate_payload_len(payload_len)?;
        validate_len(rx_buffer, payload_len + RESPONSE_OVERHEAD)?;

        let payload = &rx_buffer[4..4 + payload_len];
        let received =
            u16::from_be_bytes([rx_buffer[4 + payload_len], rx_buffer[5 + payload_len]]);
        if let Err(err) = verify_checksum(status, length, payload, received) {
            log::warn!("{err} buffer={rx_buffer:02X?}");
            return Err(err);
        }
        let stop = rx_buffer[6 + payload_len];
        if stop != STOP_BYTE {
            return Err(Error::StopByte(stop));
        }
        Ok(Self {
            command,
            status,
            payload: payload.to_vec(),
            checksum: received,
        })
    }
}

pub(crate) fn validate_payload_len(len: usize) -> std::result::Result<u8, Error> {
    if len > MAX_PAYLOAD_LENGTH {
        return Err(Error::PayloadLength(len));
    }
    Ok(len as u8)
}

fn validate_len(buffer: &[u8], reply_size: usize) -> std::result::Result<(), Error> {
    if buffer.len() < reply_size {
        log::warn!(
            "Invalid buffer size - required={} received={}",
            reply_size,
            buffer.len()
        );
        return Err(Error::ReplySize {
            required: reply_size,
            received: buffer.len(),
        });
    }
    Ok(())
}
