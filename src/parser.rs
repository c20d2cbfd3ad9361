//! Incremental response parser.
//!
//! The parser consumes whatever the transport returned, byte by byte, and keeps
//! both its state and the partially assembled frame between calls, so a frame may
//! arrive spread over any number of reads. Any malformed byte drops the frame in
//! progress and the parser goes back to scanning for a start byte.

use crate::protocol::*;
use crate::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ParserState {
    #[default]
    AwaitStart,
    AwaitCommand,
    AwaitStatus,
    AwaitLength,
    AwaitPayload,
    AwaitChecksum,
    AwaitStop,
}

/// Frame under assembly.
#[derive(Debug, Clone)]
struct PartialFrame {
    /// Command the frame was started for.
    expected: u8,
    status: u8,
    length: u8,
    payload: [u8; MAX_PAYLOAD_LENGTH],
    filled: usize,
    checksum_hi: Option<u8>,
    checksum: u16,
}

impl PartialFrame {
    fn new(expected: u8) -> Self {
        Self {
            expected,
            status: STATUS_OK,
            length: 0,
            payload: [0; MAX_PAYLOAD_LENGTH],
            filled: 0,
            checksum_hi: None,
            checksum: 0,
        }
    }

    fn payload(&self) -> &[u8] {
        &self.payload[..self.filled]
    }

    fn to_frame(&self) -> ResponseFrame {
        ResponseFrame {
            command: self.expected,
            status: self.status,
            payload: self.payload().to_vec(),
            checksum: self.checksum,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FrameParser {
    state: ParserState,
    frame: PartialFrame,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    pub fn new() -> Self {
        Self {
            state: ParserState::AwaitStart,
            frame: PartialFrame::new(0),
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Drops any frame in progress.
    pub fn reset(&mut self) {
        self.state = ParserState::AwaitStart;
    }

    /// Feeds `buffer` to the parser and returns every frame for `expected` that
    /// completed and validated within it.
    ///
    /// A frame started under another expected command is discarded first.
    pub fn feed(&mut self, expected: u8, buffer: &[u8]) -> Vec<ResponseFrame> {
        if self.state != ParserState::AwaitStart && self.frame.expected != expected {
            log::debug!(
                "Discarding partial frame for {:#04X}, now awaiting {:#04X}",
                self.frame.expected,
                expected
            );
            self.reset();
        }

        let mut frames = Vec::new();
        for byte in buffer {
            match self.push_byte(expected, *byte) {
                Ok(Some(frame)) => frames.push(frame),
                Ok(None) => {}
                Err(err) => {
                    match err {
                        Error::CommandMismatch { .. } | Error::Status(_) => {
                            log::debug!("Frame dropped: {err}")
                        }
                        _ => log::warn!("Frame dropped: {err}"),
                    }
                    self.reset();
                }
            }
        }
        frames
    }

    /// Advances the state machine by one byte.
    ///
    /// `Ok(Some(_))` carries a completed frame, `Err(_)` means the frame in
    /// progress must be discarded.
    fn push_byte(
        &mut self,
        expected: u8,
        byte: u8,
    ) -> std::result::Result<Option<ResponseFrame>, Error> {
        log::trace!("{:?} <- {:#04X}", self.state, byte);
        match self.state {
            ParserState::AwaitStart => {
                if byte == START_BYTE {
                    self.frame = PartialFrame::new(expected);
                    self.state = ParserState::AwaitCommand;
                }
                Ok(None)
            }
            ParserState::AwaitCommand => {
                if byte != expected {
                    return Err(Error::CommandMismatch {
                        expected,
                        received: byte,
                    });
                }
                self.state = ParserState::AwaitStatus;
                Ok(None)
            }
            ParserState::AwaitStatus => {
                if byte != STATUS_OK {
                    // STATUS_ERROR and anything unknown alike
                    return Err(Error::Status(byte));
                }
                self.frame.status = byte;
                self.state = ParserState::AwaitLength;
                Ok(None)
            }
            ParserState::AwaitLength => {
                validate_payload_len(usize::from(byte))?;
                self.frame.length = byte;
                self.state = if byte == 0 {
                    ParserState::AwaitChecksum
                } else {
                    ParserState::AwaitPayload
                };
                Ok(None)
            }
            ParserState::AwaitPayload => {
                let frame = &mut self.frame;
                frame.payload[frame.filled] = byte;
                frame.filled += 1;
                if frame.filled == usize::from(frame.length) {
                    self.state = ParserState::AwaitChecksum;
                }
                Ok(None)
            }
            ParserState::AwaitChecksum => {
                let frame = &mut self.frame;
                match frame.checksum_hi {
                    None => frame.checksum_hi = Some(byte),
                    Some(hi) => {
                        frame.checksum = u16::from_be_bytes([hi, byte]);
                        verify_checksum(
                            frame.status,
                            frame.length,
                            frame.payload(),
                            frame.checksum,
                        )?;
                        self.state = ParserState::AwaitStop;
                    }
                }
                Ok(None)
            }
            ParserState::AwaitStop => {
                self.state = ParserState::AwaitStart;
                if byte != STOP_BYTE {
                    return Err(Error::StopByte(byte));
                }
                Ok(Some(self.frame.to_frame()))
            }
        }
    }
}
