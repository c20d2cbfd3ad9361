/// Errors raised while building, validating or decoding Ubetter BMS frames.
///
/// Inside the streaming parser these only describe why a frame was dropped; the
/// driver resynchronizes and carries on. `Io` is the only variant that leaves a
/// scheduler step.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid start byte {0:#04X}")]
    StartByte(u8),
    #[error("Invalid stop byte {0:#04X}")]
    StopByte(u8),
    #[error("Unexpected command code - expected={expected:#04X} received={received:#04X}")]
    CommandMismatch { expected: u8, received: u8 },
    #[error("Unknown command code {0:#04X}")]
    UnknownCommand(u8),
    #[error("BMS reported status {0:#04X}")]
    Status(u8),
    #[error("Payload length {0} exceeds the 120 byte frame limit")]
    PayloadLength(usize),
    #[error("Invalid checksum - calculated={calculated:#06X} received={received:#06X}")]
    Checksum { calculated: u16, received: u16 },
    #[error("Invalid reply size - required={required} received={received}")]
    ReplySize { required: usize, received: usize },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "serialport")]
    #[error("Serial port error: {0}")]
    Serial(#[from] ::serialport::Error),
}
