//! Synchronous transport over the `serialport` crate.
//!
//! # Example
//!
//! ```no_run
//! use ubetterbms_lib::serialport::SerialTransport;
//! use ubetterbms_lib::UbetterBms;
//!
//! # fn main() -> Result<(), ubetterbms_lib::Error> {
//! let mut bms = UbetterBms::new(SerialTransport::open("/dev/ttyUSB0", 9600)?);
//! bms.initialize()?;
//! for _ in 0..6 {
//!     bms.scheduler_step()?;
//!     std::thread::sleep(std::time::Duration::from_millis(100));
//! }
//! println!("{:?}", bms.snapshot());
//! # Ok(())
//! # }
//! ```

use crate::transport::Transport;
use crate::Error;
use std::io::{self, Read, Write};
use std::time::Duration;

pub const DEFAULT_BAUD_RATE: u32 = 9600;

pub struct SerialTransport {
    serial: Box<dyn ::serialport::SerialPort>,
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("port", &self.serial.name())
            .finish()
    }
}

impl SerialTransport {
    pub fn open(port: &str, baud_rate: u32) -> std::result::Result<Self, Error> {
        let serial = ::serialport::new(port, baud_rate)
            .data_bits(::serialport::DataBits::Eight)
            .parity(::serialport::Parity::None)
            .stop_bits(::serialport::StopBits::One)
            .flow_control(::serialport::FlowControl::None)
            // reads are only issued for bytes already pending
            .timeout(Duration::from_millis(10))
            .open()?;
        log::debug!("Opened {port} at {baud_rate} baud");
        Ok(Self { serial })
    }

    /// Number of received bytes waiting in the driver buffer.
    pub fn bytes_to_read(&self) -> io::Result<usize> {
        Ok(self.serial.bytes_to_read().map_err(io::Error::from)? as usize)
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, tx_buffer: &[u8]) -> io::Result<()> {
        log::trace!("write bytes: {tx_buffer:02X?}");
        self.serial.write_all(tx_buffer)
    }

    fn read(&mut self, rx_buffer: &mut [u8]) -> io::Result<usize> {
        let pending = self.bytes_to_read()?;
        if pending == 0 {
            return Ok(0);
        }
        let size = pending.min(rx_buffer.len());
        let received = self.serial.read(&mut rx_buffer[..size])?;
        log::trace!("receive_bytes: {:02X?}", &rx_buffer[..received]);
        Ok(received)
    }
}
