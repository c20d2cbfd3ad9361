//! Provides an asynchronous Ubetter BMS driver for applications built on the Tokio
//! runtime, using the `tokio-serial` crate for serial communication.
//!
//! The driver runs the same polling cycle as [`crate::UbetterBms`]. Reads are
//! bounded by a short timeout, after which the step completes with whatever was
//! received, so a step never waits for a reply to arrive.
//!
//! # Example
//!
//! ```no_run
//! use ubetterbms_lib::tokio_serial_async::{UbetterBms, Error};
//! use std::time::Duration;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Error> {
//!     let mut bms = UbetterBms::open("/dev/ttyUSB0", 9600)?;
//!     loop {
//!         bms.scheduler_step().await?;
//!         println!("{:?}", bms.snapshot());
//!         tokio::time::sleep(Duration::from_millis(100)).await;
//!     }
//! }
//! ```

use crate::driver::{Session, READ_BUFFER_LENGTH};
use crate::parser::ParserState;
use crate::scheduler::{Action, SchedulerState};
use crate::snapshot::Snapshot;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Errors specific to the asynchronous Tokio driver.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An error originating from the Ubetter BMS protocol library.
    #[error("Ubetter error: {0}")]
    UbetterError(#[from] crate::Error),
    /// An I/O error, typically from the serial port communication.
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
    /// An error from the `tokio-serial` crate.
    #[error("Tokio serial error: {0}")]
    TokioSerial(#[from] tokio_serial::Error),
    /// A write did not complete within the I/O timeout.
    #[error("Tokio timeout elapsed: {0}")]
    TokioElapsed(#[from] tokio::time::error::Elapsed),
}

/// Upper bound on reads per response step, so a chattering line cannot stall a step.
const MAX_READS_PER_STEP: usize = 8;

/// A specialized `Result` type for operations within the `tokio_serial_async` module.
type Result<T> = std::result::Result<T, Error>;

/// Asynchronous Ubetter BMS driver over any Tokio byte stream.
#[derive(Debug)]
pub struct UbetterBms<S> {
    serial: S,
    session: Session,
    io_timeout: Duration, // Timeout for writes
    read_window: Duration, // How long a response step listens for pending bytes
    read_chunk: usize,
}

impl UbetterBms<tokio_serial::SerialStream> {
    /// Opens `port` with 8N1 framing at `baud_rate`.
    pub fn open(port: &str, baud_rate: u32) -> Result<Self> {
        use tokio_serial::SerialPortBuilderExt;

        let serial = tokio_serial::new(port, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()?;
        Ok(Self::new(serial))
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> UbetterBms<S> {
    pub fn new(serial: S) -> Self {
        Self {
            serial,
            session: Session::new(),
            io_timeout: Duration::from_secs(1),
            read_window: Duration::from_millis(10),
            read_chunk: READ_BUFFER_LENGTH,
        }
    }

    /// Reserved for device setup; the protocol currently needs none.
    pub async fn initialize(&mut self) -> Result<()> {
        log::debug!("initialize");
        Ok(())
    }

    /// Sets the timeout for writing a request.
    pub fn set_timeout(&mut self, timeout: Duration) {
        log::trace!("set timeout to {timeout:?}");
        self.io_timeout = timeout;
    }

    /// Sets how long a response step waits for each chunk of pending bytes.
    pub fn set_read_window(&mut self, window: Duration) {
        log::trace!("set read window to {window:?}");
        self.read_window = window;
    }

    pub fn set_read_chunk(&mut self, size: usize) {
        self.read_chunk = size.max(1);
    }

    /// Runs one step of the polling cycle. See [`crate::UbetterBms::scheduler_step`].
    pub async fn scheduler_step(&mut self) -> Result<()> {
        match self.session.next_action() {
            Action::Send(request) => {
                let tx_buffer = request.to_bytes();
                log::trace!("write bytes: {tx_buffer:02X?}");
                tokio::time::timeout(self.io_timeout, self.serial.write_all(&tx_buffer)).await??;
            }
            Action::Receive(command) => {
                let mut rx_buffer = vec![0; self.read_chunk];
                for _ in 0..MAX_READS_PER_STEP {
                    let received = match tokio::time::timeout(
                        self.read_window,
                        self.serial.read(&mut rx_buffer),
                    )
                    .await
                    {
                        Ok(received) => received?,
                        // nothing pending
                        Err(_) => 0,
                    };
                    if received == 0 {
                        break;
                    }
                    log::trace!("receive_bytes: {:02X?}", &rx_buffer[..received]);
                    self.session.receive(command, &rx_buffer[..received]);
                    if received < rx_buffer.len() {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Copy of the current snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.session.snapshot().clone()
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.session.scheduler_state()
    }

    pub fn parser_state(&self) -> ParserState {
        self.session.parser_state()
    }

    pub fn into_inner(self) -> S {
        self.serial
    }
}
