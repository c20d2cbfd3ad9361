#![cfg_attr(docsrs, feature(doc_cfg))]
//! # ubetterbms_lib
//!
//! This crate implements the master side of the Ubetter BMS UART protocol. A driver
//! polls the pack for its basic information, cell voltages and hardware version
//! in a fixed cycle and merges every validated reply into a [`Snapshot`].
//!
//! The protocol core ([`Session`]) performs no I/O. [`UbetterBms`] drives it over
//! any [`Transport`]; an asynchronous driver is available for Tokio applications.
//!
//! ## Features
//!
//! - `default`: Enables `bin-dependencies`, which is intended for compiling the `ubetterbms` command-line tool and pulls in `serialport` and `serde`.
//!
//! ### Transport Features
//! - `serialport`: Enables the **synchronous** serial transport using the `serialport` crate.
//! - `tokio-serial-async`: Enables the **asynchronous** driver using `tokio` and `tokio-serial`.
//!
//! ### Utility Features
//! - `serde`: Enables `serde` support for serializing/deserializing data structures.
//! - `bin-dependencies`: Enables all features required by the `ubetterbms` binary executable (currently `serialport` and `serde`).

/// Contains error types for the library.
mod error;
/// Wire format: constants, checksum, request and response frames.
pub mod protocol;
/// Streaming response parser.
pub mod parser;
/// Raw payload decoders.
pub mod records;
/// Engineering-unit view of the pack.
pub mod snapshot;
/// The six-step polling cycle.
pub mod scheduler;
/// Byte channel abstraction used by the synchronous driver.
pub mod transport;
mod driver;

pub use driver::{Session, UbetterBms, READ_BUFFER_LENGTH};
pub use error::Error;
pub use snapshot::Snapshot;
pub use transport::Transport;

/// Synchronous serial transport for Ubetter BMS communication.
#[cfg_attr(docsrs, doc(cfg(feature = "serialport")))]
#[cfg(feature = "serialport")]
pub mod serialport;

/// Asynchronous client for Ubetter BMS communication.
#[cfg_attr(docsrs, doc(cfg(feature = "tokio-serial-async")))]
#[cfg(feature = "tokio-serial-async")]
pub mod tokio_serial_async;
