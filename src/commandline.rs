use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::time::Duration;
use ubetterbms_lib::protocol::Command;

fn default_device_name() -> String {
    if cfg!(target_os = "windows") {
        String::from("COM1")
    } else {
        String::from("/dev/ttyUSB0")
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum CliCommands {
    /// Run a number of full polling cycles and print the resulting snapshot
    Snapshot {
        /// Number of complete info/version/cell cycles to run
        #[clap(long, short, default_value = "2")]
        cycles: u32,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Debug)]
        format: OutputFormat,
    },
    /// Run in daemon mode, polling forever and printing the snapshot after every cycle
    Daemon {
        /// Pause between two polling cycles (e.g., "10s", "1m")
        #[clap(long, short, value_parser = humantime::parse_duration, default_value = "10s")]
        interval: Duration,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Debug)]
        format: OutputFormat,
    },
    /// Send a single request frame and dump the validated reply
    Request {
        /// Which register block to request
        #[arg(value_enum)]
        command: RequestCommand,
        /// Use the write direction marker instead of read
        #[clap(long, short, action)]
        write: bool,
    },
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Debug,
    Json,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq)]
pub enum RequestCommand {
    Info,
    Cells,
    Version,
}

impl From<RequestCommand> for Command {
    fn from(command: RequestCommand) -> Self {
        match command {
            RequestCommand::Info => Command::Info,
            RequestCommand::Cells => Command::Cell,
            RequestCommand::Version => Command::Version,
        }
    }
}

const fn about_text() -> &'static str {
    "ubetter bms command line tool"
}

#[derive(Parser, Debug)]
#[command(version, about=about_text(), long_about = None)]
pub struct CliArgs {
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    /// Serial port device path (e.g., /dev/ttyUSB0 on Linux, COM1 on Windows)
    #[arg(short, long, default_value_t = default_device_name())]
    pub device: String,

    /// Serial baud rate
    #[arg(long, default_value_t = ubetterbms_lib::serialport::DEFAULT_BAUD_RATE)]
    pub baud_rate: u32,

    #[command(subcommand)]
    pub command: CliCommands,

    /// How long to wait for a reply to a single request (e.g., "500ms", "1s")
    #[arg(value_parser = humantime::parse_duration, long, default_value = "1s")]
    pub read_timeout: Duration,

    // The BMS needs a moment to answer, so a reply is picked up one step after its request
    /// Delay between two scheduler steps (e.g., "50ms", "100ms")
    #[arg(value_parser = humantime::parse_duration, long, default_value = "100ms")]
    pub delay: Duration,
}
