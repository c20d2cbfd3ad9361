use anyhow::{bail, Context, Result};
use clap::Parser;
use flexi_logger::{Logger, LoggerHandle};
use log::*;
use std::{
    ops::Deref,
    panic,
    time::{Duration, Instant},
};
use ubetterbms_lib::parser::FrameParser;
use ubetterbms_lib::protocol::{Command, Direction, RequestFrame};
use ubetterbms_lib::records::{CellVoltageRecord, PackInfoRecord, VersionRecord};
use ubetterbms_lib::serialport::SerialTransport;
use ubetterbms_lib::{Transport, UbetterBms};

mod commandline;
mod daemon;

use commandline::{CliArgs, CliCommands};

fn logging_init(loglevel: LevelFilter) -> LoggerHandle {
    let log_handle = Logger::try_with_env_or_str(loglevel.as_str())
        .expect("Cannot init logging")
        .start()
        .expect("Cannot start logging");

    panic::set_hook(Box::new(|panic_info| {
        let (filename, line, column) = panic_info
            .location()
            .map(|loc| (loc.file(), loc.line(), loc.column()))
            .unwrap_or(("<unknown>", 0, 0));
        let cause = panic_info
            .payload()
            .downcast_ref::<String>()
            .map(String::deref);
        let cause = cause.unwrap_or_else(|| {
            panic_info
                .payload()
                .downcast_ref::<&str>()
                .copied()
                .unwrap_or("<cause unknown>")
        });

        error!(
            "Thread '{}' panicked at {}:{}:{}: {}",
            std::thread::current().name().unwrap_or("<unknown>"),
            filename,
            line,
            column,
            cause
        );
    }));
    log_handle
}

/// Sends one request and polls until a validated reply arrives or `timeout` expires.
fn request(
    transport: &mut SerialTransport,
    command: Command,
    direction: Direction,
    timeout: Duration,
) -> Result<()> {
    let request = RequestFrame::new(direction, command);
    transport
        .write(&request.to_bytes())
        .with_context(|| format!("Cannot send {command} request"))?;

    let mut parser = FrameParser::new();
    let mut rx_buffer = [0; ubetterbms_lib::READ_BUFFER_LENGTH];
    let started = Instant::now();
    while started.elapsed() < timeout {
        let received = transport
            .read(&mut rx_buffer)
            .with_context(|| format!("Cannot read {command} reply"))?;
        if let Some(frame) = parser
            .feed(command.code(), &rx_buffer[..received])
            .into_iter()
            .next()
        {
            println!("Frame: {:02X?}", frame.to_bytes());
            match command {
                Command::Info => println!(
                    "Info: {:?}",
                    PackInfoRecord::decode(frame.payload())
                        .with_context(|| "Cannot decode info reply")?
                ),
                Command::Cell => {
                    println!("Cell voltages: {:?}", CellVoltageRecord::decode(frame.payload()))
                }
                Command::Version => {
                    println!("Version: {:?}", VersionRecord::decode(frame.payload()))
                }
            }
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    bail!("No valid {command} reply within {timeout:?}")
}

fn main() -> Result<()> {
    let args = CliArgs::parse();

    let _log_handle = logging_init(args.verbose.log_level_filter());

    let mut transport = SerialTransport::open(&args.device, args.baud_rate)
        .with_context(|| format!("Cannot open serial port '{}'", args.device))?;

    match args.command {
        CliCommands::Snapshot { cycles, format } => {
            let mut bms = UbetterBms::new(transport);
            bms.initialize()?;
            for _ in 0..cycles {
                daemon::run_cycle(&mut bms, args.delay)?;
                std::thread::sleep(args.delay);
            }
            daemon::print_snapshot(&bms.snapshot(), format)?;
        }
        CliCommands::Daemon { interval, format } => {
            let mut bms = UbetterBms::new(transport);
            bms.initialize()?;
            daemon::run(bms, interval, args.delay, format)?;
        }
        CliCommands::Request { command, write } => {
            let direction = if write {
                Direction::Write
            } else {
                Direction::Read
            };
            request(&mut transport, command.into(), direction, args.read_timeout)?;
        }
    }

    Ok(())
}
