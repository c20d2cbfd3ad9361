use anyhow::{Context, Result};
use log::{error, info};
use serde_json::json;
use std::time::Duration;
use ubetterbms_lib::scheduler::SchedulerState;
use ubetterbms_lib::serialport::SerialTransport;
use ubetterbms_lib::{Snapshot, UbetterBms};

use crate::commandline::OutputFormat;

/// Steps the driver until the cycle is back at its first state, sleeping `delay`
/// between steps.
pub fn run_cycle(bms: &mut UbetterBms<SerialTransport>, delay: Duration) -> Result<()> {
    loop {
        bms.scheduler_step()
            .with_context(|| format!("Scheduler step failed in {:?}", bms.scheduler_state()))?;
        if bms.scheduler_state() == SchedulerState::InfoRequest {
            return Ok(());
        }
        std::thread::sleep(delay);
    }
}

pub fn print_snapshot(snapshot: &Snapshot, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Debug => {
            println!("--- Data at {} ---", chrono::Local::now().to_rfc3339());
            println!("{snapshot:?}");
            println!("Protection: {:?}", snapshot.protection.active());
            println!("Version: {}", snapshot.version_string());
            println!("--------------------------");
        }
        OutputFormat::Json => {
            let data = json!({
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "snapshot": snapshot,
            });
            let payload =
                serde_json::to_string(&data).with_context(|| "Failed to serialize snapshot")?;
            println!("{payload}");
        }
    }
    Ok(())
}

pub fn run(
    mut bms: UbetterBms<SerialTransport>,
    interval: Duration,
    delay: Duration,
    format: OutputFormat,
) -> Result<()> {
    info!("Starting daemon mode: interval={interval:?}, delay={delay:?}, format={format:?}");

    loop {
        match run_cycle(&mut bms, delay) {
            Ok(()) => {
                if let Err(e) = print_snapshot(&bms.snapshot(), format) {
                    error!("Cannot print snapshot: {e:#}");
                }
            }
            // the cycle resumes where it stopped
            Err(e) => error!("Polling cycle failed: {e:#}"),
        }
        std::thread::sleep(interval);
    }
}
