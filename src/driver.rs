use crate::parser::{FrameParser, ParserState};
use crate::protocol::Command;
use crate::scheduler::{Action, Scheduler, SchedulerState};
use crate::snapshot::Snapshot;
use crate::transport::Transport;
use crate::Error;

/// Default number of bytes requested from the transport per read.
pub const READ_BUFFER_LENGTH: usize = 1024;

/// Protocol state shared by the synchronous and asynchronous drivers: the polling
/// cycle, the stream parser with its frame in progress, and the snapshot.
///
/// It performs no I/O; the driver asks it what to do next and hands it the
/// received bytes.
#[derive(Debug, Clone, Default)]
pub struct Session {
    scheduler: Scheduler,
    parser: FrameParser,
    snapshot: Snapshot,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the action of the current scheduler step and advances the cycle.
    pub fn next_action(&mut self) -> Action {
        self.scheduler.advance()
    }

    /// Parses `rx_buffer` as (part of) the reply to `command` and merges every
    /// valid frame into the snapshot. Returns the number of frames merged.
    pub fn receive(&mut self, command: Command, rx_buffer: &[u8]) -> usize {
        let mut merged = 0;
        for frame in self.parser.feed(command.code(), rx_buffer) {
            match self.snapshot.apply(&frame) {
                Ok(()) => {
                    log::debug!("Updated {command} from {} byte payload", frame.payload.len());
                    merged += 1;
                }
                Err(err) => log::warn!("Cannot decode {command} reply: {err}"),
            }
        }
        merged
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn parser_state(&self) -> ParserState {
        self.parser.state()
    }
}

/// Synchronous Ubetter BMS driver.
///
/// Each call to [`UbetterBms::scheduler_step`] either sends one request or
/// parses whatever reply bytes are pending, never both, and never waits. The
/// caller decides how often to step; a step right after a request usually finds
/// nothing yet, and the reply is picked up on a later cycle.
#[derive(Debug)]
pub struct UbetterBms<T: Transport> {
    transport: T,
    session: Session,
    read_chunk: usize,
}

impl<T: Transport> UbetterBms<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            session: Session::new(),
            read_chunk: READ_BUFFER_LENGTH,
        }
    }

    /// Reserved for device setup; the protocol currently needs none.
    pub fn initialize(&mut self) -> std::result::Result<(), Error> {
        log::debug!("initialize");
        Ok(())
    }

    /// Sets how many bytes are requested from the transport per read.
    pub fn set_read_chunk(&mut self, size: usize) {
        self.read_chunk = size.max(1);
        log::trace!("set read chunk to {}", self.read_chunk);
    }

    /// Runs one step of the polling cycle.
    ///
    /// Protocol errors are handled internally; only transport failures are
    /// returned, and the cycle has advanced regardless.
    pub fn scheduler_step(&mut self) -> std::result::Result<(), Error> {
        match self.session.next_action() {
            Action::Send(request) => {
                let tx_buffer = request.to_bytes();
                log::trace!("send {} request: {:02X?}", request.command, tx_buffer);
                self.transport.write(&tx_buffer)?;
            }
            Action::Receive(command) => {
                let mut rx_buffer = vec![0; self.read_chunk];
                loop {
                    let received = self.transport.read(&mut rx_buffer)?;
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

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }
}
