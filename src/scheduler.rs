use crate::protocol::{Command, RequestFrame};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Position in the polling cycle. Each request step is followed by the step
/// reading its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SchedulerState {
    #[default]
    InfoRequest,
    InfoResponse,
    VersRequest,
    VersResponse,
    CellRequest,
    CellResponse,
}

impl SchedulerState {
    pub fn next(self) -> Self {
        match self {
            SchedulerState::InfoRequest => SchedulerState::InfoResponse,
            SchedulerState::InfoResponse => SchedulerState::VersRequest,
            SchedulerState::VersRequest => SchedulerState::VersResponse,
            SchedulerState::VersResponse => SchedulerState::CellRequest,
            SchedulerState::CellRequest => SchedulerState::CellResponse,
            SchedulerState::CellResponse => SchedulerState::InfoRequest,
        }
    }

    pub fn action(self) -> Action {
        match self {
            SchedulerState::InfoRequest => Action::Send(RequestFrame::read(Command::Info)),
            SchedulerState::InfoResponse => Action::Receive(Command::Info),
            SchedulerState::VersRequest => Action::Send(RequestFrame::read(Command::Version)),
            SchedulerState::VersResponse => Action::Receive(Command::Version),
            SchedulerState::CellRequest => Action::Send(RequestFrame::read(Command::Cell)),
            SchedulerState::CellResponse => Action::Receive(Command::Cell),
        }
    }
}

/// The one thing a scheduler step has to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Write this request to the transport.
    Send(RequestFrame),
    /// Drain the transport and parse replies to this command.
    Receive(Command),
}

#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    state: SchedulerState,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Returns the action for the current state and moves on to the next one.
    pub fn advance(&mut self) -> Action {
        let action = self.state.action();
        log::trace!("{:?} -> {:?}", self.state, action);
        self.state = self.state.next();
        action
    }
}
