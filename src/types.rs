// Part of ethercat-rs. Copyright 2018-2022 by the authors.
// This work is dual-licensed under Apache 2.0 and MIT terms.

use derive_new::new;
use std::{fmt, io, ops::Range};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Network adapter '{0}' not found or cannot be claimed")]
    AdapterNotFound(String),
    #[error("No devices found on the bus")]
    NoDevicesFound,
    #[error("Not all devices reached OPERATIONAL state")]
    PartialBringUp,
    #[error("Invalid {what} index {index} (valid: 0..{len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },
    #[error("No valid working counter received within the receive timeout")]
    ExchangeTimeout,
    #[error("Master is not open")]
    NotOpen,
    #[error("Invalid AL state 0x{0:X}")]
    InvalidState(u16),
    #[error("Process data needs {required} bytes, I/O map holds {available}")]
    IoMapOverflow { required: usize, available: usize },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        io::Error::new(io::ErrorKind::Other, e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn check_index(what: &'static str, index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(Error::IndexOutOfRange { what, index, len })
    }
}

/// EtherCAT application layer state of a slave (or of the whole group).
///
/// The discriminants are the AL control/status register values, and so is
/// the derived ordering: `Error` sorts above `Op` and has to be checked
/// for explicitly when looking for the lowest state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SlaveState {
    None = 0x00,
    Init = 0x01,
    PreOp = 0x02,
    Boot = 0x03,
    SafeOp = 0x04,
    Op = 0x08,
    /// Error flag set by the slave on top of its current state.
    Error = 0x10,
}

impl SlaveState {
    /// Decode a raw AL status register as read from a slave. A set error
    /// indication bit yields `Error`; undefined states are rejected with
    /// [`Error::InvalidState`].
    pub fn from_status(status: u16) -> Result<Self> {
        if status & 0x10 != 0 {
            return Ok(SlaveState::Error);
        }
        Self::try_from_raw(status & 0x0F)
    }

    fn try_from_raw(raw: u16) -> Result<Self> {
        Ok(match raw {
            0x00 => SlaveState::None,
            0x01 => SlaveState::Init,
            0x02 => SlaveState::PreOp,
            0x03 => SlaveState::Boot,
            0x04 => SlaveState::SafeOp,
            0x08 => SlaveState::Op,
            x => return Err(Error::InvalidState(x)),
        })
    }

    pub const fn raw(self) -> u16 {
        self as u16
    }
}

impl fmt::Display for SlaveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SlaveState::None => "NONE",
            SlaveState::Init => "INIT",
            SlaveState::PreOp => "PRE_OP",
            SlaveState::Boot => "BOOT",
            SlaveState::SafeOp => "SAFE_OP",
            SlaveState::Op => "OP",
            SlaveState::Error => "ERROR",
        })
    }
}

/// Addressee of a state check or state write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateTarget {
    /// All slaves at once, reported as the lowest state on the bus.
    Group,
    /// A single slave by zero-based position.
    Slave(usize),
}

/// Result of [`Master::configure`](crate::Master::configure).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BringUpOutcome {
    AllOperational = 0,
    NoDevices = 1,
    PartialOperational = 2,
}

impl BringUpOutcome {
    /// Numeric status code: 0 = all OP, 1 = no devices, 2 = not all OP.
    pub const fn code(self) -> i32 {
        self as i32
    }

    pub fn into_result(self) -> Result<()> {
        match self {
            BringUpOutcome::AllOperational => Ok(()),
            BringUpOutcome::NoDevices => Err(Error::NoDevicesFound),
            BringUpOutcome::PartialOperational => Err(Error::PartialBringUp),
        }
    }
}

/// Progress of the bring-up sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BringUpPhase {
    Discovering,
    Configured,
    SafeOpRequested,
    OpRequested,
    Operational,
    Degraded,
}

impl BringUpPhase {
    pub const fn is_terminal(self) -> bool {
        matches!(self, BringUpPhase::Operational | BringUpPhase::Degraded)
    }
}

/// Working counter reported by one process data exchange.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkingCounter(pub u16);

impl WorkingCounter {
    pub const ZERO: WorkingCounter = WorkingCounter(0);
}

impl From<WorkingCounter> for u16 {
    fn from(wkc: WorkingCounter) -> Self {
        wkc.0
    }
}

impl fmt::Display for WorkingCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Working counter contributions of the slave group as computed by the
/// stack during I/O mapping.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, new)]
pub struct GroupWkc {
    pub outputs: u16,
    pub inputs: u16,
}

/// Working counters expected once the bus is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedWkc {
    pub input: u16,
    pub output: u16,
}

impl ExpectedWkc {
    /// An output datagram is counted twice (read and write), inputs once.
    pub const fn from_group(group: GroupWkc) -> Self {
        Self {
            input: group.inputs,
            output: group.outputs.saturating_mul(2),
        }
    }

    pub const fn total(&self) -> u16 {
        self.input.saturating_add(self.output)
    }

    pub fn classify(&self, observed: WorkingCounter) -> WcState {
        match observed.0 {
            0 => WcState::Zero,
            x if x >= self.total() => WcState::Complete,
            _ => WcState::Incomplete,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WcState {
    Zero = 0,
    Incomplete,
    Complete,
}

/// Byte range of a slave's inputs or outputs inside the I/O map.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, new)]
pub struct PdoRegion {
    pub offset: usize,
    pub len: usize,
}

impl PdoRegion {
    pub const fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }

    pub const fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// A slave as seen by the stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlaveInfo {
    pub name: String,
    pub state: SlaveState,
    pub al_status_code: u16,
    pub input_bits: u32,
    pub output_bits: u32,
    pub inputs: PdoRegion,
    pub outputs: PdoRegion,
}
