//! SDI-12 commands issued by the measurement lifecycle.
//!
//! See SDI-12 Specification v1.4, Section 4.4 "Command Set".

use arrayvec::ArrayString;
use core::fmt::{self, Write};

use super::address::Sdi12Addr;

/// Longest command the lifecycle formats (`aMC9!`) plus headroom.
pub const MAX_COMMAND_LEN: usize = 8;

/// The subset of SDI-12 commands needed to take a measurement.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Command {
    /// Acknowledge Active (`a!`).
    AcknowledgeActive { address: Sdi12Addr },

    /// Start Measurement (`aM!` or `aM1!`..`aM9!`). `None` is `aM!`.
    StartMeasurement { address: Sdi12Addr, index: Option<u8> },

    /// Start Measurement with CRC (`aMC!` or `aMC1!`..`aMC9!`).
    StartMeasurementCrc { address: Sdi12Addr, index: Option<u8> },

    /// Send Data (`aD0!`..`aD9!`).
    SendData { address: Sdi12Addr, data_index: u8 },
}

/// A command could not be rendered because an index is out of range.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[error("command index out of range")]
pub struct CommandFormatError;

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::AcknowledgeActive { address } => write!(f, "{}!", address),
            Command::StartMeasurement { address, index } => match index {
                None => write!(f, "{}M!", address),
                Some(idx @ 1..=9) => write!(f, "{}M{}!", address, idx),
                Some(_) => Err(fmt::Error),
            },
            Command::StartMeasurementCrc { address, index } => match index {
                None => write!(f, "{}MC!", address),
                Some(idx @ 1..=9) => write!(f, "{}MC{}!", address, idx),
                Some(_) => Err(fmt::Error),
            },
            Command::SendData { address, data_index } => {
                if *data_index <= 9 {
                    write!(f, "{}D{}!", address, data_index)
                } else {
                    Err(fmt::Error)
                }
            }
        }
    }
}

impl Command {
    /// Returns the address the command is directed to.
    pub fn address(&self) -> Sdi12Addr {
        match self {
            Command::AcknowledgeActive { address }
            | Command::StartMeasurement { address, .. }
            | Command::StartMeasurementCrc { address, .. }
            | Command::SendData { address, .. } => *address,
        }
    }

    /// Formats the command into a fixed-capacity string ready for the wire.
    pub fn format_into(&self) -> Result<ArrayString<MAX_COMMAND_LEN>, CommandFormatError> {
        let mut buffer = ArrayString::<MAX_COMMAND_LEN>::new();
        write!(buffer, "{}", self).map_err(|_| CommandFormatError)?;
        Ok(buffer)
    }
}
