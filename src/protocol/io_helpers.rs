// src/protocol/io_helpers.rs

use crate::common::{error::BusError, hal_traits::BusTimer};
use core::fmt::Debug;
use core::time::Duration;
use nb::Result as NbResult;

/// Polling interval while a non-blocking primitive reports `WouldBlock`.
const POLL_INTERVAL_US: u32 = 100;

/// Executes a non-blocking I/O operation (`f`) repeatedly until it stops
/// returning `WouldBlock`, returning the final result or a timeout error.
///
/// Only used for single-frame transactions whose worst case is a few tens of
/// milliseconds; measurement waits are never spent here.
pub(crate) fn execute_blocking_io_with_timeout<IF, FN, T, E>(
    iface: &mut IF,
    timeout: Duration,
    mut f: FN,
) -> Result<T, BusError<E>>
where
    IF: BusTimer,
    E: Debug,
    FN: FnMut(&mut IF) -> NbResult<T, E>,
{
    let deadline = iface.now() + timeout;

    loop {
        match f(iface) {
            Ok(result) => return Ok(result),
            Err(nb::Error::WouldBlock) => {
                if iface.now() >= deadline {
                    return Err(BusError::Timeout);
                }
                iface.delay_us(POLL_INTERVAL_US);
            }
            Err(nb::Error::Other(e)) => return Err(BusError::Io(e)),
        }
    }
}

/// Drains every byte currently buffered without waiting.
///
/// Returns the number of bytes discarded.
pub(crate) fn drain_input<IF, FN, E>(iface: &mut IF, mut read: FN) -> Result<usize, BusError<E>>
where
    E: Debug,
    FN: FnMut(&mut IF) -> NbResult<u8, E>,
{
    let mut drained = 0;
    loop {
        match read(iface) {
            Ok(_) => drained += 1,
            Err(nb::Error::WouldBlock) => return Ok(drained),
            Err(nb::Error::Other(e)) => return Err(BusError::Io(e)),
        }
    }
}
