// src/common/hal_traits.rs

use super::frame::FrameFormat;
use core::fmt::Debug;
use core::ops::{Add, Sub};
use core::time::Duration;

/// A point on a monotonic timeline.
///
/// All lifecycle waiting is expressed as `now - phase_entry >= duration`, so an
/// instant only needs ordering and `Duration` arithmetic.
pub trait MonotonicInstant:
    Copy + Ord + Debug + Add<Duration, Output = Self> + Sub<Self, Output = Duration>
{
}

impl<T> MonotonicInstant for T where
    T: Copy + Ord + Debug + Add<Duration, Output = Self> + Sub<Self, Output = Duration>
{
}

/// Monotonic time source driving the scheduler.
pub trait Clock {
    type Instant: MonotonicInstant;

    fn now(&self) -> Self::Instant;
}

/// Switches sensor supply pins.
///
/// Pins are identified by number; a sensor without a power pin never calls
/// this and is considered continuously powered.
pub trait PowerControl {
    type Error: Debug;

    fn set_power(&mut self, pin: u8, on: bool) -> Result<(), Self::Error>;
}

/// Power control for installations where every sensor is continuously powered.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoPower;

impl PowerControl for NoPower {
    type Error = core::convert::Infallible;

    fn set_power(&mut self, _pin: u8, _on: bool) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Abstraction for timer/delay operations used inside a single bounded transaction.
///
/// Delays here cover protocol-level gaps (break, marking) of a few milliseconds;
/// measurement waits never go through this trait.
pub trait BusTimer {
    type Instant: MonotonicInstant;

    /// Delay for at least the specified number of microseconds.
    fn delay_us(&mut self, us: u32);

    /// Delay for at least the specified number of milliseconds.
    fn delay_ms(&mut self, ms: u32) {
        self.delay_us(ms.saturating_mul(1000));
    }

    fn now(&self) -> Self::Instant;
}

/// Abstraction for synchronous (non-blocking) SDI-12 serial communication.
pub trait Sdi12Serial {
    /// Associated error type for communication errors.
    type Error: Debug;

    /// Attempts to read a single byte. `WouldBlock` if no byte is available yet.
    fn read_byte(&mut self) -> nb::Result<u8, Self::Error>;

    /// Attempts to write a single byte. `WouldBlock` if the transmit buffer is full.
    fn write_byte(&mut self, byte: u8) -> nb::Result<(), Self::Error>;

    /// Attempts to flush the transmit buffer.
    fn flush(&mut self) -> nb::Result<(), Self::Error>;

    /// Sends the SDI-12 break condition (>= 12ms of spacing).
    fn send_break(&mut self) -> nb::Result<(), Self::Error>;

    /// Changes the serial configuration (e.g., between 7E1 and 8N1).
    fn set_config(&mut self, config: FrameFormat) -> Result<(), Self::Error>;
}

/// Abstraction for a Modbus-RTU serial line, usually RS-485.
pub trait RtuSerial {
    type Error: Debug;

    fn read_byte(&mut self) -> nb::Result<u8, Self::Error>;

    fn write_byte(&mut self, byte: u8) -> nb::Result<(), Self::Error>;

    fn flush(&mut self) -> nb::Result<(), Self::Error>;

    fn set_config(&mut self, config: FrameFormat) -> Result<(), Self::Error>;

    /// Drives the transceiver direction line: `true` for transmit, `false` for receive.
    ///
    /// Transceivers with automatic direction control keep the default no-op.
    fn set_transmit(&mut self, _transmit: bool) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Point-to-point single-wire line (pulse-train devices).
pub trait SingleWireBus {
    type Error: Debug;

    /// Performs one complete start-signal/pulse-train exchange, filling `frame`.
    ///
    /// The exchange is blocking at the hardware level and bounded to tens of
    /// milliseconds. Returns the number of bytes received.
    fn exchange(&mut self, frame: &mut [u8]) -> Result<usize, Self::Error>;
}

/// `std::time::Instant` backed clock.
#[cfg(feature = "std")]
#[derive(Debug, Default, Copy, Clone)]
pub struct StdClock;

#[cfg(feature = "std")]
impl Clock for StdClock {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }
}

/// Error from a [`PinPower`] switch.
#[cfg(feature = "embedded-hal")]
#[derive(Debug, thiserror::Error)]
pub enum PinPowerError<E: Debug> {
    #[error("no output pin registered for power pin {0}")]
    UnknownPin(u8),
    #[error("output pin error: {0:?}")]
    Pin(E),
}

/// Power control backed by embedded-hal output pins, keyed by pin number.
#[cfg(feature = "embedded-hal")]
pub struct PinPower<P, const N: usize> {
    pins: heapless::LinearMap<u8, P, N>,
}

#[cfg(feature = "embedded-hal")]
impl<P, const N: usize> PinPower<P, N>
where
    P: embedded_hal::digital::OutputPin,
{
    pub fn new() -> Self {
        PinPower { pins: heapless::LinearMap::new() }
    }

    /// Registers `pin` under `number`. Hands the pin back when the map is full.
    pub fn with_pin(mut self, number: u8, pin: P) -> Result<Self, P> {
        match self.pins.insert(number, pin) {
            Ok(_) => Ok(self),
            Err((_, pin)) => Err(pin),
        }
    }
}

#[cfg(feature = "embedded-hal")]
impl<P, const N: usize> Default for PinPower<P, N>
where
    P: embedded_hal::digital::OutputPin,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "embedded-hal")]
impl<P, const N: usize> PowerControl for PinPower<P, N>
where
    P: embedded_hal::digital::OutputPin,
{
    type Error = PinPowerError<P::Error>;

    fn set_power(&mut self, pin: u8, on: bool) -> Result<(), Self::Error> {
        let output = self.pins.get_mut(&pin).ok_or(PinPowerError::UnknownPin(pin))?;
        let result = if on { output.set_high() } else { output.set_low() };
        result.map_err(PinPowerError::Pin)
    }
}
