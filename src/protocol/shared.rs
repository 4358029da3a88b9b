// src/protocol/shared.rs

//! Shared access to one physical transport from several adapters.
//!
//! Each adapter on a multidrop bus owns a [`SharedBus`] handle pointing at the
//! same `RefCell`. Every trait method borrows the transport for the duration
//! of one call only; the scheduler's per-bus lock keeps whole transactions
//! from interleaving.

use crate::common::{
    hal_traits::{BusTimer, PowerControl, RtuSerial, Sdi12Serial, SingleWireBus},
    FrameFormat,
};
use core::cell::RefCell;

/// Non-owning handle to a transport shared by several adapters.
#[derive(Debug)]
pub struct SharedBus<'a, T> {
    bus: &'a RefCell<T>,
}

impl<'a, T> SharedBus<'a, T> {
    pub fn new(bus: &'a RefCell<T>) -> Self {
        SharedBus { bus }
    }
}

impl<T> Clone for SharedBus<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SharedBus<'_, T> {}

impl<T: BusTimer> BusTimer for SharedBus<'_, T> {
    type Instant = T::Instant;

    fn delay_us(&mut self, us: u32) {
        self.bus.borrow_mut().delay_us(us)
    }

    fn now(&self) -> Self::Instant {
        self.bus.borrow().now()
    }
}

impl<T: Sdi12Serial> Sdi12Serial for SharedBus<'_, T> {
    type Error = T::Error;

    fn read_byte(&mut self) -> nb::Result<u8, Self::Error> {
        self.bus.borrow_mut().read_byte()
    }

    fn write_byte(&mut self, byte: u8) -> nb::Result<(), Self::Error> {
        self.bus.borrow_mut().write_byte(byte)
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        self.bus.borrow_mut().flush()
    }

    fn send_break(&mut self) -> nb::Result<(), Self::Error> {
        self.bus.borrow_mut().send_break()
    }

    fn set_config(&mut self, config: FrameFormat) -> Result<(), Self::Error> {
        self.bus.borrow_mut().set_config(config)
    }
}

impl<T: RtuSerial> RtuSerial for SharedBus<'_, T> {
    type Error = T::Error;

    fn read_byte(&mut self) -> nb::Result<u8, Self::Error> {
        self.bus.borrow_mut().read_byte()
    }

    fn write_byte(&mut self, byte: u8) -> nb::Result<(), Self::Error> {
        self.bus.borrow_mut().write_byte(byte)
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        self.bus.borrow_mut().flush()
    }

    fn set_config(&mut self, config: FrameFormat) -> Result<(), Self::Error> {
        self.bus.borrow_mut().set_config(config)
    }

    fn set_transmit(&mut self, transmit: bool) -> Result<(), Self::Error> {
        self.bus.borrow_mut().set_transmit(transmit)
    }
}

impl<T: SingleWireBus> SingleWireBus for SharedBus<'_, T> {
    type Error = T::Error;

    fn exchange(&mut self, frame: &mut [u8]) -> Result<usize, Self::Error> {
        self.bus.borrow_mut().exchange(frame)
    }
}

impl<T: PowerControl> PowerControl for SharedBus<'_, T> {
    type Error = T::Error;

    fn set_power(&mut self, pin: u8, on: bool) -> Result<(), Self::Error> {
        self.bus.borrow_mut().set_power(pin, on)
    }
}
