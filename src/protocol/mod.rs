// src/protocol/mod.rs

//! Protocol adapters: one capability set, three wire encodings.
//!
//! An adapter turns "take a measurement" into bus traffic. The lifecycle only
//! ever calls [`ProtocolAdapter::request_measurement`] once per sample and then
//! polls [`ProtocolAdapter::poll_result`] on every tick until it is ready, fails,
//! or the lifecycle's own timeout expires.

mod io_helpers;
pub mod modbus;
pub mod sdi12;
pub mod shared;
pub mod single_wire;

pub use modbus::{ModbusAdapter, RegisterBlock, StartCommand, ValueEncoding};
pub use sdi12::Sdi12Adapter;
pub use shared::SharedBus;
pub use single_wire::{Checksum, FrameDecoder, SingleWireAdapter};

use crate::common::{AdapterError, Readings};
use core::time::Duration;

/// Wire protocol family of an adapter.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AdapterKind {
    /// Single pulse-train exchange, no addressing.
    PointToPoint,
    /// SDI-12 addressed multidrop serial.
    Sdi12,
    /// Modbus-RTU addressed serial.
    ModbusRtu,
}

/// Outstanding measurement request returned by [`ProtocolAdapter::request_measurement`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MeasurementHandle {
    /// Earliest point, relative to the request, at which data can be collected.
    pub ready_after: Duration,
    /// Number of values the device announced, when the protocol announces one.
    pub expected_values: Option<u8>,
}

impl MeasurementHandle {
    pub const fn immediate() -> Self {
        MeasurementHandle { ready_after: Duration::ZERO, expected_values: None }
    }
}

/// Capability set every wire protocol provides to the lifecycle.
pub trait ProtocolAdapter {
    fn kind(&self) -> AdapterKind;

    /// One-time initialization (line configuration, direction pins).
    fn setup(&mut self) -> Result<(), AdapterError> {
        Ok(())
    }

    /// Issues a measurement request to the configured device address.
    ///
    /// `measurement_time` is the device's configured worst-case measurement
    /// duration; adapters whose protocol announces its own delay may return a
    /// different `ready_after`.
    fn request_measurement(&mut self, measurement_time: Duration)
        -> Result<MeasurementHandle, AdapterError>;

    /// Non-blocking check for the result of `handle`.
    ///
    /// `elapsed` is the time since the request was issued.
    /// `Err(nb::Error::WouldBlock)` means the result is still pending.
    fn poll_result(
        &mut self,
        handle: &MeasurementHandle,
        elapsed: Duration,
    ) -> nb::Result<Readings, AdapterError>;

    /// Abandons any outstanding request; called when the sensor powers down.
    fn release(&mut self) {}
}

impl<A: ProtocolAdapter + ?Sized> ProtocolAdapter for &mut A {
    fn kind(&self) -> AdapterKind {
        (**self).kind()
    }

    fn setup(&mut self) -> Result<(), AdapterError> {
        (**self).setup()
    }

    fn request_measurement(
        &mut self,
        measurement_time: Duration,
    ) -> Result<MeasurementHandle, AdapterError> {
        (**self).request_measurement(measurement_time)
    }

    fn poll_result(
        &mut self,
        handle: &MeasurementHandle,
        elapsed: Duration,
    ) -> nb::Result<Readings, AdapterError> {
        (**self).poll_result(handle, elapsed)
    }

    fn release(&mut self) {
        (**self).release()
    }
}
