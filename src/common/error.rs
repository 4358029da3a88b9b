// src/common/error.rs

/// Transport-level failure raised while exchanging bytes with a device.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum BusError<E = ()>
where
    E: core::fmt::Debug, // Debug is the minimum the Io message needs
{
    /// Underlying I/O error from the HAL implementation.
    #[error("I/O error: {0:?}")]
    Io(E),

    /// Operation timed out.
    #[error("Operation timed out")]
    Timeout,

    /// Received frame or line is structurally invalid.
    #[error("Invalid response format")]
    InvalidFormat,

    /// Buffer provided was too small.
    #[error("Buffer overflow: needed {needed}, got {got}")]
    BufferOverflow { needed: usize, got: usize },

    /// Received CRC does not match calculated CRC.
    #[error("CRC mismatch: expected {expected:#06x}, calculated {calculated:#06x}")]
    CrcMismatch { expected: u16, calculated: u16 },

    /// Response came from a different device or answered a different request.
    #[error("Unexpected response received")]
    UnexpectedResponse,

    /// Address character in a response is not a valid SDI-12 address.
    #[error("Invalid SDI-12 address character: '{0}'")]
    InvalidAddress(char),

    /// Modbus slave answered with an exception code.
    #[error("Modbus exception code {0:#04x}")]
    ModbusException(u8),
}

impl<E: core::fmt::Debug> From<E> for BusError<E> {
    fn from(e: E) -> Self {
        BusError::Io(e)
    }
}

/// Failure signalled by a protocol adapter to the lifecycle.
///
/// Every variant is transient from the lifecycle's point of view: `BusBusy`
/// is retried on the next tick without spending retry budget, the others
/// fail the current sample.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdapterError {
    /// Another transaction currently owns the bus.
    #[error("bus busy")]
    BusBusy,

    /// The device stayed silent or the transport failed.
    #[error("no response from device")]
    NoResponse,

    /// The response had the wrong shape, count, address or checksum.
    #[error("malformed response")]
    Malformed,

    /// The result did not arrive within the allowed window.
    #[error("measurement timed out")]
    Timeout,
}

impl<E: core::fmt::Debug> From<BusError<E>> for AdapterError {
    fn from(e: BusError<E>) -> Self {
        match e {
            BusError::Io(_) | BusError::Timeout => AdapterError::NoResponse,
            BusError::InvalidFormat
            | BusError::BufferOverflow { .. }
            | BusError::CrcMismatch { .. }
            | BusError::UnexpectedResponse
            | BusError::InvalidAddress(_)
            | BusError::ModbusException(_) => AdapterError::Malformed,
        }
    }
}

/// Fatal misconfiguration detected while building sensors, variables or the scheduler.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("averaging count must be at least 1")]
    ZeroAveragingCount,

    #[error("sensor must report at least one quantity")]
    NoQuantities,

    #[error("sensor reports {count} quantities, at most {max} are supported")]
    TooManyQuantities { count: usize, max: usize },

    #[error("quantity index {index} out of range for a sensor with {count} quantities")]
    QuantityIndexOutOfRange { index: u8, count: usize },

    #[error("resolution {resolution} exceeds the maximum of {max} fractional digits")]
    ResolutionTooLarge { resolution: u8, max: u8 },

    #[error("invalid SDI-12 address character: '{0}'")]
    InvalidSdi12Address(char),

    #[error("invalid Modbus slave address: {0}")]
    InvalidModbusAddress(u8),

    #[error("quantity index {0} is declared twice")]
    DuplicateQuantityIndex(u8),

    #[error("scheduler has no free sensor slot")]
    SchedulerFull,
}

/// Failure reading a variable.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VariableError {
    /// The variable has not been bound to a sensor yet.
    #[error("variable is not bound to a sensor")]
    Unbound,

    /// The bound sensor id is not known to the registry that was queried.
    #[error("bound sensor is not registered")]
    UnknownSensor,

    /// Binding would violate the sensor's quantity layout.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
