// src/common/mod.rs

// --- Declare all public modules within common ---
pub mod address;
pub mod command;
pub mod crc;
pub mod error;
pub mod frame;
pub mod hal_traits;
pub mod response;
pub mod timing;
pub mod types;

// --- Re-export key types/traits/functions for easier access ---

// From address.rs
pub use address::{BusId, ModbusAddr, Sdi12Addr};

// From command.rs
pub use command::{Command, CommandFormatError};

// From crc.rs
pub use crc::{
    calculate_crc16, calculate_modbus_crc, decode_crc_ascii, encode_crc_ascii,
    verify_response_crc_ascii, verify_rtu_frame,
};

// From error.rs
pub use error::{AdapterError, BusError, ConfigError, VariableError};

// From frame.rs
pub use frame::FrameFormat;

// From hal_traits.rs
pub use hal_traits::{
    Clock, MonotonicInstant, NoPower, PowerControl, RtuSerial, Sdi12Serial, BusTimer,
    SingleWireBus,
};

#[cfg(feature = "std")]
pub use hal_traits::StdClock;

#[cfg(feature = "embedded-hal")]
pub use hal_traits::{PinPower, PinPowerError};

// From response.rs
pub use response::{parse_data_values, parse_measurement_timing, MeasurementTiming};

// From types.rs
pub use types::{Readings, Sdi12ParsingError, Sdi12Value, MAX_QUANTITIES};
