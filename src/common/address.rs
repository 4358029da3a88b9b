// src/common/address.rs

use super::error::ConfigError;
use core::convert::TryFrom;
use core::fmt;

/// One-character address of a sensor on an SDI-12 multidrop bus.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Sdi12Addr(char);

impl Sdi12Addr {
    pub const DEFAULT_ADDRESS: Sdi12Addr = Sdi12Addr('0');

    /// Creates a new `Sdi12Addr` if the given character is a valid sensor address.
    ///
    /// The query address `?` is rejected: a measured sensor must be addressed
    /// individually so that several devices can share the bus.
    pub fn new(address_char: char) -> Result<Self, ConfigError> {
        if Self::is_valid_address_char(address_char) {
            Ok(Sdi12Addr(address_char))
        } else {
            Err(ConfigError::InvalidSdi12Address(address_char))
        }
    }

    #[inline]
    pub const fn as_char(&self) -> char {
        self.0
    }

    #[inline]
    pub const fn as_byte(&self) -> u8 {
        self.0 as u8
    }

    #[inline]
    pub const fn is_valid_address_char(c: char) -> bool {
        matches!(c, '0'..='9' | 'a'..='z' | 'A'..='Z')
    }
}

impl Default for Sdi12Addr {
    fn default() -> Self {
        Self::DEFAULT_ADDRESS
    }
}

impl TryFrom<char> for Sdi12Addr {
    type Error = ConfigError;

    fn try_from(value: char) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Sdi12Addr> for char {
    fn from(value: Sdi12Addr) -> Self {
        value.0
    }
}

impl fmt::Display for Sdi12Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Slave address of a Modbus-RTU device (1..=247).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct ModbusAddr(u8);

impl ModbusAddr {
    /// Broadcast (0) and the reserved range 248..=255 cannot address a single device.
    pub fn new(address: u8) -> Result<Self, ConfigError> {
        match address {
            1..=247 => Ok(ModbusAddr(address)),
            _ => Err(ConfigError::InvalidModbusAddress(address)),
        }
    }

    #[inline]
    pub const fn get(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for ModbusAddr {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for ModbusAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a physical communication bus.
///
/// Used by the scheduler as a mutual-exclusion key: two sensors with the same
/// `BusId` never have overlapping request/response windows.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct BusId(pub u8);

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bus{}", self.0)
    }
}
