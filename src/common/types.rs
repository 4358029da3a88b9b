// src/common/types.rs

use core::fmt;
use core::str::FromStr;

/// Largest number of quantities a single sensor may report.
///
/// Multi-parameter sondes report up to eight values; most devices report 1-3.
pub const MAX_QUANTITIES: usize = 8;

/// Raw values returned by one successful measurement.
///
/// `None` marks a quantity the device reported as invalid for this sample; it
/// is excluded from averaging rather than counted as zero.
pub type Readings = heapless::Vec<Option<f32>, MAX_QUANTITIES>;

/// A single value as returned in the `<values>` part of an SDI-12 `aDn!` response.
/// Format: `p[d.d]` where p is '+' or '-', at most 7 digits, at most 9 chars total.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd)]
pub struct Sdi12Value(f32);

impl Sdi12Value {
    pub fn as_f32(&self) -> f32 {
        self.0
    }

    /// Parses a single value string (like "+1.23", "-10", "+1234567").
    pub fn parse_single(s: &str) -> Result<Self, Sdi12ParsingError> {
        if s.is_empty() || s.len() > 9 {
            return Err(Sdi12ParsingError::InvalidFormat);
        }
        let mut chars = s.chars();
        let sign = match chars.next() {
            Some('+') => 1.0,
            Some('-') => -1.0,
            _ => return Err(Sdi12ParsingError::InvalidSign),
        };

        let rest = chars.as_str();
        let mut decimal_found = false;
        let mut digit_count = 0;
        for c in rest.chars() {
            match c {
                '0'..='9' => digit_count += 1,
                '.' => {
                    if decimal_found {
                        return Err(Sdi12ParsingError::MultipleDecimals);
                    }
                    decimal_found = true;
                }
                _ => return Err(Sdi12ParsingError::InvalidCharacter),
            }
        }
        if digit_count == 0 || digit_count > 7 {
            return Err(Sdi12ParsingError::InvalidDigitCount);
        }

        let num_part = f32::from_str(rest).map_err(|_| Sdi12ParsingError::ParseFloatError)?;
        Ok(Self(sign * num_part))
    }
}

/// Error during parsing of SDI-12 `<values>`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Sdi12ParsingError {
    InvalidFormat,
    InvalidSign,
    MultipleDecimals,
    InvalidCharacter,
    InvalidDigitCount,
    ParseFloatError,
}

impl fmt::Display for Sdi12ParsingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Sdi12ParsingError::*;
        match self {
            InvalidFormat => write!(f, "Invalid SDI-12 value format"),
            InvalidSign => write!(f, "Invalid or missing sign character"),
            MultipleDecimals => write!(f, "Multiple decimal points found"),
            InvalidCharacter => write!(f, "Invalid character in numeric part"),
            InvalidDigitCount => write!(f, "Invalid number of digits (must be 1-7)"),
            ParseFloatError => write!(f, "Failed to parse numeric part as float"),
        }
    }
}
