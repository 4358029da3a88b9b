// src/common/response.rs

use crate::common::address::Sdi12Addr;
use crate::common::types::{Readings, Sdi12ParsingError, Sdi12Value};
use core::fmt;

/// Error parsing the payload of an SDI-12 response (address, CRC and `<CR><LF>` already stripped).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ResponseParseError {
    /// Payload was empty where content is required.
    EmptyInput,
    /// Payload is too short for the expected format.
    TooShort,
    /// Failed to parse numeric fields (ttt, n).
    NumericError,
    /// Failed to parse a `<values>` element.
    ValueError(Sdi12ParsingError),
    /// More values than the readings buffer can hold.
    TooManyValues,
    /// Generic format error.
    InvalidFormat,
}

impl From<Sdi12ParsingError> for ResponseParseError {
    fn from(e: Sdi12ParsingError) -> Self {
        ResponseParseError::ValueError(e)
    }
}

impl fmt::Display for ResponseParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ResponseParseError {}

#[cfg(feature = "std")]
impl std::error::Error for Sdi12ParsingError {}

/// Timing and count information returned by `aM!`/`aMC!` (`atttn<CR><LF>`).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MeasurementTiming {
    /// The address of the responding sensor.
    pub address: Sdi12Addr,
    /// Time estimate in seconds until data is ready (ttt). 0-999.
    pub time_seconds: u16,
    /// Number of measurement values that will be returned (n). 0-9.
    pub values_count: u8,
}

/// Parses the `tttn` payload of a start-measurement response.
pub fn parse_measurement_timing(
    address: Sdi12Addr,
    payload: &[u8],
) -> Result<MeasurementTiming, ResponseParseError> {
    if payload.is_empty() {
        return Err(ResponseParseError::EmptyInput);
    }
    if payload.len() != 4 {
        return Err(ResponseParseError::TooShort);
    }
    if !payload.iter().all(u8::is_ascii_digit) {
        return Err(ResponseParseError::NumericError);
    }
    let time_seconds = payload[..3]
        .iter()
        .fold(0u16, |acc, d| acc * 10 + u16::from(d - b'0'));
    let values_count = payload[3] - b'0';

    Ok(MeasurementTiming { address, time_seconds, values_count })
}

/// Parses a `<values>` payload such as `+1.23-4.5+6` and appends each value to `out`.
///
/// Returns the number of values appended.
pub fn parse_data_values(payload: &[u8], out: &mut Readings) -> Result<usize, ResponseParseError> {
    let text = core::str::from_utf8(payload).map_err(|_| ResponseParseError::InvalidFormat)?;
    if text.is_empty() {
        return Ok(0);
    }
    if !text.starts_with(|c: char| c == '+' || c == '-') {
        return Err(ResponseParseError::InvalidFormat);
    }

    let mut appended = 0;
    let mut start = 0;
    for (i, c) in text.char_indices().skip(1) {
        if c == '+' || c == '-' {
            push_value(&text[start..i], out)?;
            appended += 1;
            start = i;
        }
    }
    push_value(&text[start..], out)?;
    Ok(appended + 1)
}

fn push_value(field: &str, out: &mut Readings) -> Result<(), ResponseParseError> {
    let value = Sdi12Value::parse_single(field)?;
    out.push(Some(value.as_f32()))
        .map_err(|_| ResponseParseError::TooManyValues)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(c: char) -> Sdi12Addr {
        Sdi12Addr::new(c).unwrap()
    }

    #[test]
    fn test_parse_measurement_timing() {
        let timing = parse_measurement_timing(addr('0'), b"0013").unwrap();
        assert_eq!(timing.time_seconds, 1);
        assert_eq!(timing.values_count, 3);
        assert_eq!(timing.address, addr('0'));

        let slow = parse_measurement_timing(addr('a'), b"1209").unwrap();
        assert_eq!(slow.time_seconds, 120);
        assert_eq!(slow.values_count, 9);
    }

    #[test]
    fn test_parse_measurement_timing_invalid() {
        assert_eq!(parse_measurement_timing(addr('0'), b""), Err(ResponseParseError::EmptyInput));
        assert_eq!(parse_measurement_timing(addr('0'), b"001"), Err(ResponseParseError::TooShort));
        assert_eq!(parse_measurement_timing(addr('0'), b"00a3"), Err(ResponseParseError::NumericError));
    }

    #[test]
    fn test_parse_data_values() {
        let mut out = Readings::new();
        assert_eq!(parse_data_values(b"+1.23-4.5+6", &mut out), Ok(3));
        assert_eq!(out.as_slice(), &[Some(1.23), Some(-4.5), Some(6.0)]);

        // Appends after existing values (successive aDn! lines).
        assert_eq!(parse_data_values(b"-0.5", &mut out), Ok(1));
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn test_parse_data_values_empty_and_invalid() {
        let mut out = Readings::new();
        assert_eq!(parse_data_values(b"", &mut out), Ok(0));
        assert_eq!(parse_data_values(b"1.2", &mut out), Err(ResponseParseError::InvalidFormat));
        assert!(matches!(
            parse_data_values(b"+1..2", &mut out),
            Err(ResponseParseError::ValueError(Sdi12ParsingError::MultipleDecimals))
        ));
    }

    #[test]
    fn test_parse_data_values_overflow() {
        let mut out = Readings::new();
        assert_eq!(
            parse_data_values(b"+1+2+3+4+5+6+7+8+9", &mut out),
            Err(ResponseParseError::TooManyValues)
        );
    }
}
