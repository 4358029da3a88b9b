// src/common/crc.rs

use super::error::BusError;
use crc::{Algorithm, Crc, CRC_16_MODBUS};

/// Custom CRC algorithm matching SDI-12 specification (CRC-16/ARC).
/// Polynomial: 0x8005, Initial Value: 0x0000, reflected in and out, no final XOR.
/// Check Value: 0xBB3D (for "123456789").
pub const SDI12_CRC: Algorithm<u16> = Algorithm {
    poly: 0x8005,
    init: 0x0000,
    refin: true,
    refout: true,
    xorout: 0x0000,
    check: 0xBB3D,
    width: 16,
    residue: 0x0000,
};

const SDI12_CRC_COMPUTER: Crc<u16> = Crc::<u16>::new(&SDI12_CRC);

// Same polynomial as SDI-12 but seeded with 0xFFFF.
const MODBUS_CRC_COMPUTER: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// Calculates the SDI-12 CRC-16 (CRC-16/ARC) for the given data buffer.
///
/// The calculation starts from the address byte up to the byte *before* the
/// CRC itself or the trailing `<CR><LF>`.
#[inline]
pub fn calculate_crc16(data: &[u8]) -> u16 {
    SDI12_CRC_COMPUTER.checksum(data)
}

/// Encodes a 16-bit CRC value into three ASCII characters (SDI-12 v1.4 Sec 4.4.12.2).
pub fn encode_crc_ascii(crc_value: u16) -> [u8; 3] {
    let char1 = 0x40 | ((crc_value >> 12) & 0x3F) as u8;
    let char2 = 0x40 | ((crc_value >> 6) & 0x3F) as u8;
    let char3 = 0x40 | (crc_value & 0x3F) as u8;
    [char1, char2, char3]
}

/// Decodes three SDI-12 ASCII-encoded CRC characters back into a 16-bit value.
///
/// Returns `None` unless `crc_chars` is exactly three bytes long.
pub fn decode_crc_ascii(crc_chars: &[u8]) -> Option<u16> {
    match crc_chars {
        [a, b, c] => {
            let byte1 = u16::from(a & 0x3F);
            let byte2 = u16::from(b & 0x3F);
            let byte3 = u16::from(c & 0x3F);
            Some((byte1 << 12) | (byte2 << 6) | byte3)
        }
        _ => None,
    }
}

/// Verifies an SDI-12 response line that ends in a three-character ASCII CRC.
///
/// The buffer must *not* include `<CR><LF>`.
pub fn verify_response_crc_ascii<E>(response_with_crc: &[u8]) -> Result<(), BusError<E>>
where
    E: core::fmt::Debug,
{
    if response_with_crc.len() < 3 {
        return Err(BusError::InvalidFormat);
    }
    let data_len = response_with_crc.len() - 3;
    let calculated_crc = calculate_crc16(&response_with_crc[..data_len]);
    let received_crc =
        decode_crc_ascii(&response_with_crc[data_len..]).ok_or(BusError::InvalidFormat)?;

    if calculated_crc == received_crc {
        Ok(())
    } else {
        Err(BusError::CrcMismatch { expected: received_crc, calculated: calculated_crc })
    }
}

/// Calculates the Modbus-RTU CRC (CRC-16/MODBUS) of a frame body.
#[inline]
pub fn calculate_modbus_crc(data: &[u8]) -> u16 {
    MODBUS_CRC_COMPUTER.checksum(data)
}

/// Verifies a complete RTU frame whose last two bytes are the CRC, low byte first.
pub fn verify_rtu_frame<E>(frame: &[u8]) -> Result<(), BusError<E>>
where
    E: core::fmt::Debug,
{
    if frame.len() < 4 {
        return Err(BusError::InvalidFormat);
    }
    let data_len = frame.len() - 2;
    let calculated_crc = calculate_modbus_crc(&frame[..data_len]);
    let received_crc = u16::from_le_bytes([frame[data_len], frame[data_len + 1]]);

    if calculated_crc == received_crc {
        Ok(())
    } else {
        Err(BusError::CrcMismatch { expected: received_crc, calculated: calculated_crc })
    }
}
