// src/protocol/modbus.rs

use super::io_helpers::{drain_input, execute_blocking_io_with_timeout};
use super::{AdapterKind, MeasurementHandle, ProtocolAdapter};
use crate::common::{
    address::ModbusAddr,
    crc::{calculate_modbus_crc, verify_rtu_frame},
    error::{AdapterError, BusError},
    hal_traits::{BusTimer, RtuSerial},
    timing,
    types::{Readings, MAX_QUANTITIES},
    FrameFormat,
};
use arrayvec::ArrayVec;
use core::fmt::Debug;
use core::time::Duration;
use log::{trace, warn};

const READ_HOLDING_REGISTERS: u8 = 0x03;
const WRITE_SINGLE_REGISTER: u8 = 0x06;
const EXCEPTION_FLAG: u8 = 0x80;

/// Two registers per quantity at most.
const MAX_REGISTERS: usize = MAX_QUANTITIES * 2;
/// address + function + byte count + data + CRC
const MAX_FRAME_LEN: usize = 3 + MAX_REGISTERS * 2 + 2;

/// How a quantity is laid out in holding registers.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ValueEncoding {
    /// IEEE-754 single, high word first.
    F32BigEndian,
    /// IEEE-754 single, low word first.
    F32WordSwapped,
    /// Signed 16-bit register divided by `divisor`.
    I16Scaled { divisor: f32 },
}

impl ValueEncoding {
    pub const fn registers_per_value(&self) -> u16 {
        match self {
            ValueEncoding::F32BigEndian | ValueEncoding::F32WordSwapped => 2,
            ValueEncoding::I16Scaled { .. } => 1,
        }
    }

    /// Decodes one quantity. Non-finite results decode as undefined.
    pub fn decode(&self, registers: &[u16]) -> Option<f32> {
        let value = match (*self, registers) {
            (ValueEncoding::F32BigEndian, [hi, lo, ..]) => {
                f32::from_bits((u32::from(*hi) << 16) | u32::from(*lo))
            }
            (ValueEncoding::F32WordSwapped, [lo, hi, ..]) => {
                f32::from_bits((u32::from(*hi) << 16) | u32::from(*lo))
            }
            (ValueEncoding::I16Scaled { divisor }, [raw, ..]) => *raw as i16 as f32 / divisor,
            _ => return None,
        };
        value.is_finite().then_some(value)
    }
}

/// Contiguous block of holding registers carrying all quantities of one reading.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RegisterBlock {
    pub start: u16,
    pub values: u8,
    pub encoding: ValueEncoding,
}

impl RegisterBlock {
    pub const fn new(start: u16, values: u8, encoding: ValueEncoding) -> Self {
        RegisterBlock { start, values, encoding }
    }

    pub const fn register_count(&self) -> u16 {
        self.values as u16 * self.encoding.registers_per_value()
    }
}

/// Write Single Register issued at request time to start a measurement.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StartCommand {
    pub register: u16,
    pub value: u16,
}

/// Modbus-RTU adapter for one slave address on a (possibly shared) RS-485 line.
#[derive(Debug)]
pub struct ModbusAdapter<IF> {
    interface: IF,
    address: ModbusAddr,
    block: RegisterBlock,
    start: Option<StartCommand>,
    baud: u32,
}

impl<IF> ModbusAdapter<IF>
where
    IF: RtuSerial + BusTimer,
    <IF as RtuSerial>::Error: Debug,
{
    pub fn new(interface: IF, address: ModbusAddr, block: RegisterBlock) -> Self {
        ModbusAdapter { interface, address, block, start: None, baud: 9600 }
    }

    pub fn with_start_command(mut self, start: StartCommand) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_baud(mut self, baud: u32) -> Self {
        self.baud = baud;
        self
    }

    pub fn address(&self) -> ModbusAddr {
        self.address
    }

    pub fn interface(&self) -> &IF {
        &self.interface
    }

    fn write_single_register(&mut self, start: StartCommand) -> Result<(), BusError<<IF as RtuSerial>::Error>> {
        let mut request = ArrayVec::<u8, 8>::new();
        request.push(self.address.get());
        request.push(WRITE_SINGLE_REGISTER);
        request.extend(start.register.to_be_bytes());
        request.extend(start.value.to_be_bytes());
        append_crc(&mut request);

        let mut response = [0u8; MAX_FRAME_LEN];
        let len = self.transaction(&request, &mut response, request.len())?;
        if response[..len] != request[..] {
            return Err(BusError::UnexpectedResponse);
        }
        Ok(())
    }

    fn read_holding_registers(&mut self) -> Result<Readings, BusError<<IF as RtuSerial>::Error>> {
        let count = self.block.register_count();
        let mut request = ArrayVec::<u8, 8>::new();
        request.push(self.address.get());
        request.push(READ_HOLDING_REGISTERS);
        request.extend(self.block.start.to_be_bytes());
        request.extend(count.to_be_bytes());
        append_crc(&mut request);

        let byte_count = usize::from(count) * 2;
        let mut response = [0u8; MAX_FRAME_LEN];
        let len = self.transaction(&request, &mut response, 3 + byte_count + 2)?;
        let frame = &response[..len];

        if usize::from(frame[2]) != byte_count {
            return Err(BusError::InvalidFormat);
        }

        let mut registers = ArrayVec::<u16, MAX_REGISTERS>::new();
        for pair in frame[3..3 + byte_count].chunks_exact(2) {
            registers
                .try_push(u16::from_be_bytes([pair[0], pair[1]]))
                .map_err(|_| BusError::BufferOverflow { needed: usize::from(count), got: MAX_REGISTERS })?;
        }

        let mut readings = Readings::new();
        let per_value = usize::from(self.block.encoding.registers_per_value());
        for chunk in registers.chunks_exact(per_value) {
            readings
                .push(self.block.encoding.decode(chunk))
                .map_err(|_| BusError::BufferOverflow { needed: readings.len() + 1, got: MAX_QUANTITIES })?;
        }
        Ok(readings)
    }

    // --- Core Transaction Logic ---
    fn transaction(
        &mut self,
        request: &[u8],
        response: &mut [u8],
        expected_len: usize,
    ) -> Result<usize, BusError<<IF as RtuSerial>::Error>> {
        self.interface
            .set_config(FrameFormat::Rtu8N1 { baud: self.baud })
            .map_err(BusError::Io)?;
        drain_input(&mut self.interface, |iface| iface.read_byte())?;
        self.interface.delay_us(timing::RTU_FRAME_GAP.as_micros() as u32);

        trace!("RTU >> {:02x?}", request);
        self.send_frame(request)?;
        let len = self.read_frame(response, expected_len)?;
        trace!("RTU << {:02x?}", &response[..len]);

        let frame = &response[..len];
        verify_rtu_frame(frame)?;
        if frame[0] != request[0] {
            return Err(BusError::UnexpectedResponse);
        }
        if frame[1] == request[1] | EXCEPTION_FLAG {
            warn!("Modbus slave {} exception {:#04x}", self.address.get(), frame[2]);
            return Err(BusError::ModbusException(frame[2]));
        }
        if frame[1] != request[1] {
            return Err(BusError::UnexpectedResponse);
        }
        Ok(len)
    }

    fn send_frame(&mut self, frame: &[u8]) -> Result<(), BusError<<IF as RtuSerial>::Error>> {
        self.interface.set_transmit(true).map_err(BusError::Io)?;

        let write_timeout = timing::RTU_CHAR_DURATION * frame.len() as u32 + Duration::from_millis(10);
        let result = frame.iter().try_for_each(|byte| {
            execute_blocking_io_with_timeout(&mut self.interface, write_timeout, |iface| {
                iface.write_byte(*byte)
            })
        });
        let result = result.and_then(|_| {
            execute_blocking_io_with_timeout(&mut self.interface, write_timeout, |iface| iface.flush())
        });

        // The line must go back to receive even when the write failed.
        self.interface.set_transmit(false).map_err(BusError::Io)?;
        result
    }

    /// Reads one response frame. Exception responses are five bytes long
    /// regardless of `expected_len`.
    fn read_frame(
        &mut self,
        buffer: &mut [u8],
        expected_len: usize,
    ) -> Result<usize, BusError<<IF as RtuSerial>::Error>> {
        if expected_len > buffer.len() {
            return Err(BusError::BufferOverflow { needed: expected_len, got: buffer.len() });
        }
        let next_byte_timeout = timing::RTU_FRAME_GAP + timing::RTU_CHAR_DURATION;

        let mut target = expected_len;
        let mut bytes_read = 0;
        while bytes_read < target {
            let timeout = if bytes_read == 0 { timing::RTU_RESPONSE_TIMEOUT } else { next_byte_timeout };
            match execute_blocking_io_with_timeout(&mut self.interface, timeout, |iface| {
                iface.read_byte()
            }) {
                Ok(byte) => {
                    buffer[bytes_read] = byte;
                    bytes_read += 1;
                    if bytes_read == 2 && byte & EXCEPTION_FLAG != 0 {
                        target = 5;
                    }
                }
                Err(BusError::Timeout) if bytes_read > 0 => return Err(BusError::InvalidFormat),
                Err(e) => return Err(e),
            }
        }
        Ok(bytes_read)
    }
}

fn append_crc<const N: usize>(frame: &mut ArrayVec<u8, N>) {
    let crc = calculate_modbus_crc(frame);
    frame.extend(crc.to_le_bytes());
}

impl<IF> ProtocolAdapter for ModbusAdapter<IF>
where
    IF: RtuSerial + BusTimer,
    <IF as RtuSerial>::Error: Debug,
{
    fn kind(&self) -> AdapterKind {
        AdapterKind::ModbusRtu
    }

    fn setup(&mut self) -> Result<(), AdapterError> {
        self.interface
            .set_config(FrameFormat::Rtu8N1 { baud: self.baud })
            .and_then(|_| self.interface.set_transmit(false))
            .map_err(|e| AdapterError::from(BusError::Io(e)))
    }

    fn request_measurement(
        &mut self,
        measurement_time: Duration,
    ) -> Result<MeasurementHandle, AdapterError> {
        if let Some(start) = self.start {
            self.write_single_register(start)?;
        }
        Ok(MeasurementHandle {
            ready_after: measurement_time,
            expected_values: Some(self.block.values),
        })
    }

    fn poll_result(
        &mut self,
        handle: &MeasurementHandle,
        elapsed: Duration,
    ) -> nb::Result<Readings, AdapterError> {
        if elapsed < handle.ready_after {
            return Err(nb::Error::WouldBlock);
        }
        self.read_holding_registers()
            .map_err(|e| nb::Error::Other(AdapterError::from(e)))
    }
}
