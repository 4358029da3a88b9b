// src/protocol/sdi12.rs

use super::io_helpers::{drain_input, execute_blocking_io_with_timeout};
use super::{AdapterKind, MeasurementHandle, ProtocolAdapter};
use crate::common::{
    address::Sdi12Addr,
    command::Command,
    crc::verify_response_crc_ascii,
    error::{AdapterError, BusError},
    hal_traits::{BusTimer, Sdi12Serial},
    response::{parse_data_values, parse_measurement_timing},
    timing,
    types::Readings,
    FrameFormat,
};
use arrayvec::ArrayVec;
use core::fmt::Debug;
use core::time::Duration;
use log::{trace, warn};

/// Longest response line accepted (`a` + 75 value characters + CRC + `<CR><LF>`).
const MAX_RESPONSE_LEN: usize = 96;

/// Highest `aDn!` index a sensor may spread its values over.
const MAX_DATA_INDEX: u8 = 9;

/// SDI-12 adapter for one sensor address on a (possibly shared) multidrop bus.
///
/// Command/response exchanges are bounded by SDI-12 line timing (tens of
/// milliseconds); the measurement delay the sensor announces in its `atttn`
/// reply is waited out by the lifecycle, never here.
#[derive(Debug)]
pub struct Sdi12Adapter<IF>
where
    IF: Sdi12Serial + BusTimer,
{
    interface: IF,
    address: Sdi12Addr,
    use_crc: bool,
    measurement_index: Option<u8>,
    last_activity_time: Option<IF::Instant>,
    service_request: ArrayVec<u8, 3>,
}

impl<IF> Sdi12Adapter<IF>
where
    IF: Sdi12Serial + BusTimer,
    IF::Error: Debug,
{
    pub fn new(interface: IF, address: Sdi12Addr) -> Self {
        Sdi12Adapter {
            interface,
            address,
            use_crc: false,
            measurement_index: None,
            last_activity_time: None,
            service_request: ArrayVec::new(),
        }
    }

    /// Requests CRC-protected data (`aMC!`) and verifies every data line.
    pub fn with_crc(mut self, use_crc: bool) -> Self {
        self.use_crc = use_crc;
        self
    }

    /// Uses the additional measurement `aMn!` (1..=9) instead of `aM!`.
    pub fn with_measurement_index(mut self, index: Option<u8>) -> Self {
        self.measurement_index = index;
        self
    }

    pub fn address(&self) -> Sdi12Addr {
        self.address
    }

    pub fn interface(&self) -> &IF {
        &self.interface
    }

    pub fn interface_mut(&mut self) -> &mut IF {
        &mut self.interface
    }

    fn start_command(&self) -> Command {
        if self.use_crc {
            Command::StartMeasurementCrc { address: self.address, index: self.measurement_index }
        } else {
            Command::StartMeasurement { address: self.address, index: self.measurement_index }
        }
    }

    /// Collects values with successive `aDn!` commands until `expected` have arrived.
    fn collect_data(&mut self, expected: usize) -> Result<Readings, BusError<IF::Error>> {
        let mut readings = Readings::new();
        let mut read_buffer = [0u8; MAX_RESPONSE_LEN];

        for data_index in 0..=MAX_DATA_INDEX {
            let cmd = Command::SendData { address: self.address, data_index };
            let payload = self.execute_transaction(&cmd, &mut read_buffer)?;
            let appended = parse_data_values(payload, &mut readings)
                .map_err(|_| BusError::InvalidFormat)?;

            if appended == 0 || readings.len() >= expected {
                break;
            }
        }

        if readings.len() != expected {
            warn!(
                "SDI-12 sensor {} returned {} values, announced {}",
                self.address,
                readings.len(),
                expected
            );
            return Err(BusError::InvalidFormat);
        }
        Ok(readings)
    }

    /// Non-blocking check for the `a<CR><LF>` service request a sensor sends when
    /// its data is ready before the announced time.
    fn service_request_received(&mut self) -> Result<bool, BusError<IF::Error>> {
        let expected = [self.address.as_byte(), b'\r', b'\n'];
        let mut seen = false;
        loop {
            match self.interface.read_byte() {
                Ok(byte) => {
                    // Sliding window over the last three bytes on the line.
                    if self.service_request.is_full() {
                        self.service_request.remove(0);
                    }
                    self.service_request.push(byte);
                    if self.service_request.as_slice() == &expected[..] {
                        seen = true;
                    }
                }
                Err(nb::Error::WouldBlock) => break,
                Err(nb::Error::Other(e)) => return Err(BusError::Io(e)),
            }
        }

        if seen {
            self.service_request.clear();
            self.last_activity_time = Some(self.interface.now());
        }
        Ok(seen)
    }

    // --- Core Transaction Logic ---
    fn execute_transaction<'buf>(
        &mut self,
        command: &Command,
        read_buffer: &'buf mut [u8],
    ) -> Result<&'buf [u8], BusError<IF::Error>> {
        self.check_and_send_break()?;
        let command_buffer = command.format_into().map_err(|_| BusError::InvalidFormat)?;
        trace!("SDI-12 >> {}", command_buffer.as_str());

        self.send_command_bytes(command_buffer.as_bytes())?;
        let line_len = self.read_response_line(read_buffer)?.len();
        let crc_expected = self.use_crc && matches!(command, Command::SendData { .. });
        let payload = strip_response(&read_buffer[..line_len], command.address(), crc_expected)?;

        self.last_activity_time = Some(self.interface.now());
        Ok(payload)
    }

    fn check_and_send_break(&mut self) -> Result<(), BusError<IF::Error>> {
        let now = self.interface.now();
        let break_needed = match self.last_activity_time {
            Some(last_time) => now - last_time > timing::PRE_COMMAND_BREAK_MARKING_THRESHOLD,
            None => true,
        };

        if break_needed {
            let break_timeout = timing::BREAK_DURATION_MIN + Duration::from_millis(5);
            execute_blocking_io_with_timeout(&mut self.interface, break_timeout, |iface| {
                iface.send_break()
            })?;
            self.interface.delay_us(timing::POST_BREAK_MARKING_MIN.as_micros() as u32);
            self.last_activity_time = Some(self.interface.now());
        }

        Ok(())
    }

    fn send_command_bytes(&mut self, cmd_bytes: &[u8]) -> Result<(), BusError<IF::Error>> {
        self.interface.set_config(FrameFormat::Sdi12_7e1).map_err(BusError::Io)?;
        // Stale bytes (late answers from another sensor) would corrupt our response.
        drain_input(&mut self.interface, |iface| iface.read_byte())?;

        let write_timeout = timing::BYTE_DURATION * cmd_bytes.len() as u32 + Duration::from_millis(20);
        for byte in cmd_bytes {
            execute_blocking_io_with_timeout(&mut self.interface, write_timeout, |iface| {
                iface.write_byte(*byte)
            })?;
        }

        let flush_timeout = Duration::from_millis(10);
        execute_blocking_io_with_timeout(&mut self.interface, flush_timeout, |iface| iface.flush())?;
        Ok(())
    }

    fn read_response_line<'buf>(
        &mut self,
        buffer: &'buf mut [u8],
    ) -> Result<&'buf [u8], BusError<IF::Error>> {
        let first_byte_timeout = timing::RESPONSE_START_TIME_MAX
            + timing::BYTE_DURATION * MAX_RESPONSE_LEN as u32
            + Duration::from_millis(50);
        let next_byte_timeout = timing::INTER_CHARACTER_MARKING_MAX
            + timing::BYTE_DURATION
            + Duration::from_millis(5);

        let mut bytes_read = 0;
        loop {
            if bytes_read >= buffer.len() {
                return Err(BusError::BufferOverflow { needed: bytes_read + 1, got: buffer.len() });
            }

            let timeout = if bytes_read == 0 { first_byte_timeout } else { next_byte_timeout };
            match execute_blocking_io_with_timeout(&mut self.interface, timeout, |iface| {
                iface.read_byte()
            }) {
                Ok(byte) => {
                    buffer[bytes_read] = byte;
                    bytes_read += 1;

                    if bytes_read >= 2 && buffer[bytes_read - 2..bytes_read] == *b"\r\n" {
                        return Ok(&buffer[..bytes_read]);
                    }
                }
                // Some bytes but no <CR><LF> in time is a framing problem, not silence.
                Err(BusError::Timeout) if bytes_read > 0 => return Err(BusError::InvalidFormat),
                Err(e) => return Err(e),
            }
        }
    }
}

/// Validates `<CR><LF>`, address and optional CRC of a response line and
/// returns the payload between the address and the CRC.
fn strip_response<E: Debug>(
    response_line: &[u8],
    expected_address: Sdi12Addr,
    crc_expected: bool,
) -> Result<&[u8], BusError<E>> {
    let without_crlf = response_line
        .strip_suffix(b"\r\n")
        .ok_or(BusError::InvalidFormat)?;
    let (&address_byte, _) = without_crlf.split_first().ok_or(BusError::InvalidFormat)?;

    let received_address_char = address_byte as char;
    let received_address = Sdi12Addr::new(received_address_char)
        .map_err(|_| BusError::InvalidAddress(received_address_char))?;
    if received_address != expected_address {
        return Err(BusError::UnexpectedResponse);
    }

    if crc_expected {
        if without_crlf.len() < 1 + 3 {
            return Err(BusError::InvalidFormat);
        }
        verify_response_crc_ascii(without_crlf)?;
        Ok(&without_crlf[1..without_crlf.len() - 3])
    } else {
        Ok(&without_crlf[1..])
    }
}

impl<IF> ProtocolAdapter for Sdi12Adapter<IF>
where
    IF: Sdi12Serial + BusTimer,
    IF::Error: Debug,
{
    fn kind(&self) -> AdapterKind {
        AdapterKind::Sdi12
    }

    /// Configures the line and checks the sensor answers `a!`.
    fn setup(&mut self) -> Result<(), AdapterError> {
        self.interface
            .set_config(FrameFormat::Sdi12_7e1)
            .map_err(|e| AdapterError::from(BusError::Io(e)))?;

        let mut read_buffer = [0u8; MAX_RESPONSE_LEN];
        let cmd = Command::AcknowledgeActive { address: self.address };
        let payload = self.execute_transaction(&cmd, &mut read_buffer)?;
        if !payload.is_empty() {
            warn!("SDI-12 sensor {} acknowledged with trailing data", self.address);
            return Err(AdapterError::Malformed);
        }
        Ok(())
    }

    fn request_measurement(
        &mut self,
        _measurement_time: Duration,
    ) -> Result<MeasurementHandle, AdapterError> {
        let cmd = self.start_command();
        let mut read_buffer = [0u8; MAX_RESPONSE_LEN];
        let payload = self.execute_transaction(&cmd, &mut read_buffer)?;
        let timing = parse_measurement_timing(self.address, payload)
            .map_err(|_| AdapterError::Malformed)?;

        if timing.values_count == 0 {
            warn!("SDI-12 sensor {} announced no values", self.address);
            return Err(AdapterError::Malformed);
        }

        self.service_request.clear();
        Ok(MeasurementHandle {
            ready_after: Duration::from_secs(u64::from(timing.time_seconds)),
            expected_values: Some(timing.values_count),
        })
    }

    fn poll_result(
        &mut self,
        handle: &MeasurementHandle,
        elapsed: Duration,
    ) -> nb::Result<Readings, AdapterError> {
        if elapsed < handle.ready_after {
            let early = self
                .service_request_received()
                .map_err(|e| nb::Error::Other(AdapterError::from(e)))?;
            if !early {
                return Err(nb::Error::WouldBlock);
            }
        }

        let expected = usize::from(handle.expected_values.unwrap_or(1));
        self.collect_data(expected)
            .map_err(|e| nb::Error::Other(AdapterError::from(e)))
    }

    fn release(&mut self) {
        self.service_request.clear();
    }
}
