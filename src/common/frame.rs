// src/common/frame.rs

/// Serial frame formats used by the addressed serial adapters.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FrameFormat {
    /// Standard SDI-12 format: 1200 baud, 7 data bits, Even parity, 1 stop bit.
    Sdi12_7e1,
    /// Modbus-RTU format: 8 data bits, No parity, 1 stop bit at the configured baud rate.
    Rtu8N1 { baud: u32 },
}
