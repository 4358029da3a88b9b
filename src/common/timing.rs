// src/common/timing.rs

use core::time::Duration;

// === Lifecycle ===

/// Added to a sensor's measurement duration before an outstanding request is
/// declared timed out.
pub const MEASUREMENT_GRACE: Duration = Duration::from_millis(500);

/// Number of failed samples a cycle may retry before the reading is published as missing.
pub const DEFAULT_RETRY_BUDGET: u8 = 3;

// === SDI-12 Break Timing (SDI-12 v1.4 Sec 7.0, 7.1) ===

/// Minimum duration for a valid break signal (recorder must send >= 12 ms).
pub const BREAK_DURATION_MIN: Duration = Duration::from_millis(12);
/// Marking time required after a break before sensor looks for an address.
pub const POST_BREAK_MARKING_MIN: Duration = Duration::from_micros(8330);

// === SDI-12 Command/Response Timing (Sec 7.0) ===

/// Maximum time from end of command stop bit to start bit of first response byte.
pub const RESPONSE_START_TIME_MAX: Duration = Duration::from_micros(15_400); // 15ms + 0.4ms tol
/// Maximum marking time allowed between characters in a command or response.
pub const INTER_CHARACTER_MARKING_MAX: Duration = Duration::from_micros(1660);
/// Time threshold after which a break *must* precede the next command.
pub const PRE_COMMAND_BREAK_MARKING_THRESHOLD: Duration = Duration::from_millis(87);

// === Byte Timing at 1200 Baud (7E1) ===
// 1 start + 7 data + 1 parity + 1 stop = 10 bits, 8.333 ms per byte

/// Nominal duration of a single byte (10 bits total) at 1200 baud (7E1 format).
pub const BYTE_DURATION: Duration = Duration::from_micros(8333);

// === Modbus-RTU (9600 baud 8N1) ===

/// Nominal duration of one 8N1 character at 9600 baud.
pub const RTU_CHAR_DURATION: Duration = Duration::from_micros(1042);
/// Silent interval (3.5 characters) marking the end of an RTU frame.
pub const RTU_FRAME_GAP: Duration = Duration::from_micros(3646);
/// Time a slave may take before the first byte of its answer.
pub const RTU_RESPONSE_TIMEOUT: Duration = Duration::from_millis(500);
