// tests/common/mod.rs
#![allow(dead_code)]

use core::time::Duration;
use modsense::protocol::AdapterKind;
use modsense::{AdapterError, MeasurementHandle, PowerControl, ProtocolAdapter, Readings};
use std::cell::Cell;
use std::collections::VecDeque;

/// Millisecond instant driven by the test.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ms(pub u64);

impl core::ops::Add<Duration> for Ms {
    type Output = Self;
    fn add(self, rhs: Duration) -> Self {
        Ms(self.0 + rhs.as_millis() as u64)
    }
}

impl core::ops::Sub<Ms> for Ms {
    type Output = Duration;
    fn sub(self, rhs: Ms) -> Duration {
        Duration::from_millis(self.0.saturating_sub(rhs.0))
    }
}

/// Manually advanced clock.
#[derive(Debug, Default)]
pub struct MockClock(Cell<u64>);

impl MockClock {
    pub fn advance(&self, ms: u64) {
        self.0.set(self.0.get() + ms);
    }

    pub fn now_ms(&self) -> u64 {
        self.0.get()
    }
}

impl modsense::Clock for MockClock {
    type Instant = Ms;
    fn now(&self) -> Ms {
        Ms(self.0.get())
    }
}

/// What the scripted device does for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Ready once the measurement time has passed.
    Values(Vec<Option<f32>>),
    /// Fails once the measurement time has passed.
    Fail(AdapterError),
    /// Request itself is rejected.
    Reject(AdapterError),
    /// Never becomes ready.
    Silent,
}

/// Adapter replaying a fixed script; requests past the end of the script
/// repeat the last entry.
#[derive(Debug, Default)]
pub struct ScriptedAdapter {
    script: VecDeque<Reply>,
    last: Option<Reply>,
    current: Option<Reply>,
    pub requests: u32,
    pub polls: u32,
}

impl ScriptedAdapter {
    pub fn new(script: Vec<Reply>) -> Self {
        ScriptedAdapter { script: script.into(), ..Default::default() }
    }

    pub fn always(reply: Reply) -> Self {
        ScriptedAdapter { last: Some(reply), ..Default::default() }
    }
}

impl ProtocolAdapter for ScriptedAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::PointToPoint
    }

    fn request_measurement(&mut self, measurement_time: Duration) -> Result<MeasurementHandle, AdapterError> {
        self.requests += 1;
        let reply = match self.script.pop_front() {
            Some(reply) => {
                self.last = Some(reply.clone());
                Some(reply)
            }
            None => self.last.clone(),
        };
        if let Some(Reply::Reject(e)) = reply {
            return Err(e);
        }
        self.current = reply;
        Ok(MeasurementHandle { ready_after: measurement_time, expected_values: None })
    }

    fn poll_result(&mut self, handle: &MeasurementHandle, elapsed: Duration) -> nb::Result<Readings, AdapterError> {
        self.polls += 1;
        if elapsed < handle.ready_after {
            return Err(nb::Error::WouldBlock);
        }
        match &self.current {
            Some(Reply::Values(values)) => Ok(Readings::from_slice(values).expect("too many values")),
            Some(Reply::Fail(e)) | Some(Reply::Reject(e)) => Err(nb::Error::Other(*e)),
            Some(Reply::Silent) => Err(nb::Error::WouldBlock),
            None => Err(nb::Error::Other(AdapterError::NoResponse)),
        }
    }
}

/// Power switch recording every call.
#[derive(Debug, Default)]
pub struct RecordingPower {
    pub calls: Vec<(u8, bool)>,
}

impl PowerControl for RecordingPower {
    type Error = core::convert::Infallible;
    fn set_power(&mut self, pin: u8, on: bool) -> Result<(), Self::Error> {
        self.calls.push((pin, on));
        Ok(())
    }
}
