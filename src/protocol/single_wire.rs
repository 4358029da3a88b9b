// src/protocol/single_wire.rs

use super::{AdapterKind, MeasurementHandle, ProtocolAdapter};
use crate::common::{
    error::AdapterError,
    hal_traits::SingleWireBus,
    types::Readings,
};
use core::fmt::Debug;
use core::time::Duration;
use log::{trace, warn};

/// Largest frame a pulse-train device delivers.
pub const MAX_FRAME_LEN: usize = 16;

/// Turns a validated frame (checksum stripped) into readings.
///
/// Returns `None` when the frame content is implausible.
pub type FrameDecoder = fn(&[u8]) -> Option<Readings>;

/// Frame integrity check applied before decoding.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Checksum {
    None,
    /// Last byte equals the wrapping sum of all preceding bytes.
    Additive8,
}

impl Checksum {
    /// Validates `frame` and returns the payload without the checksum byte.
    pub fn strip<'f>(&self, frame: &'f [u8]) -> Option<&'f [u8]> {
        match self {
            Checksum::None => Some(frame),
            Checksum::Additive8 => {
                let (&received, payload) = frame.split_last()?;
                let sum = payload.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
                (sum == received).then_some(payload)
            }
        }
    }
}

/// Point-to-point adapter: one blocking frame exchange, no addressing.
pub struct SingleWireAdapter<B> {
    bus: B,
    frame_len: usize,
    checksum: Checksum,
    decoder: FrameDecoder,
}

impl<B: Debug> Debug for SingleWireAdapter<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SingleWireAdapter")
            .field("bus", &self.bus)
            .field("frame_len", &self.frame_len)
            .field("checksum", &self.checksum)
            .finish_non_exhaustive()
    }
}

impl<B> SingleWireAdapter<B>
where
    B: SingleWireBus,
{
    /// `frame_len` is the full frame length including any checksum byte,
    /// clamped to [`MAX_FRAME_LEN`].
    pub fn new(bus: B, frame_len: usize, checksum: Checksum, decoder: FrameDecoder) -> Self {
        SingleWireAdapter { bus, frame_len: frame_len.min(MAX_FRAME_LEN), checksum, decoder }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    fn read_frame(&mut self) -> Result<Readings, AdapterError> {
        let mut frame = [0u8; MAX_FRAME_LEN];
        let received = self.bus.exchange(&mut frame[..self.frame_len]).map_err(|e| {
            warn!("single-wire exchange failed: {:?}", e);
            AdapterError::NoResponse
        })?;
        trace!("single-wire << {:02x?}", &frame[..received]);

        if received == 0 {
            return Err(AdapterError::NoResponse);
        }
        if received != self.frame_len {
            return Err(AdapterError::Malformed);
        }

        let payload = self.checksum.strip(&frame[..received]).ok_or(AdapterError::Malformed)?;
        (self.decoder)(payload).ok_or(AdapterError::Malformed)
    }
}

impl<B> ProtocolAdapter for SingleWireAdapter<B>
where
    B: SingleWireBus,
    B::Error: Debug,
{
    fn kind(&self) -> AdapterKind {
        AdapterKind::PointToPoint
    }

    fn request_measurement(
        &mut self,
        _measurement_time: Duration,
    ) -> Result<MeasurementHandle, AdapterError> {
        // The exchange itself is the trigger; it happens on the first poll.
        Ok(MeasurementHandle::immediate())
    }

    fn poll_result(
        &mut self,
        _handle: &MeasurementHandle,
        _elapsed: Duration,
    ) -> nb::Result<Readings, AdapterError> {
        self.read_frame().map_err(nb::Error::Other)
    }
}
