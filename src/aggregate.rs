// src/aggregate.rs

//! Per-sensor running averages and the published reading.

use crate::common::{AdapterError, ConfigError, Readings, MAX_QUANTITIES};
use core::fmt::Write;

/// Rendered form of an undefined quantity.
pub const UNDEFINED_SENTINEL: &str = "-9999";

/// Largest supported number of fractional digits.
pub const MAX_RESOLUTION: u8 = 7;

/// Fits the widest finite `f32` with [`MAX_RESOLUTION`] fractional digits.
pub const RENDER_CAPACITY: usize = 48;

pub type Rendered = heapless::String<RENDER_CAPACITY>;

#[derive(Debug, Copy, Clone, Default, PartialEq)]
struct Accumulator {
    sum: f64,
    count: u8,
}

impl Accumulator {
    fn mean(&self) -> Option<f32> {
        (self.count > 0).then(|| (self.sum / f64::from(self.count)) as f32)
    }
}

/// Fixed-size accumulator array, one slot per reported quantity.
///
/// The slot count is fixed at construction. `samples` counts folded
/// readings; each slot counts only the samples in which its quantity was
/// defined.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultBuffer {
    slots: heapless::Vec<Accumulator, MAX_QUANTITIES>,
    published: heapless::Vec<Option<f32>, MAX_QUANTITIES>,
    validity: u8,
    samples: u8,
    is_published: bool,
}

impl ResultBuffer {
    pub fn new(quantity_count: usize) -> Result<Self, ConfigError> {
        if quantity_count > MAX_QUANTITIES {
            return Err(ConfigError::TooManyQuantities { count: quantity_count, max: MAX_QUANTITIES });
        }
        let mut slots = heapless::Vec::new();
        let mut published = heapless::Vec::new();
        for _ in 0..quantity_count {
            // Capacity checked above.
            let _ = slots.push(Accumulator::default());
            let _ = published.push(None);
        }
        Ok(ResultBuffer { slots, published, validity: 0, samples: 0, is_published: false })
    }

    pub fn quantity_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of readings folded since the last reset.
    pub fn samples(&self) -> u8 {
        self.samples
    }

    /// Bit `i` is set once quantity `i` has at least one defined sample.
    pub fn validity(&self) -> u8 {
        self.validity
    }

    /// Folds one reading into the running sums.
    ///
    /// A reading with the wrong number of values is rejected whole and leaves
    /// the buffer untouched. Undefined and non-finite values are skipped.
    pub fn fold(&mut self, readings: &Readings) -> Result<(), AdapterError> {
        if readings.len() != self.slots.len() {
            return Err(AdapterError::Malformed);
        }
        for (i, (slot, value)) in self.slots.iter_mut().zip(readings.iter()).enumerate() {
            if let Some(v) = value.filter(|v| v.is_finite()) {
                slot.sum += f64::from(v);
                slot.count = slot.count.saturating_add(1);
                self.validity |= 1 << i;
            }
        }
        self.samples = self.samples.saturating_add(1);
        Ok(())
    }

    /// Running mean of quantity `index`; `None` before any defined sample.
    pub fn average(&self, index: usize) -> Option<f32> {
        self.slots.get(index).and_then(Accumulator::mean)
    }

    /// Freezes the current means as the published reading.
    pub fn publish(&mut self) {
        for (published, slot) in self.published.iter_mut().zip(self.slots.iter()) {
            *published = slot.mean();
        }
        self.is_published = true;
    }

    /// Publishes "no data": every quantity undefined.
    pub fn publish_undefined(&mut self) {
        self.published.iter_mut().for_each(|p| *p = None);
        self.is_published = true;
    }

    pub fn is_published(&self) -> bool {
        self.is_published
    }

    pub fn published(&self, index: usize) -> Option<f32> {
        self.published.get(index).copied().flatten()
    }

    /// Published value once frozen, otherwise the partial running mean.
    pub fn value(&self, index: usize) -> Option<f32> {
        if self.is_published {
            self.published(index)
        } else {
            self.average(index)
        }
    }

    /// Drops the running sums; the published reading is kept.
    pub fn clear_samples(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = Accumulator::default());
        self.validity = 0;
        self.samples = 0;
    }

    /// Drops everything, including the published reading.
    pub fn reset(&mut self) {
        self.clear_samples();
        self.publish_undefined();
        self.is_published = false;
    }
}

/// Renders `value` with exactly `resolution` fractional digits, or the
/// undefined sentinel.
pub fn render(value: Option<f32>, resolution: u8) -> Rendered {
    let mut out = Rendered::new();
    let resolution = usize::from(resolution.min(MAX_RESOLUTION));
    match value.filter(|v| v.is_finite()) {
        Some(v) => {
            if write!(out, "{:.*}", resolution, v).is_err() {
                out.clear();
                let _ = out.push_str(UNDEFINED_SENTINEL);
            }
        }
        None => {
            let _ = out.push_str(UNDEFINED_SENTINEL);
        }
    }
    out
}
