// src/lifecycle/config.rs

use crate::common::{timing, BusId, ConfigError, MAX_QUANTITIES};
use core::time::Duration;

/// Device-specific phase durations.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TimingProfile {
    /// Power-on until the device's internal state is valid.
    pub warm_up: Duration,
    /// Warm-up end until readings are trustworthy.
    pub stabilization: Duration,
    /// Worst case between trigger and result.
    pub measurement: Duration,
}

impl TimingProfile {
    pub const fn from_millis(warm_up: u64, stabilization: u64, measurement: u64) -> Self {
        TimingProfile {
            warm_up: Duration::from_millis(warm_up),
            stabilization: Duration::from_millis(stabilization),
            measurement: Duration::from_millis(measurement),
        }
    }
}

/// Supply pins switched for a sensor. No pin means always powered.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct PowerPins {
    pub primary: Option<u8>,
    /// Separate supply for an adapter or level shifter.
    pub secondary: Option<u8>,
}

impl PowerPins {
    pub const ALWAYS_ON: PowerPins = PowerPins { primary: None, secondary: None };

    pub const fn single(pin: u8) -> Self {
        PowerPins { primary: Some(pin), secondary: None }
    }

    /// Builds from signed pin numbers where any negative value means "no pin".
    pub fn from_raw(primary: i8, secondary: i8) -> Self {
        PowerPins {
            primary: u8::try_from(primary).ok(),
            secondary: u8::try_from(secondary).ok(),
        }
    }

    pub fn is_switched(&self) -> bool {
        self.primary.is_some() || self.secondary.is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> {
        self.primary.into_iter().chain(self.secondary)
    }
}

/// Per-sensor log verbosity.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum DebugConfig {
    #[default]
    Off,
    /// Log every state transition.
    Transitions,
    /// Also log every waiting step.
    Verbose,
}

/// Retry and timeout policy of one sensor.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LifecycleOptions {
    /// Failed samples re-attempted per cycle before publishing "no data".
    pub retry_budget: u8,
    /// Added to the measurement duration before a pending result times out.
    pub grace: Duration,
    pub debug: DebugConfig,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        LifecycleOptions {
            retry_budget: timing::DEFAULT_RETRY_BUDGET,
            grace: timing::MEASUREMENT_GRACE,
            debug: DebugConfig::Off,
        }
    }
}

/// Immutable construction parameters of a sensor.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SensorConfig {
    pub name: &'static str,
    /// Shared bus the sensor talks on; `None` for a dedicated line.
    pub bus: Option<BusId>,
    pub quantity_count: usize,
    /// Samples folded into one published reading.
    pub averaging: u8,
    pub timing: TimingProfile,
    pub power: PowerPins,
    pub options: LifecycleOptions,
}

impl SensorConfig {
    pub fn new(name: &'static str, quantity_count: usize, timing: TimingProfile) -> Self {
        SensorConfig {
            name,
            bus: None,
            quantity_count,
            averaging: 1,
            timing,
            power: PowerPins::ALWAYS_ON,
            options: LifecycleOptions::default(),
        }
    }

    pub fn with_bus(mut self, bus: BusId) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn with_averaging(mut self, averaging: u8) -> Self {
        self.averaging = averaging;
        self
    }

    pub fn with_power(mut self, power: PowerPins) -> Self {
        self.power = power;
        self
    }

    pub fn with_options(mut self, options: LifecycleOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_debug(mut self, debug: DebugConfig) -> Self {
        self.options.debug = debug;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.averaging == 0 {
            return Err(ConfigError::ZeroAveragingCount);
        }
        if self.quantity_count == 0 {
            return Err(ConfigError::NoQuantities);
        }
        if self.quantity_count > MAX_QUANTITIES {
            return Err(ConfigError::TooManyQuantities { count: self.quantity_count, max: MAX_QUANTITIES });
        }
        Ok(())
    }

    /// Longest a single result may stay pending.
    pub(crate) fn result_timeout(&self, announced: Duration) -> Duration {
        self.timing.measurement.max(announced) + self.options.grace
    }
}
