// src/lifecycle/mod.rs

//! Non-blocking measurement lifecycle of a single sensor.
//!
//! `Uninitialized -> PowerRequested -> WarmingUp -> Stabilizing ->
//! MeasurementTriggered -> AwaitingResult -> {Averaging | Failed}`, looping back
//! to `MeasurementTriggered` until the averaging count is reached, then
//! `Complete`. `PowerDown` returns the sensor to `Uninitialized`.
//!
//! Each [`Sensor::step`] advances at most one phase. Waiting is a comparison
//! of `now` against the phase-entry instant, never a sleep.

mod config;
mod state;

pub use config::{DebugConfig, LifecycleOptions, PowerPins, SensorConfig, TimingProfile};
pub use state::{LifecycleState, StepStatus};

use crate::aggregate::ResultBuffer;
use crate::common::{AdapterError, BusId, ConfigError, MonotonicInstant, PowerControl};
use crate::protocol::{MeasurementHandle, ProtocolAdapter};
use crate::variable::QuantitySource;
use log::{debug, error, trace, warn};

/// Object-safe view of a sensor used by the scheduler.
pub trait ManagedSensor<I> {
    fn name(&self) -> &str;
    fn bus(&self) -> Option<BusId>;
    fn state(&self) -> LifecycleState;
    /// The sensor must keep its bus lock: it is talking on the bus, or a
    /// failed sample will be re-triggered.
    fn holds_bus(&self) -> bool {
        self.state().needs_bus()
    }
    fn setup(&mut self) -> Result<(), AdapterError>;
    fn begin_measurement_cycle(&mut self, now: I) -> bool;
    fn step(&mut self, now: I) -> StepStatus;
    fn power_down(&mut self);
    fn as_quantity_source(&self) -> &dyn QuantitySource;
}

#[derive(Debug, Copy, Clone)]
struct PendingRequest<I> {
    handle: MeasurementHandle,
    issued_at: I,
}

/// One physical sensor: configuration, adapter, power switch and results.
#[derive(Debug)]
pub struct Sensor<A, P, I> {
    config: SensorConfig,
    adapter: A,
    power: P,
    state: LifecycleState,
    phase_entered: Option<I>,
    request: Option<PendingRequest<I>>,
    retries: u8,
    last_error: Option<AdapterError>,
    results: ResultBuffer,
}

impl<A, P, I> Sensor<A, P, I>
where
    A: ProtocolAdapter,
    P: PowerControl,
    I: MonotonicInstant,
{
    pub fn new(config: SensorConfig, adapter: A, power: P) -> Result<Self, ConfigError> {
        config.validate()?;
        let results = ResultBuffer::new(config.quantity_count)?;
        Ok(Sensor {
            config,
            adapter,
            power,
            state: LifecycleState::Uninitialized,
            phase_entered: None,
            request: None,
            retries: 0,
            last_error: None,
            results,
        })
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == LifecycleState::Complete
    }

    /// Retries spent in the current cycle.
    pub fn retries(&self) -> u8 {
        self.retries
    }

    pub fn last_error(&self) -> Option<AdapterError> {
        self.last_error
    }

    pub fn results(&self) -> &ResultBuffer {
        &self.results
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    pub fn power(&self) -> &P {
        &self.power
    }

    /// Published value once complete, otherwise the partial mean.
    pub fn get_quantity(&self, index: usize) -> Option<f32> {
        self.results.value(index)
    }

    /// One-time adapter initialization.
    pub fn setup(&mut self) -> Result<(), AdapterError> {
        let result = self.adapter.setup();
        match result {
            Ok(()) => debug!("{}: setup complete", self.config.name),
            Err(e) => error!("{}: setup failed: {}", self.config.name, e),
        }
        result
    }

    /// Starts a new cycle. Returns `false` if one is already running.
    ///
    /// From `Complete` the sensor is still powered and settled, so the new
    /// cycle starts directly at `MeasurementTriggered`.
    pub fn begin_measurement_cycle(&mut self, now: I) -> bool {
        let next = match self.state {
            LifecycleState::Complete => LifecycleState::MeasurementTriggered,
            LifecycleState::Uninitialized | LifecycleState::PowerDown => {
                if self.config.power.is_switched() {
                    LifecycleState::PowerRequested
                } else {
                    LifecycleState::WarmingUp
                }
            }
            state => {
                if self.config.options.debug >= DebugConfig::Verbose {
                    trace!("{}: cycle already running in {}", self.config.name, state);
                }
                return false;
            }
        };

        self.results.reset();
        self.retries = 0;
        self.last_error = None;
        self.request = None;
        self.enter(next, now);
        true
    }

    /// Advances by at most one phase.
    pub fn step(&mut self, now: I) -> StepStatus {
        match self.state {
            LifecycleState::Uninitialized | LifecycleState::PowerDown => StepStatus::Idle,
            LifecycleState::Complete => StepStatus::Complete,
            LifecycleState::PowerRequested => {
                self.switch_power(true);
                self.advance(LifecycleState::WarmingUp, now)
            }
            LifecycleState::WarmingUp => {
                if self.elapsed(now) >= self.config.timing.warm_up {
                    self.advance(LifecycleState::Stabilizing, now)
                } else {
                    self.waiting()
                }
            }
            LifecycleState::Stabilizing => {
                if self.elapsed(now) >= self.config.timing.stabilization {
                    self.advance(LifecycleState::MeasurementTriggered, now)
                } else {
                    self.waiting()
                }
            }
            LifecycleState::MeasurementTriggered => self.trigger(now),
            LifecycleState::AwaitingResult => self.await_result(now),
            LifecycleState::Averaging => {
                if self.results.samples() >= self.config.averaging {
                    self.results.publish();
                    self.enter(LifecycleState::Complete, now);
                    StepStatus::Complete
                } else {
                    self.advance(LifecycleState::MeasurementTriggered, now)
                }
            }
            LifecycleState::Failed => self.handle_failure(now),
        }
    }

    /// Stops the sensor: switches power off, releases the adapter and returns
    /// to `Uninitialized`.
    ///
    /// A cycle interrupted before `Complete` publishes nothing; a completed
    /// reading stays readable until the next cycle begins.
    pub fn power_down(&mut self) {
        if self.state == LifecycleState::Uninitialized {
            return;
        }
        if self.state != LifecycleState::Complete {
            self.results.reset();
        }
        self.transition(LifecycleState::PowerDown);
        self.adapter.release();
        self.switch_power(false);
        self.request = None;
        self.phase_entered = None;
        self.transition(LifecycleState::Uninitialized);
    }

    /// Powers down and forgets any published reading.
    pub fn reset(&mut self) {
        self.power_down();
        self.results.reset();
        self.retries = 0;
        self.last_error = None;
    }

    fn trigger(&mut self, now: I) -> StepStatus {
        match self.adapter.request_measurement(self.config.timing.measurement) {
            Ok(handle) => {
                self.request = Some(PendingRequest { handle, issued_at: now });
                self.advance(LifecycleState::AwaitingResult, now)
            }
            Err(AdapterError::BusBusy) => self.waiting(),
            Err(e) => self.fail(e, now),
        }
    }

    fn await_result(&mut self, now: I) -> StepStatus {
        let Some(request) = self.request else {
            return self.fail(AdapterError::NoResponse, now);
        };
        let elapsed = now - request.issued_at;

        match self.adapter.poll_result(&request.handle, elapsed) {
            Ok(readings) => {
                self.request = None;
                if self.config.options.debug >= DebugConfig::Verbose {
                    trace!("{}: readings {:?}", self.config.name, readings.as_slice());
                }
                match self.results.fold(&readings) {
                    Ok(()) => self.advance(LifecycleState::Averaging, now),
                    Err(e) => self.fail(e, now),
                }
            }
            // A busy bus while polling is still pending, and still bounded by the timeout.
            Err(nb::Error::WouldBlock) | Err(nb::Error::Other(AdapterError::BusBusy)) => {
                if elapsed > self.config.result_timeout(request.handle.ready_after) {
                    self.request = None;
                    self.fail(AdapterError::Timeout, now)
                } else {
                    self.waiting()
                }
            }
            Err(nb::Error::Other(e)) => {
                self.request = None;
                self.fail(e, now)
            }
        }
    }

    fn handle_failure(&mut self, now: I) -> StepStatus {
        if self.retries < self.config.options.retry_budget {
            self.retries += 1;
            self.advance(LifecycleState::MeasurementTriggered, now)
        } else {
            error!(
                "{}: retry budget of {} exhausted, publishing no data",
                self.config.name, self.config.options.retry_budget
            );
            self.results.clear_samples();
            self.results.publish_undefined();
            self.enter(LifecycleState::Complete, now);
            StepStatus::Complete
        }
    }

    fn fail(&mut self, error: AdapterError, now: I) -> StepStatus {
        warn!(
            "{}: sample failed ({}), retry {}/{}",
            self.config.name, error, self.retries, self.config.options.retry_budget
        );
        self.last_error = Some(error);
        self.advance(LifecycleState::Failed, now)
    }

    fn switch_power(&mut self, on: bool) {
        for pin in self.config.power.iter() {
            if let Err(e) = self.power.set_power(pin, on) {
                error!("{}: switching power pin {} failed: {:?}", self.config.name, pin, e);
            }
        }
    }

    fn elapsed(&self, now: I) -> core::time::Duration {
        match self.phase_entered {
            Some(entered) if now > entered => now - entered,
            _ => core::time::Duration::ZERO,
        }
    }

    fn advance(&mut self, next: LifecycleState, now: I) -> StepStatus {
        self.enter(next, now);
        StepStatus::Advanced(next)
    }

    fn enter(&mut self, next: LifecycleState, now: I) {
        self.transition(next);
        self.phase_entered = Some(now);
    }

    fn transition(&mut self, next: LifecycleState) {
        if self.config.options.debug >= DebugConfig::Transitions {
            debug!("{}: {} -> {}", self.config.name, self.state, next);
        }
        self.state = next;
    }

    fn waiting(&self) -> StepStatus {
        if self.config.options.debug >= DebugConfig::Verbose {
            trace!("{}: waiting in {}", self.config.name, self.state);
        }
        StepStatus::Waiting
    }
}

impl<A, P, I> QuantitySource for Sensor<A, P, I>
where
    A: ProtocolAdapter,
    P: PowerControl,
    I: MonotonicInstant,
{
    fn quantity_count(&self) -> usize {
        self.results.quantity_count()
    }

    fn quantity(&self, index: usize) -> Option<f32> {
        self.get_quantity(index)
    }
}

impl<A, P, I> ManagedSensor<I> for Sensor<A, P, I>
where
    A: ProtocolAdapter,
    P: PowerControl,
    I: MonotonicInstant,
{
    fn name(&self) -> &str {
        self.config.name
    }

    fn bus(&self) -> Option<BusId> {
        self.config.bus
    }

    fn state(&self) -> LifecycleState {
        self.state
    }

    fn holds_bus(&self) -> bool {
        self.state.needs_bus()
            || (self.state == LifecycleState::Failed && self.retries < self.config.options.retry_budget)
    }

    fn setup(&mut self) -> Result<(), AdapterError> {
        Sensor::setup(self)
    }

    fn begin_measurement_cycle(&mut self, now: I) -> bool {
        Sensor::begin_measurement_cycle(self, now)
    }

    fn step(&mut self, now: I) -> StepStatus {
        Sensor::step(self, now)
    }

    fn power_down(&mut self) {
        Sensor::power_down(self)
    }

    fn as_quantity_source(&self) -> &dyn QuantitySource {
        self
    }
}
