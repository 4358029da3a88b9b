// src/scheduler.rs

//! Cooperative multi-sensor loop with per-bus mutual exclusion.
//!
//! Sensors are stepped in registration order. A sensor in
//! `MeasurementTriggered` or `AwaitingResult` owns its bus; another sensor on
//! the same bus that reaches those states is held back until the owner
//! leaves them. Sensors on different buses progress within the same tick.

use crate::common::{AdapterError, BusId, Clock, ConfigError};
use crate::lifecycle::{LifecycleState, ManagedSensor, StepStatus};
use crate::variable::{QuantitySource, SensorRegistry};
use log::{debug, trace};

/// Stable handle to a registered sensor.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SensorId(u8);

impl SensorId {
    pub const fn new(index: u8) -> Self {
        SensorId(index)
    }

    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Per-tick counts returned by [`Scheduler::tick`].
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Sensors whose `step` was called.
    pub stepped: usize,
    /// Sensors held back because another sensor owns their bus.
    pub blocked: usize,
    /// Sensors in `Complete` after the tick.
    pub complete: usize,
}

struct Slot<'a, I> {
    sensor: &'a mut dyn ManagedSensor<I>,
    active: bool,
}

/// Drives up to `N` sensors from one control loop.
pub struct Scheduler<'a, I, const N: usize> {
    slots: heapless::Vec<Slot<'a, I>, N>,
    bus_owners: heapless::LinearMap<BusId, SensorId, N>,
}

impl<'a, I: Copy, const N: usize> Scheduler<'a, I, N> {
    pub fn new() -> Self {
        Scheduler { slots: heapless::Vec::new(), bus_owners: heapless::LinearMap::new() }
    }

    /// Adds a sensor. Ids are assigned in registration order.
    pub fn register(&mut self, sensor: &'a mut dyn ManagedSensor<I>) -> Result<SensorId, ConfigError> {
        let id = u8::try_from(self.slots.len()).map_err(|_| ConfigError::SchedulerFull)?;
        self.slots
            .push(Slot { sensor, active: true })
            .map_err(|_| ConfigError::SchedulerFull)?;
        Ok(SensorId(id))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn state(&self, id: SensorId) -> Option<LifecycleState> {
        self.slots.get(id.index()).map(|slot| slot.sensor.state())
    }

    /// Current owner of `bus`, if a sensor is mid-transaction on it.
    pub fn bus_owner(&self, bus: BusId) -> Option<SensorId> {
        self.bus_owners.get(&bus).copied()
    }

    /// Runs `setup` on every sensor; the first failure is returned after all
    /// sensors have been set up.
    pub fn setup_all(&mut self) -> Result<(), (SensorId, AdapterError)> {
        let mut first_error = None;
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if let Err(e) = slot.sensor.setup() {
                first_error.get_or_insert((SensorId(i as u8), e));
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Starts a cycle on every active sensor that is not already running one.
    pub fn begin_all(&mut self, now: I) {
        for slot in self.slots.iter_mut().filter(|slot| slot.active) {
            slot.sensor.begin_measurement_cycle(now);
        }
    }

    /// Starts a cycle on one sensor, re-activating it if it was retired.
    pub fn begin(&mut self, id: SensorId, now: I) -> bool {
        match self.slots.get_mut(id.index()) {
            Some(slot) => {
                slot.active = true;
                slot.sensor.begin_measurement_cycle(now)
            }
            None => false,
        }
    }

    /// Steps every active sensor once, in registration order.
    pub fn tick(&mut self, now: I) -> TickSummary {
        let mut summary = TickSummary::default();

        for i in 0..self.slots.len() {
            let id = SensorId(i as u8);
            let slot = &mut self.slots[i];
            if !slot.active {
                continue;
            }

            let bus = slot.sensor.bus();
            if let Some(bus) = bus {
                if slot.sensor.holds_bus() {
                    match self.bus_owners.get(&bus) {
                        Some(owner) if *owner != id => {
                            trace!("{} waiting for {}", slot.sensor.name(), bus);
                            summary.blocked += 1;
                            continue;
                        }
                        Some(_) => {}
                        None => {
                            // The map holds at most one entry per sensor.
                            let _ = self.bus_owners.insert(bus, id);
                        }
                    }
                }
            }

            let status = slot.sensor.step(now);
            summary.stepped += 1;
            if status == StepStatus::Complete {
                summary.complete += 1;
            }

            if let Some(bus) = bus {
                let owns = self.bus_owners.get(&bus) == Some(&id);
                let needs = slot.sensor.holds_bus();
                if needs && !owns && !self.bus_owners.contains_key(&bus) {
                    let _ = self.bus_owners.insert(bus, id);
                } else if !needs && owns {
                    self.bus_owners.remove(&bus);
                }
            }
        }

        summary
    }

    /// [`tick`](Self::tick) at the clock's current instant.
    pub fn poll<C: Clock<Instant = I>>(&mut self, clock: &C) -> TickSummary {
        self.tick(clock.now())
    }

    /// Every active sensor has finished its cycle.
    pub fn all_complete(&self) -> bool {
        self.slots
            .iter()
            .filter(|slot| slot.active)
            .all(|slot| slot.sensor.state() == LifecycleState::Complete)
    }

    /// Stops polling a sensor: powers it down and frees its bus.
    pub fn retire(&mut self, id: SensorId) -> bool {
        let Some(slot) = self.slots.get_mut(id.index()) else {
            return false;
        };
        debug!("retiring {}", slot.sensor.name());
        slot.sensor.power_down();
        slot.active = false;
        if let Some(bus) = slot.sensor.bus() {
            if self.bus_owners.get(&bus) == Some(&id) {
                self.bus_owners.remove(&bus);
            }
        }
        true
    }

    pub fn retire_all(&mut self) {
        for i in 0..self.slots.len() {
            self.retire(SensorId(i as u8));
        }
    }
}

impl<I: Copy, const N: usize> Default for Scheduler<'_, I, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I, const N: usize> SensorRegistry for Scheduler<'_, I, N> {
    fn lookup(&self, id: SensorId) -> Option<&dyn QuantitySource> {
        self.slots.get(id.index()).map(|slot| slot.sensor.as_quantity_source())
    }
}
