// src/variable.rs

//! Named physical quantities bound to one slot of a sensor's result buffer.

use crate::aggregate::{self, Rendered, MAX_RESOLUTION};
use crate::common::{ConfigError, VariableError};
use crate::scheduler::SensorId;

/// Static description of one quantity a device reports.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct QuantitySpec {
    /// Slot in the parent sensor's result buffer.
    pub index: u8,
    /// Physical quantity, e.g. `"temperature"`.
    pub name: &'static str,
    pub unit: &'static str,
    /// Fractional digits used when rendering.
    pub resolution: u8,
    /// Short variable code, e.g. `"SoilTemp"`.
    pub code: &'static str,
}

impl QuantitySpec {
    pub const fn new(
        index: u8,
        name: &'static str,
        unit: &'static str,
        resolution: u8,
        code: &'static str,
    ) -> Self {
        QuantitySpec { index, name, unit, resolution, code }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resolution > MAX_RESOLUTION {
            return Err(ConfigError::ResolutionTooLarge { resolution: self.resolution, max: MAX_RESOLUTION });
        }
        Ok(())
    }
}

/// Read access to one sensor's current values.
pub trait QuantitySource {
    fn quantity_count(&self) -> usize;

    /// Published value after completion, partial mean before; `None` if undefined.
    fn quantity(&self, index: usize) -> Option<f32>;
}

/// Resolves [`SensorId`]s to sensors, implemented by the scheduler.
pub trait SensorRegistry {
    fn lookup(&self, id: SensorId) -> Option<&dyn QuantitySource>;
}

/// A quantity slot, optionally bound to a sensor by id.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Variable {
    spec: QuantitySpec,
    uuid: Option<&'static str>,
    sensor: Option<SensorId>,
}

impl Variable {
    /// Creates an unbound variable.
    pub fn new(spec: QuantitySpec, uuid: Option<&'static str>) -> Result<Self, ConfigError> {
        spec.validate()?;
        Ok(Variable { spec, uuid, sensor: None })
    }

    /// Creates a variable bound to `sensor`.
    pub fn bound<R: SensorRegistry + ?Sized>(
        spec: QuantitySpec,
        uuid: Option<&'static str>,
        sensor: SensorId,
        registry: &R,
    ) -> Result<Self, VariableError> {
        let mut variable = Variable::new(spec, uuid)?;
        variable.bind(sensor, registry)?;
        Ok(variable)
    }

    /// Binds to `sensor`, checking the index against its quantity count.
    ///
    /// A failed bind leaves the previous binding in place.
    pub fn bind<R: SensorRegistry + ?Sized>(
        &mut self,
        sensor: SensorId,
        registry: &R,
    ) -> Result<(), VariableError> {
        let source = registry.lookup(sensor).ok_or(VariableError::UnknownSensor)?;
        let count = source.quantity_count();
        if usize::from(self.spec.index) >= count {
            return Err(ConfigError::QuantityIndexOutOfRange { index: self.spec.index, count }.into());
        }
        self.sensor = Some(sensor);
        Ok(())
    }

    pub fn unbind(&mut self) {
        self.sensor = None;
    }

    pub fn is_bound(&self) -> bool {
        self.sensor.is_some()
    }

    pub fn sensor(&self) -> Option<SensorId> {
        self.sensor
    }

    pub fn spec(&self) -> &QuantitySpec {
        &self.spec
    }

    pub fn code(&self) -> &'static str {
        self.spec.code
    }

    pub fn uuid(&self) -> Option<&'static str> {
        self.uuid
    }

    pub fn unit(&self) -> &'static str {
        self.spec.unit
    }

    pub fn resolution(&self) -> u8 {
        self.spec.resolution
    }

    pub fn index(&self) -> u8 {
        self.spec.index
    }

    /// Current value of the bound quantity.
    ///
    /// Before the sensor completes this is the partial running mean; check the
    /// sensor state when only finished readings are wanted.
    pub fn read<R: SensorRegistry + ?Sized>(&self, registry: &R) -> Result<Option<f32>, VariableError> {
        let id = self.sensor.ok_or(VariableError::Unbound)?;
        let source = registry.lookup(id).ok_or(VariableError::UnknownSensor)?;
        Ok(self.read_from(source))
    }

    /// Reads directly from a sensor, bypassing the binding.
    pub fn read_from(&self, source: &dyn QuantitySource) -> Option<f32> {
        source.quantity(usize::from(self.spec.index))
    }

    /// Current value rendered with the configured resolution.
    pub fn render<R: SensorRegistry + ?Sized>(&self, registry: &R) -> Result<Rendered, VariableError> {
        self.read(registry).map(|value| aggregate::render(value, self.spec.resolution))
    }
}
