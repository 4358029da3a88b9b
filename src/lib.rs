// src/lib.rs

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod aggregate;
pub mod common;
pub mod lifecycle;
pub mod profiles;
pub mod protocol;
pub mod scheduler;
pub mod variable;

// Re-export key types for convenience
pub use common::{
    AdapterError, BusError, BusId, Clock, ConfigError, ModbusAddr, PowerControl, Readings,
    Sdi12Addr, VariableError,
};
pub use lifecycle::{
    DebugConfig, LifecycleOptions, LifecycleState, ManagedSensor, PowerPins, Sensor, SensorConfig,
    StepStatus, TimingProfile,
};
pub use profiles::DeviceProfile;
pub use protocol::{MeasurementHandle, ProtocolAdapter};
pub use scheduler::{Scheduler, SensorId, TickSummary};
pub use variable::{QuantitySource, QuantitySpec, SensorRegistry, Variable};
