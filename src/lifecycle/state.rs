// src/lifecycle/state.rs

use core::fmt;

/// Phase of a sensor's measurement cycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Uninitialized,
    PowerRequested,
    WarmingUp,
    Stabilizing,
    MeasurementTriggered,
    AwaitingResult,
    Averaging,
    Failed,
    Complete,
    PowerDown,
}

impl LifecycleState {
    /// States in which the sensor may perform bus I/O.
    pub fn needs_bus(&self) -> bool {
        matches!(self, LifecycleState::MeasurementTriggered | LifecycleState::AwaitingResult)
    }

    /// A cycle is in progress.
    pub fn is_active(&self) -> bool {
        !matches!(
            self,
            LifecycleState::Uninitialized | LifecycleState::Complete | LifecycleState::PowerDown
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Uninitialized => "Uninitialized",
            LifecycleState::PowerRequested => "PowerRequested",
            LifecycleState::WarmingUp => "WarmingUp",
            LifecycleState::Stabilizing => "Stabilizing",
            LifecycleState::MeasurementTriggered => "MeasurementTriggered",
            LifecycleState::AwaitingResult => "AwaitingResult",
            LifecycleState::Averaging => "Averaging",
            LifecycleState::Failed => "Failed",
            LifecycleState::Complete => "Complete",
            LifecycleState::PowerDown => "PowerDown",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one `step`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StepStatus {
    /// No cycle in progress.
    Idle,
    /// The current phase is still running (time not elapsed, result pending,
    /// or bus busy).
    Waiting,
    /// Entered the given state.
    Advanced(LifecycleState),
    /// The cycle has finished; the reading is published.
    Complete,
}
