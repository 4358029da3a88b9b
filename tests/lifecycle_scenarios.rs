// tests/lifecycle_scenarios.rs

mod common;

use common::{Ms, RecordingPower, Reply, ScriptedAdapter};
use modsense::common::NoPower;
use modsense::{
    AdapterError, LifecycleOptions, LifecycleState, PowerPins, Sensor, SensorConfig, StepStatus,
    TimingProfile,
};

fn probe(timing: TimingProfile) -> SensorConfig {
    SensorConfig::new("probe", 1, timing)
}

#[test]
fn single_sample_published_after_warm_up_and_measurement() {
    let config = probe(TimingProfile::from_millis(200, 0, 200));
    let adapter = ScriptedAdapter::new(vec![Reply::Values(vec![Some(23.4)])]);
    let mut sensor = Sensor::new(config, adapter, NoPower).unwrap();
    sensor.begin_measurement_cycle(Ms(0));

    let mut completed_at = None;
    for t in (0..=1000).step_by(50) {
        sensor.step(Ms(t));
        if t < 400 {
            assert!(!sensor.is_complete(), "complete too early at {} ms", t);
        }
        if sensor.is_complete() && completed_at.is_none() {
            completed_at = Some(t);
        }
    }

    assert!(completed_at.is_some());
    assert!(completed_at.unwrap() >= 400);
    assert_eq!(sensor.get_quantity(0), Some(23.4));
    assert_eq!(sensor.adapter().requests, 1);
}

#[test]
fn timeout_on_every_attempt_exhausts_budget() {
    let config = probe(TimingProfile::from_millis(200, 0, 200));
    let mut sensor = Sensor::new(config, ScriptedAdapter::always(Reply::Fail(AdapterError::Timeout)), NoPower).unwrap();
    sensor.begin_measurement_cycle(Ms(0));

    for t in (0..=5000).step_by(50) {
        sensor.step(Ms(t));
        assert!(sensor.retries() <= 3);
    }

    assert!(sensor.is_complete());
    assert_eq!(sensor.get_quantity(0), None);
    assert_eq!(sensor.retries(), 3);
    assert_eq!(sensor.adapter().requests, 4);
    assert_eq!(sensor.last_error(), Some(AdapterError::Timeout));
}

#[test]
fn silent_device_times_out_then_reports_no_data() {
    let config = probe(TimingProfile::from_millis(200, 0, 200));
    let mut sensor = Sensor::new(config, ScriptedAdapter::always(Reply::Silent), NoPower).unwrap();
    sensor.begin_measurement_cycle(Ms(0));

    for t in (0..=10_000).step_by(50) {
        sensor.step(Ms(t));
    }

    assert!(sensor.is_complete());
    assert_eq!(sensor.get_quantity(0), None);
    assert_eq!(sensor.retries(), 3);
    assert_eq!(sensor.last_error(), Some(AdapterError::Timeout));
}

#[test]
fn phases_fire_exactly_when_duration_elapses() {
    let config = probe(TimingProfile::from_millis(300, 150, 0));
    let mut sensor = Sensor::new(config, ScriptedAdapter::always(Reply::Values(vec![Some(1.0)])), NoPower).unwrap();
    sensor.begin_measurement_cycle(Ms(1000));
    assert_eq!(sensor.state(), LifecycleState::WarmingUp);

    assert_eq!(sensor.step(Ms(1299)), StepStatus::Waiting);
    assert_eq!(sensor.step(Ms(1300)), StepStatus::Advanced(LifecycleState::Stabilizing));
    assert_eq!(sensor.step(Ms(1449)), StepStatus::Waiting);
    assert_eq!(sensor.step(Ms(1450)), StepStatus::Advanced(LifecycleState::MeasurementTriggered));
    assert_eq!(sensor.adapter().requests, 0);
}

#[test]
fn early_device_response_does_not_skip_stabilization() {
    let config = probe(TimingProfile::from_millis(0, 500, 0));
    let mut sensor = Sensor::new(config, ScriptedAdapter::always(Reply::Values(vec![Some(1.0)])), NoPower).unwrap();
    sensor.begin_measurement_cycle(Ms(0));

    for t in (0..500).step_by(10) {
        sensor.step(Ms(t));
        assert_eq!(sensor.adapter().requests, 0, "triggered during stabilization at {} ms", t);
    }
}

#[test]
fn power_pin_switched_before_warm_up_and_after_cycle() {
    let config = probe(TimingProfile::from_millis(100, 0, 0)).with_power(PowerPins::from_raw(12, -1));
    let adapter = ScriptedAdapter::always(Reply::Values(vec![Some(3.0)]));
    let mut sensor = Sensor::new(config, adapter, RecordingPower::default()).unwrap();

    sensor.begin_measurement_cycle(Ms(0));
    assert_eq!(sensor.state(), LifecycleState::PowerRequested);
    assert!(sensor.power().calls.is_empty());

    assert_eq!(sensor.step(Ms(20)), StepStatus::Advanced(LifecycleState::WarmingUp));
    assert_eq!(sensor.power().calls, [(12, true)]);
    // Warm-up counts from the power-on step.
    assert_eq!(sensor.step(Ms(100)), StepStatus::Waiting);
    assert_eq!(sensor.step(Ms(120)), StepStatus::Advanced(LifecycleState::Stabilizing));

    for t in (130..400).step_by(10) {
        sensor.step(Ms(t));
    }
    assert!(sensor.is_complete());
    sensor.power_down();
    assert_eq!(sensor.power().calls, [(12, true), (12, false)]);
    assert_eq!(sensor.get_quantity(0), Some(3.0));
}

#[test]
fn bus_busy_does_not_spend_retry_budget() {
    let script = vec![
        Reply::Reject(AdapterError::BusBusy),
        Reply::Reject(AdapterError::BusBusy),
        Reply::Values(vec![Some(9.5)]),
    ];
    let config = probe(TimingProfile::from_millis(0, 0, 0))
        .with_options(LifecycleOptions { retry_budget: 0, ..Default::default() });
    let mut sensor = Sensor::new(config, ScriptedAdapter::new(script), NoPower).unwrap();
    sensor.begin_measurement_cycle(Ms(0));

    for t in (0..200).step_by(10) {
        sensor.step(Ms(t));
    }
    assert!(sensor.is_complete());
    assert_eq!(sensor.retries(), 0);
    assert_eq!(sensor.get_quantity(0), Some(9.5));
}

#[test]
fn averaging_excludes_failed_and_undefined_samples() {
    let script = vec![
        Reply::Values(vec![Some(10.0), Some(1.0)]),
        Reply::Fail(AdapterError::NoResponse),
        Reply::Values(vec![Some(20.0), None]),
        Reply::Values(vec![Some(30.0), Some(3.0)]),
    ];
    let config = SensorConfig::new("pair", 2, TimingProfile::from_millis(0, 0, 0)).with_averaging(3);
    let mut sensor = Sensor::new(config, ScriptedAdapter::new(script), NoPower).unwrap();
    sensor.begin_measurement_cycle(Ms(0));

    for t in (0..500).step_by(10) {
        sensor.step(Ms(t));
    }
    assert!(sensor.is_complete());
    assert_eq!(sensor.results().samples(), 3);
    assert_eq!(sensor.get_quantity(0), Some(20.0));
    assert_eq!(sensor.get_quantity(1), Some(2.0));
    assert_eq!(sensor.retries(), 1);
}

#[test]
fn busy_bus_while_awaiting_still_times_out() {
    let config = probe(TimingProfile::from_millis(0, 0, 200));
    let mut sensor =
        Sensor::new(config, ScriptedAdapter::always(Reply::Fail(AdapterError::BusBusy)), NoPower).unwrap();
    sensor.begin_measurement_cycle(Ms(0));

    for t in (0..=10_000).step_by(50) {
        sensor.step(Ms(t));
    }

    assert!(sensor.is_complete(), "stuck in {}", sensor.state());
    assert_eq!(sensor.get_quantity(0), None);
    assert_eq!(sensor.retries(), 3);
    assert_eq!(sensor.last_error(), Some(AdapterError::Timeout));
}

#[test]
fn no_response_on_every_attempt_reports_all_quantities_undefined() {
    let config = SensorConfig::new("pair", 2, TimingProfile::from_millis(100, 0, 100)).with_averaging(2);
    let mut sensor =
        Sensor::new(config, ScriptedAdapter::always(Reply::Reject(AdapterError::NoResponse)), NoPower).unwrap();
    sensor.begin_measurement_cycle(Ms(0));

    for t in (0..=2000).step_by(50) {
        sensor.step(Ms(t));
        assert!(sensor.retries() <= 3);
    }

    assert!(sensor.is_complete());
    assert_eq!(sensor.get_quantity(0), None);
    assert_eq!(sensor.get_quantity(1), None);
    assert_eq!(sensor.adapter().requests, 4);
    assert_eq!(sensor.last_error(), Some(AdapterError::NoResponse));
}
