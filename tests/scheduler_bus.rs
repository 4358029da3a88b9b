// tests/scheduler_bus.rs

mod common;

use common::{MockClock, Ms, Reply, ScriptedAdapter};
use core::cell::RefCell;
use core::time::Duration;
use modsense::common::{BusTimer, FrameFormat, NoPower, Sdi12Serial};
use modsense::protocol::{Sdi12Adapter, SharedBus};
use modsense::{
    BusId, LifecycleState, QuantitySpec, Scheduler, Sdi12Addr, Sensor, SensorConfig, SensorId,
    TimingProfile, Variable, VariableError,
};
use std::collections::{HashMap, VecDeque};

fn scripted(name: &'static str, bus: Option<u8>, value: f32) -> Sensor<ScriptedAdapter, NoPower, Ms> {
    let mut config = SensorConfig::new(name, 1, TimingProfile::from_millis(100, 0, 300));
    if let Some(bus) = bus {
        config = config.with_bus(BusId(bus));
    }
    Sensor::new(config, ScriptedAdapter::always(Reply::Values(vec![Some(value)])), NoPower).unwrap()
}

fn awaiting(scheduler: &Scheduler<'_, Ms, 4>, ids: &[SensorId]) -> usize {
    ids.iter()
        .filter(|id| scheduler.state(**id) == Some(LifecycleState::AwaitingResult))
        .count()
}

#[test]
fn sensors_sharing_a_bus_never_overlap() {
    let mut a = scripted("a", Some(0), 1.0);
    let mut b = scripted("b", Some(0), 2.0);
    let mut c = scripted("c", Some(0), 3.0);
    let mut scheduler: Scheduler<'_, Ms, 4> = Scheduler::new();
    let ids = [
        scheduler.register(&mut a).unwrap(),
        scheduler.register(&mut b).unwrap(),
        scheduler.register(&mut c).unwrap(),
    ];

    let clock = MockClock::default();
    scheduler.begin_all(Ms(0));
    let mut blocked_ticks = 0;
    while !scheduler.all_complete() && clock.now_ms() < 10_000 {
        let summary = scheduler.poll(&clock);
        if summary.blocked > 0 {
            blocked_ticks += 1;
        }
        assert!(awaiting(&scheduler, &ids) <= 1, "overlap at {} ms", clock.now_ms());
        clock.advance(25);
    }

    assert!(scheduler.all_complete());
    assert!(blocked_ticks > 0);
    assert_eq!(scheduler.bus_owner(BusId(0)), None);
}

#[test]
fn sensors_on_different_buses_overlap() {
    let mut a = scripted("a", Some(0), 1.0);
    let mut b = scripted("b", Some(1), 2.0);
    let mut c = scripted("c", None, 3.0);
    let mut scheduler: Scheduler<'_, Ms, 4> = Scheduler::new();
    let ids = [
        scheduler.register(&mut a).unwrap(),
        scheduler.register(&mut b).unwrap(),
        scheduler.register(&mut c).unwrap(),
    ];

    scheduler.begin_all(Ms(0));
    let mut max_overlap = 0;
    for t in (0..2000).step_by(25) {
        let summary = scheduler.tick(Ms(t));
        assert_eq!(summary.blocked, 0);
        max_overlap = max_overlap.max(awaiting(&scheduler, &ids));
    }
    assert_eq!(max_overlap, 3);
    assert!(scheduler.all_complete());
}

#[test]
fn retiring_mid_cycle_unblocks_the_bus() {
    let mut a = Sensor::new(
        SensorConfig::new("stuck", 1, TimingProfile::from_millis(0, 0, 100)).with_bus(BusId(2)),
        ScriptedAdapter::always(Reply::Silent),
        NoPower,
    )
    .unwrap();
    let mut b = scripted("b", Some(2), 5.0);
    let mut scheduler: Scheduler<'_, Ms, 4> = Scheduler::new();
    let stuck = scheduler.register(&mut a).unwrap();
    let ok = scheduler.register(&mut b).unwrap();
    scheduler.begin_all(Ms(0));

    for t in (0..300).step_by(25) {
        scheduler.tick(Ms(t));
    }
    assert_eq!(scheduler.bus_owner(BusId(2)), Some(stuck));

    scheduler.retire(stuck);
    for t in (300..1500).step_by(25) {
        scheduler.tick(Ms(t));
    }
    assert_eq!(scheduler.state(ok), Some(LifecycleState::Complete));
    assert_eq!(scheduler.state(stuck), Some(LifecycleState::Uninitialized));
    assert!(scheduler.all_complete());

    let var = Variable::bound(QuantitySpec::new(0, "temperature", "degreeCelsius", 1, "T"), None, stuck, &scheduler).unwrap();
    assert_eq!(var.read(&scheduler), Ok(None));
}

// --- SDI-12 multidrop bus shared through SharedBus ---

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Us(u64);

impl core::ops::Add<Duration> for Us {
    type Output = Self;
    fn add(self, rhs: Duration) -> Self {
        Us(self.0 + rhs.as_micros() as u64)
    }
}

impl core::ops::Sub<Us> for Us {
    type Output = Duration;
    fn sub(self, rhs: Us) -> Duration {
        Duration::from_micros(self.0.saturating_sub(rhs.0))
    }
}

/// Simulated SDI-12 line with several sensors answering `a!`, `aM!` and `aD0!`.
#[derive(Debug, Default)]
struct MultidropBus {
    time_us: u64,
    values: HashMap<u8, f32>,
    command: Vec<u8>,
    rx: VecDeque<u8>,
    in_flight: Option<u8>,
    overlaps: u32,
    commands: Vec<String>,
}

impl MultidropBus {
    fn respond(&mut self) {
        let command = std::mem::take(&mut self.command);
        let text = String::from_utf8(command).unwrap();
        self.commands.push(text.clone());
        let address = text.as_bytes()[0];
        let Some(value) = self.values.get(&address).copied() else {
            return;
        };

        let reply = match &text[1..] {
            "!" => format!("{}\r\n", address as char),
            "M!" => {
                if self.in_flight.is_some_and(|other| other != address) {
                    self.overlaps += 1;
                }
                self.in_flight = Some(address);
                format!("{}0011\r\n", address as char)
            }
            "D0!" => {
                if self.in_flight == Some(address) {
                    self.in_flight = None;
                }
                format!("{}{:+}\r\n", address as char, value)
            }
            _ => return,
        };
        self.rx.extend(reply.bytes());
    }
}

impl BusTimer for MultidropBus {
    type Instant = Us;
    fn delay_us(&mut self, us: u32) {
        self.time_us += u64::from(us);
    }
    fn now(&self) -> Us {
        Us(self.time_us)
    }
}

impl Sdi12Serial for MultidropBus {
    type Error = ();
    fn read_byte(&mut self) -> nb::Result<u8, ()> {
        self.rx.pop_front().ok_or(nb::Error::WouldBlock)
    }
    fn write_byte(&mut self, byte: u8) -> nb::Result<(), ()> {
        self.command.push(byte);
        if byte == b'!' {
            self.respond();
        }
        Ok(())
    }
    fn flush(&mut self) -> nb::Result<(), ()> {
        Ok(())
    }
    fn send_break(&mut self) -> nb::Result<(), ()> {
        self.time_us += 12_000;
        Ok(())
    }
    fn set_config(&mut self, _config: FrameFormat) -> Result<(), ()> {
        Ok(())
    }
}

#[test]
fn sdi12_sensors_share_one_line() {
    let line = RefCell::new(MultidropBus {
        values: HashMap::from([(b'1', 21.5), (b'2', -3.25)]),
        ..Default::default()
    });

    let timing = TimingProfile::from_millis(0, 0, 100);
    let config_1 = SensorConfig::new("soil-1", 1, timing).with_bus(BusId(0));
    let config_2 = SensorConfig::new("soil-2", 1, timing).with_bus(BusId(0));
    let adapter_1 = Sdi12Adapter::new(SharedBus::new(&line), Sdi12Addr::new('1').unwrap());
    let adapter_2 = Sdi12Adapter::new(SharedBus::new(&line), Sdi12Addr::new('2').unwrap());
    let mut s1: Sensor<_, _, Ms> = Sensor::new(config_1, adapter_1, NoPower).unwrap();
    let mut s2: Sensor<_, _, Ms> = Sensor::new(config_2, adapter_2, NoPower).unwrap();

    let mut scheduler: Scheduler<'_, Ms, 4> = Scheduler::new();
    let id1 = scheduler.register(&mut s1).unwrap();
    let id2 = scheduler.register(&mut s2).unwrap();
    assert!(scheduler.setup_all().is_ok());

    let temp = QuantitySpec::new(0, "temperature", "degreeCelsius", 2, "SoilTemp");
    let mut v1 = Variable::new(temp, None).unwrap();
    let v2 = Variable::bound(temp, None, id2, &scheduler).unwrap();
    assert_eq!(v1.read(&scheduler), Err(VariableError::Unbound));
    v1.bind(id1, &scheduler).unwrap();

    scheduler.begin_all(Ms(0));
    for t in (0..6000).step_by(50) {
        scheduler.tick(Ms(t));
        if scheduler.all_complete() {
            break;
        }
    }

    assert!(scheduler.all_complete());
    assert_eq!(v1.render(&scheduler).unwrap().as_str(), "21.50");
    assert_eq!(v2.render(&scheduler).unwrap().as_str(), "-3.25");

    let bus = line.borrow();
    assert_eq!(bus.overlaps, 0);
    assert_eq!(bus.commands, ["1!", "2!", "1M!", "1D0!", "2M!", "2D0!"]);
}
