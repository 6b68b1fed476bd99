use diffbot_core::params::*;
use diffbot_core::{
    ActuatorFault, ActuatorHandle, Backing, BusContext, BusError, ControlMode,
    DiffHardwareInterface, FaultPolicy, HandleFactory, HardwareError, LifecycleStatus,
    StandardHandles,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Activate(u8),
    Deactivate(u8),
    SetVelocity(u8, f64),
    SetPosition(u8, f64),
}

#[derive(Default)]
struct Journal {
    calls: Mutex<Vec<Call>>,
}

impl Journal {
    fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

/// Records every call and reports scripted readings.
struct RecordingHandle {
    journal: Arc<Journal>,
    id: u8,
    fail_activate: bool,
    fail_write: bool,
    readings: Arc<Mutex<Vec<Option<(f64, f64)>>>>,
}

fn timeout(id: u8) -> ActuatorFault {
    ActuatorFault::Bus(BusError::Timeout {
        id,
        after: Duration::from_millis(10),
    })
}

impl RecordingHandle {
    fn sent(&self) -> Result<(), ActuatorFault> {
        if self.fail_write {
            return Err(timeout(self.id));
        }
        Ok(())
    }
}

impl ActuatorHandle for RecordingHandle {
    fn setup(&mut self, bus_id: u8, _: ControlMode, _: Option<&BusContext>) -> Result<(), ActuatorFault> {
        self.id = bus_id;
        Ok(())
    }

    fn init(&mut self, _seed: f64) -> Result<String, ActuatorFault> {
        Ok(format!("recorder {} ready", self.id))
    }

    fn activate(&mut self) -> Result<String, ActuatorFault> {
        self.journal.push(Call::Activate(self.id));
        if self.fail_activate {
            return Err(timeout(self.id));
        }
        Ok("on".to_string())
    }

    fn deactivate(&mut self) -> Result<String, ActuatorFault> {
        self.journal.push(Call::Deactivate(self.id));
        Ok("off".to_string())
    }

    fn position_degrees(&mut self) -> Result<f64, ActuatorFault> {
        let readings = self.readings.lock().unwrap();
        match readings.get(self.id as usize).copied().flatten() {
            Some((position, _)) => Ok(position),
            None => Err(timeout(self.id)),
        }
    }

    fn velocity_rpm(&mut self) -> Result<f64, ActuatorFault> {
        let readings = self.readings.lock().unwrap();
        match readings.get(self.id as usize).copied().flatten() {
            Some((_, velocity)) => Ok(velocity),
            None => Err(timeout(self.id)),
        }
    }

    fn set_velocity_rpm(&mut self, rpm: f64) -> Result<(), ActuatorFault> {
        self.journal.push(Call::SetVelocity(self.id, rpm));
        self.sent()
    }

    fn set_position_degrees(&mut self, degrees: f64) -> Result<(), ActuatorFault> {
        self.journal.push(Call::SetPosition(self.id, degrees));
        self.sent()
    }
}

struct Recorders {
    journal: Arc<Journal>,
    failing: Vec<String>,
    failing_writes: Vec<String>,
    readings: Arc<Mutex<Vec<Option<(f64, f64)>>>>,
}

impl HandleFactory for Recorders {
    fn create(&self, spec: &WheelSpec, _settings: &BusSettings) -> Box<dyn ActuatorHandle> {
        Box::new(RecordingHandle {
            journal: self.journal.clone(),
            id: 0,
            fail_activate: self.failing.contains(&spec.name),
            fail_write: self.failing_writes.contains(&spec.name),
            readings: self.readings.clone(),
        })
    }
}

fn recorders(failing: &[&str]) -> (Recorders, Arc<Journal>, Arc<Mutex<Vec<Option<(f64, f64)>>>>) {
    let journal = Arc::new(Journal::default());
    let readings = Arc::new(Mutex::new(vec![None; 8]));
    let factory = Recorders {
        journal: journal.clone(),
        failing: failing.iter().map(|s| s.to_string()).collect(),
        failing_writes: Vec::new(),
        readings: readings.clone(),
    };
    (factory, journal, readings)
}

fn params(wheels: &[(&str, u8, u8)]) -> HardwareParameters {
    let mut params = HardwareParameters::new()
        .with(WHEEL_COUNT, wheels.len())
        .with(DEVICE, "/dev/ttyUSB0")
        .with(BAUD_RATE, 1_000_000)
        .with(TIMEOUT, 10)
        .with(LOOP_RATE, 50)
        .with(ENC_COUNTS_PER_REV, 4096);
    for (i, (name, id, mode)) in wheels.iter().enumerate() {
        let index = i + 1;
        params.insert(wheel_key("wheel_name", index), name);
        params.insert(wheel_key("wheel_id", index), id);
        params.insert(wheel_key("wheel_mode", index), mode);
        params.insert(wheel_key("real_hardware", index), 0);
    }
    params
}

fn diff_drive() -> HardwareParameters {
    params(&[("left_wheel", 1, 0), ("right_wheel", 2, 1)])
}

#[test]
fn simulated_scenario_echoes_goals() {
    let mut hw = DiffHardwareInterface::new();
    hw.configure(&diff_drive()).unwrap();
    hw.activate().unwrap();

    let commands = hw.export_command_interfaces();
    assert_eq!(commands[0].full_name(), "left_wheel/velocity");
    assert_eq!(commands[1].full_name(), "right_wheel/position");
    commands[0].set_value(10.0);
    commands[1].set_value(45.0);

    hw.write().unwrap();
    hw.read().unwrap();

    let states = hw.export_state_interfaces();
    let value = |name: &str| {
        states
            .iter()
            .find(|s| s.full_name() == name)
            .map(|s| s.value())
            .unwrap()
    };
    assert!((value("left_wheel/velocity") - 10.0).abs() < 1e-9);
    assert!((value("right_wheel/position") - 45.0).abs() < 1e-9);
}

#[test]
fn bindings_exported_before_activation_stay_live() {
    let mut hw = DiffHardwareInterface::new();
    hw.configure(&diff_drive()).unwrap();
    let states = hw.export_state_interfaces();
    let commands = hw.export_command_interfaces();

    hw.activate().unwrap();
    commands[0].set_value(-20.0);
    hw.write().unwrap();
    hw.read().unwrap();
    assert_eq!(states[0].full_name(), "left_wheel/velocity");
    assert_eq!(states[0].value(), -20.0);
}

#[test]
fn non_positive_wheel_count_leaves_interface_unconfigured() {
    for count in [0, -1] {
        let mut hw = DiffHardwareInterface::new();
        let err = hw.configure(&diff_drive().with(WHEEL_COUNT, count)).unwrap_err();
        assert!(err.is_configuration());
        assert!(matches!(err, HardwareError::NonPositiveWheelCount(_)));
        assert_eq!(hw.status(), LifecycleStatus::Unconfigured);
    }
}

#[test]
fn duplicate_wheel_name_is_rejected() {
    let mut hw = DiffHardwareInterface::new();
    let err = hw
        .configure(&params(&[("wheel", 1, 0), ("wheel", 2, 0)]))
        .unwrap_err();
    assert!(matches!(err, HardwareError::DuplicateWheelName(ref n) if n == "wheel"));
    assert_eq!(hw.status(), LifecycleStatus::Unconfigured);
    assert!(hw.export_command_interfaces().is_empty());

    // A corrected parameter set still configures the same instance.
    hw.configure(&diff_drive()).unwrap();
    assert_eq!(hw.status(), LifecycleStatus::Configured);
}

#[test]
fn every_wheel_deactivates_once_despite_failed_activation() {
    let (factory, journal, _) = recorders(&["left_wheel"]);
    let mut hw = DiffHardwareInterface::new().with_handle_factory(factory);
    hw.configure(&diff_drive()).unwrap();

    hw.activate().unwrap();
    assert_eq!(hw.status(), LifecycleStatus::Started);
    assert_eq!(hw.stats().actuator_faults, 1);

    hw.deactivate().unwrap();
    drop(hw);

    for id in [1, 2] {
        assert_eq!(journal.count(|c| *c == Call::Deactivate(id)), 1);
    }
}

#[test]
fn strict_policy_aborts_activation() {
    let (factory, journal, _) = recorders(&["right_wheel"]);
    let mut hw = DiffHardwareInterface::new()
        .with_handle_factory(factory)
        .with_fault_policy(FaultPolicy::Strict);
    hw.configure(&diff_drive()).unwrap();

    let err = hw.activate().unwrap_err();
    assert!(matches!(err, HardwareError::ActivationAborted { ref failed } if failed == &["right_wheel"]));
    assert_eq!(hw.status(), LifecycleStatus::Error);
    assert!(hw.write().is_err());
    assert_eq!(journal.count(|c| matches!(c, Call::Deactivate(_))), 2);

    hw.deactivate().unwrap();
    assert_eq!(hw.status(), LifecycleStatus::Stopped);
}

#[test]
fn write_uses_only_the_mode_matching_command() {
    let (factory, journal, _) = recorders(&[]);
    let mut hw = DiffHardwareInterface::new().with_handle_factory(factory);
    hw.configure(&diff_drive()).unwrap();
    hw.activate().unwrap();

    let commands = hw.export_command_interfaces();
    commands[0].set_value(12.0);
    commands[1].set_value(-30.0);
    hw.write().unwrap();

    assert_eq!(journal.count(|c| matches!(c, Call::SetPosition(1, _))), 0);
    assert_eq!(journal.count(|c| matches!(c, Call::SetVelocity(2, _))), 0);
    let calls = journal.calls();
    assert!(calls.contains(&Call::SetVelocity(1, 12.0)));
    assert!(calls.contains(&Call::SetPosition(2, -30.0)));
}

#[test]
fn failed_write_is_counted_and_other_wheels_still_receive_goals() {
    let (mut factory, journal, _) = recorders(&[]);
    factory.failing_writes.push("left_wheel".to_string());
    let mut hw = DiffHardwareInterface::new().with_handle_factory(factory);
    hw.configure(&diff_drive()).unwrap();
    hw.activate().unwrap();

    let commands = hw.export_command_interfaces();
    commands[0].set_value(8.0);
    commands[1].set_value(15.0);
    hw.write().unwrap();
    hw.write().unwrap();

    assert_eq!(hw.status(), LifecycleStatus::Started);
    assert_eq!(hw.stats().writes, 2);
    assert_eq!(hw.stats().write_faults, 2);
    assert_eq!(journal.count(|c| *c == Call::SetVelocity(1, 8.0)), 2);
    assert_eq!(journal.count(|c| *c == Call::SetPosition(2, 15.0)), 2);
}

#[test]
fn failed_reads_keep_last_values() {
    let (factory, _, readings) = recorders(&[]);
    let mut hw = DiffHardwareInterface::new().with_handle_factory(factory);
    hw.configure(&diff_drive()).unwrap();
    hw.activate().unwrap();
    let states = hw.export_state_interfaces();

    readings.lock().unwrap()[1] = Some((90.0, 5.0));
    readings.lock().unwrap()[2] = Some((-45.0, -2.0));
    hw.read().unwrap();
    assert_eq!(states[0].value(), 5.0);
    assert_eq!(states[1].value(), 90.0);
    assert_eq!(states[3].value(), -45.0);

    // Wheel 1 goes silent; the cycle still succeeds.
    readings.lock().unwrap()[1] = None;
    readings.lock().unwrap()[2] = Some((-40.0, -1.0));
    hw.read().unwrap();
    assert_eq!(states[0].value(), 5.0);
    assert_eq!(states[1].value(), 90.0);
    assert_eq!(states[3].value(), -40.0);
    assert_eq!(hw.stats().read_faults, 2);
}

#[test]
fn drop_while_started_deactivates_every_wheel() {
    let (factory, journal, _) = recorders(&[]);
    {
        let mut hw = DiffHardwareInterface::new().with_handle_factory(factory);
        hw.configure(&params(&[("a", 1, 0), ("b", 2, 0), ("c", 3, 1)]))
            .unwrap();
        hw.activate().unwrap();
        assert_eq!(journal.count(|c| matches!(c, Call::Deactivate(_))), 0);
    }
    let deactivated: Vec<_> = journal
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Deactivate(_)))
        .collect();
    assert_eq!(
        deactivated,
        [Call::Deactivate(1), Call::Deactivate(2), Call::Deactivate(3)]
    );
}

#[test]
fn standard_handles_pick_backing() {
    let spec = WheelSpec {
        name: "left_wheel".to_string(),
        bus_id: 1,
        mode: ControlMode::Velocity,
        backing: Backing::Real,
    };
    let mut handle = StandardHandles.create(&spec, &BusSettings::default());
    // A bus servo refuses setup without a bus; the simulated one would not.
    assert!(matches!(
        handle.setup(1, ControlMode::Velocity, None),
        Err(ActuatorFault::MissingBus)
    ));
}
