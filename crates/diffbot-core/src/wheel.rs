use crate::bus::BusContext;
use crate::error::{HardwareError, Result};
use crate::hal::{ActuatorHandle, ControlMode};
use crate::hal_bus::BusServo;
use crate::hal_sim::SimulatedServo;
use crate::interfaces::{
    CommandInterface, InterfaceSlot, StateInterface, HW_IF_POSITION, HW_IF_VELOCITY,
};
use crate::params::{check_unique, BusSettings, WheelSpec};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backing {
    Simulated,
    Real,
}

/// Builds the single handle a wheel owns.
pub trait HandleFactory: Send {
    fn create(&self, spec: &WheelSpec, settings: &BusSettings) -> Box<dyn ActuatorHandle>;
}

/// `SimulatedServo` for simulated wheels, `BusServo` for real ones.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardHandles;

impl HandleFactory for StandardHandles {
    fn create(&self, spec: &WheelSpec, settings: &BusSettings) -> Box<dyn ActuatorHandle> {
        match spec.backing {
            Backing::Simulated => Box::new(SimulatedServo::new(settings.loop_period())),
            Backing::Real => Box::new(BusServo::new(settings.enc_counts_per_rev)),
        }
    }
}

/// One wheel: fixed configuration plus the slots shared with the control loop.
pub struct WheelConfig {
    pub name: String,
    pub bus_id: u8,
    pub mode: ControlMode,
    pub backing: Backing,
    handle: Box<dyn ActuatorHandle>,
    position: InterfaceSlot,
    velocity: InterfaceSlot,
    goal: InterfaceSlot,
}

impl WheelConfig {
    pub fn new(spec: &WheelSpec, handle: Box<dyn ActuatorHandle>) -> Self {
        Self {
            name: spec.name.clone(),
            bus_id: spec.bus_id,
            mode: spec.mode,
            backing: spec.backing,
            handle,
            position: InterfaceSlot::default(),
            velocity: InterfaceSlot::default(),
            goal: InterfaceSlot::default(),
        }
    }

    pub fn position(&self) -> f64 {
        self.position.get()
    }

    pub fn velocity(&self) -> f64 {
        self.velocity.get()
    }

    pub fn goal(&self) -> f64 {
        self.goal.get()
    }

    pub fn handle_mut(&mut self) -> &mut dyn ActuatorHandle {
        self.handle.as_mut()
    }

    pub(crate) fn position_slot(&self) -> &InterfaceSlot {
        &self.position
    }

    pub(crate) fn velocity_slot(&self) -> &InterfaceSlot {
        &self.velocity
    }

    pub(crate) fn goal_slot(&self) -> &InterfaceSlot {
        &self.goal
    }

    pub fn command_interface_name(&self) -> &'static str {
        match self.mode {
            ControlMode::Position => HW_IF_POSITION,
            ControlMode::Velocity => HW_IF_VELOCITY,
        }
    }

    pub fn state_interfaces(&self) -> [StateInterface; 2] {
        [
            StateInterface::new(&self.name, HW_IF_VELOCITY, self.velocity.clone()),
            StateInterface::new(&self.name, HW_IF_POSITION, self.position.clone()),
        ]
    }

    pub fn command_interface(&self) -> CommandInterface {
        CommandInterface::new(&self.name, self.command_interface_name(), self.goal.clone())
    }
}

impl fmt::Debug for WheelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WheelConfig")
            .field("name", &self.name)
            .field("bus_id", &self.bus_id)
            .field("mode", &self.mode)
            .field("backing", &self.backing)
            .field("position", &self.position())
            .field("velocity", &self.velocity())
            .field("goal", &self.goal())
            .finish_non_exhaustive()
    }
}

/// Wheels in declaration order.
#[derive(Debug, Default)]
pub struct WheelRegistry {
    wheels: Vec<WheelConfig>,
}

impl WheelRegistry {
    /// Creates, sets up and initialises one handle per wheel.
    ///
    /// A failed `setup` aborts the build; a failed `init` is only logged.
    pub fn build(
        specs: &[WheelSpec],
        settings: &BusSettings,
        bus: Option<&BusContext>,
        factory: &dyn HandleFactory,
    ) -> Result<(Self, usize)> {
        check_unique(specs)?;

        let mut wheels = Vec::with_capacity(specs.len());
        let mut init_faults = 0;
        for spec in specs {
            let mut handle = factory.create(spec, settings);
            let wheel_bus = match spec.backing {
                Backing::Real => bus,
                Backing::Simulated => None,
            };
            handle
                .setup(spec.bus_id, spec.mode, wheel_bus)
                .map_err(|source| HardwareError::Setup {
                    wheel: spec.name.clone(),
                    source,
                })?;
            match handle.init(0.0) {
                Ok(status) => info!(wheel = %spec.name, bus_id = spec.bus_id, "{status}"),
                Err(e) => {
                    init_faults += 1;
                    warn!(wheel = %spec.name, bus_id = spec.bus_id, error = %e, "Wheel init failed");
                }
            }
            wheels.push(WheelConfig::new(spec, handle));
        }
        Ok((Self { wheels }, init_faults))
    }

    pub fn len(&self) -> usize {
        self.wheels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wheels.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&WheelConfig> {
        self.wheels.iter().find(|w| w.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, WheelConfig> {
        self.wheels.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, WheelConfig> {
        self.wheels.iter_mut()
    }
}

impl<'a> IntoIterator for &'a WheelRegistry {
    type Item = &'a WheelConfig;
    type IntoIter = std::slice::Iter<'a, WheelConfig>;

    fn into_iter(self) -> Self::IntoIter {
        self.wheels.iter()
    }
}
