use crate::bus::{BusContext, BusError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Which goal a wheel accepts. Fixed for the life of the interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    Velocity,
    Position,
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Velocity => f.write_str("velocity"),
            Self::Position => f.write_str("position"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ActuatorFault {
    #[error("handle was already set up")]
    AlreadySetUp,
    #[error("handle used before setup")]
    NotSetUp,
    #[error("real hardware needs an open bus")]
    MissingBus,
    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Uniform operations over one wheel actuator, simulated or on the bus.
///
/// `setup` comes first. `deactivate` must be safe to call in any state and
/// must not panic; it is the fallback used on teardown.
pub trait ActuatorHandle: Send {
    fn setup(
        &mut self,
        bus_id: u8,
        mode: ControlMode,
        bus: Option<&BusContext>,
    ) -> Result<(), ActuatorFault>;
    fn init(&mut self, seed: f64) -> Result<String, ActuatorFault>;
    fn activate(&mut self) -> Result<String, ActuatorFault>;
    fn deactivate(&mut self) -> Result<String, ActuatorFault>;
    fn position_degrees(&mut self) -> Result<f64, ActuatorFault>;
    fn velocity_rpm(&mut self) -> Result<f64, ActuatorFault>;
    fn set_velocity_rpm(&mut self, rpm: f64) -> Result<(), ActuatorFault>;
    fn set_position_degrees(&mut self, degrees: f64) -> Result<(), ActuatorFault>;
}
