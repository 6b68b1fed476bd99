pub mod bus;
pub mod error;
pub mod hal;
pub mod hal_bus;
pub mod hal_sim;
pub mod interfaces;
pub mod lifecycle;
pub mod params;
pub mod system;
pub mod wheel;

pub use bus::{BusConnector, BusContext, BusError, NoBusConnector, ServoBus};
pub use error::HardwareError;
pub use hal::{ActuatorFault, ActuatorHandle, ControlMode};
pub use hal_bus::{BusServo, RegisterMap};
pub use hal_sim::SimulatedServo;
pub use interfaces::{CommandInterface, InterfaceSlot, StateInterface, HW_IF_POSITION, HW_IF_VELOCITY};
pub use lifecycle::{FaultPolicy, LifecycleStatus};
pub use params::{BusSettings, HardwareConfig, HardwareParameters, WheelSpec};
pub use system::{CycleStats, DiffHardwareInterface};
pub use wheel::{Backing, HandleFactory, StandardHandles, WheelConfig, WheelRegistry};
