use crate::bus::{BusConnector, BusContext, NoBusConnector};
use crate::error::{HardwareError, Result};
use crate::hal::ControlMode;
use crate::interfaces::{CommandInterface, StateInterface};
use crate::lifecycle::{FaultPolicy, LifecycleStatus};
use crate::params::{BusSettings, HardwareConfig, HardwareParameters};
use crate::wheel::{HandleFactory, StandardHandles, WheelRegistry};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Clone, Default, Debug, Serialize)]
pub struct CycleStats {
    pub reads: u64,
    pub writes: u64,
    pub read_faults: u64,
    pub write_faults: u64,
    pub actuator_faults: u64,
    pub last_cycle_us: u64,
    pub max_cycle_us: u64,
}

impl CycleStats {
    fn record_cycle(&mut self, started: Instant) {
        let cycle_us = started.elapsed().as_micros() as u64;
        self.last_cycle_us = cycle_us;
        self.max_cycle_us = self.max_cycle_us.max(cycle_us);
    }
}

/// Bridges named state/command interfaces to a set of wheel actuators.
///
/// Lifecycle: `configure` → `activate` → (`read`, `write`)* → `deactivate`.
/// Dropping the interface while it still holds hardware runs a final
/// deactivate pass so no wheel is left driving.
pub struct DiffHardwareInterface {
    status: LifecycleStatus,
    registry: WheelRegistry,
    settings: Option<BusSettings>,
    bus: Option<BusContext>,
    connector: Box<dyn BusConnector>,
    handles: Box<dyn HandleFactory>,
    policy: FaultPolicy,
    stats: CycleStats,
}

impl Default for DiffHardwareInterface {
    fn default() -> Self {
        Self::new()
    }
}

impl DiffHardwareInterface {
    /// Interface without a bus transport; only simulated wheels can be configured.
    pub fn new() -> Self {
        Self {
            status: LifecycleStatus::Unconfigured,
            registry: WheelRegistry::default(),
            settings: None,
            bus: None,
            connector: Box::new(NoBusConnector),
            handles: Box::new(StandardHandles),
            policy: FaultPolicy::default(),
            stats: CycleStats::default(),
        }
    }

    pub fn with_connector(mut self, connector: impl BusConnector + 'static) -> Self {
        self.connector = Box::new(connector);
        self
    }

    pub fn with_handle_factory(mut self, handles: impl HandleFactory + 'static) -> Self {
        self.handles = Box::new(handles);
        self
    }

    pub fn with_fault_policy(mut self, policy: FaultPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn status(&self) -> LifecycleStatus {
        self.status
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    pub fn registry(&self) -> &WheelRegistry {
        &self.registry
    }

    /// True once a shared bus was opened for real wheels.
    pub fn has_bus(&self) -> bool {
        self.bus.is_some()
    }

    pub fn bus_settings(&self) -> Option<&BusSettings> {
        self.settings.as_ref()
    }

    fn reject(&self, operation: &'static str) -> HardwareError {
        warn!(operation, status = %self.status, "Rejected lifecycle call");
        HardwareError::InvalidTransition {
            operation,
            status: self.status,
        }
    }

    pub fn configure(&mut self, params: &HardwareParameters) -> Result<()> {
        if self.status != LifecycleStatus::Unconfigured {
            return Err(self.reject("configure"));
        }
        info!("Configuring...");

        let config = HardwareConfig::from_parameters(params).inspect_err(|e| {
            error!(error = %e, "Hardware parameters rejected");
        })?;

        let bus = if config.needs_bus() {
            let bus = self.connector.open(&config.bus).map_err(|source| {
                error!(device = %config.bus.device, error = %source, "Bus unavailable");
                HardwareError::BusUnavailable {
                    device: config.bus.device.clone(),
                    source,
                }
            })?;
            info!(
                device = %config.bus.device,
                baud_rate = config.bus.baud_rate,
                timeout_ms = config.bus.timeout_ms,
                "Opened servo bus"
            );
            Some(bus)
        } else {
            None
        };

        let (registry, init_faults) =
            WheelRegistry::build(&config.wheels, &config.bus, bus.as_ref(), &*self.handles)
                .inspect_err(|e| error!(error = %e, "Wheel setup failed"))?;

        self.stats.actuator_faults += init_faults as u64;
        self.registry = registry;
        self.bus = bus;
        info!(
            wheels = self.registry.len(),
            loop_rate_hz = config.bus.loop_rate_hz,
            "Finished configuration"
        );
        self.settings = Some(config.bus);
        self.status = LifecycleStatus::Configured;
        Ok(())
    }

    /// Two bindings per wheel: velocity then position. Empty before configure.
    pub fn export_state_interfaces(&self) -> Vec<StateInterface> {
        self.registry
            .iter()
            .flat_map(|wheel| wheel.state_interfaces())
            .collect()
    }

    /// One binding per wheel, named after the wheel's control mode.
    pub fn export_command_interfaces(&self) -> Vec<CommandInterface> {
        self.registry
            .iter()
            .map(|wheel| wheel.command_interface())
            .collect()
    }

    pub fn activate(&mut self) -> Result<()> {
        if !self.status.can_activate() {
            return Err(self.reject("activate"));
        }
        info!("Starting controller...");

        let mut failed = Vec::new();
        for wheel in self.registry.iter_mut() {
            match wheel.handle_mut().activate() {
                Ok(status) => info!(wheel = %wheel.name, "{status}"),
                Err(e) => {
                    error!(wheel = %wheel.name, bus_id = wheel.bus_id, error = %e, "Wheel activation failed");
                    failed.push(wheel.name.clone());
                }
            }
        }
        self.stats.actuator_faults += failed.len() as u64;

        if !failed.is_empty() && self.policy == FaultPolicy::Strict {
            self.deactivate_all();
            self.status = LifecycleStatus::Error;
            return Err(HardwareError::ActivationAborted { failed });
        }

        self.status = LifecycleStatus::Started;
        Ok(())
    }

    pub fn deactivate(&mut self) -> Result<()> {
        match self.status {
            LifecycleStatus::Stopped => Ok(()),
            status if status.holds_hardware() => {
                info!("Stopping controller...");
                self.deactivate_all();
                self.status = LifecycleStatus::Stopped;
                Ok(())
            }
            _ => Err(self.reject("deactivate")),
        }
    }

    /// Deactivates every wheel, carrying on past failures.
    fn deactivate_all(&mut self) {
        let mut faults = 0u64;
        for wheel in self.registry.iter_mut() {
            match wheel.handle_mut().deactivate() {
                Ok(status) => info!(wheel = %wheel.name, "{status}"),
                Err(e) => {
                    faults += 1;
                    error!(wheel = %wheel.name, bus_id = wheel.bus_id, error = %e, "Wheel deactivation failed");
                }
            }
        }
        self.stats.actuator_faults += faults;
    }

    /// Pulls position and velocity from every wheel into its state slots.
    ///
    /// A failed read keeps the previous value for that field.
    pub fn read(&mut self) -> Result<()> {
        if self.status != LifecycleStatus::Started {
            return Err(self.reject("read"));
        }
        let started = Instant::now();
        let mut faults = 0u64;
        for wheel in self.registry.iter_mut() {
            match wheel.handle_mut().position_degrees() {
                Ok(position) => wheel.position_slot().set(position),
                Err(e) => {
                    faults += 1;
                    warn!(wheel = %wheel.name, error = %e, "Position read failed, keeping last value");
                }
            }
            match wheel.handle_mut().velocity_rpm() {
                Ok(velocity) => wheel.velocity_slot().set(velocity),
                Err(e) => {
                    faults += 1;
                    warn!(wheel = %wheel.name, error = %e, "Velocity read failed, keeping last value");
                }
            }
        }
        self.stats.reads += 1;
        self.stats.read_faults += faults;
        self.stats.record_cycle(started);
        Ok(())
    }

    /// Sends each wheel's goal using the command matching its mode.
    pub fn write(&mut self) -> Result<()> {
        if self.status != LifecycleStatus::Started {
            return Err(self.reject("write"));
        }
        let started = Instant::now();
        let mut faults = 0u64;
        for wheel in self.registry.iter_mut() {
            let goal = wheel.goal_slot().get();
            let mode = wheel.mode;
            let sent = match mode {
                ControlMode::Position => wheel.handle_mut().set_position_degrees(goal),
                ControlMode::Velocity => wheel.handle_mut().set_velocity_rpm(goal),
            };
            if let Err(e) = sent {
                faults += 1;
                warn!(wheel = %wheel.name, goal, error = %e, "Goal write failed");
            }
        }
        self.stats.writes += 1;
        self.stats.write_faults += faults;
        self.stats.record_cycle(started);
        Ok(())
    }
}

impl Drop for DiffHardwareInterface {
    fn drop(&mut self) {
        if self.status.holds_hardware() {
            debug!(status = %self.status, "Releasing wheels on teardown");
            self.deactivate_all();
            self.status = LifecycleStatus::Stopped;
        }
    }
}
