use crate::bus::BusContext;
use crate::hal::{ActuatorFault, ActuatorHandle, ControlMode};
use std::time::Duration;

/// One RPM expressed in degrees per second.
const DEG_PER_S_PER_RPM: f64 = 6.0;

/// Simulated servo that follows commands one control period at a time.
///
/// With a zero time constant the servo echoes every command exactly, which is
/// what the hardware-less test setups rely on.
#[derive(Debug, Clone)]
pub struct SimulatedServo {
    bus_id: Option<u8>,
    mode: ControlMode,
    active: bool,

    position_deg: f64,
    velocity_rpm: f64,

    period_s: f64,
    time_constant_s: f64,
}

impl SimulatedServo {
    pub fn new(period: Duration) -> Self {
        Self {
            bus_id: None,
            mode: ControlMode::Velocity,
            active: false,
            position_deg: 0.0,
            velocity_rpm: 0.0,
            period_s: period.as_secs_f64(),
            time_constant_s: 0.0,
        }
    }

    /// First-order lag toward each command instead of an exact echo.
    pub fn with_time_constant(mut self, time_constant: Duration) -> Self {
        self.time_constant_s = time_constant.as_secs_f64();
        self
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Fraction of the remaining error covered in one period.
    fn response(&self) -> f64 {
        if self.time_constant_s <= 0.0 {
            1.0
        } else {
            1.0 - (-self.period_s / self.time_constant_s).exp()
        }
    }

    fn label(&self) -> String {
        match self.bus_id {
            Some(id) => format!("simulated servo {id}"),
            None => "simulated servo".to_string(),
        }
    }
}

impl Default for SimulatedServo {
    fn default() -> Self {
        Self::new(Duration::from_millis(20))
    }
}

impl ActuatorHandle for SimulatedServo {
    fn setup(
        &mut self,
        bus_id: u8,
        mode: ControlMode,
        _bus: Option<&BusContext>,
    ) -> Result<(), ActuatorFault> {
        if self.bus_id.is_some() {
            return Err(ActuatorFault::AlreadySetUp);
        }
        self.bus_id = Some(bus_id);
        self.mode = mode;
        Ok(())
    }

    fn init(&mut self, seed: f64) -> Result<String, ActuatorFault> {
        if self.bus_id.is_none() {
            return Err(ActuatorFault::NotSetUp);
        }
        self.position_deg = seed;
        self.velocity_rpm = 0.0;
        self.active = false;
        Ok(format!("{} ready in {} mode", self.label(), self.mode))
    }

    fn activate(&mut self) -> Result<String, ActuatorFault> {
        self.active = true;
        Ok(format!("{} torque on", self.label()))
    }

    fn deactivate(&mut self) -> Result<String, ActuatorFault> {
        self.active = false;
        self.velocity_rpm = 0.0;
        Ok(format!("{} torque off", self.label()))
    }

    fn position_degrees(&mut self) -> Result<f64, ActuatorFault> {
        Ok(self.position_deg)
    }

    fn velocity_rpm(&mut self) -> Result<f64, ActuatorFault> {
        Ok(self.velocity_rpm)
    }

    fn set_velocity_rpm(&mut self, rpm: f64) -> Result<(), ActuatorFault> {
        if !self.active {
            return Ok(());
        }
        self.velocity_rpm += (rpm - self.velocity_rpm) * self.response();
        self.position_deg += self.velocity_rpm * DEG_PER_S_PER_RPM * self.period_s;
        Ok(())
    }

    fn set_position_degrees(&mut self, degrees: f64) -> Result<(), ActuatorFault> {
        if !self.active {
            return Ok(());
        }
        let step = (degrees - self.position_deg) * self.response();
        self.position_deg += step;
        self.velocity_rpm = if self.period_s > 0.0 {
            step / self.period_s / DEG_PER_S_PER_RPM
        } else {
            0.0
        };
        Ok(())
    }
}
