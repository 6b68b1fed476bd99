use crate::bus::{lock, BusContext, BusError};
use crate::hal::{ActuatorFault, ActuatorHandle, ControlMode};

/// Holding-register layout of a bus servo.
///
/// Positions are 32-bit encoder counts split over two registers, high word
/// first. Velocities are signed 16-bit in 0.1 RPM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterMap {
    pub model_number: u16,
    pub torque_enable: u16,
    pub operating_mode: u16,
    pub goal_velocity: u16,
    pub goal_position: u16,
    pub present_velocity: u16,
    pub present_position: u16,
    pub velocity_mode_code: u16,
    pub position_mode_code: u16,
}

impl Default for RegisterMap {
    fn default() -> Self {
        Self {
            model_number: 0,
            torque_enable: 1,
            operating_mode: 2,
            goal_velocity: 3,
            goal_position: 4,
            present_velocity: 10,
            present_position: 11,
            velocity_mode_code: 1,
            position_mode_code: 3,
        }
    }
}

const VELOCITY_SCALE: f64 = 10.0;

pub(crate) fn words_to_i32(words: [u16; 2]) -> i32 {
    ((u32::from(words[0]) << 16) | u32::from(words[1])) as i32
}

pub(crate) fn i32_to_words(value: i32) -> [u16; 2] {
    let raw = value as u32;
    [(raw >> 16) as u16, raw as u16]
}

/// A servo on the shared bus.
pub struct BusServo {
    registers: RegisterMap,
    counts_per_rev: u32,
    bus: Option<BusContext>,
    bus_id: Option<u8>,
    mode: ControlMode,
    configured_mode: bool,
    active: bool,
}

impl BusServo {
    pub fn new(counts_per_rev: u32) -> Self {
        Self::with_registers(counts_per_rev, RegisterMap::default())
    }

    pub fn with_registers(counts_per_rev: u32, registers: RegisterMap) -> Self {
        Self {
            registers,
            counts_per_rev: counts_per_rev.max(1),
            bus: None,
            bus_id: None,
            mode: ControlMode::Velocity,
            configured_mode: false,
            active: false,
        }
    }

    fn target(&self) -> Result<(&BusContext, u8), ActuatorFault> {
        match (&self.bus, self.bus_id) {
            (Some(bus), Some(id)) => Ok((bus, id)),
            _ => Err(ActuatorFault::NotSetUp),
        }
    }

    fn read(&self, addr: u16, count: u16) -> Result<Vec<u16>, ActuatorFault> {
        let (bus, id) = self.target()?;
        let words = lock(bus)?.read_registers(id, addr, count)?;
        if words.len() < count as usize {
            return Err(BusError::ShortResponse {
                id,
                expected: count as usize,
                got: words.len(),
            }
            .into());
        }
        Ok(words)
    }

    fn write(&self, addr: u16, values: &[u16]) -> Result<(), ActuatorFault> {
        let (bus, id) = self.target()?;
        lock(bus)?.write_registers(id, addr, values)?;
        Ok(())
    }

    fn mode_code(&self) -> u16 {
        match self.mode {
            ControlMode::Velocity => self.registers.velocity_mode_code,
            ControlMode::Position => self.registers.position_mode_code,
        }
    }

    /// Operating mode is only writable with torque off.
    fn write_operating_mode(&mut self) -> Result<(), ActuatorFault> {
        self.configured_mode = false;
        self.write(self.registers.torque_enable, &[0])?;
        self.write(self.registers.operating_mode, &[self.mode_code()])?;
        self.configured_mode = true;
        Ok(())
    }

    fn counts_to_degrees(&self, counts: i32) -> f64 {
        f64::from(counts) * 360.0 / f64::from(self.counts_per_rev)
    }

    fn degrees_to_counts(&self, degrees: f64) -> i32 {
        let counts = (degrees / 360.0 * f64::from(self.counts_per_rev)).round();
        counts.clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32
    }
}

impl ActuatorHandle for BusServo {
    fn setup(
        &mut self,
        bus_id: u8,
        mode: ControlMode,
        bus: Option<&BusContext>,
    ) -> Result<(), ActuatorFault> {
        if self.bus_id.is_some() {
            return Err(ActuatorFault::AlreadySetUp);
        }
        let bus = bus.ok_or(ActuatorFault::MissingBus)?;
        self.bus = Some(bus.clone());
        self.bus_id = Some(bus_id);
        self.mode = mode;
        Ok(())
    }

    fn init(&mut self, _seed: f64) -> Result<String, ActuatorFault> {
        self.active = false;
        self.configured_mode = false;
        let model = self.read(self.registers.model_number, 1)?[0];
        self.write_operating_mode()?;
        let (_, id) = self.target()?;
        Ok(format!("servo {id} (model {model}) ready in {} mode", self.mode))
    }

    fn activate(&mut self) -> Result<String, ActuatorFault> {
        let (_, id) = self.target()?;
        if !self.active {
            // init may have failed before the mode reached the servo.
            if !self.configured_mode {
                self.write_operating_mode()?;
            }
            self.write(self.registers.torque_enable, &[1])?;
            self.active = true;
        }
        Ok(format!("servo {id} torque on"))
    }

    fn deactivate(&mut self) -> Result<String, ActuatorFault> {
        let Ok((_, id)) = self.target() else {
            return Ok("servo was never set up, nothing to release".to_string());
        };
        self.active = false;
        let halt = match self.mode {
            ControlMode::Velocity => self.write(self.registers.goal_velocity, &[0]),
            ControlMode::Position => Ok(()),
        };
        self.write(self.registers.torque_enable, &[0])?;
        halt?;
        Ok(format!("servo {id} torque off"))
    }

    fn position_degrees(&mut self) -> Result<f64, ActuatorFault> {
        let words = self.read(self.registers.present_position, 2)?;
        Ok(self.counts_to_degrees(words_to_i32([words[0], words[1]])))
    }

    fn velocity_rpm(&mut self) -> Result<f64, ActuatorFault> {
        let words = self.read(self.registers.present_velocity, 1)?;
        Ok(f64::from(words[0] as i16) / VELOCITY_SCALE)
    }

    fn set_velocity_rpm(&mut self, rpm: f64) -> Result<(), ActuatorFault> {
        let raw = (rpm * VELOCITY_SCALE)
            .round()
            .clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16;
        self.write(self.registers.goal_velocity, &[raw as u16])
    }

    fn set_position_degrees(&mut self, degrees: f64) -> Result<(), ActuatorFault> {
        let words = i32_to_words(self.degrees_to_counts(degrees));
        self.write(self.registers.goal_position, &words)
    }
}
