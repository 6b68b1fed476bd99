//! Hardware parameters as handed over by the robot description loader.
//!
//! Keys follow the flat `wheel_<field>_<i>` naming with wheels numbered from 1.

use crate::error::{HardwareError, Result};
use crate::hal::ControlMode;
use crate::wheel::Backing;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;
use std::time::Duration;

pub const WHEEL_COUNT: &str = "wheel_count";
pub const DEVICE: &str = "device";
pub const BAUD_RATE: &str = "baud_rate";
pub const TIMEOUT: &str = "timeout";
pub const LOOP_RATE: &str = "loop_rate";
pub const ENC_COUNTS_PER_REV: &str = "enc_counts_per_rev";

pub fn wheel_key(field: &str, index: usize) -> String {
    format!("{field}_{index}")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HardwareParameters(BTreeMap<String, String>);

impl HardwareParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) {
        self.0.insert(key.into(), value.to_string());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Parses a flat JSON object. Scalars are stringified; booleans become `1`/`0`.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let object: serde_json::Map<String, Value> = serde_json::from_str(raw)?;
        let mut params = Self::new();
        for (key, value) in object {
            let text = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => u8::from(b).to_string(),
                other => {
                    return Err(HardwareError::InvalidParameter {
                        key,
                        value: other.to_string(),
                        reason: "expected a string, number or boolean".to_string(),
                    })
                }
            };
            params.0.insert(key, text);
        }
        Ok(params)
    }

    fn required(&self, key: &str) -> Result<&str> {
        self.get(key)
            .map(str::trim)
            .ok_or_else(|| HardwareError::MissingParameter {
                key: key.to_string(),
            })
    }

    fn number<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.required(key)?;
        raw.parse::<T>().map_err(|e| HardwareError::InvalidParameter {
            key: key.to_string(),
            value: raw.to_string(),
            reason: e.to_string(),
        })
    }

    fn positive<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr + Default + PartialOrd,
        T::Err: std::fmt::Display,
    {
        let value: T = self.number(key)?;
        if value <= T::default() {
            return Err(HardwareError::InvalidParameter {
                key: key.to_string(),
                value: self.required(key)?.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(value)
    }

    fn binary(&self, key: &str) -> Result<bool> {
        match self.number::<i64>(key)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(HardwareError::InvalidParameter {
                key: key.to_string(),
                value: other.to_string(),
                reason: "expected 0 or 1".to_string(),
            }),
        }
    }
}

/// Settings for the shared servo bus and encoder scaling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusSettings {
    pub device: String,
    pub baud_rate: u32,
    pub timeout_ms: u64,
    pub loop_rate_hz: u32,
    pub enc_counts_per_rev: u32,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            device: "/dev/ttyUSB0".to_string(),
            baud_rate: 57_600,
            timeout_ms: 20,
            loop_rate_hz: 50,
            enc_counts_per_rev: 4096,
        }
    }
}

impl BusSettings {
    pub fn from_parameters(params: &HardwareParameters) -> Result<Self> {
        Ok(Self {
            device: params.required(DEVICE)?.to_string(),
            baud_rate: params.positive(BAUD_RATE)?,
            timeout_ms: params.positive(TIMEOUT)?,
            loop_rate_hz: params.positive(LOOP_RATE)?,
            enc_counts_per_rev: params.positive(ENC_COUNTS_PER_REV)?,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// One control period at `loop_rate_hz`.
    pub fn loop_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.loop_rate_hz.max(1)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WheelSpec {
    pub name: String,
    pub bus_id: u8,
    pub mode: ControlMode,
    pub backing: Backing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareConfig {
    pub bus: BusSettings,
    pub wheels: Vec<WheelSpec>,
}

impl HardwareConfig {
    pub fn from_parameters(params: &HardwareParameters) -> Result<Self> {
        let count: i64 = params.number(WHEEL_COUNT)?;
        if count <= 0 {
            return Err(HardwareError::NonPositiveWheelCount(count));
        }

        let mut wheels = Vec::with_capacity((count as usize).min(256));
        for index in 1..=count as usize {
            let name_key = wheel_key("wheel_name", index);
            let name = params.required(&name_key)?;
            if name.is_empty() {
                return Err(HardwareError::InvalidParameter {
                    key: name_key,
                    value: String::new(),
                    reason: "wheel name must not be empty".to_string(),
                });
            }
            let mode = if params.binary(&wheel_key("wheel_mode", index))? {
                ControlMode::Position
            } else {
                ControlMode::Velocity
            };
            let backing = if params.binary(&wheel_key("real_hardware", index))? {
                Backing::Real
            } else {
                Backing::Simulated
            };
            wheels.push(WheelSpec {
                name: name.to_string(),
                bus_id: params.number(&wheel_key("wheel_id", index))?,
                mode,
                backing,
            });
        }
        check_unique(&wheels)?;

        Ok(Self {
            bus: BusSettings::from_parameters(params)?,
            wheels,
        })
    }

    /// True when at least one wheel talks to the physical bus.
    pub fn needs_bus(&self) -> bool {
        self.wheels.iter().any(|w| w.backing == Backing::Real)
    }
}

pub(crate) fn check_unique(wheels: &[WheelSpec]) -> Result<()> {
    let mut names: HashSet<&str> = HashSet::with_capacity(wheels.len());
    let mut ids: HashMap<u8, &str> = HashMap::with_capacity(wheels.len());
    for wheel in wheels {
        if !names.insert(wheel.name.as_str()) {
            return Err(HardwareError::DuplicateWheelName(wheel.name.clone()));
        }
        // Simulated wheels never address the bus.
        if wheel.backing != Backing::Real {
            continue;
        }
        if let Some(first) = ids.insert(wheel.bus_id, wheel.name.as_str()) {
            return Err(HardwareError::DuplicateBusId {
                id: wheel.bus_id,
                first: first.to_string(),
                second: wheel.name.clone(),
            });
        }
    }
    Ok(())
}
