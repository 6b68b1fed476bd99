use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    #[default]
    Unconfigured,
    Configured,
    Started,
    Stopped,
    Error,
}

impl LifecycleStatus {
    /// Numeric code for gauges (0=unconfigured .. 4=error).
    pub fn code(self) -> u8 {
        match self {
            Self::Unconfigured => 0,
            Self::Configured => 1,
            Self::Started => 2,
            Self::Stopped => 3,
            Self::Error => 4,
        }
    }

    pub fn can_activate(self) -> bool {
        matches!(self, Self::Configured | Self::Stopped)
    }

    /// States in which handles may still be driving and need a deactivate pass.
    pub fn holds_hardware(self) -> bool {
        matches!(self, Self::Configured | Self::Started | Self::Error)
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unconfigured => "unconfigured",
            Self::Configured => "configured",
            Self::Started => "started",
            Self::Stopped => "stopped",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// What `activate` does when some wheels fail to come up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultPolicy {
    /// Log the failed wheels and finish the transition.
    #[default]
    Tolerant,
    /// Deactivate everything and enter `Error`.
    Strict,
}
