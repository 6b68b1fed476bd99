use crate::bus::BusError;
use crate::hal::ActuatorFault;
use crate::lifecycle::LifecycleStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("hardware parameters are not a flat JSON object: {0}")]
    MalformedParameters(#[from] serde_json::Error),
    #[error("missing hardware parameter `{key}`")]
    MissingParameter { key: String },
    #[error("hardware parameter `{key}` = {value:?} is invalid: {reason}")]
    InvalidParameter {
        key: String,
        value: String,
        reason: String,
    },
    #[error("wheel_count must be positive, got {0}")]
    NonPositiveWheelCount(i64),
    #[error("wheel name `{0}` is declared more than once")]
    DuplicateWheelName(String),
    #[error("bus id {id} is shared by `{first}` and `{second}`")]
    DuplicateBusId {
        id: u8,
        first: String,
        second: String,
    },
    #[error("wheel `{wheel}` rejected its setup: {source}")]
    Setup {
        wheel: String,
        #[source]
        source: ActuatorFault,
    },
    #[error("cannot open bus device `{device}`: {source}")]
    BusUnavailable {
        device: String,
        #[source]
        source: BusError,
    },
    #[error("`{operation}` is not allowed while {status}")]
    InvalidTransition {
        operation: &'static str,
        status: LifecycleStatus,
    },
    #[error("activation aborted, wheels failed to activate: {}", failed.join(", "))]
    ActivationAborted { failed: Vec<String> },
}

impl HardwareError {
    /// Errors that abort `configure` and leave the interface unconfigured.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MalformedParameters(_)
                | Self::MissingParameter { .. }
                | Self::InvalidParameter { .. }
                | Self::NonPositiveWheelCount(_)
                | Self::DuplicateWheelName(_)
                | Self::DuplicateBusId { .. }
                | Self::Setup { .. }
                | Self::BusUnavailable { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, HardwareError>;
