use crate::params::BusSettings;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("servo {id} did not answer within {after:?}")]
    Timeout { id: u8, after: Duration },
    #[error("bus I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("servo {id} returned {got} registers, expected {expected}")]
    ShortResponse { id: u8, expected: usize, got: usize },
    #[error("bus lock poisoned by a panicked caller")]
    Poisoned,
    #[error("bus unavailable: {0}")]
    Unavailable(String),
}

/// Register-level access to the servos sharing one physical bus.
///
/// Framing, checksums and retransmission belong to the implementor.
pub trait ServoBus: Send {
    fn read_registers(&mut self, id: u8, addr: u16, count: u16) -> Result<Vec<u16>, BusError>;
    fn write_registers(&mut self, id: u8, addr: u16, values: &[u16]) -> Result<(), BusError>;
}

/// The port/protocol pair every real wheel on a bus goes through.
pub type BusContext = Arc<Mutex<dyn ServoBus>>;

pub fn share<B: ServoBus + 'static>(bus: B) -> BusContext {
    Arc::new(Mutex::new(bus))
}

pub fn lock(bus: &BusContext) -> Result<MutexGuard<'_, dyn ServoBus + 'static>, BusError> {
    bus.lock().map_err(|_| BusError::Poisoned)
}

/// Opens the shared bus described by the hardware parameters.
pub trait BusConnector: Send {
    fn open(&self, settings: &BusSettings) -> Result<BusContext, BusError>;
}

/// Connector for builds without a bus transport; real wheels cannot be configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBusConnector;

impl BusConnector for NoBusConnector {
    fn open(&self, settings: &BusSettings) -> Result<BusContext, BusError> {
        Err(BusError::Unavailable(format!(
            "no bus transport compiled in for {}",
            settings.device
        )))
    }
}
