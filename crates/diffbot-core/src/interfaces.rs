//! Named state and command channels shared with the control loop.
//!
//! A binding holds a clone of the wheel's slot rather than a pointer into it,
//! so the controller's writes land in the same cell `write()` reads from, and
//! `read()` results show up in every state binding without a copy step.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const HW_IF_POSITION: &str = "position";
pub const HW_IF_VELOCITY: &str = "velocity";

/// Shared `f64` cell.
#[derive(Clone, Default)]
pub struct InterfaceSlot(Arc<AtomicU64>);

impl InterfaceSlot {
    pub fn new(value: f64) -> Self {
        Self(Arc::new(AtomicU64::new(value.to_bits())))
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Release);
    }
}

impl fmt::Debug for InterfaceSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InterfaceSlot").field(&self.get()).finish()
    }
}

/// Read-only view of one sensor value.
#[derive(Debug, Clone)]
pub struct StateInterface {
    prefix: String,
    interface: &'static str,
    slot: InterfaceSlot,
}

impl StateInterface {
    pub fn new(prefix: impl Into<String>, interface: &'static str, slot: InterfaceSlot) -> Self {
        Self {
            prefix: prefix.into(),
            interface,
            slot,
        }
    }

    pub fn prefix_name(&self) -> &str {
        &self.prefix
    }

    pub fn interface_name(&self) -> &'static str {
        self.interface
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.prefix, self.interface)
    }

    pub fn value(&self) -> f64 {
        self.slot.get()
    }
}

/// Read-write channel the controller commands a wheel through.
#[derive(Debug, Clone)]
pub struct CommandInterface {
    prefix: String,
    interface: &'static str,
    slot: InterfaceSlot,
}

impl CommandInterface {
    pub fn new(prefix: impl Into<String>, interface: &'static str, slot: InterfaceSlot) -> Self {
        Self {
            prefix: prefix.into(),
            interface,
            slot,
        }
    }

    pub fn prefix_name(&self) -> &str {
        &self.prefix
    }

    pub fn interface_name(&self) -> &'static str {
        self.interface
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.prefix, self.interface)
    }

    pub fn value(&self) -> f64 {
        self.slot.get()
    }

    pub fn set_value(&self, value: f64) {
        self.slot.set(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bindings_alias_their_slot() {
        let slot = InterfaceSlot::new(0.0);
        let cmd = CommandInterface::new("left_wheel", HW_IF_VELOCITY, slot.clone());
        let state = StateInterface::new("left_wheel", HW_IF_VELOCITY, slot.clone());

        cmd.set_value(-4.5);
        assert_eq!(slot.get(), -4.5);
        assert_eq!(state.value(), -4.5);
        assert_eq!(cmd.full_name(), "left_wheel/velocity");
    }

    #[test]
    fn slot_preserves_non_finite_bits() {
        let slot = InterfaceSlot::default();
        assert_eq!(slot.get(), 0.0);
        slot.set(f64::NEG_INFINITY);
        assert_eq!(slot.get(), f64::NEG_INFINITY);
        slot.set(f64::NAN);
        assert!(slot.get().is_nan());
    }
}
