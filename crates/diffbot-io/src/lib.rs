pub mod metrics;
pub mod modbus_bus;

pub use metrics::{init_metrics, serve_metrics};
pub use modbus_bus::{ModbusRtuBus, ModbusRtuConnector};
