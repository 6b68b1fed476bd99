use diffbot_core::bus::share;
use diffbot_core::{BusConnector, BusContext, BusError, BusSettings, ServoBus};
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;
use tokio_serial::SerialStream;
use tracing::{debug, info};

/// Servo bus speaking Modbus RTU over a serial port.
///
/// Every transaction blocks the calling thread on a private current-thread
/// runtime and is cut off after the configured timeout.
pub struct ModbusRtuBus {
    ctx: Context,
    timeout: Duration,
    runtime: Runtime,
}

impl ModbusRtuBus {
    pub fn open(settings: &BusSettings) -> Result<Self, BusError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let builder = tokio_serial::new(settings.device.as_str(), settings.baud_rate)
            .timeout(settings.timeout());
        let ctx = runtime
            .block_on(async {
                let port = SerialStream::open(&builder)?;
                Ok::<_, tokio_serial::Error>(rtu::attach_slave(port, Slave(1)))
            })
            .map_err(|e| BusError::Unavailable(format!("{}: {e}", settings.device)))?;

        info!(
            device = %settings.device,
            baud_rate = settings.baud_rate,
            "Modbus RTU port open"
        );

        Ok(Self {
            ctx,
            timeout: settings.timeout(),
            runtime,
        })
    }
}

fn transact<T, F>(runtime: &Runtime, timeout: Duration, id: u8, request: F) -> Result<T, BusError>
where
    F: Future<Output = io::Result<T>>,
{
    match runtime.block_on(tokio::time::timeout(timeout, request)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(BusError::Io(e)),
        Err(_) => Err(BusError::Timeout { id, after: timeout }),
    }
}

impl ServoBus for ModbusRtuBus {
    fn read_registers(&mut self, id: u8, addr: u16, count: u16) -> Result<Vec<u16>, BusError> {
        let Self {
            ctx,
            timeout,
            runtime,
            ..
        } = self;
        ctx.set_slave(Slave(id));
        let words = transact(runtime, *timeout, id, ctx.read_holding_registers(addr, count))?;
        debug!(id, addr, count, "Read holding registers");
        Ok(words)
    }

    fn write_registers(&mut self, id: u8, addr: u16, values: &[u16]) -> Result<(), BusError> {
        let Self {
            ctx,
            timeout,
            runtime,
            ..
        } = self;
        ctx.set_slave(Slave(id));
        transact(
            runtime,
            *timeout,
            id,
            ctx.write_multiple_registers(addr, values),
        )
    }
}

/// Opens a `ModbusRtuBus` on the configured serial device.
#[derive(Debug, Default, Clone, Copy)]
pub struct ModbusRtuConnector;

impl BusConnector for ModbusRtuConnector {
    fn open(&self, settings: &BusSettings) -> Result<BusContext, BusError> {
        Ok(share(ModbusRtuBus::open(settings)?))
    }
}
