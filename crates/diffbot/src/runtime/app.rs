use crate::runtime::config::RuntimeConfig;
use crate::runtime::logging::init_tracing;
use crate::runtime::telemetry::{self, Publisher};
use diffbot_core::{CommandInterface, DiffHardwareInterface};
use diffbot_io::ModbusRtuConnector;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub fn run_from_args() -> ExitCode {
    let config = RuntimeConfig::from_env();
    if config.show_help {
        RuntimeConfig::print_help();
        return ExitCode::SUCCESS;
    }
    run(config)
}

pub fn run(config: RuntimeConfig) -> ExitCode {
    init_tracing(config.log_format);
    telemetry::init();
    let _metrics_handle = telemetry::start_metrics_server(&config.metrics_addr);

    let stop = Arc::new(AtomicBool::new(false));
    install_stop_handler(Arc::clone(&stop));

    for arg in &config.rejected {
        warn!(arg = %arg, "Ignoring unrecognized argument");
    }

    let params = match config.load_parameters() {
        Ok(params) => params,
        Err(e) => {
            error!(error = %e, "Failed to load hardware parameters");
            return ExitCode::FAILURE;
        }
    };

    let mut hw = DiffHardwareInterface::new()
        .with_connector(ModbusRtuConnector)
        .with_fault_policy(config.fault_policy);
    let mut publisher = Publisher::default();

    if let Err(e) = hw.configure(&params) {
        error!(error = %e, "Configuration failed");
        publisher.publish(&hw);
        return ExitCode::FAILURE;
    }

    for state in hw.export_state_interfaces() {
        debug!(interface = %state.full_name(), "Exported state interface");
    }
    let commands = hw.export_command_interfaces();
    for command in &commands {
        debug!(interface = %command.full_name(), "Exported command interface");
    }
    apply_goals(&commands, &config.goals);

    if let Err(e) = hw.activate() {
        error!(error = %e, "Activation failed");
        publisher.publish(&hw);
        return ExitCode::FAILURE;
    }
    publisher.publish(&hw);

    let period = hw
        .bus_settings()
        .map(|settings| settings.loop_period())
        .unwrap_or(Duration::from_millis(20));
    let deadline = config
        .run_seconds
        .map(|seconds| Instant::now() + Duration::from_secs(seconds));
    info!(
        period_ms = period.as_millis() as u64,
        wheels = hw.registry().len(),
        "Running read/write loop"
    );

    let mut cycles_missed = 0u64;
    let mut next_cycle = Instant::now();
    while !stop.load(Ordering::Relaxed)
        && deadline.map_or(true, |deadline| Instant::now() < deadline)
    {
        let now = Instant::now();
        if now < next_cycle {
            thread::sleep(next_cycle - now);
        } else if now - next_cycle > period {
            cycles_missed += 1;
            next_cycle = now;
        }
        next_cycle += period;

        if let Err(e) = hw.read().and_then(|_| hw.write()) {
            error!(error = %e, "Control cycle rejected");
            break;
        }
        publisher.publish(&hw);
    }

    if stop.load(Ordering::Relaxed) {
        info!("Stop requested, releasing wheels");
    }
    if let Err(e) = hw.deactivate() {
        warn!(error = %e, "Deactivation failed");
    }
    publisher.publish(&hw);

    let stats = hw.stats();
    info!(
        reads = stats.reads,
        writes = stats.writes,
        read_faults = stats.read_faults,
        write_faults = stats.write_faults,
        actuator_faults = stats.actuator_faults,
        max_cycle_us = stats.max_cycle_us,
        cycles_missed,
        "Run complete"
    );
    ExitCode::SUCCESS
}

/// Ctrl-C and SIGTERM end the loop so the wheels are deactivated before exit.
fn install_stop_handler(stop: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        stop.store(true, Ordering::Relaxed);
    }) {
        warn!(error = %e, "Failed to install signal handler");
    }
}

/// Writes each `--goal` into the command binding of the named wheel.
fn apply_goals(commands: &[CommandInterface], goals: &[(String, f64)]) {
    for (wheel, value) in goals {
        match commands.iter().find(|c| c.prefix_name() == wheel) {
            Some(command) => {
                command.set_value(*value);
                info!(interface = %command.full_name(), goal = value, "Goal set");
            }
            None => warn!(wheel = %wheel, "No command interface for goal"),
        }
    }
}
