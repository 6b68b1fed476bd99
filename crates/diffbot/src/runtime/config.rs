use crate::runtime::logging::LogFormat;
use diffbot_core::params::*;
use diffbot_core::{FaultPolicy, HardwareError, HardwareParameters};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read parameter file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Parameters(#[from] HardwareError),
}

#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    pub show_help: bool,
    pub run_seconds: Option<u64>,
    pub params_path: Option<PathBuf>,
    pub log_format: LogFormat,
    pub metrics_addr: Option<String>,
    pub fault_policy: FaultPolicy,
    /// Constant goals written to command interfaces, by wheel name.
    pub goals: Vec<(String, f64)>,
    /// Arguments that could not be understood; reported once logging is up.
    pub rejected: Vec<String>,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_args(&args)
    }

    pub fn from_args(args: &[String]) -> Self {
        let mut cfg = RuntimeConfig::default();
        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1);
            match (args[i].as_str(), value) {
                ("--params", Some(path)) => {
                    cfg.params_path = Some(PathBuf::from(path));
                    i += 1;
                }
                ("--run-seconds", Some(secs)) => {
                    cfg.run_seconds = secs.parse::<u64>().ok();
                    if cfg.run_seconds.is_none() {
                        cfg.rejected.push(format!("--run-seconds {secs}"));
                    }
                    i += 1;
                }
                ("--metrics-addr", Some(addr)) => {
                    cfg.metrics_addr = Some(addr.clone());
                    i += 1;
                }
                ("--log-format", Some(name)) => {
                    match name.parse() {
                        Ok(format) => cfg.log_format = format,
                        Err(_) => cfg.rejected.push(format!("--log-format {name}")),
                    }
                    i += 1;
                }
                ("--goal", Some(goal)) => {
                    match parse_goal(goal) {
                        Some(parsed) => cfg.goals.push(parsed),
                        None => cfg.rejected.push(format!("--goal {goal}")),
                    }
                    i += 1;
                }
                ("--json-logs", _) => {
                    cfg.log_format = LogFormat::Json;
                }
                ("--strict", _) => {
                    cfg.fault_policy = FaultPolicy::Strict;
                }
                ("--help" | "-h", _) => {
                    cfg.show_help = true;
                    break;
                }
                (other, _) => cfg.rejected.push(other.to_string()),
            }
            i += 1;
        }
        cfg
    }

    /// Parameters from `--params`, or the built-in simulated differential drive.
    pub fn load_parameters(&self) -> Result<HardwareParameters, ConfigError> {
        match &self.params_path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.clone(),
                    source,
                })?;
                Ok(HardwareParameters::from_json_str(&raw)?)
            }
            None => Ok(default_parameters()),
        }
    }

    pub fn print_help() {
        println!(
            r#"diffbot - differential-drive wheel hardware adapter

USAGE:
    diffbot [OPTIONS]

OPTIONS:
    --params <PATH>         JSON file with hardware parameters (flat object)
                            [default: two simulated wheels]
    --goal <WHEEL>=<VALUE>  Constant goal for a wheel's command interface (repeatable)
    --run-seconds <SECS>    Run for a fixed duration then deactivate and exit
    --strict                Abort activation if any wheel fails to activate
    --log-format <NAME>     Log output (pretty|compact|json) [default: pretty]
    --json-logs             Same as --log-format json
    --metrics-addr <ADDR>   Enable Prometheus metrics server on address (e.g., 0.0.0.0:9090)
    -h, --help              Print this help message

PARAMETERS:
    wheel_count, wheel_name_<i>, wheel_id_<i>, wheel_mode_<i> (0=velocity, 1=position),
    real_hardware_<i> (0=simulated, 1=bus servo), device, baud_rate, timeout,
    loop_rate, enc_counts_per_rev

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log filter (e.g., RUST_LOG=debug,diffbot_core=trace)

EXAMPLES:
    # Simulated drive, left wheel at 30 rpm, right wheel to 90 degrees
    diffbot --goal left_wheel=30 --goal right_wheel=90 --run-seconds 5

    # Real servos with metrics
    diffbot --params robot.json --metrics-addr 0.0.0.0:9090
"#
        );
    }
}

fn parse_goal(raw: &str) -> Option<(String, f64)> {
    let (wheel, value) = raw.split_once('=')?;
    let wheel = wheel.trim();
    if wheel.is_empty() {
        return None;
    }
    Some((wheel.to_string(), value.trim().parse().ok()?))
}

/// Left wheel in velocity mode, right wheel in position mode, both simulated.
pub fn default_parameters() -> HardwareParameters {
    HardwareParameters::new()
        .with(WHEEL_COUNT, 2)
        .with("wheel_name_1", "left_wheel")
        .with("wheel_id_1", 1)
        .with("wheel_mode_1", 0)
        .with("real_hardware_1", 0)
        .with("wheel_name_2", "right_wheel")
        .with("wheel_id_2", 2)
        .with("wheel_mode_2", 1)
        .with("real_hardware_2", 0)
        .with(DEVICE, "/dev/ttyUSB0")
        .with(BAUD_RATE, 57_600)
        .with(TIMEOUT, 20)
        .with(LOOP_RATE, 50)
        .with(ENC_COUNTS_PER_REV, 4096)
}
