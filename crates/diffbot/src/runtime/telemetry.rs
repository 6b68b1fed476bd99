use diffbot_core::{CycleStats, DiffHardwareInterface};
use diffbot_io::metrics::{
    init_metrics, serve_metrics, ACTUATOR_FAULTS, CYCLES_EXECUTED, CYCLE_TIME_US,
    LIFECYCLE_STATUS, READ_FAULTS, WHEEL_GOAL, WHEEL_POSITION_DEG, WHEEL_VELOCITY_RPM,
    WRITE_FAULTS,
};
use std::thread;
use tracing::info;

pub fn init() {
    init_metrics();
}

pub fn start_metrics_server(addr: &Option<String>) -> Option<thread::JoinHandle<()>> {
    addr.as_ref().map(|addr| {
        info!(addr = %addr, "Starting metrics server");
        serve_metrics(addr.clone())
    })
}

/// Mirrors the interface's counters and wheel slots into Prometheus.
///
/// Counters are advanced by the difference since the previous publish.
#[derive(Debug, Default)]
pub struct Publisher {
    last: CycleStats,
}

impl Publisher {
    pub fn publish(&mut self, hw: &DiffHardwareInterface) {
        let stats = hw.stats();
        CYCLES_EXECUTED.inc_by(stats.writes.saturating_sub(self.last.writes));
        READ_FAULTS.inc_by(stats.read_faults.saturating_sub(self.last.read_faults));
        WRITE_FAULTS.inc_by(stats.write_faults.saturating_sub(self.last.write_faults));
        ACTUATOR_FAULTS.inc_by(stats.actuator_faults.saturating_sub(self.last.actuator_faults));
        if stats.reads + stats.writes > self.last.reads + self.last.writes {
            CYCLE_TIME_US.observe(stats.last_cycle_us as f64);
        }
        LIFECYCLE_STATUS.set(f64::from(hw.status().code()));

        for wheel in hw.registry() {
            let label = [wheel.name.as_str()];
            WHEEL_POSITION_DEG
                .with_label_values(&label)
                .set(wheel.position());
            WHEEL_VELOCITY_RPM
                .with_label_values(&label)
                .set(wheel.velocity());
            WHEEL_GOAL.with_label_values(&label).set(wheel.goal());
        }
        self.last = stats.clone();
    }
}
