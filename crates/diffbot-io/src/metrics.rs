//! Prometheus metrics for the wheel hardware adapter.
//!
//! Counters track the read/write cycle and actuator faults; gauges mirror the
//! lifecycle status and the per-wheel interface values.

use prometheus::{
    Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::thread;
use tiny_http::{Response, Server};

/// Global metrics registry
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Cycle Metrics
// ============================================================================

/// Completed read/write cycles
pub static CYCLES_EXECUTED: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "diffbot_cycles_executed_total",
        "Completed read/write control cycles",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Sensor reads that failed and left a stale value
pub static READ_FAULTS: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "diffbot_read_faults_total",
        "Wheel sensor reads that failed (value kept from the previous cycle)",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Goal writes that failed
pub static WRITE_FAULTS: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new("diffbot_write_faults_total", "Wheel goal writes that failed")
        .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// init/activate/deactivate failures
pub static ACTUATOR_FAULTS: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "diffbot_actuator_faults_total",
        "Wheel init, activate or deactivate calls that failed",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Time spent in the adapter's read or write pass, in microseconds
pub static CYCLE_TIME_US: LazyLock<Histogram> = LazyLock::new(|| {
    let histogram = Histogram::with_opts(
        HistogramOpts::new(
            "diffbot_cycle_time_microseconds",
            "Duration of one read or write pass in microseconds",
        )
        .buckets(vec![
            10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0,
        ]),
    )
    .unwrap();
    REGISTRY.register(Box::new(histogram.clone())).unwrap();
    histogram
});

// ============================================================================
// Interface Metrics
// ============================================================================

/// Lifecycle status (0=unconfigured,1=configured,2=started,3=stopped,4=error)
pub static LIFECYCLE_STATUS: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(
        "diffbot_lifecycle_status",
        "Lifecycle status (0=unconfigured,1=configured,2=started,3=stopped,4=error)",
    )
    .unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

fn wheel_gauge(name: &str, help: &str) -> GaugeVec {
    let gauge = GaugeVec::new(Opts::new(name, help), &["wheel"]).unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
}

/// Last read wheel position in degrees
pub static WHEEL_POSITION_DEG: LazyLock<GaugeVec> = LazyLock::new(|| {
    wheel_gauge(
        "diffbot_wheel_position_degrees",
        "Last read wheel position in degrees",
    )
});

/// Last read wheel velocity in RPM
pub static WHEEL_VELOCITY_RPM: LazyLock<GaugeVec> = LazyLock::new(|| {
    wheel_gauge("diffbot_wheel_velocity_rpm", "Last read wheel velocity in RPM")
});

/// Goal last sent to the wheel (degrees or RPM by control mode)
pub static WHEEL_GOAL: LazyLock<GaugeVec> = LazyLock::new(|| {
    wheel_gauge(
        "diffbot_wheel_goal",
        "Goal last written to the wheel (degrees or RPM by control mode)",
    )
});

// ============================================================================
// Metrics HTTP Server
// ============================================================================

/// Start the metrics HTTP server on the given address.
/// Returns a join handle for the server thread.
pub fn serve_metrics(bind_addr: String) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let server = match Server::http(&bind_addr) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(addr = %bind_addr, error = %e, "Failed to start metrics server");
                return;
            }
        };

        tracing::info!("Metrics server listening on http://{}/metrics", bind_addr);

        for request in server.incoming_requests() {
            match request.url() {
                "/metrics" => {
                    let encoder = TextEncoder::new();
                    let mut buffer = Vec::new();

                    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
                        tracing::warn!(error = %e, "Failed to encode metrics");
                        let _ = request.respond(
                            Response::from_string("Internal Server Error").with_status_code(500),
                        );
                        continue;
                    }

                    let mut response = Response::from_data(buffer);
                    if let Ok(header) = tiny_http::Header::from_bytes(
                        &b"Content-Type"[..],
                        &b"text/plain; version=0.0.4"[..],
                    ) {
                        response = response.with_header(header);
                    }
                    let _ = request.respond(response);
                }
                "/health" => {
                    let _ = request.respond(Response::from_string("OK"));
                }
                "/ready" => {
                    // Ready once the wheels are started
                    if LIFECYCLE_STATUS.get() == 2.0 {
                        let _ = request.respond(Response::from_string("Ready"));
                    } else {
                        let _ = request
                            .respond(Response::from_string("Not Ready").with_status_code(503));
                    }
                }
                _ => {
                    let _ =
                        request.respond(Response::from_string("Not Found").with_status_code(404));
                }
            }
        }
    })
}

/// Initialize all metrics (forces lazy initialization)
pub fn init_metrics() {
    let _ = CYCLES_EXECUTED.get();
    let _ = READ_FAULTS.get();
    let _ = WRITE_FAULTS.get();
    let _ = ACTUATOR_FAULTS.get();
    let _ = CYCLE_TIME_US.get_sample_count();
    let _ = LIFECYCLE_STATUS.get();
    let _ = LazyLock::force(&WHEEL_POSITION_DEG);
    let _ = LazyLock::force(&WHEEL_VELOCITY_RPM);
    let _ = LazyLock::force(&WHEEL_GOAL);
}
