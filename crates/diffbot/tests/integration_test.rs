use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const BIN: &str = env!("CARGO_BIN_EXE_diffbot");

fn run_with(args: &[&str]) -> Output {
    Command::new(BIN)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to run diffbot")
}

fn write_params(dir: &Path, params: serde_json::Value) -> String {
    let path = dir.join("params.json");
    std::fs::write(&path, params.to_string()).unwrap();
    path.to_string_lossy().into_owned()
}

fn sim_params() -> serde_json::Value {
    serde_json::json!({
        "wheel_count": 2,
        "wheel_name_1": "left_wheel",
        "wheel_id_1": 1,
        "wheel_mode_1": 0,
        "real_hardware_1": false,
        "wheel_name_2": "right_wheel",
        "wheel_id_2": 2,
        "wheel_mode_2": 1,
        "real_hardware_2": false,
        "device": "/dev/ttyUSB0",
        "baud_rate": 57600,
        "timeout": 20,
        "loop_rate": 50,
        "enc_counts_per_rev": 4096
    })
}

struct Diffbot {
    child: Child,
}

impl Drop for Diffbot {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn free_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind ephemeral port");
    let port = listener.local_addr().unwrap().port();
    format!("127.0.0.1:{port}")
}

fn wait_until_ready(addr: &str) -> bool {
    let start = Instant::now();
    while start.elapsed() < Duration::from_secs(5) {
        if http_get(addr, "/ready").is_some_and(|ready| ready.contains("200 OK")) {
            return true;
        }
        thread::sleep(Duration::from_millis(100));
    }
    false
}

fn http_get(addr: &str, path: &str) -> Option<String> {
    let mut stream = TcpStream::connect(addr).ok()?;
    stream.set_read_timeout(Some(Duration::from_secs(2))).ok()?;
    write!(stream, "GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n").ok()?;
    let mut body = String::new();
    stream.read_to_string(&mut body).ok()?;
    Some(body)
}

#[test]
fn simulated_params_file_runs_to_completion() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_params(dir.path(), sim_params());

    let out = run_with(&["--params", &path, "--run-seconds", "1", "--goal", "left_wheel=10"]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
}

#[test]
fn zero_wheel_count_exits_with_failure() {
    let dir = tempfile::tempdir().unwrap();
    let mut params = sim_params();
    params["wheel_count"] = serde_json::json!(0);
    let path = write_params(dir.path(), params);

    let out = run_with(&["--params", &path, "--run-seconds", "1"]);
    assert!(!out.status.success());
}

#[test]
fn missing_params_file_exits_with_failure() {
    let out = run_with(&["--params", "/nonexistent/diffbot.json", "--run-seconds", "1"]);
    assert!(!out.status.success());
}

#[test]
fn help_exits_cleanly() {
    let out = run_with(&["--help"]);
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("--params"));
}

#[test]
fn metrics_report_started_wheels_and_goals() {
    let addr = free_addr();
    let child = Command::new(BIN)
        .args([
            "--metrics-addr",
            &addr,
            "--run-seconds",
            "10",
            "--goal",
            "left_wheel=30",
            "--goal",
            "right_wheel=90",
        ])
        .env("RUST_LOG", "warn")
        .stdout(Stdio::null())
        .spawn()
        .expect("Failed to start diffbot");
    let _diffbot = Diffbot { child };

    assert!(wait_until_ready(&addr), "diffbot never became ready");
    let metrics = http_get(&addr, "/metrics").unwrap_or_default();

    assert!(metrics.contains("diffbot_lifecycle_status 2"), "{metrics}");
    assert!(metrics.contains(r#"diffbot_wheel_goal{wheel="left_wheel"} 30"#));
    assert!(metrics.contains(r#"diffbot_wheel_goal{wheel="right_wheel"} 90"#));
}

#[cfg(unix)]
#[test]
fn sigterm_without_run_limit_releases_wheels() {
    let addr = free_addr();
    let mut child = Command::new(BIN)
        .args(["--metrics-addr", &addr, "--log-format", "compact"])
        .env("RUST_LOG", "info")
        .stdout(Stdio::piped())
        .spawn()
        .expect("Failed to start diffbot");
    assert!(wait_until_ready(&addr), "diffbot never became ready");

    let killed = Command::new("kill")
        .args(["-TERM", &child.id().to_string()])
        .status()
        .expect("Failed to run kill");
    assert!(killed.success());

    let start = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        if start.elapsed() > Duration::from_secs(5) {
            let _ = child.kill();
            panic!("diffbot did not stop after SIGTERM");
        }
        thread::sleep(Duration::from_millis(50));
    };
    assert!(status.success());

    let mut logs = String::new();
    child.stdout.take().unwrap().read_to_string(&mut logs).unwrap();
    assert!(logs.contains("Stop requested"), "{logs}");
    assert!(logs.contains("Run complete"), "{logs}");
}
