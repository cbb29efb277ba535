use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Defaults apart from a shorter settle hold so sim runs stay quick.
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[serial]
port = "/dev/null"

[timing]
settle_hold_ms = 50
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn linact(cfg: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("linact").unwrap();
    cmd.arg("--config").arg(cfg).arg("--log-level").arg("error");
    for key in [
        "LINACT_SIM_JAM_AT",
        "LINACT_SIM_GARBLE_EVERY",
        "LINACT_SIM_SAFETY_OPEN",
        "LINACT_SIM_START",
        "RUST_LOG",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["ramp", "--start", "0", "--end", "10", "--points", "2"], 0, "7.61", "stdout")]
#[case(&["query"], 0, "position 500.0000", "stdout")]
#[case(&["home"], 0, "Homed", "stdout")]
#[case(&["extend"], 0, "extend: completed", "stdout")]
#[case(&["rezero", "--position", "480"], 0, "reads 480", "stdout")]
#[case(&["stop"], 0, "stop sent", "stdout")]
#[case(&["self-check"], 0, "self-check ok", "stdout")]
#[case(&["sweep"], 2, "--speeds", "stderr")]
#[case(&["ramp", "--start", "0", "--end", "-5", "--points", "10", "--drive", "--goal", "499"], 0, "sensed move stopped at", "stdout")]
#[case(&["ramp", "--start", "0", "--end", "-5", "--points", "10", "--drive", "--goal", "600"], 3, "outside the position window", "stderr")]
#[case(&["ramp", "--start", "0", "--end", "1", "--points", "4", "--drive"], 2, "--goal", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let mut cmd = linact(&cfg);
    cmd.args(args);

    let assert = cmd.assert().code(exit_code);
    let out = assert.get_output();
    let text = if stream == "stdout" {
        String::from_utf8_lossy(&out.stdout).to_string()
    } else {
        String::from_utf8_lossy(&out.stderr).to_string()
    };
    assert!(
        text.contains(needle),
        "expected {needle:?} in {stream}; got:\n{text}"
    );
}

#[rstest]
fn jam_during_extend_exits_with_obstruction_code() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    linact(&cfg)
        .env("LINACT_SIM_JAM_AT", "490")
        .arg("extend")
        .assert()
        .code(5)
        .stderr(predicate::str::contains("torque stall"));
}

#[rstest]
fn garbled_replies_exhaust_the_query() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    linact(&cfg)
        .env("LINACT_SIM_GARBLE_EVERY", "1")
        .arg("query")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("None of 5 queries"));
}

#[rstest]
#[case("[motion]\nmax_speed = -1.0\n")]
#[case("[window]\nhalf_width = 0.0\n")]
#[case("[timing]\ncontrol_period_us = 0\n")]
#[case("this is = not [toml")]
fn invalid_config_exits_3(#[case] body: &str) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, body).unwrap();
    linact(&path)
        .arg("query")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[rstest]
fn missing_explicit_config_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nope.toml");
    linact(&path).arg("query").assert().code(3);
}

#[rstest]
fn io_thread_backend_answers_queries() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    linact(&cfg)
        .arg("--io-thread")
        .arg("query")
        .assert()
        .success()
        .stdout(predicate::str::contains("position 500.0000"));
}

#[rstest]
fn run_writes_torque_trace() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let trace = dir.path().join("trace.csv");
    linact(&cfg)
        .args(["run", "--max-ticks", "20", "--trace-out"])
        .arg(&trace)
        .assert()
        .success()
        .stdout(predicate::str::contains("ran 20 ticks"));
    let body = fs::read_to_string(&trace).unwrap();
    let mut lines = body.lines();
    assert_eq!(lines.next(), Some("torque"));
    assert!(lines.count() > 50, "extension should record torque");
}

#[rstest]
fn open_interlock_keeps_run_in_lockout() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    linact(&cfg)
        .env("LINACT_SIM_SAFETY_OPEN", "1")
        .args(["run", "--max-ticks", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("state safety_lockout"));
}

#[rstest]
fn sweep_writes_one_row_per_run() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let out = dir.path().join("sweep.csv");
    linact(&cfg)
        .args(["sweep", "--speeds", "0.05,0.06", "--runs", "1", "--out"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("max_speed 0.05"))
        .stdout(predicate::str::contains("max_speed 0.06"));
    let body = fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines[0], "max_speed,extend_position");
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("0.05,479."));
}

#[rstest]
fn cycle_and_bench_complete() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    linact(&cfg)
        .args(["cycle", "--count", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cycle 1: extend completed"));
    linact(&cfg)
        .args(["bench", "--ticks", "20"])
        .assert()
        .success()
        .stdout(predicate::str::contains("latency min/avg/max/stdev"));
}
