use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Minimal config pointing at the simulated station
fn write_sim_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[link]
port = "sim"
read_timeout_ms = 200

[tip]
default = "T245"

[acquisition]
scan_interval_ms = 10
record_length = 20
average_window = 4
"#;
    let path = dir.path().join("tuner.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn tuner(cfg: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("station-tuner").unwrap();
    cmd.arg("--config").arg(cfg);
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["ports"], 0, "sim", "stdout")]
#[case(&["get", "set_t"], 0, "250.00", "stdout")]
#[case(&["get", "tc_cal_table", "--arg", "1"], 0, "[2000.00,50.00]", "stdout")]
#[case(&["set", "pid_kp", "1.5"], 0, "1.5", "stdout")]
#[case(&["--tip", "C360", "set", "sleep_set_t", "180"], 0, "180", "stdout")]
#[case(&["setpoint", "320"], 0, "320.00", "stdout")]
#[case(&["enable", "on"], 0, "on", "stdout")]
#[case(&["self-check"], 0, "self-check ok: port=sim tip=T245", "stdout")]
#[case(&["restore", "--tc-constant", "40"], 0, "defaults restored on T245", "stdout")]
#[case(&["set", "set_t", "900"], 6, "refused set_t: out of bounds", "stderr")]
#[case(&["set", "meas_t", "12"], 6, "read only", "stderr")]
#[case(&["get", "bogus"], 5, "not a station command", "stderr")]
#[case(&["--tip", "T12", "get", "set_t"], 5, "Unknown tip", "stderr")]
#[case(&["restore", "--tc-constant", "50"], 5, "out of range", "stderr")]
#[case(&["--port", "/dev/does-not-exist", "get", "set_t"], 4, "/dev/does-not-exist", "stderr")]
#[case(&["get"], 2, "required", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_sim_config(&dir);

    let assert = tuner(&cfg).args(args).assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[test]
fn missing_port_is_reported() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("empty.toml");
    fs::write(&cfg, "").unwrap();

    tuner(&cfg)
        .args(["get", "set_t"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No port to connect to"));
}

#[test]
fn explicit_config_must_exist() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    tuner(&missing)
        .arg("ports")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("nope.toml"));
}

#[rstest]
#[case("[link]\nbaud = 0\n")]
#[case("[tip]\ndefault = \"T99\"\n")]
#[case("[acquisition]\nscan_interval_ms = 1\n")]
#[case("[logging]\nrotation = \"weekly\"\n")]
fn invalid_config_is_rejected(#[case] toml: &str) {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("bad.toml");
    fs::write(&cfg, toml).unwrap();

    tuner(&cfg)
        .args(["--port", "sim", "get", "set_t"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration is invalid"));
}

#[test]
fn settings_prints_toml_tables() {
    let dir = tempdir().unwrap();
    let cfg = write_sim_config(&dir);

    tuner(&cfg)
        .args(["--tip", "AM120-2", "settings"])
        .assert()
        .success()
        .stdout(predicate::str::contains("# tip = AM120-2"))
        .stdout(predicate::str::contains("[limits]"))
        .stdout(predicate::str::contains("temp_max = 400.0"));
}

#[test]
fn calibration_export_then_import() {
    let dir = tempdir().unwrap();
    let cfg = write_sim_config(&dir);
    let csv = dir.path().join("cal.csv");

    tuner(&cfg)
        .args(["cal", "export"])
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("exported 10 rows"));

    let text = fs::read_to_string(&csv).unwrap();
    assert!(text.starts_with("index,voltage_uv,temperature_c"), "{text}");
    assert_eq!(text.lines().count(), 11);

    tuner(&cfg)
        .args(["cal", "import"])
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("imported 10 rows"));
}

#[test]
fn calibration_import_rejects_bad_header() {
    let dir = tempdir().unwrap();
    let cfg = write_sim_config(&dir);

    let bad_csv = dir.path().join("cal.csv");
    let mut f = fs::File::create(&bad_csv).unwrap();
    writeln!(f, "raw,value").unwrap();
    writeln!(f, "100,0.0").unwrap();

    tuner(&cfg)
        .args(["cal", "import"])
        .arg(&bad_csv)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid headers in calibration CSV"));
}

#[test]
fn calibration_import_rejects_oversized_table() {
    let dir = tempdir().unwrap();
    let cfg = write_sim_config(&dir);

    let csv = dir.path().join("cal.csv");
    let mut f = fs::File::create(&csv).unwrap();
    writeln!(f, "index,voltage_uv,temperature_c").unwrap();
    for i in 0..12 {
        writeln!(f, "{i},{},{}", i * 100, i * 10).unwrap();
    }

    tuner(&cfg)
        .args(["cal", "import"])
        .arg(&csv)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("holds 10"));
}

#[test]
fn calibration_write_echoes_row() {
    let dir = tempdir().unwrap();
    let cfg = write_sim_config(&dir);

    tuner(&cfg)
        .args(["cal", "write", "3", "6100.5", "150"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 [6100.5,150]"));
}

#[test]
fn monitor_runs_for_a_tick_budget() {
    let dir = tempdir().unwrap();
    let cfg = write_sim_config(&dir);

    tuner(&cfg)
        .args(["monitor", "--ticks", "3", "--scan-ms", "10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sp=  250.00"))
        .stdout(predicate::str::contains("3 ticks, 3 samples, 0 errors"));
}

#[test]
fn monitor_rejects_tiny_scan_interval() {
    let dir = tempdir().unwrap();
    let cfg = write_sim_config(&dir);

    tuner(&cfg)
        .args(["monitor", "--ticks", "1", "--scan-ms", "2"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--scan-ms"));
}
