// Binary tests for `lscope`: JSON stdout contract and exit codes.
//
// Run with: cargo test -p ledgerscope-cli --test cli_tests -- --nocapture

use std::path::PathBuf;
use std::process::{Command, Output};

fn lscope() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_lscope"));
    cmd.current_dir(env!("CARGO_MANIFEST_DIR"));
    cmd.env_remove("RUST_LOG");
    cmd.env_remove("LSCOPE_LEDGER");
    cmd.env_remove("LSCOPE_REGISTRY");
    cmd.env_remove("LSCOPE_CONFIG");
    cmd
}

fn fixture(name: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../scorecard/tests/fixtures")
        .join(name)
        .to_str()
        .unwrap()
        .to_string()
}

fn with_inputs(args: &[&str]) -> Vec<String> {
    let mut all: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    all.extend([
        "--ledger".to_string(),
        fixture("ledger.csv"),
        "--registry".to_string(),
        fixture("registry.csv"),
    ]);
    all
}

fn run(args: &[String]) -> Output {
    lscope().args(args).output().expect("run lscope")
}

fn exit_code(output: &Output) -> i32 {
    output.status.code().expect("exit code")
}

/// Assert stdout is a single, parseable JSON value.
fn assert_single_json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "exit code: {:?}\nstderr: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    let trimmed = stdout.trim();
    assert!(!trimmed.is_empty(), "stdout should not be empty");
    serde_json::from_str(trimmed)
        .unwrap_or_else(|e| panic!("stdout must be valid JSON.\nParse error: {e}\nstdout:\n{trimmed}"))
}

// ===========================================================================
// lscope household
// ===========================================================================

#[test]
fn household_json_report() {
    let output = run(&with_inputs(&[
        "household", "H03", "--start", "2024-01", "--end", "2024-03", "--json",
    ]));
    let val = assert_single_json(&output);

    assert_eq!(val["household_basic_info"]["household_code"], "H03");
    assert_eq!(val["household_basic_info"]["village_name"], "Qinghe");
    assert_eq!(val["anomaly_detection"]["stats"]["count"], 1);
    assert_eq!(val["anomaly_detection"]["details"][0]["reason"], "amount-outlier");
    assert_eq!(val["report_metadata"]["window"]["start"], "2024-01-01");
    assert_eq!(val["report_metadata"]["window"]["end"], "2024-03-31");
    assert_eq!(val["report_metadata"]["data_status"], "sufficient");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("household H03"), "stderr: {stderr}");
}

#[test]
fn household_without_json_prints_only_summary() {
    let output = run(&with_inputs(&["household", "H01", "--start", "2024-01", "--end", "2024-03"]));
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("composite"));
}

#[test]
fn household_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("h05.json");
    let mut args = with_inputs(&["household", "H05", "--start", "2024-01-01", "--end", "2024-03-31"]);
    args.extend(["--output".to_string(), out.to_str().unwrap().to_string()]);

    let output = run(&args);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(written["anomaly_detection"]["details"][0]["reason"], "frequency-outlier");
    assert_eq!(written["household_basic_info"]["record_count"], 28);
}

#[test]
fn unknown_household_exits_with_source_code() {
    let output = run(&with_inputs(&["household", "H99", "--start", "2024-01", "--end", "2024-03"]));
    assert_eq!(exit_code(&output), 4);
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown household"));
}

#[test]
fn malformed_dates_are_usage_errors() {
    let output = run(&with_inputs(&["household", "H01", "--start", "2024/01/01"]));
    assert_eq!(exit_code(&output), 2);

    let output = run(&with_inputs(&["household", "H01", "--start", "2024-03", "--end", "2024-01"]));
    assert_eq!(exit_code(&output), 2);
    assert!(String::from_utf8_lossy(&output.stderr).contains("hint:"));
}

#[test]
fn invalid_household_code_is_usage_error() {
    let output = run(&with_inputs(&["household", "H 01", "--start", "2024-01", "--end", "2024-03"]));
    assert_eq!(exit_code(&output), 2);
}

#[test]
fn missing_ledger_file_is_input_error() {
    let output = run(&[
        "household".to_string(),
        "H01".to_string(),
        "--ledger".to_string(),
        "does-not-exist.csv".to_string(),
        "--registry".to_string(),
        fixture("registry.csv"),
    ]);
    assert_eq!(exit_code(&output), 5);
}

#[test]
fn ledger_missing_column_is_input_error() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = dir.path().join("ledger.csv");
    std::fs::write(&ledger, "record_id,household_code,date,amount\nr1,H01,2024-01-01,10\n").unwrap();

    let output = run(&[
        "household".to_string(),
        "H01".to_string(),
        "--ledger".to_string(),
        ledger.to_str().unwrap().to_string(),
        "--registry".to_string(),
        fixture("registry.csv"),
    ]);
    assert_eq!(exit_code(&output), 5);
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing column"));
}

// ===========================================================================
// lscope area
// ===========================================================================

#[test]
fn village_area_json_report() {
    let output = run(&with_inputs(&[
        "area", "--village", "Qinghe", "--start", "2024-01", "--end", "2024-03", "--json",
    ]));
    let val = assert_single_json(&output);

    let results = val["household_results"].as_array().unwrap();
    assert_eq!(results.len(), 11);
    assert_eq!(results[0]["household_basic_info"]["household_code"], "H01");
    assert_eq!(val["skipped"][0]["household_code"], "H12");
    assert_eq!(val["report_metadata"]["area_info"]["requested_households"], 12);
    assert_eq!(val["report_metadata"]["cancelled"], false);
    assert_eq!(val["batch_statistics"]["anomaly_stats"]["total_anomalies"], 3);
}

#[test]
fn town_area_with_config_and_workers() {
    let mut args = with_inputs(&[
        "area", "--town", "Liangxiang", "--start", "2024-01", "--end", "2024-03", "--workers", "3", "--json",
    ]);
    args.extend(["--config".to_string(), fixture("scorecard.toml")]);
    let val = assert_single_json(&run(&args));

    assert_eq!(val["report_metadata"]["area_info"]["area"]["level"], "town");
    assert_eq!(val["household_results"].as_array().unwrap().len(), 14);
}

#[test]
fn area_requires_a_selector() {
    let output = run(&with_inputs(&["area"]));
    assert_eq!(exit_code(&output), 2);
}

#[test]
fn zero_workers_rejected() {
    let output = run(&with_inputs(&["area", "--village", "Qinghe", "--workers", "0"]));
    assert_eq!(exit_code(&output), 2);
}

// ===========================================================================
// lscope config
// ===========================================================================

#[test]
fn defaults_round_trip_through_validate() {
    let output = lscope().args(["config", "defaults"]).output().unwrap();
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).unwrap();
    assert!(text.contains("[grades]"));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scorecard.toml");
    std::fs::write(&path, text).unwrap();
    let output = lscope()
        .args(["config", "validate", path.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
}

#[test]
fn bad_weights_exit_with_config_code() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(
        &path,
        "[quality.weights]\ncompleteness = 0.5\nfrequency = 0.3\nconsistency = 0.3\n",
    )
    .unwrap();

    let output = lscope()
        .args(["config", "validate", path.to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(exit_code(&output), 3);
    assert!(String::from_utf8_lossy(&output.stderr).contains("lscope config defaults"));
}

#[test]
fn unknown_config_key_exits_with_config_code() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("typo.toml");
    std::fs::write(&path, "[anomaly]\namount_sigmaa = 2.5\n").unwrap();

    let output = lscope()
        .args(["config", "validate", path.to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(exit_code(&output), 3);
}

// ===========================================================================
// lscope --version
// ===========================================================================

#[test]
fn long_version_reports_build_metadata() {
    let output = lscope().arg("--version").output().unwrap();
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).unwrap();
    assert!(text.contains(env!("CARGO_PKG_VERSION")), "stdout: {text}");
    assert!(text.contains("profile: "), "stdout: {text}");
    assert!(text.contains("target:  "), "stdout: {text}");
}
