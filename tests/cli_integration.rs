use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

fn run_cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_battery-mpc"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("battery-mpc process should run")
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("battery-mpc-{}-{name}", std::process::id()))
}

#[test]
fn preset_run_writes_summary_with_one_row_per_controller() {
    let summary = temp_path("summary.csv");
    let trajectory = temp_path("trajectory.csv");
    let output = run_cli(&[
        "--preset",
        "cost_only",
        "--steps",
        "24",
        "--summary-out",
        summary.to_str().unwrap_or_default(),
        "--trajectory-out",
        trajectory.to_str().unwrap_or_default(),
    ]);
    assert!(
        output.status.success(),
        "run failed: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--- Summary ---"));
    assert!(stdout.contains("Building 1 [optimization]"));
    assert!(stdout.contains("Building 1 [embedded]"));

    let csv = fs::read_to_string(&summary).expect("summary CSV should exist");
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3, "header + 2 controllers:\n{csv}");
    assert!(lines[0].starts_with("Building,Controller,Total Price Without Battery"));
    assert!(lines[1].starts_with("1,optimization,"));
    assert!(lines[2].starts_with("1,embedded,"));

    let traj = fs::read_to_string(&trajectory).expect("trajectory CSV should exist");
    // 1 header + 24 steps per controller
    assert_eq!(traj.lines().count(), 49);

    fs::remove_file(summary).ok();
    fs::remove_file(trajectory).ok();
}

#[test]
fn scenario_file_with_csv_dataset_runs_every_building() {
    let summary = temp_path("csv-summary.csv");
    let output = run_cli(&[
        "--scenario",
        "scenarios/sample_csv.toml",
        "--summary-out",
        summary.to_str().unwrap_or_default(),
    ]);
    assert!(
        output.status.success(),
        "run failed: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );

    let csv = fs::read_to_string(&summary).expect("summary CSV should exist");
    assert_eq!(csv.lines().count(), 5, "header + 2 buildings x 2 controllers:\n{csv}");
    assert!(csv.lines().any(|l| l.starts_with("2,optimization,")));
    fs::remove_file(summary).ok();
}

#[test]
fn bundled_scenarios_parse_and_run() {
    for path in ["scenarios/baseline.toml", "scenarios/tracking.toml"] {
        let output = run_cli(&["--scenario", path, "--steps", "12"]);
        assert!(
            output.status.success(),
            "{path} failed: stderr={}",
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

#[test]
fn unknown_building_fails_with_message() {
    let output = run_cli(&["--data", "data/sample_buildings.csv", "--building", "7"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("building 7"), "stderr={stderr}");
}

#[test]
fn invalid_arguments_are_rejected() {
    let output = run_cli(&["--preset", "baseline", "--scenario", "scenarios/baseline.toml"]);
    assert!(!output.status.success());

    let output = run_cli(&["--preset", "nonexistent"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown preset"));
}

#[test]
fn help_exits_successfully() {
    let output = run_cli(&["--help"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage: battery-mpc"));
}
