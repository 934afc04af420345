//! battery-mpc entry point: CLI wiring, dataset loading and controller comparison.

mod cli;

use std::process;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use battery_mpc::config::ScenarioConfig;
use battery_mpc::io::dataset::Dataset;
use battery_mpc::io::export::{export_summary, export_trajectory};
use battery_mpc::runner::{self, BuildingRun};
use battery_mpc::sim::metrics::SummaryRecord;
use battery_mpc::synthetic;

use cli::{CliOptions, parse_args, print_usage};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Resolves the scenario: `--scenario` first, then `--preset`, then baseline,
/// with command-line overrides applied on top.
fn load_scenario(cli: &CliOptions) -> Result<ScenarioConfig, String> {
    let mut scenario = if let Some(path) = &cli.scenario {
        let mut cfg = ScenarioConfig::from_toml_file(path).map_err(|e| e.to_string())?;
        // Dataset paths inside a scenario file are relative to that file.
        if let (Some(data), Some(dir)) = (cfg.dataset.path.as_mut(), path.parent()) {
            if data.is_relative() {
                *data = dir.join(&*data);
            }
        }
        cfg
    } else if let Some(name) = &cli.preset {
        ScenarioConfig::from_preset(name).map_err(|e| e.to_string())?
    } else {
        ScenarioConfig::baseline()
    };

    if let Some(data) = &cli.data {
        scenario.dataset.path = Some(data.clone());
    }
    if !cli.buildings.is_empty() {
        scenario.dataset.buildings = cli.buildings.clone();
    }
    if let Some(steps) = cli.steps {
        scenario.simulation.horizon_cap = steps;
    }

    let errors = scenario.validate();
    if !errors.is_empty() {
        return Err(errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n"));
    }
    Ok(scenario)
}

fn load_dataset(scenario: &ScenarioConfig) -> Result<Dataset, String> {
    match &scenario.dataset.path {
        Some(path) => Dataset::from_path(path).map_err(|e| format!("{}: {e}", path.display())),
        None => {
            tracing::info!(
                steps = scenario.synthetic.steps,
                seed = scenario.synthetic.seed,
                "no dataset given, generating synthetic data"
            );
            synthetic::generate(&scenario.synthetic).map_err(|e| e.to_string())
        }
    }
}

fn print_runs(runs: &[BuildingRun]) {
    for run in runs {
        for report in &run.reports {
            println!("=== Building {} / {} ===", run.building, report.kind);
            for r in &report.records {
                println!("{r}");
            }
            if !report.skipped_steps.is_empty() {
                println!("skipped steps: {:?}", report.skipped_steps);
            }
            if let Some(step) = report.aborted_at {
                println!("aborted at step {step}");
            }
            println!("\n{}\n", report.metrics);
        }
    }
}

fn run(cli: &CliOptions) -> Result<(), String> {
    let scenario = load_scenario(cli)?;
    let dataset = load_dataset(&scenario)?;
    let runs = runner::run_all(&scenario, &dataset).map_err(|e| e.to_string())?;

    print_runs(&runs);
    let summary: Vec<SummaryRecord> = runs.iter().flat_map(BuildingRun::summaries).collect();
    println!("--- Summary ---");
    for row in &summary {
        println!("{row}");
    }

    if let Some(path) = &cli.summary_out {
        export_summary(&summary, path)
            .map_err(|e| format!("failed to write summary CSV: {e}"))?;
        eprintln!("Summary written to {}", path.display());
    }
    if let Some(path) = &cli.trajectory_out {
        export_trajectory(&runs, path)
            .map_err(|e| format!("failed to write trajectory CSV: {e}"))?;
        eprintln!("Trajectory written to {}", path.display());
    }
    Ok(())
}

fn main() {
    let cli = match parse_args() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("error: {e}");
            print_usage();
            process::exit(2);
        }
    };
    if cli.help {
        print_usage();
        return;
    }

    init_tracing();

    if let Err(e) = run(&cli) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
