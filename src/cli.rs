use std::env;
use std::path::PathBuf;

/// Parsed command-line options.
#[derive(Debug, Default)]
pub struct CliOptions {
    pub scenario: Option<PathBuf>,
    pub preset: Option<String>,
    pub data: Option<PathBuf>,
    pub buildings: Vec<u32>,
    pub steps: Option<usize>,
    pub summary_out: Option<PathBuf>,
    pub trajectory_out: Option<PathBuf>,
    pub help: bool,
}

pub fn parse_args() -> Result<CliOptions, String> {
    let args: Vec<String> = env::args().skip(1).collect();
    parse_args_from(args)
}

pub fn parse_args_from(args: Vec<String>) -> Result<CliOptions, String> {
    let mut opts = CliOptions::default();
    let mut i = 0usize;

    while i < args.len() {
        match args[i].as_str() {
            "--scenario" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --scenario (expected a TOML file path)")?;
                if opts.scenario.replace(PathBuf::from(path)).is_some() {
                    return Err("--scenario provided more than once".to_string());
                }
            }
            "--preset" => {
                i += 1;
                let name = args.next_or_err(i, "missing value for --preset (expected a preset name)")?;
                if opts.preset.replace(name.to_string()).is_some() {
                    return Err("--preset provided more than once".to_string());
                }
            }
            "--data" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --data (expected a CSV file path)")?;
                if opts.data.replace(PathBuf::from(path)).is_some() {
                    return Err("--data provided more than once".to_string());
                }
            }
            "--building" => {
                i += 1;
                let raw = args.next_or_err(i, "missing value for --building (expected a building number)")?;
                let n = raw
                    .parse::<u32>()
                    .map_err(|_| format!("--building value \"{raw}\" is not a valid building number"))?;
                opts.buildings.push(n);
            }
            "--steps" => {
                i += 1;
                let raw = args.next_or_err(i, "missing value for --steps (expected a step count)")?;
                let n = raw
                    .parse::<usize>()
                    .ok()
                    .filter(|&n| n > 0)
                    .ok_or_else(|| format!("--steps value \"{raw}\" must be a positive integer"))?;
                if opts.steps.replace(n).is_some() {
                    return Err("--steps provided more than once".to_string());
                }
            }
            "--summary-out" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --summary-out (expected a file path)")?;
                if opts.summary_out.replace(PathBuf::from(path)).is_some() {
                    return Err("--summary-out provided more than once".to_string());
                }
            }
            "--trajectory-out" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --trajectory-out (expected a file path)")?;
                if opts.trajectory_out.replace(PathBuf::from(path)).is_some() {
                    return Err("--trajectory-out provided more than once".to_string());
                }
            }
            "--help" | "-h" => opts.help = true,
            other => return Err(format!("unknown argument: {other}")),
        }
        i += 1;
    }

    if opts.scenario.is_some() && opts.preset.is_some() {
        return Err(
            "arguments `--scenario` and `--preset` are mutually exclusive; choose one source"
                .to_string(),
        );
    }

    Ok(opts)
}

trait SliceArgExt {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String>;
}

impl SliceArgExt for [String] {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String> {
        self.get(index)
            .map(String::as_str)
            .ok_or_else(|| err.to_string())
    }
}

pub fn print_usage() {
    eprintln!("battery-mpc: receding-horizon battery dispatch comparison");
    eprintln!();
    eprintln!("Usage: battery-mpc [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scenario <path>        Load scenario from TOML config file");
    eprintln!("  --preset <name>          Use a built-in preset (baseline, cost_only, tracking)");
    eprintln!("  --data <path>            Read price/load/emissions from CSV");
    eprintln!("  --building <n>           Simulate building n (repeatable)");
    eprintln!("  --steps <n>              Override the simulation horizon cap");
    eprintln!("  --summary-out <path>     Write the comparison summary to CSV");
    eprintln!("  --trajectory-out <path>  Write per-step records to CSV");
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("If no --scenario or --preset is given, the baseline preset is used.");
    eprintln!("Set RUST_LOG (e.g. RUST_LOG=battery_mpc=debug) to control logging.");
}

#[cfg(test)]
mod tests {
    use super::parse_args_from;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn supports_scenario_cli() {
        let opts = parse_args_from(args(&["--scenario", "scenario.toml"]))
            .expect("parse should succeed");
        assert_eq!(
            opts.scenario.as_deref().and_then(|p| p.to_str()),
            Some("scenario.toml")
        );
        assert!(opts.preset.is_none());
    }

    #[test]
    fn supports_preset_cli() {
        let opts =
            parse_args_from(args(&["--preset", "cost_only"])).expect("parse should succeed");
        assert_eq!(opts.preset.as_deref(), Some("cost_only"));
        assert!(opts.scenario.is_none());
    }

    #[test]
    fn building_is_repeatable() {
        let opts = parse_args_from(args(&["--building", "1", "--building", "4"]))
            .expect("parse should succeed");
        assert_eq!(opts.buildings, vec![1, 4]);
    }

    #[test]
    fn rejects_scenario_with_preset() {
        let err = parse_args_from(args(&["--scenario", "a.toml", "--preset", "baseline"]))
            .expect_err("should be rejected");
        assert!(err.contains("mutually exclusive"));
    }

    #[test]
    fn rejects_zero_steps() {
        assert!(parse_args_from(args(&["--steps", "0"])).is_err());
        assert!(parse_args_from(args(&["--steps", "abc"])).is_err());
    }

    #[test]
    fn rejects_missing_value_and_unknown_flag() {
        assert!(parse_args_from(args(&["--data"])).is_err());
        let err = parse_args_from(args(&["--bogus"])).expect_err("should be rejected");
        assert!(err.contains("--bogus"));
    }

    #[test]
    fn help_flag_is_recorded() {
        let opts = parse_args_from(args(&["--help"])).expect("parse should succeed");
        assert!(opts.help);
    }
}
