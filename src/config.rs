//! TOML-based scenario configuration and preset definitions.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::devices::Battery;
use crate::sim::admm::AdmmSettings;
use crate::sim::controller::ControllerKind;
use crate::sim::embedded::EmbeddedSettings;
use crate::sim::optimizer::{DEFAULT_EMISSION_COST_RATE, ObjectiveWeights, OptimizerSettings};
use crate::sim::types::{FailurePolicy, SimConfig};
use crate::synthetic::SyntheticProfile;

/// Top-level scenario configuration parsed from TOML.
///
/// All fields have defaults matching the baseline scenario. Load from
/// TOML with [`ScenarioConfig::from_toml_file`] or use
/// [`ScenarioConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Run length, step size and controller selection.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// CSV input and building selection.
    #[serde(default)]
    pub dataset: DatasetConfig,
    /// Generator used when no CSV path is given.
    #[serde(default)]
    pub synthetic: SyntheticProfile,
    /// Aggregate battery parameters.
    #[serde(default)]
    pub battery: BatteryConfig,
    /// Optimization-based controller tunables.
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    /// Embedded controller tunables.
    #[serde(default)]
    pub embedded: EmbeddedConfig,
}

/// Run length, step size and controller selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Maximum number of simulated steps per run.
    pub horizon_cap: usize,
    /// Step duration in hours (must be > 0).
    pub dt_hours: f64,
    /// `"abort"` or `"skip"` on infeasible steps.
    pub failure_policy: FailurePolicy,
    /// Controllers to compare, each on its own battery and cursor.
    pub controllers: Vec<ControllerKind>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            horizon_cap: 72,
            dt_hours: 1.0,
            failure_policy: FailurePolicy::Abort,
            controllers: ControllerKind::ALL.to_vec(),
        }
    }
}

/// CSV input and building selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatasetConfig {
    /// CSV file; the synthetic generator is used when absent.
    pub path: Option<PathBuf>,
    /// Building numbers to simulate.
    pub buildings: Vec<u32>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: None,
            buildings: vec![1],
        }
    }
}

/// Aggregate battery parameters.
///
/// Capacity is `modules * module_capacity_kwh`; the power limit is the
/// smaller of the module and inverter ratings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatteryConfig {
    /// Number of identical modules (must be > 0).
    pub modules: u32,
    /// Capacity per module (kWh).
    pub module_capacity_kwh: f64,
    /// Initial state of charge (fraction of capacity).
    pub initial_soc: f64,
    /// Lower SOC bound (fraction).
    pub soc_min: f64,
    /// Upper SOC bound (fraction).
    pub soc_max: f64,
    /// Continuous power rating of the modules (kW).
    pub module_power_kw: f64,
    /// Inverter power limit (kW).
    pub inverter_limit_kw: f64,
    /// Charge efficiency (0.0–1.0].
    pub eta_charge: f64,
    /// Discharge efficiency (0.0–1.0].
    pub eta_discharge: f64,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            modules: 2,
            module_capacity_kwh: 7.8,
            initial_soc: 0.5,
            soc_min: 0.05,
            soc_max: 1.0,
            module_power_kw: 9.83,
            inverter_limit_kw: 9.6,
            eta_charge: 0.96,
            eta_discharge: 0.95,
        }
    }
}

impl BatteryConfig {
    pub fn capacity_kwh(&self) -> f64 {
        f64::from(self.modules) * self.module_capacity_kwh
    }

    pub fn max_power_kw(&self) -> f64 {
        self.module_power_kw.min(self.inverter_limit_kw)
    }
}

/// Optimization-based controller tunables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizerConfig {
    pub planning_horizon: usize,
    pub gamma_cost: f64,
    pub gamma_emissions: f64,
    /// Currency per kg of emissions.
    pub emission_cost_rate: f64,
    pub terminal_soc_min: f64,
    pub terminal_soc_max: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            planning_horizon: 24,
            gamma_cost: 0.15,
            gamma_emissions: 0.85,
            emission_cost_rate: DEFAULT_EMISSION_COST_RATE,
            terminal_soc_min: 0.4,
            terminal_soc_max: 0.8,
        }
    }
}

/// Embedded controller tunables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmbeddedConfig {
    pub horizon: usize,
    pub alpha: f64,
    pub r_floor: f64,
    pub state_weight: f64,
    pub soc_target: f64,
    pub rho: f64,
    pub max_iter: usize,
    pub tolerance: f64,
}

impl Default for EmbeddedConfig {
    fn default() -> Self {
        let settings = EmbeddedSettings::default();
        Self {
            horizon: settings.horizon,
            alpha: settings.alpha,
            r_floor: settings.r_floor,
            state_weight: settings.state_weight,
            soc_target: settings.soc_target,
            rho: settings.admm.rho,
            max_iter: settings.admm.max_iter,
            tolerance: settings.admm.tolerance,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"simulation.dt_hours"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl ScenarioConfig {
    /// Returns the reference scenario: 2 x 7.8 kWh battery, cost/emissions
    /// weights 0.15 / 0.85, 72-step runs of both controllers.
    pub fn baseline() -> Self {
        Self::default()
    }

    /// Returns the cost-only preset: emissions ignored by the optimizer.
    pub fn cost_only() -> Self {
        Self {
            optimizer: OptimizerConfig {
                gamma_cost: 1.0,
                gamma_emissions: 0.0,
                ..OptimizerConfig::default()
            },
            ..Self::default()
        }
    }

    /// Returns the tracking preset: the embedded controller steers SOC toward
    /// 60% of capacity with a reduced price sensitivity.
    pub fn tracking() -> Self {
        Self {
            embedded: EmbeddedConfig {
                alpha: 10.0,
                state_weight: 1.0,
                soc_target: 0.6,
                max_iter: 2000,
                ..EmbeddedConfig::default()
            },
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "cost_only", "tracking"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "cost_only" => Ok(Self::cost_only()),
            "tracking" => Ok(Self::tracking()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid. Everything the
    /// constructors assert on is checked here first.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut check = |ok: bool, field: &str, message: &str| {
            if !ok {
                errors.push(ConfigError::new(field, message));
            }
        };

        let s = &self.simulation;
        check(s.dt_hours > 0.0, "simulation.dt_hours", "must be > 0");
        check(s.horizon_cap > 0, "simulation.horizon_cap", "must be > 0");
        check(
            !s.controllers.is_empty(),
            "simulation.controllers",
            "must name at least one controller",
        );

        let d = &self.dataset;
        check(
            !d.buildings.is_empty(),
            "dataset.buildings",
            "must select at least one building",
        );
        if d.path.is_none() {
            let syn = &self.synthetic;
            check(syn.steps > 0, "synthetic.steps", "must be > 0");
            check(syn.steps_per_day > 0, "synthetic.steps_per_day", "must be > 0");
            check(
                d.buildings.iter().all(|&b| b >= 1 && b <= syn.buildings),
                "dataset.buildings",
                "must lie in 1..=synthetic.buildings when no dataset path is set",
            );
        }

        let b = &self.battery;
        check(b.modules > 0, "battery.modules", "must be > 0");
        check(
            b.module_capacity_kwh > 0.0,
            "battery.module_capacity_kwh",
            "must be > 0",
        );
        check(
            0.0 <= b.soc_min && b.soc_min <= b.soc_max && b.soc_max <= 1.0,
            "battery.soc_min",
            "must satisfy 0 <= soc_min <= soc_max <= 1",
        );
        check(
            (b.soc_min..=b.soc_max).contains(&b.initial_soc),
            "battery.initial_soc",
            "must be in [soc_min, soc_max]",
        );
        check(
            b.module_power_kw > 0.0 && b.inverter_limit_kw > 0.0,
            "battery.module_power_kw",
            "power ratings must be > 0",
        );
        check(
            b.eta_charge > 0.0 && b.eta_charge <= 1.0,
            "battery.eta_charge",
            "must be in (0.0, 1.0]",
        );
        check(
            b.eta_discharge > 0.0 && b.eta_discharge <= 1.0,
            "battery.eta_discharge",
            "must be in (0.0, 1.0]",
        );

        let o = &self.optimizer;
        check(o.planning_horizon > 0, "optimizer.planning_horizon", "must be > 0");
        check(
            o.gamma_cost >= 0.0 && o.gamma_emissions >= 0.0,
            "optimizer.gamma_cost",
            "objective weights must be >= 0",
        );
        check(
            o.emission_cost_rate >= 0.0,
            "optimizer.emission_cost_rate",
            "must be >= 0",
        );
        check(
            0.0 <= o.terminal_soc_min && o.terminal_soc_min <= o.terminal_soc_max && o.terminal_soc_max <= 1.0,
            "optimizer.terminal_soc_min",
            "must satisfy 0 <= terminal_soc_min <= terminal_soc_max <= 1",
        );

        let e = &self.embedded;
        check(e.horizon >= 2, "embedded.horizon", "must be >= 2");
        check(e.alpha >= 0.0, "embedded.alpha", "must be >= 0");
        check(e.r_floor > 0.0, "embedded.r_floor", "must be > 0");
        check(e.state_weight >= 0.0, "embedded.state_weight", "must be >= 0");
        check(
            (0.0..=1.0).contains(&e.soc_target),
            "embedded.soc_target",
            "must be in [0.0, 1.0]",
        );
        check(e.rho > 0.0, "embedded.rho", "must be > 0");
        check(e.max_iter > 0, "embedded.max_iter", "must be > 0");
        check(e.tolerance > 0.0, "embedded.tolerance", "must be > 0");

        errors
    }

    /// Builds a fresh battery at the configured initial SOC.
    ///
    /// # Panics
    ///
    /// Panics on parameters [`ScenarioConfig::validate`] would reject.
    pub fn battery(&self) -> Battery {
        let b = &self.battery;
        Battery::new(
            b.capacity_kwh(),
            b.initial_soc,
            b.soc_min,
            b.soc_max,
            b.max_power_kw(),
            b.eta_charge,
            b.eta_discharge,
        )
    }

    pub fn optimizer_settings(&self) -> OptimizerSettings {
        let o = &self.optimizer;
        OptimizerSettings {
            planning_horizon: o.planning_horizon,
            weights: ObjectiveWeights {
                cost: o.gamma_cost,
                emissions: o.gamma_emissions,
            },
            dt_hours: self.simulation.dt_hours,
            emission_cost_rate: o.emission_cost_rate,
            terminal_soc_min: o.terminal_soc_min,
            terminal_soc_max: o.terminal_soc_max,
        }
    }

    pub fn embedded_settings(&self) -> EmbeddedSettings {
        let e = &self.embedded;
        EmbeddedSettings {
            horizon: e.horizon,
            alpha: e.alpha,
            r_floor: e.r_floor,
            state_weight: e.state_weight,
            soc_target: e.soc_target,
            dt_hours: self.simulation.dt_hours,
            admm: AdmmSettings {
                rho: e.rho,
                max_iter: e.max_iter,
                tolerance: e.tolerance,
            },
        }
    }

    pub fn sim_config(&self) -> SimConfig {
        SimConfig::new(self.simulation.horizon_cap, self.simulation.dt_hours)
            .with_failure_policy(self.simulation.failure_policy)
    }
}
