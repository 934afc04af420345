//! Core simulation types: run configuration, step decisions, and failures.

use std::fmt;

use serde::Deserialize;
use thiserror::Error;

/// What the driver does when a controller reports [`ControlError::Infeasible`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the run at the failing step.
    #[default]
    Abort,
    /// Leave the battery idle for the failing step and continue.
    Skip,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abort => write!(f, "abort"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

/// Receding-horizon run configuration.
///
/// # Examples
///
/// ```
/// use battery_mpc::sim::types::SimConfig;
///
/// let cfg = SimConfig::new(72, 1.0);
/// assert_eq!(cfg.run_length(120, 24), 72);
/// assert_eq!(cfg.run_length(50, 24), 26);
/// ```
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Upper bound on the number of simulated steps.
    pub horizon_cap: usize,
    /// Duration of one step in hours.
    pub dt_hours: f64,
    /// Reaction to infeasible steps.
    pub failure_policy: FailurePolicy,
}

impl SimConfig {
    /// Creates a run configuration with the default failure policy.
    ///
    /// # Panics
    ///
    /// Panics if `dt_hours` is not strictly positive.
    pub fn new(horizon_cap: usize, dt_hours: f64) -> Self {
        assert!(dt_hours > 0.0, "dt_hours must be > 0");
        Self {
            horizon_cap,
            dt_hours,
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    /// Number of steps to run: `min(horizon_cap, total_steps - lookahead)`.
    ///
    /// Keeping `lookahead` steps in reserve guarantees a full forecast window
    /// on every step of the run.
    pub fn run_length(&self, total_steps: usize, lookahead: usize) -> usize {
        self.horizon_cap.min(total_steps.saturating_sub(lookahead))
    }
}

/// One controller decision, immutable once returned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepDecision {
    /// Cursor value the decision was computed at.
    pub timestep: usize,
    /// Power drawn from the grid (kW, >= 0).
    pub grid_kw: f64,
    /// Net battery power (kW; positive=discharge, negative=charge).
    pub battery_kw: f64,
    /// Stored energy before the decision was applied (kWh).
    pub soc_before_kwh: f64,
    /// Stored energy after the decision was applied (kWh).
    pub soc_kwh: f64,
}

impl fmt::Display for StepDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t={:>3} | grid={:>7.3} kW  battery={:>7.3} kW | SoC {:.3} -> {:.3} kWh",
            self.timestep, self.grid_kw, self.battery_kw, self.soc_before_kwh, self.soc_kwh,
        )
    }
}

/// Failure outcomes of a controller step.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlError {
    /// The forecast window starting at `step` is empty.
    #[error("forecast window is empty at step {step}")]
    EndOfHorizon { step: usize },

    /// The solver found no acceptable solution; no state was changed.
    #[error("no feasible dispatch at step {step}: {reason}")]
    Infeasible { step: usize, reason: String },

    /// The controller was called with its cursor past the dataset.
    #[error("step {step} is outside the dataset of {total} steps")]
    OutOfRange { step: usize, total: usize },

    /// The controller's cursor is not at the step the driver is pricing.
    #[error("controller is at step {step} but the driver is at step {expected}")]
    CursorMismatch { step: usize, expected: usize },
}

impl ControlError {
    /// Step index the failure refers to.
    pub fn step(&self) -> usize {
        match self {
            Self::EndOfHorizon { step }
            | Self::Infeasible { step, .. }
            | Self::OutOfRange { step, .. }
            | Self::CursorMismatch { step, .. } => *step,
        }
    }
}

/// Complete record of one successful simulation step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    /// Timestep index.
    pub timestep: usize,
    /// Simulation time in hours.
    pub time_hr: f64,
    /// Building load (kW).
    pub load_kw: f64,
    /// Grid price (currency/kWh).
    pub price: f64,
    /// Emissions rate (kg/kWh).
    pub emissions_rate: f64,
    /// Grid import (kW).
    pub grid_kw: f64,
    /// Battery power (kW; positive=discharge, negative=charge).
    pub battery_kw: f64,
    /// Stored energy after the step (kWh).
    pub soc_kwh: f64,
    /// Stored energy after the step as a percentage of capacity.
    pub soc_pct: f64,
}

impl fmt::Display for StepRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t={:>3} ({:>5.1}h) | load={:>6.2} kW  price={:.3}  grid={:>6.2} kW  \
             bat={:>6.2} kW (SoC={:.1}%)",
            self.timestep,
            self.time_hr,
            self.load_kw,
            self.price,
            self.grid_kw,
            self.battery_kw,
            self.soc_pct,
        )
    }
}
