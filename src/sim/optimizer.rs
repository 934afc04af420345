//! Full-horizon linear-programming controller.
//!
//! Every call formulates the dispatch problem over the next `W` steps,
//! solves it exactly, and applies only the first step:
//!
//! ```text
//! minimise  Σ_t ( γ_cost · dt·price[t]/max_price
//!               + γ_em   · dt·emissions[t]·c_em/max_emissions ) · Pgrid[t]
//! s.t.      Pgrid[t] = Pbatt[t] + load[t],       Pgrid[t] >= 0
//!           Pbatt[t] = Pch[t] - Pdis[t],         0 <= Pch, Pdis <= Pmax
//!           E[0] = SOC,  soc_min·C <= E[t] <= soc_max·C
//!           E[t] = E[t-1] + η_c·dt·Pch[t-1] - dt/η_d·Pdis[t-1]   (t > 0)
//!           band_lo·C <= E[W-1] <= band_hi·C
//! ```

use good_lp::{
    Expression, ProblemVariables, Solution, SolverModel, Variable, constraint, default_solver,
    variable,
};

use crate::devices::Battery;
use crate::forecast::ForecastProvider;

use super::controller::{Controller, ControllerKind, skip_step};
use super::types::{ControlError, StepDecision};

/// Emissions-to-currency conversion used by the reference system (currency/kg).
pub const DEFAULT_EMISSION_COST_RATE: f64 = 0.051;

/// Relative weights of the cost and emissions objective terms.
///
/// They conventionally sum to one, but nothing requires it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectiveWeights {
    pub cost: f64,
    pub emissions: f64,
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        Self {
            cost: 0.15,
            emissions: 0.85,
        }
    }
}

/// Tunables for [`OptimizationController`].
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerSettings {
    /// Nominal look-ahead length in steps.
    pub planning_horizon: usize,
    /// Objective term weights.
    pub weights: ObjectiveWeights,
    /// Step duration in hours.
    pub dt_hours: f64,
    /// Currency per kg of emissions.
    pub emission_cost_rate: f64,
    /// Lower bound on the last planned SOC, as a fraction of capacity.
    pub terminal_soc_min: f64,
    /// Upper bound on the last planned SOC, as a fraction of capacity.
    pub terminal_soc_max: f64,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            planning_horizon: 24,
            weights: ObjectiveWeights::default(),
            dt_hours: 1.0,
            emission_cost_rate: DEFAULT_EMISSION_COST_RATE,
            terminal_soc_min: 0.4,
            terminal_soc_max: 0.8,
        }
    }
}

/// Solved trajectory over one forecast window.
#[derive(Debug, Clone, PartialEq)]
pub struct HorizonPlan {
    /// Dataset index of the first planned step.
    pub start_step: usize,
    /// Grid import per step (kW).
    pub grid_kw: Vec<f64>,
    /// Net battery power per step (kW; positive=discharge, negative=charge).
    pub battery_kw: Vec<f64>,
    /// Charging component per step (kW, >= 0).
    pub charge_kw: Vec<f64>,
    /// Discharging component per step (kW, >= 0).
    pub discharge_kw: Vec<f64>,
    /// Stored energy at the start of each planned step (kWh).
    pub soc_kwh: Vec<f64>,
    /// Stored energy after the first step is applied (kWh).
    pub next_soc_kwh: f64,
}

impl HorizonPlan {
    pub fn len(&self) -> usize {
        self.grid_kw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grid_kw.is_empty()
    }

    /// Stored energy at the last planned step (kWh).
    pub fn terminal_soc_kwh(&self) -> Option<f64> {
        self.soc_kwh.last().copied()
    }
}

/// Receding-horizon controller backed by an exact LP solve.
#[derive(Debug, Clone)]
pub struct OptimizationController<P: ForecastProvider> {
    provider: P,
    battery: Battery,
    settings: OptimizerSettings,
}

impl<P: ForecastProvider> OptimizationController<P> {
    /// Creates a controller owning `provider` and `battery`.
    ///
    /// # Panics
    ///
    /// Panics if the planning horizon is zero, `dt_hours` is not positive,
    /// or the terminal band is not an ordered pair inside `[0, 1]`.
    pub fn new(provider: P, battery: Battery, settings: OptimizerSettings) -> Self {
        assert!(settings.planning_horizon > 0, "planning_horizon must be > 0");
        assert!(settings.dt_hours > 0.0, "dt_hours must be > 0");
        assert!(
            0.0 <= settings.terminal_soc_min
                && settings.terminal_soc_min <= settings.terminal_soc_max
                && settings.terminal_soc_max <= 1.0
        );

        Self {
            provider,
            battery,
            settings,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn settings(&self) -> &OptimizerSettings {
        &self.settings
    }

    /// Solves the current window without changing any state.
    ///
    /// # Errors
    ///
    /// `EndOfHorizon` when no forecast remains, `Infeasible` when the solver
    /// rejects the problem.
    pub fn plan(&self) -> Result<HorizonPlan, ControlError> {
        let step = self.provider.current_step();
        let window = self
            .provider
            .window(step, self.settings.planning_horizon);
        let w = window.len();
        if w == 0 {
            return Err(ControlError::EndOfHorizon { step });
        }

        let s = &self.settings;
        let b = &self.battery;
        let dt = s.dt_hours;
        let max_price = self.provider.max_price();
        let max_emissions = self.provider.max_emissions();

        let mut vars = ProblemVariables::new();
        let p_grid: Vec<Variable> = vars.add_vector(variable().min(0.0), w);
        let p_batt: Vec<Variable> = vars.add_vector(variable(), w);
        let p_ch: Vec<Variable> = vars.add_vector(variable().min(0.0).max(b.max_power_kw), w);
        let p_dis: Vec<Variable> = vars.add_vector(variable().min(0.0).max(b.max_power_kw), w);
        let energy: Vec<Variable> = vars.add_vector(
            variable().min(b.min_energy_kwh()).max(b.max_energy_kwh()),
            w,
        );
        // With a single-step window the committed SOC has no in-window variable.
        let next_energy = (w == 1).then(|| {
            vars.add(
                variable()
                    .min(b.min_energy_kwh())
                    .max(b.max_energy_kwh()),
            )
        });

        let objective: Expression = window
            .points()
            .iter()
            .zip(&p_grid)
            .map(|(point, &grid)| {
                let cost = s.weights.cost * dt * point.price / max_price;
                let emissions = s.weights.emissions
                    * dt
                    * point.emissions_rate
                    * s.emission_cost_rate
                    / max_emissions;
                (cost + emissions) * grid
            })
            .sum();

        let charge_gain = b.eta_charge * dt;
        let discharge_loss = dt / b.eta_discharge;

        let mut model = vars.minimise(objective).using(default_solver);
        model = model.with(constraint!(energy[0] == b.soc_kwh()));
        for (t, point) in window.points().iter().enumerate() {
            model = model.with(constraint!(p_grid[t] == p_batt[t] + point.load_kw));
            model = model.with(constraint!(p_batt[t] == p_ch[t] - p_dis[t]));
            if t > 0 {
                model = model.with(constraint!(
                    energy[t] == energy[t - 1] + charge_gain * p_ch[t - 1]
                        - discharge_loss * p_dis[t - 1]
                ));
            }
        }
        let terminal = energy[w - 1];
        model = model.with(constraint!(terminal >= s.terminal_soc_min * b.capacity_kwh));
        model = model.with(constraint!(terminal <= s.terminal_soc_max * b.capacity_kwh));
        if let Some(next) = next_energy {
            model = model.with(constraint!(
                next == energy[0] + charge_gain * p_ch[0] - discharge_loss * p_dis[0]
            ));
        }

        let solution = model.solve().map_err(|err| ControlError::Infeasible {
            step,
            reason: err.to_string(),
        })?;

        let values = |vs: &[Variable]| -> Vec<f64> { vs.iter().map(|&v| solution.value(v)).collect() };
        let soc_kwh = values(&energy);
        let next_soc_kwh = match next_energy {
            Some(next) => solution.value(next),
            None => soc_kwh[1],
        };

        Ok(HorizonPlan {
            start_step: step,
            grid_kw: values(&p_grid),
            battery_kw: p_batt.iter().map(|&v| -solution.value(v)).collect(),
            charge_kw: values(&p_ch),
            discharge_kw: values(&p_dis),
            soc_kwh,
            next_soc_kwh,
        })
    }
}

impl<P: ForecastProvider> Controller for OptimizationController<P> {
    fn step(&mut self) -> Result<StepDecision, ControlError> {
        let plan = match self.plan() {
            Ok(plan) => plan,
            Err(err) => {
                if let ControlError::Infeasible { step, reason } = &err {
                    tracing::warn!(step, %reason, "optimization failed");
                }
                return Err(err);
            }
        };

        let soc_before_kwh = self.battery.soc_kwh();
        self.battery.set_soc_kwh(plan.next_soc_kwh);
        self.provider.advance();

        let decision = StepDecision {
            timestep: plan.start_step,
            grid_kw: plan.grid_kw[0],
            battery_kw: plan.battery_kw[0],
            soc_before_kwh,
            soc_kwh: self.battery.soc_kwh(),
        };
        tracing::debug!(horizon = plan.len(), %decision, "optimization step");
        Ok(decision)
    }

    fn skip(&mut self) -> Result<(), ControlError> {
        skip_step(&mut self.provider)
    }

    fn kind(&self) -> ControllerKind {
        ControllerKind::Optimization
    }

    fn lookahead(&self) -> usize {
        self.settings.planning_horizon
    }

    fn current_step(&self) -> usize {
        self.provider.current_step()
    }

    fn battery(&self) -> &Battery {
        &self.battery
    }
}
