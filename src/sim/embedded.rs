//! Embedded fast controller.
//!
//! Plans with a single-state, efficiency-free model `soc[t+1] = soc[t] - dt·u[t]`
//! and a price-scaled input weight `R = r_floor + alpha·price`, re-solved from
//! scratch on every call by the ADMM backend in [`super::admm`]. Only the
//! first input is realised, through the lossy [`Battery::apply_power_kw`]
//! update.

use crate::devices::Battery;
use crate::forecast::ForecastProvider;

use super::admm::{self, AdmmSettings, Bounds, ScalarQp};
use super::controller::{Controller, ControllerKind, skip_step};
use super::types::{ControlError, StepDecision};

/// Tunables for [`EmbeddedController`].
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedSettings {
    /// Number of state knots in the QP (>= 2).
    pub horizon: usize,
    /// Price sensitivity of the input weight.
    pub alpha: f64,
    /// Positive floor added to the input weight.
    pub r_floor: f64,
    /// SOC tracking weight; zero disables tracking.
    pub state_weight: f64,
    /// Tracking reference as a fraction of capacity.
    pub soc_target: f64,
    /// Step duration in hours.
    pub dt_hours: f64,
    pub admm: AdmmSettings,
}

impl Default for EmbeddedSettings {
    fn default() -> Self {
        Self {
            horizon: 24,
            alpha: 1000.0,
            r_floor: 1e-8,
            state_weight: 0.0,
            soc_target: 0.5,
            dt_hours: 1.0,
            admm: AdmmSettings::default(),
        }
    }
}

/// Receding-horizon controller backed by the ADMM QP solver.
#[derive(Debug, Clone)]
pub struct EmbeddedController<P: ForecastProvider> {
    provider: P,
    battery: Battery,
    settings: EmbeddedSettings,
}

impl<P: ForecastProvider> EmbeddedController<P> {
    /// Creates a controller owning `provider` and `battery`.
    ///
    /// # Panics
    ///
    /// Panics if the horizon is shorter than two knots, `dt_hours` or
    /// `r_floor` is not positive, `alpha` or `state_weight` is negative, or
    /// `soc_target` is outside `[0, 1]`.
    pub fn new(provider: P, battery: Battery, settings: EmbeddedSettings) -> Self {
        assert!(settings.horizon >= 2, "horizon must be >= 2");
        assert!(settings.dt_hours > 0.0, "dt_hours must be > 0");
        assert!(settings.r_floor > 0.0, "r_floor must be > 0");
        assert!(settings.alpha >= 0.0);
        assert!(settings.state_weight >= 0.0);
        assert!((0.0..=1.0).contains(&settings.soc_target));

        Self {
            provider,
            battery,
            settings,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn settings(&self) -> &EmbeddedSettings {
        &self.settings
    }

    fn build_qp(&self, price: f64) -> ScalarQp {
        let s = &self.settings;
        ScalarQp {
            a: 1.0,
            b: -s.dt_hours,
            q: s.state_weight,
            r: s.r_floor + s.alpha * price,
            x_ref: s.soc_target * self.battery.capacity_kwh,
            horizon: s.horizon,
            state_bounds: Bounds::new(self.battery.min_energy_kwh(), self.battery.max_energy_kwh()),
            input_bounds: Bounds::new(-self.battery.max_power_kw, self.battery.max_power_kw),
        }
    }
}

impl<P: ForecastProvider> Controller for EmbeddedController<P> {
    fn step(&mut self) -> Result<StepDecision, ControlError> {
        let step = self.provider.current_step();
        let total = self.provider.total_steps();
        let Some(&point) = self.provider.window(step, 1).get(0) else {
            return Err(ControlError::OutOfRange { step, total });
        };

        let qp = self.build_qp(point.price);
        let solution = admm::solve(&qp, self.battery.soc_kwh(), &self.settings.admm).map_err(
            |err| {
                tracing::warn!(step, error = %err, "embedded solve failed");
                ControlError::Infeasible {
                    step,
                    reason: err.to_string(),
                }
            },
        )?;

        // Never export: discharge is capped at the building load.
        let battery_kw = solution.controls[0].min(point.load_kw);
        let soc_before_kwh = self.battery.soc_kwh();
        let soc_kwh = self
            .battery
            .apply_power_kw(battery_kw, self.settings.dt_hours);
        self.provider.advance();

        let decision = StepDecision {
            timestep: step,
            grid_kw: point.load_kw - battery_kw,
            battery_kw,
            soc_before_kwh,
            soc_kwh,
        };
        tracing::debug!(iterations = solution.iterations, %decision, "embedded step");
        Ok(decision)
    }

    fn skip(&mut self) -> Result<(), ControlError> {
        skip_step(&mut self.provider)
    }

    fn kind(&self) -> ControllerKind {
        ControllerKind::Embedded
    }

    fn lookahead(&self) -> usize {
        self.settings.horizon
    }

    fn current_step(&self) -> usize {
        self.provider.current_step()
    }

    fn battery(&self) -> &Battery {
        &self.battery
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::forecast::{BuildingSeries, DatasetCursor, ForecastPoint};

    fn cursor(prices: &[f64], load_kw: f64) -> DatasetCursor {
        let points = prices
            .iter()
            .map(|&price| ForecastPoint {
                price,
                load_kw,
                emissions_rate: 0.0,
            })
            .collect();
        DatasetCursor::new(Arc::new(BuildingSeries::new(1, Vec::new(), points)))
    }

    fn battery(initial_soc: f64) -> Battery {
        Battery::new(15.6, initial_soc, 0.05, 1.0, 9.6, 0.96, 0.95)
    }

    fn tracking(target: f64) -> EmbeddedSettings {
        EmbeddedSettings {
            alpha: 1.0,
            state_weight: 10.0,
            soc_target: target,
            admm: AdmmSettings {
                max_iter: 5000,
                ..AdmmSettings::default()
            },
            ..EmbeddedSettings::default()
        }
    }

    #[test]
    fn zero_state_weight_leaves_battery_idle() {
        let mut controller =
            EmbeddedController::new(cursor(&[0.2; 4], 3.0), battery(0.5), EmbeddedSettings::default());
        let decision = controller.step().unwrap();
        assert!(decision.battery_kw.abs() < 1e-6);
        assert!((decision.grid_kw - 3.0).abs() < 1e-6);
        assert_eq!(controller.current_step(), 1);
    }

    #[test]
    fn tracking_discharges_toward_lower_target() {
        let mut controller = EmbeddedController::new(cursor(&[0.1; 4], 5.0), battery(0.8), tracking(0.3));
        let decision = controller.step().unwrap();
        assert!(decision.battery_kw > 0.0, "expected discharge, got {decision}");
        assert!(decision.soc_kwh < decision.soc_before_kwh);
        assert!((decision.grid_kw - (5.0 - decision.battery_kw)).abs() < 1e-12);
    }

    #[test]
    fn higher_price_damps_the_first_move() {
        let settings = EmbeddedSettings {
            alpha: 10.0,
            ..tracking(0.3)
        };
        let first_move = |price: f64| {
            let mut controller =
                EmbeddedController::new(cursor(&[price; 4], 20.0), battery(0.8), settings.clone());
            controller.step().unwrap().battery_kw
        };
        let cheap = first_move(0.05);
        let dear = first_move(2.0);
        assert!(cheap > 0.0 && dear > 0.0, "cheap={cheap} dear={dear}");
        assert!(dear.abs() < cheap.abs(), "cheap={cheap} dear={dear}");
    }

    #[test]
    fn discharge_is_capped_at_load() {
        let mut controller = EmbeddedController::new(cursor(&[0.1; 4], 0.5), battery(0.9), tracking(0.1));
        let decision = controller.step().unwrap();
        assert!(decision.battery_kw <= 0.5 + 1e-12);
        assert!(decision.grid_kw >= -1e-12);
    }

    #[test]
    fn charging_applies_charge_efficiency() {
        let mut controller = EmbeddedController::new(cursor(&[0.1; 4], 2.0), battery(0.2), tracking(0.9));
        let decision = controller.step().unwrap();
        assert!(decision.battery_kw < 0.0);
        let expected = decision.soc_before_kwh - decision.battery_kw * 0.96;
        assert!((decision.soc_kwh - expected.min(15.6)).abs() < 1e-9);
    }

    #[test]
    fn call_past_dataset_is_out_of_range() {
        let mut controller =
            EmbeddedController::new(cursor(&[0.2, 0.2], 1.0), battery(0.5), EmbeddedSettings::default());
        controller.step().unwrap();
        controller.step().unwrap();
        assert_eq!(
            controller.step(),
            Err(ControlError::OutOfRange { step: 2, total: 2 })
        );
        assert_eq!(controller.current_step(), 2);
    }

    #[test]
    fn solver_failure_leaves_state_untouched() {
        let settings = EmbeddedSettings {
            admm: AdmmSettings {
                max_iter: 1,
                ..AdmmSettings::default()
            },
            ..tracking(0.9)
        };
        let mut controller = EmbeddedController::new(cursor(&[0.1; 3], 2.0), battery(0.2), settings);
        let err = controller.step().unwrap_err();
        assert!(matches!(err, ControlError::Infeasible { step: 0, .. }));
        assert_eq!(controller.current_step(), 0);
        assert!((controller.battery().soc_kwh() - 0.2 * 15.6).abs() < 1e-12);
    }

    #[test]
    #[should_panic]
    fn single_knot_horizon_panics() {
        let settings = EmbeddedSettings {
            horizon: 1,
            ..EmbeddedSettings::default()
        };
        EmbeddedController::new(cursor(&[0.1], 1.0), battery(0.5), settings);
    }
}
