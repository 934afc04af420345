//! Receding-horizon driver: steps one controller through the dataset.

use crate::forecast::{DatasetCursor, ForecastProvider};

use super::controller::{Controller, ControllerKind};
use super::metrics::AggregateMetrics;
use super::types::{ControlError, FailurePolicy, SimConfig, StepRecord};

/// Outcome of one controller run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Strategy that produced the run.
    pub kind: ControllerKind,
    /// One record per successful step, in order.
    pub records: Vec<StepRecord>,
    /// Baseline and controlled totals.
    pub metrics: AggregateMetrics,
    /// Steps the controller failed on and skipped.
    pub skipped_steps: Vec<usize>,
    /// Step at which the run was aborted, if it was.
    pub aborted_at: Option<usize>,
}

impl RunReport {
    /// Number of steps the driver attempted.
    pub fn steps_attempted(&self) -> usize {
        self.metrics.baseline_steps
    }
}

/// Drives a single controller for a bounded number of steps.
///
/// Generic over `C: Controller` for static dispatch. The driver keeps its own
/// baseline cursor over the same data so no-battery metrics never depend on
/// the controller's cursor.
pub struct RecedingHorizonDriver<C: Controller> {
    config: SimConfig,
    controller: C,
    baseline: DatasetCursor,
}

impl<C: Controller> RecedingHorizonDriver<C> {
    /// Creates a driver.
    ///
    /// # Arguments
    ///
    /// * `config` - Run length cap, step duration and failure policy
    /// * `controller` - Controller under test, positioned at step 0
    /// * `baseline` - Independent cursor over the controller's dataset
    pub fn new(config: SimConfig, controller: C, baseline: DatasetCursor) -> Self {
        Self {
            config,
            controller,
            baseline,
        }
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    /// Number of steps [`RecedingHorizonDriver::run`] will attempt.
    pub fn run_length(&self) -> usize {
        self.config
            .run_length(self.baseline.total_steps(), self.controller.lookahead())
    }

    /// Runs the controller to completion.
    ///
    /// Baseline metrics are accumulated for every attempted step before the
    /// controller is invoked. `Infeasible` steps are handled by the configured
    /// [`FailurePolicy`]; `EndOfHorizon` terminates the loop normally.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::OutOfRange`] if the controller is driven past
    /// its dataset, or [`ControlError::CursorMismatch`] if the controller's
    /// cursor is not at the step the driver is about to price.
    pub fn run(&mut self) -> Result<RunReport, ControlError> {
        let steps = self.run_length();
        let dt = self.config.dt_hours;
        let kind = self.controller.kind();
        let capacity_kwh = self.controller.battery().capacity_kwh;

        let mut report = RunReport {
            kind,
            records: Vec::with_capacity(steps),
            metrics: AggregateMetrics::new(),
            skipped_steps: Vec::new(),
            aborted_at: None,
        };

        tracing::info!(%kind, steps, policy = %self.config.failure_policy, "starting run");

        for _ in 0..steps {
            let t = self.baseline.current_step();
            let at = self.controller.current_step();
            if at != t {
                return Err(ControlError::CursorMismatch { step: at, expected: t });
            }
            let Some(&point) = self.baseline.window(t, 1).get(0) else {
                break;
            };
            self.baseline.advance();
            report.metrics.record_baseline(&point, dt);

            match self.controller.step() {
                Ok(decision) => {
                    report.metrics.record_controlled(&point, decision.grid_kw, dt);
                    report.records.push(StepRecord {
                        timestep: decision.timestep,
                        time_hr: decision.timestep as f64 * dt,
                        load_kw: point.load_kw,
                        price: point.price,
                        emissions_rate: point.emissions_rate,
                        grid_kw: decision.grid_kw,
                        battery_kw: decision.battery_kw,
                        soc_kwh: decision.soc_kwh,
                        soc_pct: 100.0 * decision.soc_kwh / capacity_kwh,
                    });
                }
                Err(ControlError::EndOfHorizon { step }) => {
                    tracing::debug!(step, "forecast exhausted");
                    break;
                }
                Err(err @ (ControlError::OutOfRange { .. } | ControlError::CursorMismatch { .. })) => {
                    return Err(err);
                }
                Err(err @ ControlError::Infeasible { .. }) => match self.config.failure_policy {
                    FailurePolicy::Abort => {
                        tracing::warn!(%kind, error = %err, "aborting run");
                        report.aborted_at = Some(err.step());
                        break;
                    }
                    FailurePolicy::Skip => {
                        tracing::warn!(%kind, error = %err, "skipping step");
                        self.controller.skip()?;
                        report.skipped_steps.push(err.step());
                    }
                },
            }
        }

        let savings = report.metrics.savings();
        tracing::info!(
            %kind,
            completed = report.records.len(),
            skipped = report.skipped_steps.len(),
            price_saving = savings.price,
            emissions_saving = savings.emissions,
            "run finished"
        );
        Ok(report)
    }
}
