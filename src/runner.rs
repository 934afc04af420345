//! Per-building controller comparison.
//!
//! Every controller gets its own cursor and battery built from the same
//! configuration, so runs never observe each other's state.

use std::sync::Arc;

use thiserror::Error;

use crate::config::ScenarioConfig;
use crate::forecast::{BuildingSeries, DatasetCursor};
use crate::io::dataset::{Dataset, DatasetError};
use crate::sim::controller::{Controller, ControllerKind, DispatchController};
use crate::sim::driver::{RecedingHorizonDriver, RunReport};
use crate::sim::embedded::EmbeddedController;
use crate::sim::metrics::SummaryRecord;
use crate::sim::optimizer::OptimizationController;
use crate::sim::types::ControlError;

/// All controller runs for one building.
#[derive(Debug, Clone)]
pub struct BuildingRun {
    pub building: u32,
    pub reports: Vec<RunReport>,
}

impl BuildingRun {
    /// One summary row per controller, in run order.
    pub fn summaries(&self) -> Vec<SummaryRecord> {
        self.reports
            .iter()
            .map(|r| SummaryRecord::from_metrics(self.building, r.kind, &r.metrics))
            .collect()
    }
}

/// Failure of a comparison run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("building {building}, {kind} controller: {source}")]
    Control {
        building: u32,
        kind: ControllerKind,
        source: ControlError,
    },
}

/// Creates a controller of `kind` with a fresh cursor and battery.
///
/// # Panics
///
/// Panics on parameters [`ScenarioConfig::validate`] would reject.
pub fn build_controller(
    kind: ControllerKind,
    config: &ScenarioConfig,
    series: &Arc<BuildingSeries>,
) -> DispatchController {
    let cursor = DatasetCursor::new(Arc::clone(series));
    match kind {
        ControllerKind::Optimization => DispatchController::Optimization(
            OptimizationController::new(cursor, config.battery(), config.optimizer_settings()),
        ),
        ControllerKind::Embedded => DispatchController::Embedded(EmbeddedController::new(
            cursor,
            config.battery(),
            config.embedded_settings(),
        )),
    }
}

/// Runs every configured controller over one building.
///
/// All controllers run for the same number of steps: the horizon cap is
/// tightened so the longest look-ahead still fits in the data.
///
/// # Errors
///
/// Returns [`RunError::Control`] on a fatal controller error.
pub fn run_building(config: &ScenarioConfig, series: BuildingSeries) -> Result<BuildingRun, RunError> {
    let building = series.building();
    let series = Arc::new(series);
    let kinds = &config.simulation.controllers;

    let controllers: Vec<DispatchController> = kinds
        .iter()
        .map(|&kind| build_controller(kind, config, &series))
        .collect();
    let max_lookahead = controllers.iter().map(Controller::lookahead).max().unwrap_or(0);
    let mut sim_config = config.sim_config();
    sim_config.horizon_cap = sim_config.run_length(series.len(), max_lookahead);

    tracing::info!(building, steps = sim_config.horizon_cap, "comparing controllers");

    let mut reports = Vec::with_capacity(controllers.len());
    for controller in controllers {
        let kind = controller.kind();
        let baseline = DatasetCursor::new(Arc::clone(&series));
        let mut driver = RecedingHorizonDriver::new(sim_config.clone(), controller, baseline);
        let report = driver.run().map_err(|source| RunError::Control {
            building,
            kind,
            source,
        })?;
        reports.push(report);
    }

    Ok(BuildingRun { building, reports })
}

/// Runs every configured building of `dataset`.
///
/// # Errors
///
/// Returns the first dataset or controller error encountered.
pub fn run_all(config: &ScenarioConfig, dataset: &Dataset) -> Result<Vec<BuildingRun>, RunError> {
    config
        .dataset
        .buildings
        .iter()
        .map(|&n| run_building(config, dataset.series(n)?))
        .collect()
}
