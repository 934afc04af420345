//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use battery_mpc::devices::Battery;
use battery_mpc::forecast::{BuildingSeries, DatasetCursor, ForecastPoint};
use battery_mpc::sim::embedded::EmbeddedSettings;
use battery_mpc::sim::optimizer::{ObjectiveWeights, OptimizerSettings};

/// Reference battery (2 x 7.8 kWh, 50% SOC, 5-100% window, 9.6 kW, 96/95%).
pub fn reference_battery() -> Battery {
    Battery::new(15.6, 0.5, 0.05, 1.0, 9.6, 0.96, 0.95)
}

/// Series with one point per `(price, load, emissions)` triple.
pub fn series(rows: &[(f64, f64, f64)]) -> Arc<BuildingSeries> {
    let points = rows
        .iter()
        .map(|&(price, load_kw, emissions_rate)| ForecastPoint {
            price,
            load_kw,
            emissions_rate,
        })
        .collect();
    Arc::new(BuildingSeries::new(1, Vec::new(), points))
}

/// Four-step scenario: load 5 kW, price [0.1, 0.3, 0.3, 0.1], no emissions.
pub fn four_step_series() -> Arc<BuildingSeries> {
    series(&[
        (0.1, 5.0, 0.0),
        (0.3, 5.0, 0.0),
        (0.3, 5.0, 0.0),
        (0.1, 5.0, 0.0),
    ])
}

/// Constant price and load, zero emissions.
pub fn flat_series(steps: usize, price: f64, load_kw: f64) -> Arc<BuildingSeries> {
    series(&vec![(price, load_kw, 0.0); steps])
}

/// Cursor at step 0 over `series`.
pub fn cursor(series: &Arc<BuildingSeries>) -> DatasetCursor {
    DatasetCursor::new(Arc::clone(series))
}

/// Optimizer settings that only price cost.
pub fn cost_only(horizon: usize) -> OptimizerSettings {
    OptimizerSettings {
        planning_horizon: horizon,
        weights: ObjectiveWeights {
            cost: 1.0,
            emissions: 0.0,
        },
        ..OptimizerSettings::default()
    }
}

/// Embedded settings with a custom horizon.
pub fn embedded(horizon: usize) -> EmbeddedSettings {
    EmbeddedSettings {
        horizon,
        ..EmbeddedSettings::default()
    }
}
