//! Running cost, emissions and grid-energy totals for one controller run.

use std::fmt;

use serde::Serialize;

use crate::forecast::ForecastPoint;

use super::controller::ControllerKind;

/// Running totals for the no-battery baseline and the controlled trajectory.
///
/// Totals only ever grow during a run; savings are derived once the run has
/// finished via [`AggregateMetrics::savings`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateMetrics {
    /// Σ price · load (currency).
    pub price_without_battery: f64,
    /// Σ price · grid (currency).
    pub price_with_battery: f64,
    /// Σ emissions_rate · load (kg).
    pub emissions_without_battery: f64,
    /// Σ emissions_rate · grid (kg).
    pub emissions_with_battery: f64,
    /// Σ load · dt (kWh).
    pub grid_energy_without_battery: f64,
    /// Σ grid · dt (kWh).
    pub grid_energy_with_battery: f64,
    /// Steps accumulated into the baseline totals.
    pub baseline_steps: usize,
    /// Steps accumulated into the controlled totals.
    pub controlled_steps: usize,
}

/// Baseline-minus-controlled deltas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Savings {
    pub price: f64,
    pub emissions: f64,
    pub grid_energy: f64,
}

impl AggregateMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulates the step as if no battery were installed (grid = load).
    pub fn record_baseline(&mut self, point: &ForecastPoint, dt_hours: f64) {
        self.price_without_battery += point.price * point.load_kw;
        self.emissions_without_battery += point.emissions_rate * point.load_kw;
        self.grid_energy_without_battery += point.load_kw * dt_hours;
        self.baseline_steps += 1;
    }

    /// Accumulates the grid import chosen by a controller.
    pub fn record_controlled(&mut self, point: &ForecastPoint, grid_kw: f64, dt_hours: f64) {
        self.price_with_battery += point.price * grid_kw;
        self.emissions_with_battery += point.emissions_rate * grid_kw;
        self.grid_energy_with_battery += grid_kw * dt_hours;
        self.controlled_steps += 1;
    }

    pub fn savings(&self) -> Savings {
        Savings {
            price: self.price_without_battery - self.price_with_battery,
            emissions: self.emissions_without_battery - self.emissions_with_battery,
            grid_energy: self.grid_energy_without_battery - self.grid_energy_with_battery,
        }
    }
}

impl fmt::Display for AggregateMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let savings = self.savings();
        writeln!(f, "                 without      with    saving")?;
        writeln!(
            f,
            "Price ($)     {:>10.3} {:>9.3} {:>9.3}",
            self.price_without_battery, self.price_with_battery, savings.price
        )?;
        writeln!(
            f,
            "Emissions (kg){:>10.3} {:>9.3} {:>9.3}",
            self.emissions_without_battery, self.emissions_with_battery, savings.emissions
        )?;
        write!(
            f,
            "Grid (kWh)    {:>10.3} {:>9.3} {:>9.3}",
            self.grid_energy_without_battery, self.grid_energy_with_battery, savings.grid_energy
        )
    }
}

/// One row of the comparison summary, one per (building, controller).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRecord {
    #[serde(rename = "Building")]
    pub building: u32,
    #[serde(rename = "Controller")]
    pub controller: String,
    #[serde(rename = "Total Price Without Battery")]
    pub price_without_battery: f64,
    #[serde(rename = "Total Price With Battery")]
    pub price_with_battery: f64,
    #[serde(rename = "Price Saving")]
    pub price_saving: f64,
    #[serde(rename = "Total Emissions Without Battery")]
    pub emissions_without_battery: f64,
    #[serde(rename = "Total Emissions With Battery")]
    pub emissions_with_battery: f64,
    #[serde(rename = "Emissions Saving (kg)")]
    pub emissions_saving: f64,
    #[serde(rename = "Total Grid Energy Without Battery")]
    pub grid_energy_without_battery: f64,
    #[serde(rename = "Total Grid Energy With Battery")]
    pub grid_energy_with_battery: f64,
    #[serde(rename = "Grid Energy Saving")]
    pub grid_energy_saving: f64,
}

impl SummaryRecord {
    /// Finalises `metrics` into a summary row.
    pub fn from_metrics(building: u32, controller: ControllerKind, metrics: &AggregateMetrics) -> Self {
        let savings = metrics.savings();
        Self {
            building,
            controller: controller.to_string(),
            price_without_battery: metrics.price_without_battery,
            price_with_battery: metrics.price_with_battery,
            price_saving: savings.price,
            emissions_without_battery: metrics.emissions_without_battery,
            emissions_with_battery: metrics.emissions_with_battery,
            emissions_saving: savings.emissions,
            grid_energy_without_battery: metrics.grid_energy_without_battery,
            grid_energy_with_battery: metrics.grid_energy_with_battery,
            grid_energy_saving: savings.grid_energy,
        }
    }
}

impl fmt::Display for SummaryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Building {} [{}]: price saving {:.3} $, emissions saving {:.3} kg, \
             grid energy saving {:.3} kWh",
            self.building,
            self.controller,
            self.price_saving,
            self.emissions_saving,
            self.grid_energy_saving,
        )
    }
}
