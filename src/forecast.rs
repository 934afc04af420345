//! Forecast data model and the cursor-based provider the controllers read from.

use std::sync::Arc;

/// Smallest value used when normalising by a dataset-wide maximum.
pub const NORMALIZATION_FLOOR: f64 = 1e-6;

/// One step of forecast data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastPoint {
    /// Grid price (currency/kWh).
    pub price: f64,
    /// Building load (kW, positive).
    pub load_kw: f64,
    /// Grid emissions rate (kg/kWh).
    pub emissions_rate: f64,
}

/// Read-only view over consecutive forecast points.
///
/// The window may be shorter than the nominal horizon near the end of the
/// dataset; callers size their problem from [`ForecastWindow::len`].
#[derive(Debug, Clone, Copy)]
pub struct ForecastWindow<'a> {
    start: usize,
    points: &'a [ForecastPoint],
}

impl<'a> ForecastWindow<'a> {
    pub fn new(start: usize, points: &'a [ForecastPoint]) -> Self {
        Self { start, points }
    }

    /// Dataset index of the first point.
    pub fn start(&self) -> usize {
        self.start
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &'a [ForecastPoint] {
        self.points
    }

    /// Returns the point at offset `i` within the window.
    pub fn get(&self, i: usize) -> Option<&'a ForecastPoint> {
        self.points.get(i)
    }
}

/// Source of forecasts plus the simulation cursor.
///
/// Each controller owns one provider instance, so advancing one controller's
/// cursor is never visible to another.
pub trait ForecastProvider {
    /// Current step index (monotonic, never rewound).
    fn current_step(&self) -> usize;

    /// Number of steps in the underlying dataset.
    fn total_steps(&self) -> usize;

    /// Returns up to `length` points starting at `start`.
    ///
    /// Requests reaching past the end are truncated to the remaining points
    /// rather than failing.
    fn window(&self, start: usize, length: usize) -> ForecastWindow<'_>;

    /// Moves the cursor forward by one step.
    fn advance(&mut self);

    /// Dataset-wide maximum price, floored at [`NORMALIZATION_FLOOR`].
    fn max_price(&self) -> f64;

    /// Dataset-wide maximum emissions rate, floored at [`NORMALIZATION_FLOOR`].
    fn max_emissions(&self) -> f64;

    /// Number of steps left from the cursor to the end of the dataset.
    fn remaining_steps(&self) -> usize {
        self.total_steps().saturating_sub(self.current_step())
    }
}

/// Price, load and emissions series for a single building.
#[derive(Debug, Clone)]
pub struct BuildingSeries {
    building: u32,
    labels: Vec<String>,
    points: Vec<ForecastPoint>,
    max_price: f64,
    max_emissions: f64,
}

impl BuildingSeries {
    /// Creates a series and computes the normalisation maxima.
    ///
    /// `labels` are the time labels of the rows; pass an empty vector to use
    /// the row index instead.
    ///
    /// # Panics
    ///
    /// Panics if `labels` is non-empty and its length differs from `points`.
    pub fn new(building: u32, labels: Vec<String>, points: Vec<ForecastPoint>) -> Self {
        assert!(labels.is_empty() || labels.len() == points.len());
        let max_price = points
            .iter()
            .map(|p| p.price)
            .fold(f64::NEG_INFINITY, f64::max)
            .max(NORMALIZATION_FLOOR);
        let max_emissions = points
            .iter()
            .map(|p| p.emissions_rate)
            .fold(f64::NEG_INFINITY, f64::max)
            .max(NORMALIZATION_FLOOR);

        Self {
            building,
            labels,
            points,
            max_price,
            max_emissions,
        }
    }

    pub fn building(&self) -> u32 {
        self.building
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[ForecastPoint] {
        &self.points
    }

    /// Time label for row `t`, falling back to the row index.
    pub fn label(&self, t: usize) -> String {
        self.labels
            .get(t)
            .cloned()
            .unwrap_or_else(|| t.to_string())
    }

    pub fn max_price(&self) -> f64 {
        self.max_price
    }

    pub fn max_emissions(&self) -> f64 {
        self.max_emissions
    }
}

/// [`ForecastProvider`] over a shared, immutable [`BuildingSeries`].
///
/// Cloning the `Arc` is cheap; every cursor created from it is independent.
#[derive(Debug, Clone)]
pub struct DatasetCursor {
    series: Arc<BuildingSeries>,
    cursor: usize,
}

impl DatasetCursor {
    /// Creates a cursor positioned at step 0.
    pub fn new(series: Arc<BuildingSeries>) -> Self {
        Self { series, cursor: 0 }
    }

    pub fn series(&self) -> &BuildingSeries {
        &self.series
    }
}

impl ForecastProvider for DatasetCursor {
    fn current_step(&self) -> usize {
        self.cursor
    }

    fn total_steps(&self) -> usize {
        self.series.len()
    }

    fn window(&self, start: usize, length: usize) -> ForecastWindow<'_> {
        let total = self.series.len();
        let start = start.min(total);
        let end = start.saturating_add(length).min(total);
        ForecastWindow::new(start, &self.series.points[start..end])
    }

    fn advance(&mut self) {
        self.cursor += 1;
    }

    fn max_price(&self) -> f64 {
        self.series.max_price
    }

    fn max_emissions(&self) -> f64 {
        self.series.max_emissions
    }
}
