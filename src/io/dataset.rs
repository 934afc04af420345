//! CSV ingestion of price, emissions and per-building load columns.
//!
//! Expected header (column order is free, extra columns are ignored):
//!
//! ```text
//! time,costData,Building 1,Building 2,...,Emissions
//! ```

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use thiserror::Error;

use crate::forecast::{BuildingSeries, ForecastPoint};

const TIME_COLUMN: &str = "time";
const PRICE_COLUMN: &str = "costData";
const EMISSIONS_COLUMN: &str = "Emissions";
const BUILDING_PREFIX: &str = "Building ";

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to open dataset: {0}")]
    Io(#[from] io::Error),

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing required column \"{0}\"")]
    MissingColumn(String),

    #[error("dataset has no \"Building <n>\" columns")]
    NoBuildings,

    #[error("building {0} appears in more than one column")]
    DuplicateBuilding(u32),

    #[error("dataset contains no rows")]
    Empty,

    #[error("building {requested} not in dataset (available: {available:?})")]
    UnknownBuilding { requested: u32, available: Vec<u32> },

    #[error("row {row}, column \"{column}\": cannot parse \"{value}\" as a finite number")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },
}

/// In-memory dataset shared by every building series derived from it.
#[derive(Debug, Clone)]
pub struct Dataset {
    labels: Vec<String>,
    price: Vec<f64>,
    emissions: Vec<f64>,
    buildings: BTreeMap<u32, Vec<f64>>,
}

impl Dataset {
    /// Builds a dataset from column vectors.
    ///
    /// # Errors
    ///
    /// `Empty` if there are no rows, `NoBuildings` if `buildings` is empty.
    ///
    /// # Panics
    ///
    /// Panics if the column lengths disagree.
    pub fn from_columns(
        labels: Vec<String>,
        price: Vec<f64>,
        emissions: Vec<f64>,
        buildings: BTreeMap<u32, Vec<f64>>,
    ) -> Result<Self, DatasetError> {
        if price.is_empty() {
            return Err(DatasetError::Empty);
        }
        if buildings.is_empty() {
            return Err(DatasetError::NoBuildings);
        }
        let rows = price.len();
        assert_eq!(emissions.len(), rows);
        assert!(labels.is_empty() || labels.len() == rows);
        assert!(buildings.values().all(|load| load.len() == rows));

        Ok(Self {
            labels,
            price,
            emissions,
            buildings,
        })
    }

    /// Reads a dataset from CSV text.
    ///
    /// # Errors
    ///
    /// Returns a [`DatasetError`] if the header lacks a required column or
    /// names a building twice, any cell fails to parse, or the file has no
    /// rows.
    pub fn from_reader(reader: impl Read) -> Result<Self, DatasetError> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers = rdr.headers()?.clone();

        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| DatasetError::MissingColumn(name.to_string()))
        };
        let price_idx = find(PRICE_COLUMN)?;
        let emissions_idx = find(EMISSIONS_COLUMN)?;
        let time_idx = headers.iter().position(|h| h == TIME_COLUMN);

        let building_cols: Vec<(u32, usize)> = headers
            .iter()
            .enumerate()
            .filter_map(|(i, h)| {
                h.strip_prefix(BUILDING_PREFIX)
                    .and_then(|n| n.trim().parse::<u32>().ok())
                    .map(|n| (n, i))
            })
            .collect();
        if building_cols.is_empty() {
            return Err(DatasetError::NoBuildings);
        }
        for (i, &(n, _)) in building_cols.iter().enumerate() {
            if building_cols[..i].iter().any(|&(seen, _)| seen == n) {
                return Err(DatasetError::DuplicateBuilding(n));
            }
        }

        let mut labels = Vec::new();
        let mut price = Vec::new();
        let mut emissions = Vec::new();
        let mut buildings: BTreeMap<u32, Vec<f64>> =
            building_cols.iter().map(|&(n, _)| (n, Vec::new())).collect();

        for (row, record) in rdr.records().enumerate() {
            let record = record?;
            let cell = |idx: usize| -> Result<f64, DatasetError> {
                let raw = record.get(idx).unwrap_or("");
                raw.parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| DatasetError::InvalidValue {
                        row,
                        column: headers.get(idx).unwrap_or("").to_string(),
                        value: raw.to_string(),
                    })
            };

            price.push(cell(price_idx)?);
            emissions.push(cell(emissions_idx)?);
            for &(n, idx) in &building_cols {
                let value = cell(idx)?;
                if let Some(load) = buildings.get_mut(&n) {
                    load.push(value);
                }
            }
            if let Some(idx) = time_idx {
                labels.push(record.get(idx).unwrap_or("").to_string());
            }
        }

        Self::from_columns(labels, price, emissions, buildings)
    }

    /// Opens and reads a CSV dataset from `path`.
    pub fn from_path(path: &Path) -> Result<Self, DatasetError> {
        let file = File::open(path)?;
        let dataset = Self::from_reader(io::BufReader::new(file))?;
        tracing::info!(
            path = %path.display(),
            rows = dataset.len(),
            buildings = dataset.buildings.len(),
            "loaded dataset"
        );
        Ok(dataset)
    }

    /// Number of rows (steps).
    pub fn len(&self) -> usize {
        self.price.len()
    }

    pub fn is_empty(&self) -> bool {
        self.price.is_empty()
    }

    /// Building numbers present in the dataset, ascending.
    pub fn buildings(&self) -> Vec<u32> {
        self.buildings.keys().copied().collect()
    }

    /// Extracts the forecast series for building `n`.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::UnknownBuilding`] if there is no such column.
    pub fn series(&self, n: u32) -> Result<BuildingSeries, DatasetError> {
        let load = self
            .buildings
            .get(&n)
            .ok_or_else(|| DatasetError::UnknownBuilding {
                requested: n,
                available: self.buildings(),
            })?;

        let points = self
            .price
            .iter()
            .zip(&self.emissions)
            .zip(load)
            .map(|((&price, &emissions_rate), &load_kw)| ForecastPoint {
                price,
                load_kw,
                emissions_rate,
            })
            .collect();

        Ok(BuildingSeries::new(n, self.labels.clone(), points))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
time,costData,Building 1,Building 2,Emissions
00:00,0.10,5.0,2.0,0.40
01:00,0.30,4.0,2.5,0.35
02:00,0.20,6.0,1.5,0.50
";

    #[test]
    fn reads_columns_and_buildings() {
        let ds = Dataset::from_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.buildings(), vec![1, 2]);

        let s = ds.series(2).unwrap();
        assert_eq!(s.building(), 2);
        assert_eq!(s.len(), 3);
        assert_eq!(s.points()[1].load_kw, 2.5);
        assert_eq!(s.points()[1].price, 0.30);
        assert_eq!(s.points()[2].emissions_rate, 0.50);
        assert_eq!(s.label(0), "00:00");
        assert!((s.max_price() - 0.30).abs() < 1e-12);
        assert!((s.max_emissions() - 0.50).abs() < 1e-12);
    }

    #[test]
    fn unknown_building_is_reported() {
        let ds = Dataset::from_reader(SAMPLE.as_bytes()).unwrap();
        match ds.series(7) {
            Err(DatasetError::UnknownBuilding {
                requested,
                available,
            }) => {
                assert_eq!(requested, 7);
                assert_eq!(available, vec![1, 2]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_price_column_is_fatal() {
        let csv = "time,Building 1,Emissions\n0,1.0,0.1\n";
        assert!(matches!(
            Dataset::from_reader(csv.as_bytes()),
            Err(DatasetError::MissingColumn(c)) if c == "costData"
        ));
    }

    #[test]
    fn no_building_columns_is_fatal() {
        let csv = "time,costData,Emissions\n0,0.1,0.1\n";
        assert!(matches!(
            Dataset::from_reader(csv.as_bytes()),
            Err(DatasetError::NoBuildings)
        ));
    }

    #[test]
    fn duplicate_building_columns_are_rejected() {
        for csv in [
            "costData,Building 1,Building 01,Emissions\n0.1,1.0,2.0,0.1\n0.2,1.5,2.5,0.1\n",
            "costData,Building 4,Building 4,Emissions\n0.1,1.0,2.0,0.1\n",
        ] {
            assert!(matches!(
                Dataset::from_reader(csv.as_bytes()),
                Err(DatasetError::DuplicateBuilding(_))
            ));
        }
    }

    #[test]
    fn header_only_is_empty() {
        let csv = "time,costData,Building 1,Emissions\n";
        assert!(matches!(
            Dataset::from_reader(csv.as_bytes()),
            Err(DatasetError::Empty)
        ));
    }

    #[test]
    fn bad_cell_reports_row_and_column() {
        let csv = "costData,Building 1,Emissions\n0.1,1.0,0.1\n0.2,abc,0.1\n";
        match Dataset::from_reader(csv.as_bytes()) {
            Err(DatasetError::InvalidValue { row, column, value }) => {
                assert_eq!(row, 1);
                assert_eq!(column, "Building 1");
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_time_column_falls_back_to_index() {
        let csv = "costData,Building 3,Emissions\n0.1,1.0,0.1\n";
        let s = Dataset::from_reader(csv.as_bytes())
            .unwrap()
            .series(3)
            .unwrap();
        assert_eq!(s.label(0), "0");
    }
}
