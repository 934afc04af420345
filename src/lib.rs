//! Receding-horizon battery dispatch: an exact LP controller and an embedded
//! ADMM controller compared on the same price, load and emissions data.

pub mod config;
pub mod devices;
pub mod forecast;
/// CSV dataset ingestion and result export.
pub mod io;
pub mod runner;
/// Controllers, solver backend, driver loop and metrics.
pub mod sim;
pub mod synthetic;
