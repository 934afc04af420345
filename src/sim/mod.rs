/// Box-constrained scalar LQR solved by ADMM.
pub mod admm;
pub mod controller;
pub mod driver;
pub mod embedded;
pub mod metrics;
/// Full-horizon LP controller.
pub mod optimizer;
pub mod types;
