//! Physical device models.

/// Aggregate stationary battery model.
pub mod battery;

pub use battery::Battery;
