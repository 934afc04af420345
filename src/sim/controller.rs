//! Controller contract shared by both dispatch strategies.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::devices::Battery;
use crate::forecast::{DatasetCursor, ForecastProvider};

use super::embedded::EmbeddedController;
use super::optimizer::OptimizationController;
use super::types::{ControlError, StepDecision};

/// Single-step dispatch capability driven by the receding-horizon loop.
///
/// Implementors own their forecast cursor and battery. A successful
/// [`Controller::step`] advances the cursor by exactly one and updates the
/// SOC once; a failed one leaves both untouched.
pub trait Controller {
    /// Computes, applies, and returns the decision for the current step.
    fn step(&mut self) -> Result<StepDecision, ControlError>;

    /// Moves past the current step without dispatching the battery.
    fn skip(&mut self) -> Result<(), ControlError>;

    /// Which strategy this controller implements.
    fn kind(&self) -> ControllerKind;

    /// Number of look-ahead steps the controller plans over.
    fn lookahead(&self) -> usize;

    /// Current cursor position.
    fn current_step(&self) -> usize;

    /// Battery owned by this controller.
    fn battery(&self) -> &Battery;
}

/// Available controller strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerKind {
    /// Full-horizon linear program solved exactly every step.
    Optimization,
    /// Reduced single-state QP re-solved by the ADMM backend.
    Embedded,
}

impl ControllerKind {
    pub const ALL: [ControllerKind; 2] = [ControllerKind::Optimization, ControllerKind::Embedded];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Optimization => "optimization",
            Self::Embedded => "embedded",
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControllerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "optimization" => Ok(Self::Optimization),
            "embedded" => Ok(Self::Embedded),
            other => Err(format!(
                "unknown controller \"{other}\", expected \"optimization\" or \"embedded\""
            )),
        }
    }
}

/// Controller wrapper that erases the strategy type via enum dispatch.
#[derive(Debug, Clone)]
pub enum DispatchController {
    Optimization(OptimizationController<DatasetCursor>),
    Embedded(EmbeddedController<DatasetCursor>),
}

impl Controller for DispatchController {
    fn step(&mut self) -> Result<StepDecision, ControlError> {
        match self {
            Self::Optimization(c) => c.step(),
            Self::Embedded(c) => c.step(),
        }
    }

    fn skip(&mut self) -> Result<(), ControlError> {
        match self {
            Self::Optimization(c) => c.skip(),
            Self::Embedded(c) => c.skip(),
        }
    }

    fn kind(&self) -> ControllerKind {
        match self {
            Self::Optimization(c) => c.kind(),
            Self::Embedded(c) => c.kind(),
        }
    }

    fn lookahead(&self) -> usize {
        match self {
            Self::Optimization(c) => c.lookahead(),
            Self::Embedded(c) => c.lookahead(),
        }
    }

    fn current_step(&self) -> usize {
        match self {
            Self::Optimization(c) => c.current_step(),
            Self::Embedded(c) => c.current_step(),
        }
    }

    fn battery(&self) -> &Battery {
        match self {
            Self::Optimization(c) => c.battery(),
            Self::Embedded(c) => c.battery(),
        }
    }
}

/// Shared `skip` implementation: refuses once the cursor has left the data.
pub(crate) fn skip_step<P: ForecastProvider>(provider: &mut P) -> Result<(), ControlError> {
    let step = provider.current_step();
    let total = provider.total_steps();
    if step >= total {
        return Err(ControlError::OutOfRange { step, total });
    }
    tracing::debug!(step, "skipping step without dispatch");
    provider.advance();
    Ok(())
}
