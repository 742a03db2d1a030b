//! Chain and graph models.
//!
//! The model is the control-domain description of the signal path: which
//! units exist, whether they are enabled, how they are ordered or connected,
//! and the authoritative parameter values. It is mutated synchronously by
//! the control surface and never touched by the audio path; the engine only
//! ever sees frozen [`BuildPlan`] snapshots.

pub mod chain;
pub mod graph;
pub mod plan;
pub mod unit;

pub use chain::ChainModel;
pub use graph::{Connection, GraphModel};
pub use plan::{BuildPlan, PlannedUnit};
pub use unit::{ModelUnit, Parameter};

use thiserror::Error;

use crate::dsp::RegistryError;

/// Unique identifier for a unit in a model. Stable across reorders.
pub type UnitId = u64;

/// Errors from model mutations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// The requested connection would close a cycle; the model is unchanged.
    #[error("connection would create a cycle")]
    CycleDetected,
    /// No unit with this id exists in the model.
    #[error("unknown unit id {0}")]
    UnknownUnit(UnitId),
    /// The unit exists but has no parameter with this name.
    #[error("unit {unit} has no parameter named '{name}'")]
    UnknownParameter { unit: UnitId, name: String },
    /// The connection already exists.
    #[error("duplicate connection {from} -> {to}")]
    DuplicateConnection { from: UnitId, to: UnitId },
    /// A reorder list did not name every unit exactly once.
    #[error("reorder list is not a permutation of the current units")]
    InvalidOrder,
    /// An enabled unit is not on a path from the input to the output.
    #[error("unit {0} is not on an input-to-output path")]
    UnreachableUnit(UnitId),
    /// Registry lookup failed while adding a unit.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
