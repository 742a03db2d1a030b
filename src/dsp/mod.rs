//! DSP module
//!
//! Core processing traits and types: the UnitProcessor trait, parameter
//! definitions, processing context, and the unit registry.

pub mod context;
pub mod parameter;
pub mod registry;
pub mod unit;

pub use context::ProcessContext;
pub use parameter::{ParameterDefinition, ParameterDisplay};
pub use registry::{RegistryError, UnitFactory, UnitRegistry, UnitSpec};
pub use unit::{UnitKind, UnitProcessor};
