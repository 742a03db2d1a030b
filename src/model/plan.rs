//! Frozen, engine-facing snapshot of a model's traversal.
//!
//! A plan carries everything the engine needs to build a live pipeline and
//! nothing it must not touch: unit ids, kinds, enabled flags, parameter
//! values, and forward edges between stage indices. Disabled units are
//! included (they are built bypassed) so that toggling is O(1) at run time.

use crate::dsp::UnitKind;

use super::UnitId;

/// One stage of a build plan, in traversal order.
#[derive(Clone, Debug, PartialEq)]
pub struct PlannedUnit {
    pub id: UnitId,
    pub kind: UnitKind,
    pub enabled: bool,
    /// Parameter values in process-index order.
    pub values: Vec<f32>,
}

/// The full plan: stages in traversal order plus forward edges.
///
/// Invariant: every edge `(from, to)` satisfies `from < to` (indices into
/// `units`), so the pipeline can process stages left to right and always
/// find its sources already computed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BuildPlan {
    pub units: Vec<PlannedUnit>,
    pub edges: Vec<(usize, usize)>,
}

impl BuildPlan {
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Unit ids in traversal order.
    pub fn traversal_ids(&self) -> Vec<UnitId> {
        self.units.iter().map(|u| u.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_plan() {
        let plan = BuildPlan::default();
        assert!(plan.is_empty());
        assert!(plan.traversal_ids().is_empty());
    }
}
