//! Totally ordered chain model.
//!
//! Order is the index into the unit list, so normalization (no gaps, no
//! duplicate indices) holds by construction after every remove or move.

use crate::dsp::{UnitKind, UnitRegistry};

use super::plan::{BuildPlan, PlannedUnit};
use super::unit::ModelUnit;
use super::{ModelError, UnitId};

/// A pedal-board style chain of processing units.
#[derive(Clone, Debug, Default)]
pub struct ChainModel {
    units: Vec<ModelUnit>,
    next_id: UnitId,
}

impl ChainModel {
    pub fn new() -> Self {
        Self {
            units: Vec::new(),
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn units(&self) -> &[ModelUnit] {
        &self.units
    }

    pub fn unit(&self, id: UnitId) -> Option<&ModelUnit> {
        self.units.iter().find(|u| u.id == id)
    }

    /// Position of a unit in the chain.
    pub fn order_of(&self, id: UnitId) -> Option<usize> {
        self.units.iter().position(|u| u.id == id)
    }

    fn index_of(&self, id: UnitId) -> Result<usize, ModelError> {
        self.order_of(id).ok_or(ModelError::UnknownUnit(id))
    }

    /// Appends a unit of the given kind with registry defaults.
    pub fn add_unit(&mut self, kind: UnitKind, registry: &UnitRegistry) -> Result<UnitId, ModelError> {
        self.insert_unit(kind, self.units.len(), registry)
    }

    /// Inserts a unit at a specific chain position (clamped to the end).
    pub fn insert_unit(
        &mut self,
        kind: UnitKind,
        index: usize,
        registry: &UnitRegistry,
    ) -> Result<UnitId, ModelError> {
        let id = self.next_id;
        let unit = ModelUnit::from_registry(id, kind, registry)?;
        self.next_id += 1;
        let index = index.min(self.units.len());
        self.units.insert(index, unit);
        Ok(id)
    }

    pub fn remove_unit(&mut self, id: UnitId) -> Result<(), ModelError> {
        let index = self.index_of(id)?;
        self.units.remove(index);
        Ok(())
    }

    pub fn set_enabled(&mut self, id: UnitId, enabled: bool) -> Result<(), ModelError> {
        let index = self.index_of(id)?;
        self.units[index].enabled = enabled;
        Ok(())
    }

    /// Moves a unit to a new chain position (clamped to the end).
    pub fn move_unit(&mut self, id: UnitId, new_index: usize) -> Result<(), ModelError> {
        let index = self.index_of(id)?;
        let unit = self.units.remove(index);
        let new_index = new_index.min(self.units.len());
        self.units.insert(new_index, unit);
        Ok(())
    }

    /// Reorders the whole chain. `new_order` must name every unit exactly
    /// once.
    pub fn reorder(&mut self, new_order: &[UnitId]) -> Result<(), ModelError> {
        if new_order.len() != self.units.len() {
            return Err(ModelError::InvalidOrder);
        }
        let mut reordered = Vec::with_capacity(self.units.len());
        for &id in new_order {
            let index = self
                .units
                .iter()
                .position(|u| u.id == id)
                .ok_or(ModelError::InvalidOrder)?;
            if reordered.iter().any(|u: &ModelUnit| u.id == id) {
                return Err(ModelError::InvalidOrder);
            }
            reordered.push(self.units[index].clone());
        }
        self.units = reordered;
        Ok(())
    }

    /// Sets a parameter, silently clamping out-of-range values.
    pub fn set_parameter(&mut self, id: UnitId, name: &str, value: f32) -> Result<f32, ModelError> {
        let index = self.index_of(id)?;
        self.units[index].set_parameter(name, value)
    }

    /// Derived traversal order: enabled units, chain order ascending.
    pub fn traversal(&self) -> Vec<UnitId> {
        self.units.iter().filter(|u| u.enabled).map(|u| u.id).collect()
    }

    /// Freezes the chain into an engine build plan. All units are included;
    /// disabled ones are built bypassed.
    pub fn build_plan(&self) -> BuildPlan {
        let units = self
            .units
            .iter()
            .map(|u| PlannedUnit {
                id: u.id,
                kind: u.kind,
                enabled: u.enabled,
                values: u.values(),
            })
            .collect::<Vec<_>>();
        let edges = (1..units.len()).map(|i| (i - 1, i)).collect();
        BuildPlan { units, edges }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::builtin_registry;

    fn board() -> (ChainModel, UnitRegistry) {
        let registry = builtin_registry();
        let mut model = ChainModel::new();
        model.add_unit(UnitKind::Input, &registry).unwrap();
        model.add_unit(UnitKind::Distortion, &registry).unwrap();
        model.add_unit(UnitKind::Delay, &registry).unwrap();
        model.add_unit(UnitKind::Output, &registry).unwrap();
        (model, registry)
    }

    #[test]
    fn test_add_assigns_stable_ids() {
        let (model, _) = board();
        let ids: Vec<_> = model.units().iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_remove_normalizes_order() {
        let (mut model, _) = board();
        model.remove_unit(2).unwrap();

        assert_eq!(model.len(), 3);
        assert_eq!(model.order_of(1), Some(0));
        assert_eq!(model.order_of(3), Some(1));
        assert_eq!(model.order_of(4), Some(2));
    }

    #[test]
    fn test_remove_unknown_is_error() {
        let (mut model, _) = board();
        assert_eq!(model.remove_unit(99), Err(ModelError::UnknownUnit(99)));
    }

    #[test]
    fn test_move_unit() {
        let (mut model, _) = board();
        model.move_unit(3, 1).unwrap();
        assert_eq!(model.traversal(), vec![1, 3, 2, 4]);
    }

    #[test]
    fn test_move_preserves_identity_and_parameters() {
        let (mut model, _) = board();
        model.set_parameter(2, "drive", 0.9).unwrap();
        model.move_unit(2, 2).unwrap();

        let unit = model.unit(2).unwrap();
        assert_eq!(unit.kind, UnitKind::Distortion);
        assert_eq!(unit.parameter("drive").unwrap().value(), 0.9);
    }

    #[test]
    fn test_reorder_full_permutation() {
        let (mut model, _) = board();
        model.reorder(&[4, 3, 2, 1]).unwrap();
        assert_eq!(model.traversal(), vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_reorder_rejects_partial_list() {
        let (mut model, _) = board();
        assert_eq!(model.reorder(&[1, 2]), Err(ModelError::InvalidOrder));
        assert_eq!(model.reorder(&[1, 1, 2, 3]), Err(ModelError::InvalidOrder));
        // Model unchanged after rejection
        assert_eq!(model.traversal(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_traversal_skips_disabled() {
        let (mut model, _) = board();
        model.set_enabled(2, false).unwrap();
        assert_eq!(model.traversal(), vec![1, 3, 4]);
    }

    #[test]
    fn test_set_parameter_clamps() {
        let (mut model, _) = board();
        let applied = model.set_parameter(2, "drive", 99.0).unwrap();
        assert_eq!(applied, 1.0);
    }

    #[test]
    fn test_insert_before_unit() {
        let (mut model, registry) = board();
        let index = model.order_of(4).unwrap();
        let reverb = model.insert_unit(UnitKind::Reverb, index, &registry).unwrap();
        assert_eq!(model.traversal(), vec![1, 2, 3, reverb, 4]);
    }

    #[test]
    fn test_build_plan_includes_disabled_with_linear_edges() {
        let (mut model, _) = board();
        model.set_enabled(3, false).unwrap();

        let plan = model.build_plan();
        assert_eq!(plan.len(), 4);
        assert!(!plan.units[2].enabled);
        assert_eq!(plan.edges, vec![(0, 1), (1, 2), (2, 3)]);
    }
}
