//! Free-routing node graph model.
//!
//! Units are nodes with positions, connections are directed edges, and the
//! processing order is a deterministic topological sort. The graph is kept
//! acyclic by construction: `connect` speculatively adds the edge, runs the
//! sort, and rolls back if a cycle is found.

use std::collections::{HashMap, VecDeque};

use crate::dsp::{UnitKind, UnitRegistry};

use super::plan::{BuildPlan, PlannedUnit};
use super::unit::ModelUnit;
use super::{ModelError, UnitId};

/// A directed edge between two units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Connection {
    pub from: UnitId,
    pub to: UnitId,
}

#[derive(Clone, Debug)]
struct GraphNode {
    unit: ModelUnit,
    position: (f32, f32),
}

/// A directed acyclic graph of processing units.
#[derive(Clone, Debug, Default)]
pub struct GraphModel {
    nodes: Vec<GraphNode>,
    connections: Vec<Connection>,
    next_id: UnitId,
}

impl GraphModel {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            connections: Vec::new(),
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn units(&self) -> impl Iterator<Item = &ModelUnit> {
        self.nodes.iter().map(|n| &n.unit)
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn unit(&self, id: UnitId) -> Option<&ModelUnit> {
        self.nodes.iter().find(|n| n.unit.id == id).map(|n| &n.unit)
    }

    pub fn position(&self, id: UnitId) -> Option<(f32, f32)> {
        self.nodes.iter().find(|n| n.unit.id == id).map(|n| n.position)
    }

    fn index_of(&self, id: UnitId) -> Result<usize, ModelError> {
        self.nodes
            .iter()
            .position(|n| n.unit.id == id)
            .ok_or(ModelError::UnknownUnit(id))
    }

    /// Adds a unit of the given kind at a canvas position.
    pub fn add_unit(
        &mut self,
        kind: UnitKind,
        position: (f32, f32),
        registry: &UnitRegistry,
    ) -> Result<UnitId, ModelError> {
        let id = self.next_id;
        let unit = ModelUnit::from_registry(id, kind, registry)?;
        self.next_id += 1;
        self.nodes.push(GraphNode { unit, position });
        Ok(id)
    }

    /// Removes a unit along with every connection touching it.
    pub fn remove_unit(&mut self, id: UnitId) -> Result<(), ModelError> {
        let index = self.index_of(id)?;
        self.nodes.remove(index);
        self.connections.retain(|c| c.from != id && c.to != id);
        Ok(())
    }

    pub fn set_enabled(&mut self, id: UnitId, enabled: bool) -> Result<(), ModelError> {
        let index = self.index_of(id)?;
        self.nodes[index].unit.enabled = enabled;
        Ok(())
    }

    pub fn set_position(&mut self, id: UnitId, position: (f32, f32)) -> Result<(), ModelError> {
        let index = self.index_of(id)?;
        self.nodes[index].position = position;
        Ok(())
    }

    /// Sets a parameter, silently clamping out-of-range values.
    pub fn set_parameter(&mut self, id: UnitId, name: &str, value: f32) -> Result<f32, ModelError> {
        let index = self.index_of(id)?;
        self.nodes[index].unit.set_parameter(name, value)
    }

    /// Connects `from` into `to`. Rejects unknown endpoints, duplicates and
    /// anything that would close a cycle; on rejection the graph is exactly
    /// as it was.
    pub fn connect(&mut self, from: UnitId, to: UnitId) -> Result<(), ModelError> {
        self.index_of(from)?;
        self.index_of(to)?;
        if from == to {
            return Err(ModelError::CycleDetected);
        }
        if self.connections.iter().any(|c| c.from == from && c.to == to) {
            return Err(ModelError::DuplicateConnection { from, to });
        }

        // Speculative add, then sort to check acyclicity
        self.connections.push(Connection { from, to });
        if self.sorted_ids(|_| true).is_none() {
            self.connections.pop();
            return Err(ModelError::CycleDetected);
        }
        Ok(())
    }

    /// Removes a connection. Returns whether it existed.
    pub fn disconnect(&mut self, from: UnitId, to: UnitId) -> bool {
        let before = self.connections.len();
        self.connections.retain(|c| !(c.from == from && c.to == to));
        self.connections.len() != before
    }

    /// Kahn's algorithm over a subset of units, always dequeuing the smallest
    /// ready id so the order is a pure function of the graph's structure.
    /// Returns `None` if the subset contains a cycle.
    fn sorted_ids(&self, include: impl Fn(&ModelUnit) -> bool) -> Option<Vec<UnitId>> {
        let mut in_degree: HashMap<UnitId, usize> = self
            .nodes
            .iter()
            .filter(|n| include(&n.unit))
            .map(|n| (n.unit.id, 0))
            .collect();
        for c in &self.connections {
            if in_degree.contains_key(&c.from) {
                if let Some(d) = in_degree.get_mut(&c.to) {
                    *d += 1;
                }
            }
        }

        let mut ready: Vec<UnitId> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(id, _)| *id)
            .collect();
        ready.sort_unstable();
        let mut queue: VecDeque<UnitId> = ready.into();

        let mut order = Vec::with_capacity(in_degree.len());
        while let Some(id) = queue.pop_front() {
            order.push(id);
            let mut unlocked = Vec::new();
            for c in &self.connections {
                if c.from == id {
                    if let Some(d) = in_degree.get_mut(&c.to) {
                        *d -= 1;
                        if *d == 0 {
                            unlocked.push(c.to);
                        }
                    }
                }
            }
            // Keep the queue sorted so ties always break toward smaller ids
            unlocked.sort_unstable();
            for id in unlocked {
                let pos = queue.iter().position(|q| *q > id).unwrap_or(queue.len());
                queue.insert(pos, id);
            }
        }

        if order.len() == in_degree.len() {
            Some(order)
        } else {
            None
        }
    }

    /// Derived traversal order over enabled units.
    pub fn traversal(&self) -> Vec<UnitId> {
        // Connections never cycle, so any subset sorts
        self.sorted_ids(|u| u.enabled).unwrap_or_default()
    }

    /// Checks that every enabled unit sits on a path from an Input to an
    /// Output unit.
    pub fn validate(&self) -> Result<(), ModelError> {
        let enabled: Vec<&ModelUnit> = self
            .nodes
            .iter()
            .map(|n| &n.unit)
            .filter(|u| u.enabled)
            .collect();

        let mut from_input: HashMap<UnitId, bool> = enabled
            .iter()
            .map(|u| (u.id, u.kind == UnitKind::Input))
            .collect();
        let mut to_output: HashMap<UnitId, bool> = enabled
            .iter()
            .map(|u| (u.id, u.kind == UnitKind::Output))
            .collect();

        let order = self.traversal();
        // Forward pass: reachable from an input
        for &id in &order {
            if from_input.get(&id).copied().unwrap_or(false) {
                for c in &self.connections {
                    if c.from == id {
                        if let Some(flag) = from_input.get_mut(&c.to) {
                            *flag = true;
                        }
                    }
                }
            }
        }
        // Backward pass: can reach an output
        for &id in order.iter().rev() {
            if to_output.get(&id).copied().unwrap_or(false) {
                for c in &self.connections {
                    if c.to == id {
                        if let Some(flag) = to_output.get_mut(&c.from) {
                            *flag = true;
                        }
                    }
                }
            }
        }

        for &id in &order {
            let on_path = from_input.get(&id).copied().unwrap_or(false)
                && to_output.get(&id).copied().unwrap_or(false);
            if !on_path {
                return Err(ModelError::UnreachableUnit(id));
            }
        }
        Ok(())
    }

    /// Freezes the graph into an engine build plan. All units are included
    /// (disabled ones are built bypassed) in topological order, with edges
    /// rewritten as forward stage indices.
    pub fn build_plan(&self) -> Result<BuildPlan, ModelError> {
        let order = self.sorted_ids(|_| true).ok_or(ModelError::CycleDetected)?;
        let index_of: HashMap<UnitId, usize> =
            order.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        let units = order
            .iter()
            .map(|id| {
                let unit = self.unit(*id).ok_or(ModelError::UnknownUnit(*id))?;
                Ok(PlannedUnit {
                    id: unit.id,
                    kind: unit.kind,
                    enabled: unit.enabled,
                    values: unit.values(),
                })
            })
            .collect::<Result<Vec<_>, ModelError>>()?;

        let mut edges: Vec<(usize, usize)> = self
            .connections
            .iter()
            .map(|c| (index_of[&c.from], index_of[&c.to]))
            .collect();
        edges.sort_unstable();

        Ok(BuildPlan { units, edges })
    }
}
