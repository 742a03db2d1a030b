//! Preset serialization for save/load functionality.
//!
//! A preset captures everything needed to recreate a signal path: the units
//! with their kinds, enabled flags, parameter values, optional canvas
//! positions, and the connections between them. Connections reference units
//! by their index in the unit list, so presets carry no runtime ids and
//! loading always mints fresh ones.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dsp::{UnitKind, UnitRegistry};
use crate::model::{ChainModel, GraphModel, ModelError, ModelUnit};

/// Current preset format version.
/// Increment this when making breaking changes to the format.
pub const PRESET_VERSION: u32 = 1;

/// A complete signal-path preset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preset {
    /// Human-readable name for the preset.
    pub name: String,
    /// Free-form grouping label ("Clean", "High Gain", ...).
    #[serde(default)]
    pub category: String,
    /// Preset format version for future compatibility.
    pub version: u32,
    /// Loudness the author mixed this preset at, if recorded.
    #[serde(default)]
    pub target_loudness: Option<f32>,
    /// Units in chain order (chains) or any stable order (graphs).
    pub units: Vec<UnitConfig>,
    /// Connections by unit index. Empty for linear chains.
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
}

/// Serialized state of one unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitConfig {
    pub kind: UnitKind,
    pub enabled: bool,
    /// Canvas position, present only for graph presets.
    #[serde(default)]
    pub position: Option<(f32, f32)>,
    pub parameters: Vec<ParameterConfig>,
}

/// One named parameter value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterConfig {
    pub name: String,
    pub value: f32,
}

/// A connection between two units, by index into `Preset::units`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub from: usize,
    pub to: usize,
}

/// Error type for preset operations.
#[derive(Debug, Error)]
pub enum PresetError {
    #[error("file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("incompatible preset version: found {found}, expected <= {expected}")]
    IncompatibleVersion { found: u32, expected: u32 },
    #[error("unit {unit} ({kind}) has no parameter named '{name}'")]
    UnknownParameter {
        unit: usize,
        kind: UnitKind,
        name: String,
    },
    #[error("connection references unit index {0} which does not exist")]
    BadConnection(usize),
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl Preset {
    /// Check if this preset version is compatible with the current format.
    pub fn is_compatible(&self) -> bool {
        self.version <= PRESET_VERSION
    }

    fn unit_config(unit: &ModelUnit, position: Option<(f32, f32)>) -> UnitConfig {
        UnitConfig {
            kind: unit.kind,
            enabled: unit.enabled,
            position,
            parameters: unit
                .parameters()
                .iter()
                .map(|p| ParameterConfig {
                    name: p.name().to_string(),
                    value: p.value(),
                })
                .collect(),
        }
    }

    /// Captures a chain. Total: every chain state is representable.
    pub fn from_chain(
        chain: &ChainModel,
        name: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            version: PRESET_VERSION,
            target_loudness: None,
            units: chain
                .units()
                .iter()
                .map(|u| Self::unit_config(u, None))
                .collect(),
            connections: Vec::new(),
        }
    }

    /// Captures a graph, connections rewritten to unit indices.
    pub fn from_graph(
        graph: &GraphModel,
        name: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        let units: Vec<&ModelUnit> = graph.units().collect();
        let index_of = |id| units.iter().position(|u| u.id == id);

        Self {
            name: name.into(),
            category: category.into(),
            version: PRESET_VERSION,
            target_loudness: None,
            units: units
                .iter()
                .map(|u| Self::unit_config(u, graph.position(u.id)))
                .collect(),
            connections: graph
                .connections()
                .iter()
                .filter_map(|c| {
                    Some(ConnectionConfig {
                        from: index_of(c.from)?,
                        to: index_of(c.to)?,
                    })
                })
                .collect(),
        }
    }

    /// Rebuilds a chain from this preset. Unknown parameters fail the load;
    /// out-of-range values are clamped. Fresh unit ids are assigned.
    pub fn to_chain(&self, registry: &UnitRegistry) -> Result<ChainModel, PresetError> {
        let mut chain = ChainModel::new();
        for (index, config) in self.units.iter().enumerate() {
            let id = chain.add_unit(config.kind, registry)?;
            chain.set_enabled(id, config.enabled)?;
            for p in &config.parameters {
                chain.set_parameter(id, &p.name, p.value).map_err(|_| {
                    PresetError::UnknownParameter {
                        unit: index,
                        kind: config.kind,
                        name: p.name.clone(),
                    }
                })?;
            }
        }
        Ok(chain)
    }

    /// Rebuilds a graph from this preset. Connections are replayed in file
    /// order, so the result is deterministic.
    pub fn to_graph(&self, registry: &UnitRegistry) -> Result<GraphModel, PresetError> {
        let mut graph = GraphModel::new();
        let mut ids = Vec::with_capacity(self.units.len());
        for (index, config) in self.units.iter().enumerate() {
            let position = config.position.unwrap_or((0.0, 0.0));
            let id = graph.add_unit(config.kind, position, registry)?;
            graph.set_enabled(id, config.enabled)?;
            for p in &config.parameters {
                graph.set_parameter(id, &p.name, p.value).map_err(|_| {
                    PresetError::UnknownParameter {
                        unit: index,
                        kind: config.kind,
                        name: p.name.clone(),
                    }
                })?;
            }
            ids.push(id);
        }
        for c in &self.connections {
            let from = *ids.get(c.from).ok_or(PresetError::BadConnection(c.from))?;
            let to = *ids.get(c.to).ok_or(PresetError::BadConnection(c.to))?;
            graph.connect(from, to)?;
        }
        Ok(graph)
    }
}

/// Save a preset to a JSON file.
pub fn save_to_file(preset: &Preset, path: &Path) -> Result<(), PresetError> {
    let json = serde_json::to_string_pretty(preset)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Load a preset from a JSON file.
pub fn load_from_file(path: &Path) -> Result<Preset, PresetError> {
    let json = std::fs::read_to_string(path)?;
    let preset: Preset = serde_json::from_str(&json)?;

    if !preset.is_compatible() {
        return Err(PresetError::IncompatibleVersion {
            found: preset.version,
            expected: PRESET_VERSION,
        });
    }

    Ok(preset)
}
