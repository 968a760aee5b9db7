//! Flattened launch graph ready to hand to the supervisor

use crate::config::LaunchSpec;
use indexmap::IndexMap;

/// A unit after substitution, namespacing and overlay application
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedUnit {
    pub spec: LaunchSpec,
    /// Effective environment: graph env of every enclosing graph, then unit env
    pub env: IndexMap<String, String>,
    /// Identity of the graph that declared this unit
    pub origin: String,
}

impl ResolvedUnit {
    /// Unique key of the unit within its resolved graph
    pub fn key(&self) -> String {
        self.spec.qualified_name()
    }
}

/// Ordered, include-free list of units
#[derive(Debug, Clone, Default)]
pub struct ResolvedGraph {
    pub(crate) units: Vec<ResolvedUnit>,
    /// Root argument values after command-line overrides
    pub(crate) args: IndexMap<String, String>,
    /// Every graph loaded while resolving, in load order
    pub(crate) sources: Vec<String>,
}

impl ResolvedGraph {
    /// Build a graph directly from units, e.g. for embedding without a loader
    pub fn from_units(units: Vec<ResolvedUnit>) -> Self {
        Self {
            units,
            ..Default::default()
        }
    }

    /// Units in launch order
    pub fn units(&self) -> &[ResolvedUnit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Look up a unit by its `namespace/name` key
    pub fn get(&self, key: &str) -> Option<&ResolvedUnit> {
        self.units.iter().find(|u| u.key() == key)
    }

    /// Unit keys in launch order
    pub fn names(&self) -> Vec<String> {
        self.units.iter().map(ResolvedUnit::key).collect()
    }

    /// Root graph arguments after command-line overrides
    pub fn args(&self) -> &IndexMap<String, String> {
        &self.args
    }

    /// Every graph loaded while resolving, root first
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Order in which the supervisor starts units (declaration order)
    pub fn launch_order(&self) -> impl Iterator<Item = &ResolvedUnit> {
        self.units.iter()
    }
}
