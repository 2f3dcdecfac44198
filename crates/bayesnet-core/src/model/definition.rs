//! JSON model definitions.
//!
//! ```json
//! {
//!   "name": "chain",
//!   "variables": [{"name": "A", "cardinality": 2, "states": ["no", "yes"]}],
//!   "edges": [{"parent": "A", "child": "B"}],
//!   "cpds": [{"variable": "B", "parents": ["A"], "layout": "state_major",
//!             "table": [0.8, 0.2, 0.2, 0.8]}]
//! }
//! ```
//!
//! A definition is plain data. [`ModelDefinition::build`] feeds it through a
//! [`NetworkBuilder`], so every check the validator makes applies to files as
//! well; nothing is normalized or repaired on the way in.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::errors::ModelError;
use crate::engine::network::{Network, NetworkBuilder, TableLayout, DEFAULT_CPD_TOLERANCE};
use crate::engine::variable::Variable;

/// Errors from loading a model definition.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// The file could not be read.
    #[error("failed to read model file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The JSON does not match the definition schema.
    #[error("failed to parse model definition: {0}")]
    Parse(#[from] serde_json::Error),

    /// The definition parsed but does not describe a valid network.
    #[error("invalid model: {0}")]
    Model(#[from] ModelError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDef {
    pub name: String,
    /// May be omitted when `states` is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cardinality: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub states: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDef {
    pub parent: String,
    pub child: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpdDef {
    pub variable: String,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub layout: TableLayout,
    pub table: Vec<f64>,
}

/// Serializable description of a network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub variables: Vec<VariableDef>,
    #[serde(default)]
    pub edges: Vec<EdgeDef>,
    pub cpds: Vec<CpdDef>,
    /// Normalization tolerance for CPD columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<f64>,
}

impl ModelDefinition {
    pub fn from_json_str(source: &str) -> Result<Self, DefinitionError> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DefinitionError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| DefinitionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&source)
    }

    pub fn to_json_string(&self) -> Result<String, DefinitionError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Describes an existing network; tables come out in state-major layout.
    pub fn from_network(network: &Network) -> Self {
        let registry = network.variables();
        let variables = registry
            .iter()
            .map(|(_, var)| VariableDef {
                name: var.name().to_string(),
                cardinality: Some(var.cardinality()),
                states: if var.has_labels() {
                    var.state_labels()
                } else {
                    Vec::new()
                },
            })
            .collect();
        let edges = network
            .edges()
            .map(|(parent, child)| EdgeDef {
                parent: registry.name(parent),
                child: registry.name(child),
            })
            .collect();
        let cpds = network
            .cpds()
            .iter()
            .map(|cpd| CpdDef {
                variable: registry.name(cpd.variable()),
                parents: cpd.parents().iter().map(|&p| registry.name(p)).collect(),
                layout: TableLayout::StateMajor,
                table: cpd.factor().values().to_vec(),
            })
            .collect();
        Self {
            name: network.name().map(str::to_string),
            variables,
            edges,
            cpds,
            tolerance: None,
        }
    }

    /// Validates the definition into a frozen network.
    pub fn build(&self) -> Result<Network, ModelError> {
        let mut builder = NetworkBuilder::new()
            .with_tolerance(self.tolerance.unwrap_or(DEFAULT_CPD_TOLERANCE));
        if let Some(name) = &self.name {
            builder = builder.with_name(name.clone());
        }
        for def in &self.variables {
            builder.add_variable(def.to_variable()?)?;
        }
        for edge in &self.edges {
            builder.add_edge(&edge.parent, &edge.child)?;
        }
        for cpd in &self.cpds {
            builder.add_cpd_with_layout(&cpd.variable, &cpd.parents, cpd.table.clone(), cpd.layout)?;
        }
        builder.build()
    }
}

impl VariableDef {
    fn to_variable(&self) -> Result<Variable, ModelError> {
        match (self.cardinality, self.states.is_empty()) {
            (None, true) => Err(ModelError::InvalidCardinality(self.name.clone())),
            (Some(card), true) => Variable::new(self.name.as_str(), card),
            (Some(card), false) if card != self.states.len() => Err(ModelError::InvalidStateLabels {
                variable: self.name.clone(),
                reason: format!(
                    "{} state labels given for cardinality {}",
                    self.states.len(),
                    card
                ),
            }),
            (_, false) => Variable::with_states(self.name.as_str(), self.states.iter().map(String::as_str)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAIN: &str = r#"{
        "name": "chain",
        "variables": [
            {"name": "A", "cardinality": 2, "states": ["no", "yes"]},
            {"name": "B", "states": ["no", "yes"]},
            {"name": "C", "cardinality": 2}
        ],
        "edges": [{"parent": "A", "child": "B"}, {"parent": "B", "child": "C"}],
        "cpds": [
            {"variable": "A", "table": [0.5, 0.5]},
            {"variable": "B", "parents": ["A"], "table": [0.8, 0.2, 0.2, 0.8]},
            {"variable": "C", "parents": ["B"], "layout": "parent_major", "table": [0.9, 0.1, 0.1, 0.9]}
        ]
    }"#;

    #[test]
    fn builds_network_from_json() {
        let net = ModelDefinition::from_json_str(CHAIN).unwrap().build().unwrap();
        assert_eq!(net.name(), Some("chain"));
        assert_eq!(net.len(), 3);
        let b = net.variable_by_name("B").unwrap();
        assert_eq!(b.cardinality(), 2);
        let c = net.cpd(net.id("C").unwrap()).unwrap();
        // P(C=1 | B=0)
        assert_eq!(c.probability(1, &[0]), Some(0.1));
    }

    #[test]
    fn rejects_label_cardinality_mismatch() {
        let def = VariableDef {
            name: "X".into(),
            cardinality: Some(3),
            states: vec!["a".into(), "b".into()],
        };
        assert!(matches!(
            def.to_variable(),
            Err(ModelError::InvalidStateLabels { .. })
        ));
    }

    #[test]
    fn reports_parse_and_io_errors() {
        assert!(matches!(
            ModelDefinition::from_json_str("{\"variables\": 3}"),
            Err(DefinitionError::Parse(_))
        ));
        let err = ModelDefinition::from_path("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, DefinitionError::Io { .. }));
        assert!(err.to_string().contains("not/here.json"));
    }

    #[test]
    fn network_definition_rebuilds_identically() {
        let net = ModelDefinition::from_json_str(CHAIN).unwrap().build().unwrap();
        let def = ModelDefinition::from_network(&net);
        assert!(def.cpds.iter().all(|c| c.layout == TableLayout::StateMajor));
        let json = def.to_json_string().unwrap();
        let rebuilt = ModelDefinition::from_json_str(&json).unwrap().build().unwrap();
        assert_eq!(rebuilt.cpds(), net.cpds());
    }
}
