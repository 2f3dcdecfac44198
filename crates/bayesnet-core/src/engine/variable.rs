//! Discrete random variables and the registry that names them.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::engine::errors::ModelError;

/// Identifier of a variable inside one network.
///
/// Ids are dense: the n-th declared variable gets `VarId(n)`. Implements `Ord`
/// for deterministic iteration.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct VarId(pub u32);

impl VarId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A discrete random variable: unique name, number of states, optional labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    name: Arc<str>,
    cardinality: usize,
    states: Option<Vec<Arc<str>>>,
}

impl Variable {
    /// Creates a variable with anonymous states `0..cardinality`.
    pub fn new(name: impl Into<Arc<str>>, cardinality: usize) -> Result<Self, ModelError> {
        let name = name.into();
        if cardinality == 0 {
            return Err(ModelError::InvalidCardinality(name.to_string()));
        }
        Ok(Self {
            name,
            cardinality,
            states: None,
        })
    }

    /// Creates a variable whose cardinality is the number of labels.
    pub fn with_states<S: Into<Arc<str>>>(
        name: impl Into<Arc<str>>,
        states: impl IntoIterator<Item = S>,
    ) -> Result<Self, ModelError> {
        let name = name.into();
        let states: Vec<Arc<str>> = states.into_iter().map(Into::into).collect();
        if states.is_empty() {
            return Err(ModelError::InvalidCardinality(name.to_string()));
        }
        for (idx, label) in states.iter().enumerate() {
            if states[..idx].contains(label) {
                return Err(ModelError::InvalidStateLabels {
                    variable: name.to_string(),
                    reason: format!("state label '{}' is repeated", label),
                });
            }
        }
        Ok(Self {
            name,
            cardinality: states.len(),
            states: Some(states),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cardinality(&self) -> usize {
        self.cardinality
    }

    pub fn has_labels(&self) -> bool {
        self.states.is_some()
    }

    /// Display label of a state; the decimal index when no labels were given.
    pub fn state_label(&self, state: usize) -> Option<String> {
        if state >= self.cardinality {
            return None;
        }
        Some(match &self.states {
            Some(labels) => labels[state].to_string(),
            None => state.to_string(),
        })
    }

    /// Resolves a label (or a decimal index) to a state index.
    pub fn state_index(&self, label: &str) -> Option<usize> {
        if let Some(labels) = &self.states {
            if let Some(idx) = labels.iter().position(|l| &**l == label) {
                return Some(idx);
            }
        }
        label
            .parse::<usize>()
            .ok()
            .filter(|&idx| idx < self.cardinality)
    }

    /// All display labels, in state order.
    pub fn state_labels(&self) -> Vec<String> {
        (0..self.cardinality)
            .filter_map(|s| self.state_label(s))
            .collect()
    }
}

/// Ordered collection of variables with O(1) lookup by name.
#[derive(Debug, Clone, Default)]
pub struct VariableRegistry {
    variables: Vec<Variable>,
    by_name: FxHashMap<Arc<str>, VarId>,
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a variable, rejecting duplicate names.
    pub fn insert(&mut self, variable: Variable) -> Result<VarId, ModelError> {
        if self.by_name.contains_key(variable.name()) {
            return Err(ModelError::DuplicateVariable(variable.name().to_string()));
        }
        let id = VarId(self.variables.len() as u32);
        self.by_name.insert(variable.name.clone(), id);
        self.variables.push(variable);
        Ok(id)
    }

    pub fn id(&self, name: &str) -> Option<VarId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: VarId) -> Option<&Variable> {
        self.variables.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Variables in declaration order, paired with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (VarId, &Variable)> {
        self.variables
            .iter()
            .enumerate()
            .map(|(idx, var)| (VarId(idx as u32), var))
    }

    pub fn ids(&self) -> impl Iterator<Item = VarId> {
        (0..self.variables.len() as u32).map(VarId)
    }

    /// Name of a registered variable.
    ///
    /// Ids come from this registry, so an unknown id renders as `#<n>` rather
    /// than failing.
    pub fn name(&self, id: VarId) -> String {
        self.get(id)
            .map(|v| v.name().to_string())
            .unwrap_or_else(|| format!("#{}", id.0))
    }

    pub fn cardinality(&self, id: VarId) -> Option<usize> {
        self.get(id).map(Variable::cardinality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_states_use_decimal_labels() {
        let var = Variable::new("A", 3).unwrap();
        assert_eq!(var.state_label(2).as_deref(), Some("2"));
        assert_eq!(var.state_label(3), None);
        assert_eq!(var.state_index("1"), Some(1));
        assert_eq!(var.state_index("3"), None);
    }

    #[test]
    fn labelled_states_resolve_both_ways() {
        let var = Variable::with_states("Weather", ["sun", "rain"]).unwrap();
        assert_eq!(var.cardinality(), 2);
        assert_eq!(var.state_index("rain"), Some(1));
        assert_eq!(var.state_index("0"), Some(0));
        assert_eq!(var.state_labels(), vec!["sun", "rain"]);
    }

    #[test]
    fn rejects_zero_cardinality_and_repeated_labels() {
        assert!(matches!(
            Variable::new("A", 0),
            Err(ModelError::InvalidCardinality(_))
        ));
        assert!(matches!(
            Variable::with_states("A", ["x", "x"]),
            Err(ModelError::InvalidStateLabels { .. })
        ));
    }

    #[test]
    fn registry_assigns_dense_ids_and_rejects_duplicates() {
        let mut registry = VariableRegistry::new();
        let a = registry.insert(Variable::new("A", 2).unwrap()).unwrap();
        let b = registry.insert(Variable::new("B", 3).unwrap()).unwrap();
        assert_eq!((a, b), (VarId(0), VarId(1)));
        assert_eq!(registry.id("B"), Some(b));
        assert_eq!(registry.cardinality(b), Some(3));
        assert!(matches!(
            registry.insert(Variable::new("A", 2).unwrap()),
            Err(ModelError::DuplicateVariable(name)) if name == "A"
        ));
    }
}
