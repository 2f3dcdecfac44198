//! Observations fixed before a query.
//!
//! Evidence is keyed by variable name so it can be assembled without a
//! network at hand; it is resolved (names to ids, labels to state indices,
//! range checks) when a query runs.

use std::collections::BTreeMap;
use std::fmt;

use rustc_hash::FxHashMap;

use crate::engine::errors::QueryError;
use crate::engine::network::Network;
use crate::engine::variable::VarId;

/// An observed state, by index or by label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateRef {
    Index(usize),
    /// A state label; decimal strings also resolve as indices when the
    /// variable has no label of that name.
    Label(String),
}

impl From<usize> for StateRef {
    fn from(index: usize) -> Self {
        StateRef::Index(index)
    }
}

impl From<&str> for StateRef {
    fn from(label: &str) -> Self {
        StateRef::Label(label.to_string())
    }
}

impl From<String> for StateRef {
    fn from(label: String) -> Self {
        StateRef::Label(label)
    }
}

impl fmt::Display for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateRef::Index(idx) => write!(f, "{}", idx),
            StateRef::Label(label) => write!(f, "{}", label),
        }
    }
}

/// Mapping from variable names to observed states.
///
/// Observing a variable again replaces the earlier observation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evidence {
    observations: BTreeMap<String, StateRef>,
}

impl Evidence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`Evidence::insert`].
    pub fn observe(mut self, variable: impl Into<String>, state: impl Into<StateRef>) -> Self {
        self.insert(variable, state);
        self
    }

    pub fn insert(&mut self, variable: impl Into<String>, state: impl Into<StateRef>) {
        self.observations.insert(variable.into(), state.into());
    }

    pub fn remove(&mut self, variable: &str) -> Option<StateRef> {
        self.observations.remove(variable)
    }

    pub fn get(&self, variable: &str) -> Option<&StateRef> {
        self.observations.get(variable)
    }

    pub fn contains(&self, variable: &str) -> bool {
        self.observations.contains_key(variable)
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Observations sorted by variable name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &StateRef)> {
        self.observations.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Parses a `VAR=STATE` pair, as accepted on the command line.
    pub fn parse_pair(pair: &str) -> Option<(String, StateRef)> {
        let (var, state) = pair.split_once('=')?;
        let (var, state) = (var.trim(), state.trim());
        if var.is_empty() || state.is_empty() {
            return None;
        }
        Some((var.to_string(), StateRef::Label(state.to_string())))
    }

    /// Resolves names and states against `network`.
    pub fn resolve(&self, network: &Network) -> Result<FxHashMap<VarId, usize>, QueryError> {
        let mut resolved = FxHashMap::default();
        for (name, state) in &self.observations {
            let id = network
                .id(name)
                .ok_or_else(|| QueryError::UnknownVariable(name.clone()))?;
            let variable = network
                .variable(id)
                .ok_or_else(|| QueryError::Internal(format!("variable {} has no entry", name)))?;
            let index = match state {
                StateRef::Index(idx) if *idx < variable.cardinality() => *idx,
                StateRef::Index(idx) => {
                    return Err(QueryError::RejectedEvidence {
                        variable: name.clone(),
                        reason: format!(
                            "state {} is out of range (cardinality {})",
                            idx,
                            variable.cardinality()
                        ),
                    });
                }
                StateRef::Label(label) => variable.state_index(label).ok_or_else(|| {
                    QueryError::RejectedEvidence {
                        variable: name.clone(),
                        reason: format!(
                            "unknown state '{}' (expected one of: {})",
                            label,
                            variable.state_labels().join(", ")
                        ),
                    }
                })?,
            };
            resolved.insert(id, index);
        }
        Ok(resolved)
    }
}

impl<K, S> FromIterator<(K, S)> for Evidence
where
    K: Into<String>,
    S: Into<StateRef>,
{
    fn from_iter<I: IntoIterator<Item = (K, S)>>(iter: I) -> Self {
        let mut evidence = Evidence::new();
        for (var, state) in iter {
            evidence.insert(var, state);
        }
        evidence
    }
}
