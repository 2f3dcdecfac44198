//! Query results.

use serde::Serialize;

use crate::engine::factor::Factor;
use crate::engine::network::Network;

/// One variable of a posterior's scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PosteriorVariable {
    pub name: String,
    pub cardinality: usize,
    pub states: Vec<String>,
}

/// Normalized joint distribution over the query variables.
///
/// `values` is row-major over `variables` in the order the query named them:
/// the last variable varies fastest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Posterior {
    variables: Vec<PosteriorVariable>,
    values: Vec<f64>,
}

/// Most probable joint assignment of the query variables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapAssignment {
    /// `(variable, state label)` pairs in query order.
    pub assignment: Vec<(String, String)>,
    /// State indices in query order.
    pub states: Vec<usize>,
    pub probability: f64,
}

impl Posterior {
    /// Wraps a normalized factor whose scope is already in query order.
    pub(crate) fn from_factor(network: &Network, factor: Factor) -> Self {
        let variables = factor
            .scope()
            .iter()
            .map(|&id| {
                let var = network.variable(id);
                PosteriorVariable {
                    name: network.variables().name(id),
                    cardinality: var.map_or(0, |v| v.cardinality()),
                    states: var.map(|v| v.state_labels()).unwrap_or_default(),
                }
            })
            .collect();
        Self {
            variables,
            values: factor.into_values(),
        }
    }

    pub fn variables(&self) -> &[PosteriorVariable] {
        &self.variables
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Joint state indices of a flat index.
    pub fn assignment(&self, index: usize) -> Option<Vec<usize>> {
        if index >= self.values.len() {
            return None;
        }
        let mut states = vec![0; self.variables.len()];
        let mut rest = index;
        for (slot, var) in self.variables.iter().enumerate().rev() {
            states[slot] = rest % var.cardinality;
            rest /= var.cardinality;
        }
        Some(states)
    }

    /// Probability of a joint assignment given as state indices.
    pub fn probability(&self, states: &[usize]) -> Option<f64> {
        if states.len() != self.variables.len() {
            return None;
        }
        let mut index = 0;
        for (var, &state) in self.variables.iter().zip(states) {
            if state >= var.cardinality {
                return None;
            }
            index = index * var.cardinality + state;
        }
        self.values.get(index).copied()
    }

    /// Probability of a joint assignment given as state labels.
    pub fn probability_of(&self, labels: &[&str]) -> Option<f64> {
        if labels.len() != self.variables.len() {
            return None;
        }
        let states: Option<Vec<usize>> = self
            .variables
            .iter()
            .zip(labels)
            .map(|(var, label)| var.states.iter().position(|s| s == label))
            .collect();
        self.probability(&states?)
    }

    /// Display label of a flat index: the state label for a single variable,
    /// `A=x, B=y` for a joint.
    pub fn label(&self, index: usize) -> Option<String> {
        let states = self.assignment(index)?;
        if let [only] = self.variables.as_slice() {
            return only.states.get(states[0]).cloned();
        }
        let parts: Vec<String> = self
            .variables
            .iter()
            .zip(&states)
            .map(|(var, &s)| format!("{}={}", var.name, var.states[s]))
            .collect();
        Some(parts.join(", "))
    }

    /// `(label, probability)` for every joint state, in table order.
    pub fn entries(&self) -> Vec<(String, f64)> {
        (0..self.values.len())
            .filter_map(|idx| self.label(idx).map(|label| (label, self.values[idx])))
            .collect()
    }

    /// Marginal of one of the posterior's variables.
    pub fn marginal(&self, name: &str) -> Option<Vec<f64>> {
        let slot = self.variables.iter().position(|v| v.name == name)?;
        let mut out = vec![0.0; self.variables[slot].cardinality];
        for (idx, &p) in self.values.iter().enumerate() {
            let states = self.assignment(idx)?;
            out[states[slot]] += p;
        }
        Some(out)
    }

    /// Most probable joint state; the lowest index wins ties.
    pub fn mode(&self) -> Option<MapAssignment> {
        let (index, &probability) = self
            .values
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, &f64)>, (idx, p)| match best {
                Some((_, bp)) if bp >= p => best,
                _ => Some((idx, p)),
            })?;
        let states = self.assignment(index)?;
        let assignment = self
            .variables
            .iter()
            .zip(&states)
            .map(|(var, &s)| (var.name.clone(), var.states[s].clone()))
            .collect();
        Some(MapAssignment {
            assignment,
            states,
            probability,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joint() -> Posterior {
        Posterior {
            variables: vec![
                PosteriorVariable {
                    name: "A".into(),
                    cardinality: 2,
                    states: vec!["no".into(), "yes".into()],
                },
                PosteriorVariable {
                    name: "B".into(),
                    cardinality: 3,
                    states: vec!["0".into(), "1".into(), "2".into()],
                },
            ],
            values: vec![0.1, 0.05, 0.15, 0.3, 0.25, 0.15],
        }
    }

    #[test]
    fn addresses_entries_row_major() {
        let p = joint();
        assert_eq!(p.probability(&[1, 0]), Some(0.3));
        assert_eq!(p.probability(&[0, 3]), None);
        assert_eq!(p.probability_of(&["yes", "2"]), Some(0.15));
        assert_eq!(p.assignment(4), Some(vec![1, 1]));
        assert_eq!(p.label(4).as_deref(), Some("A=yes, B=1"));
    }

    #[test]
    fn marginal_sums_other_variables() {
        let p = joint();
        let a = p.marginal("A").unwrap();
        assert!((a[0] - 0.3).abs() < 1e-12);
        assert!((a[1] - 0.7).abs() < 1e-12);
        assert!(p.marginal("C").is_none());
    }

    #[test]
    fn mode_prefers_first_maximum() {
        let mut p = joint();
        let map = p.mode().unwrap();
        assert_eq!(map.states, vec![1, 0]);
        assert_eq!(
            map.assignment,
            vec![("A".to_string(), "yes".to_string()), ("B".to_string(), "0".to_string())]
        );
        p.values = vec![0.3, 0.05, 0.15, 0.3, 0.1, 0.1];
        assert_eq!(p.mode().unwrap().states, vec![0, 0]);
    }
}
