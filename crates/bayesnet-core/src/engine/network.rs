//! # Bayesian network
//!
//! A [`NetworkBuilder`] collects variables, edges, and CPD tables. Building
//! runs the validator exactly once and yields an immutable [`Network`]; no
//! method on `Network` mutates it, so one value can serve any number of
//! concurrent queries behind an `Arc`.
//!
//! ## Table layout
//!
//! A CPD's factor scope is `[variable, parents...]` in row-major order, which
//! puts the variable's state on the outer index and lets the last parent vary
//! fastest. Callers may instead hand in tables in [`TableLayout::ParentMajor`]
//! order (one contiguous distribution per parent assignment); the validator
//! transposes them.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::engine::errors::ModelError;
use crate::engine::factor::Factor;
use crate::engine::validate;
use crate::engine::variable::{VarId, Variable, VariableRegistry};

/// Default tolerance when checking that CPD rows sum to one.
pub const DEFAULT_CPD_TOLERANCE: f64 = 1e-6;

/// Parent list of one variable.
pub type Parents = SmallVec<[VarId; 4]>;

/// Flat ordering convention of a CPD table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableLayout {
    /// Row-major over `[variable, parents...]`.
    #[default]
    StateMajor,
    /// Row-major over `[parents..., variable]`.
    ParentMajor,
}

/// Conditional probability table `P(variable | parents)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Cpd {
    variable: VarId,
    parents: Parents,
    factor: Factor,
}

impl Cpd {
    pub(crate) fn new(variable: VarId, parents: Parents, factor: Factor) -> Self {
        Self {
            variable,
            parents,
            factor,
        }
    }

    pub fn variable(&self) -> VarId {
        self.variable
    }

    pub fn parents(&self) -> &[VarId] {
        &self.parents
    }

    /// The table as a factor over `[variable, parents...]`.
    pub fn factor(&self) -> &Factor {
        &self.factor
    }

    /// `P(variable = state | parents = parent_states)`.
    pub fn probability(&self, state: usize, parent_states: &[usize]) -> Option<f64> {
        let mut assignment: SmallVec<[usize; 8]> = SmallVec::with_capacity(parent_states.len() + 1);
        assignment.push(state);
        assignment.extend_from_slice(parent_states);
        self.factor.value(&assignment)
    }
}

/// Raw CPD as handed to the builder, checked at build time.
#[derive(Debug, Clone)]
pub(crate) struct CpdDraft {
    pub(crate) parents: Vec<VarId>,
    pub(crate) table: Vec<f64>,
    pub(crate) layout: TableLayout,
}

/// Accumulates a network definition; consumed by [`NetworkBuilder::build`].
#[derive(Debug, Clone)]
pub struct NetworkBuilder {
    pub(crate) name: Option<String>,
    pub(crate) registry: VariableRegistry,
    pub(crate) edges: Vec<(VarId, VarId)>,
    pub(crate) cpds: FxHashMap<VarId, CpdDraft>,
    pub(crate) tolerance: f64,
}

impl Default for NetworkBuilder {
    fn default() -> Self {
        Self {
            name: None,
            registry: VariableRegistry::new(),
            edges: Vec::new(),
            cpds: FxHashMap::default(),
            tolerance: DEFAULT_CPD_TOLERANCE,
        }
    }
}

impl NetworkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Tolerance for the per-parent-assignment normalization check.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn add_variable(&mut self, variable: Variable) -> Result<VarId, ModelError> {
        self.registry.insert(variable)
    }

    /// Adds a directed edge `parent -> child`. Repeating an edge is a no-op.
    pub fn add_edge(&mut self, parent: &str, child: &str) -> Result<(), ModelError> {
        let parent = self.lookup(parent)?;
        let child = self.lookup(child)?;
        if !self.edges.contains(&(parent, child)) {
            self.edges.push((parent, child));
        }
        Ok(())
    }

    /// Attaches a CPD given in [`TableLayout::StateMajor`] order.
    pub fn add_cpd<S: AsRef<str>>(
        &mut self,
        variable: &str,
        parents: &[S],
        table: Vec<f64>,
    ) -> Result<(), ModelError> {
        self.add_cpd_with_layout(variable, parents, table, TableLayout::StateMajor)
    }

    /// Attaches a CPD with an explicit table layout.
    ///
    /// Only names are resolved here; scope, size, and normalization are
    /// checked by [`NetworkBuilder::build`].
    pub fn add_cpd_with_layout<S: AsRef<str>>(
        &mut self,
        variable: &str,
        parents: &[S],
        table: Vec<f64>,
        layout: TableLayout,
    ) -> Result<(), ModelError> {
        let var = self.lookup(variable)?;
        if self.cpds.contains_key(&var) {
            return Err(ModelError::DuplicateCpd(variable.to_string()));
        }
        let parents = parents
            .iter()
            .map(|p| self.lookup(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        self.cpds.insert(
            var,
            CpdDraft {
                parents,
                table,
                layout,
            },
        );
        Ok(())
    }

    /// Validates the definition and freezes it.
    pub fn build(self) -> Result<Network, ModelError> {
        validate::validate_network(self)
    }

    fn lookup(&self, name: &str) -> Result<VarId, ModelError> {
        self.registry
            .id(name)
            .ok_or_else(|| ModelError::UnknownVariable(name.to_string()))
    }
}

/// A validated, immutable discrete Bayesian network.
#[derive(Debug, Clone)]
pub struct Network {
    name: Option<Arc<str>>,
    registry: VariableRegistry,
    parents: Vec<Parents>,
    children: Vec<Parents>,
    cpds: Vec<Cpd>,
    topological_order: Vec<VarId>,
    topological_rank: Vec<usize>,
}

impl Network {
    /// Assembles a network from parts the validator has already checked.
    pub(crate) fn from_validated(
        name: Option<String>,
        registry: VariableRegistry,
        cpds: Vec<Cpd>,
        topological_order: Vec<VarId>,
    ) -> Self {
        let n = registry.len();
        let parents: Vec<Parents> = cpds.iter().map(|cpd| cpd.parents.clone()).collect();
        let mut children: Vec<Parents> = vec![Parents::new(); n];
        for (child, ps) in parents.iter().enumerate() {
            for parent in ps {
                children[parent.index()].push(VarId(child as u32));
            }
        }
        let mut topological_rank = vec![0; n];
        for (rank, var) in topological_order.iter().enumerate() {
            topological_rank[var.index()] = rank;
        }
        Self {
            name: name.map(Arc::from),
            registry,
            parents,
            children,
            cpds,
            topological_order,
            topological_rank,
        }
    }

    pub fn builder() -> NetworkBuilder {
        NetworkBuilder::new()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn variables(&self) -> &VariableRegistry {
        &self.registry
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn id(&self, name: &str) -> Option<VarId> {
        self.registry.id(name)
    }

    pub fn variable(&self, id: VarId) -> Option<&Variable> {
        self.registry.get(id)
    }

    pub fn variable_by_name(&self, name: &str) -> Option<&Variable> {
        self.id(name).and_then(|id| self.registry.get(id))
    }

    /// Parents of `id`, in the CPD's declared order.
    pub fn parents(&self, id: VarId) -> &[VarId] {
        self.parents.get(id.index()).map_or(&[][..], |p| p.as_slice())
    }

    pub fn children(&self, id: VarId) -> &[VarId] {
        self.children.get(id.index()).map_or(&[][..], |c| c.as_slice())
    }

    pub fn cpd(&self, id: VarId) -> Option<&Cpd> {
        self.cpds.get(id.index())
    }

    /// CPDs indexed by variable id.
    pub fn cpds(&self) -> &[Cpd] {
        &self.cpds
    }

    /// All `(parent, child)` edges, grouped by child.
    pub fn edges(&self) -> impl Iterator<Item = (VarId, VarId)> + '_ {
        self.parents.iter().enumerate().flat_map(|(child, ps)| {
            ps.iter().map(move |&parent| (parent, VarId(child as u32)))
        })
    }

    /// Deterministic topological order computed at validation.
    pub fn topological_order(&self) -> &[VarId] {
        &self.topological_order
    }

    pub fn topological_rank(&self, id: VarId) -> usize {
        self.topological_rank
            .get(id.index())
            .copied()
            .unwrap_or(usize::MAX)
    }

    /// `seeds` plus all their ancestors, in topological order.
    pub fn ancestral_closure(&self, seeds: impl IntoIterator<Item = VarId>) -> Vec<VarId> {
        let mut marked = vec![false; self.len()];
        let mut stack: Vec<VarId> = seeds.into_iter().collect();
        while let Some(var) = stack.pop() {
            match marked.get_mut(var.index()) {
                Some(seen) if !*seen => {
                    *seen = true;
                    stack.extend_from_slice(self.parents(var));
                }
                _ => {}
            }
        }
        self.topological_order
            .iter()
            .copied()
            .filter(|v| marked[v.index()])
            .collect()
    }

    /// Joint probability of a full assignment, indexed by variable id.
    pub fn joint_probability(&self, assignment: &[usize]) -> Option<f64> {
        if assignment.len() != self.len() {
            return None;
        }
        let mut p = 1.0;
        for cpd in &self.cpds {
            let parent_states: SmallVec<[usize; 8]> =
                cpd.parents.iter().map(|v| assignment[v.index()]).collect();
            p *= cpd.probability(assignment[cpd.variable.index()], &parent_states)?;
        }
        Some(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Network {
        let mut builder = Network::builder().with_name("chain");
        for name in ["A", "B", "C"] {
            builder.add_variable(Variable::new(name, 2).unwrap()).unwrap();
        }
        builder.add_edge("A", "B").unwrap();
        builder.add_edge("B", "C").unwrap();
        builder.add_cpd::<&str>("A", &[], vec![0.5, 0.5]).unwrap();
        builder
            .add_cpd("B", &["A"], vec![0.8, 0.2, 0.2, 0.8])
            .unwrap();
        builder
            .add_cpd("C", &["B"], vec![0.9, 0.1, 0.1, 0.9])
            .unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn network_is_send_and_sync() {
        fn assert_shareable<T: Send + Sync>() {}
        assert_shareable::<Network>();
    }

    #[test]
    fn exposes_structure() {
        let net = chain();
        let (a, b, c) = (VarId(0), VarId(1), VarId(2));
        assert_eq!(net.name(), Some("chain"));
        assert_eq!(net.parents(b), &[a]);
        assert_eq!(net.children(b), &[c]);
        assert_eq!(net.topological_order(), &[a, b, c]);
        assert_eq!(net.edges().collect::<Vec<_>>(), vec![(a, b), (b, c)]);
        assert_eq!(net.cpd(b).unwrap().probability(1, &[0]), Some(0.2));
    }

    #[test]
    fn ancestral_closure_follows_parents() {
        let net = chain();
        assert_eq!(net.ancestral_closure([VarId(1)]), vec![VarId(0), VarId(1)]);
        assert_eq!(net.ancestral_closure([VarId(0)]), vec![VarId(0)]);
    }

    #[test]
    fn joint_probability_multiplies_cpds() {
        let net = chain();
        let p = net.joint_probability(&[1, 1, 0]).unwrap();
        assert!((p - 0.5 * 0.8 * 0.1).abs() < 1e-12);
        assert_eq!(net.joint_probability(&[1, 1]), None);
    }

    #[test]
    fn builder_rejects_unknown_names_and_duplicate_cpds() {
        let mut builder = NetworkBuilder::new();
        builder.add_variable(Variable::new("A", 2).unwrap()).unwrap();
        assert_eq!(
            builder.add_edge("A", "Z"),
            Err(ModelError::UnknownVariable("Z".into()))
        );
        builder.add_cpd::<&str>("A", &[], vec![0.5, 0.5]).unwrap();
        assert_eq!(
            builder.add_cpd::<&str>("A", &[], vec![0.5, 0.5]),
            Err(ModelError::DuplicateCpd("A".into()))
        );
    }
}
