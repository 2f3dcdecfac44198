//! # Variable elimination
//!
//! Exact posterior computation over a frozen [`Network`]. A query runs in
//! three phases:
//!
//! 1. **Restrict** every CPD against the evidence.
//! 2. **Eliminate** each hidden variable in order: multiply the factors that
//!    mention it, sum it out, put the result back. A variable no factor
//!    mentions is skipped.
//! 3. **Finalize**: multiply what is left, check that the scope is exactly the
//!    query set, permute to query order and normalize.
//!
//! Factors whose scope became empty stay in the working set until the end.
//! They carry the probability of the evidence, and dropping them would hide
//! zero-probability observations behind a seemingly valid posterior.
//!
//! The engine borrows the network and never mutates it, so any number of
//! engines may query the same network from different threads.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use crate::engine::config::InferenceConfig;
use crate::engine::errors::{FactorError, QueryError};
use crate::engine::evidence::Evidence;
use crate::engine::factor::Factor;
use crate::engine::network::Network;
use crate::engine::planner::{EliminationHeuristic, EliminationOrder, EliminationPlanner};
use crate::engine::posterior::{MapAssignment, Posterior};
use crate::engine::variable::VarId;

/// Per-query statistics, returned by [`VariableElimination::query_with_diagnostics`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryDiagnostics {
    /// Heuristic that planned the order; `None` for a caller-supplied order.
    pub heuristic: Option<EliminationHeuristic>,
    /// Number of factors produced by the restrict phase.
    pub restricted_factor_count: usize,
    /// Number of variables left out by barren-variable pruning.
    pub pruned_variable_count: usize,
    /// Elimination order that was executed, including skipped variables.
    pub order: Vec<String>,
    /// Variables actually summed out.
    pub eliminated: Vec<String>,
    /// Variables in the order that no factor mentioned.
    pub skipped: Vec<String>,
    /// Largest table built by a product, in entries.
    pub max_intermediate_size: usize,
    /// Unnormalized mass of the final factor: the probability of the evidence.
    pub evidence_probability: f64,
}

/// Exact inference engine bound to one network.
#[derive(Debug, Clone, Copy)]
pub struct VariableElimination<'a> {
    network: &'a Network,
    config: InferenceConfig,
}

/// Query and evidence after name resolution.
struct PreparedQuery {
    query: Vec<VarId>,
    observed: FxHashMap<VarId, usize>,
    /// Variables whose CPDs take part; `None` means all of them.
    relevant: Option<FxHashSet<VarId>>,
}

impl PreparedQuery {
    fn is_relevant(&self, var: VarId) -> bool {
        self.relevant.as_ref().map_or(true, |r| r.contains(&var))
    }
}

impl<'a> VariableElimination<'a> {
    /// Engine with [`InferenceConfig::default`].
    pub fn new(network: &'a Network) -> Self {
        Self {
            network,
            config: InferenceConfig::default(),
        }
    }

    pub fn with_config(network: &'a Network, config: InferenceConfig) -> Result<Self, QueryError> {
        Ok(Self {
            network,
            config: config.validate()?,
        })
    }

    pub fn network(&self) -> &'a Network {
        self.network
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Posterior over `query` given `evidence`, in the order `query` names
    /// the variables.
    pub fn query<S: AsRef<str>>(
        &self,
        query: &[S],
        evidence: &Evidence,
    ) -> Result<Posterior, QueryError> {
        self.query_with_diagnostics(query, evidence)
            .map(|(posterior, _)| posterior)
    }

    /// Like [`VariableElimination::query`], also reporting what the run did.
    pub fn query_with_diagnostics<S: AsRef<str>>(
        &self,
        query: &[S],
        evidence: &Evidence,
    ) -> Result<(Posterior, QueryDiagnostics), QueryError> {
        let prepared = self.prepare(query, evidence)?;
        let factors = self.restrict(&prepared)?;
        let hidden: Vec<VarId> = self
            .planner()
            .hidden_variables(&observed_ids(&prepared), &prepared.query)
            .into_iter()
            .filter(|&v| prepared.is_relevant(v))
            .collect();
        let order = self
            .planner()
            .plan_for_scopes(factors.iter().map(|f| f.scope()), &hidden);
        self.run(&prepared, factors, order, Some(self.config.heuristic))
    }

    /// Runs with a caller-supplied elimination order.
    ///
    /// `order` must name every hidden variable (neither queried nor observed)
    /// exactly once. With pruning enabled, pruned variables in the order are
    /// skipped.
    pub fn query_with_order<S: AsRef<str>, T: AsRef<str>>(
        &self,
        query: &[S],
        evidence: &Evidence,
        order: &[T],
    ) -> Result<Posterior, QueryError> {
        let prepared = self.prepare(query, evidence)?;
        let order = self.check_order(&prepared, order)?;
        let factors = self.restrict(&prepared)?;
        self.run(&prepared, factors, order, None)
            .map(|(posterior, _)| posterior)
    }

    /// The order [`VariableElimination::query`] would use, planned over the
    /// full hidden set.
    pub fn plan<S: AsRef<str>>(
        &self,
        query: &[S],
        evidence: &Evidence,
    ) -> Result<EliminationOrder, QueryError> {
        let prepared = self.prepare(query, evidence)?;
        Ok(self
            .planner()
            .plan(&observed_ids(&prepared), &prepared.query))
    }

    /// Most probable joint assignment of `query` given `evidence`.
    pub fn map_query<S: AsRef<str>>(
        &self,
        query: &[S],
        evidence: &Evidence,
    ) -> Result<MapAssignment, QueryError> {
        self.query(query, evidence)?
            .mode()
            .ok_or_else(|| QueryError::Internal("posterior has no entries".into()))
    }

    /// Separate single-variable posteriors for each of `variables`.
    pub fn marginals<S: AsRef<str>>(
        &self,
        variables: &[S],
        evidence: &Evidence,
    ) -> Result<Vec<Posterior>, QueryError> {
        variables
            .iter()
            .map(|var| self.query(std::slice::from_ref(var), evidence))
            .collect()
    }

    fn planner(&self) -> EliminationPlanner<'a> {
        EliminationPlanner::new(self.network, self.config.heuristic)
    }

    fn prepare<S: AsRef<str>>(
        &self,
        query: &[S],
        evidence: &Evidence,
    ) -> Result<PreparedQuery, QueryError> {
        if query.is_empty() {
            return Err(QueryError::RejectedQuery(
                "query must name at least one variable".into(),
            ));
        }
        let mut ids = Vec::with_capacity(query.len());
        for name in query {
            let name = name.as_ref();
            let id = self
                .network
                .id(name)
                .ok_or_else(|| QueryError::UnknownVariable(name.to_string()))?;
            if ids.contains(&id) {
                return Err(QueryError::RejectedQuery(format!(
                    "variable '{}' is queried more than once",
                    name
                )));
            }
            if evidence.contains(name) {
                return Err(QueryError::RejectedQuery(format!(
                    "variable '{}' is both queried and observed",
                    name
                )));
            }
            ids.push(id);
        }
        let observed = evidence.resolve(self.network)?;

        let relevant = if self.config.prune_barren {
            let seeds = ids.iter().chain(observed.keys()).copied();
            Some(self.network.ancestral_closure(seeds).into_iter().collect())
        } else {
            None
        };

        Ok(PreparedQuery {
            query: ids,
            observed,
            relevant,
        })
    }

    fn check_order<T: AsRef<str>>(
        &self,
        prepared: &PreparedQuery,
        order: &[T],
    ) -> Result<EliminationOrder, QueryError> {
        let mut ids = Vec::with_capacity(order.len());
        for name in order {
            let name = name.as_ref();
            let id = self
                .network
                .id(name)
                .ok_or_else(|| QueryError::UnknownVariable(name.to_string()))?;
            if prepared.query.contains(&id) || prepared.observed.contains_key(&id) {
                return Err(QueryError::RejectedOrder(format!(
                    "'{}' is queried or observed and cannot be eliminated",
                    name
                )));
            }
            if ids.contains(&id) {
                return Err(QueryError::RejectedOrder(format!(
                    "'{}' appears more than once",
                    name
                )));
            }
            ids.push(id);
        }
        let hidden = self
            .planner()
            .hidden_variables(&observed_ids(prepared), &prepared.query);
        let missing: Vec<String> = hidden
            .iter()
            .filter(|v| !ids.contains(v))
            .map(|&v| self.network.variables().name(v))
            .collect();
        if !missing.is_empty() {
            return Err(QueryError::RejectedOrder(format!(
                "missing hidden variables: {}",
                missing.join(", ")
            )));
        }
        Ok(EliminationOrder::new(ids))
    }

    /// Phase 1: CPDs of relevant variables, restricted to the evidence.
    fn restrict(&self, prepared: &PreparedQuery) -> Result<Vec<Factor>, QueryError> {
        let factors = self
            .network
            .cpds()
            .iter()
            .filter(|cpd| prepared.is_relevant(cpd.variable()))
            .map(|cpd| cpd.factor().restrict(&prepared.observed))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(factors)
    }

    /// Phases 2 and 3.
    fn run(
        &self,
        prepared: &PreparedQuery,
        mut factors: Vec<Factor>,
        order: EliminationOrder,
        heuristic: Option<EliminationHeuristic>,
    ) -> Result<(Posterior, QueryDiagnostics), QueryError> {
        let names = |vars: &[VarId]| -> Vec<String> {
            vars.iter().map(|&v| self.network.variables().name(v)).collect()
        };
        let mut diagnostics = QueryDiagnostics {
            heuristic,
            restricted_factor_count: factors.len(),
            pruned_variable_count: prepared
                .relevant
                .as_ref()
                .map_or(0, |r| self.network.len() - r.len()),
            order: order.names(self.network),
            eliminated: Vec::new(),
            skipped: Vec::new(),
            max_intermediate_size: 0,
            evidence_probability: 0.0,
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            query = ?names(&prepared.query),
            observed = prepared.observed.len(),
            factors = factors.len(),
            order = ?diagnostics.order,
            "running variable elimination"
        );

        let mut eliminated = Vec::new();
        let mut skipped = Vec::new();
        for var in order.iter() {
            if !prepared.is_relevant(var) {
                skipped.push(var);
                continue;
            }
            let (touching, rest): (Vec<Factor>, Vec<Factor>) =
                factors.into_iter().partition(|f| f.contains(var));
            factors = rest;
            if touching.is_empty() {
                skipped.push(var);
                continue;
            }
            let joined = product(touching)?;
            diagnostics.max_intermediate_size = diagnostics.max_intermediate_size.max(joined.len());
            let summed = joined.marginalize_out(var)?;

            #[cfg(feature = "tracing")]
            tracing::trace!(
                variable = %self.network.variables().name(var),
                joined = joined.len(),
                result = summed.len(),
                "eliminated variable"
            );

            factors.push(summed);
            eliminated.push(var);
        }

        let joint = product(factors)?;
        diagnostics.max_intermediate_size = diagnostics.max_intermediate_size.max(joint.len());
        let covers_query = joint.scope().len() == prepared.query.len()
            && prepared.query.iter().all(|&v| joint.contains(v));
        if !covers_query {
            return Err(QueryError::Internal(format!(
                "final factor scope [{}] does not match query [{}]",
                names(joint.scope()).join(", "),
                names(&prepared.query).join(", ")
            )));
        }
        let joint = joint.permute(&prepared.query)?;
        diagnostics.evidence_probability = joint.total();
        let normalized = joint.normalize(self.config.normalization_epsilon)?;

        diagnostics.eliminated = names(&eliminated);
        diagnostics.skipped = names(&skipped);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            eliminated = diagnostics.eliminated.len(),
            skipped = diagnostics.skipped.len(),
            max_intermediate_size = diagnostics.max_intermediate_size,
            evidence_probability = diagnostics.evidence_probability,
            "variable elimination finished"
        );

        Ok((Posterior::from_factor(self.network, normalized), diagnostics))
    }
}

fn observed_ids(prepared: &PreparedQuery) -> Vec<VarId> {
    let mut ids: Vec<VarId> = prepared.observed.keys().copied().collect();
    ids.sort_unstable();
    ids
}

/// Product of all `factors`; the unit factor when there are none.
fn product(factors: Vec<Factor>) -> Result<Factor, FactorError> {
    let mut iter = factors.into_iter();
    match iter.next() {
        Some(first) => iter.try_fold(first, |acc, f| acc.multiply(&f)),
        None => Ok(Factor::unit()),
    }
}
