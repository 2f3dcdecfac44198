//! Batch query execution.
//!
//! Independent queries against one network share nothing but the frozen
//! network, so a batch is an embarrassingly parallel map. Elimination inside a
//! single query stays sequential.
//!
//! ## Feature gating
//!
//! Parallel evaluation is behind the `parallel` feature flag. When disabled,
//! requests run one after another. Either way results come back in request
//! order and each request fails or succeeds on its own.

use std::collections::BTreeMap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::Deserialize;

use crate::engine::elimination::VariableElimination;
use crate::engine::errors::QueryError;
use crate::engine::evidence::{Evidence, StateRef};
use crate::engine::posterior::Posterior;

/// One query of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryRequest {
    pub variables: Vec<String>,
    pub evidence: Evidence,
}

impl QueryRequest {
    pub fn new<S: Into<String>>(variables: impl IntoIterator<Item = S>, evidence: Evidence) -> Self {
        Self {
            variables: variables.into_iter().map(Into::into).collect(),
            evidence,
        }
    }
}

/// Serialized form of a request: evidence states are labels or indices.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequestDef {
    pub variables: Vec<String>,
    #[serde(default)]
    pub evidence: BTreeMap<String, StateDef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StateDef {
    Index(usize),
    Label(String),
}

impl From<QueryRequestDef> for QueryRequest {
    fn from(def: QueryRequestDef) -> Self {
        let evidence = def
            .evidence
            .into_iter()
            .map(|(var, state)| match state {
                StateDef::Index(idx) => (var, StateRef::Index(idx)),
                StateDef::Label(label) => (var, StateRef::Label(label)),
            })
            .collect::<Evidence>();
        QueryRequest {
            variables: def.variables,
            evidence,
        }
    }
}

/// Results of a batch, in request order.
#[derive(Debug)]
pub struct BatchResult {
    pub results: Vec<Result<Posterior, QueryError>>,
    pub stats: BatchStats,
}

/// Statistics about batch evaluation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchStats {
    /// Number of requests evaluated
    pub requests: usize,
    /// Number of requests that returned an error
    pub failures: usize,
    /// Worker threads available to the batch
    pub workers: usize,
}

impl BatchResult {
    fn from_results(results: Vec<Result<Posterior, QueryError>>, workers: usize) -> Self {
        let failures = results.iter().filter(|r| r.is_err()).count();
        BatchResult {
            stats: BatchStats {
                requests: results.len(),
                failures,
                workers,
            },
            results,
        }
    }
}

impl VariableElimination<'_> {
    /// Evaluates independent requests on the rayon global pool.
    #[cfg(feature = "parallel")]
    pub fn query_batch(&self, requests: &[QueryRequest]) -> BatchResult {
        let results: Vec<_> = requests
            .par_iter()
            .map(|req| self.query(&req.variables, &req.evidence))
            .collect();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            requests = requests.len(),
            workers = rayon::current_num_threads(),
            "evaluated query batch"
        );

        BatchResult::from_results(results, rayon::current_num_threads())
    }

    /// Sequential fallback for batch evaluation.
    #[cfg(not(feature = "parallel"))]
    pub fn query_batch(&self, requests: &[QueryRequest]) -> BatchResult {
        let results = requests
            .iter()
            .map(|req| self.query(&req.variables, &req.evidence))
            .collect();

        #[cfg(feature = "tracing")]
        tracing::debug!(requests = requests.len(), "evaluated query batch");

        BatchResult::from_results(results, 1)
    }
}
