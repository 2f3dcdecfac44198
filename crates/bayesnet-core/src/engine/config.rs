//! Inference configuration.

use serde::{Deserialize, Serialize};

use crate::engine::errors::QueryError;
use crate::engine::planner::EliminationHeuristic;

/// Default threshold below which a posterior's total mass counts as zero.
pub const DEFAULT_NORMALIZATION_EPSILON: f64 = 1e-12;

/// Configuration for variable-elimination queries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Heuristic used to order hidden variables when no order is given.
    pub heuristic: EliminationHeuristic,
    /// Total mass at or below which evidence is reported as inconsistent.
    pub normalization_epsilon: f64,
    /// Skip CPDs of variables outside the ancestral closure of the query and
    /// evidence. Those CPDs sum to one and cannot change the posterior.
    pub prune_barren: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            heuristic: EliminationHeuristic::MinWeight,
            normalization_epsilon: DEFAULT_NORMALIZATION_EPSILON,
            prune_barren: false,
        }
    }
}

impl InferenceConfig {
    pub fn with_heuristic(mut self, heuristic: EliminationHeuristic) -> Self {
        self.heuristic = heuristic;
        self
    }

    pub fn with_pruning(mut self, prune_barren: bool) -> Self {
        self.prune_barren = prune_barren;
        self
    }

    pub fn validate(self) -> Result<Self, QueryError> {
        if !self.normalization_epsilon.is_finite() || self.normalization_epsilon < 0.0 {
            return Err(QueryError::InvalidConfig(
                "normalization_epsilon must be finite and >= 0".into(),
            ));
        }
        Ok(self)
    }
}
