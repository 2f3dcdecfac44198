//! # Bayesnet Core
//!
//! Exact inference over discrete Bayesian networks by variable elimination.
//!
//! Networks are assembled with a [`NetworkBuilder`] (or loaded from a JSON
//! [`ModelDefinition`]), validated once, and then queried any number of times:
//!
//! ```
//! use bayesnet_core::{Evidence, Network, Variable, VariableElimination};
//!
//! let mut builder = Network::builder();
//! builder.add_variable(Variable::with_states("Rain", ["no", "yes"])?)?;
//! builder.add_variable(Variable::with_states("Wet", ["no", "yes"])?)?;
//! builder.add_edge("Rain", "Wet")?;
//! builder.add_cpd::<&str>("Rain", &[], vec![0.8, 0.2])?;
//! builder.add_cpd("Wet", &["Rain"], vec![0.9, 0.1, 0.1, 0.9])?;
//! let network = builder.build()?;
//!
//! let posterior = VariableElimination::new(&network)
//!     .query(&["Rain"], &Evidence::new().observe("Wet", "yes"))?;
//! assert!(posterior.values()[1] > 0.2);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod engine;
pub mod model;

// Re-export commonly used types
pub use engine::batch::{BatchResult, BatchStats, QueryRequest, QueryRequestDef};
pub use engine::config::InferenceConfig;
pub use engine::elimination::{QueryDiagnostics, VariableElimination};
pub use engine::errors::{FactorError, ModelError, QueryError};
pub use engine::evidence::{Evidence, StateRef};
pub use engine::factor::Factor;
pub use engine::network::{Cpd, Network, NetworkBuilder, TableLayout};
pub use engine::planner::{EliminationHeuristic, EliminationOrder, EliminationPlanner};
pub use engine::posterior::{MapAssignment, Posterior, PosteriorVariable};
pub use engine::variable::{VarId, Variable, VariableRegistry};
pub use model::{DefinitionError, ModelDefinition};

/// Load a model definition file and build its network.
///
/// Convenience wrapper over [`ModelDefinition::from_path`] and
/// [`ModelDefinition::build`].
pub fn load_network(path: impl AsRef<std::path::Path>) -> Result<Network, DefinitionError> {
    Ok(ModelDefinition::from_path(path)?.build()?)
}
