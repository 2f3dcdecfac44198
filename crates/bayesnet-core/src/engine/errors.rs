//! Error types for model construction, factor algebra, and inference.

use thiserror::Error;

/// Failures of the factor algebra.
///
/// Apart from [`FactorError::Degenerate`], these indicate malformed factors or
/// mismatched scopes, which the validator and planner are supposed to rule out.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FactorError {
    /// Table length does not match the product of the scope cardinalities.
    #[error("table has {found} entries but scope requires {expected}")]
    MalformedTable { expected: usize, found: usize },

    /// The product of the scope cardinalities does not fit in `usize`.
    #[error("scope cardinalities multiply past the addressable table size")]
    TableTooLarge,

    /// A variable appears twice in one scope.
    #[error("variable {0} appears more than once in scope")]
    DuplicateScopeVariable(u32),

    /// A variable in scope has cardinality zero.
    #[error("variable {0} has zero cardinality")]
    ZeroCardinality(u32),

    /// The same variable carries different cardinalities in two factors.
    #[error("variable {var} has cardinality {left} in one factor and {right} in the other")]
    CardinalityConflict { var: u32, left: usize, right: usize },

    /// A table entry is negative, NaN, or infinite.
    #[error("entry {index} is {value}, expected a finite non-negative number")]
    InvalidEntry { index: usize, value: f64 },

    /// The variable is not part of the factor's scope.
    #[error("variable {0} is not in the factor scope")]
    NotInScope(u32),

    /// A fixed state lies outside the variable's cardinality.
    #[error("state {state} out of range for variable {var} with cardinality {cardinality}")]
    StateOutOfRange {
        var: u32,
        state: usize,
        cardinality: usize,
    },

    /// A requested scope permutation is not a permutation of the scope.
    #[error("requested order is not a permutation of the factor scope")]
    InvalidPermutation,

    /// Normalization total is zero (or too close to zero to divide by).
    #[error("degenerate distribution: total mass {total:e}")]
    Degenerate { total: f64 },
}

/// Errors raised while building and validating a network.
///
/// Every variant names the offending variable so the caller can fix its model
/// definition; nothing is corrected silently.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// A variable name was declared twice.
    #[error("variable '{0}' is declared more than once")]
    DuplicateVariable(String),

    /// A name refers to no declared variable.
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    /// Cardinality must be at least one.
    #[error("variable '{0}' must have at least one state")]
    InvalidCardinality(String),

    /// State labels do not match the cardinality or repeat.
    #[error("variable '{variable}': {reason}")]
    InvalidStateLabels { variable: String, reason: String },

    /// A second CPD was attached to the same variable.
    #[error("variable '{0}' already has a CPD")]
    DuplicateCpd(String),

    /// The edge relation contains a cycle through the listed variables.
    #[error("cycle detected among variables: {}", .0.join(", "))]
    CycleDetected(Vec<String>),

    /// A variable has no CPD attached.
    #[error("variable '{0}' has no CPD")]
    MissingCpd(String),

    /// CPD parents disagree with the variable's incoming edges.
    #[error("CPD of '{variable}' has parents [{}] but the graph declares [{}]", .cpd_parents.join(", "), .graph_parents.join(", "))]
    CpdScopeMismatch {
        variable: String,
        cpd_parents: Vec<String>,
        graph_parents: Vec<String>,
    },

    /// CPD table length disagrees with its scope.
    ///
    /// `expected` is `usize::MAX` when the scope is too large to address.
    #[error("CPD of '{variable}' has {found} entries, expected {expected}")]
    TableSizeMismatch {
        variable: String,
        expected: usize,
        found: usize,
    },

    /// A CPD entry is not a valid probability.
    #[error("CPD of '{variable}' has invalid entry {value} at index {index}")]
    InvalidProbability {
        variable: String,
        index: usize,
        value: f64,
    },

    /// A CPD table could not be laid out as a factor.
    #[error("CPD of '{variable}': {source}")]
    InvalidTable {
        variable: String,
        #[source]
        source: FactorError,
    },

    /// A per-parent-assignment distribution does not sum to one.
    #[error("CPD of '{variable}' sums to {sum} for parent assignment [{}]", .parent_assignment.iter().map(|(name, state)| format!("{name}={state}")).collect::<Vec<_>>().join(", "))]
    NotNormalized {
        variable: String,
        parent_assignment: Vec<(String, usize)>,
        sum: f64,
    },

    /// Configuration values are out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Errors returned by a single inference query.
///
/// Query-input and inference failures are expected outcomes the caller
/// handles; [`QueryError::Internal`] reports a broken engine invariant and only
/// aborts the query that hit it.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    /// A name refers to no variable in the network.
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    /// An observed state is out of range or an unknown label.
    #[error("rejected evidence for '{variable}': {reason}")]
    RejectedEvidence { variable: String, reason: String },

    /// The query set is empty, repeats a variable, or overlaps the evidence.
    #[error("rejected query: {0}")]
    RejectedQuery(String),

    /// A caller-supplied elimination order does not cover the hidden set.
    #[error("rejected elimination order: {0}")]
    RejectedOrder(String),

    /// The evidence has (near) zero probability under the model.
    #[error("inconsistent evidence: observations have probability {total:e} under the model")]
    InconsistentEvidence { total: f64 },

    /// Configuration values are out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Engine invariant violation (programmer error, not user error).
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<FactorError> for QueryError {
    fn from(err: FactorError) -> Self {
        match err {
            FactorError::Degenerate { total } => QueryError::InconsistentEvidence { total },
            other => QueryError::Internal(other.to_string()),
        }
    }
}
