//! Network validation.
//!
//! Turns a [`NetworkBuilder`] into a frozen [`Network`] or the first
//! [`ModelError`] found. Checks run in a fixed order so the same definition
//! always reports the same error:
//!
//! 1. acyclicity (Kahn's algorithm, ties broken by declaration order)
//! 2. per variable, in declaration order: CPD present, CPD parents equal the
//!    graph parents, table size, entry range, per-parent-assignment sums

use std::collections::BTreeSet;

use smallvec::SmallVec;

use crate::engine::errors::{FactorError, ModelError};
use crate::engine::factor::{table_len, Factor};
use crate::engine::network::{Cpd, CpdDraft, Network, NetworkBuilder, Parents, TableLayout};
use crate::engine::variable::{VarId, VariableRegistry};

pub(crate) fn validate_network(builder: NetworkBuilder) -> Result<Network, ModelError> {
    let NetworkBuilder {
        name,
        registry,
        edges,
        mut cpds,
        tolerance,
    } = builder;

    if !tolerance.is_finite() || tolerance <= 0.0 {
        return Err(ModelError::InvalidConfig(format!(
            "CPD tolerance must be finite and > 0, got {}",
            tolerance
        )));
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        variables = registry.len(),
        edges = edges.len(),
        "validating network"
    );

    let graph_parents = parents_from_edges(registry.len(), &edges);
    let order = topological_order(&graph_parents).map_err(|remaining| {
        ModelError::CycleDetected(remaining.iter().map(|&v| registry.name(v)).collect())
    })?;

    let mut checked = Vec::with_capacity(registry.len());
    for (var, _) in registry.iter() {
        let draft = cpds
            .remove(&var)
            .ok_or_else(|| ModelError::MissingCpd(registry.name(var)))?;
        checked.push(check_cpd(
            &registry,
            var,
            &graph_parents[var.index()],
            draft,
            tolerance,
        )?);
    }

    #[cfg(feature = "tracing")]
    tracing::info!(
        network = name.as_deref().unwrap_or("<unnamed>"),
        variables = registry.len(),
        "network validated"
    );

    Ok(Network::from_validated(name, registry, checked, order))
}

fn parents_from_edges(n: usize, edges: &[(VarId, VarId)]) -> Vec<Parents> {
    let mut parents = vec![Parents::new(); n];
    for &(parent, child) in edges {
        parents[child.index()].push(parent);
    }
    parents
}

/// Deterministic topological order over `parents` (indexed by variable id).
///
/// Among the variables whose parents are all placed, the lowest id goes first.
/// On a cycle returns the variables that lie on, or between, cycles.
pub(crate) fn topological_order(parents: &[Parents]) -> Result<Vec<VarId>, Vec<VarId>> {
    let n = parents.len();
    let mut children: Vec<Vec<VarId>> = vec![Vec::new(); n];
    let mut in_degree = vec![0usize; n];
    for (child, ps) in parents.iter().enumerate() {
        in_degree[child] = ps.len();
        for parent in ps {
            children[parent.index()].push(VarId(child as u32));
        }
    }

    let mut ready: BTreeSet<VarId> = (0..n as u32)
        .map(VarId)
        .filter(|v| in_degree[v.index()] == 0)
        .collect();
    let mut order = Vec::with_capacity(n);
    while let Some(var) = ready.pop_first() {
        order.push(var);
        for &child in &children[var.index()] {
            in_degree[child.index()] -= 1;
            if in_degree[child.index()] == 0 {
                ready.insert(child);
            }
        }
    }
    if order.len() == n {
        return Ok(order);
    }

    // Peel off leftover variables that have no leftover children; what
    // remains sits on a cycle or on a path joining two cycles.
    let mut remaining: Vec<bool> = in_degree.iter().map(|&d| d > 0).collect();
    loop {
        let mut changed = false;
        for var in 0..n {
            if remaining[var] && !children[var].iter().any(|c| remaining[c.index()]) {
                remaining[var] = false;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    Err((0..n as u32)
        .map(VarId)
        .filter(|v| remaining[v.index()])
        .collect())
}

fn check_cpd(
    registry: &VariableRegistry,
    var: VarId,
    graph_parents: &[VarId],
    draft: CpdDraft,
    tolerance: f64,
) -> Result<Cpd, ModelError> {
    let name = registry.name(var);
    let CpdDraft {
        parents,
        table,
        layout,
    } = draft;

    let mut distinct = parents.clone();
    distinct.sort_unstable();
    distinct.dedup();
    let mut expected = graph_parents.to_vec();
    expected.sort_unstable();
    if distinct.len() != parents.len() || parents.contains(&var) || distinct != expected {
        return Err(ModelError::CpdScopeMismatch {
            variable: name,
            cpd_parents: parents.iter().map(|&p| registry.name(p)).collect(),
            graph_parents: graph_parents.iter().map(|&p| registry.name(p)).collect(),
        });
    }

    let card = registry.cardinality(var).unwrap_or(0);
    let parent_cards: SmallVec<[usize; 8]> = parents
        .iter()
        .map(|&p| registry.cardinality(p).unwrap_or(0))
        .collect();
    // A table too large to address can never match; report usize::MAX.
    let columns = table_len(&parent_cards).unwrap_or(usize::MAX);
    let expected_len = columns.checked_mul(card).unwrap_or(usize::MAX);
    if table.len() != expected_len || expected_len == usize::MAX {
        return Err(ModelError::TableSizeMismatch {
            variable: name,
            expected: expected_len,
            found: table.len(),
        });
    }

    if let Some((index, &value)) = table
        .iter()
        .enumerate()
        .find(|(_, v)| !v.is_finite() || **v < 0.0)
    {
        return Err(ModelError::InvalidProbability {
            variable: name,
            index,
            value,
        });
    }

    let factor = build_factor(registry, var, &parents, table, layout).map_err(|source| {
        ModelError::InvalidTable {
            variable: registry.name(var),
            source,
        }
    })?;

    // State-major: entry (s, p) lives at s * columns + p.
    let values = factor.values();
    for column in 0..columns {
        let sum: f64 = (0..card).map(|s| values[s * columns + column]).sum();
        if (sum - 1.0).abs() > tolerance {
            return Err(ModelError::NotNormalized {
                variable: name,
                parent_assignment: decode_column(registry, &parents, &parent_cards, column),
                sum,
            });
        }
    }

    Ok(Cpd::new(var, parents.into_iter().collect(), factor))
}

fn build_factor(
    registry: &VariableRegistry,
    var: VarId,
    parents: &[VarId],
    table: Vec<f64>,
    layout: TableLayout,
) -> Result<Factor, FactorError> {
    let card_of = |v: VarId| registry.cardinality(v).unwrap_or(0);
    let state_major = std::iter::once(var).chain(parents.iter().copied());
    match layout {
        TableLayout::StateMajor => Factor::new(state_major.map(|v| (v, card_of(v))), table),
        TableLayout::ParentMajor => {
            let parent_major = parents.iter().copied().chain(std::iter::once(var));
            let transposed = Factor::new(parent_major.map(|v| (v, card_of(v))), table)?;
            let target: Vec<VarId> = state_major.collect();
            transposed.permute(&target)
        }
    }
}

fn decode_column(
    registry: &VariableRegistry,
    parents: &[VarId],
    parent_cards: &[usize],
    column: usize,
) -> Vec<(String, usize)> {
    let mut states = vec![0; parents.len()];
    let mut rest = column;
    for idx in (0..parents.len()).rev() {
        states[idx] = rest % parent_cards[idx];
        rest /= parent_cards[idx];
    }
    parents
        .iter()
        .zip(states)
        .map(|(&p, s)| (registry.name(p), s))
        .collect()
}
