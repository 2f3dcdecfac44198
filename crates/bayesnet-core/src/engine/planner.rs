//! Elimination ordering.
//!
//! The planner simulates variable elimination on factor scopes only: removing
//! a variable merges every scope that mentions it into their union minus the
//! variable. At each step the remaining hidden variable with the lowest
//! heuristic cost goes next; ties fall back to the network's topological rank,
//! so plans are reproducible. The order changes the cost of a query, never its
//! result.

use std::fmt;
use std::str::FromStr;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::engine::network::Network;
use crate::engine::variable::VarId;

type ScopeSet = SmallVec<[VarId; 8]>;

/// Greedy cost function for choosing the next variable to eliminate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EliminationHeuristic {
    /// Size of the factor the elimination would create, counted before the
    /// variable is summed out.
    #[default]
    MinWeight,
    /// Number of variables the eliminated variable currently interacts with.
    MinNeighbors,
    /// Number of interaction edges the elimination would add.
    MinFill,
    /// The network's topological order.
    Topological,
}

impl EliminationHeuristic {
    pub const ALL: [EliminationHeuristic; 4] = [
        EliminationHeuristic::MinWeight,
        EliminationHeuristic::MinNeighbors,
        EliminationHeuristic::MinFill,
        EliminationHeuristic::Topological,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EliminationHeuristic::MinWeight => "min-weight",
            EliminationHeuristic::MinNeighbors => "min-neighbors",
            EliminationHeuristic::MinFill => "min-fill",
            EliminationHeuristic::Topological => "topological",
        }
    }
}

impl fmt::Display for EliminationHeuristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EliminationHeuristic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        EliminationHeuristic::ALL
            .into_iter()
            .find(|h| h.as_str() == normalized)
            .ok_or_else(|| {
                format!(
                    "unknown heuristic '{}' (expected one of: min-weight, min-neighbors, min-fill, topological)",
                    s
                )
            })
    }
}

/// Sequence of hidden variables to sum out, each exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EliminationOrder(Vec<VarId>);

impl EliminationOrder {
    pub fn new(order: Vec<VarId>) -> Self {
        Self(order)
    }

    pub fn as_slice(&self) -> &[VarId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = VarId> + '_ {
        self.0.iter().copied()
    }

    pub fn into_inner(self) -> Vec<VarId> {
        self.0
    }

    /// Variable names, in order.
    pub fn names(&self, network: &Network) -> Vec<String> {
        self.0.iter().map(|&v| network.variables().name(v)).collect()
    }
}

/// Plans elimination orders for one network.
#[derive(Debug, Clone, Copy)]
pub struct EliminationPlanner<'a> {
    network: &'a Network,
    heuristic: EliminationHeuristic,
}

impl<'a> EliminationPlanner<'a> {
    pub fn new(network: &'a Network, heuristic: EliminationHeuristic) -> Self {
        Self { network, heuristic }
    }

    pub fn heuristic(&self) -> EliminationHeuristic {
        self.heuristic
    }

    /// Hidden variables (neither observed nor queried), in topological order.
    pub fn hidden_variables(&self, observed: &[VarId], query: &[VarId]) -> Vec<VarId> {
        self.network
            .topological_order()
            .iter()
            .copied()
            .filter(|v| !observed.contains(v) && !query.contains(v))
            .collect()
    }

    /// Plans over the network's CPD scopes with the observed variables removed.
    pub fn plan(&self, observed: &[VarId], query: &[VarId]) -> EliminationOrder {
        let hidden = self.hidden_variables(observed, query);
        let scopes = self.network.cpds().iter().map(|cpd| {
            cpd.factor()
                .scope()
                .iter()
                .copied()
                .filter(|v| !observed.contains(v))
                .collect::<Vec<_>>()
        });
        self.plan_for_scopes(scopes, &hidden)
    }

    /// Plans the elimination of `hidden` given the current factor scopes.
    pub fn plan_for_scopes<I, S>(&self, scopes: I, hidden: &[VarId]) -> EliminationOrder
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[VarId]>,
    {
        let mut scopes: Vec<ScopeSet> = scopes
            .into_iter()
            .map(|s| {
                let mut set: ScopeSet = s.as_ref().iter().copied().collect();
                set.sort_unstable();
                set.dedup();
                set
            })
            .filter(|s| !s.is_empty())
            .collect();
        let mut remaining: Vec<VarId> = hidden.to_vec();
        let mut order = Vec::with_capacity(remaining.len());

        while !remaining.is_empty() {
            let adjacency = match self.heuristic {
                EliminationHeuristic::MinFill => Some(interaction_edges(&scopes)),
                _ => None,
            };
            let (slot, _) = remaining
                .iter()
                .enumerate()
                .map(|(slot, &var)| {
                    let cost = self.cost(var, &scopes, adjacency.as_ref());
                    (slot, (cost, self.network.topological_rank(var), var))
                })
                .min_by_key(|&(_, key)| key)
                .unwrap_or((0, (0, 0, VarId(0))));
            let var = remaining.swap_remove(slot);

            let (touching, rest): (Vec<ScopeSet>, Vec<ScopeSet>) =
                scopes.into_iter().partition(|s| s.contains(&var));
            scopes = rest;
            let merged = union_without(&touching, var);
            if !merged.is_empty() {
                scopes.push(merged);
            }
            order.push(var);
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(
            heuristic = %self.heuristic,
            order = ?order,
            "planned elimination order"
        );

        EliminationOrder(order)
    }

    fn cost(
        &self,
        var: VarId,
        scopes: &[ScopeSet],
        adjacency: Option<&FxHashSet<(VarId, VarId)>>,
    ) -> u128 {
        let touching: Vec<&ScopeSet> = scopes.iter().filter(|s| s.contains(&var)).collect();
        let mut union: ScopeSet = touching.iter().flat_map(|s| s.iter().copied()).collect();
        union.sort_unstable();
        union.dedup();

        match self.heuristic {
            EliminationHeuristic::MinWeight => union.iter().fold(1u128, |acc, &v| {
                let card = self.network.variables().cardinality(v).unwrap_or(1) as u128;
                acc.saturating_mul(card)
            }),
            EliminationHeuristic::MinNeighbors => union.len().saturating_sub(1) as u128,
            EliminationHeuristic::MinFill => {
                let adjacency = match adjacency {
                    Some(adjacency) => adjacency,
                    None => return 0,
                };
                let neighbors: Vec<VarId> = union.into_iter().filter(|&v| v != var).collect();
                let mut fill = 0u128;
                for (i, &a) in neighbors.iter().enumerate() {
                    for &b in &neighbors[i + 1..] {
                        if !adjacency.contains(&(a, b)) {
                            fill += 1;
                        }
                    }
                }
                fill
            }
            EliminationHeuristic::Topological => 0,
        }
    }
}

/// Pairs `(a, b)` with `a < b` that share some scope.
fn interaction_edges(scopes: &[ScopeSet]) -> FxHashSet<(VarId, VarId)> {
    let mut edges = FxHashSet::default();
    for scope in scopes {
        for (i, &a) in scope.iter().enumerate() {
            for &b in &scope[i + 1..] {
                edges.insert((a, b));
            }
        }
    }
    edges
}

fn union_without(scopes: &[ScopeSet], var: VarId) -> ScopeSet {
    let mut merged: ScopeSet = scopes
        .iter()
        .flat_map(|s| s.iter().copied())
        .filter(|&v| v != var)
        .collect();
    merged.sort_unstable();
    merged.dedup();
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::variable::Variable;

    /// Star: Hub (card 4) -> L1, L2, L3 (card 2); L1 -> Tail (card 2).
    fn star() -> Network {
        let mut b = Network::builder();
        b.add_variable(Variable::new("Hub", 4).unwrap()).unwrap();
        for name in ["L1", "L2", "L3", "Tail"] {
            b.add_variable(Variable::new(name, 2).unwrap()).unwrap();
        }
        b.add_cpd::<&str>("Hub", &[], vec![0.25; 4]).unwrap();
        for leaf in ["L1", "L2", "L3"] {
            b.add_edge("Hub", leaf).unwrap();
            b.add_cpd(leaf, &["Hub"], vec![0.5; 8]).unwrap();
        }
        b.add_edge("L1", "Tail").unwrap();
        b.add_cpd("Tail", &["L1"], vec![0.5; 4]).unwrap();
        b.build().unwrap()
    }

    fn names(net: &Network, order: &EliminationOrder) -> Vec<String> {
        order.names(net)
    }

    #[test]
    fn every_heuristic_covers_hidden_set_once() {
        let net = star();
        let tail = net.id("Tail").unwrap();
        for heuristic in EliminationHeuristic::ALL {
            let planner = EliminationPlanner::new(&net, heuristic);
            let order = planner.plan(&[], &[tail]);
            let mut got = order.clone().into_inner();
            got.sort_unstable();
            let mut expected = planner.hidden_variables(&[], &[tail]);
            expected.sort_unstable();
            assert_eq!(got, expected, "heuristic {}", heuristic);
        }
    }

    #[test]
    fn min_weight_eliminates_leaves_before_hub() {
        let net = star();
        let tail = net.id("Tail").unwrap();
        let order = EliminationPlanner::new(&net, EliminationHeuristic::MinWeight).plan(&[], &[tail]);
        // L2 and L3 only touch Hub (weight 8); Hub touches everything.
        assert_eq!(names(&net, &order)[..2], ["L2".to_string(), "L3".to_string()]);
        assert_ne!(names(&net, &order)[0], "Hub");
    }

    #[test]
    fn topological_heuristic_follows_rank() {
        let net = star();
        let tail = net.id("Tail").unwrap();
        let order =
            EliminationPlanner::new(&net, EliminationHeuristic::Topological).plan(&[], &[tail]);
        assert_eq!(names(&net, &order), vec!["Hub", "L1", "L2", "L3"]);
    }

    #[test]
    fn observed_variables_are_not_planned() {
        let net = star();
        let hub = net.id("Hub").unwrap();
        let tail = net.id("Tail").unwrap();
        let order = EliminationPlanner::new(&net, EliminationHeuristic::MinFill).plan(&[hub], &[tail]);
        assert!(!order.as_slice().contains(&hub));
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn parses_heuristic_names() {
        assert_eq!(
            "min-fill".parse::<EliminationHeuristic>(),
            Ok(EliminationHeuristic::MinFill)
        );
        assert_eq!(
            "MIN_WEIGHT".parse::<EliminationHeuristic>(),
            Ok(EliminationHeuristic::MinWeight)
        );
        assert!("greedy".parse::<EliminationHeuristic>().is_err());
    }
}
