//! Shared fixtures for the integration and property tests.

use std::path::PathBuf;

use bayesnet_core::{Evidence, Network, Variable};

/// Directory holding the demo model definitions.
pub fn demos_dir() -> PathBuf {
    let mut p = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    p.push("../../demos");
    p
}

/// A -> B -> C, binary with labels `no`/`yes`.
///
/// P(B=1|A=0)=0.2, P(B=1|A=1)=0.8, P(C=1|B=0)=0.1, P(C=1|B=1)=0.9 and
/// P(A=1) = `prior`.
pub fn chain(prior: f64) -> Network {
    let mut b = Network::builder().with_name("chain");
    for name in ["A", "B", "C"] {
        b.add_variable(Variable::with_states(name, ["no", "yes"]).expect("labels"))
            .expect("unique");
    }
    b.add_edge("A", "B").expect("edge");
    b.add_edge("B", "C").expect("edge");
    b.add_cpd::<&str>("A", &[], vec![1.0 - prior, prior])
        .expect("cpd");
    b.add_cpd("B", &["A"], vec![0.8, 0.2, 0.2, 0.8]).expect("cpd");
    b.add_cpd("C", &["B"], vec![0.9, 0.1, 0.1, 0.9]).expect("cpd");
    b.build().expect("valid chain")
}

/// Posterior over `query` by enumerating the full joint distribution.
///
/// Returns `None` when the evidence has probability zero.
pub fn brute_force(network: &Network, query: &[&str], evidence: &Evidence) -> Option<Vec<f64>> {
    let cards: Vec<usize> = network
        .variables()
        .iter()
        .map(|(_, v)| v.cardinality())
        .collect();
    let observed = evidence.resolve(network).ok()?;
    let query_ids: Vec<usize> = query
        .iter()
        .map(|name| network.id(name).map(|id| id.index()))
        .collect::<Option<_>>()?;
    let query_len: usize = query_ids.iter().map(|&i| cards[i]).product();
    let mut out = vec![0.0; query_len];

    let mut assignment = vec![0usize; cards.len()];
    loop {
        let consistent = observed
            .iter()
            .all(|(id, &state)| assignment[id.index()] == state);
        if consistent {
            let p = network.joint_probability(&assignment)?;
            let idx = query_ids
                .iter()
                .fold(0, |acc, &i| acc * cards[i] + assignment[i]);
            out[idx] += p;
        }
        // odometer, last variable fastest
        let mut dim = cards.len();
        loop {
            if dim == 0 {
                let total: f64 = out.iter().sum();
                if total <= 0.0 {
                    return None;
                }
                return Some(out.iter().map(|p| p / total).collect());
            }
            dim -= 1;
            assignment[dim] += 1;
            if assignment[dim] < cards[dim] {
                break;
            }
            assignment[dim] = 0;
        }
    }
}

/// Largest absolute difference between two tables of equal length.
pub fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len(), "table lengths differ");
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}
