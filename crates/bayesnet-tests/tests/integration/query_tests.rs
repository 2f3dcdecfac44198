//! End-to-end queries against small reference networks.

use bayesnet_core::{
    EliminationHeuristic, Evidence, InferenceConfig, QueryError, QueryRequest,
    VariableElimination,
};
use bayesnet_tests::{brute_force, chain, max_abs_diff};

#[test]
fn chain_marginal_of_c_is_one_half() {
    let net = chain(0.5);
    let posterior = VariableElimination::new(&net)
        .query(&["C"], &Evidence::new())
        .unwrap();
    assert!((posterior.probability_of(&["yes"]).unwrap() - 0.5).abs() < 1e-9);
    assert!((posterior.values().iter().sum::<f64>() - 1.0).abs() < 1e-9);
}

#[test]
fn observing_a_raises_c() {
    let net = chain(0.5);
    let posterior = VariableElimination::new(&net)
        .query(&["C"], &Evidence::new().observe("A", "yes"))
        .unwrap();
    let p = posterior.probability_of(&["yes"]).unwrap();
    assert!(p > 0.5);
    assert!((p - 0.74).abs() < 1e-9);
}

#[test]
fn evidence_by_index_and_by_label_agree() {
    let net = chain(0.3);
    let ve = VariableElimination::new(&net);
    let by_label = ve.query(&["A"], &Evidence::new().observe("C", "yes")).unwrap();
    let by_index = ve.query(&["A"], &Evidence::new().observe("C", 1)).unwrap();
    let by_digit = ve.query(&["A"], &Evidence::new().observe("C", "1")).unwrap();
    assert_eq!(by_label, by_index);
    assert_eq!(by_label, by_digit);
}

#[test]
fn every_heuristic_matches_brute_force() {
    let net = chain(0.3);
    let evidence = Evidence::new().observe("C", "no");
    let expected = brute_force(&net, &["B", "A"], &evidence).unwrap();
    for heuristic in EliminationHeuristic::ALL {
        let config = InferenceConfig::default().with_heuristic(heuristic);
        let ve = VariableElimination::with_config(&net, config).unwrap();
        let got = ve.query(&["B", "A"], &evidence).unwrap();
        assert!(
            max_abs_diff(got.values(), &expected) < 1e-9,
            "heuristic {} disagrees",
            heuristic
        );
    }
}

#[test]
fn rejected_inputs_leave_the_network_usable() {
    let net = chain(0.5);
    let ve = VariableElimination::new(&net);
    assert!(matches!(
        ve.query(&["C"], &Evidence::new().observe("A", 2)),
        Err(QueryError::RejectedEvidence { .. })
    ));
    assert!(matches!(
        ve.query(&["C"], &Evidence::new().observe("A", "perhaps")),
        Err(QueryError::RejectedEvidence { .. })
    ));
    assert!(matches!(
        ve.query(&["Nope"], &Evidence::new()),
        Err(QueryError::UnknownVariable(_))
    ));
    assert!(ve.query(&["C"], &Evidence::new()).is_ok());
}

#[test]
fn concurrent_queries_share_one_network() {
    let net = std::sync::Arc::new(chain(0.5));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let net = std::sync::Arc::clone(&net);
            std::thread::spawn(move || {
                let evidence = Evidence::new().observe("A", i % 2);
                VariableElimination::new(&net)
                    .query(&["C"], &evidence)
                    .map(|p| p.values()[1])
            })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        let p = handle.join().unwrap().unwrap();
        let expected = if i % 2 == 1 { 0.74 } else { 0.26 };
        assert!((p - expected).abs() < 1e-9);
    }
}

#[test]
fn batch_reports_each_request_on_its_own() {
    let net = chain(0.5);
    let ve = VariableElimination::new(&net);
    let requests = vec![
        QueryRequest::new(["C"], Evidence::new()),
        QueryRequest::new(["A"], Evidence::new().observe("A", 0)),
        QueryRequest::new(["A", "C"], Evidence::new().observe("B", "yes")),
    ];
    let batch = ve.query_batch(&requests);
    assert_eq!(batch.results.len(), 3);
    assert!(batch.results[0].is_ok());
    assert!(matches!(batch.results[1], Err(QueryError::RejectedQuery(_))));
    let joint = batch.results[2].as_ref().unwrap();
    let expected = brute_force(&net, &["A", "C"], &Evidence::new().observe("B", "yes")).unwrap();
    assert!(max_abs_diff(joint.values(), &expected) < 1e-9);
    assert_eq!(batch.stats.failures, 1);
}
